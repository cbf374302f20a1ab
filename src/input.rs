use smithay::{
    backend::input::{
        AbsolutePositionEvent, Axis, AxisSource, ButtonState, Event, InputBackend, InputEvent,
        KeyState, KeyboardKeyEvent, PointerAxisEvent, PointerButtonEvent, PointerMotionEvent,
    },
    desktop::{PopupManager, WindowSurfaceType, utils::under_from_surface_tree},
    input::{
        keyboard::FilterResult,
        pointer::{AxisFrame, ButtonEvent, RelativeMotionEvent},
    },
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Point, Rectangle},
};

use crate::{SERIAL_COUNTER, action::Action, client::ClientId, config, state::Drag, state::State};

/// The move-drag button (linux/input-event-codes BTN_SIDE).
const BTN_SIDE: u32 = 0x113;

impl State {
    pub fn process_input_event<I: InputBackend>(&mut self, event: InputEvent<I>) {
        match event {
            InputEvent::Keyboard { event } => {
                let press_state = event.state();
                let action = self.seat.get_keyboard().unwrap().input::<Action, _>(
                    self,
                    event.key_code(),
                    press_state,
                    0.into(),
                    0,
                    |_, modifiers, handle| {
                        if press_state == KeyState::Pressed {
                            if let Some(action) =
                                config::keybinding(modifiers, handle.modified_sym())
                            {
                                return FilterResult::Intercept(action);
                            }
                        }
                        FilterResult::Forward
                    },
                );
                if let Some(action) = action {
                    action.execute(self);
                }
            }
            InputEvent::PointerMotion { event } => {
                let delta: Point<f64, Logical> = (event.delta_x(), event.delta_y()).into();
                self.pointer_location = self.clamp_coords(self.pointer_location + delta);

                let under = self.on_cursor_motion(event.time_msec());
                let pointer = self.pointer.clone();
                pointer.relative_motion(
                    self,
                    under,
                    &RelativeMotionEvent {
                        delta,
                        delta_unaccel: event.delta_unaccel(),
                        utime: event.time(),
                    },
                );
                pointer.frame(self);
            }
            InputEvent::PointerMotionAbsolute { event } => {
                // absolute coordinates arrive relative to one output
                let area = self
                    .mons
                    .iter()
                    .find(|(_, m)| m.enabled)
                    .map(|(_, m)| m.m)
                    .unwrap_or(self.sgeom);
                if area.size.w == 0 || area.size.h == 0 {
                    return;
                }
                let position = event.position_transformed(area.size) + area.loc.to_f64();
                self.pointer_location = self.clamp_coords(position);

                self.on_cursor_motion(event.time_msec());
                self.pointer.clone().frame(self);
            }
            InputEvent::PointerButton { event } => {
                let button = event.button_code();
                let button_state = event.state();

                if button_state == ButtonState::Pressed && button == BTN_SIDE {
                    if let Some(id) = self.client_at(self.pointer_location) {
                        self.focusclient(Some(id), true);
                        let origin = self
                            .clients
                            .get(id)
                            .map(|client| client.geom.loc.to_f64())
                            .unwrap_or_default();
                        self.drag = Some(Drag {
                            client: id,
                            grab: self.pointer_location - origin,
                        });
                    }
                    return;
                }
                if button_state == ButtonState::Released && self.drag.is_some() {
                    // drop the window off on the monitor under the cursor
                    let Some(drag) = self.drag.take() else {
                        return;
                    };
                    if let Some(m) = self.monitor_at(self.pointer_location) {
                        self.selmon = Some(m);
                    }
                    let target = self.selmon;
                    self.setmon(drag.client, target, 0);
                    return;
                }

                let pointer = self.pointer.clone();
                pointer.button(
                    self,
                    &ButtonEvent {
                        button,
                        state: button_state,
                        serial: SERIAL_COUNTER.next_serial(),
                        time: event.time_msec(),
                    },
                );
                pointer.frame(self);
            }
            InputEvent::PointerAxis { event } => {
                let horizontal_amount = event
                    .amount(Axis::Horizontal)
                    .unwrap_or_else(|| event.amount_v120(Axis::Horizontal).unwrap_or(0.0) * 3.0);
                let vertical_amount = event
                    .amount(Axis::Vertical)
                    .unwrap_or_else(|| event.amount_v120(Axis::Vertical).unwrap_or(0.0) * 3.0);
                let horizontal_amount_discrete = event.amount_v120(Axis::Horizontal);
                let vertical_amount_discrete = event.amount_v120(Axis::Vertical);

                let mut frame = AxisFrame::new(event.time_msec()).source(event.source());
                if horizontal_amount != 0.0 {
                    frame = frame.value(Axis::Horizontal, horizontal_amount);
                    if let Some(discrete) = horizontal_amount_discrete {
                        frame = frame.v120(Axis::Horizontal, discrete as i32);
                    }
                } else if event.source() == AxisSource::Finger {
                    frame = frame.stop(Axis::Horizontal);
                }
                if vertical_amount != 0.0 {
                    frame = frame.value(Axis::Vertical, vertical_amount);
                    if let Some(discrete) = vertical_amount_discrete {
                        frame = frame.v120(Axis::Vertical, discrete as i32);
                    }
                } else if event.source() == AxisSource::Finger {
                    frame = frame.stop(Axis::Vertical);
                }
                let pointer = self.pointer.clone();
                pointer.axis(self, frame);
                pointer.frame(self);
            }
            _ => {}
        }
    }

    /// Shared motion path: update the selected monitor, move a drag
    /// along, or route pointer focus to whatever is under the cursor.
    /// Returns the surface under the cursor (None while dragging).
    fn on_cursor_motion(&mut self, time: u32) -> Option<(WlSurface, Point<f64, Logical>)> {
        if let Some(m) = self.monitor_at(self.pointer_location) {
            self.selmon = Some(m);
        }

        if let Some(drag) = &self.drag {
            let id = drag.client;
            let grab = drag.grab;
            if let Some(size) = self.clients.get(id).map(|client| client.geom.size) {
                let loc = (self.pointer_location - grab).to_i32_round();
                self.resize_client(id, Rectangle::new(loc, size), true);
            }
            return None;
        }

        let (target, under) = self.surface_under();
        self.pointerfocus(target, under.clone(), time);
        under
    }

    /// Hit-test the window model at the cursor: independents first,
    /// then the stacking order.
    pub fn surface_under(&self) -> (Option<ClientId>, Option<(WlSurface, Point<f64, Logical>)>) {
        let point = self.pointer_location;
        #[cfg(feature = "xwayland")]
        if let Some(id) = self.independent_at(point) {
            return (Some(id), self.client_surface_at(id, point));
        }
        if let Some(id) = self.client_at(point) {
            return (Some(id), self.client_surface_at(id, point));
        }
        (None, None)
    }

    /// Topmost visible client whose geometry contains the point.
    pub fn client_at(&self, point: Point<f64, Logical>) -> Option<ClientId> {
        self.stack.iter().copied().find(|&id| {
            let Some(client) = self.clients.get(id) else {
                return false;
            };
            let Some(m) = client.mon else {
                return false;
            };
            self.visibleon(id, m) && client.geom.to_f64().contains(point)
        })
    }

    /// Topmost independent at the point; the most recently mapped
    /// counts as the top.
    #[cfg(feature = "xwayland")]
    pub fn independent_at(&self, point: Point<f64, Logical>) -> Option<ClientId> {
        self.independents.iter().copied().find(|&id| {
            self.clients
                .get(id)
                .is_some_and(|client| client.kind.geometry().to_f64().contains(point))
        })
    }

    /// Innermost surface of a client's tree at the point, popups
    /// before the toplevel, with its global position.
    fn client_surface_at(
        &self,
        id: ClientId,
        point: Point<f64, Logical>,
    ) -> Option<(WlSurface, Point<f64, Logical>)> {
        let client = self.clients.get(id)?;
        let root = client.kind.wl_surface()?;
        let geom = if client.kind.is_unmanaged() {
            client.kind.geometry()
        } else {
            client.geom
        };

        for (popup, offset) in PopupManager::popups_for_surface(&root) {
            let popup_loc = geom.loc + offset - popup.geometry().loc;
            if let Some((surface, loc)) = under_from_surface_tree(
                popup.wl_surface(),
                point,
                popup_loc,
                WindowSurfaceType::ALL,
            ) {
                return Some((surface, loc.to_f64()));
            }
        }
        under_from_surface_tree(&root, point, geom.loc, WindowSurfaceType::ALL)
            .map(|(surface, loc)| (surface, loc.to_f64()))
    }

    fn clamp_coords(&self, pos: Point<f64, Logical>) -> Point<f64, Logical> {
        if self.sgeom.size.w == 0 || self.sgeom.size.h == 0 {
            return pos;
        }
        let (x, y) = pos.into();
        let clamped_x = x.clamp(
            self.sgeom.loc.x as f64,
            (self.sgeom.loc.x + self.sgeom.size.w) as f64 - 1.0,
        );
        let clamped_y = y.clamp(
            self.sgeom.loc.y as f64,
            (self.sgeom.loc.y + self.sgeom.size.h) as f64 - 1.0,
        );
        (clamped_x, clamped_y).into()
    }
}
