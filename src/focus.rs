use smithay::{
    input::pointer::MotionEvent,
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Point},
};

use crate::{
    SERIAL_COUNTER,
    client::{ClientId, attach_front},
    monitor::MonitorId,
    state::State,
};

impl State {
    /// First client in focus order that is visible on `m`.
    pub fn focustop(&self, m: MonitorId) -> Option<ClientId> {
        self.fstack.iter().copied().find(|&id| self.visibleon(id, m))
    }

    /// The selected client: the focus-stack top, iff it is visible on
    /// the selected monitor.
    pub fn selclient(&self) -> Option<ClientId> {
        let selmon = self.selmon?;
        let front = *self.fstack.first()?;
        self.visibleon(front, selmon).then_some(front)
    }

    /// Hand keyboard focus to a client (or clear it), keeping the
    /// focus stack, the selected monitor, the z-order and both shells'
    /// activated flags in agreement.
    pub fn focusclient(&mut self, target: Option<ClientId>, lift: bool) {
        if let (Some(id), true) = (target, lift) {
            attach_front(&mut self.stack, id);
        }

        let keyboard = self.seat.get_keyboard();
        let old = keyboard.as_ref().and_then(|kb| kb.current_focus());
        let new_surface = target
            .and_then(|id| self.clients.get(id))
            .and_then(|client| client.kind.wl_surface());

        if target.is_some() && new_surface.is_some() && new_surface == old {
            return;
        }

        if let Some(id) = target {
            attach_front(&mut self.fstack, id);
            if let Some(m) = self.clients.get(id).and_then(|client| client.mon) {
                self.selmon = Some(m);
            }
        }

        if let Some(old_surface) = old.as_ref() {
            if new_surface.as_ref() != Some(old_surface) {
                if let Some(previous) = self.clients.by_wl_surface(old_surface) {
                    if let Some(client) = self.clients.get(previous) {
                        client.kind.set_activated(false);
                    }
                }
            }
        }

        let Some(keyboard) = keyboard else {
            return;
        };
        let serial = SERIAL_COUNTER.next_serial();
        match (target, new_surface) {
            (Some(id), Some(surface)) => {
                keyboard.set_focus(self, Some(surface), serial);
                if let Some(client) = self.clients.get(id) {
                    client.kind.set_activated(true);
                }
            }
            _ => keyboard.set_focus(self, None, serial),
        }
    }

    /// Focus the next or previous visible client in tiling order on
    /// the selected monitor, wrapping around the list.
    pub fn focusstack(&mut self, dir: i32) {
        let Some(sel) = self.selclient() else {
            return;
        };
        let Some(selmon) = self.selmon else {
            return;
        };
        let Some(at) = self.tiling.iter().position(|&id| id == sel) else {
            return;
        };
        let len = self.tiling.len();
        let mut next = sel;
        for step in 1..=len {
            let index = if dir > 0 {
                (at + step) % len
            } else {
                (at + 2 * len - step) % len
            };
            let candidate = self.tiling[index];
            if self.visibleon(candidate, selmon) {
                next = candidate;
                break;
            }
        }
        self.focusclient(Some(next), true);
    }

    /// Rotate the selected monitor through the ring until it lands on
    /// an enabled output, then focus whatever is on top there.
    pub fn focusmon(&mut self, dir: i32) {
        if self.mons.ring.is_empty() {
            return;
        }
        for _ in 0..self.mons.ring.len() {
            let Some(next) = self.dirtomon(dir) else {
                break;
            };
            self.selmon = Some(next);
            if self.mons.get(next).is_some_and(|m| m.enabled) {
                break;
            }
        }
        let top = self.selmon.and_then(|m| self.focustop(m));
        self.focusclient(top, true);
    }

    /// Route pointer focus to a surface. The seat handles the
    /// enter/motion distinction; unmanaged X11 surfaces get pointer
    /// events but never keyboard focus.
    pub fn pointerfocus(
        &mut self,
        target: Option<ClientId>,
        under: Option<(WlSurface, Point<f64, Logical>)>,
        time: u32,
    ) {
        let under = under.or_else(|| {
            let id = target?;
            let client = self.clients.get(id)?;
            let surface = client.kind.wl_surface()?;
            Some((surface, client.geom.loc.to_f64()))
        });

        let pointer = self.pointer.clone();
        let serial = SERIAL_COUNTER.next_serial();
        pointer.motion(
            self,
            under,
            &MotionEvent {
                location: self.pointer_location,
                serial,
                time,
            },
        );

        if let Some(id) = target {
            let unmanaged = self
                .clients
                .get(id)
                .map(|client| client.kind.is_unmanaged())
                .unwrap_or(true);
            if !unmanaged {
                self.focusclient(Some(id), false);
            }
        }
    }
}
