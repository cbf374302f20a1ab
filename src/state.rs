use std::{ffi::OsString, time::Instant};

use smithay::{
    desktop::PopupManager,
    input::{
        Seat, SeatState,
        keyboard::XkbConfig,
        pointer::{CursorImageStatus, PointerHandle},
    },
    reexports::{
        calloop::{Interest, LoopHandle, LoopSignal, Mode, PostAction, generic::Generic},
        wayland_server::{
            Display, DisplayHandle,
            backend::{ClientData, ClientId as WaylandClientId, DisconnectReason},
        },
    },
    utils::{Logical, Point, Rectangle},
    wayland::{
        compositor::{CompositorClientState, CompositorState},
        output::OutputManagerState,
        selection::{
            data_device::DataDeviceState, primary_selection::PrimarySelectionState,
            wlr_data_control::DataControlState,
        },
        shell::xdg::XdgShellState,
        shm::ShmState,
        viewporter::ViewporterState,
    },
};

#[cfg(feature = "xwayland")]
use smithay::{
    wayland::xwayland_shell::XWaylandShellState,
    xwayland::{X11Wm, XWayland, XWaylandEvent},
};

use crate::{
    backend::winit::WinitData,
    client::{ClientId, ClientStore, attach_front, detach},
    config,
    monitor::{MonitorId, MonitorStore},
};

/// The grab state of a pointer drag: which client follows the cursor
/// and where inside it the grab started.
pub struct Drag {
    pub client: ClientId,
    pub grab: Point<f64, Logical>,
}

pub struct State {
    pub loop_handle: LoopHandle<'static, State>,
    pub loop_signal: LoopSignal,
    pub display_handle: DisplayHandle,
    pub start_time: Instant,
    pub socket_name: Option<OsString>,

    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub seat_state: SeatState<State>,
    pub data_device_state: DataDeviceState,
    pub primary_selection_state: PrimarySelectionState,
    pub data_control_state: DataControlState,
    pub viewporter_state: ViewporterState,
    pub seat: Seat<State>,
    pub pointer: PointerHandle<State>,
    pub popups: PopupManager,
    pub cursor_status: CursorImageStatus,

    /// The window model: one owning registry, four ordered lists of
    /// ids. `tiling` is tiling order (front is the master slot),
    /// `fstack` focus order (most recent first), `stack` the z-order
    /// (top first), `independents` the X11 override-redirect set.
    pub clients: ClientStore,
    pub tiling: Vec<ClientId>,
    pub fstack: Vec<ClientId>,
    pub stack: Vec<ClientId>,
    pub independents: Vec<ClientId>,

    pub mons: MonitorStore,
    pub selmon: Option<MonitorId>,
    /// Union of all laid-out monitor rectangles; bounds interactive
    /// moves.
    pub sgeom: Rectangle<i32, Logical>,

    pub pointer_location: Point<f64, Logical>,
    pub drag: Option<Drag>,

    pub backend: Option<WinitData>,

    #[cfg(feature = "xwayland")]
    pub xwayland_shell_state: XWaylandShellState,
    #[cfg(feature = "xwayland")]
    pub xwm: Option<X11Wm>,
    #[cfg(feature = "xwayland")]
    pub xdisplay: Option<u32>,
}

impl State {
    pub fn new(
        loop_handle: LoopHandle<'static, State>,
        loop_signal: LoopSignal,
        display: Display<Self>,
    ) -> Self {
        let start_time = Instant::now();
        let dh = display.handle();

        let compositor_state = CompositorState::new::<Self>(&dh);
        let xdg_shell_state = XdgShellState::new::<Self>(&dh);
        let shm_state = ShmState::new::<Self>(&dh, vec![]);
        let output_manager_state = OutputManagerState::new_with_xdg_output::<Self>(&dh);
        let data_device_state = DataDeviceState::new::<Self>(&dh);
        let primary_selection_state = PrimarySelectionState::new::<Self>(&dh);
        let data_control_state =
            DataControlState::new::<Self, _>(&dh, Some(&primary_selection_state), |_| true);
        let viewporter_state = ViewporterState::new::<Self>(&dh);

        let mut seat_state = SeatState::new();
        let mut seat = seat_state.new_wl_seat(&dh, "seat0");
        seat.add_keyboard(
            XkbConfig::default(),
            config::REPEAT_DELAY,
            config::REPEAT_RATE,
        )
        .expect("failed to compile the default keymap");
        let pointer = seat.add_pointer();

        #[cfg(feature = "xwayland")]
        let xwayland_shell_state = XWaylandShellState::new::<Self>(&dh);

        loop_handle
            .insert_source(
                Generic::new(display, Interest::READ, Mode::Level),
                |_, display, state| {
                    unsafe { display.get_mut().dispatch_clients(state).unwrap() };
                    Ok(PostAction::Continue)
                },
            )
            .expect("failed to init the wayland display source");

        Self {
            loop_handle,
            loop_signal,
            display_handle: dh,
            start_time,
            socket_name: None,

            compositor_state,
            xdg_shell_state,
            shm_state,
            output_manager_state,
            seat_state,
            data_device_state,
            primary_selection_state,
            data_control_state,
            viewporter_state,
            seat,
            pointer,
            popups: PopupManager::default(),
            cursor_status: CursorImageStatus::default_named(),

            clients: ClientStore::default(),
            tiling: Vec::new(),
            fstack: Vec::new(),
            stack: Vec::new(),
            independents: Vec::new(),

            mons: MonitorStore::default(),
            selmon: None,
            sgeom: Rectangle::default(),

            pointer_location: (0.0, 0.0).into(),
            drag: None,

            backend: None,

            #[cfg(feature = "xwayland")]
            xwayland_shell_state,
            #[cfg(feature = "xwayland")]
            xwm: None,
            #[cfg(feature = "xwayland")]
            xdisplay: None,
        }
    }

    pub fn visibleon(&self, id: ClientId, m: MonitorId) -> bool {
        let Some(client) = self.clients.get(id) else {
            return false;
        };
        let Some(mon) = self.mons.get(m) else {
            return false;
        };
        client.mon == Some(m) && (client.tags & mon.visible_tags()) != 0
    }

    /// The client a render pass treats as focused.
    pub fn focused_client(&self) -> Option<ClientId> {
        self.fstack.first().copied()
    }

    /// Core relocation primitive: move a client to another monitor
    /// (or off every monitor), carrying the fullscreen slot along and
    /// re-arranging both ends.
    pub fn setmon(&mut self, id: ClientId, m: Option<MonitorId>, newtags: u32) {
        let Some(client) = self.clients.get(id) else {
            return;
        };
        if client.mon == m {
            return;
        }
        let oldmon = client.mon;
        let surface = client.kind.wl_surface();

        let mut was_fullscreen = false;
        if let Some(old) = oldmon {
            if let Some(mon) = self.mons.get_mut(old) {
                if mon.fullscreen == Some(id) {
                    was_fullscreen = true;
                    mon.fullscreen = None;
                }
            }
        }

        if let Some(client) = self.clients.get_mut(id) {
            client.mon = m;
        }

        if let Some(old) = oldmon {
            if let (Some(mon), Some(surface)) = (self.mons.get(old), surface.as_ref()) {
                mon.output.leave(surface);
            }
            self.arrange(old);
        }

        if let Some(new) = m {
            if let Some(mon) = self.mons.get(new) {
                let area = mon.m;
                let tags = if newtags != 0 {
                    newtags & config::TAGMASK
                } else {
                    mon.visible_tags()
                };
                if let Some(surface) = surface.as_ref() {
                    mon.output.enter(surface);
                }
                if let Some(client) = self.clients.get_mut(id) {
                    client.tags = tags;
                    client.geom = crate::layout::applybounds(client.geom, area);
                }
                if was_fullscreen {
                    let previous = self.mons.get(new).and_then(|mon| mon.fullscreen);
                    if let Some(prev) = previous {
                        if let Some(prev_client) = self.clients.get(prev) {
                            prev_client.kind.set_fullscreen(false);
                        }
                    }
                    if let Some(mon) = self.mons.get_mut(new) {
                        mon.fullscreen = Some(id);
                    }
                }
            }
            self.arrange(new);
        }

        let top = self.selmon.and_then(|sel| self.focustop(sel));
        self.focusclient(top, true);
    }

    /// A surface is ready to be shown: put it into the window model.
    pub fn map_client(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(id) else {
            return;
        };
        if client.mapped {
            return;
        }
        client.mapped = true;
        client.geom = client.kind.geometry();

        if client.kind.is_unmanaged() {
            attach_front(&mut self.independents, id);
            return;
        }

        attach_front(&mut self.tiling, id);
        attach_front(&mut self.fstack, id);
        attach_front(&mut self.stack, id);
        let target = self.selmon;
        self.setmon(id, target, 0);
    }

    /// The surface went away (but may come back): take it out of the
    /// window model and re-arrange what it left behind.
    pub fn unmap_client(&mut self, id: ClientId) {
        let Some(client) = self.clients.get_mut(id) else {
            return;
        };
        if !client.mapped {
            return;
        }
        client.mapped = false;

        if client.kind.is_unmanaged() {
            detach(&mut self.independents, id);
            return;
        }

        detach(&mut self.tiling, id);
        self.setmon(id, None, 0);
        detach(&mut self.fstack, id);
        detach(&mut self.stack, id);
    }

    /// Final teardown of a client record.
    pub fn remove_client(&mut self, id: ClientId) {
        self.unmap_client(id);
        detach(&mut self.tiling, id);
        detach(&mut self.fstack, id);
        detach(&mut self.stack, id);
        detach(&mut self.independents, id);
        if self.drag.as_ref().is_some_and(|drag| drag.client == id) {
            self.drag = None;
        }
        for mid in self.mons.ring.clone() {
            if let Some(mon) = self.mons.get_mut(mid) {
                if mon.fullscreen == Some(id) {
                    mon.fullscreen = None;
                }
            }
        }
        self.clients.remove(id);
    }

    #[cfg(feature = "xwayland")]
    pub fn start_xwayland(&mut self) {
        use std::process::Stdio;

        let (xwayland, x11_client) = match XWayland::spawn(
            &self.display_handle,
            None,
            std::iter::empty::<(String, String)>(),
            true,
            Stdio::null(),
            Stdio::null(),
            |_| (),
        ) {
            Ok(spawned) => spawned,
            Err(err) => {
                tracing::warn!(?err, "failed to start Xwayland, running without X11 support");
                return;
            }
        };

        let inserted = self
            .loop_handle
            .insert_source(xwayland, move |event, _, state| match event {
                XWaylandEvent::Ready {
                    x11_socket,
                    display_number,
                } => {
                    match X11Wm::start_wm(state.loop_handle.clone(), x11_socket, x11_client.clone())
                    {
                        Ok(wm) => {
                            state.xwm = Some(wm);
                            state.xdisplay = Some(display_number);
                            unsafe {
                                std::env::set_var("DISPLAY", format!(":{}", display_number));
                            }
                            tracing::info!(display_number, "Xwayland is ready");
                        }
                        Err(err) => {
                            tracing::warn!(?err, "failed to attach the X11 window manager");
                        }
                    }
                }
                XWaylandEvent::Error => {
                    tracing::warn!("Xwayland exited unexpectedly");
                    state.xwm = None;
                }
            });
        if let Err(err) = inserted {
            tracing::warn!(?err, "failed to insert the Xwayland event source");
        }
    }
}

#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, _client_id: WaylandClientId) {}
    fn disconnected(&self, _client_id: WaylandClientId, _reason: DisconnectReason) {}
}
