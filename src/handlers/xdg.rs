use smithay::{
    delegate_xdg_shell,
    desktop::{PopupKind, find_popup_root_surface},
    input::Seat,
    reexports::{
        wayland_protocols::xdg::shell::server::xdg_toplevel,
        wayland_server::protocol::{wl_output, wl_seat, wl_surface::WlSurface},
    },
    utils::{Rectangle, Serial},
    wayland::shell::xdg::{
        Configure, PopupSurface, PositionerState, ToplevelSurface, XdgShellHandler, XdgShellState,
    },
};

use crate::{
    client::{Client, ClientKind},
    state::State,
};

impl XdgShellHandler for State {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        // tiled hints keep clients from drawing shadows around
        // their windows
        surface.with_pending_state(|state| {
            state.states.set(xdg_toplevel::State::TiledLeft);
            state.states.set(xdg_toplevel::State::TiledRight);
            state.states.set(xdg_toplevel::State::TiledTop);
            state.states.set(xdg_toplevel::State::TiledBottom);
        });
        let id = self.clients.insert(Client::new(ClientKind::Xdg(surface)));
        tracing::debug!(?id, "new xdg toplevel");
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        if let Some(id) = self.clients.by_toplevel(&surface) {
            tracing::debug!(?id, "xdg toplevel destroyed");
            self.remove_client(id);
        }
    }

    fn ack_configure(&mut self, surface: WlSurface, configure: Configure) {
        // a pending resize is done once the client acknowledges a
        // serial at least as new as the one we handed out
        if let Configure::Toplevel(configure) = configure {
            if let Some(id) = self.clients.by_wl_surface(&surface) {
                if let Some(client) = self.clients.get_mut(id) {
                    if client
                        .resize
                        .is_some_and(|pending| configure.serial.is_no_older_than(&pending))
                    {
                        client.resize = None;
                    }
                }
            }
        }
    }

    fn fullscreen_request(
        &mut self,
        surface: ToplevelSurface,
        _wl_output: Option<wl_output::WlOutput>,
    ) {
        let Some(id) = self.clients.by_toplevel(&surface) else {
            return;
        };
        let Some(m) = self.clients.get(id).and_then(|client| client.mon) else {
            // not mapped anywhere yet; just acknowledge
            surface.send_configure();
            return;
        };

        // toggling: a second request clears the slot and restores
        // the tiled layout
        let now_fullscreen = {
            let Some(mon) = self.mons.get_mut(m) else {
                return;
            };
            mon.fullscreen = if mon.fullscreen.is_some() { None } else { Some(id) };
            mon.fullscreen.is_some()
        };
        if let Some(client) = self.clients.get(id) {
            client.kind.set_fullscreen(now_fullscreen);
        }
        self.arrange(m);
    }

    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        let Some(id) = self.clients.by_toplevel(&surface) else {
            return;
        };
        let Some(m) = self.clients.get(id).and_then(|client| client.mon) else {
            surface.send_configure();
            return;
        };
        if let Some(mon) = self.mons.get_mut(m) {
            if mon.fullscreen == Some(id) {
                mon.fullscreen = None;
            }
        }
        if let Some(client) = self.clients.get(id) {
            client.kind.set_fullscreen(false);
        }
        self.arrange(m);
    }

    fn new_popup(&mut self, surface: PopupSurface, positioner: PositionerState) {
        let Ok(root) = find_popup_root_surface(&PopupKind::from(surface.clone())) else {
            return;
        };
        if let Some(id) = self.clients.by_wl_surface(&root) {
            if let Some(client) = self.clients.get(id) {
                // constrain against the owning monitor, expressed in
                // parent-local coordinates
                let bounds = client
                    .mon
                    .and_then(|m| self.mons.get(m))
                    .map(|mon| mon.w)
                    .unwrap_or(self.sgeom);
                let target = Rectangle::new(bounds.loc - client.geom.loc, bounds.size);
                surface.with_pending_state(|state| {
                    state.geometry = positioner.get_unconstrained_geometry(target);
                });
            }
        }
        if let Err(err) = self.popups.track_popup(PopupKind::from(surface)) {
            tracing::warn!("failed to track popup: {}", err);
        }
    }

    fn grab(&mut self, surface: PopupSurface, seat: wl_seat::WlSeat, serial: Serial) {
        let Some(seat) = Seat::<State>::from_resource(&seat) else {
            return;
        };
        let kind = PopupKind::Xdg(surface);
        let Ok(root) = find_popup_root_surface(&kind) else {
            return;
        };
        if let Err(err) = self.popups.grab_popup(root, kind, &seat, serial) {
            tracing::warn!("failed to grab popup: {}", err);
        }
    }

    fn reposition_request(
        &mut self,
        surface: PopupSurface,
        positioner: PositionerState,
        token: u32,
    ) {
        surface.with_pending_state(|state| {
            state.geometry = positioner.get_geometry();
            state.positioner = positioner;
        });
        surface.send_repositioned(token);
    }
}

delegate_xdg_shell!(State);
