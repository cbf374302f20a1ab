use smithay::{
    delegate_xwayland_shell,
    utils::{Logical, Rectangle},
    wayland::xwayland_shell::{XWaylandShellHandler, XWaylandShellState},
    xwayland::{
        X11Surface, X11Wm, XwmHandler,
        xwm::{Reorder, ResizeEdge, X11Window, XwmId},
    },
};

use crate::{
    client::{Client, ClientKind},
    state::State,
};

impl XWaylandShellHandler for State {
    fn xwayland_shell_state(&mut self) -> &mut XWaylandShellState {
        &mut self.xwayland_shell_state
    }
}

delegate_xwayland_shell!(State);

impl XwmHandler for State {
    fn xwm_state(&mut self, _xwm: XwmId) -> &mut X11Wm {
        self.xwm.as_mut().unwrap()
    }

    fn new_window(&mut self, _xwm: XwmId, window: X11Surface) {
        let id = self
            .clients
            .insert(Client::new(ClientKind::X11Managed(window)));
        tracing::debug!(?id, "new x11 window");
    }

    fn new_override_redirect_window(&mut self, _xwm: XwmId, window: X11Surface) {
        let id = self
            .clients
            .insert(Client::new(ClientKind::X11Unmanaged(window)));
        tracing::debug!(?id, "new override-redirect x11 window");
    }

    fn map_window_request(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Err(err) = window.set_mapped(true) {
            tracing::warn!(?err, "failed to map x11 window");
        }
        if let Some(id) = self.clients.by_x11_surface(&window) {
            self.map_client(id);
        }
    }

    fn mapped_override_redirect_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.clients.by_x11_surface(&window) {
            self.map_client(id);
        }
    }

    fn unmapped_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.clients.by_x11_surface(&window) {
            self.unmap_client(id);
        }
    }

    fn destroyed_window(&mut self, _xwm: XwmId, window: X11Surface) {
        if let Some(id) = self.clients.by_x11_surface(&window) {
            tracing::debug!(?id, "x11 window destroyed");
            self.remove_client(id);
        }
    }

    fn configure_request(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        x: Option<i32>,
        y: Option<i32>,
        w: Option<u32>,
        h: Option<u32>,
        _reorder: Option<Reorder>,
    ) {
        // grant what the client asked for; the next arrange overrides
        // it for tiled windows anyway
        let mut geo = window.geometry();
        if let Some(x) = x {
            geo.loc.x = x;
        }
        if let Some(y) = y {
            geo.loc.y = y;
        }
        if let Some(w) = w {
            geo.size.w = w as i32;
        }
        if let Some(h) = h {
            geo.size.h = h as i32;
        }
        if let Err(err) = window.configure(geo) {
            tracing::warn!(?err, "failed to configure x11 window");
        }
    }

    fn configure_notify(
        &mut self,
        _xwm: XwmId,
        window: X11Surface,
        geometry: Rectangle<i32, Logical>,
        _above: Option<X11Window>,
    ) {
        // unmanaged windows place themselves
        if let Some(id) = self.clients.by_x11_surface(&window) {
            if let Some(client) = self.clients.get_mut(id) {
                if client.kind.is_unmanaged() {
                    client.geom = geometry;
                }
            }
        }
    }

    fn resize_request(
        &mut self,
        _xwm: XwmId,
        _window: X11Surface,
        _button: u32,
        _resize_edge: ResizeEdge,
    ) {
    }

    fn move_request(&mut self, _xwm: XwmId, _window: X11Surface, _button: u32) {}
}
