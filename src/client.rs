use std::collections::HashMap;

use smithay::{
    desktop::utils::bbox_from_surface_tree,
    reexports::{
        wayland_protocols::xdg::shell::server::xdg_toplevel,
        wayland_server::protocol::wl_surface::WlSurface,
    },
    utils::{Logical, Rectangle, Serial},
    wayland::{
        compositor::with_states,
        shell::xdg::{SurfaceCachedState, ToplevelSurface, XdgToplevelSurfaceData},
    },
};

#[cfg(feature = "xwayland")]
use smithay::xwayland::X11Surface;

use crate::monitor::MonitorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

/// The two shells a toplevel window can come from. Everything outside
/// this module stays polymorphic over the small adapter below instead
/// of branching on the backing shell.
pub enum ClientKind {
    Xdg(ToplevelSurface),
    #[cfg(feature = "xwayland")]
    X11Managed(X11Surface),
    #[cfg(feature = "xwayland")]
    X11Unmanaged(X11Surface),
}

impl ClientKind {
    pub fn wl_surface(&self) -> Option<WlSurface> {
        match self {
            ClientKind::Xdg(toplevel) => Some(toplevel.wl_surface().clone()),
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                surface.wl_surface()
            }
        }
    }

    /// For XDG the toolkit-computed window geometry, for X11 whatever
    /// the X server last reported.
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        match self {
            ClientKind::Xdg(toplevel) => {
                let surface = toplevel.wl_surface();
                with_states(surface, |states| {
                    states.cached_state.get::<SurfaceCachedState>().current().geometry
                })
                .unwrap_or_else(|| bbox_from_surface_tree(surface, (0, 0)))
            }
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                surface.geometry()
            }
        }
    }

    pub fn app_id(&self) -> Option<String> {
        match self {
            ClientKind::Xdg(toplevel) => with_states(toplevel.wl_surface(), |states| {
                states
                    .data_map
                    .get::<XdgToplevelSurfaceData>()
                    .and_then(|data| data.lock().ok()?.app_id.clone())
            }),
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                Some(surface.class()).filter(|class| !class.is_empty())
            }
        }
    }

    pub fn title(&self) -> Option<String> {
        match self {
            ClientKind::Xdg(toplevel) => with_states(toplevel.wl_surface(), |states| {
                states
                    .data_map
                    .get::<XdgToplevelSurfaceData>()
                    .and_then(|data| data.lock().ok()?.title.clone())
            }),
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                Some(surface.title()).filter(|title| !title.is_empty())
            }
        }
    }

    /// Push a new geometry to the client. XDG only takes a size and
    /// answers with a configure serial; XWayland windows live in
    /// absolute coordinates, so the position travels along.
    pub fn send_geometry(&self, geom: Rectangle<i32, Logical>) -> Option<Serial> {
        match self {
            ClientKind::Xdg(toplevel) => {
                toplevel.with_pending_state(|state| {
                    state.size = Some(geom.size);
                });
                toplevel.send_pending_configure()
            }
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                if let Err(err) = surface.configure(geom) {
                    tracing::warn!(?err, "failed to configure X11 surface");
                }
                None
            }
        }
    }

    pub fn set_activated(&self, activated: bool) {
        match self {
            ClientKind::Xdg(toplevel) => {
                toplevel.with_pending_state(|state| {
                    if activated {
                        state.states.set(xdg_toplevel::State::Activated);
                    } else {
                        state.states.unset(xdg_toplevel::State::Activated);
                    }
                });
                toplevel.send_pending_configure();
            }
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                if let Err(err) = surface.set_activated(activated) {
                    tracing::warn!(?err, "failed to activate X11 surface");
                }
            }
        }
    }

    pub fn set_fullscreen(&self, fullscreen: bool) {
        match self {
            ClientKind::Xdg(toplevel) => {
                toplevel.with_pending_state(|state| {
                    if fullscreen {
                        state.states.set(xdg_toplevel::State::Fullscreen);
                    } else {
                        state.states.unset(xdg_toplevel::State::Fullscreen);
                    }
                });
                toplevel.send_pending_configure();
            }
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                if let Err(err) = surface.set_fullscreen(fullscreen) {
                    tracing::warn!(?err, "failed to set X11 fullscreen state");
                }
            }
        }
    }

    /// Polite close request; the client decides when to actually go.
    pub fn send_close(&self) {
        match self {
            ClientKind::Xdg(toplevel) => toplevel.send_close(),
            #[cfg(feature = "xwayland")]
            ClientKind::X11Managed(surface) | ClientKind::X11Unmanaged(surface) => {
                if let Err(err) = surface.close() {
                    tracing::warn!(?err, "failed to close X11 surface");
                }
            }
        }
    }

    pub fn is_x11(&self) -> bool {
        #[cfg(feature = "xwayland")]
        if matches!(self, ClientKind::X11Managed(_) | ClientKind::X11Unmanaged(_)) {
            return true;
        }
        false
    }

    pub fn is_unmanaged(&self) -> bool {
        #[cfg(feature = "xwayland")]
        if matches!(self, ClientKind::X11Unmanaged(_)) {
            return true;
        }
        false
    }
}

/// One toplevel window. Owned by the registry; the lists below hold
/// non-owning ids.
pub struct Client {
    pub kind: ClientKind,
    /// Layout-relative rectangle, kept ≥ 1×1.
    pub geom: Rectangle<i32, Logical>,
    pub mon: Option<MonitorId>,
    pub tags: u32,
    /// Configure serial of a pending resize (XDG only), cleared once
    /// the client acknowledges a serial at least as new.
    pub resize: Option<Serial>,
    pub mapped: bool,
}

impl Client {
    pub fn new(kind: ClientKind) -> Self {
        Self {
            kind,
            geom: Rectangle::default(),
            mon: None,
            tags: 0,
            resize: None,
            mapped: false,
        }
    }

    pub fn is_floating(&self) -> bool {
        self.kind
            .app_id()
            .is_some_and(|id| crate::config::FLOATING_APP_IDS.contains(&id.as_str()))
    }
}

#[derive(Default)]
pub struct ClientStore {
    next: u64,
    map: HashMap<ClientId, Client>,
}

impl ClientStore {
    pub fn insert(&mut self, client: Client) -> ClientId {
        let id = ClientId(self.next);
        self.next += 1;
        self.map.insert(id, client);
        id
    }

    pub fn get(&self, id: ClientId) -> Option<&Client> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.map.get_mut(&id)
    }

    pub fn remove(&mut self, id: ClientId) -> Option<Client> {
        self.map.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &Client)> {
        self.map.iter().map(|(id, client)| (*id, client))
    }

    /// Client whose root surface backs the given wl_surface.
    pub fn by_wl_surface(&self, surface: &WlSurface) -> Option<ClientId> {
        self.map
            .iter()
            .find(|(_, c)| c.kind.wl_surface().as_ref() == Some(surface))
            .map(|(id, _)| *id)
    }

    pub fn by_toplevel(&self, toplevel: &ToplevelSurface) -> Option<ClientId> {
        self.map
            .iter()
            .find(|(_, c)| matches!(&c.kind, ClientKind::Xdg(t) if t == toplevel))
            .map(|(id, _)| *id)
    }

    #[cfg(feature = "xwayland")]
    pub fn by_x11_surface(&self, surface: &X11Surface) -> Option<ClientId> {
        self.map
            .iter()
            .find(|(_, c)| match &c.kind {
                ClientKind::X11Managed(s) | ClientKind::X11Unmanaged(s) => s == surface,
                _ => false,
            })
            .map(|(id, _)| *id)
    }
}

/// The list primitives behind the four ordered client lists. They
/// keep the intrusive-list operations of the window model (move to
/// front on focus, drop on unmap) while owning nothing.
pub fn detach(list: &mut Vec<ClientId>, id: ClientId) {
    list.retain(|&entry| entry != id);
}

pub fn attach_front(list: &mut Vec<ClientId>, id: ClientId) {
    detach(list, id);
    list.insert(0, id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<ClientId> {
        raw.iter().map(|&n| ClientId(n)).collect()
    }

    #[test]
    fn attach_front_moves_existing_entries() {
        let mut list = ids(&[1, 2, 3]);
        attach_front(&mut list, ClientId(3));
        assert_eq!(list, ids(&[3, 1, 2]));
        attach_front(&mut list, ClientId(3));
        assert_eq!(list, ids(&[3, 1, 2]));
    }

    #[test]
    fn attach_front_inserts_new_entries() {
        let mut list = ids(&[1, 2]);
        attach_front(&mut list, ClientId(9));
        assert_eq!(list, ids(&[9, 1, 2]));
    }

    #[test]
    fn detach_is_idempotent() {
        let mut list = ids(&[1, 2, 3]);
        detach(&mut list, ClientId(2));
        assert_eq!(list, ids(&[1, 3]));
        detach(&mut list, ClientId(2));
        assert_eq!(list, ids(&[1, 3]));
    }
}
