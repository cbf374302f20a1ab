use std::time::Duration;

use smithay::{
    backend::renderer::{
        Color32F,
        element::{
            Kind,
            surface::{WaylandSurfaceRenderElement, render_elements_from_surface_tree},
        },
        glow::GlowRenderer,
    },
    desktop::{PopupManager, utils::send_frames_surface_tree},
    reexports::wayland_server::protocol::wl_surface::WlSurface,
    utils::{Logical, Physical, Point, Rectangle},
};

use crate::{client::ClientId, state::State};

static CLEAR_COLOR: Color32F = Color32F::new(0.0, 0.0, 0.0, 1.0);

/// Everything the frame pass needs to know about one surface tree:
/// where it goes in output-local coordinates and how opaque it is.
struct DrawEntry {
    surface: WlSurface,
    loc: Point<i32, Physical>,
    alpha: f32,
}

impl State {
    /// One frame for the winit output: cull against the monitor,
    /// order the element list front-to-back (independents above the
    /// stack, popups above their toplevel), draw, then send
    /// frame-done to every surface that actually produced pixels.
    pub fn render_winit_frame(&mut self) {
        let Some(output) = self.backend.as_ref().map(|winit| winit.output.clone()) else {
            return;
        };
        let Some(mid) = self.mons.by_output(&output) else {
            return;
        };
        let Some(mon) = self.mons.get(mid) else {
            return;
        };
        let area = mon.m;
        let focused = self.focused_client();

        let mut entries: Vec<DrawEntry> = Vec::new();
        #[cfg(feature = "xwayland")]
        for &id in &self.independents {
            self.push_entries(id, area, focused, &mut entries);
        }
        for &id in &self.stack {
            let Some(client) = self.clients.get(id) else {
                continue;
            };
            let Some(m) = client.mon else {
                continue;
            };
            if !self.visibleon(id, m) {
                continue;
            }
            self.push_entries(id, area, focused, &mut entries);
        }

        let frame_targets;
        let Some(winit) = self.backend.as_mut() else {
            return;
        };
        let size = winit.backend.window_size();
        let damage = Rectangle::from_size(size);
        {
            let (renderer, mut framebuffer) = match winit.backend.bind() {
                Ok(bound) => bound,
                Err(err) => {
                    tracing::warn!(?err, "failed to bind the render target, dropping frame");
                    return;
                }
            };

            let mut elements: Vec<WaylandSurfaceRenderElement<GlowRenderer>> = Vec::new();
            let mut rendered: Vec<WlSurface> = Vec::new();
            for entry in &entries {
                let before = elements.len();
                elements.extend(render_elements_from_surface_tree(
                    renderer,
                    &entry.surface,
                    entry.loc,
                    1.0,
                    entry.alpha,
                    Kind::Unspecified,
                ));
                // a surface without a committed buffer draws nothing
                // and gets no frame callback
                if elements.len() > before {
                    rendered.push(entry.surface.clone());
                }
            }

            if let Err(err) =
                winit
                    .damage_tracker
                    .render_output(renderer, &mut framebuffer, 0, &elements, CLEAR_COLOR)
            {
                tracing::warn!(?err, "output render failed, dropping frame");
                return;
            }
            frame_targets = rendered;
        }
        if let Err(err) = winit.backend.submit(Some(&[damage])) {
            tracing::warn!(?err, "failed to submit the frame");
        }

        let time = self.start_time.elapsed();
        for surface in &frame_targets {
            send_frames_surface_tree(surface, &output, time, Some(Duration::ZERO), |_, _| {
                Some(output.clone())
            });
        }

        // full redraw every vsync
        if let Some(winit) = self.backend.as_mut() {
            winit.backend.window().request_redraw();
        }
    }

    fn push_entries(
        &self,
        id: ClientId,
        area: Rectangle<i32, Logical>,
        focused: Option<ClientId>,
        entries: &mut Vec<DrawEntry>,
    ) {
        let Some(client) = self.clients.get(id) else {
            return;
        };
        // independents live wherever the X server put them
        let geom = if client.kind.is_unmanaged() {
            client.kind.geometry()
        } else {
            client.geom
        };
        if !geom.overlaps(area) {
            return;
        }
        let Some(root) = client.kind.wl_surface() else {
            return;
        };
        let alpha = if focused == Some(id) { 1.0 } else { 0.8 };
        let base = geom.loc - area.loc;

        for (popup, offset) in PopupManager::popups_for_surface(&root) {
            let loc = base + offset - popup.geometry().loc;
            entries.push(DrawEntry {
                surface: popup.wl_surface().clone(),
                loc: loc.to_physical(1),
                alpha,
            });
        }
        entries.push(DrawEntry {
            surface: root,
            loc: base.to_physical(1),
            alpha,
        });
    }
}
