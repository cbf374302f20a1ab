use smithay::utils::{Logical, Rectangle};

use crate::{client::ClientId, monitor::MonitorId, state::State};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Tiled,
    Floating,
    Fullscreen,
}

/// Clamp a rectangle into `bbox`: never smaller than 1×1, and shifted
/// to the nearest inside edge when it would fall out entirely.
pub fn applybounds(
    geom: Rectangle<i32, Logical>,
    bbox: Rectangle<i32, Logical>,
) -> Rectangle<i32, Logical> {
    let mut geom = geom;
    geom.size.w = geom.size.w.max(1);
    geom.size.h = geom.size.h.max(1);

    if geom.loc.x >= bbox.loc.x + bbox.size.w {
        geom.loc.x = bbox.loc.x + bbox.size.w - geom.size.w;
    }
    if geom.loc.y >= bbox.loc.y + bbox.size.h {
        geom.loc.y = bbox.loc.y + bbox.size.h - geom.size.h;
    }
    if geom.loc.x + geom.size.w <= bbox.loc.x {
        geom.loc.x = bbox.loc.x;
    }
    if geom.loc.y + geom.size.h <= bbox.loc.y {
        geom.loc.y = bbox.loc.y;
    }
    geom
}

/// Master-stack placement over one monitor, pure in its inputs:
/// `m` the monitor area, `w` the window area, `items` the visible
/// clients in tiling order. A fullscreen client takes the whole
/// monitor and everything else keeps its prior geometry; floating
/// clients get a fixed side rectangle and do not count toward the
/// tile split.
pub fn plan<T: Copy>(
    m: Rectangle<i32, Logical>,
    w: Rectangle<i32, Logical>,
    items: &[(T, Slot)],
) -> Vec<(T, Rectangle<i32, Logical>)> {
    if let Some((id, _)) = items.iter().find(|(_, slot)| *slot == Slot::Fullscreen) {
        return vec![(*id, applybounds(m, m))];
    }

    let n = items.iter().filter(|(_, slot)| *slot == Slot::Tiled).count() as i32;
    let mw = if n > 1 { w.size.w / 2 } else { w.size.w };
    let mut planned = Vec::with_capacity(items.len());
    let mut i = 0;
    let mut ty = 0;
    for (id, slot) in items {
        let rect = match slot {
            Slot::Fullscreen => continue,
            Slot::Floating => Rectangle::new((w.loc.x + 640, 360).into(), (640, 360).into()),
            Slot::Tiled => {
                let rect = if i == 0 {
                    Rectangle::new(w.loc, (mw, w.size.h).into())
                } else {
                    // progressive division, the remainder lands on the
                    // last stack slot
                    let h = (w.size.h - ty) / (n - i);
                    let rect = Rectangle::new(
                        (w.loc.x + mw, w.loc.y + ty).into(),
                        (w.size.w - mw, h).into(),
                    );
                    ty += h;
                    rect
                };
                i += 1;
                rect
            }
        };
        planned.push((*id, applybounds(rect, m)));
    }
    planned
}

impl State {
    /// Recompute and push geometry for every client visible on `m`.
    pub fn arrange(&mut self, m: MonitorId) {
        let Some(mon) = self.mons.get(m) else {
            return;
        };
        let (area_m, area_w) = (mon.m, mon.w);
        let fullscreen = mon.fullscreen;
        let visible = mon.visible_tags();

        let items: Vec<(ClientId, Slot)> = self
            .tiling
            .iter()
            .copied()
            .filter_map(|id| {
                let client = self.clients.get(id)?;
                if client.mon != Some(m) || client.tags & visible == 0 {
                    return None;
                }
                let slot = if fullscreen == Some(id) {
                    Slot::Fullscreen
                } else if client.is_floating() {
                    Slot::Floating
                } else {
                    Slot::Tiled
                };
                Some((id, slot))
            })
            .collect();
        if items.is_empty() {
            return;
        }

        for (id, rect) in plan(area_m, area_w, &items) {
            self.resize_client(id, rect, false);
        }
    }

    /// Set a client's geometry. Interactive moves are bounded by the
    /// whole layout, everything else by the owning monitor.
    pub fn resize_client(
        &mut self,
        id: ClientId,
        rect: Rectangle<i32, Logical>,
        interact: bool,
    ) {
        let bbox = if interact {
            self.sgeom
        } else {
            self.clients
                .get(id)
                .and_then(|c| c.mon)
                .and_then(|m| self.mons.get(m))
                .map(|m| m.m)
                .unwrap_or(self.sgeom)
        };
        let Some(client) = self.clients.get_mut(id) else {
            return;
        };
        client.geom = applybounds(rect, bbox);
        // the toolkit treats an unchanged size as a no-op and hands
        // out no serial for it
        if let Some(serial) = client.kind.send_geometry(client.geom) {
            client.resize = Some(serial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Logical> {
        Rectangle::new((x, y).into(), (w, h).into())
    }

    fn full_hd() -> Rectangle<i32, Logical> {
        rect(0, 0, 1920, 1080)
    }

    #[test]
    fn two_windows_split_the_monitor_in_half() {
        let area = full_hd();
        let planned = plan(area, area, &[(0usize, Slot::Tiled), (1, Slot::Tiled)]);
        assert_eq!(planned, vec![(0, rect(0, 0, 960, 1080)), (1, rect(960, 0, 960, 1080))]);
    }

    #[test]
    fn promoting_the_stack_window_swaps_the_halves() {
        let area = full_hd();
        let planned = plan(area, area, &[(1usize, Slot::Tiled), (0, Slot::Tiled)]);
        assert_eq!(planned[0], (1, rect(0, 0, 960, 1080)));
        assert_eq!(planned[1], (0, rect(960, 0, 960, 1080)));
    }

    #[test]
    fn a_single_window_fills_the_window_area() {
        let area = full_hd();
        let planned = plan(area, area, &[(7usize, Slot::Tiled)]);
        assert_eq!(planned, vec![(7, area)]);
    }

    #[test]
    fn stack_partitions_the_right_half_exactly() {
        let area = rect(0, 0, 1920, 1000);
        let items: Vec<(usize, Slot)> = (0..4).map(|i| (i, Slot::Tiled)).collect();
        let planned = plan(area, area, &items);

        assert_eq!(planned[0].1, rect(0, 0, 960, 1000));
        // 1000 / 3 leaves a remainder, absorbed by the last slot
        assert_eq!(planned[1].1, rect(960, 0, 960, 333));
        assert_eq!(planned[2].1, rect(960, 333, 960, 333));
        assert_eq!(planned[3].1, rect(960, 666, 960, 334));
        let total: i32 = planned[1..].iter().map(|(_, r)| r.size.h).sum();
        assert_eq!(total, 1000);
    }

    #[test]
    fn floating_clients_do_not_count_toward_the_split() {
        let area = full_hd();
        let planned = plan(
            area,
            area,
            &[(0usize, Slot::Tiled), (1, Slot::Floating), (2, Slot::Tiled)],
        );
        assert_eq!(planned[0].1, rect(0, 0, 960, 1080));
        assert_eq!(planned[1].1, rect(640, 360, 640, 360));
        assert_eq!(planned[2].1, rect(960, 0, 960, 1080));
    }

    #[test]
    fn fullscreen_takes_the_monitor_and_stops_the_layout() {
        let area = full_hd();
        let planned = plan(
            area,
            area,
            &[(0usize, Slot::Tiled), (1, Slot::Fullscreen), (2, Slot::Tiled)],
        );
        assert_eq!(planned, vec![(1, area)]);
    }

    #[test]
    fn plan_is_idempotent() {
        let area = rect(100, 0, 1919, 1079);
        let items: Vec<(usize, Slot)> =
            (0..5).map(|i| (i, Slot::Tiled)).chain([(9, Slot::Floating)]).collect();
        assert_eq!(plan(area, area, &items), plan(area, area, &items));
    }

    #[test]
    fn no_visible_clients_means_nothing_to_place() {
        let planned = plan::<usize>(full_hd(), full_hd(), &[]);
        assert!(planned.is_empty());
    }

    #[test]
    fn applybounds_enforces_a_minimum_size() {
        let clamped = applybounds(rect(10, 10, 0, 0), full_hd());
        assert_eq!(clamped.size.w, 1);
        assert_eq!(clamped.size.h, 1);
    }

    #[test]
    fn applybounds_shifts_outside_rects_to_the_nearest_edge() {
        let bbox = full_hd();
        // entirely to the right
        let clamped = applybounds(rect(2500, 10, 300, 300), bbox);
        assert_eq!(clamped.loc.x, 1920 - 300);
        // entirely above
        let clamped = applybounds(rect(10, -900, 300, 300), bbox);
        assert_eq!(clamped.loc.y, 0);
        // inside stays put
        assert_eq!(applybounds(rect(10, 20, 300, 300), bbox), rect(10, 20, 300, 300));
    }
}
