use std::collections::HashMap;

use smithay::{
    output::{Mode, Output},
    utils::{Logical, Point, Rectangle, Size},
};

use crate::{client::ClientId, config, config::TAGMASK, state::State};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(u64);

/// One physical output. `m` is the monitor area and `w` the window
/// area, both layout-relative; they are equal here since nothing
/// reserves screen edges.
pub struct Monitor {
    pub output: Output,
    pub m: Rectangle<i32, Logical>,
    pub w: Rectangle<i32, Logical>,
    pub tagset: [u32; 2],
    pub seltags: usize,
    /// Index into the rule table, -1 when no rule matched. Unruled
    /// outputs get no layout entry and stay out of focus rotation.
    pub position: i32,
    pub layout_loc: Point<i32, Logical>,
    pub fullscreen: Option<ClientId>,
    pub enabled: bool,
}

impl Monitor {
    pub fn new(output: Output, position: i32, layout_loc: Point<i32, Logical>) -> Self {
        Self {
            output,
            m: Rectangle::default(),
            w: Rectangle::default(),
            tagset: [1, 1],
            seltags: 0,
            position,
            layout_loc,
            fullscreen: None,
            enabled: position >= 0,
        }
    }

    /// The active tag mask; visibility of a client on this monitor is
    /// `client.tags & visible_tags() != 0`.
    pub fn visible_tags(&self) -> u32 {
        self.tagset[self.seltags]
    }

    /// Switch the view. Toggles the tagset selector, which is what
    /// makes a second view of the same mask return to the previous
    /// view. Returns false when the requested mask is already active.
    pub fn view(&mut self, mask: u32) -> bool {
        if mask & TAGMASK == self.visible_tags() {
            return false;
        }
        self.seltags ^= 1;
        if mask & TAGMASK != 0 {
            self.tagset[self.seltags] = mask & TAGMASK;
        }
        true
    }

    pub fn mode_size(&self) -> Option<Size<i32, Logical>> {
        self.output.current_mode().map(|mode| mode.size.to_logical(1))
    }
}

#[derive(Default)]
pub struct MonitorStore {
    next: u64,
    map: HashMap<MonitorId, Monitor>,
    /// Ring order, ascending by rule position.
    pub ring: Vec<MonitorId>,
}

impl MonitorStore {
    pub fn insert(&mut self, monitor: Monitor) -> MonitorId {
        let id = MonitorId(self.next);
        self.next += 1;
        let at = self
            .ring
            .iter()
            .position(|other| {
                self.map
                    .get(other)
                    .is_some_and(|m| m.position > monitor.position)
            })
            .unwrap_or(self.ring.len());
        self.ring.insert(at, id);
        self.map.insert(id, monitor);
        id
    }

    pub fn get(&self, id: MonitorId) -> Option<&Monitor> {
        self.map.get(&id)
    }

    pub fn get_mut(&mut self, id: MonitorId) -> Option<&mut Monitor> {
        self.map.get_mut(&id)
    }

    pub fn remove(&mut self, id: MonitorId) -> Option<Monitor> {
        self.ring.retain(|&entry| entry != id);
        self.map.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MonitorId, &Monitor)> {
        self.ring
            .iter()
            .filter_map(|id| self.map.get(id).map(|m| (*id, m)))
    }

    pub fn by_output(&self, output: &Output) -> Option<MonitorId> {
        self.iter().find(|(_, m)| &m.output == output).map(|(id, _)| id)
    }

    pub fn by_name(&self, name: &str) -> Option<MonitorId> {
        self.iter().find(|(_, m)| m.output.name() == name).map(|(id, _)| id)
    }

    /// Neighbor in ring order, wrapping past the ends.
    pub fn dirto(&self, from: MonitorId, dir: i32) -> Option<MonitorId> {
        let at = self.ring.iter().position(|&id| id == from)?;
        let len = self.ring.len();
        let next = if dir > 0 {
            (at + 1) % len
        } else {
            (at + len - 1) % len
        };
        Some(self.ring[next])
    }
}

/// One head of an output configuration request, the shape an output
/// management client would hand us: enable toggle, a `(w, h,
/// refresh_mHz)` mode and a layout position.
pub struct OutputConfigRequest {
    pub name: String,
    pub enabled: bool,
    pub mode: Option<(i32, i32, i32)>,
    pub position: Option<(i32, i32)>,
}

impl State {
    pub fn add_output(&mut self, output: Output) {
        let name = output.name();
        let (position, layout_loc) = match config::rule_for(&name) {
            Some((index, rule)) => {
                if rule.w > 0 && rule.h > 0 {
                    let mode = Mode {
                        size: (rule.w, rule.h).into(),
                        refresh: if rule.refresh > 0 { rule.refresh } else { 60_000 },
                    };
                    output.change_current_state(Some(mode), None, None, None);
                }
                output.change_current_state(None, None, None, Some((rule.x, rule.y).into()));
                (index as i32, Point::from((rule.x, rule.y)))
            }
            None => (-1, Point::default()),
        };

        tracing::info!(name, position, "new output");
        let id = self.mons.insert(Monitor::new(output, position, layout_loc));
        if position < 0 {
            return;
        }
        self.updatemons();
        if self.selmon.is_none() {
            self.selmon = Some(id);
        }
    }

    pub fn remove_output(&mut self, output: &Output) {
        let Some(id) = self.mons.by_output(output) else {
            return;
        };
        tracing::info!(name = output.name(), "output removed");
        self.mons.remove(id);
        self.updatemons();

        // Rotate the selection backwards onto an enabled output.
        self.selmon = self
            .mons
            .ring
            .iter()
            .rev()
            .copied()
            .find(|&m| self.mons.get(m).is_some_and(|m| m.enabled))
            .or_else(|| self.mons.ring.last().copied());
        let top = self.selmon.and_then(|m| self.focustop(m));
        self.focusclient(top, true);

        // The dead monitor's clients move to the new selection with
        // their tags intact.
        let orphans: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, c)| c.mon == Some(id))
            .map(|(cid, _)| cid)
            .collect();
        for cid in orphans {
            let tags = self.clients.get(cid).map(|c| c.tags).unwrap_or(0);
            let target = self.selmon;
            self.setmon(cid, target, tags);
        }
    }

    /// Re-derive every monitor rectangle from its layout position and
    /// current mode, refresh the layout union and re-arrange.
    pub fn updatemons(&mut self) {
        let ids: Vec<MonitorId> = self.mons.ring.clone();
        let mut union: Option<Rectangle<i32, Logical>> = None;
        for &id in &ids {
            let Some(mon) = self.mons.get_mut(id) else {
                continue;
            };
            if mon.position < 0 {
                continue;
            }
            let size = mon.mode_size().unwrap_or_default();
            let area = Rectangle::new(mon.layout_loc, size);
            mon.m = area;
            mon.w = area;
            if mon.enabled {
                union = Some(match union {
                    Some(u) => u.merge(area),
                    None => area,
                });
            }
        }
        self.sgeom = union.unwrap_or_default();
        for id in ids {
            self.arrange(id);
        }
    }

    pub fn dirtomon(&self, dir: i32) -> Option<MonitorId> {
        let sel = self.selmon?;
        self.mons.dirto(sel, dir)
    }

    pub fn monitor_at(&self, point: Point<f64, Logical>) -> Option<MonitorId> {
        self.mons
            .iter()
            .find(|(_, m)| m.enabled && m.m.to_f64().contains(point))
            .map(|(id, _)| id)
    }

    /// Apply an output configuration head by head. Heads that cannot
    /// be applied fail the configuration but do not undo the others;
    /// disabling the last enabled output is refused as a no-op.
    pub fn apply_output_config(&mut self, heads: &[OutputConfigRequest]) -> bool {
        let mut ok = true;
        for head in heads {
            let Some(id) = self.mons.by_name(&head.name) else {
                tracing::warn!(name = head.name, "output config for unknown output");
                ok = false;
                continue;
            };
            if !head.enabled {
                let enabled = self.mons.iter().filter(|(_, m)| m.enabled).count();
                let Some(mon) = self.mons.get_mut(id) else {
                    continue;
                };
                if mon.enabled && enabled <= 1 {
                    tracing::warn!(
                        name = head.name,
                        "refusing to disable the last enabled output"
                    );
                    continue;
                }
                mon.enabled = false;
                continue;
            }
            let Some(mon) = self.mons.get_mut(id) else {
                continue;
            };
            mon.enabled = mon.position >= 0;
            if let Some((w, h, refresh)) = head.mode {
                if w < 1 || h < 1 || refresh < 0 {
                    ok = false;
                    continue;
                }
                mon.output.change_current_state(
                    Some(Mode {
                        size: (w, h).into(),
                        refresh,
                    }),
                    None,
                    None,
                    None,
                );
            }
            if let Some((x, y)) = head.position {
                mon.layout_loc = (x, y).into();
                mon.output.change_current_state(None, None, None, Some((x, y).into()));
            }
        }
        self.updatemons();

        // the selection must not linger on a disabled output
        let selection_ok = self
            .selmon
            .and_then(|m| self.mons.get(m))
            .is_some_and(|m| m.enabled);
        if !selection_ok {
            let found = self.mons.iter().find(|(_, m)| m.enabled).map(|(id, _)| id);
            if let Some(id) = found {
                self.selmon = Some(id);
                let top = self.focustop(id);
                self.focusclient(top, true);
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use smithay::output::{PhysicalProperties, Subpixel};
    use smithay::reexports::calloop::EventLoop;
    use smithay::reexports::wayland_server::Display;

    use super::*;

    fn output(name: &str) -> Output {
        Output::new(
            name.to_string(),
            PhysicalProperties {
                size: (0, 0).into(),
                subpixel: Subpixel::Unknown,
                make: "test".into(),
                model: "test".into(),
            },
        )
    }

    fn state() -> (EventLoop<'static, State>, State) {
        let event_loop = EventLoop::try_new().unwrap();
        let display = Display::new().unwrap();
        let state = State::new(event_loop.handle(), event_loop.get_signal(), display);
        (event_loop, state)
    }

    #[test]
    fn view_same_mask_is_a_noop() {
        let mut mon = Monitor::new(output("DP-3"), 0, Point::default());
        assert!(!mon.view(1));
        assert_eq!(mon.visible_tags(), 1);
        assert_eq!(mon.seltags, 0);
    }

    #[test]
    fn view_twice_restores_the_previous_view() {
        let mut mon = Monitor::new(output("DP-3"), 0, Point::default());
        assert!(mon.view(2));
        assert_eq!(mon.visible_tags(), 2);
        assert!(mon.view(1));
        assert_eq!(mon.visible_tags(), 1);
        assert_eq!(mon.seltags, 0);
        assert_eq!(mon.tagset, [1, 2]);
    }

    #[test]
    fn visible_tags_never_empty() {
        let mut mon = Monitor::new(output("DP-3"), 0, Point::default());
        // A zero mask only toggles back to the previous tagset.
        mon.view(2);
        mon.view(0);
        assert_ne!(mon.visible_tags(), 0);
        assert_eq!(mon.visible_tags(), 1);
    }

    #[test]
    fn ring_orders_by_rule_position() {
        let mut store = MonitorStore::default();
        let b = store.insert(Monitor::new(output("DP-2"), 1, Point::default()));
        let a = store.insert(Monitor::new(output("DP-3"), 0, Point::default()));
        let c = store.insert(Monitor::new(output("DP-1"), 2, Point::default()));
        assert_eq!(store.ring, vec![a, b, c]);

        assert_eq!(store.dirto(a, 1), Some(b));
        assert_eq!(store.dirto(c, 1), Some(a));
        assert_eq!(store.dirto(a, -1), Some(c));
    }

    #[test]
    fn single_monitor_ring_wraps_to_itself() {
        let mut store = MonitorStore::default();
        let only = store.insert(Monitor::new(output("DP-3"), 0, Point::default()));
        assert_eq!(store.dirto(only, 1), Some(only));
        assert_eq!(store.dirto(only, -1), Some(only));
    }

    #[test]
    fn add_output_applies_rules_and_layout() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        state.add_output(output("DP-2"));

        let sel = state.selmon.expect("a ruled output selects itself");
        let first = state.mons.get(sel).unwrap();
        assert_eq!(first.output.name(), "DP-3");
        assert_eq!(first.m, Rectangle::new((0, 0).into(), (1920, 1080).into()));
        assert_eq!(
            state.sgeom,
            Rectangle::new((0, 0).into(), (3840, 1080).into())
        );
    }

    #[test]
    fn unruled_outputs_get_no_layout_entry() {
        let (_event_loop, mut state) = state();
        state.add_output(output("HDMI-A-1"));
        assert!(state.selmon.is_none());
        assert_eq!(state.sgeom, Rectangle::default());
        let (_, mon) = state.mons.iter().next().unwrap();
        assert_eq!(mon.position, -1);
        assert!(!mon.enabled);
    }

    #[test]
    fn removing_an_output_rotates_the_selection() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        state.add_output(output("DP-2"));
        let dp2 = state.mons.by_name("DP-2").unwrap();
        state.selmon = Some(dp2);

        let gone = state.mons.get(dp2).unwrap().output.clone();
        state.remove_output(&gone);

        assert_eq!(state.selmon, state.mons.by_name("DP-3"));
        assert_eq!(
            state.sgeom,
            Rectangle::new((0, 0).into(), (1920, 1080).into())
        );
        assert!(state.mons.by_name("DP-2").is_none());
    }

    #[test]
    fn refuses_to_disable_the_last_output() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        let ok = state.apply_output_config(&[OutputConfigRequest {
            name: "DP-3".into(),
            enabled: false,
            mode: None,
            position: None,
        }]);
        assert!(ok);
        assert!(state.mons.iter().next().unwrap().1.enabled);
    }

    #[test]
    fn disabling_one_of_two_outputs_moves_selection() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        state.add_output(output("DP-2"));
        // select the output about to be disabled
        state.selmon = state.mons.by_name("DP-2");
        let ok = state.apply_output_config(&[OutputConfigRequest {
            name: "DP-2".into(),
            enabled: false,
            mode: None,
            position: None,
        }]);
        assert!(ok);
        let dp2 = state.mons.by_name("DP-2").unwrap();
        assert!(!state.mons.get(dp2).unwrap().enabled);
        assert_eq!(state.selmon, state.mons.by_name("DP-3"));
        // sgeom shrinks back to the remaining output
        assert_eq!(
            state.sgeom,
            Rectangle::new((0, 0).into(), (1920, 1080).into())
        );
    }

    #[test]
    fn mode_and_position_changes_reshape_the_layout() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        let ok = state.apply_output_config(&[OutputConfigRequest {
            name: "DP-3".into(),
            enabled: true,
            mode: Some((1280, 720, 60_000)),
            position: Some((100, 0)),
        }]);
        assert!(ok);
        let mon = state.mons.iter().next().unwrap().1;
        assert_eq!(mon.m, Rectangle::new((100, 0).into(), (1280, 720).into()));
        assert_eq!(state.sgeom, mon.m);
    }

    #[test]
    fn bad_mode_fails_the_configuration() {
        let (_event_loop, mut state) = state();
        state.add_output(output("DP-3"));
        let ok = state.apply_output_config(&[OutputConfigRequest {
            name: "DP-3".into(),
            enabled: true,
            mode: Some((0, 720, 60_000)),
            position: None,
        }]);
        assert!(!ok);
    }
}
