use smithay::input::keyboard::{Keysym, ModifiersState, keysyms};

use crate::action::Action;

/// Four tags, dwm-style virtual desktops. A client's tag field is a
/// non-zero submask of TAGMASK.
pub const TAGCOUNT: u32 = 4;
pub const TAGMASK: u32 = (1 << TAGCOUNT) - 1;

/// Clients whose app id matches one of these are never tiled.
pub const FLOATING_APP_IDS: &[&str] = &["floating", "gcr-prompter"];

pub const TERMINAL: &str = "alacritty";
pub const LAUNCHER: &str = "bemenu-run";
pub const PASSMENU: &str = "passmenu";

/// Keyboard repeat, milliseconds until repeat and repeats per second.
pub const REPEAT_DELAY: i32 = 220;
pub const REPEAT_RATE: i32 = 25;

pub struct MonitorRule {
    pub name: &'static str,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// millihertz, 0 keeps the output's current mode
    pub refresh: i32,
}

/// Matched by substring against the output name at monitor creation.
/// Outputs matching no rule get no layout position and stay out of
/// the focus rotation. "WL-1" is the nested winit output.
pub static MONITOR_RULES: &[MonitorRule] = &[
    MonitorRule { name: "DP-3", x: 0, y: 0, w: 1920, h: 1080, refresh: 239760 },
    MonitorRule { name: "DP-2", x: 1920, y: 0, w: 1920, h: 1080, refresh: 60000 },
    MonitorRule { name: "DP-1", x: 3840, y: 0, w: 1920, h: 1080, refresh: 60000 },
    MonitorRule { name: "WL-1", x: 0, y: 0, w: 0, h: 0, refresh: 0 },
];

pub fn rule_for(output_name: &str) -> Option<(usize, &'static MonitorRule)> {
    MONITOR_RULES
        .iter()
        .enumerate()
        .find(|(_, r)| output_name.contains(r.name))
}

/// The compositor consumes a key press iff this returns an action;
/// anything else is forwarded to the focused client.
pub fn keybinding(mods: &ModifiersState, sym: Keysym) -> Option<Action> {
    let logo = mods.logo && !mods.ctrl && !mods.alt && !mods.shift;
    let logo_ctrl = mods.logo && mods.ctrl && !mods.alt && !mods.shift;

    if logo {
        return match sym.raw() {
            keysyms::KEY_Return => Some(Action::Spawn(LAUNCHER)),
            keysyms::KEY_p => Some(Action::Spawn(PASSMENU)),
            keysyms::KEY_space => Some(Action::Zoom),
            keysyms::KEY_c => Some(Action::FocusStack(1)),
            keysyms::KEY_h => Some(Action::FocusStack(-1)),
            keysyms::KEY_s => Some(Action::FocusMon(1)),
            keysyms::KEY_t => Some(Action::FocusMon(-1)),
            keysyms::KEY_i => Some(Action::View(1)),
            keysyms::KEY_e => Some(Action::View(2)),
            keysyms::KEY_o => Some(Action::View(4)),
            keysyms::KEY_n => Some(Action::View(8)),
            _ => None,
        };
    }
    if logo_ctrl {
        return match sym.raw() {
            keysyms::KEY_Return => Some(Action::Spawn(TERMINAL)),
            keysyms::KEY_c => Some(Action::Close),
            keysyms::KEY_s => Some(Action::TagMon(1)),
            keysyms::KEY_t => Some(Action::TagMon(-1)),
            keysyms::KEY_i => Some(Action::Tag(1)),
            keysyms::KEY_e => Some(Action::Tag(2)),
            keysyms::KEY_o => Some(Action::Tag(4)),
            keysyms::KEY_n => Some(Action::Tag(8)),
            _ => None,
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logo() -> ModifiersState {
        ModifiersState {
            logo: true,
            ..Default::default()
        }
    }

    fn logo_ctrl() -> ModifiersState {
        ModifiersState {
            logo: true,
            ctrl: true,
            ..Default::default()
        }
    }

    #[test]
    fn tag_keys_map_to_views() {
        let mods = logo();
        for (key, mask) in [
            (keysyms::KEY_i, 1),
            (keysyms::KEY_e, 2),
            (keysyms::KEY_o, 4),
            (keysyms::KEY_n, 8),
        ] {
            assert_eq!(keybinding(&mods, key.into()), Some(Action::View(mask)));
        }
    }

    #[test]
    fn ctrl_turns_views_into_tags() {
        let mods = logo_ctrl();
        assert_eq!(keybinding(&mods, keysyms::KEY_i.into()), Some(Action::Tag(1)));
        assert_eq!(keybinding(&mods, keysyms::KEY_n.into()), Some(Action::Tag(8)));
    }

    #[test]
    fn spawn_and_close_bindings() {
        assert_eq!(
            keybinding(&logo(), keysyms::KEY_Return.into()),
            Some(Action::Spawn(LAUNCHER))
        );
        assert_eq!(
            keybinding(&logo_ctrl(), keysyms::KEY_Return.into()),
            Some(Action::Spawn(TERMINAL))
        );
        assert_eq!(keybinding(&logo_ctrl(), keysyms::KEY_c.into()), Some(Action::Close));
        assert_eq!(
            keybinding(&logo(), keysyms::KEY_c.into()),
            Some(Action::FocusStack(1))
        );
    }

    #[test]
    fn unbound_combinations_are_forwarded() {
        assert_eq!(keybinding(&logo(), keysyms::KEY_z.into()), None);
        let mut shifted = logo();
        shifted.shift = true;
        assert_eq!(keybinding(&shifted, keysyms::KEY_i.into()), None);
        assert_eq!(
            keybinding(&ModifiersState::default(), keysyms::KEY_Return.into()),
            None
        );
    }

    #[test]
    fn monitor_rules_match_by_substring() {
        assert_eq!(rule_for("DP-2").map(|(i, _)| i), Some(1));
        assert_eq!(rule_for("WL-1").map(|(i, _)| i), Some(3));
        assert!(rule_for("HDMI-A-1").is_none());
    }

    #[test]
    fn tagmask_covers_the_tag_keys() {
        for mask in [1u32, 2, 4, 8] {
            assert_eq!(mask & TAGMASK, mask);
        }
        assert_eq!(16 & TAGMASK, 0);
    }
}
