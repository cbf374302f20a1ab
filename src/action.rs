use crate::{client::attach_front, config::TAGMASK, state::State};

/// What a matched keybinding does. Directions are +1/-1, masks are
/// tag bitmasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Spawn(&'static str),
    Zoom,
    Close,
    FocusStack(i32),
    FocusMon(i32),
    TagMon(i32),
    View(u32),
    Tag(u32),
}

impl Action {
    pub fn execute(self, state: &mut State) {
        match self {
            Action::Spawn(cmd) => spawn(cmd),
            Action::Zoom => state.zoom(),
            Action::Close => {
                if let Some(sel) = state.selclient() {
                    if let Some(client) = state.clients.get(sel) {
                        client.kind.send_close();
                    }
                }
            }
            Action::FocusStack(dir) => state.focusstack(dir),
            Action::FocusMon(dir) => state.focusmon(dir),
            Action::TagMon(dir) => state.tagmon(dir),
            Action::View(mask) => state.view(mask),
            Action::Tag(mask) => state.tag(mask),
        }
    }
}

/// Detached child in its own session; the SIGCHLD source reaps it.
pub fn spawn(cmd: &str) {
    use std::os::unix::process::CommandExt;

    let mut command = std::process::Command::new(cmd);
    unsafe {
        command.pre_exec(|| {
            let _ = nix::unistd::setsid();
            Ok(())
        });
    }
    match command.spawn() {
        Ok(child) => tracing::debug!(cmd, pid = child.id(), "spawned"),
        Err(err) => tracing::warn!(cmd, ?err, "failed to spawn"),
    }
}

impl State {
    /// Switch the selected monitor's view to `mask`. Viewing the
    /// active mask again is a no-op; a second differing view returns
    /// to the previous one via the tagset selector.
    pub fn view(&mut self, mask: u32) {
        let Some(selmon) = self.selmon else {
            return;
        };
        let changed = self
            .mons
            .get_mut(selmon)
            .map(|mon| mon.view(mask))
            .unwrap_or(false);
        if !changed {
            return;
        }
        let top = self.focustop(selmon);
        self.focusclient(top, true);
        self.arrange(selmon);
    }

    /// Re-tag the selected client.
    pub fn tag(&mut self, mask: u32) {
        if mask & TAGMASK == 0 {
            return;
        }
        let Some(sel) = self.selclient() else {
            return;
        };
        if let Some(client) = self.clients.get_mut(sel) {
            client.tags = mask & TAGMASK;
        }
        let Some(selmon) = self.selmon else {
            return;
        };
        let top = self.focustop(selmon);
        self.focusclient(top, true);
        self.arrange(selmon);
    }

    /// Send the selected client to a neighboring monitor; it adopts
    /// that monitor's active tagset.
    pub fn tagmon(&mut self, dir: i32) {
        let Some(sel) = self.selclient() else {
            return;
        };
        let Some(target) = self.dirtomon(dir) else {
            return;
        };
        self.setmon(sel, Some(target), 0);
    }

    /// Promote the selected client to the master slot.
    pub fn zoom(&mut self) {
        let Some(sel) = self.selclient() else {
            return;
        };
        attach_front(&mut self.tiling, sel);
        self.focusclient(Some(sel), true);
        let Some(selmon) = self.selmon else {
            return;
        };
        self.arrange(selmon);
    }
}
