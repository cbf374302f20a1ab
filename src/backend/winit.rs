use std::sync::Arc;

use calloop::signals::{Signal, Signals};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use smithay::{
    backend::{
        renderer::{damage::OutputDamageTracker, glow::GlowRenderer},
        winit::{self, WinitEvent, WinitGraphicsBackend},
    },
    output::{Mode, Output, PhysicalProperties, Subpixel},
    reexports::{
        calloop::EventLoop,
        wayland_server::Display,
    },
    utils::{Physical, Size, Transform},
    wayland::socket::ListeningSocketSource,
};

use crate::state::{ClientState, State};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("XDG_RUNTIME_DIR must be set")]
    MissingRuntimeDir,
    #[error("event loop error: {0}")]
    EventLoop(#[from] smithay::reexports::calloop::Error),
    #[error("failed to create the wayland display: {0}")]
    Display(#[from] smithay::reexports::wayland_server::backend::InitError),
    #[error("failed to initialize the winit backend: {0}")]
    Winit(#[from] winit::Error),
    #[error("failed to bind the wayland socket: {0}")]
    Socket(String),
}

pub struct WinitData {
    pub backend: WinitGraphicsBackend<GlowRenderer>,
    pub damage_tracker: OutputDamageTracker,
    pub output: Output,
}

/// Bring the whole compositor up on the winit backend and run the
/// dispatch loop until the window closes.
pub fn run() -> Result<(), StartupError> {
    let mut event_loop: EventLoop<State> = EventLoop::try_new()?;
    let display: Display<State> = Display::new()?;
    let mut state = State::new(event_loop.handle(), event_loop.get_signal(), display);

    let (backend, winit) = winit::init::<GlowRenderer>()?;
    let mode = Mode {
        size: backend.window_size(),
        refresh: 60_000,
    };
    let output = Output::new(
        "WL-1".to_string(),
        PhysicalProperties {
            size: (0, 0).into(),
            subpixel: Subpixel::Unknown,
            make: "tidewm".into(),
            model: "winit".into(),
        },
    );
    let _global = output.create_global::<State>(&state.display_handle);
    output.change_current_state(
        Some(mode),
        Some(Transform::Flipped180),
        None,
        Some((0, 0).into()),
    );
    output.set_preferred(mode);
    let damage_tracker = OutputDamageTracker::from_output(&output);

    state.backend = Some(WinitData {
        backend,
        damage_tracker,
        output: output.clone(),
    });
    state.add_output(output);

    let socket = ListeningSocketSource::new_auto()
        .map_err(|err| StartupError::Socket(err.to_string()))?;
    let socket_name = socket.socket_name().to_os_string();
    event_loop
        .handle()
        .insert_source(socket, |client_stream, _, state| {
            if let Err(err) = state
                .display_handle
                .insert_client(client_stream, Arc::new(ClientState::default()))
            {
                tracing::warn!(?err, "failed to register a wayland client");
            }
        })
        .expect("failed to init the wayland socket source");
    unsafe { std::env::set_var("WAYLAND_DISPLAY", &socket_name) };
    tracing::info!(socket = ?socket_name, "listening for wayland clients");
    state.socket_name = Some(socket_name);

    // Children spawned for menus and terminals are reaped here, never
    // waited on anywhere else.
    let signals = Signals::new(&[Signal::SIGCHLD])?;
    event_loop
        .handle()
        .insert_source(signals, |_, _, _| reap_children())
        .expect("failed to install the SIGCHLD source");

    event_loop
        .handle()
        .insert_source(winit, move |event, _, state| match event {
            WinitEvent::Resized { size, .. } => state.winit_output_resized(size),
            WinitEvent::Focus(_) => {}
            WinitEvent::Input(event) => state.process_input_event(event),
            WinitEvent::Redraw => state.render_winit_frame(),
            WinitEvent::CloseRequested => state.loop_signal.stop(),
        })
        .expect("failed to insert the winit event source");

    #[cfg(feature = "xwayland")]
    state.start_xwayland();

    // initial selection follows the cursor
    if let Some(m) = state.monitor_at(state.pointer_location) {
        state.selmon = Some(m);
    }

    event_loop.run(None, &mut state, |state| {
        state.popups.cleanup();
        if let Err(err) = state.display_handle.flush_clients() {
            tracing::warn!(?err, "failed to flush clients");
        }
    })?;
    Ok(())
}

impl State {
    /// The nested window was resized: adopt the new mode and reflow.
    pub fn winit_output_resized(&mut self, size: Size<i32, Physical>) {
        let Some(output) = self.backend.as_ref().map(|winit| winit.output.clone()) else {
            return;
        };
        output.change_current_state(
            Some(Mode {
                size,
                refresh: 60_000,
            }),
            None,
            None,
            None,
        );
        self.updatemons();
    }
}

fn reap_children() {
    loop {
        match waitpid(None::<nix::unistd::Pid>, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => {}
        }
    }
}
