mod action;
mod backend;
mod client;
mod config;
mod focus;
mod handlers;
mod input;
mod layout;
mod monitor;
mod render;
mod state;

use smithay::utils::SerialCounter;

use crate::backend::winit::StartupError;

pub static SERIAL_COUNTER: SerialCounter = SerialCounter::new();

fn main() -> Result<(), StartupError> {
    init_logs();

    if std::env::var_os("XDG_RUNTIME_DIR").is_none() {
        return Err(StartupError::MissingRuntimeDir);
    }

    backend::winit::run()
}

fn init_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    // RUST_LOG as in `tidewm=debug,smithay=info`
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // a plain-text copy next to the session, best effort
    let file_layer = std::env::var("HOME").ok().and_then(|home| {
        let file = std::fs::File::create(format!("{home}/tidewm.log")).ok()?;
        let (file_writer, file_guard) = tracing_appender::non_blocking(file);
        Box::leak(Box::new(file_guard));
        Some(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
    });
    Box::leak(Box::new(stdout_guard));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(stdout_writer).with_target(false))
        .with(file_layer)
        .init();
}
