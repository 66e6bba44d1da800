//! Countdown - estimate how long a YouTube channel needs to reach 100K subscribers
//!
//! The core is an authorization state machine ([`auth_manager`]) and a growth
//! projection engine ([`projection`]), organized around trait-based
//! dependency injection for testability.

pub mod auth_manager;
pub mod config;
pub mod diagnosis;
pub mod flow;
pub mod growth;
pub mod mocks;
pub mod production;
pub mod projection;
pub mod session;
pub mod traits;

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use auth_manager::{AuthError, AuthState, AuthorizationManager};
pub use flow::CountdownFlow;
pub use growth::Countdown;
pub use projection::{ProjectionEngine, ProjectionError, ProjectionResult};
pub use session::{Credential, Session};

/// Initialize logging to both stdout and a daily log file in `log_dir`.
///
/// The returned guard must be kept alive for buffered file output to flush.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = rolling::daily(log_dir, "countdown.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "countdown=info,countdown_lib=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .try_init()?;

    Ok(guard)
}
