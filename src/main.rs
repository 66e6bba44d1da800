use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use countdown_lib::config::{AppConfig, Settings, KEY_API_KEY, KEY_CLIENT_ID, KEY_CLIENT_SECRET};
use countdown_lib::diagnosis::diagnose_projection;
use countdown_lib::production::{GoogleIdentityProvider, YouTubeAnalyticsClient};
use countdown_lib::traits::{PresentationEvent, Presenter};
use countdown_lib::{AuthorizationManager, CountdownFlow, ProjectionEngine, ProjectionResult, Session};

const ENV_OVERRIDES: [(&str, &str); 3] = [
    ("COUNTDOWN_CLIENT_ID", KEY_CLIENT_ID),
    ("COUNTDOWN_CLIENT_SECRET", KEY_CLIENT_SECRET),
    ("COUNTDOWN_API_KEY", KEY_API_KEY),
];

/// Renders presentation events on the terminal
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn present(&self, event: PresentationEvent) {
        match event {
            PresentationEvent::Loading(true) => println!("Loading..."),
            PresentationEvent::Loading(false) => {}
            PresentationEvent::Projection(result) => {
                if let ProjectionResult::Success { current_count, .. } = &result {
                    println!("\nCurrent subscribers: {}", current_count);
                }
                println!("\n{}", result);
                if let ProjectionResult::Error(e) = &result {
                    println!("{}", diagnose_projection(e).guidance);
                }
            }
            PresentationEvent::AuthorizationError(message) => eprintln!("{}", message),
        }
    }
}

/// Copy OAuth client settings from the environment into the config store
fn seed_from_env(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    for (var, key) in ENV_OVERRIDES {
        if let Ok(value) = std::env::var(var) {
            if !value.is_empty() {
                config.set(key, &value)?;
            }
        }
    }
    Ok(())
}

async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("countdown");
    let _guard = countdown_lib::init_logging(&data_dir.join("logs"))?;

    let config_path = data_dir.join("config.sqlite");
    tracing::info!(path = %config_path.display(), "Opening config database");
    let config = AppConfig::open(&config_path)?;
    seed_from_env(&config)?;
    let settings = Settings::load(&config)?;
    settings.ensure_configured()?;

    println!("Countdown to 100K");
    println!("Estimate how long your channel needs to reach 100,000 subscribers at its current growth rate.\n");

    let identity = Arc::new(GoogleIdentityProvider::new(
        settings.client_secret.clone(),
        settings.open_browser,
    )?);
    let analytics = Arc::new(YouTubeAnalyticsClient::new()?);
    let auth = Arc::new(AuthorizationManager::new(identity, settings.clone(), Arc::new(Session::new())));
    let engine = Arc::new(ProjectionEngine::new(analytics, &settings));
    let flow = CountdownFlow::new(auth, engine, Arc::new(ConsolePresenter));

    if flow.initialize().await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    match flow.connect().await {
        Ok(ProjectionResult::Error(_)) | Err(_) => Ok(ExitCode::FAILURE),
        Ok(_) => Ok(ExitCode::SUCCESS),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
