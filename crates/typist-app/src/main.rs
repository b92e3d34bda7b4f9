//! Typist application binary - composition root.
//!
//! Ties the Typist crates into a single executable:
//! 1. Parse the CLI and load configuration from TOML
//! 2. Open the settings database (falling back to memory)
//! 3. Load the profile store
//! 4. Run the chosen subcommand: the HTTP API, a one-off typing session,
//!    the profile listing or an interactive calibration

mod cli;

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use typist_api::auth::load_or_generate_token;
use typist_api::state::AppState;
use typist_core::config::TypistConfig;
use typist_core::error::TypistError;
use typist_core::events::SessionEvent;
use typist_core::types::{DelayedCorrection, SessionOverrides};
use typist_engine::{
    CalibrationService, ConsoleInjector, KeystrokeInjector, SendInputInjector, SessionEngine,
    SessionRequest,
};
use typist_storage::{Database, MemorySettings, ProfileStore, SettingsRepository, SettingsStore};

use cli::{expand_home, resolve_port, CliArgs, Command, TypeArgs};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Profile used when none is given and nothing was used before.
const DEFAULT_PROFILE: &str = "Medium";

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Open the SQLite settings store, or keep settings in memory for this run.
fn open_settings(data_dir: &std::path::Path) -> Arc<dyn SettingsStore> {
    let db_path = data_dir.join("typist.db");
    match Database::new(&db_path) {
        Ok(db) => {
            info!(path = %db_path.display(), "Settings database opened");
            Arc::new(SettingsRepository::new(Arc::new(db)))
        }
        Err(e) => {
            warn!(
                path = %db_path.display(),
                error = %e,
                "Settings database unavailable, settings will not persist"
            );
            Arc::new(MemorySettings::new())
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = if config_file.exists() {
        TypistConfig::load(&config_file)?
    } else {
        TypistConfig::default()
    };
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    init_tracing(&config.general.log_level);
    info!("Starting Typist v{}", env!("CARGO_PKG_VERSION"));
    info!(path = %config_file.display(), "Configuration resolved");

    let data_dir = expand_home(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let profiles = Arc::new(ProfileStore::load(open_settings(&data_dir)));

    match args.command() {
        Command::Serve { port } => {
            config.api.port = resolve_port(port, config.api.port);
            serve(config, profiles, &data_dir).await
        }
        Command::Type(type_args) => type_once(config, profiles, type_args).await,
        Command::Profiles => list_profiles(&profiles),
        Command::Calibrate => calibrate(config, profiles).await,
    }
}

// =============================================================================
// Subcommands
// =============================================================================

async fn serve(
    config: TypistConfig,
    profiles: Arc<ProfileStore>,
    data_dir: &std::path::Path,
) -> AppResult<()> {
    let injector: Arc<dyn KeystrokeInjector> = Arc::new(SendInputInjector::new());
    let engine = SessionEngine::new(&config, injector);

    let mut state = AppState::new(config.clone(), engine, profiles);
    state.api_token = load_or_generate_token(&data_dir.join("api_token"));
    info!("No text provider configured; sessions must supply literal text");

    tokio::select! {
        result = typist_api::start_server(&config, state) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }
    Ok(())
}

async fn type_once(
    config: TypistConfig,
    profiles: Arc<ProfileStore>,
    args: TypeArgs,
) -> AppResult<()> {
    let text = match (&args.text, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => return Err(TypistError::Validation("no text given".into()).into()),
    };

    let profile_name = args
        .profile
        .clone()
        .or_else(|| profiles.last_used().map(|s| s.profile_name))
        .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
    let overrides = SessionOverrides {
        custom_wpm: args.wpm,
        countdown_secs: args.countdown,
        delayed_correction: args.delayed_correction.then(|| DelayedCorrection {
            enabled: true,
            delay_seconds: 0.0,
        }),
        ..SessionOverrides::default()
    };
    let request = SessionRequest::new(profile_name).with_overrides(overrides);
    let (profile, options) = request.resolve(&profiles, &config.engine)?;

    let injector: Arc<dyn KeystrokeInjector> = if args.dry_run {
        Arc::new(ConsoleInjector::new())
    } else {
        Arc::new(SendInputInjector::new())
    };
    let engine = SessionEngine::new(&config, injector);

    let mut subscription = engine.subscribe(None)?;
    let id = engine.start(&text, profile, options)?;
    profiles.remember_last_used(&request.to_last_used());

    loop {
        let envelope = tokio::select! {
            envelope = subscription.recv() => envelope,
            _ = tokio::signal::ctrl_c() => {
                info!(session_id = %id, "Interrupted, stopping session");
                engine.stop(id).await?;
                continue;
            }
        };
        let Some(envelope) = envelope else {
            return Err(TypistError::Internal("event stream closed".into()).into());
        };

        match envelope.event {
            SessionEvent::Countdown { count } => eprintln!("Typing in {}...", count),
            SessionEvent::Complete {
                final_wpm,
                final_accuracy,
                chars_typed,
            } => {
                eprintln!(
                    "\nTyped {} characters at {} WPM ({}% accuracy)",
                    chars_typed, final_wpm, final_accuracy
                );
                return Ok(());
            }
            SessionEvent::Stopped => {
                eprintln!("\nStopped");
                return Ok(());
            }
            SessionEvent::Error { message } => {
                return Err(TypistError::Injection(message).into());
            }
            other => tracing::debug!(session_id = %id, event = other.event_name(), "Session event"),
        }
    }
}

fn list_profiles(profiles: &ProfileStore) -> AppResult<()> {
    println!(
        "{:<10} {:>6} {:>10} {:>7} {:>7}",
        "NAME", "WPM", "DELAY(ms)", "TYPOS", "PAUSES"
    );
    for entry in profiles.list()? {
        let p = &entry.profile;
        let typos = if p.typos_enabled {
            format!("{:.1}%", p.typo_chance * 100.0)
        } else {
            "off".to_string()
        };
        println!(
            "{:<10} {:>6.0} {:>10} {:>7} {:>7}",
            p.name,
            p.nominal_wpm(),
            format!("{}-{}", p.min_delay_ms, p.max_delay_ms),
            typos,
            p.pause_frequency
        );
    }
    Ok(())
}

async fn calibrate(config: TypistConfig, profiles: Arc<ProfileStore>) -> AppResult<()> {
    let service = CalibrationService::new(config.calibration.clone(), profiles);
    let reference = service.start()?;

    println!("Type the following passage, then press Enter:\n");
    println!("{}\n", reference);
    std::io::stdout().flush()?;

    let typed = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;

    let progress = service.input(typed.trim_end_matches(['\r', '\n']))?;
    let result = match progress.result {
        Some(result) => result,
        None => {
            warn!(
                typed = progress.typed,
                "Passage not finished; measuring what was typed"
            );
            service.complete()?
        }
    };
    println!(
        "{} WPM, {}% accuracy over {:.1}s",
        result.wpm, result.accuracy, result.elapsed_secs
    );
    println!(
        "Custom profile saved: {}-{} ms per key, typos {}",
        result.derived_profile.min_delay_ms,
        result.derived_profile.max_delay_ms,
        if result.derived_profile.typos_enabled {
            format!("{:.1}%", result.derived_profile.typo_chance * 100.0)
        } else {
            "off".to_string()
        }
    );
    Ok(())
}
