use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sysinfo::System;

use keyclack::audio_system::{
    AudioPlatform, HeadlessPlatform, KeySoundEngine, RodioPlatform, SystemClock,
};
use keyclack::config::Config;
use keyclack::error::AppResult;
use keyclack::messaging::{Command, Event, EventBus};
use keyclack::orchestrator::Orchestrator;
use keyclack::settings::JsonSettingsStore;
use keyclack::sound::{synth, SoundCatalog, SoundKey};
use keyclack::listener;

const LOG_TARGET_STARTUP: &str = "keyclack::startup";

#[derive(Parser)]
#[command(name = "keyclack")]
#[command(about = "Mechanical keyboard sounds for every keystroke", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Play into a silent backend instead of the audio device
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen to the keyboard and play sounds (default)
    Run,
    /// Write the synthesized click pack as WAV files
    Render {
        /// Output directory; usable as a `directory` sound source
        dir: PathBuf,
    },
    /// Preload the sound pack and print diagnostics as JSON
    Stats,
}

/// Initialize tracing with file rotation
///
/// Logs are written to `<config dir>/KeyClack/logs/keyclack.YYYY-MM-DD.log`.
/// Debug builds also log to the console.
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Config::app_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| PathBuf::from("logs"));

    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "keyclack.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting keyclack v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);
}

fn load_config(path: Option<&Path>) -> AppResult<(Config, PathBuf)> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok((config, path))
}

fn build_engine(config: &Config, headless: bool) -> KeySoundEngine {
    let platform: Box<dyn AudioPlatform> = if headless {
        Box::new(HeadlessPlatform::auto_complete())
    } else {
        Box::new(RodioPlatform)
    };
    KeySoundEngine::new(
        config.engine.clone(),
        platform,
        config.engine.sound_source.fetcher(),
        Arc::new(SystemClock::new()),
    )
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    initialize_tracing();
    log_runtime_environment();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config.as_deref(), cli.headless),
        Commands::Render { dir } => render(&dir),
        Commands::Stats => stats(cli.config.as_deref(), cli.headless),
    }
}

fn run(config_path: Option<&Path>, headless: bool) -> AppResult<()> {
    let (config, path) = load_config(config_path)?;
    let config_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let settings_path = config.settings_file(&config_dir);

    let bus = EventBus::new();
    let (events, _id) = bus.subscribe();
    thread::Builder::new()
        .name("status".to_string())
        .spawn(move || {
            for event in events {
                match &event {
                    Event::Ready { .. }
                    | Event::InitFailed { .. }
                    | Event::MuteToggled { .. }
                    | Event::VolumeChanged { .. }
                    | Event::SettingsChanged { .. }
                    | Event::ErrorOccurred { .. } => println!("{}", event.description()),
                    Event::Stats {
                        preloading,
                        concurrency,
                    } => {
                        let report = serde_json::json!({
                            "preloading": preloading,
                            "concurrency": concurrency,
                        });
                        match serde_json::to_string_pretty(&report) {
                            Ok(json) => println!("{}", json),
                            Err(e) => tracing::warn!("Failed to format stats: {}", e),
                        }
                    }
                    Event::Shutdown => break,
                    _ => tracing::trace!("{}", event.description()),
                }
            }
        })
        .context("Failed to start status thread")?;

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    listener::spawn(config.mute_hotkey.clone(), command_tx.clone())
        .context("Failed to start keyboard listener")?;
    spawn_console(command_tx).context("Failed to start console")?;

    let engine = build_engine(&config, headless);
    let store = JsonSettingsStore::new(&settings_path);
    let mut orchestrator = Orchestrator::new(engine, Box::new(store), bus)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    println!(
        "keyclack running. Mute: {}. Type `set <json>`, `volume <n>`, `mute`, `stats` or `quit`.",
        config.mute_hotkey.format()
    );
    orchestrator.run(command_rx);
    Ok(())
}

/// Read console commands from stdin until EOF
fn spawn_console(commands: crossbeam_channel::Sender<Command>) -> std::io::Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                match Command::parse(&line) {
                    Ok(Some(command)) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
            tracing::debug!("Console input closed");
        })
        .map(|_| ())
}

fn render(dir: &Path) -> AppResult<()> {
    for key in SoundKey::all() {
        let path = dir.join(SoundCatalog::asset_path(key));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let wav = synth::render_wav(key).with_context(|| format!("Failed to render {}", key))?;
        fs::write(&path, wav).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ {} -> {}", key, path.display());
    }
    tracing::info!("Rendered click pack to {}", dir.display());
    Ok(())
}

fn stats(config_path: Option<&Path>, headless: bool) -> AppResult<()> {
    let (config, _) = load_config(config_path)?;
    let mut engine = build_engine(&config, headless);
    engine
        .initialize()
        .context("Failed to initialize sound engine")?;

    let report = serde_json::json!({
        "preloading": engine.preloading_stats(),
        "concurrency": engine.concurrent_sounds_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    engine.destroy();
    Ok(())
}
