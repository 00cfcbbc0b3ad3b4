//! Voxflow - hold-to-dictate voice input for Linux
//!
//! Run with `voxflow` or `voxflow daemon` to start the daemon.
//! Use `voxflow record start/stop` from compositor keybindings.
//! Use `voxflow status` for bar integrations.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxflow::cli::{Cli, Commands, RecordAction};
use voxflow::config::{self, Config, DeliveryMode};
use voxflow::daemon::Daemon;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("voxflow={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if cli.clipboard {
        config.delivery.mode = DeliveryMode::Clipboard;
    }
    if let Some(model) = cli.model {
        config.recognizer.model = model;
    }
    if let Some(key) = cli.trigger_key {
        config.trigger.key = key;
    }
    if cli.toggle {
        config.trigger.mode = config::ActivationMode::Toggle;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }
        Commands::Config => {
            show_config(&config);
        }
        Commands::Status { format } => {
            show_status(&config, &format)?;
        }
        Commands::Record { action } => {
            record_command(&config, action)?;
        }
    }

    Ok(())
}

/// Read the daemon's current state from the state file
fn read_state(config: &Config) -> String {
    config
        .resolve_state_file()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "stopped".to_string())
}

/// Show daemon status, plain or as Waybar JSON
fn show_status(config: &Config, format: &str) -> anyhow::Result<()> {
    let state = read_state(config);

    if format == "json" {
        let (text, tooltip) = match state.as_str() {
            "recording" => ("🎤", "Recording..."),
            "processing" => ("⏳", "Processing..."),
            "ready" => ("🎙️", "Voxflow ready - hold trigger to dictate"),
            "initializing" => ("…", "Voxflow starting"),
            "error" => ("✗", "Voxflow error - check logs"),
            "stopped" => ("", "Voxflow not running"),
            _ => ("?", "Unknown state"),
        };
        let json = serde_json::json!({
            "text": text,
            "class": state,
            "tooltip": tooltip,
        });
        println!("{}", json);
    } else {
        println!("{}", state);
    }

    Ok(())
}

/// Send a control signal to the running daemon
#[cfg(target_os = "linux")]
fn record_command(config: &Config, action: RecordAction) -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid_path = Config::runtime_dir().join("pid");
    let pid: i32 = std::fs::read_to_string(&pid_path)
        .map_err(|e| anyhow::anyhow!("Daemon not running? Failed to read {:?}: {}", pid_path, e))?
        .trim()
        .parse()?;

    let signal = match action {
        RecordAction::Start => Signal::SIGUSR1,
        RecordAction::Stop => Signal::SIGUSR2,
        RecordAction::Toggle => {
            if read_state(config) == "recording" {
                Signal::SIGUSR2
            } else {
                Signal::SIGUSR1
            }
        }
    };

    kill(Pid::from_raw(pid), signal)?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn record_command(_config: &Config, _action: RecordAction) -> anyhow::Result<()> {
    anyhow::bail!("'voxflow record' is only supported on Linux")
}

/// Show current configuration
fn show_config(config: &Config) {
    println!("Current Configuration\n");
    println!("=====================\n");

    println!("[trigger]");
    println!("  key = {:?}", config.trigger.key);
    println!("  modifiers = {:?}", config.trigger.modifiers);
    println!("  mode = {:?}", config.trigger.mode);
    println!("  enabled = {}", config.trigger.enabled);

    println!("\n[audio]");
    println!("  device = {:?}", config.audio.device);
    println!("  sample_rate = {}", config.audio.sample_rate);
    println!("  chunk_ms = {}", config.audio.chunk_ms);

    println!("\n[recognizer]");
    println!("  model = {:?}", config.recognizer.model);
    println!("  language = {:?}", config.recognizer.language);
    println!("  partial_interval_ms = {}", config.recognizer.partial_interval_ms);
    if let Some(threads) = config.recognizer.threads {
        println!("  threads = {}", threads);
    }

    println!("\n[session]");
    println!("  warm_up_ms = {}", config.session.warm_up_ms);
    println!("  settle_ms = {}", config.session.settle_ms);

    println!("\n[delivery]");
    println!("  mode = {:?}", config.delivery.mode);
    println!("  fallback_to_clipboard = {}", config.delivery.fallback_to_clipboard);
    println!("  delay_ms = {}", config.delivery.delay_ms);

    if let Some(ref state_file) = config.state_file {
        println!("\nstate_file = {:?}", state_file);
        if let Some(resolved) = config.resolve_state_file() {
            println!("  (resolves to: {:?})", resolved);
        }
    }

    println!("\n---");
    println!(
        "Config file: {:?}",
        Config::default_path().unwrap_or_else(|| "(not found)".into())
    );
    println!("Models dir: {:?}", Config::models_dir());
}
