// Command-line interface definitions for voxflow
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voxflow")]
#[command(author, version, about = "Hold-to-dictate voice input for Linux")]
#[command(long_about = "
Voxflow is a hold-to-dictate voice input tool for Linux.
Hold a trigger key while speaking; recognized text is typed into the
focused application as you go.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install wtype (Wayland) or ydotool (X11) for typing support
  4. Place a whisper model under the models directory
  5. Run: voxflow (to start the daemon)

USAGE:
  Hold ScrollLock (default) while speaking, release to finish.
  Text is typed at the cursor position, or copied to the clipboard
  as a fallback.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Force clipboard mode (don't try to type)
    #[arg(long)]
    pub clipboard: bool,

    /// Override whisper model (tiny, base, small, medium, large-v3-turbo)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override trigger key (e.g., SCROLLLOCK, PAUSE, F13)
    #[arg(long, value_name = "KEY")]
    pub trigger_key: Option<String>,

    /// Use toggle mode (press to start/stop) instead of hold-to-dictate
    #[arg(long)]
    pub toggle: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Show current configuration
    Config,

    /// Show daemon status (for Waybar/polybar integration)
    Status {
        /// Output format: "text" (default) or "json" (for Waybar)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Control recording from external sources (compositor keybindings, scripts)
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
}

#[derive(Subcommand)]
pub enum RecordAction {
    /// Start recording (send SIGUSR1 to daemon)
    Start,
    /// Stop recording (send SIGUSR2 to daemon)
    Stop,
    /// Toggle recording state
    Toggle,
}
