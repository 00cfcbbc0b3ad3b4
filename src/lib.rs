//! Voxflow: hold-to-dictate voice input for Linux
//!
//! This library provides the core functionality for:
//! - Detecting the trigger gesture via evdev (kernel-level, works on all compositors)
//! - Capturing audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Streaming audio into whisper.cpp for incremental transcription
//! - Filtering and transforming finalized text (hot words, punctuation)
//! - Injecting text via wtype/ydotool/clipboard fallback chain
//!
//! # Architecture
//!
//! ```text
//!   ┌─────────┐   start/stop    ┌──────────────────────────────┐
//!   │ Trigger │ ──requests───▶  │       Voice Controller       │
//!   │ (evdev) │                 │      (phase state machine)   │
//!   └─────────┘                 └──────────────────────────────┘
//!                                  │          │            │
//!                     permission   │          │ audio      │ final text
//!                     gate check   │          │ buffers    ▼
//!                  ┌─────────────┐ │          │      ┌──────────────┐
//!                  │ Permissions │◀┘          │      │   Delivery   │
//!                  │  (probed)   │            │      │   Pipeline   │
//!                  └─────────────┘            ▼      └──────────────┘
//!                                   ┌──────────────┐        │ delayed
//!                  ┌──────────────┐ │   Forward    │        ▼
//!                  │    Audio     │▶│     Path     │  ┌──────────────┐
//!                  │    (cpal)    │ └──────────────┘  │   Injector   │
//!                  └──────────────┘        │          │ wtype/ydotool│
//!                                          ▼          │  /clipboard  │
//!                                   ┌──────────────┐  └──────────────┘
//!                                   │  Recognizer  │
//!                                   │ (whisper.cpp │──partial/final──▶ transcript
//!                                   │  streaming)  │
//!                                   └──────────────┘
//! ```
//!
//! The controller serializes every phase transition and event on a single
//! task; at most one recording session exists at any time.

pub mod capture;
pub mod cli;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod delivery;
pub mod error;
pub mod inject;
pub mod permissions;
pub mod phase;
pub mod recognize;
pub mod text;
pub mod transcript;
pub mod trigger;

pub use config::Config;
pub use controller::{ControllerHandle, StatusSnapshot, TranscriptView, VoiceController};
pub use daemon::Daemon;
pub use error::{Result, SessionError, VoxflowError};
pub use phase::Phase;
