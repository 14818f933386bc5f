//! Milestone reporting for a run.
//!
//! [`Notifier`] puts user-facing progress under a single verbosity switch:
//! - [`VerbosityLevel::Quiet`] → no info logs; a live spinner shows the current milestone.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → one
//!   `info!` line per milestone.
//!
//! Warnings always go through the logger. The logger itself is installed once by the
//! binary with [`init_logger`].

use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Spinner, no info logs
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Installs `env_logger` as the global logger. `RUST_LOG` still applies on top
/// of the level derived from `verbosity`.
pub fn init_logger(verbosity: VerbosityLevel) {
    env_logger::Builder::from_env(Env::default())
        .filter_level(verbosity.to_log_level())
        .init();
}

pub struct Notifier {
    spinner: Option<ProgressBar>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);
        let spinner = (verbosity == VerbosityLevel::Quiet).then(|| {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}")
            {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });

        Self { spinner }
    }

    /// Reports a milestone.
    pub fn info(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.set_message(message.to_string()),
            None => info!("{}", message),
        }
    }

    pub fn warn(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| warn!("{}", message)),
            None => warn!("{}", message),
        }
    }

    /// Leaves `message` on screen in quiet mode; logs it otherwise.
    pub fn finish(&self, message: &str) {
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message.to_string()),
            None => info!("{}", message),
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        if let Some(spinner) = &self.spinner {
            if !spinner.is_finished() {
                spinner.finish_and_clear();
            }
        }
    }
}
