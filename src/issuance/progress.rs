//! User-visible progress lines.

use tracing::{error, info, warn};

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl ProgressLevel {
    /// Label printed in front of a terminal line.
    pub fn prefix(&self) -> &'static str {
        match self {
            ProgressLevel::Info => "",
            ProgressLevel::Success => "Success: ",
            ProgressLevel::Warning => "Warning: ",
            ProgressLevel::Error => "Error: ",
        }
    }
}

/// Sink for the one-line-per-transition messages a workflow emits.
pub trait Progress: Send + Sync {
    fn report(&self, level: ProgressLevel, message: &str);

    fn info(&self, message: &str) {
        self.report(ProgressLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.report(ProgressLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.report(ProgressLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.report(ProgressLevel::Error, message);
    }
}

/// Prints to the terminal: info and success on stdout, the rest on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn report(&self, level: ProgressLevel, message: &str) {
        match level {
            ProgressLevel::Info | ProgressLevel::Success => {
                println!("{}{}", level.prefix(), message)
            }
            ProgressLevel::Warning | ProgressLevel::Error => {
                eprintln!("{}{}", level.prefix(), message)
            }
        }
    }
}

/// Forwards progress to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl Progress for TracingProgress {
    fn report(&self, level: ProgressLevel, message: &str) {
        match level {
            ProgressLevel::Info | ProgressLevel::Success => info!(level = ?level, "{}", message),
            ProgressLevel::Warning => warn!("{}", message),
            ProgressLevel::Error => error!("{}", message),
        }
    }
}
