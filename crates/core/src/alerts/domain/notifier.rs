use thiserror::Error;

use crate::shared::alert::Severity;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to launch notifier: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("notifier did not finish in time")]
    Timeout,
    #[error("notifier failed: {0}")]
    Failed(String),
}

/// Side-effecting alert delivery: a desktop notification and an audible cue.
///
/// Called only from the dispatcher's drain, never from the capture thread.
pub trait Notifier: Send {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError>;

    fn play_cue(&self, severity: Severity) -> Result<(), NotifyError>;
}
