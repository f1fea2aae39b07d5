use crate::alerts::domain::notifier::{NotifyError, Notifier};
use crate::shared::alert::Severity;

/// Delivers alerts to the log instead of the desktop. Used headless and in CI.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        log::info!("[{title}] {message}");
        Ok(())
    }

    fn play_cue(&self, severity: Severity) -> Result<(), NotifyError> {
        log::debug!("Alert cue ({severity})");
        Ok(())
    }
}
