use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::alerts::domain::notifier::Notifier;
use crate::shared::alert::Alert;
use crate::shared::clock::Clock;
use crate::shared::constants::{DEFAULT_DISPATCH_COOLDOWN, NOTIFICATION_TITLE};

/// Producer end of the alert queue. Cheap to clone; sending never blocks.
pub type AlertSender = Sender<Alert>;

pub fn alert_channel() -> (AlertSender, Receiver<Alert>) {
    crossbeam_channel::unbounded()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Minimum spacing between deliveries for the same detector id.
    pub cooldown: Duration,
    pub title: String,
    pub notifications_enabled: bool,
    pub audio_enabled: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_DISPATCH_COOLDOWN,
            title: NOTIFICATION_TITLE.to_string(),
            notifications_enabled: true,
            audio_enabled: true,
        }
    }
}

/// What one drain did with the queued alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub delivered: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// Consumes queued alerts on the caller's thread, rate-limits them per
/// detector id and hands survivors to the notifier.
///
/// This cooldown is separate from the per-detector one: an alert must pass
/// both to reach the user.
pub struct AlertDispatcher {
    receiver: Receiver<Alert>,
    notifier: Box<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    last_delivered: HashMap<String, Instant>,
}

impl AlertDispatcher {
    pub fn new(
        receiver: Receiver<Alert>,
        notifier: Box<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            receiver,
            notifier,
            clock,
            config,
            last_delivered: HashMap::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn on_cooldown(&self, detector_id: &str, now: Instant) -> bool {
        self.last_delivered
            .get(detector_id)
            .is_some_and(|last| now.saturating_duration_since(*last) < self.config.cooldown)
    }

    /// Empties the queue without blocking.
    pub fn drain(&mut self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let alert = match self.receiver.try_recv() {
                Ok(alert) => alert,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            let now = self.clock.now();
            if self.on_cooldown(&alert.detector_id, now) {
                log::debug!("Suppressed alert from {} (cooldown)", alert.detector_id);
                report.suppressed += 1;
                continue;
            }
            if self.deliver(&alert) {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
            self.last_delivered.insert(alert.detector_id, now);
        }
        report
    }

    /// Returns false if any enabled channel failed; failures never stop the drain.
    fn deliver(&self, alert: &Alert) -> bool {
        let mut ok = true;
        if self.config.notifications_enabled {
            if let Err(e) = self.notifier.notify(&self.config.title, &alert.message) {
                log::warn!("Notification for {} failed: {e}", alert.detector_id);
                ok = false;
            }
        }
        if self.config.audio_enabled {
            if let Err(e) = self.notifier.play_cue(alert.severity) {
                log::warn!("Alert sound for {} failed: {e}", alert.detector_id);
                ok = false;
            }
        }
        ok
    }
}
