use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::alerts::domain::notifier::{NotifyError, Notifier};
use crate::shared::alert::Severity;
use crate::shared::constants::NOTIFICATION_TIMEOUT;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// Delivers alerts through the desktop's own command-line tools:
/// `osascript`/`afplay` on macOS, `notify-send`/`paplay` elsewhere.
pub struct CommandNotifier {
    platform: Platform,
    timeout: Duration,
}

impl CommandNotifier {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            timeout: NOTIFICATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn notification_command(&self, title: &str, message: &str) -> Command {
        match self.platform {
            Platform::MacOs => {
                let script = format!(
                    "display notification \"{}\" with title \"{}\"",
                    escape_applescript(message),
                    escape_applescript(title)
                );
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(script);
                cmd
            }
            Platform::Linux => {
                let mut cmd = Command::new("notify-send");
                cmd.arg("--app-name").arg(title).arg(title).arg(message);
                cmd
            }
        }
    }

    fn sound_command(&self, severity: Severity) -> (&'static str, &'static str) {
        match (self.platform, severity) {
            (Platform::MacOs, Severity::High) => ("afplay", "/System/Library/Sounds/Sosumi.aiff"),
            (Platform::MacOs, Severity::Normal) => ("afplay", "/System/Library/Sounds/Glass.aiff"),
            (Platform::Linux, Severity::High) => (
                "paplay",
                "/usr/share/sounds/freedesktop/stereo/dialog-warning.oga",
            ),
            (Platform::Linux, Severity::Normal) => {
                ("paplay", "/usr/share/sounds/freedesktop/stereo/message.oga")
            }
        }
    }
}

impl Default for CommandNotifier {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        run_bounded(self.notification_command(title, message), self.timeout)
    }

    /// Fire-and-forget: the sound process is left to finish on its own.
    fn play_cue(&self, severity: Severity) -> Result<(), NotifyError> {
        let (program, sound) = self.sound_command(severity);
        if !Path::new(sound).exists() {
            log::debug!("Sound {sound} not found, skipping cue");
            return Ok(());
        }
        Command::new(program)
            .arg(sound)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Runs `cmd` to completion, killing it if it outlives `timeout`.
fn run_bounded(mut cmd: Command, timeout: Duration) -> Result<(), NotifyError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            return if status.success() {
                Ok(())
            } else {
                Err(NotifyError::Failed(format!("exited with {status}")))
            };
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(NotifyError::Timeout);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_macos_notification_uses_osascript_with_escaped_text() {
        let notifier = CommandNotifier::new(Platform::MacOs);
        let cmd = notifier.notification_command("Habit Monitor", "Say \"hi\"");
        assert_eq!(cmd.get_program(), "osascript");
        assert_eq!(
            args(&cmd),
            vec![
                "-e".to_string(),
                "display notification \"Say \\\"hi\\\"\" with title \"Habit Monitor\"".to_string()
            ]
        );
    }

    #[test]
    fn test_linux_notification_uses_notify_send() {
        let notifier = CommandNotifier::new(Platform::Linux);
        let cmd = notifier.notification_command("Habit Monitor", "Blink more!");
        assert_eq!(cmd.get_program(), "notify-send");
        assert_eq!(args(&cmd).last().unwrap(), "Blink more!");
    }

    #[rstest::rstest]
    #[case(Platform::MacOs, Severity::Normal, "Glass.aiff")]
    #[case(Platform::MacOs, Severity::High, "Sosumi.aiff")]
    #[case(Platform::Linux, Severity::High, "dialog-warning.oga")]
    fn test_sound_by_severity(
        #[case] platform: Platform,
        #[case] severity: Severity,
        #[case] expected: &str,
    ) {
        let (_, sound) = CommandNotifier::new(platform).sound_command(severity);
        assert!(sound.ends_with(expected));
    }

    #[test]
    fn test_escape_backslashes_before_quotes() {
        assert_eq!(escape_applescript(r#"a\"b"#), r#"a\\\"b"#);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_bounded_success_and_failure() {
        assert!(run_bounded(Command::new("true"), Duration::from_secs(5)).is_ok());
        assert!(matches!(
            run_bounded(Command::new("false"), Duration::from_secs(5)),
            Err(NotifyError::Failed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_bounded_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("10");
        let started = Instant::now();
        let result = run_bounded(cmd, Duration::from_millis(100));
        assert!(matches!(result, Err(NotifyError::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = run_bounded(
            Command::new("definitely-not-a-notifier-binary"),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(NotifyError::Spawn(_))));
    }
}
