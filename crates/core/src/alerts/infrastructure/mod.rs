pub mod command_notifier;
pub mod log_notifier;
