pub mod monitor_settings;
