pub mod counters;
pub mod detector;
pub mod landmarks;
pub mod monitored_detector;
pub mod perceiver;
