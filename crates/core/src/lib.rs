pub mod alerts;
pub mod config;
pub mod detection;
pub mod pipeline;
pub mod preview;
pub mod shared;
pub mod video;
