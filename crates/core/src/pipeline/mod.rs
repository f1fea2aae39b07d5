pub mod capture_loop;
pub mod detector_registry;
pub mod frame_pacer;
pub mod habit_monitor;
pub mod pipeline_logger;
