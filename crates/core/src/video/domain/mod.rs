pub mod snapshot_writer;
pub mod video_source;
