pub mod annotation;
pub mod preview_publisher;
