pub mod alert_dispatcher;
pub mod domain;
pub mod infrastructure;
