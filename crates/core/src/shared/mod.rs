pub mod alert;
pub mod clock;
pub mod constants;
pub mod frame;
