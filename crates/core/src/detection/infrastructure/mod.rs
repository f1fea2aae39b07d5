pub mod blink_rate_detector;
pub mod eye_rubbing_detector;
pub mod face_touching_detector;
pub mod focus_detector;
pub mod hydration_detector;
pub mod mouth_breathing_detector;
pub mod replay_perceiver;
