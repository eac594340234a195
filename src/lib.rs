pub mod args;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod playback;
pub mod screen_flow;
pub mod session;
pub mod template_matching;

#[cfg(test)]
pub mod test_utils;

pub use detection::DetectionLoop;
pub use error::{ViewerError, ViewerResult};
