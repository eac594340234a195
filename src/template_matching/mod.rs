/// Template matching module for target detection in camera frames
///
/// This module provides:
/// - A template store that loads and bounds the reference image once
/// - FFT-accelerated zero-mean normalized cross-correlation
/// - A matcher seam so the detection loop can run against test doubles
pub mod correlation;
pub mod matcher;
pub mod store;
pub mod types;

pub use correlation::{CorrelationEngine, ScoreMap};
pub use matcher::{FrameMatcher, NccMatcher, fits};
pub use store::TemplateStore;
pub use types::{MatchResult, Template};
