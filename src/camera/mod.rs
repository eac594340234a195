// Camera module - live frame acquisition behind a capture device seam.
// The detection loop only ever sees `FrameSource::current_frame`.

pub mod sequence;
pub mod source;
pub mod types;


pub use sequence::ImageSequenceDevice;
pub use source::{CameraHandle, FrameSource};
pub use types::{CaptureDevice, FacingMode, Frame, StreamRequest, VideoInput, VideoStream};
