//! Frames, the map buffer, the cross-boundary stitcher and the registry.

pub mod frame;
pub mod map_buffer;
pub mod registry;
pub mod stitcher;

// Re-export commonly used items
pub use frame::Frame;
pub use map_buffer::{MapBuffer, MapBufferBuilder};
pub use registry::{MapBufferRef, FIRST_BUFFER_ID};
pub use stitcher::{JointReadOptions, JointedFrame, JointingTooLargeObjects};
