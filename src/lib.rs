//! A Rust library for buffering, reindexing and stitching labelled image
//! frames on an unbounded integer plane.
//!
//! The map buffer accepts a stream of rectangular integer-labelled frames,
//! keeps a bounded sliding window of the most recent ones, optionally
//! shifts labels so every frame owns a unique numeric range, and optionally
//! stitches connected components that straddle frame boundaries into a
//! single global identifier. Arbitrary rectangles can be read back with
//! zero fill outside the covered area, and the last frame can be read
//! "jointed": expanded to include every completed stitched object touching
//! it.
//!
//! # Quick Start
//!
//! ```
//! use map_buffer::{IRect, JointReadOptions, MapBuffer, Matrix};
//!
//! # fn main() -> map_buffer::Result<()> {
//! let mut buffer = MapBuffer::builder(16)
//!     .with_auto_reindex(true)
//!     .with_stitch_labels(true)
//!     .with_zero_is_background(true)
//!     .build()?;
//!
//! // Frames arrive in scan order with explicit positions.
//! buffer.add_frame(Matrix::from_i32(2, 2, vec![0, 1, 1, 1])?, (0, 0), None, false)?;
//! buffer.add_frame(Matrix::from_i32(2, 2, vec![1, 0, 1, 0])?, (2, 0), None, false)?;
//!
//! // Read any rectangle back; uncovered pixels are zero.
//! let mosaic = buffer.read_matrix(IRect::new(0, 3, 0, 1)?)?;
//! assert_eq!(mosaic.dimensions(), (4, 2));
//!
//! // Read the last frame with stitched objects assembled around it.
//! let jointed = buffer.read_last_frame_jointed(&JointReadOptions::default())?;
//! assert!(jointed.frame.position().contains(0, 0));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Sliding window**: a bounded FIFO of frames; the oldest is evicted
//!   on overflow.
//! - **Auto reindexing**: labels of each added frame are shifted by a
//!   running base so identifiers never collide across frames.
//! - **Object stitching**: labels meeting at adjacent frame boundaries are
//!   matched by minimum-cost linking and merged through a union-find.
//! - **Jointed reads**: the last frame expanded to the completed objects
//!   that touch it, with optional cropping, padding and sequential
//!   relabelling.
//! - **Optional parallelism**: enable the `rayon` feature for block-
//!   parallel label passes.

// Core modules
pub mod graph;
pub mod image;
pub mod labels;
pub mod map;
pub mod utils;

// Public map-buffer API
pub use map::{
    Frame, JointReadOptions, JointedFrame, JointingTooLargeObjects, MapBuffer, MapBufferBuilder,
};

// Registry access
pub use map::registry;
pub use map::registry::MapBufferRef;

// Matrix and geometry types
pub use image::{ChannelData, ElementType, IRect, Matrix, Samples};

// Label bookkeeping
pub use labels::{DisjointSet, ObjectPairLog, MAX_LABEL};

// Error types
pub use utils::error::{MapError, Result};

// Constants
pub const MAP_BUFFER_VERSION: &str = "0.4.0";
