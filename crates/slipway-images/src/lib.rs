//! Container image pipeline
//!
//! Derives image coordinates from the build context and drives docker to
//! build, push and remove the images of a run.

pub mod naming;
pub mod pipeline;

pub use naming::{image_name, tag_name, ImageCoordinates};
pub use pipeline::{ImageError, ImagePipeline, DEPLOYABLE_MARKER};
