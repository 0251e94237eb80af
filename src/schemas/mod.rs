//! Record schemas shared across the pipeline
//!
//! `VideoRecord` is what gets written to outputs and the storage sink;
//! `SourceDescriptor` is one row of the curated source list.

pub mod source_descriptor;
pub mod video_record;

pub use source_descriptor::*;
pub use video_record::*;
