//! Shared data models for the vtrim media service.
//!
//! This crate provides Serde-serializable types for:
//! - Frame preview and trim requests/responses
//! - Encoding configuration for trimmed clips
//! - Job identity, kind and lifecycle state

pub mod encoding;
pub mod frames;
pub mod job;
pub mod trim;

// Re-export common types
pub use encoding::{sanitize_crf, TrimEncoding, DEFAULT_CRF};
pub use frames::{FrameEntry, FramesRequest, FramesResponse};
pub use job::{JobId, JobKind, JobState};
pub use trim::{TrimRequest, TrimResponse, UploadResponse};
