//! Presentation consumers
//!
//! Everything here derives its output from `StatsProjection` views and
//! the preview buffer; no workout logic lives on this side.

pub mod console;
pub mod preview;

pub use preview::PreviewBuffer;
