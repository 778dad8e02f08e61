//! Capture pipeline for repcast
//!
//! This module wires the media source to the analyzer transport,
//! separating concerns between:
//! - Control/Coordination: session lifecycle and source switching
//! - Sampling: fixed-cadence frame grabs, mirroring, JPEG encoding
//! - Health monitoring: counters shared across stages
//!
//! # Architecture
//!
//! The sampler runs as its own async task and talks to the transport
//! through a cloneable handle; the coordinator owns every lifecycle and
//! tears them down in a fixed order.

pub mod coordinator;
pub mod health;
pub mod sampler;
pub mod stage;
pub mod types;

pub use coordinator::SessionCoordinator;
pub use health::{HealthSummary, PipelineHealth};
pub use sampler::SamplerStage;
pub use stage::PipelineStage;
pub use types::{RawFrame, SourceKind, Timestamp};
