//! Pipeline stage trait

use anyhow::Result;
use async_trait::async_trait;

/// A long-running pipeline stage driven by the session coordinator
#[async_trait]
pub trait PipelineStage: Send {
    /// Run the stage until its cancellation token fires
    async fn run(&mut self) -> Result<()>;

    /// Get the name of this stage for logging
    fn name(&self) -> &'static str;
}
