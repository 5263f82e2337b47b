//! Seam to the external compute collaborator

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::variants::VariantSpec;

/// One generation request as handed to the collaborator
#[derive(Debug, Clone)]
pub struct EditRequest {
    /// Validated raw image bytes (PNG or JPEG)
    pub image_data: Vec<u8>,
    pub instruction: String,
    /// Filled in by the gate before delegation
    pub seed: Option<i64>,
    pub style_prompt: Option<String>,
}

/// Output artifact produced by the collaborator
#[derive(Debug, Clone)]
pub struct EditOutput {
    /// Encoded PNG bytes
    pub image_data: Vec<u8>,
    /// Seed actually used for the generation
    pub seed: i64,
}

/// The shared compute resource. Both procedures are long-running (tens of
/// seconds to minutes) and must not block the runtime; implementations either
/// await a remote call or hand off to a blocking pool.
#[async_trait]
pub trait EditPipeline: Send + Sync {
    /// Load the given variant, replacing whatever was loaded before
    async fn load(&self, variant: &VariantSpec) -> Result<()>;

    /// Run one generation against the currently loaded variant
    async fn generate(&self, variant: &VariantSpec, request: EditRequest) -> Result<EditOutput>;
}
