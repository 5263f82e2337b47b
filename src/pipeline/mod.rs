//! Shared pipeline resource: variant catalog, resource gate, and the
//! external compute collaborator seam

pub mod http;
pub mod manager;
pub mod traits;
pub mod variants;

pub use manager::PipelineManager;
pub use traits::{EditOutput, EditPipeline, EditRequest};
pub use variants::{VariantCatalog, VariantSpec};
