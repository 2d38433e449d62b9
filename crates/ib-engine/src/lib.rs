//! Ice-breaker generation.
//!
//! - [`summary`]: the structured result and the parser that validates model output
//! - [`prompt`]: composes the single summary prompt from fetched data
//! - [`orchestrator`]: runs lookups and fetches concurrently, then the model call

pub mod orchestrator;
pub mod prompt;
pub mod summary;

pub use orchestrator::{
    GenerationSettings, IceBreaker, IceBreakerReport, LookupFallbacks, SourceOrigins,
    DEFAULT_MODEL,
};
pub use summary::{IceBreakerResult, OutputParser};
