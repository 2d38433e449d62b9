//! Lookup agents for icebreaker.
//!
//! This crate provides:
//! - `LookupAgent` trait describing how to find one kind of profile identifier
//! - `LinkedInLookupAgent` and `TwitterLookupAgent`
//! - `IdentityResolver`, the seam the orchestrator calls, and `AgentResolver`,
//!   which answers it by running the bounded agent loop with web search

mod linkedin;
mod resolver;
mod twitter;

pub use linkedin::LinkedInLookupAgent;
pub use resolver::{AgentResolver, IdentityResolver, LookupSettings, NOT_FOUND};
pub use twitter::TwitterLookupAgent;

/// A search-driven agent that resolves a person's name to one identifier.
///
/// The agent itself is pure description: prompts, budget, and how to pull
/// the identifier out of the model's final answer. Running it is the job of
/// [`AgentResolver`].
pub trait LookupAgent: Send + Sync {
    /// Short target name used in logs and errors (e.g. "linkedin").
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn system_prompt(&self) -> &str;

    /// The user turn for a lookup of `name`, with optional disambiguating context.
    fn task(&self, name: &str, context: Option<&str>) -> String;

    /// Tools this agent needs.
    fn tool_names(&self) -> &[&str] {
        &["web_search"]
    }

    /// Maximum model turns for one lookup.
    fn max_iterations(&self) -> usize {
        5
    }

    /// Pull a normalized identifier out of the final answer.
    fn extract(&self, answer: &str) -> Option<String>;
}

/// Append the optional context line shared by both agents' tasks.
fn with_context(mut task: String, context: Option<&str>) -> String {
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        task.push_str(
            "\n\nAdditional context about this person, use it to pick the right profile: ",
        );
        task.push_str(context);
    }
    task
}
