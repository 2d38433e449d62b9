//! ib-tools: Built-in tools for icebreaker
//!
//! The lookup agents have a single tool: a web search used to discover
//! profile pages for a person's name.

pub mod web;

pub use web::{create_web_tools, TavilySearchTool, WebSearchConfig};
