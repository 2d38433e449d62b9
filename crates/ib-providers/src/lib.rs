//! ib-providers: LLM provider implementations for icebreaker
//!
//! This crate provides implementations of the Provider trait for hosted LLM APIs.

pub mod openai;

pub use openai::OpenAIProvider;
