//! LLM enrichment adapter. Implements `LlmPort` against an OpenAI-compatible
//! chat-completions endpoint.

pub mod openai_adapter;

pub use openai_adapter::OpenAiAdapter;
