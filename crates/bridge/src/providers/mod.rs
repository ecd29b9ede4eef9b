//! LLM provider backends.

mod openai;

pub use openai::{ChatClient, ChatClientBuilder};
