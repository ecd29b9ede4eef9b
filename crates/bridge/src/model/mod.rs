//! Model protocol types and client trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{FunctionCall, ModelClient, ModelReply, ToolCallRequest, ToolCallResult};
