//! These models represent the objects passed around by the agent
//!
//! The agent talks to two formats:
//! - openai chat-completions messages/tools, sent from the agent to the LLM
//! - tool calls, dispatched from the agent to the tool registry
//!
//! We always immediately convert the wire format into the internal structs using the
//! helpers in `providers::utils`, so the rest of the crate only sees these types.
pub mod message;
pub mod role;
pub mod tool;
