//! These models represent the objects passed between a caller and a provider.
//!
//! A caller builds [`message::ConversationMessage`] values and describes its tools
//! with [`tool::ToolDescriptor`]. Providers translate both into their own wire format
//! and hand back a normalized [`message::ChatMessage`], which is either prose or a
//! list of [`tool::ToolInvocation`]s. The internal models are not an exact match for
//! any provider format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
