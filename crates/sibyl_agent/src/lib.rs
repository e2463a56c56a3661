//! The agent core: oracle protocol types, tool declarations, the tool
//! executor, and the conversation loop that ties them together.

pub mod api_types;
pub mod conversation;
pub mod oracle;
pub mod prompt;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod schema;

pub use api_types::{ContentBlock, Message, Role, Tool};
pub use conversation::Conversation;
pub use oracle::{CompletionParams, Oracle};
pub use registry::{execute_tool, ToolId};
pub use schema::{build_declarations, sanitize_schema};
