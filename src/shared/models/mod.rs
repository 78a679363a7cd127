pub mod conversation;
pub mod outcome;
pub mod search;

pub use conversation::{Conversation, ConversationTurn, Role};
pub use outcome::{ExecutionOutcome, FailureKind, FileEntry};
pub use search::SearchResult;
