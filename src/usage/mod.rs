//! Which content records reference which stored files.

pub mod content;
pub mod indexer;

pub use content::{ContentSnapshot, ContentSource, JsonFileContent, StaticContent};
pub use indexer::{FileUsage, SubstringMatcher, Usage, UsageIndexer, UsageMatcher, UsageRef};
