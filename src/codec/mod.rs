//! Text formats for memory files and category indexes.

pub mod frontmatter;
pub mod index;

pub use frontmatter::MemoryCodecError;
pub use index::IndexCodecError;
