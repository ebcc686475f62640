//! Output schema types.
//!
//! Every extraction path produces the same shape: an ordered list of pages,
//! each owning an ordered list of typed [`ContentItem`]s. Items are appended
//! once and never mutated afterwards; a refined result replaces them
//! wholesale.

mod content;
mod document;
mod page;
mod result;

pub use content::{table_is_empty, ContentItem, ImageRef, TableData};
pub use document::SourceDocument;
pub use page::Page;
pub use result::{ParseResult, ParsedDocument};
