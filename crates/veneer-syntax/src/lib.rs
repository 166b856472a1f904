/// Veneer template syntax
///
/// Parses the mustache-style markup dialect into an AST in which every node
/// carries byte offsets into the original source. The transform layer relies
/// on those offsets to build its bidirectional position mappings, so the
/// parser never normalizes or re-slices text.

pub mod ast;
pub mod parser;
pub mod span;

pub use ast::*;
pub use parser::{parse, SyntaxError};
pub use span::Range;
