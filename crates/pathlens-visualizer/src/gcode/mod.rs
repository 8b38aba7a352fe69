//! G-code toolpath reconstruction
//!
//! This module provides:
//! - Word tokenizing with comment and line-number stripping
//! - Modal toolpath parsing into straight segments
//! - Circular arc reconstruction (offset and radius formats)
//! - Point data extraction for inspection tooltips
//! - The compiler boundary that produces G-code text

pub mod arc;
pub mod compiler;
pub mod parser;
pub mod point_data;
pub mod tokenizer;

pub use arc::{ArcError, ArcSpec};
pub use compiler::{Compiler, PassthroughCompiler};
pub use parser::{ParseWarning, ParseWarningKind, ParsedToolpath, ToolpathParser, ToolpathStats};
pub use point_data::{
    ArcDisplayInfo, ArcSpan, DisplayStrings, PickHit, PointDataExtractor, PointRecord,
};
pub use tokenizer::{strip_comments, tokenize, TokenizedLine, Word};
