//! pbidoc document assembly
//!
//! Fills a `.docx` template with a report model's narrative:
//! - [`document`]: the [`TemplateDocument`] abstraction and an in-memory one
//! - [`docx`]: [`DocxDocument`], the Office Open XML implementation
//! - [`markdown`]: Markdown narrative → styled paragraphs
//! - [`assembler`]: label substitution, marker insertion, append, versioned save

pub mod assembler;
pub mod document;
pub mod docx;
pub mod error;
pub mod markdown;

pub use assembler::{
    assemble, save_versioned, AssemblyOptions, AssemblyReport, AssemblyStrategy, RenderMode,
};
pub use document::{MemoryBlock, MemoryDocument, ParagraphStyle, TemplateDocument};
pub use docx::DocxDocument;
pub use error::DocxError;
pub use markdown::{markdown_to_paragraphs, StyledParagraph};
