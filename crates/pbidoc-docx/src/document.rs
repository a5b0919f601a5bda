//! The template document abstraction.
//!
//! Paragraphs are addressed by their position among the body's top-level
//! paragraphs. Text uses `\n` for a line break and `\t` for a tab.

use std::io::Write;
use std::path::Path;

use crate::DocxError;

/// Paragraph style applied to inserted or appended paragraphs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParagraphStyle {
    #[default]
    Normal,
    /// Heading level, clamped to 1..=9 when written.
    Heading(u8),
    ListBullet,
    ListNumber,
}

impl ParagraphStyle {
    /// Word style id, `None` for the default paragraph style.
    pub fn style_id(self) -> Option<String> {
        match self {
            ParagraphStyle::Normal => None,
            ParagraphStyle::Heading(level) => Some(format!("Heading{}", level.clamp(1, 9))),
            ParagraphStyle::ListBullet => Some("ListBullet".to_string()),
            ParagraphStyle::ListNumber => Some("ListNumber".to_string()),
        }
    }
}

pub trait TemplateDocument {
    fn paragraph_count(&self) -> usize;

    fn paragraph_text(&self, index: usize) -> Option<String>;

    /// Replace the paragraph's text, keeping its paragraph properties.
    fn set_paragraph_text(&mut self, index: usize, text: &str) -> Result<(), DocxError>;

    /// Insert a new paragraph directly before paragraph `index`.
    fn insert_paragraph_before(
        &mut self,
        index: usize,
        text: &str,
        style: ParagraphStyle,
    ) -> Result<(), DocxError>;

    fn remove_paragraph(&mut self, index: usize) -> Result<(), DocxError>;

    /// Append a paragraph at the end of the body.
    fn add_paragraph(&mut self, text: &str, style: ParagraphStyle);

    fn add_heading(&mut self, text: &str, level: u8) {
        self.add_paragraph(text, ParagraphStyle::Heading(level));
    }

    fn add_page_break(&mut self);

    /// Write the document to exactly `path`. An existing file is left alone
    /// and reported as [`DocxError::OutputExists`].
    fn save(&self, path: &Path) -> Result<(), DocxError>;

    fn paragraph_texts(&self) -> Vec<String> {
        (0..self.paragraph_count())
            .filter_map(|i| self.paragraph_text(i))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryBlock {
    Paragraph { text: String, style: ParagraphStyle },
    PageBreak,
}

/// Paragraph list held in memory. Page breaks are kept as their own blocks
/// but are not counted as paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDocument {
    blocks: Vec<MemoryBlock>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paragraphs<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocks: texts
                .into_iter()
                .map(|t| MemoryBlock::Paragraph {
                    text: t.into(),
                    style: ParagraphStyle::Normal,
                })
                .collect(),
        }
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    fn block_index(&self, index: usize) -> Result<usize, DocxError> {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(b, MemoryBlock::Paragraph { .. }))
            .nth(index)
            .map(|(i, _)| i)
            .ok_or(DocxError::ParagraphIndex {
                index,
                len: self.paragraph_count(),
            })
    }

    /// Plain-text rendering, one block per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            match block {
                MemoryBlock::Paragraph { text, style } => match style.style_id() {
                    Some(id) => out.push_str(&format!("[{id}] {text}\n")),
                    None => out.push_str(&format!("{text}\n")),
                },
                MemoryBlock::PageBreak => out.push_str("\u{c}\n"),
            }
        }
        out
    }
}

impl TemplateDocument for MemoryDocument {
    fn paragraph_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, MemoryBlock::Paragraph { .. }))
            .count()
    }

    fn paragraph_text(&self, index: usize) -> Option<String> {
        let i = self.block_index(index).ok()?;
        match &self.blocks[i] {
            MemoryBlock::Paragraph { text, .. } => Some(text.clone()),
            MemoryBlock::PageBreak => None,
        }
    }

    fn set_paragraph_text(&mut self, index: usize, new_text: &str) -> Result<(), DocxError> {
        let i = self.block_index(index)?;
        if let MemoryBlock::Paragraph { text, .. } = &mut self.blocks[i] {
            *text = new_text.to_string();
        }
        Ok(())
    }

    fn insert_paragraph_before(
        &mut self,
        index: usize,
        text: &str,
        style: ParagraphStyle,
    ) -> Result<(), DocxError> {
        let i = self.block_index(index)?;
        self.blocks.insert(
            i,
            MemoryBlock::Paragraph {
                text: text.to_string(),
                style,
            },
        );
        Ok(())
    }

    fn remove_paragraph(&mut self, index: usize) -> Result<(), DocxError> {
        let i = self.block_index(index)?;
        self.blocks.remove(i);
        Ok(())
    }

    fn add_paragraph(&mut self, text: &str, style: ParagraphStyle) {
        self.blocks.push(MemoryBlock::Paragraph {
            text: text.to_string(),
            style,
        });
    }

    fn add_page_break(&mut self) {
        self.blocks.push(MemoryBlock::PageBreak);
    }

    fn save(&self, path: &Path) -> Result<(), DocxError> {
        let mut file = DocxError::create_output(path)?;
        file.write_all(self.render().as_bytes())
            .map_err(|e| DocxError::output(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_breaks_do_not_shift_paragraph_indices() {
        let mut doc = MemoryDocument::from_paragraphs(["a", "b"]);
        doc.add_page_break();
        doc.add_heading("H", 1);
        assert_eq!(doc.paragraph_count(), 3);
        assert_eq!(doc.paragraph_text(2).as_deref(), Some("H"));
        assert_eq!(doc.blocks().len(), 4);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut doc = MemoryDocument::from_paragraphs(["only"]);
        assert!(matches!(
            doc.remove_paragraph(3),
            Err(DocxError::ParagraphIndex { index: 3, len: 1 })
        ));
    }

    #[test]
    fn heading_levels_are_clamped() {
        assert_eq!(ParagraphStyle::Heading(0).style_id().as_deref(), Some("Heading1"));
        assert_eq!(ParagraphStyle::Heading(12).style_id().as_deref(), Some("Heading9"));
        assert_eq!(ParagraphStyle::Normal.style_id(), None);
    }
}
