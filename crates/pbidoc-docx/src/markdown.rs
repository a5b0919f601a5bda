//! Markdown narrative → styled paragraphs.
//!
//! Block structure maps to paragraph styles; inline formatting is flattened
//! to plain text. Code blocks keep their line breaks.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::document::ParagraphStyle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledParagraph {
    pub text: String,
    pub style: ParagraphStyle,
}

impl StyledParagraph {
    fn new(text: impl Into<String>, style: ParagraphStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

pub fn markdown_to_paragraphs(markdown: &str) -> Vec<StyledParagraph> {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES);

    let mut out = Vec::new();
    // Innermost list decides bullet vs number.
    let mut lists: Vec<bool> = Vec::new();
    let mut current: Option<(String, ParagraphStyle)> = None;
    let mut in_table_cell = false;

    let flush = |current: &mut Option<(String, ParagraphStyle)>, out: &mut Vec<StyledParagraph>| {
        if let Some((text, style)) = current.take() {
            let text = text.trim_end().to_string();
            if !text.trim().is_empty() {
                out.push(StyledParagraph::new(text, style));
            }
        }
    };

    let list_style = |lists: &[bool]| match lists.last() {
        Some(true) => ParagraphStyle::ListNumber,
        Some(false) => ParagraphStyle::ListBullet,
        None => ParagraphStyle::Normal,
    };

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut current, &mut out);
                current = Some((String::new(), ParagraphStyle::Heading(level as u8)));
            }
            Event::Start(Tag::Paragraph) => {
                // A paragraph inside a list item continues the item's text.
                if current.is_none() {
                    current = Some((String::new(), list_style(&lists)));
                }
            }
            Event::Start(Tag::List(start)) => {
                flush(&mut current, &mut out);
                lists.push(start.is_some());
            }
            Event::End(TagEnd::List(_)) => {
                flush(&mut current, &mut out);
                lists.pop();
            }
            Event::Start(Tag::Item) => {
                flush(&mut current, &mut out);
                current = Some((String::new(), list_style(&lists)));
            }
            Event::Start(Tag::CodeBlock(_)) => {
                flush(&mut current, &mut out);
                current = Some((String::new(), ParagraphStyle::Normal));
            }
            Event::Start(Tag::TableRow) | Event::Start(Tag::TableHead) => {
                flush(&mut current, &mut out);
                current = Some((String::new(), ParagraphStyle::Normal));
            }
            Event::Start(Tag::TableCell) => {
                if let Some((text, _)) = current.as_mut() {
                    if in_table_cell || !text.is_empty() {
                        text.push('\t');
                    }
                }
                in_table_cell = true;
            }
            Event::End(TagEnd::TableCell) => in_table_cell = false,
            Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::TableRow)
            | Event::End(TagEnd::TableHead) => flush(&mut current, &mut out),
            Event::Text(text) | Event::Code(text) | Event::InlineMath(text) | Event::DisplayMath(text) => {
                current
                    .get_or_insert_with(|| (String::new(), list_style(&lists)))
                    .0
                    .push_str(&text);
            }
            Event::SoftBreak => {
                if let Some((text, _)) = current.as_mut() {
                    text.push(' ');
                }
            }
            Event::HardBreak => {
                if let Some((text, _)) = current.as_mut() {
                    text.push('\n');
                }
            }
            Event::Rule => flush(&mut current, &mut out),
            _ => {}
        }
    }
    flush(&mut current, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_lists_and_body() {
        let md = "# Sales Report\n\nThe report tracks **revenue** and `margin`.\n\n## Pages\n\n- Overview\n- Detail\n\n1. First\n2. Second\n";
        let paras = markdown_to_paragraphs(md);
        assert_eq!(
            paras,
            vec![
                StyledParagraph::new("Sales Report", ParagraphStyle::Heading(1)),
                StyledParagraph::new("The report tracks revenue and margin.", ParagraphStyle::Normal),
                StyledParagraph::new("Pages", ParagraphStyle::Heading(2)),
                StyledParagraph::new("Overview", ParagraphStyle::ListBullet),
                StyledParagraph::new("Detail", ParagraphStyle::ListBullet),
                StyledParagraph::new("First", ParagraphStyle::ListNumber),
                StyledParagraph::new("Second", ParagraphStyle::ListNumber),
            ]
        );
    }

    #[test]
    fn soft_breaks_join_lines() {
        let paras = markdown_to_paragraphs("one\ntwo");
        assert_eq!(paras, vec![StyledParagraph::new("one two", ParagraphStyle::Normal)]);
    }

    #[test]
    fn code_blocks_keep_lines() {
        let paras = markdown_to_paragraphs("```\nSUM(x)\nAVG(y)\n```\n");
        assert_eq!(paras, vec![StyledParagraph::new("SUM(x)\nAVG(y)", ParagraphStyle::Normal)]);
    }

    #[test]
    fn plain_text_is_one_paragraph() {
        assert_eq!(markdown_to_paragraphs("").len(), 0);
        assert_eq!(
            markdown_to_paragraphs("AI analysis unavailable due to an error."),
            vec![StyledParagraph::new(
                "AI analysis unavailable due to an error.",
                ParagraphStyle::Normal
            )]
        );
    }
}
