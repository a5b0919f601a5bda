//! `.docx` packages as template documents.
//!
//! Only `word/document.xml` is parsed. The body is split into its direct
//! children; `w:p` children are the addressable paragraphs, everything else
//! (tables, section properties, bookmarks) is carried through as raw XML.
//! Every other part of the package is copied unchanged on save.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::document::{ParagraphStyle, TemplateDocument};
use crate::DocxError;

pub const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    xml: String,
    properties: Option<String>,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BodyNode {
    Paragraph(Paragraph),
    SectionProperties(String),
    Other(String),
}

impl BodyNode {
    fn xml(&self) -> &str {
        match self {
            BodyNode::Paragraph(p) => &p.xml,
            BodyNode::SectionProperties(xml) | BodyNode::Other(xml) => xml,
        }
    }
}

/// A `.docx` template opened for editing.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    source: PathBuf,
    package: Vec<u8>,
    head: String,
    nodes: Vec<BodyNode>,
    tail: String,
}

impl DocxDocument {
    pub fn open(path: &Path) -> Result<Self, DocxError> {
        let package = std::fs::read(path).map_err(|source| DocxError::Io {
            action: "read template",
            path: path.to_path_buf(),
            source,
        })?;
        let doc = Self::from_bytes(path, package)?;
        tracing::debug!(path = %path.display(), paragraphs = doc.paragraph_count(), "opened template");
        Ok(doc)
    }

    /// Open from package bytes. `source` is only used in error messages.
    pub fn from_bytes(source: &Path, package: Vec<u8>) -> Result<Self, DocxError> {
        let xml = {
            let mut archive = ZipArchive::new(Cursor::new(package.as_slice())).map_err(|e| {
                DocxError::Zip {
                    path: source.to_path_buf(),
                    source: e,
                }
            })?;
            let mut entry = archive.by_name(DOCUMENT_PART).map_err(|e| match e {
                ZipError::FileNotFound => DocxError::MissingPart {
                    path: source.to_path_buf(),
                    part: DOCUMENT_PART,
                },
                other => DocxError::Zip {
                    path: source.to_path_buf(),
                    source: other,
                },
            })?;
            let mut xml = String::new();
            entry.read_to_string(&mut xml).map_err(|e| DocxError::Io {
                action: "read document part of",
                path: source.to_path_buf(),
                source: e,
            })?;
            xml
        };

        let (head, nodes, tail) = split_body(&xml)?;
        Ok(Self {
            source: source.to_path_buf(),
            package,
            head,
            nodes,
            tail,
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The current `word/document.xml`.
    pub fn document_xml(&self) -> String {
        let mut out = String::with_capacity(self.head.len() + self.tail.len() + self.nodes.len() * 64);
        out.push_str(&self.head);
        for node in &self.nodes {
            out.push_str(node.xml());
        }
        out.push_str(&self.tail);
        out
    }

    fn node_index(&self, index: usize) -> Result<usize, DocxError> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, BodyNode::Paragraph(_)))
            .nth(index)
            .map(|(i, _)| i)
            .ok_or(DocxError::ParagraphIndex {
                index,
                len: self.paragraph_count(),
            })
    }

    fn push_node(&mut self, node: BodyNode) {
        // The body's trailing w:sectPr must stay last.
        match self
            .nodes
            .iter()
            .rposition(|n| matches!(n, BodyNode::SectionProperties(_)))
        {
            Some(i) => self.nodes.insert(i, node),
            None => self.nodes.push(node),
        }
    }

    fn write_package(&self, file: File, path: &Path) -> Result<(), DocxError> {
        let mut archive =
            ZipArchive::new(Cursor::new(self.package.as_slice())).map_err(|e| DocxError::output(path, e))?;
        let mut writer = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i).map_err(|e| DocxError::output(path, e))?;
            if entry.name() == DOCUMENT_PART {
                drop(entry);
                writer
                    .start_file(DOCUMENT_PART, options)
                    .map_err(|e| DocxError::output(path, e))?;
                writer
                    .write_all(self.document_xml().as_bytes())
                    .map_err(|e| DocxError::output(path, e))?;
            } else {
                writer.raw_copy_file(entry).map_err(|e| DocxError::output(path, e))?;
            }
        }
        writer.finish().map_err(|e| DocxError::output(path, e))?;
        Ok(())
    }
}

impl TemplateDocument for DocxDocument {
    fn paragraph_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, BodyNode::Paragraph(_)))
            .count()
    }

    fn paragraph_text(&self, index: usize) -> Option<String> {
        let i = self.node_index(index).ok()?;
        match &self.nodes[i] {
            BodyNode::Paragraph(p) => Some(p.text.clone()),
            _ => None,
        }
    }

    fn set_paragraph_text(&mut self, index: usize, text: &str) -> Result<(), DocxError> {
        let i = self.node_index(index)?;
        if let BodyNode::Paragraph(p) = &mut self.nodes[i] {
            p.xml = paragraph_xml(p.properties.as_deref(), text);
            p.text = text.to_string();
        }
        Ok(())
    }

    fn insert_paragraph_before(
        &mut self,
        index: usize,
        text: &str,
        style: ParagraphStyle,
    ) -> Result<(), DocxError> {
        let i = self.node_index(index)?;
        self.nodes.insert(i, BodyNode::Paragraph(new_paragraph(text, style)));
        Ok(())
    }

    fn remove_paragraph(&mut self, index: usize) -> Result<(), DocxError> {
        let i = self.node_index(index)?;
        self.nodes.remove(i);
        Ok(())
    }

    fn add_paragraph(&mut self, text: &str, style: ParagraphStyle) {
        self.push_node(BodyNode::Paragraph(new_paragraph(text, style)));
    }

    fn add_page_break(&mut self) {
        self.push_node(BodyNode::Paragraph(Paragraph {
            xml: r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#.to_string(),
            properties: None,
            text: String::new(),
        }));
    }

    fn save(&self, path: &Path) -> Result<(), DocxError> {
        let file = DocxError::create_output(path)?;
        // Only a file this call created is removed on failure.
        let result = self.write_package(file, path);
        if result.is_err() {
            let _ = std::fs::remove_file(path);
        }
        result
    }
}

fn new_paragraph(text: &str, style: ParagraphStyle) -> Paragraph {
    let properties = style
        .style_id()
        .map(|id| format!(r#"<w:pPr><w:pStyle w:val="{id}"/></w:pPr>"#));
    Paragraph {
        xml: paragraph_xml(properties.as_deref(), text),
        properties,
        text: text.to_string(),
    }
}

/// One paragraph with a single run. `\n` becomes `w:br`, `\t` becomes `w:tab`.
fn paragraph_xml(properties: Option<&str>, text: &str) -> String {
    let mut out = String::from("<w:p>");
    if let Some(props) = properties {
        out.push_str(props);
    }
    if !text.is_empty() {
        out.push_str("<w:r>");
        let mut segment = String::new();
        for ch in text.chars() {
            match ch {
                '\n' | '\t' => {
                    flush_text(&mut out, &mut segment);
                    out.push_str(if ch == '\n' { "<w:br/>" } else { "<w:tab/>" });
                }
                // Not representable in XML 1.0.
                c if (c as u32) < 0x20 => {}
                c => segment.push(c),
            }
        }
        flush_text(&mut out, &mut segment);
        out.push_str("</w:r>");
    }
    out.push_str("</w:p>");
    out
}

fn flush_text(out: &mut String, segment: &mut String) {
    if segment.is_empty() {
        return;
    }
    out.push_str(r#"<w:t xml:space="preserve">"#);
    out.push_str(&escape(segment.as_str()));
    out.push_str("</w:t>");
    segment.clear();
}

/// Offset of the `<` opening the tag that ends at `end`. Tags never contain a
/// raw `<`, so the last one before `end` is the tag's own.
fn tag_start(xml: &str, end: usize) -> usize {
    xml[..end].rfind('<').unwrap_or(0)
}

/// Split `word/document.xml` into the text up to and including `<w:body>`,
/// the body's direct children, and the text from `</w:body>` on.
///
/// Spans are cut at tag boundaries only; whatever lies between two children
/// (whitespace, comments) is kept as an opaque node.
fn split_body(xml: &str) -> Result<(String, Vec<BodyNode>, String), DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut head_end = 0usize;
    let mut cursor = 0usize;
    let mut child: Option<(usize, ChildKind)> = None;
    let mut nodes = Vec::new();

    let take_gap = |nodes: &mut Vec<BodyNode>, cursor: usize, until: usize| {
        if until > cursor {
            nodes.push(BodyNode::Other(xml[cursor..until].to_string()));
        }
    };

    loop {
        let event = reader.read_event().map_err(|e| DocxError::xml(DOCUMENT_PART, e))?;
        let end = reader.buffer_position();

        match event {
            Event::Start(e) => {
                depth += 1;
                match body_depth {
                    None if e.local_name().as_ref() == b"body" => {
                        body_depth = Some(depth);
                        head_end = end;
                        cursor = end;
                    }
                    Some(body) if depth == body + 1 => {
                        let start = tag_start(xml, end);
                        take_gap(&mut nodes, cursor, start);
                        child = Some((start, ChildKind::of(&e)));
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                match body_depth {
                    Some(body) if depth == body => {
                        let start = tag_start(xml, end);
                        take_gap(&mut nodes, cursor, start);
                        return Ok((xml[..head_end].to_string(), nodes, xml[start..].to_string()));
                    }
                    Some(body) if depth == body + 1 => {
                        if let Some((child_start, kind)) = child.take() {
                            nodes.push(kind.node(&xml[child_start..end])?);
                            cursor = end;
                        }
                    }
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) => match body_depth {
                None if e.local_name().as_ref() == b"body" => {
                    // <w:body/>: give it an explicit open and close tag.
                    let start = tag_start(xml, end);
                    let head = format!("{}<w:body>", &xml[..start]);
                    return Ok((head, nodes, format!("</w:body>{}", &xml[end..])));
                }
                Some(body) if depth == body => {
                    let start = tag_start(xml, end);
                    take_gap(&mut nodes, cursor, start);
                    nodes.push(ChildKind::of(&e).node(&xml[start..end])?);
                    cursor = end;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Err(DocxError::xml(DOCUMENT_PART, "no w:body element"))
}

#[derive(Debug, Clone, Copy)]
enum ChildKind {
    Paragraph,
    SectionProperties,
    Other,
}

impl ChildKind {
    fn of(e: &BytesStart<'_>) -> Self {
        match e.local_name().as_ref() {
            b"p" => ChildKind::Paragraph,
            b"sectPr" => ChildKind::SectionProperties,
            _ => ChildKind::Other,
        }
    }

    fn node(self, raw: &str) -> Result<BodyNode, DocxError> {
        Ok(match self {
            ChildKind::Paragraph => BodyNode::Paragraph(parse_paragraph(raw)?),
            ChildKind::SectionProperties => BodyNode::SectionProperties(raw.to_string()),
            ChildKind::Other => BodyNode::Other(raw.to_string()),
        })
    }
}

fn parse_paragraph(raw: &str) -> Result<Paragraph, DocxError> {
    let mut reader = Reader::from_str(raw);
    let mut depth = 0usize;
    let mut properties: Option<String> = None;
    let mut properties_start: Option<usize> = None;
    let mut in_text = false;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| DocxError::xml(DOCUMENT_PART, e))?;
        let end = reader.buffer_position();

        match event {
            Event::Start(e) => {
                depth += 1;
                let name = e.local_name();
                if depth == 2 && name.as_ref() == b"pPr" {
                    properties_start = Some(tag_start(raw, end));
                } else if properties_start.is_none() && name.as_ref() == b"t" {
                    in_text = true;
                }
            }
            Event::End(e) => {
                if depth == 2 {
                    if let Some(s) = properties_start.take() {
                        properties = Some(raw[s..end].to_string());
                    }
                }
                if e.local_name().as_ref() == b"t" {
                    in_text = false;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Empty(e) => {
                let name = e.local_name();
                if depth == 1 && name.as_ref() == b"pPr" {
                    properties = Some(raw[tag_start(raw, end)..end].to_string());
                } else if properties_start.is_none() {
                    match name.as_ref() {
                        b"tab" => text.push('\t'),
                        b"br" if !is_page_break(&e) => text.push('\n'),
                        b"cr" => text.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(e) if in_text => {
                let unescaped = e.unescape().map_err(|err| DocxError::xml(DOCUMENT_PART, err))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) if in_text => {
                let bytes: Cow<'_, [u8]> = e.into_inner();
                text.push_str(&String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(Paragraph {
        xml: raw.to_string(),
        properties,
        text,
    })
}

fn is_page_break(e: &BytesStart<'_>) -> bool {
    e.attributes()
        .flatten()
        .any(|a| a.key.local_name().as_ref() == b"type" && a.value.as_ref() == b"page")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        "<w:body>",
        r#"<w:p><w:pPr><w:pStyle w:val="Title"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Report</w:t></w:r><w:r><w:t xml:space="preserve"> docs</w:t></w:r></w:p>"#,
        "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>in a table</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
        "<w:p><w:r><w:t>A &amp; B</w:t><w:tab/><w:t>c</w:t><w:br/><w:t>d</w:t></w:r></w:p>",
        "<w:p/>",
        r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#,
        "</w:body></w:document>"
    );

    fn doc() -> DocxDocument {
        let (head, nodes, tail) = split_body(DOC).unwrap();
        DocxDocument {
            source: PathBuf::from("test.docx"),
            package: Vec::new(),
            head,
            nodes,
            tail,
        }
    }

    #[test]
    fn only_body_level_paragraphs_are_addressable() {
        let d = doc();
        assert_eq!(d.paragraph_count(), 3);
        assert_eq!(d.paragraph_text(0).as_deref(), Some("Report docs"));
        assert_eq!(d.paragraph_text(1).as_deref(), Some("A & B\tc\nd"));
        assert_eq!(d.paragraph_text(2).as_deref(), Some(""));
    }

    #[test]
    fn untouched_document_serializes_unchanged() {
        assert_eq!(doc().document_xml(), DOC);
    }

    #[test]
    fn rewrite_keeps_paragraph_properties() {
        let mut d = doc();
        d.set_paragraph_text(0, "Sales <2024>\nline two").unwrap();
        let xml = d.document_xml();
        assert!(xml.contains(
            r#"<w:p><w:pPr><w:pStyle w:val="Title"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t xml:space="preserve">Sales &lt;2024&gt;</w:t><w:br/><w:t xml:space="preserve">line two</w:t></w:r></w:p>"#
        ));
        assert_eq!(d.paragraph_text(0).as_deref(), Some("Sales <2024>\nline two"));
    }

    #[test]
    fn appended_paragraphs_precede_section_properties() {
        let mut d = doc();
        d.add_page_break();
        d.add_heading("Analysis", 1);
        let xml = d.document_xml();
        let heading = xml.find(r#"<w:pStyle w:val="Heading1"/>"#).unwrap();
        let page_break = xml.find(r#"<w:br w:type="page"/>"#).unwrap();
        let sect = xml.find("<w:sectPr>").unwrap();
        assert!(page_break < heading && heading < sect);
        assert_eq!(d.paragraph_count(), 5);
        assert_eq!(d.paragraph_text(3).as_deref(), Some(""));
    }

    #[test]
    fn insert_and_remove_by_paragraph_index() {
        let mut d = doc();
        d.insert_paragraph_before(1, "inserted", ParagraphStyle::Normal).unwrap();
        d.remove_paragraph(2).unwrap();
        assert_eq!(d.paragraph_texts(), vec!["Report docs", "inserted", ""]);
        assert!(d.document_xml().contains("in a table"));
    }

    #[test]
    fn missing_body_is_an_xml_error() {
        let err = split_body("<w:document></w:document>").unwrap_err();
        assert!(matches!(err, DocxError::Xml { .. }));
    }
}
