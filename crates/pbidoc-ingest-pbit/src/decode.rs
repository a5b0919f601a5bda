//! UTF-16LE document decoding.
//!
//! `Report/Layout` and `DataModelSchema` are stored as UTF-16LE JSON text.
//! Reading them as UTF-8 silently corrupts every string downstream, so the
//! decode is explicit and strict.

use serde_json::{Map, Value};

use crate::error::{IngestError, Utf16Error};

const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// Decode UTF-16LE bytes (optional BOM) into a `String`.
pub fn decode_utf16le(bytes: &[u8]) -> Result<String, Utf16Error> {
    let body = bytes.strip_prefix(&UTF16LE_BOM[..]).unwrap_or(bytes);
    if body.len() % 2 != 0 {
        return Err(Utf16Error::OddLength(body.len()));
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let text = String::from_utf16(&units)?;
    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Decode and parse one package document.
pub fn parse_document(document: &'static str, bytes: &[u8]) -> Result<Value, IngestError> {
    let text = decode_utf16le(bytes).map_err(|e| IngestError::DocumentDecode {
        document,
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| IngestError::DocumentDecode {
        document,
        reason: e.to_string(),
    })
}

/// Like [`parse_document`], but a failure yields an empty object.
///
/// Extractors treat an empty object as a document with no sections / tables.
pub fn parse_document_or_empty(document: &'static str, bytes: &[u8]) -> Value {
    match parse_document(document, bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(document, error = %err, "document unreadable; continuing with an empty one");
            Value::Object(Map::new())
        }
    }
}

/// Encode text as UTF-16LE with a BOM, the way the package stores it.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + text.len() * 2);
    out.extend_from_slice(&UTF16LE_BOM);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_with_and_without_bom() {
        let with_bom = encode_utf16le("{\"a\":\"Relatório\"}");
        assert_eq!(decode_utf16le(&with_bom).unwrap(), "{\"a\":\"Relatório\"}");
        assert_eq!(decode_utf16le(&with_bom[2..]).unwrap(), "{\"a\":\"Relatório\"}");
    }

    #[test]
    fn decode_errors_are_typed() {
        assert!(matches!(decode_utf16le(&[0x41, 0x00, 0x42]), Err(Utf16Error::OddLength(3))));
        // Lone high surrogate.
        assert!(matches!(decode_utf16le(&[0x00, 0xD8]), Err(Utf16Error::Invalid(_))));
    }

    #[test]
    fn odd_length_is_a_decode_error() {
        let err = parse_document("layout", &[0xFF, 0xFE, b'{']).unwrap_err();
        assert!(matches!(err, IngestError::DocumentDecode { document: "layout", .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn utf8_input_is_rejected_not_misread() {
        // `{}` in UTF-8 decodes to a single non-JSON code unit.
        assert!(parse_document("model", b"{}").is_err());
    }

    #[test]
    fn unreadable_documents_become_empty_objects() {
        let v = parse_document_or_empty("model", &[0x00]);
        assert_eq!(v, Value::Object(Map::new()));
    }
}
