//! DOCX text extraction: reads `word/document.xml` out of the zip container.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use zip::ZipArchive;

const DOCUMENT_XML: &str = "word/document.xml";

/// Reads the document body, refusing to inflate more than `max_xml_bytes` of XML.
pub(super) fn extract(bytes: &[u8], max_xml_bytes: usize) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a DOCX archive: {e}"))?;
    let mut entry = archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| format!("missing {DOCUMENT_XML}: {e}"))?;

    let limit = max_xml_bytes as u64;
    if entry.size() > limit {
        return Err(too_large(max_xml_bytes));
    }

    // The declared size can lie, so the read itself is capped too.
    let mut raw = Vec::new();
    entry
        .by_ref()
        .take(limit + 1)
        .read_to_end(&mut raw)
        .map_err(|e| format!("unreadable {DOCUMENT_XML}: {e}"))?;
    if raw.len() as u64 > limit {
        return Err(too_large(max_xml_bytes));
    }

    let xml = String::from_utf8(raw).map_err(|e| format!("{DOCUMENT_XML} is not UTF-8: {e}"))?;
    Ok(xml_to_text(&xml))
}

fn too_large(max_xml_bytes: usize) -> String {
    format!("{DOCUMENT_XML} expands beyond {max_xml_bytes} bytes")
}

/// Paragraph ends and line breaks become newlines, tabs stay tabs, all other tags go.
fn xml_to_text(xml: &str) -> String {
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    static TABS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();

    let breaks = BREAKS
        .get_or_init(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("valid break regex"));
    let tabs = TABS.get_or_init(|| Regex::new(r"<w:tab\s*/>").expect("valid tab regex"));
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

    let text = breaks.replace_all(xml, "\n");
    let text = tabs.replace_all(&text, "\t");
    let text = tags.replace_all(&text, "");
    let text = decode_entities(&text);

    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Decodes the five predefined XML entities and numeric character references in one pass.
fn decode_entities(text: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let entity = ENTITY.get_or_init(|| {
        Regex::new(r"&(lt|gt|quot|apos|amp|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});")
            .expect("valid entity regex")
    });

    entity
        .replace_all(text, |caps: &Captures| {
            let decoded = match &caps[1] {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "amp" => Some('&'),
                reference => numeric_reference(reference),
            };
            match decoded {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// `#8217` or `#x2019` to a char; `None` for values that are not Unicode scalars.
fn numeric_reference(reference: &str) -> Option<char> {
    let digits = reference.strip_prefix('#')?;
    let code = match digits.strip_prefix(|c: char| c == 'x' || c == 'X') {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::FileOptions;
    use zip::ZipWriter;

    use super::*;

    const LIMIT: usize = 1024 * 1024;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("[Content_Types].xml", FileOptions::default())
            .unwrap();
        writer.write_all(b"<Types/>").unwrap();
        writer
            .start_file(DOCUMENT_XML, FileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_paragraphs_and_breaks() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Jane Doe</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Backend </w:t></w:r><w:r><w:t>Engineer</w:t></w:r></w:p>
<w:p><w:r><w:t>Rust</w:t><w:tab/><w:t>Go</w:t><w:br/><w:t>R&amp;D &lt;team&gt;</w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = extract(&build_docx(xml), LIMIT).unwrap();
        assert!(text.starts_with("Jane Doe\n"), "got {text:?}");
        assert!(text.contains("Backend Engineer"));
        assert!(text.contains("Rust\tGo\nR&D <team>"));
    }

    #[test]
    fn test_missing_document_xml_is_error() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/other.xml", FileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract(&bytes, LIMIT).unwrap_err();
        assert!(err.contains("word/document.xml"));
    }

    #[test]
    fn test_non_zip_is_error() {
        assert!(extract(b"plain text pretending to be docx", LIMIT).is_err());
    }

    #[test]
    fn test_double_escaped_entities_decode_once() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_numeric_character_references_decode() {
        assert_eq!(
            decode_entities("Jane&#8217;s CV&#xA0;&#X2014; R&amp;D&#13;"),
            "Jane\u{2019}s CV\u{A0}\u{2014} R&D\r"
        );
        assert_eq!(decode_entities("&amp;#38;"), "&#38;");
        assert_eq!(decode_entities("&#xD800; &#1114112; &bogus;"), "&#xD800; &#1114112; &bogus;");
    }

    #[test]
    fn test_highly_compressible_document_is_rejected() {
        let body = "a".repeat(4 * LIMIT);
        let xml = format!("<w:document><w:body><w:p><w:r><w:t>{body}</w:t></w:r></w:p></w:body></w:document>");
        let bytes = build_docx(&xml);
        assert!(bytes.len() < LIMIT / 4, "deflated to {} bytes", bytes.len());

        let err = extract(&bytes, LIMIT).unwrap_err();
        assert!(err.contains("expands beyond"), "got {err:?}");

        let text = extract(&bytes, 8 * LIMIT).unwrap();
        assert_eq!(text.len(), 4 * LIMIT);
    }
}
