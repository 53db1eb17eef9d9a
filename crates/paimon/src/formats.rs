//! Format-specific text extraction.
//!
//! Every extractor is synchronous and CPU-bound; callers run them on a
//! blocking thread.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;
use vassago_core::{Error, Result};

/// A natural unit of text produced by an extractor, before chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Extracted text.
    pub text: String,
    /// 1-based page number for paged formats.
    pub page: Option<u32>,
}

impl TextUnit {
    fn whole(text: String) -> Self {
        Self { text, page: None }
    }
}

/// Extracts one unit per PDF page.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the bytes are not a readable PDF.
pub fn extract_pdf(bytes: &[u8], source: &str) -> Result<Vec<TextUnit>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| Error::parse(source, format!("PDF extraction error: {e}")))?;

    Ok(pages
        .into_iter()
        .zip(1u32..)
        .map(|(text, page)| TextUnit {
            text,
            page: Some(page),
        })
        .collect())
}

/// Extracts a plain-text file as a single unit.
///
/// Invalid UTF-8 sequences are replaced rather than rejected.
#[must_use]
pub fn extract_text(bytes: &[u8]) -> Vec<TextUnit> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    vec![TextUnit::whole(text.to_string())]
}

/// Extracts the body of a DOCX document as a single unit.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the bytes are not a zip container or the
/// container has no `word/document.xml` part.
pub fn extract_docx(bytes: &[u8], source: &str) -> Result<Vec<TextUnit>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::parse(source, format!("not a DOCX container: {e}")))?;

    let mut xml = String::new();
    let mut part = archive
        .by_name("word/document.xml")
        .map_err(|e| Error::parse(source, format!("missing document body: {e}")))?;
    part.read_to_string(&mut xml)
        .map_err(|e| Error::parse(source, format!("unreadable document body: {e}")))?;

    Ok(vec![TextUnit::whole(docx_xml_to_text(&xml))])
}

fn docx_token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>|<w:tab/>|<w:br[^>]*/>")
            .expect("static pattern is valid")
    })
}

/// Flattens WordprocessingML into plain text, one line per paragraph.
fn docx_xml_to_text(xml: &str) -> String {
    let mut text = String::new();

    for caps in docx_token_pattern().captures_iter(xml) {
        if let Some(run) = caps.get(1) {
            text.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match &caps[0] {
            "<w:tab/>" => text.push('\t'),
            _ => text.push('\n'),
        }
    }

    text.trim().to_string()
}

fn char_reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"&#(?:[xX]([0-9A-Fa-f]+)|([0-9]+));").expect("static pattern is valid")
    })
}

/// Resolves `&#NN;` and `&#xHH;` references. Invalid code points are kept verbatim.
fn decode_char_references(s: &str) -> std::borrow::Cow<'_, str> {
    char_reference_pattern().replace_all(s, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse().ok(),
            (None, None) => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    })
}

fn unescape_xml(s: &str) -> String {
    decode_char_references(s)
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use super::*;

    /// Builds a minimal DOCX container around the given paragraphs.
    pub(crate) fn sample_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!(r#"<w:p><w:r><w:t xml:space="preserve">{p}</w:t></w:r></w:p>"#))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = sample_docx(&["First paragraph", "Fish &amp; chips"]);
        let units = extract_docx(&bytes, "menu.docx").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "First paragraph\nFish & chips");
        assert_eq!(units[0].page, None);
    }

    /// Builds a one-page PDF showing `text` in Helvetica.
    pub(crate) fn sample_pdf(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 24 Tf 72 720 Td ({text}) Tj ET");
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>"
                .to_string(),
            format!(
                "<< /Length {} >>\nstream\n{content}\nendstream",
                content.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
             /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
        }

        let xref = pdf.len();
        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            table.push_str(&format!("{offset:010} 00000 n \n"));
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        pdf.extend_from_slice(table.as_bytes());
        pdf
    }

    #[test]
    fn test_pdf_pages() {
        let units = extract_pdf(&sample_pdf("hello world"), "hello.pdf").unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].page, Some(1));
        assert!(units[0].text.contains("hello world"));
    }

    #[test]
    fn test_unescape_numeric_references() {
        assert_eq!(unescape_xml("it&#x2019;s"), "it\u{2019}s");
        assert_eq!(unescape_xml("a&#160;b"), "a\u{a0}b");
        assert_eq!(unescape_xml("&amp;#38; &lt;x&gt;"), "&#38; <x>");
        assert_eq!(unescape_xml("&#xFFFFFF;"), "&#xFFFFFF;");
    }

    #[test]
    fn test_docx_rejects_non_zip() {
        let err = extract_docx(b"plain bytes", "fake.docx").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_docx_xml_runs_and_tabs() {
        let xml = "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t></w:r></w:p>\
                   <w:p><w:r><w:t>c</w:t><w:br/><w:t>d</w:t></w:r></w:p>";
        assert_eq!(docx_xml_to_text(xml), "a\tb\nc\nd");
    }

    #[test]
    fn test_text_strips_bom() {
        let units = extract_text("\u{feff}hello world".as_bytes());
        assert_eq!(units[0].text, "hello world");
    }

    #[test]
    fn test_pdf_rejects_garbage() {
        let err = extract_pdf(b"this is not a pdf", "broken.pdf").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
