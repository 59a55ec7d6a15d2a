//! DOCX → plain text
//!
//! Reads `word/document.xml` out of the OOXML package and emits the raw text of
//! every paragraph followed by a blank line. Tabs and breaks inside runs are
//! preserved as `\t` and `\n`. Of an `mc:AlternateContent` block only the
//! `mc:Fallback` branch is read.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{ConversionError, Converter};
use crate::types::ConversionType;

const DOCUMENT_PART: &str = "word/document.xml";

/// Allowed inflation of `word/document.xml` relative to the uploaded package.
const MAX_EXPANSION_RATIO: u64 = 100;
/// Small packages may still inflate up to this many bytes.
const MIN_DOCUMENT_LIMIT: u64 = 1024 * 1024;
/// Hard ceiling regardless of upload size.
const MAX_DOCUMENT_LIMIT: u64 = 128 * 1024 * 1024;

pub struct DocxTextExtractor;

impl Converter for DocxTextExtractor {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let xml = read_document_part(input, document_limit(input.len())).map_err(failure)?;
        let text = extract_raw_text(&xml).map_err(failure)?;
        Ok(text.into_bytes())
    }
}

fn failure(message: String) -> ConversionError {
    ConversionError::ExtractionFailure {
        conversion_type: ConversionType::DocxToTxt,
        message,
    }
}

fn document_limit(package_len: usize) -> u64 {
    (package_len as u64)
        .saturating_mul(MAX_EXPANSION_RATIO)
        .clamp(MIN_DOCUMENT_LIMIT, MAX_DOCUMENT_LIMIT)
}

fn read_document_part(input: &[u8], limit: u64) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(input))
        .map_err(|e| format!("not a valid DOCX package: {}", e))?;
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| format!("missing {}: {}", DOCUMENT_PART, e))?;

    // The declared size is checked up front; the bounded read catches headers that lie.
    if part.size() > limit {
        return Err(too_large(limit));
    }

    let mut xml = String::new();
    part.take(limit + 1)
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable {}: {}", DOCUMENT_PART, e))?;
    if xml.len() as u64 > limit {
        return Err(too_large(limit));
    }
    Ok(xml)
}

fn too_large(limit: u64) -> String {
    format!("{} exceeds {} bytes when decompressed", DOCUMENT_PART, limit)
}

fn extract_raw_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(false);

    let mut text = String::new();
    let mut in_text_run = false;
    let mut run_depth: usize = 0;
    // >0 while inside an `mc:Choice` subtree.
    let mut skip_depth: usize = 0;

    loop {
        let event = reader.read_event().map_err(|e| {
            format!(
                "malformed document XML at byte {}: {}",
                reader.buffer_position(),
                e
            )
        })?;

        if skip_depth > 0 {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(_) => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) if e.local_name().as_ref() == b"Choice" => skip_depth = 1,
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => run_depth += 1,
                b"t" if run_depth > 0 => in_text_run = true,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if run_depth > 0 => text.push('\t'),
                b"br" | b"cr" if run_depth > 0 => text.push('\n'),
                // Self-closing paragraph: still a paragraph boundary.
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(t) if in_text_run => {
                let unescaped = t.unescape().map_err(|e| {
                    format!("malformed text at byte {}: {}", reader.buffer_position(), e)
                })?;
                text.push_str(&unescaped);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Minimal OOXML package holding one `w:p` per entry of `paragraphs`.
    pub(crate) fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{}</w:body></w:document>",
            body
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("[Content_Types].xml", options).unwrap();
        writer
            .write_all(b"<?xml version=\"1.0\"?><Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\"/>")
            .unwrap();
        writer.start_file(DOCUMENT_PART, options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_paragraphs() {
        let docx = build_docx(&["Quarterly report", "Revenue grew &amp; costs fell."]);
        let output = DocxTextExtractor.convert(&docx).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Quarterly report\n\nRevenue grew & costs fell.\n\n"
        );
    }

    #[test]
    fn test_tabs_and_breaks() {
        let xml = "<w:document xmlns:w=\"x\"><w:body><w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p></w:body></w:document>";
        assert_eq!(extract_raw_text(xml).unwrap(), "a\tb\nc\n\n");
    }

    #[test]
    fn test_ignores_text_outside_runs() {
        let xml = "<w:document xmlns:w=\"x\"><w:body><w:p><w:r><w:instrText>PAGE</w:instrText><w:t>visible</w:t></w:r></w:p></w:body></w:document>";
        assert_eq!(extract_raw_text(xml).unwrap(), "visible\n\n");
    }

    #[test]
    fn test_tab_stop_definitions_are_not_text() {
        let xml = "<w:p><w:pPr><w:tabs><w:tab w:val=\"left\" w:pos=\"720\"/></w:tabs></w:pPr><w:r><w:t>Hi</w:t></w:r></w:p>";
        assert_eq!(extract_raw_text(xml).unwrap(), "Hi\n\n");
    }

    #[test]
    fn test_alternate_content_read_once() {
        let text_box = |branch: &str| {
            format!(
                "<mc:{b}><w:pict><w:txbxContent><w:p><w:r><w:t>Box</w:t></w:r></w:p></w:txbxContent></w:pict></mc:{b}>",
                b = branch
            )
        };
        let xml = format!(
            "<w:document xmlns:w=\"x\" xmlns:mc=\"y\"><w:body><w:p><w:r><mc:AlternateContent>{}{}</mc:AlternateContent></w:r></w:p></w:body></w:document>",
            text_box("Choice"),
            text_box("Fallback")
        );
        let text = extract_raw_text(&xml).unwrap();
        assert_eq!(text.matches("Box").count(), 1);
        assert_eq!(text, "Box\n\n\n\n");
    }

    #[test]
    fn test_rejects_oversized_document_part() {
        let document = format!(
            "<w:document xmlns:w=\"x\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            "a".repeat(4 * 1024 * 1024)
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(DOCUMENT_PART, options).unwrap();
        writer.write_all(document.as_bytes()).unwrap();
        let docx = writer.finish().unwrap().into_inner();
        assert!(docx.len() < 64 * 1024);

        let err = DocxTextExtractor.convert(&docx).unwrap_err();
        match err {
            ConversionError::ExtractionFailure { message, .. } => {
                assert!(message.contains("exceeds"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_document_limit_bounds() {
        assert_eq!(document_limit(10), MIN_DOCUMENT_LIMIT);
        assert_eq!(document_limit(200 * 1024), 200 * 1024 * MAX_EXPANSION_RATIO);
        assert_eq!(document_limit(20 * 1024 * 1024), MAX_DOCUMENT_LIMIT);
    }

    #[test]
    fn test_rejects_non_zip_input() {
        let err = DocxTextExtractor.convert(b"Test DOCX content for conversion").unwrap_err();
        match err {
            ConversionError::ExtractionFailure { conversion_type, message } => {
                assert_eq!(conversion_type, ConversionType::DocxToTxt);
                assert!(message.starts_with("not a valid DOCX package"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
