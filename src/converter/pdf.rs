// PDF → plain text via lopdf

use lopdf::Document;

use super::{ConversionError, Converter};
use crate::types::ConversionType;

pub struct PdfTextExtractor;

impl Converter for PdfTextExtractor {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let document = Document::load_mem(input).map_err(|e| failure(e.to_string()))?;
        if document.is_encrypted() {
            return Err(failure("document is encrypted".to_string()));
        }

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Ok(Vec::new());
        }

        let text = document
            .extract_text(&page_numbers)
            .map_err(|e| failure(e.to_string()))?;
        Ok(text.into_bytes())
    }
}

fn failure(message: String) -> ConversionError {
    ConversionError::ExtractionFailure {
        conversion_type: ConversionType::PdfToTxt,
        message,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Single-page PDF with one line of Courier text per entry in `lines`.
    pub(crate) fn build_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (idx, line) in lines.iter().enumerate() {
            if idx > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-30).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_extracts_page_text() {
        let pdf = build_pdf(&["Annual Report", "Net income rose"]);
        let text = String::from_utf8(PdfTextExtractor.convert(&pdf).unwrap()).unwrap();
        assert!(text.contains("Annual Report"), "got: {text:?}");
        assert!(text.contains("Net income rose"), "got: {text:?}");
    }

    #[test]
    fn test_garbage_is_extraction_failure() {
        let err = PdfTextExtractor.convert(b"%PDF-not-really").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::ExtractionFailure {
                conversion_type: ConversionType::PdfToTxt,
                ..
            }
        ));
    }
}
