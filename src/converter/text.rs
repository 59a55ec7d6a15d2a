use super::{ConversionError, Converter};

/// TXT → "PDF" placeholder.
///
/// Copies the text bytes unchanged; the pipeline labels the result
/// `application/pdf` with a `.pdf` name. This is NOT a rendered PDF document.
/// Real PDF generation belongs in its own converter with its own tag.
pub struct TextPassthrough;

impl Converter for TextPassthrough {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        Ok(input.to_vec())
    }
}
