//! Document converters
//!
//! Each supported [`ConversionType`] maps to one [`Converter`]. Converters are
//! pure: bytes in, bytes out, no I/O. Extension checks happen in
//! [`validate_extension`] before any converter runs.

pub mod docx;
pub mod pdf;
pub mod text;

use std::path::Path;

use crate::types::ConversionType;

pub use docx::DocxTextExtractor;
pub use pdf::PdfTextExtractor;
pub use text::TextPassthrough;

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Unsupported conversion type: {0}")]
    UnsupportedConversionType(String),

    #[error("Invalid file type for {} conversion", .conversion_type.label())]
    FileTypeMismatch {
        conversion_type: ConversionType,
        extension: String,
    },

    #[error("Failed to convert {}: {message}", .conversion_type.label())]
    ExtractionFailure {
        conversion_type: ConversionType,
        message: String,
    },
}

pub trait Converter: Send + Sync {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError>;
}

pub fn converter_for(conversion_type: ConversionType) -> &'static dyn Converter {
    match conversion_type {
        ConversionType::DocxToTxt => &DocxTextExtractor,
        ConversionType::PdfToTxt => &PdfTextExtractor,
        ConversionType::TxtToPdf => &TextPassthrough,
    }
}

/// Lowercased extension of `name` including the leading dot, or `""`.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn validate_extension(
    declared_name: &str,
    conversion_type: ConversionType,
) -> Result<(), ConversionError> {
    let extension = extension_of(declared_name);
    if extension != conversion_type.input_extension() {
        return Err(ConversionError::FileTypeMismatch {
            conversion_type,
            extension,
        });
    }
    Ok(())
}

/// Declared name with its extension swapped for the conversion's output one.
pub fn output_filename(declared_name: &str, conversion_type: ConversionType) -> String {
    let stem = Path::new(declared_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("converted");
    format!("{}{}", stem, conversion_type.output_extension())
}

pub fn convert(input: &[u8], conversion_type: ConversionType) -> Result<Vec<u8>, ConversionError> {
    converter_for(conversion_type).convert(input)
}
