// Type definitions and enums

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::converter::ConversionError;

/// Closed set of conversions the service knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionType {
    #[serde(rename = "docx-to-txt")]
    DocxToTxt,
    #[serde(rename = "pdf-to-txt")]
    PdfToTxt,
    #[serde(rename = "txt-to-pdf")]
    TxtToPdf,
}

impl ConversionType {
    pub const ALL: [ConversionType; 3] = [
        ConversionType::DocxToTxt,
        ConversionType::PdfToTxt,
        ConversionType::TxtToPdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionType::DocxToTxt => "docx-to-txt",
            ConversionType::PdfToTxt => "pdf-to-txt",
            ConversionType::TxtToPdf => "txt-to-pdf",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "docx-to-txt" => Some(ConversionType::DocxToTxt),
            "pdf-to-txt" => Some(ConversionType::PdfToTxt),
            "txt-to-pdf" => Some(ConversionType::TxtToPdf),
            _ => None,
        }
    }

    /// Extension (lowercase, with dot) the uploaded file must carry.
    pub fn input_extension(&self) -> &'static str {
        match self {
            ConversionType::DocxToTxt => ".docx",
            ConversionType::PdfToTxt => ".pdf",
            ConversionType::TxtToPdf => ".txt",
        }
    }

    pub fn output_extension(&self) -> &'static str {
        match self {
            ConversionType::DocxToTxt | ConversionType::PdfToTxt => ".txt",
            ConversionType::TxtToPdf => ".pdf",
        }
    }

    pub fn output_mime(&self) -> mime::Mime {
        match self {
            ConversionType::DocxToTxt | ConversionType::PdfToTxt => mime::TEXT_PLAIN_UTF_8,
            ConversionType::TxtToPdf => mime::APPLICATION_PDF,
        }
    }

    /// Human label used in error messages ("DOCX to TXT").
    pub fn label(&self) -> &'static str {
        match self {
            ConversionType::DocxToTxt => "DOCX to TXT",
            ConversionType::PdfToTxt => "PDF to TXT",
            ConversionType::TxtToPdf => "TXT to PDF",
        }
    }
}

impl std::fmt::Display for ConversionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConversionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| ConversionError::UnsupportedConversionType(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conversion(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to the client. Server-side failures are masked.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(_) => "File not found".to_string(),
            AppError::Database(_) | AppError::Storage(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = Json(ErrorResponse {
            success: false,
            error: self.public_message(),
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_type_tags() {
        for ty in ConversionType::ALL {
            assert_eq!(ConversionType::from_tag(ty.as_str()), Some(ty));
        }
        assert_eq!(ConversionType::from_tag("pdf-to-images"), None);
        assert!("DOCX-TO-TXT".parse::<ConversionType>().is_err());
    }

    #[test]
    fn test_conversion_type_serde() {
        let json = serde_json::to_string(&ConversionType::TxtToPdf).unwrap();
        assert_eq!(json, "\"txt-to-pdf\"");
        let parsed: ConversionType = serde_json::from_str("\"pdf-to-txt\"").unwrap();
        assert_eq!(parsed, ConversionType::PdfToTxt);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Conversion(ConversionError::ExtractionFailure {
                conversion_type: ConversionType::PdfToTxt,
                message: "bad".into(),
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("id".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Storage(anyhow::anyhow!("disk full")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_are_masked() {
        let err = AppError::Storage(anyhow::anyhow!("bucket credentials rejected"));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Validation("No file provided".into());
        assert_eq!(err.public_message(), "No file provided");
    }
}
