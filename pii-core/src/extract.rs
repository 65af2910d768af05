//! # Extração de Texto de Arquivos
//!
//! O pipeline só analisa texto plano. Formatos como PDF ou DOCX ficam com
//! um colaborador externo que implementa [`TextExtractor`]; qualquer falha
//! dele vira [`PiiError::ExtractionFailed`] e o pipeline não é chamado.

use crate::error::{PiiError, Result};

/// Converte bytes de um arquivo em texto UTF-8.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String>;
}

/// Extrator para `text/*`: decodifica UTF-8 e remove o BOM.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let failed = |reason: String| PiiError::ExtractionFailed {
            mime: mime.to_string(),
            reason,
        };

        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if !essence.starts_with("text/") {
            return Err(failed("tipo não suportado".to_string()));
        }

        let text = std::str::from_utf8(bytes).map_err(|e| failed(e.to_string()))?;
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_strips_bom() {
        let bytes = "\u{feff}Hola José".as_bytes();
        let text = PlainTextExtractor.extract_text(bytes, "text/plain; charset=utf-8").unwrap();
        assert_eq!(text, "Hola José");
    }

    #[test]
    fn test_rejects_binary_mime() {
        let err = PlainTextExtractor
            .extract_text(b"%PDF-1.7", "application/pdf")
            .unwrap_err();
        assert!(matches!(err, PiiError::ExtractionFailed { .. }));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let err = PlainTextExtractor
            .extract_text(&[0x48, 0xff, 0xfe], "text/plain")
            .unwrap_err();
        assert!(matches!(err, PiiError::ExtractionFailed { .. }));
    }
}
