//! # Tipos de Valor — Span, Categoria, Reconhecedor e Idioma
//!
//! Um [`Span`] é a unidade que atravessa todo o pipeline: é produzido pelos
//! reconhecedores, reescalado (nunca movido) pelo validador contextual,
//! filtrado pelo piso de confiança, reconciliado pelo resolvedor e consumido
//! pelo anonimizador.
//!
//! ## Offsets
//!
//! `start` e `end` são posições de **byte** UTF-8 no texto original
//! (`start` inclusivo, `end` exclusivo), sempre em fronteira de `char`.
//! Isso permite fatiar o texto diretamente (`&text[start..end]`).
//!
//! ```rust
//! use pii_core::span::{EntityKind, RecognizerId, Span};
//!
//! let text = "Mi correo es a@b.com";
//! let span = Span::new(13, 20, EntityKind::EMAIL_ADDRESS, 0.95, RecognizerId::new("email")).unwrap();
//! assert_eq!(span.text(text), Some("a@b.com"));
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PiiError, Result};

/// Categoria de informação detectada (enumeração aberta).
///
/// As categorias conhecidas são constantes associadas; novas categorias
/// surgem com novos reconhecedores via [`EntityKind::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EntityKind(Cow<'static, str>);

impl EntityKind {
    pub const PERSON: EntityKind = EntityKind(Cow::Borrowed("PERSON"));
    pub const LOCATION: EntityKind = EntityKind(Cow::Borrowed("LOCATION"));
    pub const ORGANIZATION: EntityKind = EntityKind(Cow::Borrowed("ORGANIZATION"));
    pub const EMAIL_ADDRESS: EntityKind = EntityKind(Cow::Borrowed("EMAIL_ADDRESS"));
    pub const PHONE_NUMBER: EntityKind = EntityKind(Cow::Borrowed("PHONE_NUMBER"));
    pub const NATIONAL_ID: EntityKind = EntityKind(Cow::Borrowed("NATIONAL_ID"));
    pub const CREDIT_CARD: EntityKind = EntityKind(Cow::Borrowed("CREDIT_CARD"));
    pub const IP_ADDRESS: EntityKind = EntityKind(Cow::Borrowed("IP_ADDRESS"));
    pub const DATE: EntityKind = EntityKind(Cow::Borrowed("DATE"));
    /// Endereço postal (ex: `Calle 45 # 12-34`).
    pub const ADDRESS: EntityKind = EntityKind(Cow::Borrowed("ADDRESS"));

    /// Cria (ou referencia) uma categoria pelo nome. Nomes são normalizados para maiúsculas.
    pub fn new(name: impl AsRef<str>) -> Self {
        EntityKind(Cow::Owned(name.as_ref().trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder padrão da estratégia `redact` (ex: `<EMAIL_ADDRESS>`).
    pub fn placeholder(&self) -> String {
        format!("<{}>", self.0)
    }
}

impl From<String> for EntityKind {
    fn from(name: String) -> Self {
        EntityKind::new(name)
    }
}

impl From<EntityKind> for String {
    fn from(kind: EntityKind) -> Self {
        kind.0.into_owned()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identificador estável de um reconhecedor (ex: `"email"`, `"statistical_ner"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecognizerId(Cow<'static, str>);

impl RecognizerId {
    pub const fn from_static(id: &'static str) -> Self {
        RecognizerId(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        RecognizerId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecognizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Código de idioma normalizado (minúsculas, sem espaços), ex: `es`, `en`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    pub fn new(code: impl AsRef<str>) -> Self {
        LanguageTag(code.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LanguageTag {
    fn from(code: &str) -> Self {
        LanguageTag::new(code)
    }
}

impl From<String> for LanguageTag {
    fn from(code: String) -> Self {
        LanguageTag::new(code)
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uma ocorrência de entidade detectada.
///
/// Imutável: os campos são privados e qualquer "ajuste" de score produz um
/// novo valor via [`Span::with_score`]. Os offsets nunca mudam depois que um
/// reconhecedor os emite.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    start: usize,
    end: usize,
    category: EntityKind,
    score: f64,
    source: RecognizerId,
}

impl Span {
    /// Cria um span. Falha com [`PiiError::InvalidSpan`] se `start >= end`.
    ///
    /// O score é limitado a `[0, 1]` (NaN vira 0).
    pub fn new(
        start: usize,
        end: usize,
        category: EntityKind,
        score: f64,
        source: RecognizerId,
    ) -> Result<Self> {
        if start >= end {
            return Err(PiiError::InvalidSpan {
                start,
                end,
                text_len: 0,
                reason: "span vazio ou invertido",
            });
        }
        Ok(Self {
            start,
            end,
            category,
            score: clamp_score(score),
            source,
        })
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn category(&self) -> &EntityKind {
        &self.category
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn source(&self) -> &RecognizerId {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Intervalos semiabertos: `[0,5)` e `[5,9)` não se sobrepõem.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Mesmo span com outro score (offsets, categoria e fonte preservados).
    pub fn with_score(&self, score: f64) -> Span {
        Span {
            score: clamp_score(score),
            ..self.clone()
        }
    }

    /// Fatia do texto coberta pelo span, se os offsets forem válidos para ele.
    pub fn text<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }

    /// Verifica `end <= len(text)` e fronteiras de `char`.
    pub fn check_bounds(&self, text: &str) -> Result<()> {
        let invalid = |reason| PiiError::InvalidSpan {
            start: self.start,
            end: self.end,
            text_len: text.len(),
            reason,
        };
        if self.end > text.len() {
            return Err(invalid("fim além do texto"));
        }
        if !text.is_char_boundary(self.start) || !text.is_char_boundary(self.end) {
            return Err(invalid("offset fora de fronteira de caractere"));
        }
        Ok(())
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: usize, end: usize) -> Span {
        Span::new(start, end, EntityKind::PERSON, 0.5, RecognizerId::new("t")).unwrap()
    }

    #[test]
    fn test_empty_span_rejected() {
        let err = Span::new(4, 4, EntityKind::DATE, 0.9, RecognizerId::new("t")).unwrap_err();
        assert!(matches!(err, PiiError::InvalidSpan { .. }));
    }

    #[test]
    fn test_half_open_overlap() {
        assert!(!span(0, 5).overlaps(&span(5, 9)));
        assert!(span(0, 6).overlaps(&span(5, 9)));
        assert!(span(2, 3).overlaps(&span(0, 10)));
    }

    #[test]
    fn test_score_is_clamped() {
        let s = span(0, 1).with_score(1.7);
        assert_eq!(s.score(), 1.0);
        assert_eq!(span(0, 1).with_score(f64::NAN).score(), 0.0);
        assert_eq!(s.start(), 0);
        assert_eq!(s.end(), 1);
    }

    #[test]
    fn test_check_bounds_char_boundary() {
        let text = "José";
        // 'é' ocupa os bytes 3..5
        assert!(span(0, 3).check_bounds(text).is_ok());
        assert!(span(0, 4).check_bounds(text).is_err());
        assert!(span(0, 6).check_bounds(text).is_err());
    }

    #[test]
    fn test_entity_kind_open_enumeration() {
        assert_eq!(EntityKind::new("person"), EntityKind::PERSON);
        assert_eq!(EntityKind::new("PASSPORT").as_str(), "PASSPORT");
        assert_eq!(EntityKind::EMAIL_ADDRESS.placeholder(), "<EMAIL_ADDRESS>");
    }

    #[test]
    fn test_language_tag_normalized() {
        assert_eq!(LanguageTag::new(" ES "), LanguageTag::from("es"));
    }
}
