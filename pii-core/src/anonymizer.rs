//! # Anonimizador
//!
//! Reescreve o texto a partir de um conjunto resolvido de spans (ordenado e
//! sem sobreposição), com uma estratégia por categoria e uma estratégia
//! padrão para o resto.
//!
//! | Estratégia | Saída para `"a@b.com"` (EMAIL_ADDRESS)      |
//! |------------|---------------------------------------------|
//! | `Redact`   | `<EMAIL_ADDRESS>` ou o placeholder configurado |
//! | `Mask`     | `*******` (prefixo/sufixo opcionais)        |
//! | `Hash`     | primeiros `length` hex de SHA-256(sal + valor) |
//! | `Custom`   | o que a função do chamador devolver         |
//!
//! As substituições são aplicadas de trás para frente, então os offsets de
//! cada span continuam válidos no espaço de coordenadas original. Os
//! registros saem em ordem crescente de `start`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::{AnonymizerConfig, StrategyConfig};
use crate::error::{PiiError, Result};
use crate::span::{EntityKind, Span};

/// Função de substituição do chamador: `(texto original, categoria) -> substituto`.
pub type CustomFn = Arc<dyn Fn(&str, &EntityKind) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Strategy {
    Redact,
    Mask {
        mask_char: char,
        keep_prefix: usize,
        keep_suffix: usize,
    },
    Hash {
        length: usize,
    },
    Custom(CustomFn),
}

impl Strategy {
    pub fn name(&self) -> StrategyName {
        match self {
            Strategy::Redact => StrategyName::Redact,
            Strategy::Mask { .. } => StrategyName::Mask,
            Strategy::Hash { .. } => StrategyName::Hash,
            Strategy::Custom(_) => StrategyName::Custom,
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Redact => f.write_str("Redact"),
            Strategy::Mask { mask_char, keep_prefix, keep_suffix } => f
                .debug_struct("Mask")
                .field("mask_char", mask_char)
                .field("keep_prefix", keep_prefix)
                .field("keep_suffix", keep_suffix)
                .finish(),
            Strategy::Hash { length } => f.debug_struct("Hash").field("length", length).finish(),
            Strategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl From<&StrategyConfig> for Strategy {
    fn from(config: &StrategyConfig) -> Self {
        match *config {
            StrategyConfig::Redact => Strategy::Redact,
            StrategyConfig::Mask { mask_char, keep_prefix, keep_suffix } => Strategy::Mask {
                mask_char,
                keep_prefix,
                keep_suffix,
            },
            StrategyConfig::Hash { length } => Strategy::Hash { length },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    Redact,
    Mask,
    Hash,
    Custom,
}

/// Uma substituição aplicada.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstitutionRecord {
    pub original_span: Span,
    pub replacement_text: String,
    pub strategy: StrategyName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnonymizedResult {
    pub text: String,
    /// Em ordem crescente de `original_span.start`.
    pub substitutions: Vec<SubstitutionRecord>,
}

/// Forma externa de uma substituição.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubstitutionOutput {
    pub original_start: usize,
    pub original_end: usize,
    pub category: EntityKind,
    pub replacement_text: String,
}

/// Forma externa do resultado de anonimização.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnonymizationOutput {
    pub text: String,
    pub substitutions: Vec<SubstitutionOutput>,
}

impl AnonymizedResult {
    pub fn to_output(&self) -> AnonymizationOutput {
        AnonymizationOutput {
            text: self.text.clone(),
            substitutions: self
                .substitutions
                .iter()
                .map(|s| SubstitutionOutput {
                    original_start: s.original_span.start(),
                    original_end: s.original_span.end(),
                    category: s.original_span.category().clone(),
                    replacement_text: s.replacement_text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Anonymizer {
    default_strategy: Strategy,
    strategies: HashMap<EntityKind, Strategy>,
    placeholders: HashMap<EntityKind, String>,
    hash_salt: Option<String>,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::Redact,
            strategies: HashMap::new(),
            placeholders: HashMap::new(),
            hash_salt: None,
        }
    }
}

impl Anonymizer {
    pub fn new(default_strategy: Strategy) -> Self {
        Self {
            default_strategy,
            ..Self::default()
        }
    }

    pub fn from_config(config: &AnonymizerConfig) -> Self {
        Self {
            default_strategy: Strategy::from(&config.default_strategy),
            strategies: config
                .strategies
                .iter()
                .map(|(kind, s)| (kind.clone(), Strategy::from(s)))
                .collect(),
            placeholders: config.placeholders.clone(),
            hash_salt: config.hash_salt.clone(),
        }
    }

    pub fn with_strategy(mut self, kind: EntityKind, strategy: Strategy) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn with_custom<F>(self, kind: EntityKind, f: F) -> Self
    where
        F: Fn(&str, &EntityKind) -> String + Send + Sync + 'static,
    {
        self.with_strategy(kind, Strategy::Custom(Arc::new(f)))
    }

    pub fn with_placeholder(mut self, kind: EntityKind, placeholder: impl Into<String>) -> Self {
        self.placeholders.insert(kind, placeholder.into());
        self
    }

    pub fn with_hash_salt(mut self, salt: impl Into<String>) -> Self {
        self.hash_salt = Some(salt.into());
        self
    }

    pub fn strategy_for(&self, kind: &EntityKind) -> &Strategy {
        self.strategies.get(kind).unwrap_or(&self.default_strategy)
    }

    /// Aplica as substituições. `spans` deve estar ordenado por `start`, sem
    /// sobreposição e dentro de `text`; caso contrário falha com
    /// [`PiiError::InvalidSpan`] e nada é reescrito.
    pub fn anonymize(&self, text: &str, spans: &[Span]) -> Result<AnonymizedResult> {
        check_spans(text, spans)?;

        // Sem sal configurado, o hash só é estável dentro desta chamada
        let salt = match &self.hash_salt {
            Some(salt) => salt.clone(),
            None => hex::encode(rand::thread_rng().gen::<[u8; 16]>()),
        };

        let substitutions: Vec<SubstitutionRecord> = spans
            .iter()
            .map(|span| {
                let original = &text[span.start()..span.end()];
                let strategy = self.strategy_for(span.category());
                SubstitutionRecord {
                    original_span: span.clone(),
                    replacement_text: self.replace(original, span.category(), strategy, &salt),
                    strategy: strategy.name(),
                }
            })
            .collect();

        let mut output = text.to_string();
        for record in substitutions.iter().rev() {
            let span = &record.original_span;
            output.replace_range(span.start()..span.end(), &record.replacement_text);
        }

        Ok(AnonymizedResult {
            text: output,
            substitutions,
        })
    }

    fn replace(&self, original: &str, kind: &EntityKind, strategy: &Strategy, salt: &str) -> String {
        match strategy {
            Strategy::Redact => self
                .placeholders
                .get(kind)
                .cloned()
                .unwrap_or_else(|| kind.placeholder()),
            Strategy::Mask { mask_char, keep_prefix, keep_suffix } => {
                mask(original, *mask_char, *keep_prefix, *keep_suffix)
            }
            Strategy::Hash { length } => {
                let mut hasher = Sha256::new();
                hasher.update(salt.as_bytes());
                hasher.update(original.as_bytes());
                let digest = hex::encode(hasher.finalize());
                digest[..(*length).clamp(1, digest.len())].to_string()
            }
            Strategy::Custom(f) => f(original, kind),
        }
    }
}

/// Mascara caractere a caractere. Se prefixo + sufixo cobrirem o valor
/// inteiro, tudo é mascarado.
fn mask(original: &str, mask_char: char, keep_prefix: usize, keep_suffix: usize) -> String {
    let n = original.chars().count();
    if keep_prefix.saturating_add(keep_suffix) >= n {
        return std::iter::repeat(mask_char).take(n).collect();
    }
    original
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i < keep_prefix || i >= n - keep_suffix {
                c
            } else {
                mask_char
            }
        })
        .collect()
}

fn check_spans(text: &str, spans: &[Span]) -> Result<()> {
    let mut previous_end = 0;
    for span in spans {
        span.check_bounds(text)?;
        if span.start() < previous_end {
            return Err(PiiError::InvalidSpan {
                start: span.start(),
                end: span.end(),
                text_len: text.len(),
                reason: "span sobreposto ou fora de ordem",
            });
        }
        previous_end = span.end();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::RecognizerId;

    fn span(start: usize, end: usize, kind: EntityKind) -> Span {
        Span::new(start, end, kind, 0.9, RecognizerId::new("t")).unwrap()
    }

    #[test]
    fn test_redact_email() {
        let text = "Mi correo es a@b.com";
        let result = Anonymizer::default()
            .anonymize(text, &[span(13, 20, EntityKind::EMAIL_ADDRESS)])
            .unwrap();
        assert_eq!(result.text, "Mi correo es <EMAIL_ADDRESS>");

        let out = result.to_output();
        assert_eq!(out.substitutions.len(), 1);
        assert_eq!(out.substitutions[0].original_start, 13);
        assert_eq!(out.substitutions[0].original_end, 20);
        assert_eq!(out.substitutions[0].category, EntityKind::EMAIL_ADDRESS);
        assert_eq!(out.substitutions[0].replacement_text, "<EMAIL_ADDRESS>");
    }

    #[test]
    fn test_records_reconstruct_offsets() {
        let text = "Juan vive en Cali y su correo es j@x.co";
        let spans = vec![
            span(0, 4, EntityKind::PERSON),
            span(13, 17, EntityKind::LOCATION),
            span(33, 39, EntityKind::EMAIL_ADDRESS),
        ];
        let result = Anonymizer::default().anonymize(text, &spans).unwrap();
        assert_eq!(result.text, "<PERSON> vive en <LOCATION> y su correo es <EMAIL_ADDRESS>");
        for (record, original) in result.substitutions.iter().zip(&spans) {
            assert_eq!(&record.original_span, original);
        }
    }

    #[test]
    fn test_mask_keeps_suffix_multibyte() {
        let text = "tel 300 123 4567, José";
        let anonymizer = Anonymizer::new(Strategy::Mask {
            mask_char: '#',
            keep_prefix: 0,
            keep_suffix: 4,
        });
        let result = anonymizer
            .anonymize(text, &[span(4, 16, EntityKind::PHONE_NUMBER), span(18, 23, EntityKind::PERSON)])
            .unwrap();
        assert_eq!(result.text, "tel ########4567, ####");
    }

    #[test]
    fn test_mask_with_huge_keep_counts() {
        let text = "CC 52123456";
        let anonymizer = Anonymizer::new(Strategy::Mask {
            mask_char: '*',
            keep_prefix: usize::MAX,
            keep_suffix: usize::MAX,
        });
        let result = anonymizer.anonymize(text, &[span(3, 11, EntityKind::NATIONAL_ID)]).unwrap();
        assert_eq!(result.text, "CC ********");

        assert_eq!(mask("52123456", '#', 1, usize::MAX), "########");
        assert_eq!(mask("52123456", '#', 2, 2), "52####56");
    }

    #[test]
    fn test_hash_stable_with_salt() {
        let text = "Ana y Ana";
        let spans = [span(0, 3, EntityKind::PERSON), span(6, 9, EntityKind::PERSON)];
        let anonymizer = Anonymizer::new(Strategy::Hash { length: 12 }).with_hash_salt("s3cr3t");

        let first = anonymizer.anonymize(text, &spans).unwrap();
        let second = anonymizer.anonymize(text, &spans).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.substitutions[0].replacement_text.len(), 12);
        assert_eq!(
            first.substitutions[0].replacement_text,
            first.substitutions[1].replacement_text
        );
    }

    #[test]
    fn test_hash_unsalted_is_stable_within_call_only() {
        let text = "Ana y Ana";
        let spans = [span(0, 3, EntityKind::PERSON), span(6, 9, EntityKind::PERSON)];
        let anonymizer = Anonymizer::new(Strategy::Hash { length: 16 });
        let first = anonymizer.anonymize(text, &spans).unwrap();
        let second = anonymizer.anonymize(text, &spans).unwrap();
        assert_eq!(
            first.substitutions[0].replacement_text,
            first.substitutions[1].replacement_text
        );
        assert_ne!(first.text, second.text);
    }

    #[test]
    fn test_custom_and_placeholder_per_kind() {
        let text = "Juan llamó al 3001234567";
        let anonymizer = Anonymizer::default()
            .with_placeholder(EntityKind::PERSON, "[NOMBRE]")
            .with_custom(EntityKind::PHONE_NUMBER, |original, _| format!("***{}", &original[7..]));
        let result = anonymizer
            .anonymize(text, &[span(0, 4, EntityKind::PERSON), span(15, 25, EntityKind::PHONE_NUMBER)])
            .unwrap();
        assert_eq!(result.text, "[NOMBRE] llamó al ***567");
        assert_eq!(result.substitutions[1].strategy, StrategyName::Custom);
    }

    #[test]
    fn test_invalid_spans_rejected() {
        let anonymizer = Anonymizer::default();
        let overlapping = [span(0, 5, EntityKind::PERSON), span(3, 8, EntityKind::PERSON)];
        assert!(matches!(
            anonymizer.anonymize("abcdefghij", &overlapping),
            Err(PiiError::InvalidSpan { .. })
        ));
        assert!(anonymizer
            .anonymize("abc", &[span(0, 10, EntityKind::PERSON)])
            .is_err());
        // 'é' ocupa 2 bytes
        assert!(anonymizer
            .anonymize("José", &[span(0, 4, EntityKind::PERSON)])
            .is_err());
    }

    #[test]
    fn test_empty_span_set_returns_text() {
        let result = Anonymizer::default().anonymize("nada aquí", &[]).unwrap();
        assert_eq!(result.text, "nada aquí");
        assert!(result.substitutions.is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = AnonymizerConfig::default();
        config
            .strategies
            .insert(EntityKind::PHONE_NUMBER, StrategyConfig::Mask { mask_char: 'x', keep_prefix: 0, keep_suffix: 0 });
        let anonymizer = Anonymizer::from_config(&config);
        assert!(matches!(anonymizer.strategy_for(&EntityKind::PHONE_NUMBER), Strategy::Mask { .. }));
        assert!(matches!(anonymizer.strategy_for(&EntityKind::PERSON), Strategy::Redact));
    }
}
