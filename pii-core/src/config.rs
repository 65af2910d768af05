//! # Configuração do Pipeline
//!
//! [`PipelineConfig`] concentra tudo que é decidido na inicialização:
//! idiomas suportados, reconhecedores habilitados por idioma, fonte dos
//! modelos, pisos de confiança, prioridades de desempate, prazo por
//! requisição e estratégias de anonimização.
//!
//! Pode ser montada em código (`Default` cobre `es` e `en`) ou lida de TOML:
//!
//! ```toml
//! supported_languages = ["es", "en"]
//! default_language = "es"
//! deadline_ms = 2000
//! worker_threads = 4
//!
//! [model_source]
//! es = "builtin"
//! en = "/opt/models/en.json"
//!
//! [recognizer_enablement]
//! en = ["email", "phone", "statistical_ner"]
//!
//! [thresholds.es]
//! PERSON = 0.6
//! DEFAULT = 0.65
//!
//! [recognizer_priorities]
//! co_national_id = 2
//!
//! [anonymizer]
//! default_strategy = { type = "redact" }
//! strategies = { PHONE_NUMBER = { type = "mask", keep_suffix = 4 } }
//! placeholders = { PERSON = "[NOMBRE]" }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PiiError, Result};
use crate::model::ModelSource;
use crate::span::{EntityKind, LanguageTag, RecognizerId};

/// Chave de fallback na tabela de pisos de um idioma.
pub const DEFAULT_THRESHOLD_KEY: &str = "DEFAULT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Conjunto fechado de idiomas aceitos.
    pub supported_languages: Vec<LanguageTag>,
    pub default_language: LanguageTag,
    /// Idioma → reconhecedores habilitados. Idioma ausente = todos.
    pub recognizer_enablement: HashMap<LanguageTag, Vec<RecognizerId>>,
    /// Idioma → fonte do modelo estatístico. Idioma ausente = `builtin`.
    pub model_source: HashMap<LanguageTag, ModelSource>,
    /// Idioma → (categoria ou `DEFAULT`) → piso de confiança.
    ///
    /// Lida de TOML, cada entrada sobrescreve só a sua categoria; os pisos
    /// padrão dos idiomas suportados continuam valendo para o resto.
    pub thresholds: HashMap<LanguageTag, HashMap<EntityKind, f64>>,
    /// Sobrescreve a prioridade de desempate de um reconhecedor.
    pub recognizer_priorities: HashMap<RecognizerId, i32>,
    /// Prazo total para os reconhecedores de uma requisição.
    pub deadline_ms: u64,
    pub context_validation: bool,
    /// Janela de contexto (bytes) do validador e das palavras de contexto.
    pub context_window: usize,
    /// Threads do pool dos reconhecedores. 0 = uma por núcleo.
    pub worker_threads: usize,
    pub anonymizer: AnonymizerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let es = LanguageTag::new("es");
        let en = LanguageTag::new("en");

        let mut thresholds = HashMap::new();
        thresholds.insert(
            es.clone(),
            floors(&[
                ("PERSON", 0.60),
                ("LOCATION", 0.60),
                ("EMAIL_ADDRESS", 0.70),
                ("PHONE_NUMBER", 0.70),
                ("CREDIT_CARD", 0.70),
                ("NATIONAL_ID", 0.70),
                ("ADDRESS", 0.60),
                ("DATE", 0.60),
                (DEFAULT_THRESHOLD_KEY, 0.65),
            ]),
        );
        thresholds.insert(
            en.clone(),
            floors(&[
                ("PERSON", 0.65),
                ("LOCATION", 0.65),
                ("EMAIL_ADDRESS", 0.75),
                ("PHONE_NUMBER", 0.75),
                ("CREDIT_CARD", 0.75),
                ("DATE", 0.60),
                (DEFAULT_THRESHOLD_KEY, 0.70),
            ]),
        );

        Self {
            supported_languages: vec![es.clone(), en],
            default_language: es,
            recognizer_enablement: HashMap::new(),
            model_source: HashMap::new(),
            thresholds,
            recognizer_priorities: HashMap::new(),
            deadline_ms: 5_000,
            context_validation: true,
            context_window: 50,
            worker_threads: 0,
            anonymizer: AnonymizerConfig::default(),
        }
    }
}

fn floors(entries: &[(&str, f64)]) -> HashMap<EntityKind, f64> {
    entries.iter().map(|(k, v)| (EntityKind::new(k), *v)).collect()
}

/// Aplica `overrides` por categoria sobre os pisos padrão dos idiomas
/// suportados. Idiomas não suportados passam adiante para `validate`.
fn merge_thresholds(
    supported: &[LanguageTag],
    overrides: HashMap<LanguageTag, HashMap<EntityKind, f64>>,
) -> HashMap<LanguageTag, HashMap<EntityKind, f64>> {
    let mut merged = PipelineConfig::default().thresholds;
    merged.retain(|language, _| supported.contains(language));
    for (language, table) in overrides {
        merged.entry(language).or_default().extend(table);
    }
    merged
}

impl PipelineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut config: PipelineConfig = toml::from_str(raw)?;
        let overrides = std::mem::take(&mut config.thresholds);
        config.thresholds = merge_thresholds(&config.supported_languages, overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "lendo configuração");
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Verifica consistência: idiomas referenciados existem, pisos em `[0, 1]`,
    /// prazo e janela positivos.
    pub fn validate(&self) -> Result<()> {
        if self.supported_languages.is_empty() {
            return Err(PiiError::Config("nenhum idioma suportado".into()));
        }
        if !self.supports(&self.default_language) {
            return Err(PiiError::Config(format!(
                "idioma padrão '{}' fora de supported_languages",
                self.default_language
            )));
        }
        let referenced = self
            .recognizer_enablement
            .keys()
            .chain(self.model_source.keys())
            .chain(self.thresholds.keys());
        for language in referenced {
            if !self.supports(language) {
                return Err(PiiError::Config(format!(
                    "idioma '{language}' configurado mas não suportado"
                )));
            }
        }
        for (language, table) in &self.thresholds {
            for (kind, floor) in table {
                if !(0.0..=1.0).contains(floor) {
                    return Err(PiiError::Config(format!(
                        "piso {floor} fora de [0, 1] para {language}/{kind}"
                    )));
                }
            }
        }
        if self.deadline_ms == 0 {
            return Err(PiiError::Config("deadline_ms deve ser positivo".into()));
        }
        if self.context_window == 0 {
            return Err(PiiError::Config("context_window deve ser positivo".into()));
        }
        self.anonymizer.validate()
    }

    pub fn supports(&self, language: &LanguageTag) -> bool {
        self.supported_languages.contains(language)
    }

    /// Piso de confiança para `(language, kind)`: valor da categoria, senão
    /// o `DEFAULT` do idioma, senão 0.
    pub fn confidence_floor(&self, language: &LanguageTag, kind: &EntityKind) -> f64 {
        let fallback = EntityKind::new(DEFAULT_THRESHOLD_KEY);
        self.thresholds
            .get(language)
            .and_then(|table| table.get(kind).or_else(|| table.get(&fallback)))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn is_enabled(&self, language: &LanguageTag, id: &RecognizerId) -> bool {
        self.recognizer_enablement
            .get(language)
            .map(|ids| ids.contains(id))
            .unwrap_or(true)
    }

    pub fn model_source_for(&self, language: &LanguageTag) -> ModelSource {
        self.model_source
            .get(language)
            .cloned()
            .unwrap_or(ModelSource::Builtin)
    }

    pub fn priority_for(&self, id: &RecognizerId, default: i32) -> i32 {
        self.recognizer_priorities.get(id).copied().unwrap_or(default)
    }
}

/// Estratégia de substituição declarável em configuração.
///
/// A estratégia `custom` só existe em código
/// ([`Strategy::Custom`](crate::anonymizer::Strategy::Custom)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Redact,
    Mask {
        #[serde(default = "default_mask_char")]
        mask_char: char,
        #[serde(default)]
        keep_prefix: usize,
        #[serde(default)]
        keep_suffix: usize,
    },
    Hash {
        #[serde(default = "default_hash_length")]
        length: usize,
    },
}

fn default_mask_char() -> char {
    '*'
}

fn default_hash_length() -> usize {
    16
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnonymizerConfig {
    pub default_strategy: StrategyConfig,
    /// Categoria → estratégia.
    pub strategies: HashMap<EntityKind, StrategyConfig>,
    /// Categoria → texto fixo da estratégia `redact` (padrão `<KIND>`).
    pub placeholders: HashMap<EntityKind, String>,
    /// Sal do `hash`. Sem sal, cada chamada sorteia um novo.
    pub hash_salt: Option<String>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategyConfig::Redact,
            strategies: HashMap::new(),
            placeholders: HashMap::new(),
            hash_salt: None,
        }
    }
}

impl AnonymizerConfig {
    pub fn validate(&self) -> Result<()> {
        for strategy in self.strategies.values().chain(std::iter::once(&self.default_strategy)) {
            if let StrategyConfig::Hash { length } = strategy {
                if !(1..=64).contains(length) {
                    return Err(PiiError::Config(format!(
                        "tamanho de hash {length} fora de 1..=64"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.supports(&LanguageTag::new("es")));
        assert!(!config.supports(&LanguageTag::new("fr")));
    }

    #[test]
    fn test_confidence_floor_fallback() {
        let config = PipelineConfig::default();
        let es = LanguageTag::new("es");
        assert_eq!(config.confidence_floor(&es, &EntityKind::PERSON), 0.60);
        assert_eq!(config.confidence_floor(&es, &EntityKind::IP_ADDRESS), 0.65);
        assert_eq!(config.confidence_floor(&LanguageTag::new("de"), &EntityKind::PERSON), 0.0);
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
            supported_languages = ["ES", "en"]
            default_language = "es"
            deadline_ms = 250

            [model_source]
            en = "/tmp/en.json"

            [recognizer_enablement]
            en = ["email"]

            [thresholds.es]
            PERSON = 0.8

            [recognizer_priorities]
            co_national_id = 3

            [anonymizer]
            default_strategy = { type = "mask", keep_suffix = 2 }
            placeholders = { person = "[NOMBRE]" }
        "#;
        let config = PipelineConfig::from_toml_str(raw).unwrap();
        let es = LanguageTag::new("es");
        let en = LanguageTag::new("en");

        assert_eq!(config.supported_languages, vec![es.clone(), en.clone()]);
        assert_eq!(config.deadline_ms, 250);
        assert!(config.context_validation);
        assert_eq!(config.confidence_floor(&es, &EntityKind::PERSON), 0.8);
        assert_eq!(config.model_source_for(&es), ModelSource::Builtin);
        assert!(matches!(config.model_source_for(&en), ModelSource::File(_)));
        assert!(config.is_enabled(&en, &RecognizerId::new("email")));
        assert!(!config.is_enabled(&en, &RecognizerId::new("phone")));
        assert!(config.is_enabled(&es, &RecognizerId::new("phone")));
        assert_eq!(config.priority_for(&RecognizerId::new("co_national_id"), 0), 3);
        assert_eq!(
            config.anonymizer.default_strategy,
            StrategyConfig::Mask { mask_char: '*', keep_prefix: 0, keep_suffix: 2 }
        );
        assert_eq!(
            config.anonymizer.placeholders.get(&EntityKind::PERSON).map(String::as_str),
            Some("[NOMBRE]")
        );
    }

    #[test]
    fn test_toml_thresholds_merge_with_defaults() {
        let raw = r#"
            [thresholds.es]
            PERSON = 0.8
            email_address = 0.9
        "#;
        let config = PipelineConfig::from_toml_str(raw).unwrap();
        let es = LanguageTag::new("es");
        let en = LanguageTag::new("en");

        assert_eq!(config.confidence_floor(&es, &EntityKind::PERSON), 0.8);
        // chave em minúsculas vale para a categoria normalizada
        assert_eq!(config.confidence_floor(&es, &EntityKind::EMAIL_ADDRESS), 0.9);
        // categorias não mencionadas mantêm o padrão
        assert_eq!(config.confidence_floor(&es, &EntityKind::PHONE_NUMBER), 0.70);
        assert_eq!(config.confidence_floor(&es, &EntityKind::IP_ADDRESS), 0.65);
        assert_eq!(config.confidence_floor(&en, &EntityKind::PERSON), 0.65);
        assert_eq!(config.confidence_floor(&en, &EntityKind::IP_ADDRESS), 0.70);
    }

    #[test]
    fn test_toml_thresholds_follow_supported_languages() {
        let raw = r#"
            supported_languages = ["es"]
            default_language = "es"
        "#;
        let config = PipelineConfig::from_toml_str(raw).unwrap();
        assert!(config.thresholds.contains_key(&LanguageTag::new("es")));
        assert!(!config.thresholds.contains_key(&LanguageTag::new("en")));

        let err = PipelineConfig::from_toml_str(
            "supported_languages = [\"es\"]\ndefault_language = \"es\"\n[thresholds.en]\nPERSON = 0.5",
        )
        .unwrap_err();
        assert!(matches!(err, PiiError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_default_language() {
        let err = PipelineConfig::from_toml_str(r#"supported_languages = ["es"]
default_language = "fr""#)
            .unwrap_err();
        assert!(matches!(err, PiiError::Config(_)));
    }

    #[test]
    fn test_rejects_out_of_range_floor() {
        let err = PipelineConfig::from_toml_str("[thresholds.es]\nPERSON = 1.5").unwrap_err();
        assert!(matches!(err, PiiError::Config(_)));
    }

    #[test]
    fn test_rejects_bad_toml() {
        let err = PipelineConfig::from_toml_str("deadline_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, PiiError::TomlParse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pii.toml");
        std::fs::write(&path, "context_window = 80\n").unwrap();
        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.context_window, 80);
        assert_eq!(config.supported_languages.len(), 2);
    }
}
