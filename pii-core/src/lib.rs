//! # pii-core — Detecção e Anonimização de Dados Pessoais (PII)
//!
//! Este crate encontra dados pessoais em texto livre (nomes, lugares,
//! e-mails, telefones, documentos de identidade, cartões, datas) em mais
//! de um idioma e reescreve o texto substituindo cada ocorrência.
//!
//! ## Arquitetura do Sistema
//!
//! 1.  **Entrada**: texto UTF-8 + código de idioma (`es`, `en`).
//! 2.  **Registry** ([`registry`]): resolve o conjunto de reconhecedores do
//!     idioma e carrega o modelo estatístico sob demanda (uma única vez).
//! 3.  **Reconhecedores** ([`recognizer`]), executados em paralelo:
//!     *   **Padrões** ([`pattern`]): regex + validação (Luhn, dígito
//!         verificador, octetos) + palavras de contexto.
//!     *   **Estatístico** ([`statistical`]): CRF linear-chain
//!         ([`features`], [`crf`], [`viterbi`]) sobre tokens BIO ([`tagger`]).
//! 4.  **Validação contextual** ([`context`]): descarta ou reescala spans
//!     implausíveis.
//! 5.  **Resolução** ([`resolver`]): piso de confiança por categoria e
//!     eliminação de sobreposições.
//! 6.  **Anonimização** ([`anonymizer`]): redact, mask, hash ou função do
//!     chamador.
//! 7.  **Saída**: [`AnalysisReport`] e/ou [`AnonymizedResult`].
//!
//! Todos os offsets são em **bytes** do texto original e caem sempre em
//! fronteiras de caractere.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use pii_core::{AnalysisPipeline, LanguageTag, PipelineConfig};
//!
//! let pipeline = AnalysisPipeline::new(PipelineConfig::default()).unwrap();
//! let es = LanguageTag::new("es");
//!
//! let result = pipeline.anonymize("Mi correo es a@b.com", &es, None).unwrap();
//! assert_eq!(result.text, "Mi correo es <EMAIL_ADDRESS>");
//! ```
//!
//! ## Módulos Principais
//!
//! - [`pipeline`]: orquestrador que conecta todos os estágios.
//! - [`config`]: configuração TOML (idiomas, pisos, estratégias).
//! - [`span`]: tipos de valor compartilhados (`Span`, `EntityKind`, ...).

pub mod anonymizer;
pub mod config;
pub mod context;
pub mod crf;
pub mod error;
pub mod extract;
pub mod features;
pub mod model;
pub mod pattern;
pub mod pipeline;
pub mod recognizer;
pub mod registry;
pub mod resolver;
pub mod span;
pub mod statistical;
pub mod tagger;
pub mod tokenizer;
pub mod viterbi;

pub use anonymizer::{AnonymizationOutput, AnonymizedResult, Anonymizer, Strategy, SubstitutionRecord};
pub use config::{AnonymizerConfig, PipelineConfig, StrategyConfig};
pub use error::{PiiError, Result};
pub use extract::{PlainTextExtractor, TextExtractor};
pub use model::{DefaultModelLoader, ModelLoader, ModelSource, NerModel};
pub use pipeline::{AnalysisPipeline, AnalysisReport, DegradationReason, DegradedRecognizer};
pub use registry::LanguageEngineRegistry;
pub use resolver::{EntityResolver, ResolvedEntitySet};
pub use span::{EntityKind, LanguageTag, RecognizerId, Span};
