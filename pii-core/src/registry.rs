//! # Registro de Motores por Idioma
//!
//! Mapeia um idioma para a lista ordenada de reconhecedores ativos.
//!
//! - A tabela de reconhecedores por padrão é montada uma vez, na criação,
//!   a partir da configuração (habilitação por idioma e prioridades).
//! - O modelo estatístico de cada idioma é carregado sob demanda, no máximo
//!   uma vez com sucesso, via `OnceCell::get_or_try_init`: chamadas
//!   concorrentes para o mesmo idioma esperam o carregamento em curso.
//! - Uma falha de carregamento não fica em cache; a próxima requisição
//!   tenta de novo. Enquanto isso, só o reconhecedor estatístico daquele
//!   idioma fica indisponível.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::context::ContextValidator;
use crate::error::{PiiError, Result};
use crate::model::{DefaultModelLoader, ModelLoader, NerModel};
use crate::pattern::{builtin_pattern_recognizers, PatternRecognizer};
use crate::recognizer::{Recognizer, RecognizerDescriptor, RecognizerKind};
use crate::span::{LanguageTag, RecognizerId};
use crate::statistical::{statistical_kinds, StatisticalRecognizer, STATISTICAL_ID};

/// Prioridades de desempate padrão (maior ganha).
fn default_priority(id: &RecognizerId) -> i32 {
    match id.as_str() {
        "co_national_id" | "credit_card" => 2,
        "email" | "phone" | "ip_address" | "address" => 1,
        _ => 0,
    }
}

/// Idiomas de cada reconhecedor por padrão embutido; vazio = todos.
fn default_languages(id: &RecognizerId) -> Vec<LanguageTag> {
    match id.as_str() {
        "co_national_id" | "address" => vec![LanguageTag::new("es")],
        _ => vec![],
    }
}

pub struct LanguageEngineRegistry {
    config: PipelineConfig,
    loader: Arc<dyn ModelLoader>,
    patterns: Vec<(RecognizerDescriptor, Arc<PatternRecognizer>)>,
    models: HashMap<LanguageTag, OnceCell<Arc<NerModel>>>,
}

impl std::fmt::Debug for LanguageEngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguageEngineRegistry")
            .field("languages", &self.config.supported_languages)
            .field("patterns", &self.patterns.iter().map(|(d, _)| &d.id).collect::<Vec<_>>())
            .finish()
    }
}

impl LanguageEngineRegistry {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_loader(config, Arc::new(DefaultModelLoader))
    }

    pub fn with_loader(config: PipelineConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;

        let patterns: Vec<(RecognizerDescriptor, Arc<PatternRecognizer>)> =
            builtin_pattern_recognizers()
                .into_iter()
                .map(|p| {
                    let p = p.with_context_window(config.context_window);
                    let id = p.id().clone();
                    let descriptor = RecognizerDescriptor {
                        languages: default_languages(&id),
                        kinds: vec![p.kind().clone()],
                        priority: config.priority_for(&id, default_priority(&id)),
                        id,
                    };
                    (descriptor, Arc::new(p))
                })
                .collect();

        let known: Vec<RecognizerId> = patterns
            .iter()
            .map(|(d, _)| d.id.clone())
            .chain(std::iter::once(STATISTICAL_ID))
            .collect();
        for (language, ids) in &config.recognizer_enablement {
            for id in ids.iter().filter(|id| !known.contains(*id)) {
                warn!(%language, recognizer = %id, "reconhecedor habilitado não existe");
            }
        }

        let models = config
            .supported_languages
            .iter()
            .map(|lang| (lang.clone(), OnceCell::new()))
            .collect();

        Ok(Self {
            config,
            loader,
            patterns,
            models,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn check_supported(&self, language: &LanguageTag) -> Result<()> {
        if self.config.supports(language) {
            Ok(())
        } else {
            Err(PiiError::UnsupportedLanguage {
                language: language.to_string(),
            })
        }
    }

    /// Reconhecedores ativos para `language`, na ordem de registro
    /// (padrões primeiro, estatístico por último).
    ///
    /// Se o modelo do idioma não carregar, o reconhecedor estatístico vem
    /// mesmo assim, marcado como indisponível.
    pub fn get_engines(&self, language: &LanguageTag) -> Result<Vec<Recognizer>> {
        self.check_supported(language)?;

        let mut engines: Vec<Recognizer> = self
            .patterns
            .iter()
            .filter(|(d, _)| d.supports_language(language) && self.config.is_enabled(language, &d.id))
            .map(|(d, p)| Recognizer {
                descriptor: d.clone(),
                kind: RecognizerKind::Pattern(Arc::clone(p)),
            })
            .collect();

        if self.config.is_enabled(language, &STATISTICAL_ID) {
            let statistical = match self.model(language) {
                Ok(model) => StatisticalRecognizer::new(model),
                Err(e) => {
                    warn!(%language, error = %e, "modelo estatístico indisponível");
                    StatisticalRecognizer::unavailable(language.clone(), e.to_string())
                }
            };
            engines.push(Recognizer {
                descriptor: self.statistical_descriptor(language),
                kind: RecognizerKind::Statistical(statistical),
            });
        }

        Ok(engines)
    }

    fn statistical_descriptor(&self, language: &LanguageTag) -> RecognizerDescriptor {
        RecognizerDescriptor {
            id: STATISTICAL_ID,
            languages: vec![language.clone()],
            kinds: statistical_kinds(),
            priority: self.config.priority_for(&STATISTICAL_ID, default_priority(&STATISTICAL_ID)),
        }
    }

    /// Modelo do idioma, carregando-o na primeira chamada.
    pub fn model(&self, language: &LanguageTag) -> Result<Arc<NerModel>> {
        self.check_supported(language)?;
        let cell = self
            .models
            .get(language)
            .ok_or_else(|| PiiError::UnsupportedLanguage {
                language: language.to_string(),
            })?;

        cell.get_or_try_init(|| {
            let source = self.config.model_source_for(language);
            info!(%language, %source, "carregando modelo estatístico");
            let model = self.loader.load(language, &source)?;
            info!(
                %language,
                emission_weights = model.crf.emission_weights.len(),
                "modelo carregado"
            );
            Ok::<_, PiiError>(Arc::new(model))
        })
        .cloned()
    }

    pub fn is_model_loaded(&self, language: &LanguageTag) -> bool {
        self.models
            .get(language)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    /// Carrega antecipadamente o modelo de todo idioma suportado cujo
    /// reconhecedor estatístico esteja habilitado. Devolve as falhas.
    pub fn warm_up(&self) -> Vec<(LanguageTag, PiiError)> {
        self.config
            .supported_languages
            .iter()
            .filter(|lang| self.config.is_enabled(lang, &STATISTICAL_ID))
            .filter_map(|lang| self.model(lang).err().map(|e| (lang.clone(), e)))
            .collect()
    }

    pub fn contextual_validator(&self, language: &LanguageTag) -> Result<ContextValidator> {
        self.check_supported(language)?;
        Ok(ContextValidator::for_language(language, self.config.context_window))
    }

    /// Prioridade efetiva de cada reconhecedor conhecido.
    pub fn priorities(&self) -> HashMap<RecognizerId, i32> {
        let mut priorities: HashMap<RecognizerId, i32> = self
            .patterns
            .iter()
            .map(|(d, _)| (d.id.clone(), d.priority))
            .collect();
        priorities.insert(
            STATISTICAL_ID,
            self.config.priority_for(&STATISTICAL_ID, default_priority(&STATISTICAL_ID)),
        );
        priorities
    }
}
