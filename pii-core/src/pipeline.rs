//! # Pipeline de Análise
//!
//! Fachada que coordena todos os módulos para uma requisição:
//!
//! ```text
//! texto + idioma
//!   → registry.get_engines(idioma)        (UnsupportedLanguage antes de tudo)
//!   → reconhecedores em paralelo (rayon)   → canal mpsc → junção com prazo
//!   → validador contextual                 (descarta / reescala)
//!   → filtro de categorias + piso de confiança
//!   → resolvedor                           (conjunto ordenado, sem sobreposição)
//!   → anonimizador (opcional)
//! ```
//!
//! O pipeline é `Send + Sync` e pode ser compartilhado atrás de `Arc`
//! entre requisições concorrentes. Nenhuma etapa altera o estado do
//! registry além da carga preguiçosa de modelos.
//!
//! Os reconhecedores rodam num pool rayon próprio do pipeline
//! (`pii-recognizer-N`). A thread que chama [`AnalysisPipeline::analyze`]
//! só espera no canal, então chamar de dentro de outro pool rayon (mesmo
//! com uma única thread) não trava.
//!
//! ## Degradação
//!
//! Um reconhecedor que não contribui (modelo indisponível, erro ou prazo
//! estourado) é listado em [`AnalysisReport::degraded`] e a requisição
//! segue com os demais. Resultados que chegam depois do prazo são
//! descartados.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anonymizer::{AnonymizedResult, Anonymizer};
use crate::config::PipelineConfig;
use crate::error::{PiiError, Result};
use crate::extract::TextExtractor;
use crate::model::ModelLoader;
use crate::recognizer::Recognizer;
use crate::registry::LanguageEngineRegistry;
use crate::resolver::{EntityResolver, ResolvedEntitySet};
use crate::span::{EntityKind, LanguageTag, RecognizerId, Span};

/// Por que um reconhecedor não contribuiu nesta requisição.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradationReason {
    ModelUnavailable(String),
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedRecognizer {
    pub recognizer: RecognizerId,
    pub reason: DegradationReason,
}

/// Resultado de uma análise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub language: LanguageTag,
    pub entities: ResolvedEntitySet,
    /// Vazio quando todos os reconhecedores contribuíram.
    pub degraded: Vec<DegradedRecognizer>,
    pub elapsed_ms: u64,
}

impl AnalysisReport {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

pub struct AnalysisPipeline {
    registry: LanguageEngineRegistry,
    resolver: EntityResolver,
    anonymizer: Anonymizer,
    workers: rayon::ThreadPool,
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("registry", &self.registry)
            .field("anonymizer", &self.anonymizer)
            .field("workers", &self.workers.current_num_threads())
            .finish()
    }
}

impl AnalysisPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::from_registry(LanguageEngineRegistry::new(config)?)
    }

    pub fn with_loader(config: PipelineConfig, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        Self::from_registry(LanguageEngineRegistry::with_loader(config, loader)?)
    }

    fn from_registry(registry: LanguageEngineRegistry) -> Result<Self> {
        let resolver = EntityResolver::new(registry.priorities());
        let anonymizer = Anonymizer::from_config(&registry.config().anonymizer);
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(registry.config().worker_threads)
            .thread_name(|i| format!("pii-recognizer-{i}"))
            .build()
            .map_err(|e| PiiError::Config(format!("pool de reconhecedores: {e}")))?;
        debug!(threads = workers.current_num_threads(), "pool de reconhecedores criado");
        Ok(Self {
            registry,
            resolver,
            anonymizer,
            workers,
        })
    }

    /// Troca o anonimizador (ex: para registrar estratégias `Custom`).
    pub fn with_anonymizer(mut self, anonymizer: Anonymizer) -> Self {
        self.anonymizer = anonymizer;
        self
    }

    pub fn registry(&self) -> &LanguageEngineRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        self.registry.config()
    }

    pub fn default_language(&self) -> &LanguageTag {
        &self.config().default_language
    }

    /// Detecta entidades em `text`.
    ///
    /// `entity_filter = None` aceita todas as categorias. A mesma entrada
    /// sempre produz o mesmo conjunto resolvido (desde que nenhum
    /// reconhecedor estoure o prazo).
    pub fn analyze(
        &self,
        text: &str,
        language: &LanguageTag,
        entity_filter: Option<&[EntityKind]>,
    ) -> Result<AnalysisReport> {
        let started = Instant::now();
        let config = self.config();

        let engines: Vec<Recognizer> = self
            .registry
            .get_engines(language)?
            .into_iter()
            .filter(|r| r.descriptor.emits_any(entity_filter))
            .collect();

        let deadline = Duration::from_millis(config.deadline_ms);
        let (candidates, degraded) = run_recognizers(&self.workers, text, engines, deadline)?;
        let raw_count = candidates.len();

        let candidates = if config.context_validation {
            self.registry
                .contextual_validator(language)?
                .revalidate(text, candidates)
        } else {
            candidates
        };

        let candidates: Vec<Span> = candidates
            .into_iter()
            .filter(|s| entity_filter.map_or(true, |kinds| kinds.contains(s.category())))
            .filter(|s| s.score() >= config.confidence_floor(language, s.category()))
            .collect();

        let entities = self.resolver.resolve(candidates);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            %language,
            text_len = text.len(),
            candidates = raw_count,
            entities = entities.len(),
            degraded = degraded.len(),
            elapsed_ms,
            "análise concluída"
        );

        Ok(AnalysisReport {
            language: language.clone(),
            entities,
            degraded,
            elapsed_ms,
        })
    }

    /// Analisa e reescreve o texto com o anonimizador configurado.
    pub fn anonymize(
        &self,
        text: &str,
        language: &LanguageTag,
        entity_filter: Option<&[EntityKind]>,
    ) -> Result<AnonymizedResult> {
        self.analyze_and_anonymize(text, language, entity_filter)
            .map(|(_, result)| result)
    }

    /// Como [`anonymize`](Self::anonymize), devolvendo também o relatório.
    pub fn analyze_and_anonymize(
        &self,
        text: &str,
        language: &LanguageTag,
        entity_filter: Option<&[EntityKind]>,
    ) -> Result<(AnalysisReport, AnonymizedResult)> {
        let report = self.analyze(text, language, entity_filter)?;
        let result = self.anonymizer.anonymize(text, report.entities.as_slice())?;
        debug!(substitutions = result.substitutions.len(), "texto anonimizado");
        Ok((report, result))
    }

    /// Extrai o texto de um arquivo e o analisa. Se a extração falhar, o
    /// pipeline não roda.
    pub fn analyze_document(
        &self,
        bytes: &[u8],
        mime: &str,
        extractor: &dyn TextExtractor,
        language: &LanguageTag,
        entity_filter: Option<&[EntityKind]>,
    ) -> Result<(String, AnalysisReport)> {
        let text = extractor.extract_text(bytes, mime).map_err(|e| match e {
            PiiError::ExtractionFailed { .. } => e,
            other => PiiError::ExtractionFailed {
                mime: mime.to_string(),
                reason: other.to_string(),
            },
        })?;
        let report = self.analyze(&text, language, entity_filter)?;
        Ok((text, report))
    }
}

/// Resultado de um reconhecedor: `Err` carrega a mensagem de um pânico.
type Outcome = std::result::Result<Result<Vec<Span>>, String>;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "pânico sem mensagem".to_string()
    }
}

/// Roda cada reconhecedor em `pool` e junta os resultados até o prazo.
///
/// Os spans voltam na ordem de registro dos reconhecedores, não na ordem de
/// chegada. Um span fora dos limites do texto aborta a requisição.
pub(crate) fn run_recognizers(
    pool: &rayon::ThreadPool,
    text: &str,
    engines: Vec<Recognizer>,
    deadline: Duration,
) -> Result<(Vec<Span>, Vec<DegradedRecognizer>)> {
    if engines.is_empty() {
        return Ok((vec![], vec![]));
    }

    let ids: Vec<RecognizerId> = engines.iter().map(|r| r.id().clone()).collect();
    let shared: Arc<str> = Arc::from(text);
    let (tx, rx) = mpsc::channel::<(usize, Outcome)>();

    for (index, recognizer) in engines.into_iter().enumerate() {
        let tx = tx.clone();
        let text = Arc::clone(&shared);
        pool.spawn(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| recognizer.detect(&text)))
                .map_err(panic_message);
            // o receptor pode já ter desistido (prazo)
            let _ = tx.send((index, outcome));
        });
    }
    drop(tx);

    let expires_at = Instant::now() + deadline;
    let mut results: Vec<Option<Outcome>> = (0..ids.len()).map(|_| None).collect();
    let mut pending = ids.len();

    while pending > 0 {
        let remaining = expires_at.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((index, result)) => {
                results[index] = Some(result);
                pending -= 1;
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut spans = Vec::new();
    let mut degraded = Vec::new();
    for (id, result) in ids.into_iter().zip(results) {
        match result {
            Some(Ok(Ok(found))) => {
                for span in &found {
                    span.check_bounds(text)?;
                }
                spans.extend(found);
            }
            Some(Ok(Err(e @ PiiError::InvalidSpan { .. }))) => return Err(e),
            Some(Ok(Err(e))) if e.is_recognizer_local() => {
                degraded.push(DegradedRecognizer {
                    recognizer: id,
                    reason: DegradationReason::ModelUnavailable(e.to_string()),
                });
            }
            Some(Err(panic)) => {
                warn!(recognizer = %id, panic = %panic, "reconhecedor entrou em pânico");
                degraded.push(DegradedRecognizer {
                    recognizer: id,
                    reason: DegradationReason::Failed(format!("pânico: {panic}")),
                });
            }
            Some(Ok(Err(e))) => {
                warn!(recognizer = %id, error = %e, "reconhecedor falhou");
                degraded.push(DegradedRecognizer {
                    recognizer: id,
                    reason: DegradationReason::Failed(e.to_string()),
                });
            }
            None => {
                warn!(recognizer = %id, deadline_ms = deadline.as_millis() as u64, "reconhecedor estourou o prazo");
                degraded.push(DegradedRecognizer {
                    recognizer: id,
                    reason: DegradationReason::TimedOut,
                });
            }
        }
    }

    Ok((spans, degraded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymizer::Strategy;
    use crate::extract::PlainTextExtractor;
    use crate::model::{DefaultModelLoader, ModelSource, NerModel};
    use crate::pattern::{Pattern, PatternMatch, PatternRecognizer};
    use crate::recognizer::{RecognizerDescriptor, RecognizerKind};
    use once_cell::sync::Lazy;
    use regex::Regex;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn pipeline() -> AnalysisPipeline {
        init_tracing();
        AnalysisPipeline::new(PipelineConfig::default()).unwrap()
    }

    fn es() -> LanguageTag {
        LanguageTag::new("es")
    }

    #[test]
    fn test_email_scenario() {
        let report = pipeline().analyze("Mi correo es a@b.com", &es(), None).unwrap();
        let entities = report.entities.as_slice();
        assert_eq!(entities.len(), 1);
        assert_eq!((entities[0].start(), entities[0].end()), (13, 20));
        assert_eq!(entities[0].category(), &EntityKind::EMAIL_ADDRESS);
        assert!((entities[0].score() - 0.95).abs() < 1e-9);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_redact_email_scenario() {
        let result = pipeline().anonymize("Mi correo es a@b.com", &es(), None).unwrap();
        assert_eq!(result.text, "Mi correo es <EMAIL_ADDRESS>");
        let out = result.to_output();
        assert_eq!(out.substitutions.len(), 1);
        assert_eq!(
            (out.substitutions[0].original_start, out.substitutions[0].original_end),
            (13, 20)
        );
        assert_eq!(out.substitutions[0].replacement_text, "<EMAIL_ADDRESS>");
    }

    #[test]
    fn test_unsupported_language_rejected() {
        let err = pipeline()
            .analyze("Je m'appelle Jean", &LanguageTag::new("fr"), None)
            .unwrap_err();
        assert!(matches!(err, PiiError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_mixed_entities_are_resolved() {
        let text = "El señor Juan Pérez vive en Bogotá, su celular es 300 123 4567 y su correo juan.perez@correo.com.co";
        let report = pipeline().analyze(text, &es(), None).unwrap();
        let found: Vec<(&str, &EntityKind)> = report
            .entities
            .iter()
            .map(|s| (s.text(text).unwrap(), s.category()))
            .collect();

        assert!(found.contains(&("Juan Pérez", &EntityKind::PERSON)));
        assert!(found.contains(&("Bogotá", &EntityKind::LOCATION)));
        assert!(found.contains(&("300 123 4567", &EntityKind::PHONE_NUMBER)));
        assert!(found.contains(&("juan.perez@correo.com.co", &EntityKind::EMAIL_ADDRESS)));
        for pair in report.entities.as_slice().windows(2) {
            assert!(pair[0].end() <= pair[1].start());
        }
    }

    #[test]
    fn test_colombian_address_is_anonymized() {
        let text = "Vivo en la Calle 45 # 12-34, barrio Chapinero";
        let (report, result) = pipeline().analyze_and_anonymize(text, &es(), None).unwrap();
        let address = report
            .entities
            .iter()
            .find(|s| s.category() == &EntityKind::ADDRESS)
            .unwrap();
        assert_eq!(address.text(text).unwrap(), "Calle 45 # 12-34");
        assert!(result.text.contains(" <ADDRESS>, barrio "));
        assert!(!result.text.contains("12-34"));

        let en = pipeline()
            .analyze(text, &LanguageTag::new("en"), Some(&[EntityKind::ADDRESS]))
            .unwrap();
        assert!(en.entities.is_empty());
    }

    #[test]
    fn test_entity_filter() {
        let text = "Juan Pérez escribe desde a@b.com";
        let filter = [EntityKind::EMAIL_ADDRESS];
        let report = pipeline().analyze(text, &es(), Some(&filter)).unwrap();
        assert!(report
            .entities
            .iter()
            .all(|s| s.category() == &EntityKind::EMAIL_ADDRESS));
        assert_eq!(report.entities.len(), 1);
    }

    #[test]
    fn test_confidence_floor_applied() {
        let mut config = PipelineConfig::default();
        config
            .thresholds
            .entry(es())
            .or_default()
            .insert(EntityKind::EMAIL_ADDRESS, 0.99);
        let pipeline = AnalysisPipeline::new(config).unwrap();
        let report = pipeline.analyze("Mi correo es a@b.com", &es(), None).unwrap();
        assert!(report.entities.is_empty());
    }

    #[test]
    fn test_deterministic_output() {
        let pipeline = pipeline();
        let text = "La doctora María Gómez (CC 52123456) vive en Medellín. Tel: +57 310 555 1234.";
        let first = pipeline.analyze(text, &es(), None).unwrap();
        for _ in 0..5 {
            let again = pipeline.analyze(text, &es(), None).unwrap();
            assert_eq!(again.entities, first.entities);
        }
    }

    #[test]
    fn test_model_failure_degrades_request() {
        let mut config = PipelineConfig::default();
        config
            .model_source
            .insert(es(), ModelSource::File("/nonexistent/es.json".into()));
        let pipeline = AnalysisPipeline::new(config).unwrap();

        let report = pipeline
            .analyze("Juan Pérez escribe desde a@b.com", &es(), None)
            .unwrap();
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.degraded.len(), 1);
        assert_eq!(report.degraded[0].recognizer.as_str(), "statistical_ner");
        assert!(matches!(
            report.degraded[0].reason,
            DegradationReason::ModelUnavailable(_)
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let pipeline = Arc::new(pipeline());
        std::thread::scope(|scope| {
            for i in 0..4 {
                let pipeline = Arc::clone(&pipeline);
                scope.spawn(move || {
                    let text = format!("correo{i}@empresa.co");
                    let report = pipeline.analyze(&text, &LanguageTag::new("en"), None).unwrap();
                    assert_eq!(report.entities.len(), 1);
                });
            }
        });
    }

    #[test]
    fn test_custom_strategy_through_pipeline() {
        let anonymizer = Anonymizer::default().with_strategy(
            EntityKind::EMAIL_ADDRESS,
            Strategy::Mask {
                mask_char: '*',
                keep_prefix: 1,
                keep_suffix: 0,
            },
        );
        let pipeline = pipeline().with_anonymizer(anonymizer);
        let result = pipeline.anonymize("Mi correo es a@b.com", &es(), None).unwrap();
        assert_eq!(result.text, "Mi correo es a******");
    }

    #[test]
    fn test_analyze_document() {
        let pipeline = pipeline();
        let (text, report) = pipeline
            .analyze_document(
                "\u{feff}Mi correo es a@b.com".as_bytes(),
                "text/plain",
                &PlainTextExtractor,
                &es(),
                None,
            )
            .unwrap();
        assert_eq!(text, "Mi correo es a@b.com");
        assert_eq!(report.entities.len(), 1);

        let err = pipeline
            .analyze_document(b"%PDF", "application/pdf", &PlainTextExtractor, &es(), None)
            .unwrap_err();
        assert!(matches!(err, PiiError::ExtractionFailed { .. }));
    }

    #[test]
    fn test_custom_loader_is_used() {
        struct FixedLoader;
        impl ModelLoader for FixedLoader {
            fn load(&self, language: &LanguageTag, _: &ModelSource) -> Result<NerModel> {
                DefaultModelLoader.load(language, &ModelSource::Builtin)
            }
        }
        let pipeline =
            AnalysisPipeline::with_loader(PipelineConfig::default(), Arc::new(FixedLoader)).unwrap();
        let report = pipeline.analyze("Vivo en Cartagena", &es(), None).unwrap();
        assert!(report
            .entities
            .iter()
            .any(|s| s.category() == &EntityKind::LOCATION));
    }

    #[test]
    fn test_analyze_inside_single_thread_pool() {
        let pipeline = pipeline();
        let outer = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();

        let report = outer
            .install(|| pipeline.analyze("Mi correo es a@b.com", &es(), None))
            .unwrap();
        assert_eq!(report.entities.len(), 1);
        assert!(!report.is_degraded());

        let result = outer
            .install(|| pipeline.anonymize("Mi correo es a@b.com", &es(), None))
            .unwrap();
        assert_eq!(result.text, "Mi correo es <EMAIL_ADDRESS>");
    }

    #[test]
    fn test_worker_threads_from_config() {
        let mut config = PipelineConfig::default();
        config.worker_threads = 2;
        let pipeline = AnalysisPipeline::new(config).unwrap();
        assert_eq!(pipeline.workers.current_num_threads(), 2);
    }

    static FIRST_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+").unwrap());

    fn slow_validate(m: &PatternMatch<'_>) -> Option<f64> {
        std::thread::sleep(Duration::from_millis(600));
        Some(m.score)
    }

    fn panicking_validate(_: &PatternMatch<'_>) -> Option<f64> {
        panic!("validador quebrado")
    }

    fn engine(id: &str, kind: EntityKind, recognizer: PatternRecognizer) -> Recognizer {
        Recognizer {
            descriptor: RecognizerDescriptor {
                id: RecognizerId::new(id),
                languages: vec![],
                kinds: vec![kind],
                priority: 0,
            },
            kind: RecognizerKind::Pattern(Arc::new(recognizer)),
        }
    }

    fn word_recognizer(id: &str, validate: fn(&PatternMatch<'_>) -> Option<f64>) -> PatternRecognizer {
        PatternRecognizer::new(
            RecognizerId::new(id),
            EntityKind::new("WORD"),
            vec![Pattern { name: "word", regex: &FIRST_WORD, score: 0.9 }],
            validate,
            &[],
        )
    }

    fn workers() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn test_late_recognizer_times_out() {
        let engines = vec![
            engine("email", EntityKind::EMAIL_ADDRESS, PatternRecognizer::email()),
            engine("slow", EntityKind::new("WORD"), word_recognizer("slow", slow_validate)),
        ];

        let (spans, degraded) = run_recognizers(
            &workers(),
            "escribe a a@b.com",
            engines,
            Duration::from_millis(150),
        )
        .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].recognizer.as_str(), "slow");
        assert_eq!(degraded[0].reason, DegradationReason::TimedOut);
    }

    #[test]
    fn test_panicking_recognizer_is_reported_as_failed() {
        init_tracing();
        let engines = vec![
            engine("broken", EntityKind::new("WORD"), word_recognizer("broken", panicking_validate)),
            engine("email", EntityKind::EMAIL_ADDRESS, PatternRecognizer::email()),
        ];

        let (spans, degraded) = run_recognizers(
            &workers(),
            "escribe a a@b.com",
            engines,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].category(), &EntityKind::EMAIL_ADDRESS);
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].recognizer.as_str(), "broken");
        match &degraded[0].reason {
            DegradationReason::Failed(detail) => assert!(detail.contains("validador quebrado")),
            other => panic!("motivo inesperado: {other:?}"),
        }
    }
}
