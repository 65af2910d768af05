//! # Reconhecedor Estatístico (CRF + Viterbi)
//!
//! Para cada sentença do texto:
//!
//! 1. Tokenização com offsets ([`tokenizer`](crate::tokenizer))
//! 2. Extração de features ([`features`](crate::features))
//! 3. Decodificação Viterbi sobre o CRF do idioma
//! 4. Reconstrução das entidades BIO e tradução dos rótulos nativos via
//!    [`map_label`] (MISC é descartado)
//!
//! A confiança de cada span é a média das probabilidades por token da tag
//! decodificada.
//!
//! Se o modelo do idioma não carregou, o reconhecedor existe mesmo assim e
//! responde [`PiiError::ModelUnavailable`] a cada chamada; o pipeline trata
//! isso como degradação.

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{PiiError, Result};
use crate::features::extract_features;
use crate::model::{map_label, NerModel};
use crate::span::{EntityKind, LanguageTag, RecognizerId, Span};
use crate::tagger::{tokens_to_spans, TaggedToken};
use crate::tokenizer::{tokenize, Token};
use crate::viterbi::viterbi_decode;

/// Identificador padrão do reconhecedor estatístico.
pub const STATISTICAL_ID: RecognizerId = RecognizerId::from_static("statistical_ner");

/// Categorias que o modelo pode emitir depois da tabela de rótulos.
pub fn statistical_kinds() -> Vec<EntityKind> {
    vec![EntityKind::PERSON, EntityKind::LOCATION, EntityKind::ORGANIZATION]
}

#[derive(Debug, Clone)]
pub struct StatisticalRecognizer {
    id: RecognizerId,
    language: LanguageTag,
    model: std::result::Result<Arc<NerModel>, String>,
}

impl StatisticalRecognizer {
    pub fn new(model: Arc<NerModel>) -> Self {
        Self {
            id: STATISTICAL_ID,
            language: model.language.clone(),
            model: Ok(model),
        }
    }

    /// Reconhecedor cujo modelo falhou ao carregar.
    pub fn unavailable(language: LanguageTag, reason: impl Into<String>) -> Self {
        Self {
            id: STATISTICAL_ID,
            language,
            model: Err(reason.into()),
        }
    }

    pub fn id(&self) -> &RecognizerId {
        &self.id
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    pub fn is_available(&self) -> bool {
        self.model.is_ok()
    }

    fn model(&self) -> Result<&NerModel> {
        self.model
            .as_deref()
            .map_err(|reason| PiiError::ModelUnavailable {
                language: self.language.to_string(),
                reason: reason.clone(),
            })
    }

    /// Tags BIO por token, com offsets no texto original.
    pub fn tag(&self, text: &str) -> Result<Vec<TaggedToken>> {
        let model = self.model()?;
        let mut tagged = Vec::new();

        for (base, sentence) in text.split_sentence_bound_indices() {
            let tokens: Vec<Token> = tokenize(sentence)
                .into_iter()
                .map(|t| Token {
                    start: t.start + base,
                    end: t.end + base,
                    index: tagged.len() + t.index,
                    text: t.text,
                })
                .collect();
            if tokens.is_empty() {
                continue;
            }

            let fvs = extract_features(&tokens, &model.gazetteers);
            let decoded = viterbi_decode(&model.crf, &fvs);
            tagged.extend(
                tokens
                    .into_iter()
                    .zip(decoded.best_sequence)
                    .zip(decoded.confidences)
                    .map(|((token, tag), confidence)| TaggedToken { token, tag, confidence }),
            );
        }

        Ok(tagged)
    }

    pub fn detect(&self, text: &str) -> Result<Vec<Span>> {
        let tagged = self.tag(text)?;
        tokens_to_spans(&tagged)
            .into_iter()
            .filter_map(|ls| map_label(ls.label).map(|kind| (ls, kind)))
            .map(|(ls, kind)| Span::new(ls.start, ls.end, kind, ls.confidence, self.id.clone()))
            .collect()
    }
}
