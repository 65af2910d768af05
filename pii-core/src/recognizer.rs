//! # Reconhecedores
//!
//! Conjunto fechado de variantes: [`PatternRecognizer`] (regex + validação)
//! e [`StatisticalRecognizer`] (CRF por idioma). O validador contextual é
//! um estágio à parte ([`ContextValidator`](crate::context::ContextValidator)),
//! não um reconhecedor.
//!
//! Um [`Recognizer`] é barato de clonar (tudo atrás de `Arc`) para poder ser
//! movido para a thread do rayon que o executa.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::pattern::PatternRecognizer;
use crate::span::{EntityKind, LanguageTag, RecognizerId, Span};
use crate::statistical::StatisticalRecognizer;

/// Identidade e metadados de um reconhecedor registrado.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognizerDescriptor {
    pub id: RecognizerId,
    /// Idiomas suportados; vazio = todos.
    pub languages: Vec<LanguageTag>,
    pub kinds: Vec<EntityKind>,
    /// Peso de desempate no resolvedor (maior ganha).
    pub priority: i32,
}

impl RecognizerDescriptor {
    pub fn supports_language(&self, language: &LanguageTag) -> bool {
        self.languages.is_empty() || self.languages.contains(language)
    }

    /// `true` se alguma categoria emitida passa no filtro (sem filtro = sim).
    pub fn emits_any(&self, filter: Option<&[EntityKind]>) -> bool {
        match filter {
            None => true,
            Some(kinds) => self.kinds.iter().any(|k| kinds.contains(k)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RecognizerKind {
    Pattern(Arc<PatternRecognizer>),
    Statistical(StatisticalRecognizer),
}

/// Um reconhecedor ativo para um idioma.
#[derive(Debug, Clone)]
pub struct Recognizer {
    pub descriptor: RecognizerDescriptor,
    pub kind: RecognizerKind,
}

impl Recognizer {
    pub fn id(&self) -> &RecognizerId {
        &self.descriptor.id
    }

    /// Spans candidatos em `text`. Não toca estado compartilhado.
    pub fn detect(&self, text: &str) -> Result<Vec<Span>> {
        match &self.kind {
            RecognizerKind::Pattern(p) => p.detect(text),
            RecognizerKind::Statistical(s) => s.detect(text),
        }
    }
}
