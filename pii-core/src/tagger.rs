//! # Esquema BIO e Rótulos Nativos do Modelo
//!
//! O modelo estatístico não conhece as categorias de PII: ele rotula tokens
//! com o esquema **BIO** sobre quatro rótulos nativos (PER, ORG, LOC, MISC).
//! A tradução para [`EntityKind`](crate::span::EntityKind) acontece depois,
//! numa tabela fixa do [`model`](crate::model); rótulos sem mapeamento são
//! descartados.
//!
//! - `B-X`: primeiro token de uma entidade
//! - `I-X`: tokens seguintes da mesma entidade
//! - `O`: fora de entidade

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// Rótulos nativos emitidos pelo modelo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeLabel {
    Per,
    Org,
    Loc,
    Misc,
}

impl NativeLabel {
    pub const ALL: [NativeLabel; 4] = [
        NativeLabel::Per,
        NativeLabel::Org,
        NativeLabel::Loc,
        NativeLabel::Misc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NativeLabel::Per => "PER",
            NativeLabel::Org => "ORG",
            NativeLabel::Loc => "LOC",
            NativeLabel::Misc => "MISC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PER" => Some(NativeLabel::Per),
            "ORG" => Some(NativeLabel::Org),
            "LOC" => Some(NativeLabel::Loc),
            "MISC" => Some(NativeLabel::Misc),
            _ => None,
        }
    }
}

/// Tag BIO aplicada a um token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    Begin(NativeLabel),
    Inside(NativeLabel),
    Outside,
}

impl Tag {
    /// Número total de tags possíveis
    pub const COUNT: usize = 9;

    /// Representação textual da tag (ex: "B-PER", "I-ORG", "O")
    pub fn label(&self) -> String {
        match self {
            Tag::Begin(l) => format!("B-{}", l.name()),
            Tag::Inside(l) => format!("I-{}", l.name()),
            Tag::Outside => "O".to_string(),
        }
    }

    /// Índice da tag nas matrizes do CRF/Viterbi (0..9).
    pub fn index(&self) -> usize {
        match self {
            Tag::Outside => 0,
            Tag::Begin(NativeLabel::Per) => 1,
            Tag::Inside(NativeLabel::Per) => 2,
            Tag::Begin(NativeLabel::Org) => 3,
            Tag::Inside(NativeLabel::Org) => 4,
            Tag::Begin(NativeLabel::Loc) => 5,
            Tag::Inside(NativeLabel::Loc) => 6,
            Tag::Begin(NativeLabel::Misc) => 7,
            Tag::Inside(NativeLabel::Misc) => 8,
        }
    }

    /// Todas as tags na ordem de [`Tag::index`].
    pub fn all() -> [Tag; Tag::COUNT] {
        [
            Tag::Outside,
            Tag::Begin(NativeLabel::Per),
            Tag::Inside(NativeLabel::Per),
            Tag::Begin(NativeLabel::Org),
            Tag::Inside(NativeLabel::Org),
            Tag::Begin(NativeLabel::Loc),
            Tag::Inside(NativeLabel::Loc),
            Tag::Begin(NativeLabel::Misc),
            Tag::Inside(NativeLabel::Misc),
        ]
    }

    pub fn native_label(&self) -> Option<NativeLabel> {
        match self {
            Tag::Begin(l) | Tag::Inside(l) => Some(*l),
            Tag::Outside => None,
        }
    }

    /// `I-X` só pode seguir `B-X` ou `I-X`; o resto é livre.
    pub fn is_valid_transition(prev: &Tag, next: &Tag) -> bool {
        match next {
            Tag::Inside(label) => match prev {
                Tag::Begin(prev_label) | Tag::Inside(prev_label) => prev_label == label,
                Tag::Outside => false,
            },
            _ => true,
        }
    }

    /// Parseia "B-PER", "I-LOC", "O".
    pub fn from_label(s: &str) -> Option<Self> {
        if s == "O" {
            return Some(Tag::Outside);
        }
        let (prefix, label) = s.split_once('-')?;
        let label = NativeLabel::parse(label)?;
        match prefix {
            "B" => Some(Tag::Begin(label)),
            "I" => Some(Tag::Inside(label)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Um token com sua tag BIO e a probabilidade da tag escolhida.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedToken {
    pub token: Token,
    pub tag: Tag,
    pub confidence: f64,
}

/// Uma entidade nativa reconstruída a partir de tokens BIO (offsets em bytes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSpan {
    pub label: NativeLabel,
    pub start: usize,
    pub end: usize,
    /// Média das confianças dos tokens do span.
    pub confidence: f64,
}

/// Reconstrói entidades a partir da sequência BIO.
///
/// Um `I-X` órfão (sem `B-X` antes) abre uma nova entidade, como o Viterbi
/// pode produzir quando a penalidade de transição não é suficiente.
///
/// `[B-PER, I-PER, O, B-LOC]` → `[PER, LOC]`
pub fn tokens_to_spans(tagged: &[TaggedToken]) -> Vec<LabelSpan> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < tagged.len() {
        let label = match tagged[i].tag {
            Tag::Begin(l) | Tag::Inside(l) => l,
            Tag::Outside => {
                i += 1;
                continue;
            }
        };

        let start = tagged[i].token.start;
        let mut end = tagged[i].token.end;
        let mut conf_sum = tagged[i].confidence;
        let mut count = 1usize;

        let mut j = i + 1;
        while j < tagged.len() && tagged[j].tag == Tag::Inside(label) {
            end = tagged[j].token.end;
            conf_sum += tagged[j].confidence;
            count += 1;
            j += 1;
        }

        spans.push(LabelSpan {
            label,
            start,
            end,
            confidence: conf_sum / count as f64,
        });
        i = j;
    }

    spans
}
