//! # Validador Contextual
//!
//! Pós-passo sobre os candidatos já emitidos pelos reconhecedores. Pode
//! **descartar** ou **reescalar** um span, nunca criar um novo nem mover
//! offsets.
//!
//! ## Regras para categorias do modelo (PERSON, LOCATION, ORGANIZATION)
//!
//! - Descarta spans que começam com minúscula, que são uma única palavra
//!   funcional ("El", "The") ou que contêm dígitos ou `@`
//! - PERSON logo após palavra de endereço ("calle", "carrera", "street"): × 0.5
//! - LOCATION logo após título pessoal ("señor", "mr"): × 0.5
//! - PERSON logo após título pessoal: + 0.1
//!
//! ## Regras para categorias de padrão
//!
//! - EMAIL_ADDRESS: exatamente um `@` e domínio com ponto
//! - PHONE_NUMBER: 7 a 15 dígitos
//! - NATIONAL_ID: 6 a 12 dígitos (sem o dígito de verificação)

use tracing::debug;

use crate::span::{EntityKind, LanguageTag, Span};
use crate::tokenizer::words_before;

/// Janela padrão de contexto, em bytes.
pub const DEFAULT_WINDOW: usize = 50;

const TITLE_BOOST: f64 = 0.1;
const MISMATCH_FACTOR: f64 = 0.5;

struct ContextLexicon {
    titles: &'static [&'static str],
    street_words: &'static [&'static str],
    stopwords: &'static [&'static str],
}

static SPANISH: ContextLexicon = ContextLexicon {
    titles: &[
        "señor", "señora", "señorita", "sr", "sra", "srta", "don", "doña", "doctor", "doctora",
        "dr", "dra", "ingeniero", "ingeniera", "ing", "licenciado", "licenciada", "profesor",
        "profesora", "prof",
    ],
    street_words: &[
        "calle", "carrera", "cra", "cl", "avenida", "av", "diagonal", "transversal", "barrio",
        "vereda", "kr", "cr",
    ],
    stopwords: &[
        "el", "la", "los", "las", "un", "una", "mi", "su", "de", "del", "en", "y", "que",
        "hola", "buenos", "buenas", "gracias", "señor", "señora", "este", "esta", "por", "para",
    ],
};

static ENGLISH: ContextLexicon = ContextLexicon {
    titles: &[
        "mr", "mrs", "ms", "miss", "dr", "doctor", "prof", "professor", "sir", "madam",
    ],
    street_words: &["street", "st", "avenue", "ave", "road", "rd", "boulevard", "blvd", "lane"],
    stopwords: &[
        "the", "a", "an", "my", "his", "her", "of", "in", "and", "hello", "hi", "dear",
        "thanks", "this", "i", "we", "you",
    ],
};

/// Validador contextual de um idioma.
#[derive(Clone, Copy)]
pub struct ContextValidator {
    window: usize,
    lexicon: &'static ContextLexicon,
}

impl std::fmt::Debug for ContextValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextValidator")
            .field("window", &self.window)
            .finish()
    }
}

impl ContextValidator {
    /// Validador para `language`; idiomas sem léxico próprio usam o inglês.
    pub fn for_language(language: &LanguageTag, window: usize) -> Self {
        let lexicon = match language.as_str() {
            "es" => &SPANISH,
            _ => &ENGLISH,
        };
        Self { window, lexicon }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Reavalia os candidatos. A ordem de entrada é preservada.
    pub fn revalidate(&self, text: &str, candidates: Vec<Span>) -> Vec<Span> {
        let before = candidates.len();
        let kept: Vec<Span> = candidates
            .into_iter()
            .filter_map(|span| self.check(text, span))
            .collect();
        if kept.len() != before {
            debug!(dropped = before - kept.len(), "validador contextual descartou spans");
        }
        kept
    }

    fn check(&self, text: &str, span: Span) -> Option<Span> {
        // Offsets inválidos não são problema do validador: o anonimizador rejeita
        let Some(surface) = span.text(text) else {
            return Some(span);
        };
        let kind = span.category();

        if *kind == EntityKind::PERSON
            || *kind == EntityKind::LOCATION
            || *kind == EntityKind::ORGANIZATION
        {
            return self.check_model_span(text, surface, span);
        }
        if *kind == EntityKind::EMAIL_ADDRESS {
            return email_shape_ok(surface).then_some(span);
        }
        if *kind == EntityKind::PHONE_NUMBER {
            return (7..=15).contains(&digit_count(surface)).then_some(span);
        }
        if *kind == EntityKind::NATIONAL_ID {
            let base = surface.split('-').next().unwrap_or(surface);
            return (6..=12).contains(&digit_count(base)).then_some(span);
        }
        Some(span)
    }

    fn check_model_span(&self, text: &str, surface: &str, span: Span) -> Option<Span> {
        let starts_upper = surface.chars().next().map(char::is_uppercase).unwrap_or(false);
        if !starts_upper {
            return None;
        }
        if surface.chars().any(|c| c.is_ascii_digit() || c == '@') {
            return None;
        }
        let lower = surface.to_lowercase();
        if !lower.contains(char::is_whitespace) && self.lexicon.stopwords.contains(&lower.as_str()) {
            return None;
        }

        let previous = words_before(text, span.start(), self.window);
        let last = previous.last().map(String::as_str);
        let after_title = last.map(|w| self.lexicon.titles.contains(&w)).unwrap_or(false);
        let after_street = previous
            .iter()
            .rev()
            .take(2)
            .any(|w| self.lexicon.street_words.contains(&w.as_str()));

        let kind = span.category();
        let score = span.score();
        if *kind == EntityKind::PERSON && after_street {
            Some(span.with_score(score * MISMATCH_FACTOR))
        } else if *kind == EntityKind::LOCATION && after_title {
            Some(span.with_score(score * MISMATCH_FACTOR))
        } else if *kind == EntityKind::PERSON && after_title {
            Some(span.with_score(score + TITLE_BOOST))
        } else {
            Some(span)
        }
    }
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

fn email_shape_ok(s: &str) -> bool {
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && domain.contains('.') && !domain.ends_with('.')
        }
        _ => false,
    }
}
