//! # Reconhecedores por Padrão (Regex + Validação)
//!
//! Cada [`PatternRecognizer`] combina:
//!
//! 1. Uma lista de [`Pattern`]s (regex compilada uma vez via `Lazy`) com
//!    score base próprio
//! 2. Uma função de validação por match (checksum, contagem de dígitos)
//!    que descarta sósias ou ajusta o score
//! 3. Palavras de contexto: se uma delas aparece antes do match, o score
//!    sobe [`CONTEXT_BOOST`] (com mínimo [`CONTEXT_MIN_SCORE`] e teto 1.0)
//!
//! Se a regex tiver um grupo nomeado `value`, o span cobre só esse grupo;
//! o restante do match (ex: "CC " antes do número) é tratado como prefixo.
//!
//! ## Reconhecedores embutidos
//!
//! | Id               | Categoria       | Validação                          |
//! |------------------|-----------------|------------------------------------|
//! | `email`          | EMAIL_ADDRESS   | domínio com TLD de 2+ letras       |
//! | `phone`          | PHONE_NUMBER    | 7–15 dígitos                       |
//! | `co_national_id` | NATIONAL_ID     | 6–12 dígitos, sem zero à esquerda, DV do NIT |
//! | `credit_card`    | CREDIT_CARD     | Luhn, 13–19 dígitos                |
//! | `ip_address`     | IP_ADDRESS      | octetos ≤ 255                      |
//! | `date`           | DATE            | dia dentro do mês (bissextos)      |
//! | `address`        | ADDRESS         | número da via em 1–299             |

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::span::{EntityKind, RecognizerId, Span};
use crate::tokenizer::words_before;

/// Quanto uma palavra de contexto soma ao score de um match.
pub const CONTEXT_BOOST: f64 = 0.35;
/// Score mínimo de um match com contexto.
pub const CONTEXT_MIN_SCORE: f64 = 0.4;
/// Janela padrão (bytes) antes do match onde se procuram palavras de contexto.
pub const DEFAULT_CONTEXT_WINDOW: usize = 50;

/// Uma regex com nome (para logs) e score base.
pub struct Pattern {
    pub name: &'static str,
    pub regex: &'static Lazy<Regex>,
    pub score: f64,
}

/// Um match candidato entregue à função de validação.
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'t> {
    /// Texto completo analisado.
    pub text: &'t str,
    /// Offsets (bytes) do valor, sem prefixo.
    pub start: usize,
    pub end: usize,
    /// `&text[start..end]`
    pub value: &'t str,
    /// `true` se a regex consumiu um prefixo antes do valor.
    pub prefixed: bool,
    pub pattern: &'static str,
    /// Score base do padrão.
    pub score: f64,
}

/// Valida um match: `None` descarta, `Some(score)` aceita com o score dado.
pub type ValidateFn = fn(&PatternMatch<'_>) -> Option<f64>;

pub struct PatternRecognizer {
    id: RecognizerId,
    kind: EntityKind,
    patterns: Vec<Pattern>,
    validate: ValidateFn,
    context_words: &'static [&'static str],
    context_window: usize,
}

impl std::fmt::Debug for PatternRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRecognizer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("patterns", &self.patterns.iter().map(|p| p.name).collect::<Vec<_>>())
            .finish()
    }
}

impl PatternRecognizer {
    pub fn new(
        id: RecognizerId,
        kind: EntityKind,
        patterns: Vec<Pattern>,
        validate: ValidateFn,
        context_words: &'static [&'static str],
    ) -> Self {
        Self {
            id,
            kind,
            patterns,
            validate,
            context_words,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn id(&self) -> &RecognizerId {
        &self.id
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Roda todos os padrões sobre `text`.
    ///
    /// Matches idênticos vindos de padrões diferentes são unificados
    /// (fica o maior score). A saída é ordenada por offset.
    ///
    /// Falha só se a regex produzir um match vazio.
    pub fn detect(&self, text: &str) -> Result<Vec<Span>> {
        let mut best: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(whole) = caps.get(0) else { continue };
                let value = caps.name("value").unwrap_or(whole);
                let candidate = PatternMatch {
                    text,
                    start: value.start(),
                    end: value.end(),
                    value: value.as_str(),
                    prefixed: value.start() > whole.start(),
                    pattern: pattern.name,
                    score: pattern.score,
                };

                let Some(mut score) = (self.validate)(&candidate) else {
                    continue;
                };
                if self.has_context(text, candidate.start) {
                    score = (score + CONTEXT_BOOST).max(CONTEXT_MIN_SCORE).min(1.0);
                }

                let entry = best.entry((candidate.start, candidate.end)).or_insert(score);
                if score > *entry {
                    *entry = score;
                }
            }
        }

        // Fragmentos contidos em um match maior ("123 4567" dentro de
        // "300 123 4567") são descartados
        let mut ordered: Vec<((usize, usize), f64)> = best.into_iter().collect();
        ordered.sort_by(|((s1, e1), _), ((s2, e2), _)| s1.cmp(s2).then(e2.cmp(e1)));
        let mut max_end = 0;
        let mut spans = Vec::with_capacity(ordered.len());
        for ((start, end), score) in ordered {
            if end <= max_end {
                continue;
            }
            max_end = end;
            spans.push(Span::new(start, end, self.kind.clone(), score, self.id.clone())?);
        }
        Ok(spans)
    }

    fn has_context(&self, text: &str, start: usize) -> bool {
        if self.context_words.is_empty() {
            return false;
        }
        words_before(text, start, self.context_window)
            .iter()
            .any(|w| self.context_words.contains(&w.as_str()))
    }

    // --- Reconhecedores embutidos ---

    pub fn email() -> Self {
        Self::new(
            RecognizerId::from_static("email"),
            EntityKind::EMAIL_ADDRESS,
            vec![Pattern { name: "email", regex: &EMAIL, score: 0.95 }],
            validate_email,
            &[],
        )
    }

    pub fn phone() -> Self {
        Self::new(
            RecognizerId::from_static("phone"),
            EntityKind::PHONE_NUMBER,
            vec![
                Pattern { name: "co_mobile", regex: &PHONE_CO_MOBILE, score: 0.85 },
                Pattern { name: "co_landline", regex: &PHONE_CO_LANDLINE, score: 0.8 },
                Pattern { name: "international", regex: &PHONE_INTL, score: 0.85 },
                Pattern { name: "area_code", regex: &PHONE_PAREN, score: 0.8 },
            ],
            validate_phone,
            &[
                "teléfono", "telefono", "tel", "celular", "cel", "móvil", "movil", "fijo",
                "whatsapp", "contacto", "llamar", "llámame", "número", "numero", "línea",
                "phone", "mobile", "cell", "call", "number", "telephone",
            ],
        )
    }

    pub fn co_national_id() -> Self {
        Self::new(
            RecognizerId::from_static("co_national_id"),
            EntityKind::NATIONAL_ID,
            vec![
                Pattern { name: "prefixed", regex: &ID_PREFIXED, score: 0.75 },
                Pattern { name: "dotted", regex: &ID_DOTTED, score: 0.5 },
                Pattern { name: "bare", regex: &ID_BARE, score: 0.4 },
            ],
            validate_national_id,
            ID_KEYWORDS,
        )
    }

    pub fn credit_card() -> Self {
        Self::new(
            RecognizerId::from_static("credit_card"),
            EntityKind::CREDIT_CARD,
            vec![Pattern { name: "card_number", regex: &CREDIT_CARD, score: 0.9 }],
            validate_credit_card,
            &[
                "tarjeta", "crédito", "credito", "débito", "debito", "visa", "mastercard",
                "amex", "card", "credit", "debit",
            ],
        )
    }

    pub fn ip_address() -> Self {
        Self::new(
            RecognizerId::from_static("ip_address"),
            EntityKind::IP_ADDRESS,
            vec![Pattern { name: "ipv4", regex: &IPV4, score: 0.85 }],
            validate_ipv4,
            &["ip", "servidor", "dirección", "direccion", "server", "host", "address"],
        )
    }

    pub fn date() -> Self {
        Self::new(
            RecognizerId::from_static("date"),
            EntityKind::DATE,
            vec![
                Pattern { name: "iso", regex: &DATE_ISO, score: 0.6 },
                Pattern { name: "day_month_year", regex: &DATE_DMY, score: 0.6 },
            ],
            validate_date,
            &[
                "fecha", "nacimiento", "nació", "nacio", "expedición", "expedicion", "vence",
                "date", "born", "birth", "dob", "expires",
            ],
        )
    }

    /// Endereços colombianos na nomenclatura via + número + placa
    /// (`Calle 45 # 12-34`, `Cra. 7 No. 45-10`). Só a via com número
    /// (`Carrera 15`) precisa de palavra de contexto para passar do piso.
    pub fn address() -> Self {
        Self::new(
            RecognizerId::from_static("address"),
            EntityKind::ADDRESS,
            vec![
                Pattern { name: "co_address", regex: &ADDRESS_CO, score: 0.7 },
                Pattern { name: "street_only", regex: &ADDRESS_STREET, score: 0.3 },
            ],
            validate_address,
            &[
                "dirección", "direccion", "vivo", "vive", "reside", "residencia", "domicilio",
                "ubicado", "ubicada", "queda", "ubicación", "ubicacion", "oficina", "entrega",
            ],
        )
    }
}

/// Todos os reconhecedores por padrão embutidos, na ordem de registro.
pub fn builtin_pattern_recognizers() -> Vec<PatternRecognizer> {
    vec![
        PatternRecognizer::email(),
        PatternRecognizer::phone(),
        PatternRecognizer::co_national_id(),
        PatternRecognizer::credit_card(),
        PatternRecognizer::ip_address(),
        PatternRecognizer::date(),
        PatternRecognizer::address(),
    ]
}

// =============================================================================
// Regexes (compiladas uma vez)
// =============================================================================
// `[0-9]` em vez de `\d`: `\d` do crate regex aceita dígitos de qualquer script.

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9._%+\-]*@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)+\b")
        .expect("valid email regex")
});

static PHONE_CO_MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+57[\s\-]?|\b)3[0-9]{2}[\s\-]?[0-9]{3}[\s\-]?[0-9]{4}\b")
        .expect("valid mobile regex")
});

static PHONE_CO_LANDLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:60[1-8][\s\-]?)?[124-8][0-9]{2}[\s\-]?[0-9]{4}\b").expect("valid landline regex")
});

static PHONE_INTL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+[0-9]{1,3}[\s\-]?\(?[0-9]{1,4}\)?[\s\-]?[0-9]{3,4}[\s\-]?[0-9]{3,4}\b")
        .expect("valid international phone regex")
});

static PHONE_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([0-9]{1,4}\)[\s\-]?[0-9]{3,4}[\s\-]?[0-9]{4}\b").expect("valid area code regex")
});

static ID_PREFIXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:c\.?\s?c\.?|t\.?\s?i\.?|c\.?\s?e\.?|c[eé]dula(?:\s+de\s+(?:ciudadan[ií]a|extranjer[ií]a))?|tarjeta\s+de\s+identidad|registro\s+civil|pasaporte|documento|nit)(?:\s*(?:n[oº°]\.?|n[uú]mero|#|:))?\s*(?P<value>[0-9]{1,3}(?:\.[0-9]{3}){1,3}(?:-[0-9])?|[0-9]{6,12}(?:-[0-9])?)\b",
    )
    .expect("valid prefixed id regex")
});

static ID_DOTTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<value>[0-9]{1,3}(?:\.[0-9]{3}){2,3})\b").expect("valid dotted id regex")
});

static ID_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?P<value>[0-9]{7,12})\b").expect("valid bare id regex"));

static CREDIT_CARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9][ \-]?){12,18}[0-9]\b").expect("valid credit card regex")
});

static IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid ipv4 regex")
});

static DATE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]{4}-[0-9]{2}-[0-9]{2}\b").expect("valid iso date regex"));

static DATE_DMY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9]{1,2}[/\-][0-9]{1,2}[/\-][0-9]{4}\b").expect("valid date regex")
});

static ADDRESS_CO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:calle|cl|carrera|cra|kr|cr|avenida|av|ak|ac|diagonal|dg|transversal|tv)\.?\s*[0-9]{1,3}\s?[a-z]?(?:\s?bis)?(?:\s+(?:sur|este))?\s*(?:#|n[oº°]\.?|nro\.?|n[uú]mero)\s*[0-9]{1,3}\s?[a-z]?\s*-\s*[0-9]{1,3}(?:\s+(?:sur|este)\b)?\b",
    )
    .expect("valid address regex")
});

static ADDRESS_STREET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:calle|carrera|avenida|diagonal|transversal)\s+[0-9]{1,3}[a-z]?\b")
        .expect("valid street regex")
});

/// Palavras que indicam documento de identidade.
const ID_KEYWORDS: &[&str] = &[
    "cédula", "cedula", "cc", "c.c", "ti", "ce", "documento", "identificación",
    "identificacion", "identidad", "nit", "pasaporte", "extranjería", "extranjeria",
    "registraduría", "registraduria", "expedida", "id", "identity", "passport",
];

// =============================================================================
// Validação
// =============================================================================

fn digits_of(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn validate_email(m: &PatternMatch<'_>) -> Option<f64> {
    let (local, domain) = m.value.rsplit_once('@')?;
    if local.is_empty() || local.contains("..") || local.ends_with('.') {
        return None;
    }
    let (_, tld) = domain.rsplit_once('.')?;
    if tld.chars().count() < 2 || !tld.chars().all(char::is_alphabetic) {
        return None;
    }
    Some(m.score)
}

fn validate_phone(m: &PatternMatch<'_>) -> Option<f64> {
    let digits = digits_of(m.value);
    if !(7..=15).contains(&digits.len()) {
        return None;
    }

    let mut score = m.score;
    if matches!(m.pattern, "co_mobile" | "co_landline") {
        score += 0.05;
    }

    // Um número "nu" logo depois de "cédula", "NIT"... é mais provável documento
    let bare = m.value.chars().all(|c| c.is_ascii_digit());
    if bare
        && words_before(m.text, m.start, DEFAULT_CONTEXT_WINDOW)
            .iter()
            .any(|w| ID_KEYWORDS.contains(&w.as_str()))
    {
        score = (score - 0.3).max(0.1);
    }
    Some(score.min(1.0))
}

fn validate_national_id(m: &PatternMatch<'_>) -> Option<f64> {
    let (base, check) = match m.value.split_once('-') {
        Some((base, check)) => (base, Some(check)),
        None => (m.value, None),
    };
    let digits = digits_of(base);
    if !(6..=12).contains(&digits.len()) || digits.first() == Some(&0) {
        return None;
    }
    if let Some(check) = check {
        let expected = nit_check_digit(&digits);
        if check.parse::<u32>().ok()? != expected {
            return None;
        }
    }
    let mut score = m.score;
    if m.prefixed {
        score += 0.1;
    }
    Some(score.min(1.0))
}

/// Dígito de verificação do NIT (DIAN, módulo 11).
pub fn nit_check_digit(digits: &[u32]) -> u32 {
    const WEIGHTS: [u32; 15] = [3, 7, 13, 17, 19, 23, 29, 37, 41, 43, 47, 53, 59, 67, 71];
    let sum: u32 = digits
        .iter()
        .rev()
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    match sum % 11 {
        r @ (0 | 1) => r,
        r => 11 - r,
    }
}

fn validate_credit_card(m: &PatternMatch<'_>) -> Option<f64> {
    let digits = digits_of(m.value);
    if !(13..=19).contains(&digits.len()) || !luhn_check(&digits) {
        return None;
    }
    Some(m.score)
}

/// Algoritmo de Luhn.
pub fn luhn_check(digits: &[u32]) -> bool {
    let mut sum = 0;
    let mut double = false;
    for &digit in digits.iter().rev() {
        let mut d = digit;
        if double {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
        double = !double;
    }
    sum % 10 == 0
}

fn validate_ipv4(m: &PatternMatch<'_>) -> Option<f64> {
    let in_range = m
        .value
        .split('.')
        .all(|octet| octet.parse::<u16>().map(|n| n <= 255).unwrap_or(false));
    in_range.then_some(m.score)
}

fn days_in_month(month: u32, year: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        _ => 0,
    }
}

fn validate_date(m: &PatternMatch<'_>) -> Option<f64> {
    let parts: Vec<u32> = m
        .value
        .split(['/', '-'])
        .map(|p| p.parse().ok())
        .collect::<Option<_>>()?;
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    let is_date = |day: u32, month: u32, year: u32| (1..=days_in_month(month, year)).contains(&day);
    let valid = if m.value.len() == 10 && m.value.as_bytes()[4] == b'-' {
        // yyyy-mm-dd
        is_date(*c, *b, *a)
    } else {
        // dd/mm/yyyy ou mm/dd/yyyy
        (is_date(*a, *b, *c) || is_date(*b, *a, *c)) && *c >= 1900
    };
    valid.then_some(m.score)
}

fn validate_address(m: &PatternMatch<'_>) -> Option<f64> {
    let street: u32 = m
        .value
        .split(|c: char| !c.is_ascii_digit())
        .find(|part| !part.is_empty())?
        .parse()
        .ok()?;
    (1..300).contains(&street).then_some(m.score)
}
