//! # Tokenizador com Offsets Preservados
//!
//! Divide o texto em palavras e pontuações usando as fronteiras de palavra
//! do Unicode (UAX #29, via `unicode-segmentation`). Cada token guarda sua
//! posição de byte no texto original, o que permite que o reconhecedor
//! estatístico converta tags de tokens de volta em [`Span`](crate::span::Span)s
//! sem recalcular offsets.
//!
//! Abreviações de tratamento ("Dr.", "Sra.", "Mr.") mantêm o ponto colado,
//! porque o modelo usa a palavra anterior como feature de contexto.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Juan", ",", "Dr.").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista (0, 1, 2...).
    pub index: usize,
}

impl Token {
    pub fn is_word(&self) -> bool {
        self.text.chars().any(char::is_alphanumeric)
    }

    pub fn is_capitalized(&self) -> bool {
        self.text.chars().next().map(char::is_uppercase).unwrap_or(false)
    }
}

/// Abreviações (es/en) que não devem ter o ponto separado.
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Dra", "Sr", "Sra", "Srta", "Prof", "Lic", "Ing", "Ud", "Uds", "Av", "Cra", "Cl",
    "Mr", "Mrs", "Ms", "St", "Jr", "No", "Nro", "Tel", "Ext",
];

/// Tokeniza o texto, descartando espaços em branco.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for (start, segment) in text.split_word_bound_indices() {
        if segment.chars().all(char::is_whitespace) {
            continue;
        }
        let end = start + segment.len();

        // "Dr" + "." adjacentes viram "Dr."
        if segment == "." {
            if let Some(prev) = tokens.last_mut() {
                if prev.end == start && ABBREVIATIONS.contains(&prev.text.as_str()) {
                    prev.text.push('.');
                    prev.end = end;
                    continue;
                }
            }
        }

        tokens.push(Token {
            text: segment.to_string(),
            start,
            end,
            index: tokens.len(),
        });
    }

    tokens
}

/// Palavras (minúsculas) que antecedem `offset` dentro de uma janela de `window` bytes.
///
/// A janela é alargada até a fronteira de `char` mais próxima à esquerda.
/// Pontuação é descartada; a ordem é a do texto.
pub fn words_before(text: &str, offset: usize, window: usize) -> Vec<String> {
    let offset = floor_char_boundary(text, offset.min(text.len()));
    let from = floor_char_boundary(text, offset.saturating_sub(window));
    tokenize(&text[from..offset])
        .into_iter()
        .filter(Token::is_word)
        .map(|t| t.text.trim_end_matches('.').to_lowercase())
        .collect()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_preserves_offsets() {
        let text = "Hola, José Pérez.";
        let tokens = tokenize(text);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Hola", ",", "José", "Pérez", "."]);
        for t in &tokens {
            assert_eq!(&text[t.start..t.end], t.text);
        }
        assert_eq!(tokens[3].index, 3);
    }

    #[test]
    fn test_abbreviation_keeps_dot() {
        let tokens = tokenize("el Dr. Gómez llegó");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["el", "Dr.", "Gómez", "llegó"]);
    }

    #[test]
    fn test_words_before_window() {
        let text = "mi teléfono es 3001234567";
        let words = words_before(text, text.find('3').unwrap(), 50);
        assert_eq!(words, vec!["mi", "teléfono", "es"]);

        // janela curta corta no meio de "teléfono" sem quebrar UTF-8
        let short = words_before(text, text.find('3').unwrap(), 6);
        assert!(short.contains(&"es".to_string()));
    }
}
