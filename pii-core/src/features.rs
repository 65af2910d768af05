//! # Features de Token para o CRF
//!
//! Para cada token, extrai um vetor esparso de features binárias que o
//! [`CrfModel`](crate::crf::CrfModel) pondera para pontuar as tags.
//!
//! ### Token atual
//! - Forma (`word=`), capitalização, siglas, dígitos, `@`
//! - Prefixos e sufixos de 2 a 4 caracteres
//!
//! ### Contexto (janela de 2 tokens)
//! - Palavra anterior/posterior e se estão capitalizadas
//! - Início/fim de sentença (`BOS`/`EOS`)
//!
//! ### Gazetteers
//! - Pertence à lista de nomes, lugares ou organizações do idioma

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// Mapa esparso de features ativas de um token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub features: HashMap<String, f64>,
    pub token_index: usize,
}

impl FeatureVector {
    pub fn new(token_index: usize) -> Self {
        Self {
            features: HashMap::new(),
            token_index,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: f64) {
        self.features.insert(key.into(), value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }
}

/// Listas de entidades conhecidas de um idioma (tudo em minúsculas).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Gazetteers {
    #[serde(default)]
    pub persons: HashSet<String>,
    #[serde(default)]
    pub locations: HashSet<String>,
    #[serde(default)]
    pub organizations: HashSet<String>,
}

impl Gazetteers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adiciona cada palavra de `names` (com mais de 2 letras) ao conjunto.
    pub fn extend_words<'a>(set: &mut HashSet<String>, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            for word in name.split_whitespace() {
                if word.chars().count() > 2 {
                    set.insert(word.to_lowercase());
                }
            }
        }
    }
}

/// Gera vetores de features alinhados com `tokens` (índice `i` ↔ token `i`).
pub fn extract_features(tokens: &[Token], gazetteers: &Gazetteers) -> Vec<FeatureVector> {
    (0..tokens.len())
        .map(|i| extract_for_token(tokens, i, gazetteers))
        .collect()
}

/// Extrai as features de um único token em seu contexto.
pub fn extract_for_token(tokens: &[Token], i: usize, gazetteers: &Gazetteers) -> FeatureVector {
    let mut fv = FeatureVector::new(i);
    let token = &tokens[i];
    let word = token.text.as_str();
    let lower = word.to_lowercase();

    fv.insert(format!("word={lower}"), 1.0);
    fv.insert("bias", 1.0);

    let has_alpha = word.chars().any(char::is_alphabetic);
    if token.is_capitalized() {
        fv.insert("is_capitalized", 1.0);
    }
    if has_alpha && word.chars().count() > 1 && word.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        fv.insert("is_all_caps", 1.0);
    }
    if word.chars().skip(1).any(char::is_uppercase) {
        fv.insert("is_mixed_case", 1.0);
    }

    let chars: Vec<char> = lower.chars().collect();
    for n in 2..=4 {
        if chars.len() >= n {
            let prefix: String = chars[..n].iter().collect();
            let suffix: String = chars[chars.len() - n..].iter().collect();
            fv.insert(format!("prefix{n}={prefix}"), 1.0);
            fv.insert(format!("suffix{n}={suffix}"), 1.0);
        }
    }

    if word.chars().any(|c| c.is_ascii_digit()) {
        fv.insert("has_digit", 1.0);
    }
    if word.chars().all(|c| c.is_ascii_digit()) {
        fv.insert("is_digit", 1.0);
    }
    if word.contains('@') {
        fv.insert("has_at", 1.0);
    }
    if !token.is_word() {
        fv.insert("is_punctuation", 1.0);
    }

    if i > 0 {
        let prev = &tokens[i - 1];
        fv.insert(
            format!("prev_word={}", prev.text.trim_end_matches('.').to_lowercase()),
            1.0,
        );
        if prev.is_capitalized() {
            fv.insert("prev_is_capitalized", 1.0);
        }
    } else {
        fv.insert("BOS", 1.0);
    }

    if i > 1 {
        fv.insert(format!("prev2_word={}", tokens[i - 2].text.to_lowercase()), 1.0);
    }

    if i + 1 < tokens.len() {
        let next = &tokens[i + 1];
        fv.insert(format!("next_word={}", next.text.to_lowercase()), 1.0);
        if next.is_capitalized() {
            fv.insert("next_is_capitalized", 1.0);
        }
    } else {
        fv.insert("EOS", 1.0);
    }

    if gazetteers.persons.contains(&lower) {
        fv.insert("in_person_gazetteer", 1.0);
    }
    if gazetteers.locations.contains(&lower) {
        fv.insert("in_location_gazetteer", 1.0);
    }
    if gazetteers.organizations.contains(&lower) {
        fv.insert("in_org_gazetteer", 1.0);
    }

    fv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    #[test]
    fn test_capitalization_feature() {
        let tokens = tokenize("Camila vive aquí");
        let features = extract_features(&tokens, &Gazetteers::default());
        assert!(features[0].has("is_capitalized"));
        assert!(features[0].has("BOS"));
        assert!(!features[1].has("is_capitalized"));
        assert!(features[2].has("EOS"));
    }

    #[test]
    fn test_affix_features() {
        let tokens = tokenize("Bancolombia");
        let features = extract_features(&tokens, &Gazetteers::default());
        assert!(features[0].has("prefix3=ban"));
        assert!(features[0].has("suffix3=bia"));
    }

    #[test]
    fn test_context_features_strip_abbreviation_dot() {
        let tokens = tokenize("la Dra. Ramírez firmó");
        let features = extract_features(&tokens, &Gazetteers::default());
        let ramirez = &features[2];
        assert!(ramirez.has("prev_word=dra"));
        assert!(ramirez.has("next_word=firmó"));
        assert!(ramirez.has("prev_is_capitalized"));
    }

    #[test]
    fn test_gazetteer_feature() {
        let tokens = tokenize("Medellín es grande");
        let mut gaz = Gazetteers::default();
        Gazetteers::extend_words(&mut gaz.locations, ["Medellín"]);
        let features = extract_features(&tokens, &gaz);
        assert!(features[0].has("in_location_gazetteer"));
        assert!(!features[1].has("in_location_gazetteer"));
    }

    #[test]
    fn test_punctuation_and_digits() {
        let tokens = tokenize("2024 ,");
        let features = extract_features(&tokens, &Gazetteers::default());
        assert!(features[0].has("is_digit"));
        assert!(features[1].has("is_punctuation"));
    }
}
