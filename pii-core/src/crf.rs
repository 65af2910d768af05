//! # CRF — Conditional Random Field Linear-Chain
//!
//! Score de uma sequência de tags `y` para os tokens `x`:
//!
//! ```text
//! score(y, x) = Σ_i [emission(y_i, x, i) + transition(y_{i-1}, y_i)]
//! emission(t, x, i) = Σ_k w_{k,t} * f_k(x, i)
//! ```
//!
//! Os pesos vêm de um artefato de modelo (JSON) ou do modelo embutido do
//! idioma; a decodificação fica em [`viterbi`](crate::viterbi).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::tagger::Tag;

/// Pesos do CRF.
///
/// - `emission_weights`: `"feature|TAG"` → peso
/// - `transition_weights`: matriz `[prev][next]` indexada por [`Tag::index`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrfModel {
    pub emission_weights: HashMap<String, f64>,
    pub transition_weights: Vec<Vec<f64>>,
}

impl CrfModel {
    /// Modelo com pesos zerados.
    pub fn new() -> Self {
        let n = Tag::COUNT;
        Self {
            emission_weights: HashMap::new(),
            transition_weights: vec![vec![0.0f64; n]; n],
        }
    }

    pub fn emission_score(&self, features: &FeatureVector, tag: &Tag) -> f64 {
        let tag_label = tag.label();
        features
            .features
            .iter()
            .map(|(name, value)| {
                let key = format!("{name}|{tag_label}");
                value * self.emission_weights.get(&key).unwrap_or(&0.0)
            })
            .sum()
    }

    pub fn transition_score(&self, prev: &Tag, next: &Tag) -> f64 {
        self.transition_weights[prev.index()][next.index()]
    }

    pub fn set_emission(&mut self, feature: &str, tag: &Tag, weight: f64) {
        let key = format!("{feature}|{}", tag.label());
        self.emission_weights.insert(key, weight);
    }

    pub fn set_transition(&mut self, from: &Tag, to: &Tag, weight: f64) {
        self.transition_weights[from.index()][to.index()] = weight;
    }

    /// Verifica que a matriz de transição é `COUNT × COUNT` e que todos os
    /// pesos são finitos. Usado ao carregar artefatos externos.
    pub fn check_shape(&self) -> Result<(), String> {
        if self.transition_weights.len() != Tag::COUNT
            || self.transition_weights.iter().any(|row| row.len() != Tag::COUNT)
        {
            return Err(format!(
                "matriz de transição deve ser {n}x{n}",
                n = Tag::COUNT
            ));
        }
        let all_finite = self
            .transition_weights
            .iter()
            .flatten()
            .chain(self.emission_weights.values())
            .all(|w| w.is_finite());
        if !all_finite {
            return Err("pesos não finitos no modelo".to_string());
        }
        Ok(())
    }
}

impl Default for CrfModel {
    fn default() -> Self {
        Self::new()
    }
}

/// `emission[i][t]` para todos os tokens e tags.
pub fn compute_emission_scores(model: &CrfModel, feature_vectors: &[FeatureVector]) -> Vec<Vec<f64>> {
    let tags = Tag::all();
    feature_vectors
        .iter()
        .map(|fv| tags.iter().map(|tag| model.emission_score(fv, tag)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::NativeLabel;

    #[test]
    fn test_emission_score_positive() {
        let mut model = CrfModel::new();
        let tag = Tag::Begin(NativeLabel::Per);
        model.set_emission("is_capitalized", &tag, 2.5);

        let mut fv = FeatureVector::new(0);
        fv.insert("is_capitalized", 1.0);

        assert!((model.emission_score(&fv, &tag) - 2.5).abs() < 1e-9);
        assert!(model.emission_score(&fv, &Tag::Outside).abs() < 1e-9);
    }

    #[test]
    fn test_transition_score_default_zero() {
        let mut model = CrfModel::new();
        let b_per = Tag::Begin(NativeLabel::Per);
        let i_per = Tag::Inside(NativeLabel::Per);
        model.set_transition(&b_per, &i_per, 3.0);

        assert!((model.transition_score(&b_per, &i_per) - 3.0).abs() < 1e-9);
        assert!(model.transition_score(&Tag::Outside, &i_per).abs() < 1e-9);
    }

    #[test]
    fn test_check_shape_rejects_bad_matrix() {
        let mut model = CrfModel::new();
        assert!(model.check_shape().is_ok());
        model.transition_weights.pop();
        assert!(model.check_shape().is_err());
    }
}
