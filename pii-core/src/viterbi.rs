//! # Decodificação de Viterbi
//!
//! Programação dinâmica sobre a matriz de emissões e transições do CRF:
//! `O(N × T²)` em vez de `O(Tᴺ)`.
//!
//! ```text
//! viterbi[0][t] = emission(t, x_0)
//! viterbi[i][t] = max_{t'} [viterbi[i-1][t'] + transition(t', t)] + emission(t, x_i)
//! ```
//!
//! A confiança de cada token é a probabilidade softmax da tag escolhida
//! entre os scores acumulados naquela posição.

use crate::crf::{compute_emission_scores, CrfModel};
use crate::features::FeatureVector;
use crate::tagger::Tag;

/// Penalidade extra para transições que quebram o esquema BIO.
const INVALID_TRANSITION_PENALTY: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct ViterbiResult {
    /// Melhor sequência de tags (uma por token).
    pub best_sequence: Vec<Tag>,
    /// Probabilidade (softmax local) da tag escolhida em cada token.
    pub confidences: Vec<f64>,
    pub best_score: f64,
}

pub fn viterbi_decode(model: &CrfModel, feature_vectors: &[FeatureVector]) -> ViterbiResult {
    if feature_vectors.is_empty() {
        return ViterbiResult {
            best_sequence: vec![],
            confidences: vec![],
            best_score: 0.0,
        };
    }

    let n_tokens = feature_vectors.len();
    let tags = Tag::all();
    let n_tags = tags.len();
    let emission = compute_emission_scores(model, feature_vectors);

    // table[i][t]: melhor score acumulado terminando em t na posição i
    let mut table: Vec<Vec<f64>> = Vec::with_capacity(n_tokens);
    let mut backptr: Vec<Vec<usize>> = vec![vec![0usize; n_tags]; n_tokens];

    // I-X não pode abrir a sequência
    let first_row = tags
        .iter()
        .zip(&emission[0])
        .map(|(tag, score)| match tag {
            Tag::Inside(_) => score - INVALID_TRANSITION_PENALTY,
            _ => *score,
        })
        .collect();
    table.push(first_row);
    for t in 0..n_tags {
        backptr[0][t] = t;
    }

    for i in 1..n_tokens {
        let prev_row = &table[i - 1];
        let mut row = vec![f64::NEG_INFINITY; n_tags];

        for t in 0..n_tags {
            let mut best_prev_score = f64::NEG_INFINITY;
            let mut best_prev = 0;
            for (p, prev_score) in prev_row.iter().enumerate() {
                let score = prev_score + model.transition_score(&tags[p], &tags[t]);
                if score > best_prev_score {
                    best_prev_score = score;
                    best_prev = p;
                }
            }

            row[t] = best_prev_score + emission[i][t];
            if !Tag::is_valid_transition(&tags[best_prev], &tags[t]) {
                row[t] -= INVALID_TRANSITION_PENALTY;
            }
            backptr[i][t] = best_prev;
        }
        table.push(row);
    }

    let (mut best_last, best_score) = best_in_slice(&table[n_tokens - 1]);
    let mut path = vec![0usize; n_tokens];
    path[n_tokens - 1] = best_last;
    for i in (0..n_tokens - 1).rev() {
        best_last = backptr[i + 1][best_last];
        path[i] = best_last;
    }

    let confidences = path
        .iter()
        .enumerate()
        .map(|(i, &t)| scores_to_probs(&table[i]).get(t).copied().unwrap_or(0.0))
        .collect();

    ViterbiResult {
        best_sequence: path.into_iter().map(|t| tags[t]).collect(),
        confidences,
        best_score,
    }
}

/// (índice, valor) do máximo; empates ficam com o menor índice.
fn best_in_slice(scores: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, &v) in scores.iter().enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

/// Softmax numericamente estável.
pub fn scores_to_probs(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return vec![];
    }
    let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !max_score.is_finite() {
        return vec![1.0 / scores.len() as f64; scores.len()];
    }
    let exps: Vec<f64> = scores.iter().map(|&s| (s - max_score).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}
