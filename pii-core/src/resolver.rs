//! # Resolvedor de Entidades
//!
//! Funde os candidatos de todos os reconhecedores em um único conjunto
//! ordenado e sem sobreposição.
//!
//! 1. Ordenação estável por `start` crescente, score decrescente,
//!    prioridade do reconhecedor decrescente
//! 2. Varredura: um span que sobrepõe o último aceito só o substitui se
//!    tiver score **estritamente** maior; senão é descartado
//! 3. Spans nunca são truncados
//!
//! Empate de score e prioridade: fica o primeiro da ordenação.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::span::{RecognizerId, Span};

/// Sequência de spans ordenada por `start` com `end_i <= start_{i+1}`.
///
/// Só o [`EntityResolver`] constrói valores desse tipo.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedEntitySet(Vec<Span>);

impl ResolvedEntitySet {
    pub fn as_slice(&self) -> &[Span] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Span> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ResolvedEntitySet {
    type Item = &'a Span;
    type IntoIter = std::slice::Iter<'a, Span>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityResolver {
    priorities: HashMap<RecognizerId, i32>,
}

impl EntityResolver {
    pub fn new(priorities: HashMap<RecognizerId, i32>) -> Self {
        Self { priorities }
    }

    /// Prioridade de desempate de um reconhecedor (0 se não registrado).
    pub fn priority_of(&self, id: &RecognizerId) -> i32 {
        self.priorities.get(id).copied().unwrap_or(0)
    }

    pub fn resolve(&self, mut candidates: Vec<Span>) -> ResolvedEntitySet {
        candidates.sort_by(|a, b| {
            a.start()
                .cmp(&b.start())
                .then_with(|| b.score().total_cmp(&a.score()))
                .then_with(|| self.priority_of(b.source()).cmp(&self.priority_of(a.source())))
        });

        let mut accepted: Vec<Span> = Vec::with_capacity(candidates.len());
        for span in candidates {
            match accepted.last_mut() {
                Some(last) if span.start() < last.end() => {
                    if span.score().total_cmp(&last.score()) == Ordering::Greater {
                        *last = span;
                    }
                }
                _ => accepted.push(span),
            }
        }

        ResolvedEntitySet(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::EntityKind;

    fn span(start: usize, end: usize, score: f64, source: &str) -> Span {
        Span::new(start, end, EntityKind::PERSON, score, RecognizerId::new(source)).unwrap()
    }

    fn assert_non_overlapping(set: &ResolvedEntitySet) {
        for pair in set.as_slice().windows(2) {
            assert!(pair[0].end() <= pair[1].start());
        }
    }

    #[test]
    fn test_higher_score_wins_same_range() {
        let set = EntityResolver::default().resolve(vec![span(0, 10, 0.6, "a"), span(0, 10, 0.8, "b")]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].score(), 0.8);
        assert_eq!(set.as_slice()[0].source().as_str(), "b");
    }

    #[test]
    fn test_later_span_replaces_only_when_strictly_higher() {
        let resolver = EntityResolver::default();
        let set = resolver.resolve(vec![span(0, 6, 0.7, "a"), span(4, 12, 0.9, "b")]);
        assert_eq!(set.as_slice()[0].source().as_str(), "b");

        let set = resolver.resolve(vec![span(0, 6, 0.7, "a"), span(4, 12, 0.7, "b")]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].source().as_str(), "a");
    }

    #[test]
    fn test_priority_breaks_equal_score_ties() {
        let mut priorities = HashMap::new();
        priorities.insert(RecognizerId::new("id"), 5);
        let resolver = EntityResolver::new(priorities);
        let set = resolver.resolve(vec![span(0, 10, 0.8, "phone"), span(0, 10, 0.8, "id")]);
        assert_eq!(set.as_slice()[0].source().as_str(), "id");
    }

    #[test]
    fn test_equal_everything_keeps_first() {
        let set = EntityResolver::default().resolve(vec![span(0, 10, 0.8, "x"), span(0, 10, 0.8, "y")]);
        assert_eq!(set.as_slice()[0].source().as_str(), "x");
    }

    #[test]
    fn test_output_ordered_and_non_overlapping() {
        let set = EntityResolver::default().resolve(vec![
            span(20, 25, 0.9, "a"),
            span(0, 4, 0.5, "a"),
            span(2, 8, 0.95, "b"),
            span(8, 12, 0.7, "c"),
            span(21, 30, 0.6, "b"),
        ]);
        assert_non_overlapping(&set);
        let ranges: Vec<(usize, usize)> = set.iter().map(|s| (s.start(), s.end())).collect();
        assert_eq!(ranges, vec![(2, 8), (8, 12), (20, 25)]);
    }

    #[test]
    fn test_empty_input() {
        assert!(EntityResolver::default().resolve(vec![]).is_empty());
    }
}
