//! Facet-weighted scoring.
//!
//! A [`FacetTermScoringFunctionFactory`] is stateless and hands out one
//! [`FacetTermScoringFunction`] per partition and query. The function
//! accumulates the weights of the facet values a document carries and
//! combines them with the document's base score.

use std::fmt::Debug;

/// Combines facet value weights with a base score, one document at a time.
pub trait FacetTermScoringFunction: Send {
    /// Forget the weights collected for the previous document.
    fn clear_scores(&mut self);

    /// Collect the weight of one matching facet value.
    fn score_and_collect(&mut self, term_boost: f32);

    /// Facet contribution collected so far.
    fn current_score(&self) -> f32;

    /// Final score of the current document.
    fn combine(&self, base_score: f32) -> f32;

    /// Score of a single term from its document frequency and boost.
    fn score(&self, _doc_freq: u32, boost: f32) -> f32 {
        boost
    }
}

/// Builds scoring functions.
pub trait FacetTermScoringFunctionFactory: Send + Sync + Debug {
    /// Function for a partition with `doc_count` documents whose facet has
    /// `term_count` distinct values.
    fn scoring_function(&self, term_count: usize, doc_count: u32) -> Box<dyn FacetTermScoringFunction>;
}

/// `base * sum(weights)`; documents without a weighted value keep their
/// base score.
#[derive(Debug, Default)]
pub struct MultiplicativeScoringFunction {
    sum: f32,
    matched: bool,
}

impl FacetTermScoringFunction for MultiplicativeScoringFunction {
    fn clear_scores(&mut self) {
        self.sum = 0.0;
        self.matched = false;
    }

    fn score_and_collect(&mut self, term_boost: f32) {
        if term_boost > 0.0 {
            self.sum += term_boost;
            self.matched = true;
        }
    }

    fn current_score(&self) -> f32 {
        if self.matched { self.sum } else { 1.0 }
    }

    fn combine(&self, base_score: f32) -> f32 {
        base_score * self.current_score()
    }
}

/// Factory of [`MultiplicativeScoringFunction`]. The default policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiplicativeScoringFactory;

impl FacetTermScoringFunctionFactory for MultiplicativeScoringFactory {
    fn scoring_function(&self, _term_count: usize, _doc_count: u32) -> Box<dyn FacetTermScoringFunction> {
        Box::new(MultiplicativeScoringFunction::default())
    }
}

/// `base + sum(weights)`.
#[derive(Debug, Default)]
pub struct AdditiveScoringFunction {
    sum: f32,
}

impl FacetTermScoringFunction for AdditiveScoringFunction {
    fn clear_scores(&mut self) {
        self.sum = 0.0;
    }

    fn score_and_collect(&mut self, term_boost: f32) {
        self.sum += term_boost;
    }

    fn current_score(&self) -> f32 {
        self.sum
    }

    fn combine(&self, base_score: f32) -> f32 {
        base_score + self.sum
    }
}

/// Factory of [`AdditiveScoringFunction`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AdditiveScoringFactory;

impl FacetTermScoringFunctionFactory for AdditiveScoringFactory {
    fn scoring_function(&self, _term_count: usize, _doc_count: u32) -> Box<dyn FacetTermScoringFunction> {
        Box::new(AdditiveScoringFunction::default())
    }
}
