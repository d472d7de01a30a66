//! Picking one answer out of several variant predictions.

use anyhow::Context;
use rayon::prelude::*;

use crate::classifier::{Classifier, ClassifierInput, Prediction};
use crate::variant::{Variant, VariantKind};

/// A variant's prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub kind: VariantKind,
    pub prediction: Prediction,
}

impl Candidate {
    #[inline]
    pub fn new(kind: VariantKind, prediction: Prediction) -> Self {
        Self { kind, prediction }
    }
}

/// Orders candidates best first: by confidence, and by [`VariantKind`] priority among equally
/// confident ones.
pub fn rank(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut ranked = candidates.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        b.prediction
            .confidence()
            .total_cmp(&a.prediction.confidence())
            .then(a.kind.cmp(&b.kind))
    });
    ranked
}

/// Returns the best candidate, or `None` if there are none.
pub fn select(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    rank(candidates).into_iter().next()
}

/// Classifies every variant and returns the [`rank`]ed candidates.
///
/// With `parallel` set, the classifier is invoked on the rayon thread pool. The first classifier
/// error aborts the evaluation.
pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    variants: &[Variant],
    parallel: bool,
) -> anyhow::Result<Vec<Candidate>> {
    let classify = |variant: &Variant| -> anyhow::Result<Candidate> {
        let input = ClassifierInput::from_light_background(variant.image());
        let prediction = classifier
            .classify(&input)
            .with_context(|| format!("failed to classify {} variant", variant.kind()))?;
        log::trace!("{} variant: {}", variant.kind(), prediction);
        Ok(Candidate::new(variant.kind(), prediction))
    };

    let candidates = if parallel {
        variants
            .par_iter()
            .map(classify)
            .collect::<anyhow::Result<Vec<_>>>()?
    } else {
        variants
            .iter()
            .map(classify)
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    Ok(rank(candidates))
}
