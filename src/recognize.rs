//! On-demand recognition of a canvas snapshot.

use std::fmt;

use crate::canvas::CanvasSnapshot;
use crate::classifier::{Classifier, Prediction};
use crate::config::Config;
use crate::ensemble::{self, Candidate};
use crate::roi::{Rejection, RoiExtractor};
use crate::session::SessionStopped;
use crate::timer::Timer;
use crate::variant::{VariantGenerator, VariantKind};

/// Result of a recognition attempt that did not fail.
#[derive(Debug, Clone)]
pub enum Outcome {
    Recognized(Recognition),
    /// The canvas was blank.
    NoDrawingDetected,
    /// The drawing's region was degenerate.
    InvalidRoi,
}

impl Outcome {
    pub fn recognition(&self) -> Option<&Recognition> {
        match self {
            Outcome::Recognized(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_recognition(self) -> Option<Recognition> {
        match self {
            Outcome::Recognized(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Rejection> for Outcome {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::NoDrawingDetected => Outcome::NoDrawingDetected,
            Rejection::InvalidRoi => Outcome::InvalidRoi,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Recognized(r) => r.fmt(f),
            Outcome::NoDrawingDetected => f.write_str("no drawing detected"),
            Outcome::InvalidRoi => f.write_str("invalid region of interest"),
        }
    }
}

/// The winning prediction, along with how every variant scored.
#[derive(Debug, Clone)]
pub struct Recognition {
    ranking: Vec<Candidate>,
    accepted: bool,
}

impl Recognition {
    fn best(&self) -> &Candidate {
        &self.ranking[0]
    }

    #[inline]
    pub fn prediction(&self) -> Prediction {
        self.best().prediction
    }

    #[inline]
    pub fn label(&self) -> char {
        self.prediction().label()
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.prediction().confidence()
    }

    /// Returns the variant the winning prediction was made on.
    #[inline]
    pub fn variant(&self) -> VariantKind {
        self.best().kind
    }

    /// Returns all variant predictions, best first.
    #[inline]
    pub fn ranking(&self) -> &[Candidate] {
        &self.ranking
    }

    /// Returns whether the confidence reached the configured acceptance threshold.
    ///
    /// Callers decide what to do with rejected guesses; the prediction is available either way.
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }
}

impl fmt::Display for Recognition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} variant", self.prediction(), self.variant())?;
        if !self.accepted {
            f.write_str(" (below acceptance threshold)")?;
        }
        Ok(())
    }
}

/// Errors that prevent a recognition attempt from producing an [`Outcome`].
///
/// Neither error touches the canvas or the gesture state.
#[derive(Debug, thiserror::Error)]
pub enum RecognizeError {
    #[error("cannot snapshot the canvas")]
    Snapshot(#[from] SessionStopped),
    #[error("classifier failed: {0:#}")]
    Classifier(anyhow::Error),
}

/// Runs extraction, variant generation and ensemble classification on canvas snapshots.
pub struct Recognizer<C> {
    classifier: C,
    extractor: RoiExtractor,
    generator: VariantGenerator,
    acceptance: f32,
    parallel: bool,
    t_extract: Timer,
    t_variants: Timer,
    t_classify: Timer,
}

impl<C: Classifier> Recognizer<C> {
    pub fn new(classifier: C, config: &Config) -> Self {
        Self {
            classifier,
            extractor: RoiExtractor::from_config(config),
            generator: VariantGenerator::from_config(config),
            acceptance: config.acceptance(),
            parallel: config.parallel_variants,
            t_extract: Timer::new("extract"),
            t_variants: Timer::new("variants"),
            t_classify: Timer::new("classify"),
        }
    }

    /// Recognizes the drawing in `snapshot`.
    ///
    /// Blank canvases and degenerate regions are reported as [`Outcome`]s without invoking the
    /// classifier.
    pub fn recognize(&mut self, snapshot: &CanvasSnapshot) -> Result<Outcome, RecognizeError> {
        let roi = match self.t_extract.time(|| self.extractor.extract(snapshot.image())) {
            Ok(roi) => roi,
            Err(rejection) => {
                log::debug!("{:?}: {}", snapshot, rejection);
                return Ok(rejection.into());
            }
        };

        let variants = self.t_variants.time(|| self.generator.generate(&roi));
        let ranking = self
            .t_classify
            .time(|| ensemble::evaluate(&self.classifier, &variants, self.parallel))
            .map_err(RecognizeError::Classifier)?;
        if ranking.is_empty() {
            return Err(RecognizeError::Classifier(anyhow::anyhow!(
                "no variant predictions"
            )));
        }

        let recognition = Recognition {
            accepted: ranking[0].prediction.confidence() >= self.acceptance,
            ranking,
        };
        log::debug!("recognized {}", recognition);
        log::debug!(
            "{}, {}, {}",
            self.t_extract,
            self.t_variants,
            self.t_classify
        );
        Ok(Outcome::Recognized(recognition))
    }
}
