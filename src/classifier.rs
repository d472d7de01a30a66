//! The symbol classifier interface.
//!
//! A classifier scores one normalized 28x28 image against a fixed alphabet of 62 symbols: the
//! digits, then the uppercase letters, then the lowercase letters. The pipeline prepares inputs in
//! the convention the classifier expects (ink is `1.0`, background `0.0`) and only looks at the
//! most probable symbol and its probability.

use std::{fmt, path::Path};

use image::GrayImage;
use itertools::Itertools;
use tract_onnx::prelude::Tensor;

use crate::nn::NeuralNetwork;

/// Width and height of classifier inputs.
pub const INPUT_SIZE: u32 = 28;

/// The symbols a classifier distinguishes, in output order.
pub const ALPHABET: &[u8; 62] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Returns the symbol for an output index, or `None` if `index` is out of range.
pub fn symbol(index: usize) -> Option<char> {
    ALPHABET.get(index).map(|&b| char::from(b))
}

/// A label with the classifier's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    label: char,
    confidence: f32,
}

impl Prediction {
    /// Creates a prediction, clamping `confidence` into `0.0..=1.0`.
    pub fn new(label: char, confidence: f32) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Picks the most probable symbol from a probability distribution over [`ALPHABET`].
    pub fn from_probabilities(probabilities: &[f32]) -> anyhow::Result<Self> {
        top_k(probabilities, 1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty probability distribution"))
    }

    #[inline]
    pub fn label(&self) -> char {
        self.label
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({:.2})", self.label, self.confidence)
    }
}

/// Returns the `k` most probable symbols, most probable first.
///
/// Equal probabilities keep alphabet order.
pub fn top_k(probabilities: &[f32], k: usize) -> anyhow::Result<Vec<Prediction>> {
    if probabilities.len() != ALPHABET.len() {
        anyhow::bail!(
            "expected {} class probabilities, got {}",
            ALPHABET.len(),
            probabilities.len()
        );
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        anyhow::bail!("classifier produced non-finite probability {bad}");
    }

    Ok(probabilities
        .iter()
        .enumerate()
        .sorted_by(|(_, a), (_, b)| b.total_cmp(a))
        .take(k)
        .filter_map(|(i, &p)| Some(Prediction::new(symbol(i)?, p)))
        .collect())
}

/// A classifier input: [`INPUT_SIZE`]² row-major intensities, `1.0` for ink, `0.0` for background.
#[derive(Clone, PartialEq)]
pub struct ClassifierInput {
    pixels: Vec<f32>,
}

impl ClassifierInput {
    /// Converts an image with dark ink on a light background.
    ///
    /// # Panics
    ///
    /// Panics if `image` is not [`INPUT_SIZE`]x[`INPUT_SIZE`] pixels.
    pub fn from_light_background(image: &GrayImage) -> Self {
        assert_eq!(
            image.dimensions(),
            (INPUT_SIZE, INPUT_SIZE),
            "classifier input must be {INPUT_SIZE}x{INPUT_SIZE}"
        );
        Self {
            pixels: image
                .pixels()
                .map(|p| 1.0 - f32::from(p.0[0]) / 255.0)
                .collect(),
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.pixels[(y * INPUT_SIZE + x) as usize]
    }

    /// Returns the fraction of the input covered by ink.
    pub fn coverage(&self) -> f32 {
        self.pixels.iter().sum::<f32>() / self.pixels.len() as f32
    }
}

impl fmt::Debug for ClassifierInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{0}x{0} ClassifierInput ({1:.1}% ink)",
            INPUT_SIZE,
            self.coverage() * 100.0
        )
    }
}

/// Scores a normalized image against [`ALPHABET`].
///
/// Classifiers must be reentrant: the ensemble may call [`Classifier::classify`] from several
/// threads at once.
pub trait Classifier: Send + Sync {
    fn classify(&self, input: &ClassifierInput) -> anyhow::Result<Prediction>;
}

impl<F> Classifier for F
where
    F: Fn(&ClassifierInput) -> anyhow::Result<Prediction> + Send + Sync,
{
    fn classify(&self, input: &ClassifierInput) -> anyhow::Result<Prediction> {
        self(input)
    }
}

/// Layout of the network's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLayout {
    /// `[1, 28, 28, 1]`, as exported from Keras.
    Nhwc,
    /// `[1, 1, 28, 28]`, as exported from PyTorch.
    Nchw,
}

impl InputLayout {
    fn shape(self) -> [usize; 4] {
        let size = INPUT_SIZE as usize;
        match self {
            InputLayout::Nhwc => [1, size, size, 1],
            InputLayout::Nchw => [1, 1, size, size],
        }
    }
}

/// A [`Classifier`] backed by an ONNX network with a single softmax output over [`ALPHABET`].
#[derive(Clone)]
pub struct OnnxClassifier {
    nn: NeuralNetwork,
}

impl OnnxClassifier {
    /// Loads the network at `path`.
    pub fn load<P: AsRef<Path>>(path: P, layout: InputLayout) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::load(path, &layout.shape())?;
        Ok(Self { nn })
    }

    /// Returns the `k` most probable symbols for `input`.
    pub fn top_k(&self, input: &ClassifierInput, k: usize) -> anyhow::Result<Vec<Prediction>> {
        let tensor = Tensor::from_shape(self.nn.input_shape(), input.pixels())?;
        let outputs = self.nn.estimate(tensor)?;
        let Some(probabilities) = outputs.first() else {
            anyhow::bail!("classifier network has no outputs");
        };
        top_k(probabilities.as_slice::<f32>()?, k)
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: &ClassifierInput) -> anyhow::Result<Prediction> {
        let top = self.top_k(input, 3)?;
        log::trace!("top predictions: {}", top.iter().join(", "));
        top.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("classifier returned no predictions"))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use image::Luma;

    use super::*;

    fn one_hot(index: usize, p: f32) -> Vec<f32> {
        let rest = (1.0 - p) / 61.0;
        let mut probs = vec![rest; 62];
        probs[index] = p;
        probs
    }

    #[test]
    fn alphabet_layout() {
        assert_eq!(symbol(0), Some('0'));
        assert_eq!(symbol(9), Some('9'));
        assert_eq!(symbol(10), Some('A'));
        assert_eq!(symbol(35), Some('Z'));
        assert_eq!(symbol(36), Some('a'));
        assert_eq!(symbol(61), Some('z'));
        assert_eq!(symbol(62), None);
    }

    #[test]
    fn arg_max() {
        let prediction = Prediction::from_probabilities(&one_hot(12, 0.8)).unwrap();
        assert_eq!(prediction.label(), 'C');
        assert_relative_eq!(prediction.confidence(), 0.8);
    }

    #[test]
    fn top_three() {
        let mut probs = vec![0.0; 62];
        probs[36] = 0.5;
        probs[10] = 0.3;
        probs[0] = 0.2;
        let labels = top_k(&probs, 3)
            .unwrap()
            .iter()
            .map(|p| p.label())
            .collect::<String>();
        assert_eq!(labels, "aA0");
    }

    #[test]
    fn ties_keep_alphabet_order() {
        let probs = vec![1.0 / 62.0; 62];
        assert_eq!(Prediction::from_probabilities(&probs).unwrap().label(), '0');
    }

    #[test]
    fn rejects_bad_distributions() {
        assert!(Prediction::from_probabilities(&[0.5, 0.5]).is_err());
        let mut probs = one_hot(3, 0.9);
        probs[7] = f32::NAN;
        assert!(Prediction::from_probabilities(&probs).is_err());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Prediction::new('x', 1.2).confidence(), 1.0);
        assert_eq!(Prediction::new('x', -0.1).confidence(), 0.0);
    }

    #[test]
    fn input_has_ink_high() {
        let mut image = GrayImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Luma([255]));
        image.put_pixel(3, 5, Luma([0]));
        let input = ClassifierInput::from_light_background(&image);
        assert_eq!(input.pixels().len(), 28 * 28);
        assert_eq!(input.get(3, 5), 1.0);
        assert_eq!(input.get(5, 3), 0.0);
        assert_relative_eq!(input.coverage(), 1.0 / 784.0);
    }

    #[test]
    #[should_panic]
    fn input_size_is_checked() {
        ClassifierInput::from_light_background(&GrayImage::new(27, 28));
    }

    #[test]
    fn closures_are_classifiers() {
        let classifier = |input: &ClassifierInput| -> anyhow::Result<Prediction> {
            Ok(Prediction::new('I', input.coverage() * 10.0))
        };
        let image = GrayImage::from_pixel(INPUT_SIZE, INPUT_SIZE, Luma([255]));
        let input = ClassifierInput::from_light_background(&image);
        let prediction = classifier.classify(&input).unwrap();
        assert_eq!(prediction, Prediction::new('I', 0.0));
    }
}
