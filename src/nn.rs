//! Neural network inference via [`tract_onnx`].

use std::{fmt, path::Path, sync::Arc};

use anyhow::Context;
use tract_onnx::prelude::{
    tvec, DatumExt, Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, TValue, Tensor,
    TypedFact, TypedOp,
};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded and optimized ONNX network with a single `f32` input of fixed shape.
///
/// This is a cheaply [`Clone`]able handle to the underlying network. Inference only needs `&self`,
/// so one network can serve several threads at once.
#[derive(Clone)]
pub struct NeuralNetwork {
    model: Arc<Model>,
    input_shape: Arc<[usize]>,
}

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file, fixing its input to `input_shape`.
    ///
    /// The path must have a `.onnx` extension.
    pub fn load<P: AsRef<Path>>(path: P, input_shape: &[usize]) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref(), input_shape)
    }

    fn load_impl(path: &Path, input_shape: &[usize]) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => anyhow::bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let data = std::fs::read(path)
            .with_context(|| format!("failed to read network from '{}'", path.display()))?;
        let nn = Self::from_onnx(&data, input_shape)?;
        log::debug!("loaded {} from '{}'", nn, path.display());
        Ok(nn)
    }

    /// Loads a pre-trained model from an in-memory ONNX file.
    ///
    /// Returns an error if the data is malformed, or if the network uses unimplemented operations
    /// or does not accept `input_shape`.
    pub fn from_onnx(data: &[u8], input_shape: &[usize]) -> anyhow::Result<Self> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*data)?
            .with_input_fact(0, f32::fact(input_shape.to_vec()).into())?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        Ok(Self {
            model: Arc::new(model),
            input_shape: input_shape.into(),
        })
    }

    #[inline]
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    /// Runs the network on `input`, returning all output tensors.
    #[doc(alias = "infer")]
    pub fn estimate(&self, input: Tensor) -> anyhow::Result<Vec<Tensor>> {
        if input.shape() != &*self.input_shape {
            anyhow::bail!(
                "input tensor has shape {:?}, network expects {:?}",
                input.shape(),
                self.input_shape
            );
        }
        let outputs = self.model.run(tvec![TValue::from_const(Arc::new(input))])?;
        Ok(outputs.into_iter().map(|v| v.into_tensor()).collect())
    }
}

impl fmt::Display for NeuralNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "network with input {:?} and {} outputs",
            self.input_shape,
            self.model.model().outputs.len()
        )
    }
}
