use std::sync::Mutex;

use anyhow::{anyhow, bail, Context, Result};
use geoinfer_core::{DType, Graph, IOName, Session, Shape, Tensor, TensorSpec};
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        SessionInputValue,
    },
    tensor::TensorElementType,
    value::{DynValue, ValueType},
};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct SessionOptions {
    /// Threads used within one operator; `None` lets ORT decide.
    pub intra_threads: Option<usize>,
    pub optimize: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            intra_threads: None,
            optimize: true,
        }
    }
}

/// An ONNX Runtime session built from a serialized ONNX graph.
///
/// ONNX graphs have no side-effect nodes, so a target must name a graph
/// output; it is computed with the run and dropped.
pub struct OrtSession {
    session: Mutex<ort::session::Session>,
    inputs: Vec<TensorSpec>,
    outputs: Vec<TensorSpec>,
}

impl OrtSession {
    pub fn from_graph(graph: &Graph, options: &SessionOptions) -> Result<Self> {
        let builder = ort::session::Session::builder()
            .context("failed to create ORT session builder")?;
        let builder = configure_session_builder(builder, options)?;

        let session = builder
            .commit_from_memory(graph.bytes())
            .with_context(|| format!("failed to load ONNX graph {}", graph.label()))?;

        let inputs = session
            .inputs
            .iter()
            .map(|input| tensor_spec_from_value_type(&input.name, &input.input_type))
            .collect::<Result<Vec<_>>>()?;
        let outputs = session
            .outputs
            .iter()
            .map(|output| tensor_spec_from_value_type(&output.name, &output.output_type))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            graph = graph.label(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "ORT session ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            inputs,
            outputs,
        })
    }

    pub fn inputs(&self) -> &[TensorSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorSpec] {
        &self.outputs
    }

    fn is_output(&self, name: &IOName) -> bool {
        self.outputs.iter().any(|o| &o.name == name)
    }
}

impl Session for OrtSession {
    fn engine(&self) -> &str {
        "onnxruntime"
    }

    fn introspect(&self, name: &IOName) -> Result<TensorSpec> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .find(|spec| &spec.name == name)
            .cloned()
            .with_context(|| format!("no input or output named '{name}' in the ONNX graph"))
    }

    fn run(
        &self,
        feeds: Vec<(IOName, Tensor)>,
        fetches: &[IOName],
        targets: &[IOName],
    ) -> Result<Vec<Tensor>> {
        for name in fetches {
            if !self.is_output(name) {
                bail!("fetch '{name}' is not an output of the ONNX graph");
            }
        }
        for name in targets {
            if !self.is_output(name) {
                bail!("target node '{name}' is not an output of the ONNX graph");
            }
        }

        let mut ort_inputs = Vec::with_capacity(feeds.len());
        for (name, tensor) in feeds {
            let value = tensor_to_ort_value(&tensor)
                .with_context(|| format!("cannot convert feed '{name}'"))?;
            ort_inputs.push((name.0, SessionInputValue::from(value)));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("ORT session lock poisoned"))?;
        let outputs = session.run(ort_inputs)?;

        let mut fetched: Vec<Option<Tensor>> = vec![None; fetches.len()];
        for (name, value) in outputs.iter() {
            if let Some(idx) = fetches.iter().position(|f| f.as_str() == name) {
                fetched[idx] = Some(
                    ort_value_to_tensor(&value)
                        .with_context(|| format!("cannot convert output '{name}'"))?,
                );
            }
        }

        fetches
            .iter()
            .zip(fetched)
            .map(|(name, tensor)| {
                tensor.with_context(|| format!("ORT did not produce output '{name}'"))
            })
            .collect()
    }
}

fn configure_session_builder(
    builder: SessionBuilder,
    options: &SessionOptions,
) -> Result<SessionBuilder> {
    let level = if options.optimize {
        GraphOptimizationLevel::Level3
    } else {
        GraphOptimizationLevel::Disable
    };
    let builder = builder
        .with_optimization_level(level)
        .context("failed to configure ORT session builder")?;
    match options.intra_threads {
        Some(threads) => builder
            .with_intra_threads(threads)
            .context("failed to set ORT intra-op threads"),
        None => Ok(builder),
    }
}

fn tensor_spec_from_value_type(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("'{name}' is not a tensor");
    };

    let dtype = ort_tensor_element_to_dtype(*ty)?;
    let dims = shape
        .iter()
        .map(|d| if *d < 0 { None } else { Some(*d as usize) })
        .collect::<Vec<_>>();

    Ok(TensorSpec::new(name, dtype, dims))
}

fn ort_tensor_element_to_dtype(ty: TensorElementType) -> Result<DType> {
    match ty {
        TensorElementType::Float32 => Ok(DType::F32),
        TensorElementType::Float16 => Ok(DType::F16),
        TensorElementType::Float64 => Ok(DType::F64),
        TensorElementType::Int64 => Ok(DType::I64),
        TensorElementType::Int32 => Ok(DType::I32),
        TensorElementType::Uint8 => Ok(DType::U8),
        TensorElementType::Bool => Ok(DType::Bool),
        _ => bail!("unsupported tensor element type: {ty}"),
    }
}

fn tensor_to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let shape: Vec<usize> = tensor.shape().dims().to_vec();

    let value = match tensor.dtype() {
        DType::F32 => ort::value::Tensor::from_array((shape, tensor.to_vec::<f32>()?))?.into_dyn(),
        DType::F64 => ort::value::Tensor::from_array((shape, tensor.to_vec::<f64>()?))?.into_dyn(),
        DType::I64 => ort::value::Tensor::from_array((shape, tensor.to_vec::<i64>()?))?.into_dyn(),
        DType::I32 => ort::value::Tensor::from_array((shape, tensor.to_vec::<i32>()?))?.into_dyn(),
        DType::U8 => ort::value::Tensor::from_array((shape, tensor.to_vec::<u8>()?))?.into_dyn(),
        DType::Bool => {
            ort::value::Tensor::from_array((shape, tensor.to_vec::<bool>()?))?.into_dyn()
        }
        DType::F16 => bail!("f16 inputs are not supported yet"),
    };

    Ok(value)
}

fn ort_value_to_tensor(value: &ort::value::ValueRef<'_>) -> Result<Tensor> {
    let ValueType::Tensor { ty, shape, .. } = value.dtype() else {
        bail!("non-tensor outputs are not supported");
    };

    let dims: Vec<usize> = shape.iter().map(|d| *d as usize).collect();
    let shape = Shape::from_slice(&dims);

    match *ty {
        TensorElementType::Float32 => {
            let array = value.try_extract_array::<f32>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Float64 => {
            let array = value.try_extract_array::<f64>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Int64 => {
            let array = value.try_extract_array::<i64>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Int32 => {
            let array = value.try_extract_array::<i32>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Uint8 => {
            let array = value.try_extract_array::<u8>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Bool => {
            let array = value.try_extract_array::<bool>()?;
            let slice = array.as_slice().context("non-contiguous output tensor")?;
            Tensor::from_values(shape, slice)
        }
        TensorElementType::Float16 => bail!("f16 outputs are not supported yet"),
        _ => bail!("unsupported output tensor element type: {ty}"),
    }
}
