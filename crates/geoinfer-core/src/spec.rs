use std::fmt;

use crate::DType;

/// Name of a graph node or tensor: a placeholder, an output or a target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

impl IOName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IOName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for IOName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for IOName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Declared type and shape of a tensor, as reported by a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: DType,
    pub rank: usize,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

impl TensorSpec {
    pub fn new(name: impl Into<IOName>, dtype: DType, dims: Vec<Option<usize>>) -> Self {
        Self {
            name: name.into(),
            dtype,
            rank: dims.len(),
            dims,
        }
    }

    pub fn dim(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied().flatten()
    }

    pub fn shape_string(&self) -> String {
        let dims: Vec<String> = self
            .dims
            .iter()
            .map(|d| d.map_or_else(|| "?".to_string(), |d| d.to_string()))
            .collect();
        format!("[{}]", dims.join(", "))
    }
}

/// Introspected specs of a model's inputs and outputs, in configuration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelSpec {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    pub fn input_dtypes(&self) -> Vec<DType> {
        self.inputs.iter().map(|s| s.dtype).collect()
    }
}
