use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;

/// A serialized computational graph.
///
/// The contents are opaque to this crate; only a session provider knows how
/// to interpret them. Cloning a graph shares the underlying buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Graph {
    label: String,
    bytes: Bytes,
}

impl Graph {
    pub fn from_bytes(label: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            label: label.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read graph from {}", path.display()))?;
        Ok(Self::from_bytes(path.display().to_string(), bytes))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_buffer() {
        let graph = Graph::from_bytes("g", vec![1u8, 2, 3]);
        let copy = graph.clone();
        assert_eq!(graph.bytes().as_ptr(), copy.bytes().as_ptr());
        assert_eq!(copy.label(), "g");
        assert_eq!(copy.len(), 3);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = Graph::from_file("/nonexistent/model.onnx").unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/model.onnx"));
    }
}
