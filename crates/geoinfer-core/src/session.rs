use anyhow::Result;

use crate::{IOName, Tensor, TensorSpec};

/// A live execution context bound to a graph.
///
/// Filters only ever borrow a session, so one session can serve many filter
/// instances across threads. Implementations provide their own
/// synchronization for concurrent `run` calls.
pub trait Session: Send + Sync {
    fn engine(&self) -> &str;

    /// Declared type and shape of the named placeholder or output.
    fn introspect(&self, name: &IOName) -> Result<TensorSpec>;

    /// Feeds `feeds`, evaluates `fetches` and `targets`, and returns one
    /// tensor per fetch in order. Target values are never returned.
    fn run(
        &self,
        feeds: Vec<(IOName, Tensor)>,
        fetches: &[IOName],
        targets: &[IOName],
    ) -> Result<Vec<Tensor>>;
}
