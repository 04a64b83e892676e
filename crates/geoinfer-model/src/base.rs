use std::fmt;

use geoinfer_core::{
    FieldSize, Graph, IOName, ModelError, ModelResult, ModelSpec, Raster, Session, Tensor,
    TensorSpec,
};
use tracing::{debug, info};

use crate::{report, InputBinding, OutputBinding, ParameterRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelState {
    Unconfigured,
    Configured,
    Introspected,
    /// A run is in flight. `run_session` holds `&mut self` for the whole run,
    /// so the borrow checker keeps every other caller out and `state` never
    /// reports it.
    Executing,
}

/// State shared by every inference filter: the graph, a borrowed session,
/// the model parameters and the introspected tensor specs.
///
/// The session is borrowed for `'a` and must outlive every filter holding it.
/// Any change to the parameters drops the introspected specs, so
/// [`generate_output_information`](Self::generate_output_information) has to
/// run again before they can be read.
#[derive(Clone, Default)]
pub struct ModelBase<'a> {
    graph: Option<Graph>,
    session: Option<&'a dyn Session>,
    registry: ParameterRegistry<'a>,
    spec: Option<ModelSpec>,
}

impl fmt::Debug for ModelBase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBase")
            .field("graph", &self.graph.as_ref().map(Graph::label))
            .field("session", &self.session.map(|s| s.engine().to_string()))
            .field("registry", &self.registry)
            .field("spec", &self.spec)
            .finish()
    }
}

impl<'a> ModelBase<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_graph(&mut self, graph: Graph) {
        self.graph = Some(graph);
        self.spec = None;
    }

    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    pub fn set_session(&mut self, session: &'a dyn Session) {
        self.session = Some(session);
        self.spec = None;
    }

    pub fn session(&self) -> Option<&'a dyn Session> {
        self.session
    }

    pub fn registry(&self) -> &ParameterRegistry<'a> {
        &self.registry
    }

    /// Mutable access to the parameters; drops the introspected specs.
    pub fn registry_mut(&mut self) -> &mut ParameterRegistry<'a> {
        self.spec = None;
        &mut self.registry
    }

    pub fn push_input_bundle(
        &mut self,
        name: impl Into<IOName>,
        receptive_field: FieldSize,
        image: &'a Raster,
    ) {
        self.registry_mut()
            .push_input_bundle(name, receptive_field, image);
    }

    pub fn push_output_bundle(&mut self, name: impl Into<IOName>, expression_field: FieldSize) {
        self.registry_mut()
            .push_output_bundle(name, expression_field);
    }

    pub fn input_bindings(&self) -> ModelResult<Vec<InputBinding<'a>>> {
        self.registry.input_bindings()
    }

    pub fn output_bindings(&self) -> ModelResult<Vec<OutputBinding>> {
        self.registry.output_bindings()
    }

    pub fn model_spec(&self) -> Option<&ModelSpec> {
        self.spec.as_ref()
    }

    pub fn input_tensor_specs(&self) -> Option<&[TensorSpec]> {
        self.spec.as_ref().map(|s| s.inputs.as_slice())
    }

    pub fn output_tensor_specs(&self) -> Option<&[TensorSpec]> {
        self.spec.as_ref().map(|s| s.outputs.as_slice())
    }

    pub fn state(&self) -> ModelState {
        if self.spec.is_some() {
            ModelState::Introspected
        } else if self.graph.is_some()
            && self.session.is_some()
            && !self.registry.input_placeholders().is_empty()
        {
            ModelState::Configured
        } else {
            ModelState::Unconfigured
        }
    }

    /// Validates the parameters and introspects every input and output tensor.
    ///
    /// The specs are only stored when every check and query succeeds.
    pub fn generate_output_information(&mut self) -> ModelResult<()> {
        self.spec = None;

        let session = self.require_session()?;
        self.require_graph()?;
        let inputs = self.registry.input_bindings()?;
        let outputs = self.registry.output_bindings()?;

        let input_specs = inputs
            .iter()
            .map(|b| introspect(session, &b.placeholder))
            .collect::<ModelResult<Vec<_>>>()?;
        let output_specs = outputs
            .iter()
            .map(|b| introspect(session, &b.tensor))
            .collect::<ModelResult<Vec<_>>>()?;

        for (binding, spec) in inputs.iter().zip(&input_specs) {
            debug!(
                placeholder = %binding.placeholder,
                receptive_field = %binding.receptive_field,
                dtype = %spec.dtype,
                shape = %spec.shape_string(),
                "introspected input"
            );
        }
        for (binding, spec) in outputs.iter().zip(&output_specs) {
            debug!(
                tensor = %binding.tensor,
                expression_field = %binding.expression_field,
                dtype = %spec.dtype,
                shape = %spec.shape_string(),
                "introspected output"
            );
        }
        info!(
            engine = session.engine(),
            inputs = input_specs.len(),
            outputs = output_specs.len(),
            "model introspected"
        );

        self.spec = Some(ModelSpec {
            inputs: input_specs,
            outputs: output_specs,
        });
        Ok(())
    }

    /// Runs the session on `inputs` plus the user placeholders.
    ///
    /// Returns one tensor per output tensor name, in order. Target nodes are
    /// evaluated but never returned.
    pub fn run_session(&mut self, inputs: Vec<(IOName, Tensor)>) -> ModelResult<Vec<Tensor>> {
        let session = self.require_session()?;
        self.require_graph()?;
        let feeds = self.merge_user_placeholders(inputs)?;

        let fetches = self.registry.output_tensors();
        let targets = self.registry.target_nodes();
        debug!(
            feeds = feeds.len(),
            fetches = fetches.len(),
            targets = targets.len(),
            "running session"
        );

        // Shallow copy for the debug report; tensor buffers are shared.
        let snapshot = feeds.clone();
        let outputs = match session.run(feeds, fetches, targets) {
            Ok(outputs) => outputs,
            Err(err) => {
                let report = self.generate_debug_report(&snapshot);
                debug!(%report, "session run failed");
                return Err(ModelError::Execution {
                    message: format!("{err:#}"),
                    report: Some(report),
                });
            }
        };

        if outputs.len() != fetches.len() {
            return Err(ModelError::Execution {
                message: format!(
                    "session returned {} tensors for {} requested outputs",
                    outputs.len(),
                    fetches.len()
                ),
                report: Some(self.generate_debug_report(&snapshot)),
            });
        }
        Ok(outputs)
    }

    /// Human-readable dump of the configuration and of `inputs`.
    pub fn generate_debug_report(&self, inputs: &[(IOName, Tensor)]) -> String {
        report::debug_report(self, inputs)
    }

    fn merge_user_placeholders(
        &self,
        mut inputs: Vec<(IOName, Tensor)>,
    ) -> ModelResult<Vec<(IOName, Tensor)>> {
        check_unique(&inputs, "the input dictionary")?;
        check_unique(self.registry.user_placeholders(), "the user placeholders")?;
        for (name, value) in self.registry.user_placeholders() {
            if inputs.iter().any(|(n, _)| n == name) {
                return Err(ModelError::configuration(format!(
                    "placeholder `{name}` is fed both by the input dictionary and by the user placeholders"
                )));
            }
            inputs.push((name.clone(), value.clone()));
        }
        Ok(inputs)
    }

    fn require_session(&self) -> ModelResult<&'a dyn Session> {
        self.session
            .ok_or_else(|| ModelError::configuration("no session has been set"))
    }

    fn require_graph(&self) -> ModelResult<&Graph> {
        self.graph
            .as_ref()
            .ok_or_else(|| ModelError::configuration("no graph has been set"))
    }
}

fn check_unique(feeds: &[(IOName, Tensor)], source: &str) -> ModelResult<()> {
    for (i, (name, _)) in feeds.iter().enumerate() {
        if feeds[..i].iter().any(|(n, _)| n == name) {
            return Err(ModelError::configuration(format!(
                "placeholder `{name}` is fed twice by {source}"
            )));
        }
    }
    Ok(())
}

fn introspect(session: &dyn Session, name: &IOName) -> ModelResult<TensorSpec> {
    let mut spec = session
        .introspect(name)
        .map_err(|e| ModelError::introspection(name.as_str(), format!("{e:#}")))?;
    spec.name = name.clone();
    Ok(spec)
}
