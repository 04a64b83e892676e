#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use geoinfer_core::{DType, IOName, Raster, Session, Shape, Tensor, TensorSpec};

/// How a scripted output is computed from the feeds.
#[derive(Clone, Debug)]
pub enum Op {
    /// Centre pixel of a `[1, h, w, b]` feed, as `[1, b]`.
    Centre(&'static str),
    /// Element-wise sum of the centre pixels of several feeds, as `[1, b]`.
    CentreSum(Vec<&'static str>),
    /// Centre pixel plus a scalar feed, as `[1, b]`.
    CentrePlus(&'static str, &'static str),
    /// The feed itself, as f32.
    Identity(&'static str),
    /// Mean of every element of a feed, as `[1, 1]`.
    Mean(&'static str),
    /// Like `Centre`, but fails when the first centre sample equals the value.
    FailAt(&'static str, f32),
}

/// In-memory stand-in for an inference engine.
#[derive(Default)]
pub struct ScriptedSession {
    specs: HashMap<String, TensorSpec>,
    ops: HashMap<String, Op>,
    targets: HashMap<String, AtomicUsize>,
    runs: AtomicUsize,
    delay: Duration,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn placeholder(mut self, name: &str, dtype: DType, dims: &[Option<usize>]) -> Self {
        self.specs
            .insert(name.to_string(), TensorSpec::new(name, dtype, dims.to_vec()));
        self
    }

    pub fn output(mut self, name: &str, dims: &[Option<usize>], op: Op) -> Self {
        self.specs
            .insert(name.to_string(), TensorSpec::new(name, DType::F32, dims.to_vec()));
        self.ops.insert(name.to_string(), op);
        self
    }

    pub fn target(mut self, name: &str) -> Self {
        self.targets.insert(name.to_string(), AtomicUsize::new(0));
        self
    }

    /// Sleeps for `delay` on every successful run.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn target_count(&self, name: &str) -> usize {
        self.targets
            .get(name)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Session for ScriptedSession {
    fn engine(&self) -> &str {
        "scripted"
    }

    fn introspect(&self, name: &IOName) -> Result<TensorSpec> {
        self.specs
            .get(name.as_str())
            .cloned()
            .with_context(|| format!("node '{name}' not found in graph"))
    }

    fn run(
        &self,
        feeds: Vec<(IOName, Tensor)>,
        fetches: &[IOName],
        targets: &[IOName],
    ) -> Result<Vec<Tensor>> {
        let feeds: HashMap<&str, &Tensor> = feeds.iter().map(|(n, t)| (n.as_str(), t)).collect();
        for (name, tensor) in &feeds {
            let Some(spec) = self.specs.get(*name) else {
                bail!("'{name}' is not a placeholder of this graph");
            };
            ensure!(
                tensor.dtype() == spec.dtype,
                "type mismatch for '{name}': expected {}, got {}",
                spec.dtype,
                tensor.dtype()
            );
            let dims = tensor.shape().dims();
            let compatible = dims.len() == spec.rank
                && dims.iter().zip(&spec.dims).all(|(d, s)| s.map_or(true, |s| s == *d));
            ensure!(
                compatible,
                "shape mismatch for '{name}': declared {}, fed {}",
                spec.shape_string(),
                tensor.shape()
            );
        }
        let mut outputs = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            let op = self
                .ops
                .get(fetch.as_str())
                .with_context(|| format!("fetch '{fetch}' is not an output of this graph"))?;
            let out = match op {
                Op::Centre(input) => row(centre(feed(&feeds, input)?)?)?,
                Op::CentreSum(inputs) => {
                    let mut acc: Option<Vec<f32>> = None;
                    for input in inputs {
                        let px = centre(feed(&feeds, input)?)?;
                        acc = Some(match acc {
                            None => px,
                            Some(acc) => acc.iter().zip(&px).map(|(a, b)| a + b).collect(),
                        });
                    }
                    row(acc.unwrap_or_default())?
                }
                Op::CentrePlus(input, scalar) => {
                    let s = feed(&feeds, scalar)?.to_f32_vec()?;
                    let s = *s.first().context("empty scalar feed")?;
                    row(centre(feed(&feeds, input)?)?.iter().map(|v| v + s).collect())?
                }
                Op::Identity(input) => {
                    let t = feed(&feeds, input)?;
                    Tensor::from_values(t.shape().clone(), &t.to_f32_vec()?)?
                }
                Op::Mean(input) => {
                    let values = feed(&feeds, input)?.to_f32_vec()?;
                    let mean = values.iter().sum::<f32>() / values.len().max(1) as f32;
                    row(vec![mean])?
                }
                Op::FailAt(input, value) => {
                    let px = centre(feed(&feeds, input)?)?;
                    if px.first() == Some(value) {
                        bail!("boom at {value}");
                    }
                    row(px)?
                }
            };
            outputs.push(out);
        }

        for target in targets {
            let counter = self
                .targets
                .get(target.as_str())
                .with_context(|| format!("target node '{target}' not found in graph"))?;
            counter.fetch_add(1, Ordering::SeqCst);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(outputs)
    }
}

fn feed<'t>(feeds: &HashMap<&str, &'t Tensor>, name: &str) -> Result<&'t Tensor> {
    feeds
        .get(name)
        .copied()
        .with_context(|| format!("You must feed a value for placeholder tensor '{name}'"))
}

fn centre(t: &Tensor) -> Result<Vec<f32>> {
    let dims = t.shape().dims();
    ensure!(dims.len() == 4, "expected a [1, h, w, b] feed, got {}", t.shape());
    let (h, w, b) = (dims[1], dims[2], dims[3]);
    let values = t.to_f32_vec()?;
    let start = ((h / 2) * w + w / 2) * b;
    Ok(values[start..start + b].to_vec())
}

fn row(values: Vec<f32>) -> Result<Tensor> {
    Tensor::from_values(Shape::from_slice(&[1, values.len()]), &values)
}

/// `width x height x bands` raster whose samples encode their position.
pub fn ramp(width: usize, height: usize, bands: usize) -> Raster {
    let data = (0..width * height * bands).map(|v| v as f32).collect();
    Raster::new(width, height, bands, data).expect("valid ramp")
}
