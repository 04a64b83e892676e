pub mod base;
pub mod filter;
pub mod full_image;
pub mod patch;
pub mod registry;
mod report;
pub mod streaming;

pub use base::*;
pub use filter::{FilterMode, InferenceFilter, ModelFilter, OutputInformation};
pub use full_image::*;
pub use patch::*;
pub use registry::*;
pub use streaming::*;
