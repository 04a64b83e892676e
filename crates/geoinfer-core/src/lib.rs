pub mod error;
pub mod expression;
pub mod graph;
pub mod raster;
pub mod session;
pub mod spec;
pub mod tensor;

pub use error::*;
pub use expression::*;
pub use graph::*;
pub use raster::*;
pub use session::*;
pub use spec::*;
pub use tensor::*;
