pub mod arch;
pub mod dataset;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod params;
pub mod training;

pub use error::{MlErr, Result};
pub use params::{ParamLayout, ParamTensor, Parameters};
