mod run;
mod scaling;

pub use run::RunConfig;
pub use scaling::ScalingConfig;
