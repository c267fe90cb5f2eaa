mod fan_in;
mod param_gen;

pub use fan_in::FanInUniform;
pub use param_gen::ParamGen;
