pub mod plan;
pub mod synth;
pub mod validate;
