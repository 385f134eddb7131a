mod exposition;

pub use exposition::Exposition;
