//! Sequence model loading and inference

pub mod loader;
pub mod scorer;

pub use loader::ModelLoader;
pub use scorer::SequenceScorer;
