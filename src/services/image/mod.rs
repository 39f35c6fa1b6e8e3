pub mod enhancer;
pub mod loader;
pub mod preprocess;
