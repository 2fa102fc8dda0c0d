pub mod model_loaders;

pub use model_loaders::*;
