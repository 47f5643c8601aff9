pub mod error;
pub mod model;

pub use error::{ErrorKind, MotionError};
pub use model::*;
