mod signaling;
mod transport;

pub use signaling::*;
pub use transport::*;
