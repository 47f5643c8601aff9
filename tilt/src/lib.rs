pub use tilt_core::{ErrorKind, MotionError, PeerId, Vector2};

pub mod model {
    pub use tilt_core::model::*;
}

#[cfg(feature = "sensor")]
pub mod sensor {
    pub use tilt_sensor::*;
}

#[cfg(feature = "transport")]
pub mod transport {
    pub use tilt_transport::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use tilt_session::*;
}
