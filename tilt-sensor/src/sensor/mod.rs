mod direction;
mod motion_filter;
mod orientation_source;
mod sensor_config;
mod sensor_event;
mod sensor_manager;

pub use direction::Direction;
pub use motion_filter::{FilterOutput, MotionFilter};
pub use orientation_source::{ChannelSource, OrientationSource, RawFeeder, RawOrientation};
pub use sensor_config::SensorConfig;
pub use sensor_event::{SensorEvent, SensorStatus};
pub use sensor_manager::SensorManager;
