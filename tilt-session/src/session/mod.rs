mod coordinator;
mod input;
mod outbound_sink;
mod session;
mod session_config;
mod session_error;
mod session_state;

pub use coordinator::{Coordinator, SensorFeed, SessionHandle};
pub use input::{InputGate, ManualPad, PadDirection};
pub use outbound_sink::OutboundSink;
pub use session::{Outgoing, Session};
pub use session_config::SessionConfig;
pub use session_error::SessionError;
pub use session_state::{GameScene, LocalPlayer, PlayerInfo, SessionState, TutorialPrompt};
