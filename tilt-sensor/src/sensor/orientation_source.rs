use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tilt_core::MotionError;
use tokio::sync::mpsc;

const SAMPLE_BUFFER: usize = 256;

/// One raw device-orientation reading, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RawOrientation {
    /// Front-to-back tilt.
    pub beta: f64,
    /// Left-to-right tilt.
    pub gamma: f64,
}

impl RawOrientation {
    pub const fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma }
    }
}

/// A device orientation sensor.
///
/// Support detection may itself be asynchronous, so `detect` is awaited
/// rather than read.
#[async_trait]
pub trait OrientationSource: Send + Sync + 'static {
    async fn detect(&self) -> bool;

    async fn request_permission(&self) -> Result<(), MotionError>;

    /// Start delivering readings. Dropping the receiver unregisters the listener.
    fn subscribe(&self) -> Result<mpsc::Receiver<RawOrientation>, MotionError>;
}

type SampleSlot = Arc<Mutex<Option<mpsc::Sender<RawOrientation>>>>;

/// Orientation source fed by hand through a [`RawFeeder`].
///
/// Stands in for a platform sensor in tests and in the headless CLI.
pub struct ChannelSource {
    supported: bool,
    permission_granted: bool,
    detect_delay: Duration,
    slot: SampleSlot,
}

/// Writing half of a [`ChannelSource`].
#[derive(Clone)]
pub struct RawFeeder {
    slot: SampleSlot,
}

impl ChannelSource {
    pub fn new() -> (Self, RawFeeder) {
        let slot: SampleSlot = Arc::new(Mutex::new(None));
        let source = Self {
            supported: true,
            permission_granted: true,
            detect_delay: Duration::ZERO,
            slot: slot.clone(),
        };
        (source, RawFeeder { slot })
    }

    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    /// Delay support detection, like a platform that answers asynchronously.
    pub fn with_detect_delay(mut self, delay: Duration) -> Self {
        self.detect_delay = delay;
        self
    }
}

#[async_trait]
impl OrientationSource for ChannelSource {
    async fn detect(&self) -> bool {
        if !self.detect_delay.is_zero() {
            tokio::time::sleep(self.detect_delay).await;
        }
        self.supported
    }

    async fn request_permission(&self) -> Result<(), MotionError> {
        if self.permission_granted {
            Ok(())
        } else {
            Err(MotionError::permission_denied(
                "orientation access was refused",
            ))
        }
    }

    fn subscribe(&self) -> Result<mpsc::Receiver<RawOrientation>, MotionError> {
        if !self.supported {
            return Err(MotionError::unsupported("no orientation sensor"));
        }
        let (tx, rx) = mpsc::channel(SAMPLE_BUFFER);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(tx);
        }
        Ok(rx)
    }
}

impl RawFeeder {
    /// Push one reading. Returns `false` when nobody is listening.
    pub fn push(&self, raw: RawOrientation) -> bool {
        let Ok(slot) = self.slot.lock() else {
            return false;
        };
        match slot.as_ref() {
            Some(tx) => tx.try_send(raw).is_ok(),
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}
