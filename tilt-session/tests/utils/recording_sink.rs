use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tilt_core::PeerId;
use tilt_session::OutboundSink;

#[derive(Debug, Clone)]
pub struct SentFrame {
    pub payload: String,
    pub target: Option<PeerId>,
}

impl SentFrame {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.payload).unwrap_or(Value::Null)
    }

    /// The `type` discriminator of the frame.
    pub fn kind(&self) -> String {
        self.json()["type"].as_str().unwrap_or_default().to_owned()
    }

    pub fn vector(&self) -> (f64, f64) {
        let json = self.json();
        (
            json["vector"]["x"].as_f64().unwrap_or(f64::NAN),
            json["vector"]["y"].as_f64().unwrap_or(f64::NAN),
        )
    }
}

/// OutboundSink that records every frame instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<SentFrame>>>,
    closed: Arc<AtomicBool>,
    local_id: Option<PeerId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that reports `id` as the transport's own peer id.
    pub fn announcing(id: &str) -> Self {
        Self {
            local_id: Some(PeerId::from(id)),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<SentFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn of_kind(&self, kind: &str) -> Vec<SentFrame> {
        self.frames()
            .into_iter()
            .filter(|f| f.kind() == kind)
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutboundSink for RecordingSink {
    fn send(&self, payload: String, target: Option<&PeerId>) {
        tracing::debug!("[RecordingSink] {} -> {:?}", payload, target);
        self.frames.lock().unwrap().push(SentFrame {
            payload,
            target: target.cloned(),
        });
    }

    fn local_id(&self) -> Option<PeerId> {
        self.local_id.clone()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
