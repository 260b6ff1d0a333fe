//! Observer transport abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::Frame;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Abstraction for the outbound half of one observer connection.
///
/// # Implementations
///
/// - **Production**: an HTTP event-stream or websocket writer
/// - **Simulation**: channels and in-memory recorders
///
/// # Frame Flow
///
/// ```text
/// EventBus            Feed                 Sink               Observer
///   |-- publish -------->|                    |                    |
///   |                    |-- send(frame) ---->|                    |
///   |                    |                    |-- [framing] ------>|
/// ```
#[async_trait]
pub trait FrameSink: Send + Sync + 'static {
    /// Sends one frame to the observer.
    ///
    /// # Returns
    /// * `Ok(())` - Frame accepted by the transport
    /// * `Err(EnvError::SinkClosed)` - The connection is gone; the caller
    ///   must tear down whatever it holds on behalf of this observer
    async fn send(&self, frame: Frame) -> Result<(), EnvError>;

    /// Human readable label used in logs.
    fn label(&self) -> String;
}

/// Sink that forwards frames into an unbounded channel.
///
/// Dropping the receiver closes the sink.
pub struct ChannelSink {
    label: String,
    tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    pub fn new(label: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { label: label.into(), tx }, rx)
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&self, frame: Frame) -> Result<(), EnvError> {
        self.tx.send(frame).map_err(|_| EnvError::closed(&self.label))
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

/// Sink that records every frame in memory.
///
/// Optionally closes itself after a fixed number of frames, which is how
/// tests and simulations model an observer that disconnects.
#[derive(Clone)]
pub struct RecordingSink {
    label: String,
    frames: Arc<Mutex<Vec<Frame>>>,
    close_after: Option<usize>,
}

impl RecordingSink {
    /// Creates a sink that never closes.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            frames: Arc::new(Mutex::new(Vec::new())),
            close_after: None,
        }
    }

    /// Closes the sink once `limit` frames have been accepted.
    pub fn closing_after(mut self, limit: usize) -> Self {
        self.close_after = Some(limit);
        self
    }

    /// Returns a copy of the recorded frames.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send(&self, frame: Frame) -> Result<(), EnvError> {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.close_after {
            if frames.len() >= limit {
                return Err(EnvError::closed(&self.label));
            }
        }
        frames.push(frame);
        Ok(())
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}
