//! Event types for the MedScan station
//!
//! Provides the shared event enum and EventBus used to push live updates
//! (session phase changes, completed analyses, newly posted comments) to
//! every connected viewer.

use crate::records::FeedbackRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Diagnostic session phases
///
/// The session advances Idle → ImageLoaded → Analyzing → ResultReady →
/// FeedbackGiven → Submitted; a new image load returns it to ImageLoaded
/// from any phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    ImageLoaded,
    Analyzing,
    ResultReady,
    FeedbackGiven,
    Submitted,
}

/// User verdict on a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackVerdict {
    Correct,
    Incorrect,
}

/// Station event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StationEvent {
    /// The diagnostic session changed phase
    SessionChanged {
        phase: SessionPhase,
        /// When the phase changed
        timestamp: DateTime<Utc>,
    },

    /// An analysis completed and its result was accepted by the session
    AnalysisCompleted {
        model_key: String,
        prediction: String,
        confidence: f64,
        /// When the result was accepted
        timestamp: DateTime<Utc>,
    },

    /// A training comment was inserted into the store
    ///
    /// Delivered to every subscriber, including the viewer that posted it.
    CommentPosted { record: FeedbackRecord },
}

impl StationEvent {
    /// Event type string used as the SSE event name
    pub fn type_str(&self) -> &'static str {
        match self {
            StationEvent::SessionChanged { .. } => "SessionChanged",
            StationEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            StationEvent::CommentPosted { .. } => "CommentPosted",
        }
    }
}

/// One-to-many event broadcaster shared by all station components
///
/// Wraps a tokio broadcast channel. Subscribers receive events emitted
/// after they subscribe; dropping the receiver is the unsubscribe and is
/// naturally idempotent.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StationEvent>,
}

impl EventBus {
    /// Create an EventBus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event, ignoring the no-receivers case
    pub fn emit_lossy(&self, event: StationEvent) {
        // No receivers is OK
        let _ = self.tx.send(event);
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<StationEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
