//! Diagnostic session state machine
//!
//! Orchestrates image intake → inference → result presentation → feedback
//! → submission for the station's one live session. Two invariants carry
//! the whole design:
//!
//! - **Reset on replace:** a session never displays a result or feedback
//!   that does not correspond to its current image. Loading an image (or
//!   switching model) clears both.
//! - **Epoch discard:** each supersession bumps a monotonic epoch. An
//!   analysis completion only applies if the epoch it captured at start
//!   still matches; a stale completion is dropped silently. There is no
//!   network-level cancellation; the backend call runs to completion and
//!   its result is ignored.

use crate::inference::{InferenceClient, Prediction};
use crate::intake::StationImage;
use chrono::{DateTime, Utc};
use medscan_common::catalog::ModelCatalog;
use medscan_common::events::{EventBus, FeedbackVerdict, SessionPhase, StationEvent};
use medscan_common::records::{Attachment, NewComment};
use medscan_common::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// An accepted prediction for the current image
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// Predicted class label (member of the active model's class list)
    pub prediction: String,
    /// Confidence, 0–100 inclusive
    pub confidence: f64,
    /// When the result was accepted
    pub completed_at: DateTime<Utc>,
}

/// Capture of the session moment an analysis started
///
/// Carries everything the inference call needs plus the epoch used to
/// decide, at completion, whether the result still belongs to the session.
#[derive(Debug)]
pub struct AnalysisTicket {
    pub epoch: u64,
    pub model_key: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What a full analyze action amounted to
#[derive(Debug)]
pub enum AnalyzeDisposition {
    /// Inference succeeded and the result was accepted
    Completed(AnalysisResult),
    /// An analysis was already in flight; no second request was issued
    AlreadyRunning,
    /// The session was superseded mid-flight; the result was discarded
    Superseded,
}

/// Submission form fields, as entered by the user
#[derive(Debug, Clone)]
pub struct SubmissionForm {
    pub name: String,
    pub email: String,
    pub comment: String,
}

/// Image metadata exposed in session snapshots
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub file_name: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: usize,
}

/// Read-only view of the session for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub model: String,
    pub image: Option<ImageInfo>,
    pub result: Option<AnalysisResult>,
    pub feedback: Option<FeedbackVerdict>,
}

struct SessionInner {
    /// Bumped on every supersession (new image, model switch, reset)
    epoch: u64,
    model_key: String,
    image: Option<StationImage>,
    in_flight: bool,
    result: Option<AnalysisResult>,
    feedback: Option<FeedbackVerdict>,
    submitted: bool,
}

impl SessionInner {
    fn phase(&self) -> SessionPhase {
        if self.submitted {
            SessionPhase::Submitted
        } else if self.feedback.is_some() {
            SessionPhase::FeedbackGiven
        } else if self.result.is_some() {
            SessionPhase::ResultReady
        } else if self.in_flight {
            SessionPhase::Analyzing
        } else if self.image.is_some() {
            SessionPhase::ImageLoaded
        } else {
            SessionPhase::Idle
        }
    }

    /// Supersede the session: whatever completion is in the air no longer
    /// belongs to it.
    fn supersede(&mut self) {
        self.epoch += 1;
        self.in_flight = false;
        self.result = None;
        self.feedback = None;
        self.submitted = false;
    }
}

/// The station's one live diagnostic session
pub struct Session {
    catalog: Arc<ModelCatalog>,
    events: EventBus,
    inner: RwLock<SessionInner>,
}

impl Session {
    pub fn new(catalog: Arc<ModelCatalog>, events: EventBus) -> Self {
        let model_key = catalog.default_model().key.clone();
        Self {
            catalog,
            events,
            inner: RwLock::new(SessionInner {
                epoch: 0,
                model_key,
                image: None,
                in_flight: false,
                result: None,
                feedback: None,
                submitted: false,
            }),
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.read().await;
        SessionSnapshot {
            phase: inner.phase(),
            model: inner.model_key.clone(),
            image: inner.image.as_ref().map(|img| ImageInfo {
                file_name: img.file_name.clone(),
                content_type: img.content_type.clone(),
                width: img.width,
                height: img.height,
                size_bytes: img.bytes.len(),
            }),
            result: inner.result.clone(),
            feedback: inner.feedback,
        }
    }

    /// Replace the session image. Always wins: clears any result and
    /// feedback, and supersedes a pending analysis, regardless of phase.
    pub async fn load_image(&self, image: StationImage) -> SessionSnapshot {
        {
            let mut inner = self.inner.write().await;
            inner.supersede();
            info!(file_name = %image.file_name, epoch = inner.epoch, "image loaded");
            inner.image = Some(image);
        }
        self.emit_session_changed().await;
        self.snapshot().await
    }

    /// Switch the active model. A different key supersedes the session the
    /// same way a new image does (the image itself is kept); re-selecting
    /// the current model is a no-op.
    pub async fn select_model(&self, key: &str) -> Result<SessionSnapshot> {
        if self.catalog.get(key).is_none() {
            return Err(Error::NotFound(format!("unknown model: {key}")));
        }
        let changed = {
            let mut inner = self.inner.write().await;
            if inner.model_key == key {
                false
            } else {
                inner.supersede();
                inner.model_key = key.to_string();
                info!(model_key = key, epoch = inner.epoch, "model selected");
                true
            }
        };
        if changed {
            self.emit_session_changed().await;
        }
        Ok(self.snapshot().await)
    }

    /// Clear the session back to Idle
    pub async fn reset(&self) -> SessionSnapshot {
        {
            let mut inner = self.inner.write().await;
            inner.supersede();
            inner.image = None;
            debug!(epoch = inner.epoch, "session reset");
        }
        self.emit_session_changed().await;
        self.snapshot().await
    }

    /// Start an analysis, if one can start
    ///
    /// Returns `Ok(None)` when an analysis is already in flight (the
    /// trigger is a no-op, not an error) and `Err` when no image is loaded.
    pub async fn begin_analysis(&self) -> Result<Option<AnalysisTicket>> {
        let mut inner = self.inner.write().await;
        let Some(image) = &inner.image else {
            return Err(Error::InvalidState(
                "no image loaded; upload an image before analyzing".to_string(),
            ));
        };
        if inner.in_flight {
            debug!("analysis already in flight; ignoring trigger");
            return Ok(None);
        }

        let ticket = AnalysisTicket {
            epoch: inner.epoch,
            model_key: inner.model_key.clone(),
            file_name: image.file_name.clone(),
            content_type: image.content_type.clone(),
            bytes: image.bytes.clone(),
        };
        inner.in_flight = true;
        drop(inner);

        self.emit_session_changed().await;
        Ok(Some(ticket))
    }

    /// Apply an analysis outcome
    ///
    /// A completion whose epoch no longer matches is discarded silently
    /// (`Ok(None)`), leaving the session untouched — this is the expected
    /// fate of a request superseded by a new image or model. A current
    /// completion either installs the result or surfaces the failure and
    /// returns the session to a retryable state.
    pub async fn complete_analysis(
        &self,
        epoch: u64,
        outcome: Result<Prediction>,
    ) -> Result<Option<AnalysisResult>> {
        let mut inner = self.inner.write().await;
        if inner.epoch != epoch {
            debug!(
                stale_epoch = epoch,
                current_epoch = inner.epoch,
                "discarding analysis completion for a superseded session"
            );
            return Ok(None);
        }

        inner.in_flight = false;

        let prediction = match outcome {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "analysis failed; session is retryable");
                drop(inner);
                self.emit_session_changed().await;
                return Err(e);
            }
        };

        // The inference client does no validation against the catalog;
        // the session owns the contract checks.
        let model = self
            .catalog
            .get(&inner.model_key)
            .ok_or_else(|| Error::Internal(format!("active model '{}' missing from catalog", inner.model_key)))?;
        if !model.has_class(&prediction.prediction) {
            let err = Error::Backend(format!(
                "backend predicted '{}', which is not a class of model '{}'",
                prediction.prediction, model.key
            ));
            drop(inner);
            self.emit_session_changed().await;
            return Err(err);
        }
        if !(0.0..=100.0).contains(&prediction.confidence) {
            let err = Error::Backend(format!(
                "backend confidence {} outside the 0-100 domain",
                prediction.confidence
            ));
            drop(inner);
            self.emit_session_changed().await;
            return Err(err);
        }

        let result = AnalysisResult {
            prediction: prediction.prediction,
            confidence: prediction.confidence,
            completed_at: Utc::now(),
        };
        inner.result = Some(result.clone());
        // Result replaced wholesale: any prior verdict no longer applies
        inner.feedback = None;
        let model_key = inner.model_key.clone();
        drop(inner);

        self.events.emit_lossy(StationEvent::AnalysisCompleted {
            model_key,
            prediction: result.prediction.clone(),
            confidence: result.confidence,
            timestamp: result.completed_at,
        });
        self.emit_session_changed().await;

        Ok(Some(result))
    }

    /// Run one full analyze action: guard, call the backend, apply
    pub async fn run_analysis(&self, client: &InferenceClient) -> Result<AnalyzeDisposition> {
        let Some(ticket) = self.begin_analysis().await? else {
            return Ok(AnalyzeDisposition::AlreadyRunning);
        };
        let AnalysisTicket {
            epoch,
            model_key,
            file_name,
            content_type,
            bytes,
        } = ticket;

        let outcome = client
            .analyze(&model_key, &file_name, &content_type, bytes)
            .await;

        match self.complete_analysis(epoch, outcome).await? {
            Some(result) => Ok(AnalyzeDisposition::Completed(result)),
            None => Ok(AnalyzeDisposition::Superseded),
        }
    }

    /// Record the user's verdict on the current result
    ///
    /// Requires a result; re-invoking overwrites the prior verdict.
    pub async fn give_feedback(&self, verdict: FeedbackVerdict) -> Result<SessionSnapshot> {
        {
            let mut inner = self.inner.write().await;
            if inner.result.is_none() {
                return Err(Error::InvalidState(
                    "no analysis result to rate".to_string(),
                ));
            }
            if inner.submitted {
                return Err(Error::InvalidState(
                    "a training record was already submitted for this image".to_string(),
                ));
            }
            inner.feedback = Some(verdict);
        }
        self.emit_session_changed().await;
        Ok(self.snapshot().await)
    }

    /// Compose the training-record candidate for submission
    ///
    /// Only the incorrect branch submits; the session image rides along as
    /// the attachment. Returns the draft plus the epoch to confirm against
    /// once the store accepts it.
    pub async fn compose_submission(&self, form: SubmissionForm) -> Result<(NewComment, u64)> {
        let inner = self.inner.read().await;
        match inner.feedback {
            Some(FeedbackVerdict::Incorrect) => {}
            Some(FeedbackVerdict::Correct) => {
                return Err(Error::InvalidState(
                    "only predictions marked incorrect are sent for training".to_string(),
                ));
            }
            None => {
                return Err(Error::InvalidState(
                    "give feedback before submitting".to_string(),
                ));
            }
        }
        if inner.submitted {
            return Err(Error::InvalidState(
                "a training record was already submitted for this image".to_string(),
            ));
        }
        let image = inner
            .image
            .as_ref()
            .ok_or_else(|| Error::Internal("feedback present without an image".to_string()))?;

        let draft = NewComment {
            name: form.name,
            email: form.email,
            comment: form.comment,
            attachment: Some(Attachment {
                file_name: image.file_name.clone(),
                content_type: image.content_type.clone(),
                bytes: image.bytes.clone(),
            }),
        };
        Ok((draft, inner.epoch))
    }

    /// Mark the session Submitted after the store accepted the record
    ///
    /// A stale epoch means the image changed while the store was writing;
    /// the new session is left alone (the record itself is already durable).
    pub async fn confirm_submission(&self, epoch: u64) {
        let confirmed = {
            let mut inner = self.inner.write().await;
            if inner.epoch == epoch {
                inner.submitted = true;
                true
            } else {
                debug!("submission confirmed for a superseded session; ignoring");
                false
            }
        };
        if confirmed {
            self.emit_session_changed().await;
        }
    }

    async fn emit_session_changed(&self) {
        let phase = self.inner.read().await.phase();
        self.events.emit_lossy(StationEvent::SessionChanged {
            phase,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(Arc::new(ModelCatalog::builtin()), EventBus::new(64))
    }

    fn test_image(name: &str) -> StationImage {
        StationImage {
            file_name: name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![1, 2, 3, 4],
            width: 2,
            height: 2,
            loaded_at: Utc::now(),
        }
    }

    fn glioma_91() -> Result<Prediction> {
        Ok(Prediction {
            prediction: "Glioma".to_string(),
            confidence: 91.0,
        })
    }

    #[tokio::test]
    async fn starts_idle() {
        let snapshot = session().snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert_eq!(snapshot.model, "brain-tumor");
        assert!(snapshot.result.is_none());
    }

    #[tokio::test]
    async fn load_clears_result_and_feedback() {
        let s = session();
        s.load_image(test_image("a.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();
        s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();
        s.give_feedback(FeedbackVerdict::Incorrect).await.unwrap();

        // New image: result and feedback must both be gone
        let snapshot = s.load_image(test_image("b.png")).await;
        assert_eq!(snapshot.phase, SessionPhase::ImageLoaded);
        assert!(snapshot.result.is_none());
        assert!(snapshot.feedback.is_none());
    }

    #[tokio::test]
    async fn successful_analysis_reaches_result_ready() {
        let s = session();
        s.load_image(test_image("scan.png")).await;

        let ticket = s.begin_analysis().await.unwrap().unwrap();
        assert_eq!(s.snapshot().await.phase, SessionPhase::Analyzing);
        assert_eq!(ticket.model_key, "brain-tumor");

        let result = s
            .complete_analysis(ticket.epoch, glioma_91())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.prediction, "Glioma");
        assert_eq!(result.confidence, 91.0);

        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::ResultReady);
        assert_eq!(snapshot.result.unwrap().prediction, "Glioma");
    }

    #[tokio::test]
    async fn second_trigger_while_analyzing_is_a_noop() {
        let s = session();
        s.load_image(test_image("scan.png")).await;

        let first = s.begin_analysis().await.unwrap();
        assert!(first.is_some());
        let second = s.begin_analysis().await.unwrap();
        assert!(second.is_none(), "second trigger must not issue a request");
    }

    #[tokio::test]
    async fn analyze_without_image_is_rejected() {
        let result = session().begin_analysis().await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn stale_completion_is_discarded_silently() {
        let s = session();
        s.load_image(test_image("a.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();

        // Image B arrives before A's response
        s.load_image(test_image("b.png")).await;

        let applied = s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();
        assert!(applied.is_none(), "stale result must be discarded");

        // The displayed state belongs to B: no result, and B is analyzable
        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::ImageLoaded);
        assert!(snapshot.result.is_none());
        assert_eq!(snapshot.image.unwrap().file_name, "b.png");
        assert!(s.begin_analysis().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn model_switch_supersedes_pending_analysis() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();

        s.select_model("stroke").await.unwrap();

        let applied = s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();
        assert!(applied.is_none());
        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.model, "stroke");
        // The image survives a model switch
        assert!(snapshot.image.is_some());
        assert_eq!(snapshot.phase, SessionPhase::ImageLoaded);
    }

    #[tokio::test]
    async fn reselecting_current_model_keeps_result() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();
        s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();

        let snapshot = s.select_model("brain-tumor").await.unwrap();
        assert_eq!(snapshot.phase, SessionPhase::ResultReady);
    }

    #[tokio::test]
    async fn unknown_model_is_not_found() {
        let result = session().select_model("x-ray-vision").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_analysis_returns_to_retryable_state() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();

        let result = s
            .complete_analysis(ticket.epoch, Err(Error::Network("timed out".to_string())))
            .await;
        assert!(matches!(result, Err(Error::Network(_))));

        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.phase, SessionPhase::ImageLoaded);
        assert!(snapshot.result.is_none(), "no partial result on failure");
        // Retry is possible
        assert!(s.begin_analysis().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn label_outside_model_classes_is_a_backend_error() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();

        let outcome = Ok(Prediction {
            prediction: "Ischemia".to_string(), // stroke class, not brain-tumor
            confidence: 88.0,
        });
        let result = s.complete_analysis(ticket.epoch, outcome).await;
        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(s.snapshot().await.phase, SessionPhase::ImageLoaded);
    }

    #[tokio::test]
    async fn confidence_outside_domain_is_a_backend_error() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();

        let outcome = Ok(Prediction {
            prediction: "Glioma".to_string(),
            confidence: 140.0,
        });
        let result = s.complete_analysis(ticket.epoch, outcome).await;
        assert!(matches!(result, Err(Error::Backend(_))));
    }

    #[tokio::test]
    async fn feedback_requires_a_result_and_overwrites() {
        let s = session();
        s.load_image(test_image("scan.png")).await;

        let premature = s.give_feedback(FeedbackVerdict::Correct).await;
        assert!(matches!(premature, Err(Error::InvalidState(_))));

        let ticket = s.begin_analysis().await.unwrap().unwrap();
        s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();

        let snapshot = s.give_feedback(FeedbackVerdict::Correct).await.unwrap();
        assert_eq!(snapshot.feedback, Some(FeedbackVerdict::Correct));

        // Re-invoking overwrites
        let snapshot = s.give_feedback(FeedbackVerdict::Incorrect).await.unwrap();
        assert_eq!(snapshot.feedback, Some(FeedbackVerdict::Incorrect));
        assert_eq!(snapshot.phase, SessionPhase::FeedbackGiven);
    }

    #[tokio::test]
    async fn submission_only_from_incorrect_branch() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();
        s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();

        let form = SubmissionForm {
            name: "Dr. A".to_string(),
            email: "a@b.com".to_string(),
            comment: "wrong class".to_string(),
        };

        // No feedback yet
        assert!(matches!(
            s.compose_submission(form.clone()).await,
            Err(Error::InvalidState(_))
        ));

        // Correct verdict does not submit
        s.give_feedback(FeedbackVerdict::Correct).await.unwrap();
        assert!(matches!(
            s.compose_submission(form.clone()).await,
            Err(Error::InvalidState(_))
        ));

        s.give_feedback(FeedbackVerdict::Incorrect).await.unwrap();
        let (draft, epoch) = s.compose_submission(form).await.unwrap();
        assert_eq!(draft.name, "Dr. A");
        let attachment = draft.attachment.expect("session image rides along");
        assert_eq!(attachment.file_name, "scan.png");

        s.confirm_submission(epoch).await;
        assert_eq!(s.snapshot().await.phase, SessionPhase::Submitted);
    }

    #[tokio::test]
    async fn stale_submission_confirmation_is_ignored() {
        let s = session();
        s.load_image(test_image("a.png")).await;
        let ticket = s.begin_analysis().await.unwrap().unwrap();
        s.complete_analysis(ticket.epoch, glioma_91()).await.unwrap();
        s.give_feedback(FeedbackVerdict::Incorrect).await.unwrap();

        let form = SubmissionForm {
            name: "Dr. A".to_string(),
            email: "a@b.com".to_string(),
            comment: "wrong class".to_string(),
        };
        let (_draft, epoch) = s.compose_submission(form).await.unwrap();

        // Image replaced while the store was writing
        s.load_image(test_image("b.png")).await;
        s.confirm_submission(epoch).await;

        assert_eq!(s.snapshot().await.phase, SessionPhase::ImageLoaded);
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let s = session();
        s.load_image(test_image("scan.png")).await;
        let snapshot = s.reset().await;
        assert_eq!(snapshot.phase, SessionPhase::Idle);
        assert!(snapshot.image.is_none());
    }
}
