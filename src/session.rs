use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::media::{EncodedImage, ImageSummary};
use crate::llm::{AnalysisError, AnalysisRequest, AnalysisResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Reference,
}

impl Slot {
    pub fn label(self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Reference => "reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Success(AnalysisResult),
    Error(String),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Success(_) => "success",
            SessionState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: &'static str,
    pub result: Option<AnalysisResult>,
    pub error: Option<String>,
    pub primary: Option<ImageSummary>,
    pub reference: Option<ImageSummary>,
    pub prompt_copied: bool,
}

/// The single UI session: two image slots, the analysis state and the
/// copy acknowledgment. Every mutation goes through a method that checks the
/// current state, so an out-of-order event is a no-op rather than a bad state.
#[derive(Debug)]
pub struct Session {
    primary: Option<EncodedImage>,
    reference: Option<EncodedImage>,
    state: SessionState,
    error_message: String,
    prompt_copied: bool,
    copy_generation: u64,
}

impl Session {
    pub fn new(error_message: impl Into<String>) -> Self {
        Session {
            primary: None,
            reference: None,
            state: SessionState::Idle,
            error_message: error_message.into(),
            prompt_copied: false,
            copy_generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn image(&self, slot: Slot) -> Option<&EncodedImage> {
        match slot {
            Slot::Primary => self.primary.as_ref(),
            Slot::Reference => self.reference.as_ref(),
        }
    }

    pub fn prompt_copied(&self) -> bool {
        self.prompt_copied
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<EncodedImage> {
        match slot {
            Slot::Primary => &mut self.primary,
            Slot::Reference => &mut self.reference,
        }
    }

    pub fn set_image(&mut self, slot: Slot, image: EncodedImage) -> bool {
        if !matches!(self.state, SessionState::Idle) {
            debug!(
                "Ignoring {} image while session is {}",
                slot.label(),
                self.state.name()
            );
            return false;
        }
        info!(
            "Loaded {} image ({}, {} bytes)",
            slot.label(),
            image.media_type,
            image.byte_len
        );
        *self.slot_mut(slot) = Some(image);
        true
    }

    pub fn clear_image(&mut self, slot: Slot) -> bool {
        if !matches!(self.state, SessionState::Idle) {
            return false;
        }
        self.slot_mut(slot).take().is_some()
    }

    /// Idle with a primary image moves to Loading and hands back the request
    /// to send. Anything else leaves the session untouched.
    pub fn begin_analysis(&mut self) -> Option<AnalysisRequest> {
        if !matches!(self.state, SessionState::Idle) {
            debug!("Analysis requested while session is {}", self.state.name());
            return None;
        }
        let primary = self.primary.clone()?;
        let request = AnalysisRequest::new(primary, self.reference.clone());
        self.state = SessionState::Loading;
        info!("Session idle -> loading (images={})", request.image_count());
        Some(request)
    }

    pub fn complete(&mut self, outcome: Result<AnalysisResult, AnalysisError>) -> bool {
        if !matches!(self.state, SessionState::Loading) {
            warn!("Dropping analysis outcome; session is {}", self.state.name());
            return false;
        }
        self.state = match outcome {
            Ok(result) => {
                info!("Session loading -> success");
                SessionState::Success(result)
            }
            Err(err) => {
                warn!("Session loading -> error: {}", err);
                SessionState::Error(self.error_message.clone())
            }
        };
        true
    }

    /// New analysis after a result. Loading can't be interrupted.
    pub fn reset(&mut self) -> bool {
        self.return_to_idle("reset")
    }

    /// Start over after a failed analysis. Clears the slots just like reset.
    pub fn retry(&mut self) -> bool {
        self.return_to_idle("retry")
    }

    fn return_to_idle(&mut self, action: &str) -> bool {
        if matches!(self.state, SessionState::Loading) {
            debug!("Ignoring {} while analysis is in flight", action);
            return false;
        }
        info!("Session {} -> idle ({})", self.state.name(), action);
        self.primary = None;
        self.reference = None;
        self.state = SessionState::Idle;
        self.prompt_copied = false;
        self.copy_generation += 1;
        true
    }

    pub fn copyable_prompt(&self) -> Option<&str> {
        match &self.state {
            SessionState::Success(result) if !result.imagen_prompt.is_empty() => {
                Some(result.imagen_prompt.as_str())
            }
            _ => None,
        }
    }

    /// Sets the acknowledgment and returns a token for clearing it later.
    /// `None` if the session no longer shows the prompt that was copied.
    pub fn mark_prompt_copied(&mut self, prompt: &str) -> Option<u64> {
        if self.copyable_prompt() != Some(prompt) {
            return None;
        }
        self.copy_generation += 1;
        self.prompt_copied = true;
        Some(self.copy_generation)
    }

    /// Only the most recent copy may clear the flag.
    pub fn clear_prompt_copied(&mut self, generation: u64) -> bool {
        if generation != self.copy_generation || !self.prompt_copied {
            return false;
        }
        self.prompt_copied = false;
        true
    }

    pub fn view(&self) -> SessionView {
        let (result, error) = match &self.state {
            SessionState::Success(result) => (Some(result.clone()), None),
            SessionState::Error(message) => (None, Some(message.clone())),
            SessionState::Idle | SessionState::Loading => (None, None),
        };
        SessionView {
            status: self.state.name(),
            result,
            error,
            primary: self.primary.as_ref().map(EncodedImage::summary),
            reference: self.reference.as_ref().map(EncodedImage::summary),
            prompt_copied: self.prompt_copied,
        }
    }
}
