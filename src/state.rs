use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::clipboard::ClipboardSink;
use crate::llm::{load_image, Analyzer, IntakeError};
use crate::session::{Session, Slot};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session>>,
    pub analyzer: Arc<dyn Analyzer>,
    pub clipboard: Arc<dyn ClipboardSink>,
    pub copy_ack: Duration,
}

impl AppState {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        clipboard: Arc<dyn ClipboardSink>,
        error_message: &str,
        copy_ack: Duration,
    ) -> Self {
        AppState {
            session: Arc::new(Mutex::new(Session::new(error_message))),
            analyzer,
            clipboard,
            copy_ack,
        }
    }

    /// Intake failures are logged and otherwise ignored.
    pub fn load_into_slot(
        &self,
        slot: Slot,
        bytes: &[u8],
        declared_media_type: Option<&str>,
    ) {
        match load_image(bytes, declared_media_type) {
            Ok(image) => {
                self.session.lock().set_image(slot, image);
            }
            Err(IntakeError::Empty) => {
                debug!("Ignoring empty {} upload", slot.label());
            }
            Err(err) => {
                warn!("Ignoring {} upload: {}", slot.label(), err);
            }
        }
    }

    /// Moves the session to Loading and runs the one analysis call on a
    /// background task. `None` when the session wasn't eligible.
    pub fn start_analysis(&self) -> Option<tokio::task::JoinHandle<()>> {
        let request = self.session.lock().begin_analysis()?;

        let session = Arc::clone(&self.session);
        let analyzer = Arc::clone(&self.analyzer);
        Some(tokio::spawn(async move {
            let outcome = analyzer.analyze(&request).await;
            if let Err(err) = &outcome {
                error!("Photo analysis failed: {err}");
            }
            session.lock().complete(outcome);
        }))
    }

    /// Copies the generated prompt and raises the acknowledgment flag, which
    /// drops again after `copy_ack`. The clipboard write runs on the blocking
    /// pool since arboard may wait on the display server.
    pub async fn copy_prompt(&self) -> bool {
        let prompt = match self.session.lock().copyable_prompt() {
            Some(prompt) => prompt.to_string(),
            None => {
                debug!("Nothing to copy");
                return false;
            }
        };

        let clipboard = Arc::clone(&self.clipboard);
        let text = prompt.clone();
        let outcome = tokio::task::spawn_blocking(move || clipboard.set_text(&text)).await;
        let written = match outcome {
            Ok(written) => written,
            Err(err) => {
                error!("Clipboard task failed: {err}");
                return false;
            }
        };
        if let Err(err) = written {
            warn!("Copy to clipboard failed: {err}");
            return false;
        }

        let Some(generation) = self.session.lock().mark_prompt_copied(&prompt) else {
            debug!("Session moved on while copying; not acknowledging");
            return false;
        };
        info!("Copied generation prompt to clipboard");

        let session = Arc::clone(&self.session);
        let delay = self.copy_ack;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.lock().clear_prompt_copied(generation);
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::testing::RecordingClipboard;
    use crate::llm::types::{sample_result, AnalysisResult};
    use crate::llm::{AnalysisError, AnalysisRequest};
    use crate::session::SessionState;
    use async_trait::async_trait;
    use tokio::sync::oneshot;

    const MESSAGE: &str = "fixed failure message";

    /// Holds the analysis until the test releases it.
    struct GatedAnalyzer {
        gate: Mutex<Option<oneshot::Receiver<Result<AnalysisResult, AnalysisError>>>>,
        requests: Mutex<Vec<AnalysisRequest>>,
    }

    impl GatedAnalyzer {
        fn new() -> (Arc<Self>, oneshot::Sender<Result<AnalysisResult, AnalysisError>>) {
            let (tx, rx) = oneshot::channel();
            let analyzer = Arc::new(GatedAnalyzer {
                gate: Mutex::new(Some(rx)),
                requests: Mutex::new(Vec::new()),
            });
            (analyzer, tx)
        }
    }

    #[async_trait]
    impl Analyzer for GatedAnalyzer {
        async fn analyze(
            &self,
            request: &AnalysisRequest,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.requests.lock().push(request.clone());
            let gate = self.gate.lock().take();
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(AnalysisError::Transport("gate dropped".to_string()))),
                None => Err(AnalysisError::Transport("called twice".to_string())),
            }
        }
    }

    fn app(analyzer: Arc<dyn Analyzer>, clipboard: Arc<dyn ClipboardSink>) -> AppState {
        AppState::new(analyzer, clipboard, MESSAGE, Duration::from_millis(2000))
    }

    fn status(state: &AppState) -> &'static str {
        state.session.lock().state().name()
    }

    #[tokio::test]
    async fn analysis_goes_through_loading_to_success() {
        let (analyzer, release) = GatedAnalyzer::new();
        let state = app(analyzer.clone(), Arc::new(RecordingClipboard::default()));
        state.load_into_slot(Slot::Primary, b"bw", Some("image/png"));

        let task = state.start_analysis().expect("analysis should start");
        assert_eq!(status(&state), "loading");
        assert!(state.start_analysis().is_none());

        release.send(Ok(sample_result())).unwrap();
        task.await.unwrap();

        assert_eq!(
            state.session.lock().state(),
            &SessionState::Success(sample_result())
        );
        let requests = analyzer.requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].reference.is_none());
    }

    #[tokio::test]
    async fn analysis_failure_shows_the_fixed_message() {
        let (analyzer, release) = GatedAnalyzer::new();
        let state = app(analyzer, Arc::new(RecordingClipboard::default()));
        state.load_into_slot(Slot::Primary, b"bw", Some("image/png"));
        state.load_into_slot(Slot::Reference, b"ref", Some("image/jpeg"));

        let task = state.start_analysis().unwrap();
        release
            .send(Err(AnalysisError::Transport("connection refused".to_string())))
            .unwrap();
        task.await.unwrap();

        assert_eq!(
            state.session.lock().state(),
            &SessionState::Error(MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn analysis_without_primary_stays_idle() {
        let (analyzer, _release) = GatedAnalyzer::new();
        let state = app(analyzer.clone(), Arc::new(RecordingClipboard::default()));

        assert!(state.start_analysis().is_none());
        assert_eq!(status(&state), "idle");
        assert!(analyzer.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_ignored() {
        let (analyzer, _release) = GatedAnalyzer::new();
        let state = app(analyzer, Arc::new(RecordingClipboard::default()));
        state.load_into_slot(Slot::Primary, b"", Some("image/png"));

        assert!(state.session.lock().image(Slot::Primary).is_none());
        assert_eq!(status(&state), "idle");
    }

    async fn succeeded_state(clipboard: Arc<dyn ClipboardSink>) -> AppState {
        let (analyzer, release) = GatedAnalyzer::new();
        let state = app(analyzer, clipboard);
        state.load_into_slot(Slot::Primary, b"bw", Some("image/png"));
        let task = state.start_analysis().unwrap();
        release.send(Ok(sample_result())).unwrap();
        task.await.unwrap();
        state
    }

    #[tokio::test(start_paused = true)]
    async fn copy_places_prompt_on_clipboard_and_ack_expires() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let state = succeeded_state(clipboard.clone()).await;

        assert!(state.copy_prompt().await);
        assert_eq!(clipboard.contents(), vec![sample_result().imagen_prompt]);
        assert!(state.session.lock().prompt_copied());

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(state.session.lock().prompt_copied());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!state.session.lock().prompt_copied());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_copy_extends_the_acknowledgment() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let state = succeeded_state(clipboard.clone()).await;

        state.copy_prompt().await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        state.copy_prompt().await;
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(state.session.lock().prompt_copied());

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert!(!state.session.lock().prompt_copied());
        assert_eq!(clipboard.contents().len(), 2);
    }

    #[tokio::test]
    async fn clipboard_failure_leaves_flag_unset() {
        let state = succeeded_state(Arc::new(RecordingClipboard::failing())).await;
        assert!(!state.copy_prompt().await);
        assert!(!state.session.lock().prompt_copied());
    }

    #[tokio::test]
    async fn copy_without_result_is_a_noop() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let (analyzer, _release) = GatedAnalyzer::new();
        let state = app(analyzer, clipboard.clone());

        assert!(!state.copy_prompt().await);
        assert!(clipboard.contents().is_empty());
    }

    #[tokio::test]
    async fn reset_during_copy_does_not_leave_the_flag_raised() {
        let clipboard = Arc::new(RecordingClipboard::default());
        let state = succeeded_state(clipboard.clone()).await;
        let prompt = state.session.lock().copyable_prompt().unwrap().to_string();

        state.session.lock().reset();
        assert_eq!(state.session.lock().mark_prompt_copied(&prompt), None);
        assert!(!state.session.lock().prompt_copied());
        assert!(!state.copy_prompt().await);
    }
}
