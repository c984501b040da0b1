use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("failed to write clipboard: {0}")]
    Write(String),
}

/// Destination for the copy-prompt action.
pub trait ClipboardSink: Send + Sync {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard of the machine running the server. The UI is served
/// on a local address, so this is the user's clipboard.
///
/// The arboard handle is opened on first use and then kept for the life of
/// the process. On X11 the copied text only survives while a handle exists.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        SystemClipboard::default()
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            let opened = arboard::Clipboard::new()
                .map_err(|err| ClipboardError::Unavailable(err.to_string()))?;
            *handle = Some(opened);
        }
        let Some(clipboard) = handle.as_mut() else {
            return Err(ClipboardError::Unavailable("no clipboard handle".to_string()));
        };
        if let Err(err) = clipboard.set_text(text.to_string()) {
            // Reopen on the next copy in case the display connection went away.
            *handle = None;
            return Err(ClipboardError::Write(err.to_string()));
        }
        debug!("Copied {} characters to the system clipboard", text.chars().count());
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use parking_lot::Mutex;

    use super::{ClipboardError, ClipboardSink};

    #[derive(Debug, Default)]
    pub struct RecordingClipboard {
        pub writes: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingClipboard {
        pub fn failing() -> Self {
            RecordingClipboard {
                writes: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn contents(&self) -> Vec<String> {
            self.writes.lock().clone()
        }
    }

    impl ClipboardSink for RecordingClipboard {
        fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
            if self.fail {
                return Err(ClipboardError::Unavailable("no display".to_string()));
            }
            self.writes.lock().push(text.to_string());
            Ok(())
        }
    }
}
