//! Pending input buffer shared by typing and voice capture

use tokio::sync::watch;

/// Placeholder shown while a capture session is listening
pub const LISTENING_PLACEHOLDER: &str = "Listening...";

/// The not-yet-submitted input line
///
/// Cloneable handle; every clone writes the same buffer and observers see
/// changes through [`InputDraft::subscribe`].
#[derive(Debug, Clone)]
pub struct InputDraft {
    tx: watch::Sender<String>,
}

impl Default for InputDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl InputDraft {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(String::new());
        Self { tx }
    }

    /// Replace the buffer
    pub fn set(&self, text: impl Into<String>) {
        let text = text.into();
        self.tx.send_replace(text);
    }

    /// Empty the buffer
    pub fn clear(&self) {
        self.tx.send_replace(String::new());
    }

    /// Current contents
    #[must_use]
    pub fn get(&self) -> String {
        self.tx.borrow().clone()
    }

    /// Watch for changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_buffer() {
        let draft = InputDraft::new();
        let other = draft.clone();
        draft.set(LISTENING_PLACEHOLDER);
        assert_eq!(other.get(), "Listening...");
        other.clear();
        assert_eq!(draft.get(), "");
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let draft = InputDraft::new();
        let mut rx = draft.subscribe();
        draft.set("what is the mean?");
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), "what is the mean?");
    }
}
