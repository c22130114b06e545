//! Clipboard polling. Emits text only when it differs from what was seen last.

/// Tracks the last clipboard text so repeated polls of the same content stay silent.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<String>,
}

impl ChangeDetector {
    /// A detector that treats `initial` as already seen.
    pub fn primed(initial: Option<String>) -> Self {
        Self { last: initial }
    }

    /// Returns the text when it is new and not blank.
    pub fn observe(&mut self, text: &str) -> Option<String> {
        if self.last.as_deref() == Some(text) {
            return None;
        }
        self.last = Some(text.to_string());
        if text.trim().is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

#[cfg(feature = "clipboard")]
pub use watcher::ClipboardWatcher;

#[cfg(feature = "clipboard")]
mod watcher {
    use std::{io, thread, time::Duration};

    use arboard::Clipboard;
    use tokio::sync::mpsc;
    use tracing::{debug, info, warn};

    use super::ChangeDetector;

    pub struct ClipboardWatcher {
        interval: Duration,
    }

    impl ClipboardWatcher {
        pub fn new(interval: Duration) -> Self {
            Self { interval }
        }

        /// Polls on a dedicated thread until the receiving side is dropped.
        /// Whatever is on the clipboard at start-up is ignored.
        pub fn spawn(self, sender: mpsc::Sender<String>) -> io::Result<thread::JoinHandle<()>> {
            thread::Builder::new()
                .name("clipboard-poll".into())
                .spawn(move || self.poll(sender))
        }

        fn poll(self, sender: mpsc::Sender<String>) {
            let mut clipboard = match Clipboard::new() {
                Ok(clipboard) => clipboard,
                Err(err) => {
                    warn!(%err, "clipboard unavailable");
                    return;
                }
            };
            let mut detector = ChangeDetector::primed(clipboard.get_text().ok());
            info!(interval_ms = self.interval.as_millis() as u64, "watching clipboard");

            loop {
                thread::sleep(self.interval);
                let text = match clipboard.get_text() {
                    Ok(text) => text,
                    // Images and empty clipboards land here.
                    Err(err) => {
                        debug!(%err, "no clipboard text");
                        continue;
                    }
                };
                if let Some(text) = detector.observe(&text) {
                    if sender.blocking_send(text).is_err() {
                        debug!("clipboard receiver closed");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_content_is_ignored() {
        let mut detector = ChangeDetector::primed(Some("Gravid Core 1".into()));
        assert_eq!(detector.observe("Gravid Core 1"), None);
        assert_eq!(
            detector.observe("Gravid Core 2").as_deref(),
            Some("Gravid Core 2")
        );
    }

    #[test]
    fn repeats_and_blank_text_are_silent() {
        let mut detector = ChangeDetector::default();
        assert!(detector.observe("Tripped Data 3").is_some());
        assert!(detector.observe("Tripped Data 3").is_none());
        assert!(detector.observe("   \n").is_none());
        // Copying the same loot again after something else is a new event.
        assert!(detector.observe("Tripped Data 3").is_some());
    }
}
