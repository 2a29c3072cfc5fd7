//! System clipboard access with bounded retries.
//!
//! Platform clipboards fail transiently (another process holding the
//! selection, no display server at all). Reads and writes retry a few
//! times with a short backoff; a write always lands in the in-process
//! mirror first, so yank/paste keep working even when the platform
//! clipboard is gone for good.

use std::thread;
use std::time::Duration;

const ATTEMPTS: u32 = 3;
const BACKOFF: Duration = Duration::from_millis(30);

pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
    /// Last text written by us; the fallback when the platform fails.
    mirror: String,
}

impl SystemClipboard {
    pub fn new() -> Self {
        let inner = match arboard::Clipboard::new() {
            Ok(c) => Some(c),
            Err(err) => {
                log::warn!("system clipboard unavailable: {err}");
                None
            }
        };
        Self {
            inner,
            mirror: String::new(),
        }
    }

    pub fn get(&mut self) -> String {
        if let Some(clipboard) = self.inner.as_mut() {
            for attempt in 0..ATTEMPTS {
                match clipboard.get_text() {
                    Ok(text) => return text,
                    Err(arboard::Error::ContentNotAvailable) => return String::new(),
                    Err(err) => {
                        log::debug!("clipboard read attempt {attempt} failed: {err}");
                        thread::sleep(BACKOFF);
                    }
                }
            }
            log::warn!("clipboard read failed after {ATTEMPTS} attempts");
        }
        self.mirror.clone()
    }

    pub fn set(&mut self, text: &str) {
        self.mirror = text.to_string();
        if let Some(clipboard) = self.inner.as_mut() {
            for attempt in 0..ATTEMPTS {
                match clipboard.set_text(text.to_string()) {
                    Ok(()) => return,
                    Err(err) => {
                        log::debug!("clipboard write attempt {attempt} failed: {err}");
                        thread::sleep(BACKOFF);
                    }
                }
            }
            log::warn!("clipboard write failed after {ATTEMPTS} attempts");
        }
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_round_trip_without_platform() {
        // Force the degraded path regardless of the test environment.
        let mut clip = SystemClipboard {
            inner: None,
            mirror: String::new(),
        };
        assert_eq!(clip.get(), "");
        clip.set("yanked text");
        assert_eq!(clip.get(), "yanked text");
    }
}
