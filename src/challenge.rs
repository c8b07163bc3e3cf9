//! Bot-challenge page detection.
//!
//! Providers answer automated traffic with CAPTCHA or "are you human" pages
//! that look like ordinary HTML. Treating such a page as results would show
//! the user garbage, so detection errs on the side of flagging.

/// Phrases that mark a response as an anti-automation challenge.
pub const DEFAULT_SIGNALS: &[&str] = &[
    "captcha",
    "confirm you are human",
    "confirm you're human",
    "please complete the security check",
    "please complete",
    "bot detection",
    "unusual traffic",
    "are you a robot",
    "select all squares",
    "anomaly-modal",
    "/sorry/index",
    "challenge-form",
    "cf-challenge",
];

/// Case-insensitive substring classifier.
#[derive(Debug, Clone)]
pub struct ChallengeDetector {
    signals: Vec<String>,
}

impl ChallengeDetector {
    /// Creates a detector using [`DEFAULT_SIGNALS`].
    pub fn new() -> Self {
        Self {
            signals: DEFAULT_SIGNALS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Adds extra signal phrases.
    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signals
            .extend(phrases.into_iter().map(|p| p.into().to_lowercase()));
        self
    }

    /// Returns true when `body` looks like a challenge page.
    pub fn is_challenge(&self, body: &str) -> bool {
        self.matched_phrase(body).is_some()
    }

    /// Returns the first signal phrase found in `body`.
    pub fn matched_phrase(&self, body: &str) -> Option<&str> {
        let lower = body.to_lowercase();
        self.signals
            .iter()
            .find(|signal| lower.contains(signal.as_str()))
            .map(String::as_str)
    }
}

impl Default for ChallengeDetector {
    fn default() -> Self {
        Self::new()
    }
}
