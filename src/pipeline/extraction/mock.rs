use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::types::{ExtractionRequest, ServiceReply, TextService, TokenUsage};
use super::ExtractionError;

/// Mock text service for testing: returns a configurable response.
pub struct MockTextService {
    outcome: Result<String, ExtractionError>,
    usage: Option<TokenUsage>,
    delay: Option<Duration>,
    call_count: AtomicUsize,
}

impl MockTextService {
    pub fn new(response: &str) -> Self {
        Self {
            outcome: Ok(response.to_string()),
            usage: None,
            delay: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Every call fails with `error`.
    pub fn failing(error: ExtractionError) -> Self {
        Self {
            outcome: Err(error),
            ..Self::new("")
        }
    }

    /// Sleep before answering, to exercise timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl TextService for MockTextService {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(&self, _request: &ExtractionRequest) -> Result<ServiceReply, ExtractionError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.outcome.clone().map(|text| ServiceReply {
            text,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ExtractionRequest {
        ExtractionRequest {
            patient_id: 1,
            narrative: "n".into(),
            system_prompt: "s".into(),
            user_prompt: "u".into(),
        }
    }

    #[test]
    fn mock_returns_configured_response() {
        let service = MockTextService::new("{\"pid\": 1}").with_usage(TokenUsage {
            prompt_tokens: 5,
            completion_tokens: 5,
            total_tokens: 10,
        });
        let reply = service.complete(&request()).unwrap();
        assert_eq!(reply.text, "{\"pid\": 1}");
        assert_eq!(reply.usage.unwrap().total_tokens, 10);
        assert_eq!(service.calls(), 1);
    }

    #[test]
    fn failing_mock_returns_error_every_call() {
        let service = MockTextService::failing(ExtractionError::unavailable("down", true));
        assert!(service.complete(&request()).is_err());
        assert!(service.complete(&request()).is_err());
        assert_eq!(service.calls(), 2);
    }
}
