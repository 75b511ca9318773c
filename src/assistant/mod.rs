//! Requests to an external assistant, answered through the signal bus.
//!
//! A request is sent through an [`AssistantTransport`]; the answer arrives
//! later as a [`Signal`](crate::waiter::Signal) carrying that request's id
//! (`<marker>-<n>`). Each request waits on its own [`Waiter`] for exactly
//! that id, so a late reply to an earlier request is never taken as the
//! answer to a newer one.

pub mod prompt;
pub mod subprocess;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::change::{ChangeRecord, changes_summary};
use crate::error::{AssistantError, WaiterError};
use crate::waiter::{SignalBus, Waiter};

pub use prompt::{build_analysis_prompt, build_commit_message_prompt};
pub use subprocess::CommandTransport;

/// Default marker identifying assistant responses on the bus.
pub const DEFAULT_RESPONSE_MARKER: &str = "assistant-response";

/// What the assistant is being asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantRequest {
    /// Write a commit message for the summarized changes.
    CommitMessage { summary: String },
    /// Review the structure of a file.
    Analysis { file_name: String, content: String },
}

impl AssistantRequest {
    pub fn prompt(&self) -> String {
        match self {
            AssistantRequest::CommitMessage { summary } => build_commit_message_prompt(summary),
            AssistantRequest::Analysis { file_name, content } => {
                build_analysis_prompt(file_name, content)
            }
        }
    }
}

/// Dispatches requests to the assistant.
///
/// Responses are not returned here; they arrive on the signal bus as a
/// signal whose id is `request_id`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssistantTransport: Send + Sync {
    async fn send(&self, request_id: String, request: AssistantRequest)
    -> Result<(), AssistantError>;
}

/// How long each kind of request may wait for its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub analysis: Duration,
    pub commit_message: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            analysis: Duration::from_secs(30),
            commit_message: Duration::from_secs(5),
        }
    }
}

/// Client pairing a transport with the bus its responses arrive on.
#[derive(Clone)]
pub struct Assistant {
    transport: Arc<dyn AssistantTransport>,
    bus: SignalBus,
    marker: String,
    timeouts: RequestTimeouts,
    next_id: Arc<AtomicU64>,
}

impl Assistant {
    pub fn new(
        transport: Arc<dyn AssistantTransport>,
        bus: SignalBus,
        marker: impl Into<String>,
        timeouts: RequestTimeouts,
    ) -> Self {
        Self {
            transport,
            bus,
            marker: marker.into(),
            timeouts,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_request_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.marker, n)
    }

    /// Ask for a commit message describing `records`.
    pub async fn request_commit_message(
        &self,
        records: &[ChangeRecord],
    ) -> Result<String, WaiterError> {
        let request = AssistantRequest::CommitMessage {
            summary: changes_summary(records),
        };
        let message = self.request(request, self.timeouts.commit_message).await?;
        Ok(message.trim().to_string())
    }

    /// Ask for a structural analysis of a file's content.
    pub async fn analyze(&self, file_name: &str, content: &str) -> Result<String, WaiterError> {
        debug!("Requesting analysis of {} ({} chars)", file_name, content.len());
        let request = AssistantRequest::Analysis {
            file_name: file_name.to_string(),
            content: content.to_string(),
        };
        self.request(request, self.timeouts.analysis).await
    }

    async fn request(
        &self,
        request: AssistantRequest,
        timeout: Duration,
    ) -> Result<String, WaiterError> {
        let id = self.next_request_id();
        // Subscribe before sending so a fast response cannot be missed.
        let mut waiter = Waiter::for_id(&self.bus, id.clone(), timeout);

        if let Err(e) = self.transport.send(id, request).await {
            warn!("Assistant request failed to send: {}", e);
            waiter.cancel();
            return Err(WaiterError::Transport(e.to_string()));
        }

        waiter.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waiter::Signal;

    fn assistant_with(mock: MockAssistantTransport, bus: &SignalBus) -> Assistant {
        Assistant::new(
            Arc::new(mock),
            bus.clone(),
            DEFAULT_RESPONSE_MARKER,
            RequestTimeouts::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_message_round_trip() {
        let bus = SignalBus::default();
        let responder = bus.clone();

        let mut mock = MockAssistantTransport::new();
        mock.expect_send()
            .withf(|id, req| {
                id == "assistant-response-1"
                    && matches!(req, AssistantRequest::CommitMessage { summary } if summary == "add: src/a.rs")
            })
            .times(1)
            .returning(move |id, _| {
                responder.publish(Signal::new(id, "  feat: add a\n"));
                Ok(())
            });

        let assistant = assistant_with(mock, &bus);
        let message = assistant
            .request_commit_message(&[ChangeRecord::added("src/a.rs")])
            .await;

        assert_eq!(message, Ok("feat: add a".to_string()));
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_failure_is_transport_error() {
        let bus = SignalBus::default();
        let mut mock = MockAssistantTransport::new();
        mock.expect_send()
            .returning(|_, _| Err(AssistantError::SendFailed("offline".to_string())));

        let assistant = assistant_with(mock, &bus);
        let result = assistant.request_commit_message(&[]).await;

        assert!(matches!(result, Err(WaiterError::Transport(msg)) if msg.contains("offline")));
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_assistant_times_out_with_profile() {
        let bus = SignalBus::default();
        let mut mock = MockAssistantTransport::new();
        mock.expect_send().returning(|_, _| Ok(()));

        let assistant = assistant_with(mock, &bus);

        let start = tokio::time::Instant::now();
        let result = assistant.analyze("big.rs", "fn main() {}").await;
        assert_eq!(result, Err(WaiterError::Timeout(Duration::from_secs(30))));
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        let start = tokio::time::Instant::now();
        let result = assistant.request_commit_message(&[]).await;
        assert_eq!(result, Err(WaiterError::Timeout(Duration::from_secs(5))));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_request_gets_a_fresh_id() {
        let bus = SignalBus::default();
        let responder = bus.clone();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorded = seen.clone();

        let mut mock = MockAssistantTransport::new();
        mock.expect_send().times(2).returning(move |id, _| {
            recorded.lock().unwrap().push(id.clone());
            responder.publish(Signal::new(id, "ok"));
            Ok(())
        });

        let assistant = assistant_with(mock, &bus);
        let clone = assistant.clone();
        assert_eq!(assistant.analyze("a.rs", "").await, Ok("ok".to_string()));
        assert_eq!(clone.analyze("b.rs", "").await, Ok("ok".to_string()));

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["assistant-response-1", "assistant-response-2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_not_taken_by_next_request() {
        let bus = SignalBus::default();
        let responder = bus.clone();

        // first.rs is answered after 40s, anything else after 20s.
        let mut mock = MockAssistantTransport::new();
        mock.expect_send().times(2).returning(move |id, request| {
            let AssistantRequest::Analysis { file_name, .. } = request else {
                return Ok(());
            };
            let delay = if file_name == "first.rs" { 40 } else { 20 };
            let bus = responder.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(delay)).await;
                bus.publish(Signal::new(id, format!("review of {file_name}")));
            });
            Ok(())
        });

        let assistant = assistant_with(mock, &bus);

        let first = assistant.analyze("first.rs", "").await;
        assert_eq!(first, Err(WaiterError::Timeout(Duration::from_secs(30))));

        // The reply to first.rs lands 10s into this wait, before its own.
        let start = tokio::time::Instant::now();
        let second = assistant.analyze("second.rs", "").await;
        assert_eq!(second, Ok("review of second.rs".to_string()));
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[test]
    fn test_request_prompt_dispatch() {
        let commit = AssistantRequest::CommitMessage {
            summary: "delete: old.rs".to_string(),
        };
        assert!(commit.prompt().contains("delete: old.rs"));

        let analysis = AssistantRequest::Analysis {
            file_name: "big.rs".to_string(),
            content: "struct Big;".to_string(),
        };
        assert!(analysis.prompt().contains("struct Big;"));
    }
}
