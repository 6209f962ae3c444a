// Chat delivery: sink abstraction and sequential batch sending.

pub mod discord;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::time::Duration;

use tidewatch_common::notify::{
    fits_message_limit, role_mention, NotificationBatch, MESSAGE_CHAR_LIMIT,
};
use tracing::{info, warn};

use crate::config::DiscordSettings;

pub use discord::DiscordSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    TooLong { chars: usize },
    Transport(String),
    Rejected { status: u16, body: String },
}

impl Display for DeliveryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::TooLong { chars } => {
                write!(f, "message has {chars} characters, limit is {MESSAGE_CHAR_LIMIT}")
            }
            DeliveryError::Transport(message) => write!(f, "chat request failed: {message}"),
            DeliveryError::Rejected { status, body } => {
                write!(f, "chat service rejected message with HTTP {status}: {}", body.trim())
            }
        }
    }
}

impl Error for DeliveryError {}

impl DeliveryError {
    /// Resending the same message cannot succeed: it is over the size
    /// limit, or the service refused it with a client error other than
    /// rate limiting.
    pub fn is_permanent(&self) -> bool {
        match self {
            DeliveryError::TooLong { .. } => true,
            DeliveryError::Rejected { status, .. } => (400..500).contains(status) && *status != 429,
            DeliveryError::Transport(_) => false,
        }
    }
}

/// Destination for formatted notifications.
pub trait ChatSink: Send + Sync {
    fn send(
        &self,
        channel_id: u64,
        text: &str,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// Where a cycle's notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyTarget {
    pub channel_id: u64,
    pub role_id: Option<u64>,
}

impl NotifyTarget {
    /// Role mention placed on the first message of a reporting cycle.
    pub fn header(&self) -> Option<String> {
        self.role_id.map(role_mention)
    }
}

impl From<&DiscordSettings> for NotifyTarget {
    fn from(settings: &DiscordSettings) -> Self {
        Self { channel_id: settings.channel_id_to_ping, role_id: settings.role_id_to_ping }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Sent,
    /// Failed in a way a resend cannot fix. Logged and given up on.
    Dropped,
    /// Failed, but may go through next time.
    Failed,
}

/// Per-message outcomes, in send order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl DeliveryReport {
    pub fn sent(&self) -> usize {
        self.count(BatchOutcome::Sent)
    }

    pub fn dropped(&self) -> usize {
        self.count(BatchOutcome::Dropped)
    }

    pub fn failed(&self) -> usize {
        self.count(BatchOutcome::Failed)
    }

    /// Nothing is worth sending again.
    pub fn all_delivered(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, outcome: BatchOutcome) -> usize {
        self.outcomes.iter().filter(|o| **o == outcome).count()
    }
}

/// Send `batches` in order, pausing `delay` between consecutive messages.
///
/// A failed message is logged and recorded; later messages are still sent.
pub async fn deliver<'a, S, I>(
    sink: &S,
    channel_id: u64,
    batches: I,
    delay: Duration,
) -> DeliveryReport
where
    S: ChatSink,
    I: IntoIterator<Item = &'a NotificationBatch>,
{
    let mut report = DeliveryReport::default();

    for (index, batch) in batches.into_iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = if fits_message_limit(&batch.text) {
            sink.send(channel_id, &batch.text).await
        } else {
            Err(DeliveryError::TooLong { chars: batch.text.chars().count() })
        };

        let outcome = match result {
            Ok(()) => BatchOutcome::Sent,
            Err(error) if error.is_permanent() => {
                warn!(channel_id, batch = index, %error, "notification rejected, not retrying");
                BatchOutcome::Dropped
            }
            Err(error) => {
                warn!(channel_id, batch = index, %error, "failed to deliver notification");
                BatchOutcome::Failed
            }
        };
        report.outcomes.push(outcome);
    }

    if !report.outcomes.is_empty() {
        info!(
            channel_id,
            sent = report.sent(),
            dropped = report.dropped(),
            failed = report.failed(),
            "notifications delivered"
        );
    }
    report
}
