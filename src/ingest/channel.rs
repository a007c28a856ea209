//! Job channel
//!
//! Connection to the service that runs auto-annotation jobs.

use async_trait::async_trait;
use futures::stream::BoxStream;
use uuid::Uuid;

use super::types::IngestError;

/// Close code of an orderly channel shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Something received on a job channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A raw JSON message
    Frame(String),
    /// The connection closed
    Closed { code: u16, reason: String },
}

/// Job channel trait
#[async_trait]
pub trait JobChannel: Send + Sync {
    /// Start a job for `prompt` and return the stream of its messages
    async fn open(&self, job_id: Uuid, prompt: &str) -> Result<BoxStream<'static, ChannelEvent>, IngestError>;
}
