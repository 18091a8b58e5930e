pub mod telegram;

use crate::error::SignalError;

pub use telegram::TelegramNotifier;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn sink_name(&self) -> &'static str;

    /// Largest payload, in characters, a single [`send`](Notifier::send) accepts.
    fn max_message_chars(&self) -> usize;

    async fn send(&self, message: &str) -> Result<(), SignalError>;
}
