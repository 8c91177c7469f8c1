//! Input backend trait

use anyhow::Result;

use super::EventSender;

/// A source of desk events
pub trait InputBackend: Send {
    /// Start delivering events to `tx`. Returns once the backend is running;
    /// delivery continues in the background until the backend is dropped or
    /// the channel closes.
    fn start(&mut self, tx: EventSender) -> Result<()>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}
