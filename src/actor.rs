//! Actors own a piece of state and react to events sent over a channel.
//!
//! Every event travels with the tracing span that was current when it was
//! sent, so work done by the receiver is attributed to the sender's context.

use tokio::sync::mpsc;
use tracing::Span;

#[cfg(target_os = "macos")]
pub mod notification_center;
pub mod image_cache;

pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = mpsc::UnboundedReceiver<(Span, Event)>;

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Sender(self.0.clone()) }
}

impl<Event> std::fmt::Debug for Sender<Event> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender").field("closed", &self.0.is_closed()).finish()
    }
}

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Sender<Event> {
    pub fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.0.send((Span::current(), event)).map_err(|mpsc::error::SendError((_, e))| {
            mpsc::error::SendError(e)
        })
    }

    /// Like [`Sender::send`], for callers that only want to log failures.
    pub fn try_send(&self, event: Event) -> Result<(), ChannelClosed> {
        self.send(event).map_err(|_| ChannelClosed)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("receiving actor has shut down")]
pub struct ChannelClosed;
