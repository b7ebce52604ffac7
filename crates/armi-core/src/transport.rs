//! Collaborator interfaces the dispatch engine needs from the outside world: something that
//! can write a whole frame on a channel, and something that can run a callback after a delay.
//! Concrete implementations (TCP, in-memory duplex, a tokio-backed scheduler) live in the
//! `armi-transport` crate; this crate only depends on the interfaces.

use std::time::Duration;

use crate::error::Error;

/// One half of a channel: the ability to hand a whole frame to the transport for writing.
///
/// Implementations must deliver frames to the peer in the order they were sent, or report
/// a write failure so the owning context can fan out cancellation for the channel.
pub trait ChannelWriter: Send + Sync {
    fn send(&self, frame: Vec<u8>) -> Result<(), Error>;
}

/// A timer source. `armi-core` never polls time itself; it asks the scheduler to call back.
pub trait Scheduler: Send + Sync {
    fn schedule_after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>);
}

/// Default scheduler backed by the tokio runtime's timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_after(&self, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
    }
}
