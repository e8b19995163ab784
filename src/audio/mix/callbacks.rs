//! Deferred "finished" notifications.
//!
//! The mixer queues notifications while it walks the active list and runs
//! them once the structural lock is released, so a handler may call back
//! into the mixer.

use std::sync::Arc;

use tracing::warn;

use crate::common::types::{ChannelId, FinishedCallback};

/// Bounded set of pending notifications, sized to the channel count.
pub struct CallbackQueue {
    pending: Vec<(ChannelId, FinishedCallback)>,
    capacity: usize,
}

impl CallbackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue `callback` for `channel`. Already-queued channels are skipped;
    /// past capacity the notification is dropped with a warning.
    pub fn push(&mut self, channel: ChannelId, callback: FinishedCallback) {
        if self.pending.iter().any(|(queued, _)| *queued == channel) {
            return;
        }
        if self.pending.len() >= self.capacity {
            warn!(
                "too many finished callbacks at once; dropping notification for channel {}",
                channel
            );
            return;
        }
        self.pending.push((channel, callback));
    }

    /// Invoke every queued callback once and empty the queue.
    pub fn dispatch(&mut self) {
        for (channel, callback) in self.pending.drain(..) {
            callback(channel);
        }
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A finished callback that forwards channel ids into a bounded `flume` channel.
///
/// Sends never block the mixer: when the receiver lags behind by `capacity`
/// notifications, further ones are dropped with a warning.
pub fn finished_channel(capacity: usize) -> (FinishedCallback, flume::Receiver<ChannelId>) {
    let (tx, rx) = flume::bounded(capacity);
    let callback: FinishedCallback = Arc::new(move |channel: ChannelId| {
        if let Err(flume::TrySendError::Full(channel)) = tx.try_send(channel) {
            warn!("finished channel full; dropping notification for channel {}", channel);
        }
    });
    (callback, rx)
}
