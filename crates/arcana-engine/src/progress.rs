// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process progress fan-out.
//!
//! Each reading gets a broadcast channel keyed by its id. The processor
//! emits step and error frames as it works; any number of SSE subscribers
//! receive them. Channels are registered at submit time and removed once
//! the reading reaches a terminal state, so dropping the last sender is
//! what closes the stream on the subscriber side.
//!
//! Delivery is best effort. A send with no live receivers is not an error,
//! and a subscriber that falls more than the channel capacity behind sees
//! a `Lagged` gap rather than blocking the processor.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use arcana_core::{ProgressErrorEvent, ProgressEvent, ProgressFrame, ReadingStep};

/// Buffered frames per channel. The full step sequence is six frames, so
/// a subscriber that connects before processing starts never lags.
const CHANNEL_CAPACITY: usize = 32;

/// Registry of per-reading progress channels.
#[derive(Clone, Default)]
pub struct ProgressBroker {
    channels: Arc<DashMap<String, broadcast::Sender<ProgressFrame>>>,
}

impl ProgressBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the channel for a reading if it does not exist yet.
    ///
    /// Called at submit time so the channel outlives the gap between
    /// acceptance and the first poll cycle.
    pub fn register(&self, reading_id: &str) {
        self.channels
            .entry(reading_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
    }

    /// Subscribes to a reading's progress frames, creating the channel if
    /// needed so a subscriber can attach before the first frame.
    pub fn subscribe(&self, reading_id: &str) -> broadcast::Receiver<ProgressFrame> {
        self.attach(reading_id).0
    }

    /// Like [`subscribe`](Self::subscribe), also reporting whether the
    /// channel already existed. A caller that created the channel for a
    /// reading which turns out to be terminal must remove it again with
    /// [`finish`](Self::finish); the processor's own cleanup has already
    /// run and nothing else will.
    pub fn attach(&self, reading_id: &str) -> (broadcast::Receiver<ProgressFrame>, bool) {
        match self.channels.entry(reading_id.to_string()) {
            Entry::Occupied(entry) => (entry.get().subscribe(), true),
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
                entry.insert(tx);
                (rx, false)
            }
        }
    }

    /// Emits a step frame with the step's fixed progress value.
    pub fn emit_step(&self, reading_id: &str, step: ReadingStep, message: impl Into<String>) {
        self.send(
            reading_id,
            ProgressFrame::Step(ProgressEvent {
                step,
                message: message.into(),
                progress: step.progress(),
            }),
        );
    }

    /// Emits a terminal error frame carrying the step that failed.
    pub fn emit_error(&self, reading_id: &str, step: ReadingStep, error: impl Into<String>) {
        self.send(
            reading_id,
            ProgressFrame::Error(ProgressErrorEvent {
                step,
                error: error.into(),
                progress: step.progress(),
            }),
        );
    }

    /// Removes the channel, closing the stream for all subscribers.
    pub fn finish(&self, reading_id: &str) {
        if self.channels.remove(reading_id).is_some() {
            debug!(reading_id, "progress channel closed");
        }
    }

    fn send(&self, reading_id: &str, frame: ProgressFrame) {
        if let Some(sender) = self.channels.get(reading_id) {
            // No receivers is fine; the reading row carries the durable state.
            let _ = sender.send(frame);
        }
    }

    #[cfg(test)]
    fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn frames_arrive_in_emission_order() {
        let broker = ProgressBroker::new();
        broker.register("r1");
        let mut rx = broker.subscribe("r1");

        broker.emit_step("r1", ReadingStep::Validating, "validating");
        broker.emit_step("r1", ReadingStep::SelectingCards, "drawing");
        broker.emit_step("r1", ReadingStep::Completed, "done");

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        match (first, second, third) {
            (ProgressFrame::Step(a), ProgressFrame::Step(b), ProgressFrame::Step(c)) => {
                assert_eq!(a.step, ReadingStep::Validating);
                assert_eq!(a.progress, 5);
                assert_eq!(b.step, ReadingStep::SelectingCards);
                assert_eq!(c.step, ReadingStep::Completed);
                assert_eq!(c.progress, 100);
            }
            other => panic!("unexpected frames: {other:?}"),
        }
    }

    #[tokio::test]
    async fn finish_closes_the_stream() {
        let broker = ProgressBroker::new();
        let mut rx = broker.subscribe("r1");
        broker.emit_step("r1", ReadingStep::Validating, "validating");
        broker.finish("r1");

        assert!(matches!(rx.recv().await, Ok(ProgressFrame::Step(_))));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
        assert_eq!(broker.channel_count(), 0);
    }

    #[tokio::test]
    async fn error_frame_carries_failing_step() {
        let broker = ProgressBroker::new();
        let mut rx = broker.subscribe("r1");
        broker.emit_error("r1", ReadingStep::Generating, "generation failed");

        match rx.recv().await.unwrap() {
            ProgressFrame::Error(event) => {
                assert_eq!(event.step, ReadingStep::Generating);
                assert_eq!(event.progress, 60);
                assert_eq!(event.error, "generation failed");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn emit_without_channel_is_a_no_op() {
        let broker = ProgressBroker::new();
        broker.emit_step("ghost", ReadingStep::Validating, "validating");
        assert_eq!(broker.channel_count(), 0);
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let broker = ProgressBroker::new();
        broker.register("r1");
        let mut rx = broker.subscribe("r1");
        // A second register must not replace the channel under the subscriber.
        broker.register("r1");
        broker.emit_step("r1", ReadingStep::Validating, "validating");
        assert!(matches!(rx.recv().await, Ok(ProgressFrame::Step(_))));
    }

    #[tokio::test]
    async fn attach_reports_channel_existence() {
        let broker = ProgressBroker::new();
        let (_rx, existed) = broker.attach("r1");
        assert!(!existed);
        let (_rx2, existed) = broker.attach("r1");
        assert!(existed);

        broker.register("r2");
        let (_rx3, existed) = broker.attach("r2");
        assert!(existed);
    }
}
