// SPDX-FileCopyrightText: 2026 Arcana Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events stream for reading progress.
//!
//! `GET /api/readings/{id}/events` relays the progress broker's frames as
//! named SSE events:
//!
//! ```text
//! event: progress
//! data: {"step":"GENERATING","message":"consulting the cards","progress":60}
//!
//! event: error
//! data: {"step":"GENERATING","error":"...","progress":60}
//! ```
//!
//! The stream closes after the terminal frame. A subscriber to an
//! already-terminal reading receives one synthetic snapshot frame derived
//! from the job row, then the stream closes.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use arcana_core::{
    ArcanaError, ProgressErrorEvent, ProgressEvent, ProgressFrame, Reading, ReadingStatus,
    ReadingStep,
};

use crate::error::ApiError;
use crate::handlers::require_user_id;
use crate::server::GatewayState;

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// GET /api/readings/{id}/events
pub async fn reading_events(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
    require_user_id(&headers)?;

    // Subscribe before reading the row. A completion between the two is
    // then never missed: either the row already shows terminal (snapshot
    // path) or the terminal frame arrives on this subscription.
    let (rx, existed) = state.broker.attach(&id);
    let reading = match state.store.get(&id).await {
        Ok(Some(reading)) => reading,
        Ok(None) => {
            if !existed {
                // Drop the channel the speculative attach created.
                state.broker.finish(&id);
            }
            return Err(ApiError(ArcanaError::NotFound { reading_id: id }));
        }
        Err(err) => return Err(ApiError(err)),
    };

    let stream: EventStream = if reading.status.is_terminal() {
        if !existed {
            // The processor removed its channel when the reading finished;
            // only the one this attach created needs cleaning up. An
            // existing channel still belongs to the processor, which may
            // be about to deliver the closing frames to live subscribers.
            state.broker.finish(&id);
        }
        stream::once(async move { Ok(frame_event(&snapshot_frame(&reading))) }).boxed()
    } else {
        live_stream(rx)
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Bridges a broadcast subscription into an SSE stream. Ends on channel
/// close; a lagged subscriber skips ahead instead of erroring out.
fn live_stream(rx: broadcast::Receiver<ProgressFrame>) -> EventStream {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => return Some((Ok(frame_event(&frame)), rx)),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "progress subscriber lagged, continuing");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

/// One synthetic frame for a late subscriber, derived from the job row.
fn snapshot_frame(reading: &Reading) -> ProgressFrame {
    if reading.status == ReadingStatus::Failed {
        ProgressFrame::Error(ProgressErrorEvent {
            // The row does not record the failing step; generation is
            // where failures land.
            step: ReadingStep::Generating,
            error: reading
                .error_message
                .clone()
                .unwrap_or_else(|| "reading failed".to_string()),
            progress: reading.progress(),
        })
    } else {
        ProgressFrame::Step(ProgressEvent {
            step: ReadingStep::Completed,
            message: "reading complete".to_string(),
            progress: reading.progress(),
        })
    }
}

fn frame_event(frame: &ProgressFrame) -> Event {
    match frame {
        ProgressFrame::Step(event) => {
            let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
            Event::default().event("progress").data(data)
        }
        ProgressFrame::Error(event) => {
            let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
            Event::default().event("error").data(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn terminal_reading(status: ReadingStatus, error: Option<&str>) -> Reading {
        Reading {
            id: "r-1".to_string(),
            user_id: "u-1".to_string(),
            question: "q".to_string(),
            card_count: 3,
            status,
            retry_count: 0,
            error_message: error.map(str::to_string),
            result_payload: None,
            created_at: Utc::now(),
            processing_started_at: Some(Utc::now()),
            processing_completed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn completed_snapshot_is_a_final_step_frame() {
        let frame = snapshot_frame(&terminal_reading(ReadingStatus::Completed, None));
        match frame {
            ProgressFrame::Step(event) => {
                assert_eq!(event.step, ReadingStep::Completed);
                assert_eq!(event.progress, 100);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn failed_snapshot_carries_the_stored_message() {
        let frame = snapshot_frame(&terminal_reading(
            ReadingStatus::Failed,
            Some("The reading could not be completed."),
        ));
        match frame {
            ProgressFrame::Error(event) => {
                assert_eq!(event.progress, 100);
                assert!(event.error.contains("could not be completed"));
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn step_frames_serialize_with_screaming_snake_steps() {
        let event = ProgressEvent {
            step: ReadingStep::SelectingCards,
            message: "drawing 3 cards".to_string(),
            progress: 20,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"step\":\"SELECTING_CARDS\""));
        assert!(json.contains("\"progress\":20"));
    }
}
