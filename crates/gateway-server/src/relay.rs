//! Stream relay: pumps upstream segments into downstream events.
//!
//! One producer task per accepted request reads the provider's segment stream
//! and sends [`DownstreamEvent`]s over a bounded channel. Every relay ends with
//! exactly one terminal event (`Done` or `Error`) unless the client went away
//! first, in which case the upstream stream is dropped without emitting
//! anything further.

use futures_util::StreamExt;
use gateway_core::{DownstreamEvent, SegmentStream};
use gateway_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument, Span};

/// How a relay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Upstream finished cleanly; `Done` was sent
    Completed,
    /// Upstream failed mid-stream; `Error` was sent
    Failed,
    /// The downstream receiver was dropped
    Cancelled,
}

/// Spawn the producer task and return the receiving end of its channel.
pub fn spawn_relay(
    segments: SegmentStream,
    channel_capacity: usize,
    metrics: Metrics,
) -> mpsc::Receiver<DownstreamEvent> {
    let (tx, rx) = mpsc::channel(channel_capacity.max(1));
    tokio::spawn(relay(segments, tx, metrics).instrument(Span::current()));
    rx
}

/// Run a relay to completion on the current task.
pub async fn relay(
    mut segments: SegmentStream,
    tx: mpsc::Sender<DownstreamEvent>,
    metrics: Metrics,
) -> RelayOutcome {
    metrics.stream_started();
    let mut deltas = 0_u64;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = tx.closed() => break RelayOutcome::Cancelled,
            next = segments.next() => next,
        };

        let event = match next {
            Some(Ok(text)) => {
                deltas += 1;
                DownstreamEvent::delta(text)
            }
            Some(Err(e)) => {
                warn!(error = %e, deltas, "Upstream stream failed");
                DownstreamEvent::error(e.to_string())
            }
            None => DownstreamEvent::Done,
        };

        let kind = event.kind();
        let outcome = match &event {
            DownstreamEvent::Delta { .. } => None,
            DownstreamEvent::Error { .. } => Some(RelayOutcome::Failed),
            DownstreamEvent::Done => Some(RelayOutcome::Completed),
        };

        if tx.send(event).await.is_err() {
            break RelayOutcome::Cancelled;
        }
        metrics.record_stream_event(kind);

        if let Some(outcome) = outcome {
            break outcome;
        }
    };

    // Releases the upstream connection.
    drop(segments);
    metrics.stream_finished();

    match outcome {
        RelayOutcome::Cancelled => info!(deltas, "Client disconnected, upstream released"),
        _ => debug!(deltas, ?outcome, "Relay finished"),
    }
    outcome
}
