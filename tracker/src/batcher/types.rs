use crate::models::{TrackKey, TrackResponse};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A submission travelling the ingress queue.
pub(crate) enum BatchRequest {
    /// A caller waiting for exactly one response on `reply`.
    Track {
        key: TrackKey,
        reply: mpsc::Sender<TrackResponse>,
        cancel: CancellationToken,
    },

    /// Liveness probe. Discarded by the main loop before accumulation, so it
    /// can never produce a response for a caller that does not exist.
    HealthProbe,
}

/// An accumulated request awaiting dispatch.
pub(crate) struct BatchItem {
    pub key: TrackKey,
    pub reply: mpsc::Sender<TrackResponse>,
}
