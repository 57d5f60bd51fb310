//! Events emitted by the adaptive controller.

use rivulet_core::events::{EventMeta, PipelineEvent};
use tokio::time::Instant;

/// Events describing concurrency adjustments.
#[derive(Debug, Clone)]
pub enum AdaptiveEvent {
    /// The slot target changed at a sample boundary.
    LimitChanged {
        /// Controller instance name.
        name: String,
        /// When the adjustment happened.
        timestamp: Instant,
        /// Previous slot target.
        old: usize,
        /// New slot target.
        new: usize,
    },
}

impl PipelineEvent for AdaptiveEvent {
    fn meta(&self) -> EventMeta<'_> {
        let AdaptiveEvent::LimitChanged {
            name, timestamp, ..
        } = self;
        EventMeta {
            kind: "concurrency_change",
            at: *timestamp,
            emitter: name,
        }
    }
}
