#[cfg(feature = "render_metrics")]
use std::time::Duration;

use super::*;

/// What a single flush sent to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlushStats {
    /// Commands in the flushed slice, tombstones included.
    pub commands: u32,
    /// Tombstones and empty draws that were skipped.
    pub skipped: u32,
    pub draw_calls: u32,
    pub pipeline_switches: u32,
    pub bindings_applied: u32,
    pub uniforms_applied: u32,
    pub vertices_uploaded: u32,
    /// Wall-clock time spent replaying the slice.
    #[cfg(feature = "render_metrics")]
    pub duration: Duration,
}

/// Counters accumulated over one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Calls to [`Renderer::draw`] with a non-empty drawable.
    pub draws_recorded: u32,
    pub merged_backward: u32,
    pub merged_forward: u32,
    /// Draws lost to a full arena or an invalid pipeline.
    pub draws_dropped: u32,
    /// Viewport/scissor changes lost to a full command arena.
    pub controls_dropped: u32,
    pub flushes: u32,
    /// Flushes aborted because the backend could not take the vertices.
    pub failed_uploads: u32,
    pub draw_calls: u32,
    pub pipeline_switches: u32,
    pub bindings_applied: u32,
    pub uniforms_applied: u32,
    pub vertices_uploaded: u32,
    #[cfg(feature = "render_metrics")]
    pub flush_time: Duration,
}

impl FrameStats {
    /// Merge a flush's counts into this accumulator.
    pub fn accumulate(&mut self, flush: &FlushStats) {
        self.flushes += 1;
        self.draw_calls += flush.draw_calls;
        self.pipeline_switches += flush.pipeline_switches;
        self.bindings_applied += flush.bindings_applied;
        self.uniforms_applied += flush.uniforms_applied;
        self.vertices_uploaded += flush.vertices_uploaded;
        #[cfg(feature = "render_metrics")]
        {
            self.flush_time += flush.duration;
        }
    }

    pub fn merges(&self) -> u32 {
        self.merged_backward + self.merged_forward
    }

    pub(super) fn record_merge(&mut self, kind: MergeKind) {
        match kind {
            MergeKind::Backward => self.merged_backward += 1,
            MergeKind::Forward => self.merged_forward += 1,
        }
    }
}

impl<B: RenderBackend> Renderer<B> {
    /// Counters of the frame in progress.
    pub fn stats(&self) -> &FrameStats {
        &self.frame_stats
    }

    /// Counters of the last frame that reached [`Renderer::end_frame`].
    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_frame_stats
    }

    pub fn last_flush(&self) -> &FlushStats {
        &self.last_flush
    }
}
