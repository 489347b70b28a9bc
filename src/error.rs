use thiserror::Error;

use crate::id::{PipelineId, PrimitiveType, TargetId};

/// Errors raised by the renderer itself.
///
/// Only [`RenderError::InvalidConfig`] and [`RenderError::PipelineUnavailable`] are ever
/// returned. The others describe misuse of the begin/end protocol and abort the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("invalid renderer config: {0}")]
    InvalidConfig(String),
    #[error("backend has no valid pipeline ({pipeline}) for {primitive:?}")]
    PipelineUnavailable {
        primitive: PrimitiveType,
        pipeline: PipelineId,
    },
    #[error("state stack overflow: more than {max_depth} nested scopes")]
    StackOverflow { max_depth: usize },
    #[error("end() called without a matching begin()")]
    StackUnderflow,
    #[error("{operation} called outside of a begin()/end() scope")]
    NoActiveScope { operation: &'static str },
    #[error("frame ended with {open} scope(s) still open")]
    UnbalancedFrame { open: usize },
    #[error("backend has no render target {0}")]
    UnknownTarget(TargetId),
    #[error("uniform slot {slot} out of range, only {max} slots exist")]
    InvalidUniformSlot { slot: usize, max: usize },
}

/// Errors reported by a [`RenderBackend`](crate::RenderBackend).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("vertex buffer overflow: {requested} bytes requested, {available} available")]
    VertexBufferOverflow { requested: u64, available: u64 },
    #[error("texture data is {actual} bytes, expected {expected}")]
    InvalidTextureData { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum DrawableError {
    #[error("path tessellation failed: {0:?}")]
    Tessellation(lyon::tessellation::TessellationError),
}

/// Logs `err` and aborts. Used for begin/end protocol violations, where carrying on would
/// replay commands against the wrong scope.
#[track_caller]
pub(crate) fn fatal(err: RenderError) -> ! {
    tracing::error!(error = %err, "fatal renderer error");
    panic!("{err}");
}
