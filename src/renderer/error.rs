// Unrecoverable frame errors
//
// Stale swap chains never show up here: they are repaired by a rebuild.
// Contract violations never show up here either: they panic.

use ash::vk;
use thiserror::Error;

use super::ChainFormats;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("failed to acquire swap chain image: {0}")]
    Acquire(vk::Result),

    #[error("failed to present swap chain image: {0}")]
    Present(vk::Result),

    #[error("swap chain image (or depth) format has changed: {previous:?} -> {current:?}")]
    FormatChanged {
        previous: ChainFormats,
        current: ChainFormats,
    },

    #[error("window closed before the first swap chain was created")]
    SurfaceClosed,

    #[error(transparent)]
    Device(#[from] anyhow::Error),
}

pub type FrameResult<T> = Result<T, FrameError>;
