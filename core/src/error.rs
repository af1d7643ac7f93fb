// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! The error taxonomy. Only [InvariantError] is fatal; everything else is
//! logged and the show keeps running.

use thiserror::Error;

/// The telemetry feed couldn't produce a snapshot this cycle.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The feed didn't answer.
    #[error("telemetry feed unreachable: {0}")]
    Unreachable(String),
    /// The feed answered with something that isn't a race snapshot.
    #[error("malformed telemetry: {0}")]
    Malformed(String),
    /// A recorded session has no frames left.
    #[error("recording exhausted after {0} frames")]
    Exhausted(usize),
}

/// The snapshot can't be reduced to derived values. The cycle is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[allow(missing_docs)]
    #[error("snapshot has no cars")]
    NoCars,
}

/// A programmer error: change detection was asked to watch a key without a
/// check-id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("check id must not be empty (watching {key:?})")]
pub struct InvariantError {
    /// The key that was being watched.
    pub key: String,
}

/// The control surface refused or couldn't perform an action. Actions are
/// at-most-once, so these are never retried.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The music tool answered with an error.
    #[error("control surface rejected {action}: {reason}")]
    Rejected {
        #[allow(missing_docs)]
        action: String,
        #[allow(missing_docs)]
        reason: String,
    },
    /// The music tool couldn't be reached.
    #[error("control surface unreachable: {0}")]
    Unreachable(String),
    /// A named clip isn't on the speaker track.
    #[error("no clip named {0:?}")]
    UnknownClip(String),
}
