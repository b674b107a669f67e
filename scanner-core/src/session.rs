//! Camera session: sole owner of an open stream.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constraints::CaptureConstraintCandidate;
use crate::platform::CameraStream;

/// Unique identifier for a camera session, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live handle to an open camera stream and its tracks.
///
/// Closing stops every track exactly once; further closes are no-ops.
/// Dropping an open session closes it.
pub struct CameraSession {
    id: SessionId,
    stream: Rc<dyn CameraStream>,
    candidate: CaptureConstraintCandidate,
    closed: bool,
}

impl CameraSession {
    /// Take ownership of a freshly opened stream.
    #[must_use]
    pub fn open(stream: Box<dyn CameraStream>, candidate: CaptureConstraintCandidate) -> Self {
        let id = SessionId::new();
        tracing::debug!("Camera session {id} opened ({candidate})");
        Self {
            id,
            stream: Rc::from(stream),
            candidate,
            closed: false,
        }
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Candidate the stream was opened with.
    #[must_use]
    pub const fn candidate(&self) -> &CaptureConstraintCandidate {
        &self.candidate
    }

    /// Whether the tracks have been stopped.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Shared handle to the stream's video surface for playback and sampling.
    #[must_use]
    pub(crate) fn stream(&self) -> Rc<dyn CameraStream> {
        Rc::clone(&self.stream)
    }

    /// Stop all tracks. Returns `true` if this call stopped them.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.stream.stop_tracks();
        self.closed = true;
        tracing::debug!("Camera session {} closed", self.id);
        true
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraSession")
            .field("id", &self.id)
            .field("candidate", &self.candidate)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
