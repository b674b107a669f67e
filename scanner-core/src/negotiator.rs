//! Camera acquisition negotiator.
//!
//! Turns heterogeneous capture APIs into either one open [`CameraSession`]
//! or one classified [`ScanFailure`]. This is the only code that asks the
//! platform for a stream.

use std::rc::Rc;

use crate::capability::{CaptureApi, CaptureCapabilities};
use crate::config::ScannerConfig;
use crate::constraints::CaptureConstraintCandidate;
use crate::device::DeviceProfile;
use crate::error::NativeError;
use crate::failure::ScanFailure;
use crate::platform::CaptureBackend;
use crate::security::SecurityAssessment;
use crate::session::CameraSession;

/// Negotiates a camera stream through whichever capture API the host offers.
pub struct Negotiator {
    capture: Rc<dyn CaptureBackend>,
    config: ScannerConfig,
}

impl Negotiator {
    /// Create a negotiator over a capture backend.
    #[must_use]
    pub fn new(capture: Rc<dyn CaptureBackend>, config: ScannerConfig) -> Self {
        Self { capture, config }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Device profile derived from the host's user agent.
    #[must_use]
    pub fn profile(&self) -> DeviceProfile {
        DeviceProfile::from_user_agent(&self.capture.capabilities().user_agent)
    }

    /// Classify an error raised after acquisition, e.g. by playback.
    #[must_use]
    pub fn classify(&self, error: &NativeError) -> ScanFailure {
        ScanFailure::classify(error, &self.capture.capabilities())
    }

    /// Candidate list for `api` on this device.
    ///
    /// Only the modern API gets the full plan; older vintages are asked for
    /// any video stream.
    #[must_use]
    pub fn candidates(
        &self,
        api: CaptureApi,
        profile: &DeviceProfile,
    ) -> Vec<CaptureConstraintCandidate> {
        if api.supports_constraint_plan() {
            CaptureConstraintCandidate::plan(profile.class, &self.config)
        } else {
            vec![CaptureConstraintCandidate::any_video()]
        }
    }

    /// Open a camera session.
    ///
    /// Candidates are tried in order and the first success wins. When every
    /// candidate fails the *last* error is classified.
    ///
    /// # Errors
    ///
    /// Returns [`ScanFailure::ApiUnsupported`] without any acquisition
    /// attempt when no capture API exists, otherwise the classified error of
    /// the last candidate.
    pub async fn acquire(&self) -> Result<CameraSession, ScanFailure> {
        let caps = self.capture.capabilities();
        SecurityAssessment::from_capabilities(&caps).log(&caps.hostname);

        let api = Self::select_api(&caps)?;
        let profile = DeviceProfile::from_user_agent(&caps.user_agent);
        let candidates = self.candidates(api, &profile);

        tracing::debug!(
            "Negotiating camera via {} with {} candidate(s) ({:?}, {})",
            api.name(),
            candidates.len(),
            profile.class,
            profile.browser.name()
        );

        self.first_success(api, &caps, &candidates).await
    }

    /// Re-request camera permission.
    ///
    /// Opens the preferred candidate, falling back to any video, and releases
    /// the stream immediately. A successful probe leaves no session open.
    ///
    /// # Errors
    ///
    /// Returns the classified failure of the probe.
    pub async fn probe_permission(&self) -> Result<(), ScanFailure> {
        let caps = self.capture.capabilities();
        let api = Self::select_api(&caps)?;
        let profile = DeviceProfile::from_user_agent(&caps.user_agent);

        let mut candidates = Vec::with_capacity(2);
        if let Some(preferred) = self.candidates(api, &profile).into_iter().next() {
            if !preferred.is_any_video() {
                candidates.push(preferred);
            }
        }
        candidates.push(CaptureConstraintCandidate::any_video());

        let mut session = self.first_success(api, &caps, &candidates).await?;
        session.close();
        tracing::info!("Camera permission granted");
        Ok(())
    }

    fn select_api(caps: &CaptureCapabilities) -> Result<CaptureApi, ScanFailure> {
        caps.probe().ok_or_else(|| {
            tracing::error!(
                "No camera capture API available: {}",
                caps.diagnostics_json()
            );
            ScanFailure::ApiUnsupported(Box::new(caps.clone()))
        })
    }

    async fn first_success(
        &self,
        api: CaptureApi,
        caps: &CaptureCapabilities,
        candidates: &[CaptureConstraintCandidate],
    ) -> Result<CameraSession, ScanFailure> {
        let mut last_error = None;

        for (index, candidate) in candidates.iter().enumerate() {
            tracing::debug!("Camera attempt {}/{}: {candidate}", index + 1, candidates.len());

            match self.capture.open(api, candidate).await {
                Ok(stream) if stream.live_video_tracks() == 0 => {
                    stream.stop_tracks();
                    tracing::warn!("Stream for {candidate} has no live video track");
                    last_error = Some(NativeError::new(
                        "NotFoundError",
                        "stream has no live video track",
                    ));
                }
                Ok(stream) => {
                    let session = CameraSession::open(stream, candidate.clone());
                    tracing::info!("Camera opened with {candidate}");
                    return Ok(session);
                }
                Err(err) => {
                    tracing::debug!("Camera attempt with {candidate} failed: {err}");
                    last_error = Some(err);
                }
            }
        }

        let err = last_error
            .unwrap_or_else(|| NativeError::new("NotFoundError", "no capture candidates"));
        Err(ScanFailure::classify(&err, caps))
    }
}

impl std::fmt::Debug for Negotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Negotiator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
