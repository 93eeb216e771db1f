//! Call session state machine
//!
//! Models an active voice/video session: idle -> active -> idle, with
//! independently toggleable mic and local-video flags and a once-per-second
//! duration counter while active. Media capture is an external capability
//! behind [`CaptureBackend`]; this client mocks it locally.

use thiserror::Error;

use crate::models::User;

/// Call modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Voice,
    Video,
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("a call is already active")]
    Busy,
}

/// Camera/microphone acquisition was refused.
#[derive(Debug, Error)]
#[error("capture denied: {0}")]
pub struct CaptureError(pub String);

/// External capability that acquires and releases local capture devices.
pub trait CaptureBackend {
    fn acquire(&mut self) -> Result<(), CaptureError>;
    fn release(&mut self);
}

/// Backend that grants capture without touching any real device.
pub struct MockCapture;

impl CaptureBackend for MockCapture {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn release(&mut self) {}
}

/// How a call started.
#[derive(Debug)]
pub enum StartOutcome {
    /// Capture (when needed) was acquired.
    Ready,
    /// Video call without a local feed: capture was denied but the call
    /// stays active.
    Degraded(CaptureError),
}

/// Mutable sub-state of an active call.
#[derive(Debug)]
pub struct ActiveCall {
    pub contact: User,
    pub kind: CallType,
    pub mic_enabled: bool,
    pub local_video_enabled: bool,
    pub duration_secs: u64,
    capture_held: bool,
}

/// At most one active call process-wide; owned by the session.
#[derive(Default)]
pub struct CallSession {
    active: Option<ActiveCall>,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call. Requires idle. For video calls the capture backend is
    /// acquired; denial degrades the call instead of reverting it.
    pub fn start(
        &mut self,
        contact: User,
        kind: CallType,
        capture: &mut dyn CaptureBackend,
    ) -> Result<StartOutcome, CallError> {
        if self.active.is_some() {
            return Err(CallError::Busy);
        }

        let mut outcome = StartOutcome::Ready;
        let mut capture_held = false;
        if kind == CallType::Video {
            match capture.acquire() {
                Ok(()) => capture_held = true,
                Err(e) => {
                    tracing::warn!("continuing call without local video: {}", e);
                    outcome = StartOutcome::Degraded(e);
                }
            }
        }

        self.active = Some(ActiveCall {
            contact,
            kind,
            mic_enabled: true,
            local_video_enabled: true,
            duration_secs: 0,
            capture_held,
        });
        Ok(outcome)
    }

    /// Flip the mic flag. No-op when idle.
    pub fn toggle_mic(&mut self) {
        if let Some(call) = &mut self.active {
            call.mic_enabled = !call.mic_enabled;
        }
    }

    /// Flip the local-video flag. No-op when idle.
    pub fn toggle_local_video(&mut self) {
        if let Some(call) = &mut self.active {
            call.local_video_enabled = !call.local_video_enabled;
        }
    }

    /// One second of call time elapsed. No-op when idle.
    pub fn tick(&mut self) {
        if let Some(call) = &mut self.active {
            call.duration_secs += 1;
        }
    }

    /// End the call: release capture, clear contact and kind, back to idle.
    pub fn end(&mut self, capture: &mut dyn CaptureBackend) {
        if let Some(call) = self.active.take() {
            if call.capture_held {
                capture.release();
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn current(&self) -> Option<&ActiveCall> {
        self.active.as_ref()
    }
}

/// Render elapsed seconds as `MM:SS`.
pub fn format_duration(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
