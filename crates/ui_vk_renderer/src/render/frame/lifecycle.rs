//! Frame state machine
//!
//! ```text
//!            SurfaceReady                BeginRecording
//!  Invalid ───────────────► Acquiring ───────────────► Recording
//!     ▲                        ▲                           │ Submit
//!     │ SurfaceLost            │ PresentComplete           ▼
//!     └──── (any state)    Presenting ◄────────────── Submitted
//!                                         Present
//! ```

/// Where the renderer is within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No usable swapchain (never created, minimized, or torn down)
    Invalid,
    /// Swapchain ready, waiting for the next frame to begin
    Acquiring,
    /// Command buffer open, draws are accepted
    Recording,
    /// Command buffer handed to the queue
    Submitted,
    /// Image handed to the presentation engine
    Presenting,
}

/// Inputs that drive [`FrameState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Size-dependent resources were (re)built successfully
    SurfaceReady,
    /// Surface became unusable or its extent collapsed to zero
    SurfaceLost,
    /// Image acquired and recording started
    BeginRecording,
    /// Recording ended and work was submitted
    Submit,
    /// Present was queued
    Present,
    /// Present returned, whatever its outcome
    PresentComplete,
    /// Renderer is shutting down
    Shutdown,
}

impl FrameState {
    /// Apply `event`, or `None` if it is not allowed from this state
    pub const fn transition(self, event: FrameEvent) -> Option<Self> {
        use FrameEvent as E;
        use FrameState as S;

        match (self, event) {
            (_, E::SurfaceLost | E::Shutdown) => Some(S::Invalid),
            (S::Invalid | S::Acquiring, E::SurfaceReady) => Some(S::Acquiring),
            (S::Acquiring, E::BeginRecording) => Some(S::Recording),
            (S::Recording, E::Submit) => Some(S::Submitted),
            (S::Submitted, E::Present) => Some(S::Presenting),
            (S::Presenting, E::PresentComplete) => Some(S::Acquiring),
            _ => None,
        }
    }

    /// Whether a frame is open between begin and end
    pub const fn in_frame(self) -> bool {
        matches!(self, Self::Recording | Self::Submitted | Self::Presenting)
    }
}

/// Owner of the current [`FrameState`]
#[derive(Debug, Clone)]
pub struct FrameLifecycle {
    state: FrameState,
}

impl Default for FrameLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLifecycle {
    /// Start in [`FrameState::Invalid`]
    pub const fn new() -> Self {
        Self {
            state: FrameState::Invalid,
        }
    }

    /// Current state
    pub const fn state(&self) -> FrameState {
        self.state
    }

    /// Whether draws are currently accepted
    pub fn is_recording(&self) -> bool {
        self.state == FrameState::Recording
    }

    /// Apply `event`, returning whether it was a legal transition
    ///
    /// Illegal events leave the state untouched.
    pub fn apply(&mut self, event: FrameEvent) -> bool {
        match self.state.transition(event) {
            Some(next) => {
                log::trace!("Frame state {:?} --{:?}--> {:?}", self.state, event, next);
                self.state = next;
                true
            }
            None => {
                log::warn!("Ignoring frame event {:?} in state {:?}", event, self.state);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_cycle() {
        let mut lifecycle = FrameLifecycle::new();
        assert_eq!(lifecycle.state(), FrameState::Invalid);

        for (event, expected) in [
            (FrameEvent::SurfaceReady, FrameState::Acquiring),
            (FrameEvent::BeginRecording, FrameState::Recording),
            (FrameEvent::Submit, FrameState::Submitted),
            (FrameEvent::Present, FrameState::Presenting),
            (FrameEvent::PresentComplete, FrameState::Acquiring),
        ] {
            assert!(lifecycle.apply(event), "{event:?} should be legal");
            assert_eq!(lifecycle.state(), expected);
        }
    }

    #[test]
    fn test_cannot_record_without_surface() {
        let mut lifecycle = FrameLifecycle::new();
        assert!(!lifecycle.apply(FrameEvent::BeginRecording));
        assert_eq!(lifecycle.state(), FrameState::Invalid);
    }

    #[test]
    fn test_cannot_submit_twice() {
        assert_eq!(FrameState::Submitted.transition(FrameEvent::Submit), None);
        assert_eq!(FrameState::Acquiring.transition(FrameEvent::Submit), None);
    }

    #[test]
    fn test_surface_loss_from_any_state() {
        for state in [
            FrameState::Invalid,
            FrameState::Acquiring,
            FrameState::Recording,
            FrameState::Submitted,
            FrameState::Presenting,
        ] {
            assert_eq!(state.transition(FrameEvent::SurfaceLost), Some(FrameState::Invalid));
        }
    }

    #[test]
    fn test_recreate_is_not_allowed_mid_frame() {
        assert_eq!(FrameState::Recording.transition(FrameEvent::SurfaceReady), None);
        assert!(FrameState::Recording.in_frame());
        assert!(!FrameState::Acquiring.in_frame());
    }
}
