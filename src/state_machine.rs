//! State machine for Fluency Capture
//!
//! This module implements the recording session using a single-writer pattern.
//! All state transitions go through the `reduce()` function, which returns
//! a new state and a list of effects to execute. The reducer never touches
//! hardware, timers or the network; the effect runner does, and reports back
//! with events.

use uuid::Uuid;

use crate::audio::{Artifact, AudioChunk, CaptureError};
use crate::notify::Notice;

/// Limits applied by the duration governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_duration_secs: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 30,
        }
    }
}

/// Internal state of the recording workflow.
/// This is the authoritative state - all transitions go through the reducer.
#[derive(Debug, Clone)]
pub enum State {
    Idle {
        /// The "microphone access required" modal is visible.
        permission_modal: bool,
    },
    AwaitingPermission {
        session_id: Uuid,
        /// Started from the permission modal.
        retry: bool,
    },
    Recording {
        session_id: Uuid,
        elapsed_secs: u32,
        /// Most recent level sample in [0, 1].
        level: f32,
    },
    Paused {
        session_id: Uuid,
        elapsed_secs: u32,
    },
    Finalizing {
        session_id: Uuid,
        elapsed_secs: u32,
    },
    Completed {
        session_id: Uuid,
        elapsed_secs: u32,
        artifact: Artifact,
    },
    Failed {
        session_id: Uuid,
        message: String,
    },
}

impl Default for State {
    fn default() -> Self {
        State::Idle {
            permission_modal: false,
        }
    }
}

impl State {
    /// Id of the session this state belongs to, if any.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            State::Idle { .. } => None,
            State::AwaitingPermission { session_id, .. }
            | State::Recording { session_id, .. }
            | State::Paused { session_id, .. }
            | State::Finalizing { session_id, .. }
            | State::Completed { session_id, .. }
            | State::Failed { session_id, .. } => Some(*session_id),
        }
    }

    pub fn elapsed_secs(&self) -> u32 {
        match self {
            State::Recording { elapsed_secs, .. }
            | State::Paused { elapsed_secs, .. }
            | State::Finalizing { elapsed_secs, .. }
            | State::Completed { elapsed_secs, .. } => *elapsed_secs,
            _ => 0,
        }
    }

    /// A session that still owns (or is about to own) the input stream.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            State::AwaitingPermission { .. }
                | State::Recording { .. }
                | State::Paused { .. }
                | State::Finalizing { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            State::Idle { .. } => "Idle",
            State::AwaitingPermission { .. } => "AwaitingPermission",
            State::Recording { .. } => "Recording",
            State::Paused { .. } => "Paused",
            State::Finalizing { .. } => "Finalizing",
            State::Completed { .. } => "Completed",
            State::Failed { .. } => "Failed",
        }
    }
}

/// Events that can trigger state transitions.
/// These come from the host handle, the timers, the capture backend and the
/// effect runner.
#[derive(Debug, Clone)]
pub enum Event {
    // Host requests
    Start,
    Pause,
    Resume,
    Stop,
    DismissPermissionModal,
    /// The hosting view is going away.
    Teardown,

    // Permission gate / capture backend
    PermissionDenied {
        id: Uuid,
        reason: String,
    },
    InputReady {
        id: Uuid,
    },
    InputFailed {
        id: Uuid,
        err: CaptureError,
    },
    Fragment {
        id: Uuid,
        chunk: AudioChunk,
    },
    HardwareError {
        id: Uuid,
        err: CaptureError,
    },

    // Timers (include id to prevent stale ticks)
    LevelTick {
        id: Uuid,
    },
    DurationTick {
        id: Uuid,
    },
    LevelSampled {
        id: Uuid,
        level: f32,
    },

    // Finalization
    ArtifactReady {
        id: Uuid,
        artifact: Artifact,
    },
    ArtifactFailed {
        id: Uuid,
        err: CaptureError,
    },
}

impl Event {
    /// Session id carried by the event, for stale-event filtering.
    fn session_id(&self) -> Option<Uuid> {
        match self {
            Event::PermissionDenied { id, .. }
            | Event::InputReady { id }
            | Event::InputFailed { id, .. }
            | Event::Fragment { id, .. }
            | Event::HardwareError { id, .. }
            | Event::LevelTick { id }
            | Event::DurationTick { id }
            | Event::LevelSampled { id, .. }
            | Event::ArtifactReady { id, .. }
            | Event::ArtifactFailed { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// High-frequency events that are not worth logging one by one.
    pub fn is_chatty(&self) -> bool {
        matches!(
            self,
            Event::Fragment { .. } | Event::LevelTick { .. } | Event::LevelSampled { .. }
        )
    }
}

/// Effects to be executed after a state transition.
/// The effect runner handles these, in order, before the next event.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Drop any data left over from a previous session.
    ResetCapture,
    /// Ask the permission gate, then open the input stream.
    AcquireInput {
        id: Uuid,
    },
    PauseInput,
    /// Continue the paused stream. A failure is reported for `id`.
    ResumeInput {
        id: Uuid,
    },
    /// Close the input stream and analysis buffers. Idempotent.
    ReleaseInput,
    /// Start the level and duration timers for this session.
    StartTimers {
        id: Uuid,
    },
    /// Cancel every active timer. Idempotent.
    CancelTimers,
    AppendChunk {
        chunk: AudioChunk,
    },
    SampleLevel {
        id: Uuid,
    },
    /// Encode the recorded chunks into the artifact.
    FinalizeArtifact {
        id: Uuid,
    },
    /// Discard recorded chunks without producing an artifact.
    DiscardCapture,
    /// Hand the artifact to the host's completion callback.
    DeliverArtifact {
        artifact: Artifact,
    },
    Notify {
        notice: Notice,
    },
    /// Signal to publish the view to the host
    EmitUi,
}

/// Leave Recording/Paused for Finalizing.
fn begin_finalizing(session_id: Uuid, elapsed_secs: u32) -> (State, Vec<Effect>) {
    use Effect::*;
    (
        State::Finalizing {
            session_id,
            elapsed_secs,
        },
        vec![
            CancelTimers,
            ReleaseInput,
            FinalizeArtifact { id: session_id },
            EmitUi,
        ],
    )
}

/// Move any active session to Failed, releasing everything it holds.
fn fail_session(session_id: Uuid, err: &CaptureError) -> (State, Vec<Effect>) {
    use Effect::*;
    let message = err.to_string();
    (
        State::Failed {
            session_id,
            message: message.clone(),
        },
        vec![
            CancelTimers,
            ReleaseInput,
            DiscardCapture,
            Notify {
                notice: Notice::recording_interrupted(&message),
            },
            EmitUi,
        ],
    )
}

/// Reducer function: (state, event) -> (next_state, effects)
///
/// Key rules:
/// - Never mutate state directly
/// - Ignore events with stale session IDs
/// - Always emit EmitUi after visible state changes
pub fn reduce(state: &State, event: Event, limits: &SessionLimits) -> (State, Vec<Effect>) {
    use Effect::*;
    use Event::*;

    // Events from another session (late ticks, late device callbacks) are dropped.
    if let Some(eid) = event.session_id() {
        if state.session_id() != Some(eid) {
            if !event.is_chatty() {
                log::debug!("Dropping stale event for session {} in {}", eid, state.name());
            }
            return (state.clone(), vec![]);
        }
    }

    match (state, event) {
        // -----------------
        // Teardown: valid from anywhere
        // -----------------
        (_, Teardown) => (
            State::default(),
            vec![CancelTimers, ReleaseInput, DiscardCapture],
        ),

        // -----------------
        // Idle / terminal states: start a brand-new session
        // -----------------
        (State::Idle { permission_modal }, Start) => {
            let session_id = Uuid::new_v4();
            (
                State::AwaitingPermission {
                    session_id,
                    retry: *permission_modal,
                },
                vec![ResetCapture, EmitUi, AcquireInput { id: session_id }],
            )
        }
        (State::Completed { .. } | State::Failed { .. }, Start) => {
            let session_id = Uuid::new_v4();
            (
                State::AwaitingPermission {
                    session_id,
                    retry: false,
                },
                vec![ResetCapture, EmitUi, AcquireInput { id: session_id }],
            )
        }
        // One stream at a time: a second start is refused.
        (s, Start) if s.is_active() => {
            log::warn!("Start ignored: a session is already {}", s.name());
            (state.clone(), vec![])
        }
        (
            State::Idle {
                permission_modal: true,
            },
            DismissPermissionModal,
        ) => (
            State::Idle {
                permission_modal: false,
            },
            vec![EmitUi],
        ),

        // -----------------
        // AwaitingPermission
        // -----------------
        (State::AwaitingPermission { retry, .. }, PermissionDenied { reason, .. }) => {
            log::info!("Microphone access denied: {}", reason);
            let mut effects = vec![ReleaseInput];
            if *retry {
                effects.push(Notify {
                    notice: Notice::permission_denied(),
                });
            }
            effects.push(EmitUi);
            (
                State::Idle {
                    permission_modal: true,
                },
                effects,
            )
        }
        (State::AwaitingPermission { session_id, .. }, InputReady { .. }) => (
            State::Recording {
                session_id: *session_id,
                elapsed_secs: 0,
                level: 0.0,
            },
            vec![StartTimers { id: *session_id }, EmitUi],
        ),
        (State::AwaitingPermission { .. }, InputFailed { err, .. }) => (
            State::default(),
            vec![
                ReleaseInput,
                DiscardCapture,
                Notify {
                    notice: Notice::recording_start_failed(&err.to_string()),
                },
                EmitUi,
            ],
        ),

        // -----------------
        // Recording
        // -----------------
        (State::Recording { .. }, Fragment { chunk, .. }) => {
            (state.clone(), vec![AppendChunk { chunk }])
        }
        (State::Recording { session_id, .. }, LevelTick { .. }) => {
            (state.clone(), vec![SampleLevel { id: *session_id }])
        }
        (
            State::Recording {
                session_id,
                elapsed_secs,
                ..
            },
            LevelSampled { level, .. },
        ) => (
            State::Recording {
                session_id: *session_id,
                elapsed_secs: *elapsed_secs,
                level: if level.is_finite() {
                    level.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            },
            vec![EmitUi],
        ),
        // Tick during recording - advance and check the ceiling
        (
            State::Recording {
                session_id,
                elapsed_secs,
                level,
            },
            DurationTick { .. },
        ) => {
            let elapsed = elapsed_secs
                .saturating_add(1)
                .min(limits.max_duration_secs);
            if elapsed >= limits.max_duration_secs {
                log::info!(
                    "Recording {} auto-stopped after {}s (max duration reached)",
                    session_id,
                    elapsed
                );
                begin_finalizing(*session_id, elapsed)
            } else {
                (
                    State::Recording {
                        session_id: *session_id,
                        elapsed_secs: elapsed,
                        level: *level,
                    },
                    vec![EmitUi],
                )
            }
        }
        (
            State::Recording {
                session_id,
                elapsed_secs,
                ..
            },
            Pause,
        ) => (
            State::Paused {
                session_id: *session_id,
                elapsed_secs: *elapsed_secs,
            },
            vec![CancelTimers, PauseInput, EmitUi],
        ),
        (
            State::Recording {
                session_id,
                elapsed_secs,
                ..
            },
            Stop,
        ) => begin_finalizing(*session_id, *elapsed_secs),

        // -----------------
        // Paused
        // -----------------
        (
            State::Paused {
                session_id,
                elapsed_secs,
            },
            Resume,
        ) => (
            State::Recording {
                session_id: *session_id,
                elapsed_secs: *elapsed_secs,
                level: 0.0,
            },
            vec![
                ResumeInput { id: *session_id },
                StartTimers { id: *session_id },
                EmitUi,
            ],
        ),
        (
            State::Paused {
                session_id,
                elapsed_secs,
            },
            Stop,
        ) => begin_finalizing(*session_id, *elapsed_secs),

        // -----------------
        // Finalizing
        // -----------------
        (
            State::Finalizing {
                session_id,
                elapsed_secs,
            },
            ArtifactReady { artifact, .. },
        ) => (
            State::Completed {
                session_id: *session_id,
                elapsed_secs: *elapsed_secs,
                artifact: artifact.clone(),
            },
            vec![DeliverArtifact { artifact }, EmitUi],
        ),
        (State::Finalizing { session_id, .. }, ArtifactFailed { err, .. }) => {
            fail_session(*session_id, &err)
        }

        // -----------------
        // Hardware failure while the session holds the device
        // -----------------
        (s, HardwareError { err, .. }) if s.is_active() => {
            let session_id = s.session_id().unwrap_or_else(Uuid::nil);
            fail_session(session_id, &err)
        }

        // -----------------
        // Unhandled: no transition
        // -----------------
        _ => (state.clone(), vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    fn limits(max: u32) -> SessionLimits {
        SessionLimits {
            max_duration_secs: max,
        }
    }

    fn recording(id: Uuid, elapsed_secs: u32) -> State {
        State::Recording {
            session_id: id,
            elapsed_secs,
            level: 0.0,
        }
    }

    fn has(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
        effects.iter().any(pred)
    }

    fn artifact(id: Uuid) -> Artifact {
        Artifact::encode(id, AudioFormat::default(), &[AudioChunk::silence(8)]).unwrap()
    }

    #[test]
    fn idle_start_transitions_to_awaiting_permission() {
        let (next, effects) = reduce(&State::default(), Event::Start, &limits(30));
        assert!(matches!(next, State::AwaitingPermission { retry: false, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::AcquireInput { .. })));
        assert!(has(&effects, |e| matches!(e, Effect::ResetCapture)));
        assert!(has(&effects, |e| matches!(e, Effect::EmitUi)));
    }

    #[test]
    fn input_ready_starts_recording_and_timers() {
        let id = Uuid::new_v4();
        let state = State::AwaitingPermission {
            session_id: id,
            retry: false,
        };
        let (next, effects) = reduce(&state, Event::InputReady { id }, &limits(30));
        assert!(matches!(next, State::Recording { elapsed_secs: 0, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::StartTimers { id: t } if *t == id)));
    }

    #[test]
    fn denied_permission_returns_to_idle_with_modal() {
        let id = Uuid::new_v4();
        let state = State::AwaitingPermission {
            session_id: id,
            retry: false,
        };
        let (next, effects) = reduce(
            &state,
            Event::PermissionDenied {
                id,
                reason: "denied".to_string(),
            },
            &limits(30),
        );
        assert!(matches!(
            next,
            State::Idle {
                permission_modal: true
            }
        ));
        // First denial shows the modal only
        assert!(!has(&effects, |e| matches!(e, Effect::Notify { .. })));
    }

    #[test]
    fn denied_retry_keeps_modal_and_notifies() {
        let (awaiting, _) = reduce(
            &State::Idle {
                permission_modal: true,
            },
            Event::Start,
            &limits(30),
        );
        let id = awaiting.session_id().unwrap();
        assert!(matches!(awaiting, State::AwaitingPermission { retry: true, .. }));

        let (next, effects) = reduce(
            &awaiting,
            Event::PermissionDenied {
                id,
                reason: "denied".to_string(),
            },
            &limits(30),
        );
        assert!(matches!(
            next,
            State::Idle {
                permission_modal: true
            }
        ));
        assert!(has(&effects, |e| matches!(
            e,
            Effect::Notify { notice } if notice.title == "Permission Denied"
        )));
    }

    #[test]
    fn dismissing_modal_hides_it() {
        let (next, effects) = reduce(
            &State::Idle {
                permission_modal: true,
            },
            Event::DismissPermissionModal,
            &limits(30),
        );
        assert!(matches!(
            next,
            State::Idle {
                permission_modal: false
            }
        ));
        assert!(has(&effects, |e| matches!(e, Effect::EmitUi)));
    }

    #[test]
    fn acquisition_failure_returns_to_idle_with_one_notice() {
        let id = Uuid::new_v4();
        let state = State::AwaitingPermission {
            session_id: id,
            retry: false,
        };
        let (next, effects) = reduce(
            &state,
            Event::InputFailed {
                id,
                err: CaptureError::DeviceBusy,
            },
            &limits(30),
        );
        assert!(matches!(
            next,
            State::Idle {
                permission_modal: false
            }
        ));
        let notices = effects
            .iter()
            .filter(|e| matches!(e, Effect::Notify { .. }))
            .count();
        assert_eq!(notices, 1);
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseInput)));
    }

    #[test]
    fn start_is_refused_while_session_active() {
        let id = Uuid::new_v4();
        for state in [
            State::AwaitingPermission {
                session_id: id,
                retry: false,
            },
            recording(id, 3),
            State::Paused {
                session_id: id,
                elapsed_secs: 3,
            },
            State::Finalizing {
                session_id: id,
                elapsed_secs: 3,
            },
        ] {
            let (next, effects) = reduce(&state, Event::Start, &limits(30));
            assert_eq!(next.session_id(), Some(id));
            assert!(effects.is_empty(), "start must be refused in {}", state.name());
        }
    }

    #[test]
    fn start_after_completed_creates_new_session() {
        let old = Uuid::new_v4();
        let state = State::Completed {
            session_id: old,
            elapsed_secs: 5,
            artifact: artifact(old),
        };
        let (next, effects) = reduce(&state, Event::Start, &limits(30));
        assert!(matches!(next, State::AwaitingPermission { session_id, .. } if session_id != old));
        assert!(has(&effects, |e| matches!(e, Effect::ResetCapture)));
    }

    #[test]
    fn duration_ticks_auto_stop_exactly_at_ceiling() {
        let id = Uuid::new_v4();
        let limits = limits(3);
        let mut state = recording(id, 0);

        for expected in 1..3 {
            let (next, effects) = reduce(&state, Event::DurationTick { id }, &limits);
            assert!(matches!(
                next,
                State::Recording { elapsed_secs, .. } if elapsed_secs == expected
            ));
            assert!(!has(&effects, |e| matches!(e, Effect::FinalizeArtifact { .. })));
            state = next;
        }

        let (next, effects) = reduce(&state, Event::DurationTick { id }, &limits);
        assert!(matches!(next, State::Finalizing { elapsed_secs: 3, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::CancelTimers)));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseInput)));
        assert!(has(&effects, |e| matches!(e, Effect::FinalizeArtifact { .. })));
    }

    #[test]
    fn elapsed_never_exceeds_ceiling() {
        let id = Uuid::new_v4();
        // A state already at the ceiling (e.g. limits changed) still clamps.
        let (next, _) = reduce(&recording(id, 10), Event::DurationTick { id }, &limits(5));
        assert_eq!(next.elapsed_secs(), 5);
        assert!(matches!(next, State::Finalizing { .. }));
    }

    #[test]
    fn pause_freezes_and_resume_preserves_elapsed() {
        let id = Uuid::new_v4();
        let (paused, effects) = reduce(&recording(id, 7), Event::Pause, &limits(30));
        assert!(matches!(paused, State::Paused { elapsed_secs: 7, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::CancelTimers)));
        assert!(has(&effects, |e| matches!(e, Effect::PauseInput)));

        // Ticks that were already queued are ignored while paused.
        let (still, effects) = reduce(&paused, Event::DurationTick { id }, &limits(30));
        assert!(matches!(still, State::Paused { elapsed_secs: 7, .. }));
        assert!(effects.is_empty());

        let (resumed, effects) = reduce(&still, Event::Resume, &limits(30));
        assert!(matches!(resumed, State::Recording { elapsed_secs: 7, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::StartTimers { .. })));
        assert!(has(&effects, |e| matches!(e, Effect::ResumeInput { .. })));
    }

    #[test]
    fn fragments_append_only_while_recording() {
        let id = Uuid::new_v4();
        let chunk = AudioChunk::silence(4);

        let (_, effects) = reduce(
            &recording(id, 1),
            Event::Fragment {
                id,
                chunk: chunk.clone(),
            },
            &limits(30),
        );
        assert!(has(&effects, |e| matches!(e, Effect::AppendChunk { .. })));

        let paused = State::Paused {
            session_id: id,
            elapsed_secs: 1,
        };
        let (_, effects) = reduce(&paused, Event::Fragment { id, chunk }, &limits(30));
        assert!(effects.is_empty());
    }

    #[test]
    fn level_sample_is_clamped() {
        let id = Uuid::new_v4();
        let (next, _) = reduce(
            &recording(id, 0),
            Event::LevelSampled { id, level: 4.0 },
            &limits(30),
        );
        assert!(matches!(next, State::Recording { level, .. } if level == 1.0));

        let (next, _) = reduce(
            &recording(id, 0),
            Event::LevelSampled {
                id,
                level: f32::NAN,
            },
            &limits(30),
        );
        assert!(matches!(next, State::Recording { level, .. } if level == 0.0));
    }

    #[test]
    fn stop_from_paused_finalizes() {
        let id = Uuid::new_v4();
        let paused = State::Paused {
            session_id: id,
            elapsed_secs: 4,
        };
        let (next, effects) = reduce(&paused, Event::Stop, &limits(30));
        assert!(matches!(next, State::Finalizing { elapsed_secs: 4, .. }));
        assert!(has(&effects, |e| matches!(e, Effect::FinalizeArtifact { .. })));
    }

    #[test]
    fn artifact_ready_completes_and_delivers_once() {
        let id = Uuid::new_v4();
        let state = State::Finalizing {
            session_id: id,
            elapsed_secs: 5,
        };
        let (next, effects) = reduce(
            &state,
            Event::ArtifactReady {
                id,
                artifact: artifact(id),
            },
            &limits(30),
        );
        assert!(matches!(next, State::Completed { elapsed_secs: 5, .. }));
        let deliveries = effects
            .iter()
            .filter(|e| matches!(e, Effect::DeliverArtifact { .. }))
            .count();
        assert_eq!(deliveries, 1);

        // A duplicate ready event has nothing to act on.
        let (again, effects) = reduce(
            &next,
            Event::ArtifactReady {
                id,
                artifact: artifact(id),
            },
            &limits(30),
        );
        assert!(matches!(again, State::Completed { .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn hardware_error_fails_session_and_discards() {
        let id = Uuid::new_v4();
        let (next, effects) = reduce(
            &recording(id, 2),
            Event::HardwareError {
                id,
                err: CaptureError::StreamFailed("unplugged".to_string()),
            },
            &limits(30),
        );
        assert!(matches!(next, State::Failed { ref message, .. } if message.contains("unplugged")));
        assert!(has(&effects, |e| matches!(e, Effect::ReleaseInput)));
        assert!(has(&effects, |e| matches!(e, Effect::DiscardCapture)));
        assert!(has(&effects, |e| matches!(e, Effect::CancelTimers)));
    }

    #[test]
    fn encoder_failure_fails_session() {
        let id = Uuid::new_v4();
        let state = State::Finalizing {
            session_id: id,
            elapsed_secs: 2,
        };
        let (next, _) = reduce(
            &state,
            Event::ArtifactFailed {
                id,
                err: CaptureError::EncodingFailed("disk".to_string()),
            },
            &limits(30),
        );
        assert!(matches!(next, State::Failed { .. }));
    }

    #[test]
    fn stale_event_is_ignored() {
        let id = Uuid::new_v4();
        let stale = Uuid::new_v4();
        let (next, effects) = reduce(
            &recording(id, 2),
            Event::DurationTick { id: stale },
            &limits(30),
        );
        assert!(matches!(next, State::Recording { elapsed_secs: 2, .. }));
        assert!(effects.is_empty());
    }

    #[test]
    fn ticks_after_stop_do_not_mutate() {
        let id = Uuid::new_v4();
        let (finalizing, _) = reduce(&recording(id, 2), Event::Stop, &limits(30));
        for event in [
            Event::DurationTick { id },
            Event::LevelTick { id },
            Event::LevelSampled { id, level: 0.5 },
        ] {
            let (next, effects) = reduce(&finalizing, event, &limits(30));
            assert!(matches!(next, State::Finalizing { elapsed_secs: 2, .. }));
            assert!(effects.is_empty());
        }
    }

    #[test]
    fn teardown_releases_from_any_state() {
        let id = Uuid::new_v4();
        for state in [
            State::default(),
            State::AwaitingPermission {
                session_id: id,
                retry: false,
            },
            recording(id, 1),
            State::Paused {
                session_id: id,
                elapsed_secs: 1,
            },
        ] {
            let (next, effects) = reduce(&state, Event::Teardown, &limits(30));
            assert!(matches!(next, State::Idle { .. }));
            assert!(has(&effects, |e| matches!(e, Effect::ReleaseInput)));
            assert!(has(&effects, |e| matches!(e, Effect::CancelTimers)));
        }
    }
}
