//! # Session Arbiter
//!
//! Process-wide authority on which logical audio role currently owns the
//! exclusive output resource. A pure coordination primitive, one atomic
//! token plus a watch channel with no I/O, safe to query and update from any
//! thread, including other producers' callbacks racing the engine's own
//! resume attempts.
//!
//! Policy: [`SessionRole::VoiceMessage`] and [`SessionRole::Recording`]
//! preempt [`SessionRole::AmbientMedia`] in a single atomic swap, so there
//! is never an instant with two exclusive holders. Ambient never displaces
//! either of them, and the two exclusive roles never displace each other.
//! Denied requests are a normal deferred state: the loser subscribes to role
//! changes and retries when the holder releases.

use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Logical owner of the exclusive audio output resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionRole {
    None = 0,
    AmbientMedia = 1,
    VoiceMessage = 2,
    Recording = 3,
}

impl SessionRole {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionRole::AmbientMedia,
            2 => SessionRole::VoiceMessage,
            3 => SessionRole::Recording,
            _ => SessionRole::None,
        }
    }

    /// Returns `true` for roles that take the session away from ambient
    /// playback.
    pub fn preempts_ambient(&self) -> bool {
        matches!(self, SessionRole::VoiceMessage | SessionRole::Recording)
    }

    /// Stable string name, used in events and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionRole::None => "none",
            SessionRole::AmbientMedia => "ambient_media",
            SessionRole::VoiceMessage => "voice_message",
            SessionRole::Recording => "recording",
        }
    }
}

/// Outcome of a role request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDecision {
    Granted,
    /// The request lost to the role currently holding the session.
    Denied { held_by: SessionRole },
}

impl RoleDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, RoleDecision::Granted)
    }
}

/// The process-wide role token.
///
/// Construct one at startup and share it by `Arc` with every audio producer;
/// there is deliberately no global instance.
pub struct SessionArbiter {
    role: AtomicU8,
    changes: watch::Sender<SessionRole>,
}

impl SessionArbiter {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(SessionRole::None);
        Self {
            role: AtomicU8::new(SessionRole::None as u8),
            changes,
        }
    }

    /// The role currently holding the session.
    pub fn current_role(&self) -> SessionRole {
        SessionRole::from_u8(self.role.load(Ordering::Acquire))
    }

    /// Request exclusive ownership for `role`.
    ///
    /// Re-requesting the currently held role is granted (idempotent), which
    /// is what makes defensive re-assertion during recovery cheap.
    pub fn request_role(&self, role: SessionRole) -> RoleDecision {
        if role == SessionRole::None {
            return RoleDecision::Granted;
        }

        let mut current = self.role.load(Ordering::Acquire);
        loop {
            let held = SessionRole::from_u8(current);
            if held == role {
                return RoleDecision::Granted;
            }
            if !Self::may_displace(role, held) {
                return RoleDecision::Denied { held_by: held };
            }
            match self.role.compare_exchange(
                current,
                role as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(from = held.as_str(), to = role.as_str(), "audio role granted");
                    self.changes.send_replace(role);
                    return RoleDecision::Granted;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Release `role` if it is the current holder; otherwise a no-op, so a
    /// preempted holder releasing late never clobbers the winner.
    pub fn release_role(&self, role: SessionRole) {
        if role == SessionRole::None {
            return;
        }
        if self
            .role
            .compare_exchange(
                role as u8,
                SessionRole::None as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            debug!(role = role.as_str(), "audio role released");
            self.changes.send_replace(SessionRole::None);
        }
    }

    /// Observe role transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionRole> {
        self.changes.subscribe()
    }

    fn may_displace(requested: SessionRole, held: SessionRole) -> bool {
        match held {
            SessionRole::None => true,
            // Voice and recording preempt ambient; nothing displaces them.
            SessionRole::AmbientMedia => requested.preempts_ambient(),
            SessionRole::VoiceMessage | SessionRole::Recording => false,
        }
    }
}

impl Default for SessionArbiter {
    fn default() -> Self {
        Self::new()
    }
}
