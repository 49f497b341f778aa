//! Upgrade and session state machine.
//!
//! # States
//! ```text
//! Pending ──Requested──▶ Validating ──Found──▶ Accepted ──Handshake──▶ Active ──Closed──▶ Closed
//!    │                      │ Missing/Failed                             ▲  │
//!    │ malformed path       ▼                                            └──┘ Frame
//!    └────────────────▶ Rejected
//! ```
//!
//! Permissive admission skips `Validating` and goes straight to `Accepted`.
//!
//! [`step`] is pure: it returns the next state and the effects the driver must
//! perform, in order. Events that make no sense in the current state leave it
//! unchanged and produce no effects.

use crate::config::ExistenceCheck;
use crate::project::{InvalidToken, RoomToken};

/// Path prefix under which rooms are served.
pub const ROOM_PATH_PREFIX: &str = "/yjs/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeState {
    Pending,
    Validating { room: RoomToken },
    Accepted { room: RoomToken },
    Active { room: RoomToken },
    Closed { room: RoomToken, reason: CloseReason },
    Rejected(Rejection),
}

impl UpgradeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpgradeState::Closed { .. } | UpgradeState::Rejected(_))
    }

    pub fn room(&self) -> Option<&RoomToken> {
        match self {
            UpgradeState::Validating { room }
            | UpgradeState::Accepted { room }
            | UpgradeState::Active { room }
            | UpgradeState::Closed { room, .. } => Some(room),
            UpgradeState::Pending | UpgradeState::Rejected(_) => None,
        }
    }
}

/// Why an upgrade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No token, or a token with forbidden characters.
    MalformedPath,
    /// Strict admission and the room is not in the existence index.
    UnknownRoom,
    /// Strict admission and the store could not answer.
    StoreUnavailable,
}

impl Rejection {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::MalformedPath => "malformed_path",
            Rejection::UnknownRoom => "unknown_room",
            Rejection::StoreUnavailable => "store_unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame from the client.
    Client,
    /// Stream ended or errored without a close frame.
    Transport,
    ServerShutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Client => "client",
            CloseReason::Transport => "transport",
            CloseReason::ServerShutdown => "server_shutdown",
        }
    }
}

/// Result of an existence lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found,
    Missing,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeEvent<'a> {
    Requested { path: &'a str },
    ExistenceChecked(Lookup),
    HandshakeCompleted,
    FrameReceived,
    SocketClosed(CloseReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drop the connection without writing a response.
    Abort,
    /// Answer with a bare status line and close.
    Refuse(Rejection),
    CheckExists(RoomToken),
    /// Best-effort `lastActivityAt` write; never awaited.
    TouchActivity(RoomToken),
    CompleteHandshake(RoomToken),
    CountConnection(RoomToken),
    RegisterSession(RoomToken),
    /// Give the connection to the sync engine.
    HandOff(RoomToken),
    /// Pass the current frame through to the sync engine untouched.
    Forward,
    DiscardSession,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: UpgradeState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: UpgradeState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    fn ignored(state: UpgradeState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// Extract the room token from an upgrade path of the form `/yjs/{token}`.
pub fn room_from_path(path: &str) -> Result<RoomToken, InvalidToken> {
    let rest = path.strip_prefix(ROOM_PATH_PREFIX).ok_or(InvalidToken)?;
    RoomToken::parse(rest)
}

fn accept(room: RoomToken) -> Transition {
    Transition::to(
        UpgradeState::Accepted { room: room.clone() },
        vec![Effect::TouchActivity(room.clone()), Effect::CompleteHandshake(room)],
    )
}

/// Advance the machine by one event.
pub fn step(state: UpgradeState, event: UpgradeEvent<'_>, policy: ExistenceCheck) -> Transition {
    match (state, event) {
        (UpgradeState::Pending, UpgradeEvent::Requested { path }) => match room_from_path(path) {
            Err(InvalidToken) => Transition::to(
                UpgradeState::Rejected(Rejection::MalformedPath),
                vec![Effect::Abort],
            ),
            Ok(room) => match policy {
                ExistenceCheck::Strict => Transition::to(
                    UpgradeState::Validating { room: room.clone() },
                    vec![Effect::CheckExists(room)],
                ),
                ExistenceCheck::Permissive => accept(room),
            },
        },

        (UpgradeState::Validating { room }, UpgradeEvent::ExistenceChecked(lookup)) => match lookup {
            Lookup::Found => accept(room),
            Lookup::Missing => Transition::to(
                UpgradeState::Rejected(Rejection::UnknownRoom),
                vec![Effect::Refuse(Rejection::UnknownRoom)],
            ),
            Lookup::Failed => Transition::to(
                UpgradeState::Rejected(Rejection::StoreUnavailable),
                vec![Effect::Refuse(Rejection::StoreUnavailable)],
            ),
        },

        (UpgradeState::Accepted { room }, UpgradeEvent::HandshakeCompleted) => Transition::to(
            UpgradeState::Active { room: room.clone() },
            vec![
                Effect::CountConnection(room.clone()),
                Effect::RegisterSession(room.clone()),
                Effect::HandOff(room),
            ],
        ),

        (UpgradeState::Active { room }, UpgradeEvent::FrameReceived) => Transition::to(
            UpgradeState::Active { room: room.clone() },
            vec![Effect::TouchActivity(room), Effect::Forward],
        ),

        (UpgradeState::Active { room }, UpgradeEvent::SocketClosed(reason)) => Transition::to(
            UpgradeState::Closed { room, reason },
            vec![Effect::DiscardSession],
        ),

        // Handshake never finished; nothing was registered.
        (UpgradeState::Accepted { room }, UpgradeEvent::SocketClosed(reason)) => {
            Transition::ignored(UpgradeState::Closed { room, reason })
        }

        (state, _) => Transition::ignored(state),
    }
}
