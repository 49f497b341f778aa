//! WebSocket upgrade handler and per-session driver.
//!
//! Both halves feed events into [`step`](crate::session::machine::step) and
//! carry out whatever effects come back. The handler owns everything up to the
//! 101 response; [`run_session`] owns the socket afterwards.

use std::time::Duration;

use axum::{
    extract::{
        ws::{
            close_code, rejection::WebSocketUpgradeRejection, CloseFrame, Message, WebSocket,
            WebSocketUpgrade,
        },
        State,
    },
    Extension,
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::http::GatewayState;
use crate::net::connection::AbortConnection;
use crate::net::ConnectionPermit;
use crate::project::RoomToken;
use crate::session::engine::SyncPeer;
use crate::session::machine::{
    step, CloseReason, Effect, Lookup, Rejection, UpgradeEvent, UpgradeState,
};
use crate::session::registry::SessionGuard;

/// Frames buffered between the socket reader and the sync engine.
const INBOUND_BUFFER: usize = 64;

/// Frames buffered between the sync engine and the socket writer.
const OUTBOUND_BUFFER: usize = 64;

/// How long a closing session waits for queued frames to flush.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Handle a request for `/yjs` or anything below it.
///
/// The connection permit, when present, moves into the session and is
/// released only when the socket closes.
pub async fn room_upgrade(
    State(state): State<GatewayState>,
    uri: Uri,
    mut permit: Option<Extension<ConnectionPermit>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let policy = state.room_check;
    let path = uri.path();
    let mut transition = step(UpgradeState::Pending, UpgradeEvent::Requested { path }, policy);

    // A well-formed room path that is not a WebSocket handshake gets the
    // extractor's own answer. Nothing is looked up or touched.
    let mut ws = match ws {
        Ok(ws) => Some(ws),
        Err(rejection) if transition.state.room().is_some() => return rejection.into_response(),
        Err(_) => None,
    };

    loop {
        let mut next = None;

        for effect in std::mem::take(&mut transition.effects) {
            match effect {
                Effect::Abort => {
                    tracing::warn!(path = %path, "Malformed room path, dropping connection");
                    state.metrics.record_rejection(Rejection::MalformedPath.as_str());
                    return abort();
                }
                Effect::CheckExists(room) => {
                    let lookup = match state.store.exists(&room).await {
                        Ok(true) => Lookup::Found,
                        Ok(false) => Lookup::Missing,
                        Err(e) => {
                            tracing::error!(room = %room, error = %e, "Existence check failed");
                            Lookup::Failed
                        }
                    };
                    next = Some(UpgradeEvent::ExistenceChecked(lookup));
                }
                Effect::Refuse(rejection) => {
                    tracing::warn!(path = %path, reason = rejection.as_str(), "Upgrade refused");
                    state.metrics.record_rejection(rejection.as_str());
                    return refuse(rejection);
                }
                Effect::TouchActivity(room) => {
                    state.liveness.touch(&room);
                }
                Effect::CompleteHandshake(room) => {
                    let Some(ws) = ws.take() else {
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    };
                    tracing::debug!(room = %room, "Completing handshake");
                    let accepted = transition.state.clone();
                    let state = state.clone();
                    let permit = permit.take().map(|Extension(permit)| permit);
                    return ws.on_upgrade(move |socket| async move {
                        run_session(socket, state, accepted).await;
                        drop(permit);
                    });
                }
                other => {
                    tracing::trace!(effect = ?other, "Effect not applicable before handshake");
                }
            }
        }

        match next {
            Some(event) => transition = step(transition.state, event, policy),
            None => break,
        }
    }

    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// A response that never reaches the wire: the connection is dropped instead.
fn abort() -> Response {
    let mut response = StatusCode::BAD_REQUEST.into_response();
    response.extensions_mut().insert(AbortConnection);
    response
}

fn refuse(rejection: Rejection) -> Response {
    let status = match rejection {
        Rejection::UnknownRoom => StatusCode::NOT_FOUND,
        Rejection::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        Rejection::MalformedPath => StatusCode::BAD_REQUEST,
    };
    (status, [(header::CONNECTION, HeaderValue::from_static("close"))]).into_response()
}

/// Drive one accepted socket until it closes.
pub async fn run_session(socket: WebSocket, state: GatewayState, accepted: UpgradeState) {
    let policy = state.room_check;
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);

    let mut writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut shutdown = state.shutdown.subscribe();
    let mut inbound_tx: Option<mpsc::Sender<Message>> = None;
    let mut guard: Option<SessionGuard> = None;

    let transition = step(accepted, UpgradeEvent::HandshakeCompleted, policy);
    let mut machine = transition.state;
    for effect in transition.effects {
        match effect {
            Effect::CountConnection(room) => state.metrics.record_connection(&room),
            Effect::RegisterSession(room) => {
                guard = Some(state.sessions.register(room, state.clock.now()));
            }
            Effect::HandOff(room) => {
                let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
                inbound_tx = Some(tx);
                let peer = SyncPeer {
                    session_id: guard.as_ref().map(SessionGuard::id).unwrap_or_default(),
                    room,
                    inbound: rx,
                    outbound: outbound_tx.clone(),
                };
                let engine = state.engine.clone();
                tokio::spawn(async move { engine.serve(peer).await });
            }
            other => tracing::trace!(effect = ?other, "Effect not applicable at handshake"),
        }
    }

    let session_id = guard.as_ref().map(SessionGuard::id).unwrap_or_default();
    let room = machine.room().cloned();
    let room_sessions = |room: &Option<RoomToken>| room.as_ref().map(|r| state.sessions.sessions_in(r));
    tracing::info!(
        session_id = %session_id,
        room = ?room.as_ref().map(|r| r.as_str()),
        room_sessions = ?room_sessions(&room),
        "Session opened"
    );

    let reason = if state.shutdown.is_triggered() {
        send_going_away(&outbound_tx).await;
        CloseReason::ServerShutdown
    } else {
        'session: loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Close(_))) => break CloseReason::Client,
                    Some(Ok(message)) => {
                        let transition = step(machine, UpgradeEvent::FrameReceived, policy);
                        machine = transition.state;
                        let mut message = Some(message);
                        for effect in transition.effects {
                            match effect {
                                Effect::TouchActivity(room) => {
                                    state.liveness.touch(&room);
                                }
                                Effect::Forward => {
                                    let Some(message) = message.take() else { continue };
                                    // A stalled engine must not hide shutdown.
                                    tokio::select! {
                                        _ = forward(inbound_tx.as_ref(), message) => {}
                                        _ = shutdown.recv() => {
                                            send_going_away(&outbound_tx).await;
                                            break 'session CloseReason::ServerShutdown;
                                        }
                                    }
                                }
                                other => tracing::trace!(effect = ?other, "Effect not applicable to a frame"),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(session_id = %session_id, error = %e, "Socket read failed");
                        break CloseReason::Transport;
                    }
                    None => break CloseReason::Transport,
                },
                _ = shutdown.recv() => {
                    send_going_away(&outbound_tx).await;
                    break CloseReason::ServerShutdown;
                }
            }
        }
    };

    let transition = step(machine, UpgradeEvent::SocketClosed(reason), policy);
    for effect in transition.effects {
        if effect == Effect::DiscardSession {
            drop(inbound_tx.take());
            drop(guard.take());
        }
    }
    drop(outbound_tx);

    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!(
        session_id = %session_id,
        reason = reason.as_str(),
        room_sessions = ?room_sessions(&room),
        "Session closed"
    );
}

/// Hand data frames to the engine. Control frames stop at the gateway.
async fn forward(inbound: Option<&mpsc::Sender<Message>>, message: Message) {
    let Some(inbound) = inbound else {
        return;
    };
    if matches!(message, Message::Binary(_) | Message::Text(_)) && inbound.send(message).await.is_err() {
        tracing::debug!("Sync engine stopped reading");
    }
}

async fn send_going_away(outbound: &mpsc::Sender<Message>) {
    let frame = CloseFrame {
        code: close_code::AWAY,
        reason: "server shutting down".into(),
    };
    let _ = outbound.send(Message::Close(Some(frame))).await;
}
