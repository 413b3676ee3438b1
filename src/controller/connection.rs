//! Per-connection task: framed I/O, the handshake, request forwarding and
//! event delivery.
//!
//! The first frame must be `hello`; anything else closes the connection.
//! After the handshake the task forwards each request to the controller
//! loop and waits for its reply, while also draining the connection's
//! event channel for unsolicited `event` frames. On exit the loop is told
//! to forget the connection.

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::ipc::codec::{CodecError, DecodeResult, FrameCodec, decode_frame};
use crate::ipc::protocol::{Message, Status};

use super::handler::error_response;
use super::state::ConnectionId;

/// Request forwarded from a connection task to the controller loop.
#[derive(Debug)]
pub struct ControllerCommand {
    pub request: Message,
    pub response_tx: oneshot::Sender<Message>,
    pub connection_id: ConnectionId,
}

#[derive(Debug)]
pub struct DisconnectNotice {
    pub connection_id: ConnectionId,
}

#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("unexpected EOF during handshake")]
    HandshakeEof,
    #[error("first message must be hello")]
    NotHello,
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] rmp_serde::decode::Error),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("controller loop closed")]
    ControllerGone,
    #[error("response channel closed")]
    ResponseDropped,
}

pub fn spawn_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    event_rx: mpsc::UnboundedReceiver<Message>,
    disconnect_tx: mpsc::UnboundedSender<DisconnectNotice>,
) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(stream, conn_id, cmd_tx, event_rx).await {
            tracing::debug!(?conn_id, error = %e, "connection closed");
        }
        let _ = disconnect_tx.send(DisconnectNotice {
            connection_id: conn_id,
        });
    });
}

async fn handle_connection(
    stream: UnixStream,
    conn_id: ConnectionId,
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    mut event_rx: mpsc::UnboundedReceiver<Message>,
) -> Result<(), ConnectionError> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    let first_frame = framed.next().await.ok_or(ConnectionError::HandshakeEof)??;
    let hello = match decode_frame(&first_frame) {
        DecodeResult::Ok(msg @ Message::Hello { .. }) => msg,
        DecodeResult::Ok(_) | DecodeResult::UnknownType(_) => {
            return Err(ConnectionError::NotHello);
        }
        DecodeResult::Malformed(e) => return Err(e.into()),
    };

    let ack = send_command(&cmd_tx, hello, conn_id).await?;
    let rejected = matches!(
        ack,
        Message::HelloAck {
            status: Status::Error,
            ..
        }
    );
    framed.send(ack).await?;
    if rejected {
        return Ok(());
    }

    loop {
        tokio::select! {
            frame = framed.next() => {
                let raw = match frame {
                    Some(raw) => raw?,
                    None => return Ok(()),
                };
                let response = match decode_frame(&raw) {
                    DecodeResult::Ok(msg) => send_command(&cmd_tx, msg, conn_id).await?,
                    DecodeResult::UnknownType(envelope) => {
                        tracing::debug!(?conn_id, msg_type = %envelope.msg_type, "unknown message type");
                        error_response(envelope.id, "unknown_type")
                    }
                    DecodeResult::Malformed(e) => return Err(e.into()),
                };
                framed.send(response).await?;
            }
            event = event_rx.recv() => match event {
                Some(msg) => framed.send(msg).await?,
                None => return Ok(()),
            },
        }
    }
}

async fn send_command(
    cmd_tx: &mpsc::UnboundedSender<ControllerCommand>,
    request: Message,
    conn_id: ConnectionId,
) -> Result<Message, ConnectionError> {
    let (response_tx, response_rx) = oneshot::channel();
    cmd_tx
        .send(ControllerCommand {
            request,
            response_tx,
            connection_id: conn_id,
        })
        .map_err(|_| ConnectionError::ControllerGone)?;
    response_rx
        .await
        .map_err(|_| ConnectionError::ResponseDropped)
}
