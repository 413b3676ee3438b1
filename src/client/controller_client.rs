//! Connection to the controller daemon.
//!
//! Performs the handshake, then issues requests one at a time. A
//! subscribed connection also carries unsolicited events; any that arrive
//! while a response is awaited are queued for [`ControllerClient::next_event`].

use std::collections::VecDeque;
use std::path::Path;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;

use crate::controller;
use crate::ipc::codec::MessageCodec;
use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Snapshot, Status, UiEvent};

use super::ClientError;

/// Successful reply to a trigger.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TriggerReply {
    pub notice: Option<String>,
    pub path: Option<String>,
}

pub struct ControllerClient {
    framed: Framed<UnixStream, MessageCodec>,
    next_id: u32,
    pending_events: VecDeque<UiEvent>,
}

impl ControllerClient {
    /// Connect to the daemon's default socket.
    pub async fn connect() -> Result<Self, ClientError> {
        let socket_path = controller::socket_path().ok_or(ClientError::NoRuntimeDir)?;
        Self::connect_to(&socket_path).await
    }

    pub async fn connect_to(socket_path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ClientError::Controller(format!(
                "connect to {} failed: {e} (is `iowall daemon` running?)",
                socket_path.display()
            ))
        })?;
        let mut framed = Framed::new(stream, MessageCodec::new());

        framed
            .send(Message::Hello {
                id: 0,
                version: PROTOCOL_VERSION,
            })
            .await
            .map_err(|e| ClientError::Controller(format!("send hello: {e}")))?;

        match framed.next().await {
            Some(Ok(Message::HelloAck {
                status: Status::Ok, ..
            })) => {}
            Some(Ok(Message::HelloAck { error, .. })) => {
                return Err(ClientError::Controller(format!(
                    "handshake rejected: {}",
                    error.unwrap_or_default()
                )));
            }
            other => {
                return Err(ClientError::Controller(format!(
                    "unexpected handshake response: {other:?}"
                )));
            }
        }

        Ok(Self {
            framed,
            next_id: 1,
            pending_events: VecDeque::new(),
        })
    }

    /// Fire an action such as `change:nature` or `save`.
    pub async fn trigger(&mut self, action: &str) -> Result<TriggerReply, ClientError> {
        let response = self
            .request(action, |id| Message::Trigger {
                id,
                action: action.to_string(),
            })
            .await?;
        match response {
            Message::Response { notice, path, .. } => Ok(TriggerReply { notice, path }),
            other => Err(unexpected(action, &other)),
        }
    }

    pub async fn status(&mut self) -> Result<Snapshot, ClientError> {
        match self.request("status", |id| Message::Query { id }).await? {
            Message::Response {
                snapshot: Some(snapshot),
                ..
            } => Ok(snapshot),
            other => Err(unexpected("status", &other)),
        }
    }

    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        self.request("subscribe", |id| Message::Subscribe { id })
            .await
            .map(drop)
    }

    /// Next UI event, or `None` once the daemon closes the connection.
    pub async fn next_event(&mut self) -> Result<Option<UiEvent>, ClientError> {
        if let Some(event) = self.pending_events.pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.framed.next().await {
                Some(Ok(Message::Event { event, .. })) => return Ok(Some(event)),
                Some(Ok(other)) => {
                    tracing::debug!(?other, "ignoring non-event frame");
                }
                Some(Err(e)) => return Err(ClientError::Controller(format!("receive: {e}"))),
                None => return Ok(None),
            }
        }
    }

    /// Send one request and return its successful response.
    async fn request(
        &mut self,
        what: &str,
        build: impl FnOnce(u32) -> Message,
    ) -> Result<Message, ClientError> {
        let id = self.next_id;
        self.next_id += 1;

        self.framed
            .send(build(id))
            .await
            .map_err(|e| ClientError::Controller(format!("send {what}: {e}")))?;

        loop {
            match self.framed.next().await {
                Some(Ok(Message::Event { event, .. })) => self.pending_events.push_back(event),
                Some(Ok(
                    response @ Message::Response {
                        status: Status::Ok, ..
                    },
                )) => return Ok(response),
                Some(Ok(Message::Response { error, .. })) => {
                    return Err(ClientError::Rejected {
                        what: what.to_string(),
                        reason: error.unwrap_or_default(),
                    });
                }
                Some(Ok(other)) => return Err(unexpected(what, &other)),
                Some(Err(e)) => {
                    return Err(ClientError::Controller(format!("receive {what}: {e}")));
                }
                None => {
                    return Err(ClientError::Controller(format!(
                        "connection closed awaiting {what}"
                    )));
                }
            }
        }
    }
}

fn unexpected(what: &str, msg: &Message) -> ClientError {
    ClientError::Controller(format!("unexpected {what} response: {msg:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    use crate::wallpaper::Category;

    /// Accept one connection and answer with canned frames: a hello ack,
    /// then `script` for each request in turn.
    async fn fake_daemon(path: &Path, script: Vec<Vec<Message>>) -> tokio::task::JoinHandle<()> {
        let listener = UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, MessageCodec::new());
            let _hello = framed.next().await.unwrap().unwrap();
            framed
                .send(Message::HelloAck {
                    id: 0,
                    status: Status::Ok,
                    error: None,
                })
                .await
                .unwrap();
            for replies in script {
                let _request = framed.next().await.unwrap().unwrap();
                for reply in replies {
                    framed.send(reply).await.unwrap();
                }
            }
        })
    }

    fn response(id: u32, status: Status, error: Option<&str>) -> Message {
        Message::Response {
            id,
            status,
            error: error.map(Into::into),
            notice: None,
            path: None,
            snapshot: None,
        }
    }

    #[tokio::test]
    async fn events_before_response_are_queued() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("iowall.sock");
        let loading = UiEvent::loading(Category::Nature);
        let _daemon = fake_daemon(
            &sock,
            vec![vec![
                Message::Event {
                    id: 0,
                    event: loading.clone(),
                },
                response(1, Status::Ok, None),
                Message::Event {
                    id: 0,
                    event: UiEvent::Idle,
                },
            ]],
        )
        .await;

        let mut client = ControllerClient::connect_to(&sock).await.unwrap();
        assert_eq!(
            client.trigger("change:nature").await.unwrap(),
            TriggerReply::default()
        );
        assert_eq!(client.next_event().await.unwrap(), Some(loading));
        assert_eq!(client.next_event().await.unwrap(), Some(UiEvent::Idle));
        assert_eq!(client.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn error_response_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("iowall.sock");
        let _daemon = fake_daemon(&sock, vec![vec![response(1, Status::Error, Some("busy"))]]).await;

        let mut client = ControllerClient::connect_to(&sock).await.unwrap();
        let err = client.trigger("change:city").await.unwrap_err();
        assert!(
            matches!(err, ClientError::Rejected { ref reason, .. } if reason == "busy"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn connect_without_daemon_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ControllerClient::connect_to(&dir.path().join("none.sock"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("is `iowall daemon` running?"));
    }
}
