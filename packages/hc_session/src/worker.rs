//! Background reader for the teamserver event stream.
//!
//! The worker owns the WebSocket and nothing else. Every inbound data frame
//! is forwarded untouched over a bounded channel; when the stream ends, for
//! whatever reason, exactly one [`WorkerEvent::Closed`] is sent and the channel
//! is dropped, so no frame can follow it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CloseCause;
use crate::profile::SessionProfile;
use crate::transport::{self, TOKEN_HEADER, TransportOptions};

type EventStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Notification from the worker to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Raw payload of one inbound frame
    Frame(Vec<u8>),
    /// The stream ended. Always the last event.
    Closed(CloseCause),
}

pub struct EventWorker {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl EventWorker {
    /// Connect to the event stream on a background task.
    ///
    /// `capacity` bounds the hand-off queue; a slow consumer stalls socket
    /// reads rather than losing frames.
    pub fn spawn(
        profile: &SessionProfile,
        options: &TransportOptions,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let target = Target {
            url: options.event_url(&profile.host, profile.port),
            token: profile.token().to_string(),
            options: options.clone(),
        };

        let task = tokio::spawn(run(target, tx, cancel.clone()));
        (Self { cancel, task }, rx)
    }

    /// Ask the worker to close the stream. It still delivers `Closed`.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for the background task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "event worker task failed");
        }
    }
}

struct Target {
    url: String,
    token: String,
    options: TransportOptions,
}

async fn run(target: Target, tx: mpsc::Sender<WorkerEvent>, cancel: CancellationToken) {
    let connected = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CloseCause::Local),
        result = connect(&target) => result,
    };

    let cause = match connected {
        Ok(stream) => {
            info!(url = %target.url, "event stream connected");
            pump(stream, &tx, &cancel, target.options.connect_timeout).await
        }
        Err(cause) => cause,
    };

    debug!(cause = %cause, "event worker finished");
    // The consumer may already be gone; nothing left to tell it then.
    let _ = tx.send(WorkerEvent::Closed(cause)).await;
}

async fn connect(target: &Target) -> Result<EventStream, CloseCause> {
    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| CloseCause::Error(format!("invalid event url: {e}")))?;
    let token = HeaderValue::from_str(&target.token)
        .map_err(|e| CloseCause::Error(format!("invalid session token: {e}")))?;
    request.headers_mut().insert(TOKEN_HEADER, token);

    let tls = transport::client_config(target.options.accept_invalid_certs)
        .map_err(|e| CloseCause::Error(format!("tls setup failed: {e}")))?;

    let handshake = tokio_tungstenite::connect_async_tls_with_config(
        request,
        None,
        false,
        Some(Connector::Rustls(Arc::new(tls))),
    );
    match tokio::time::timeout(target.options.connect_timeout, handshake).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(CloseCause::Error(e.to_string())),
        Err(_) => Err(CloseCause::Error("connection timed out".to_string())),
    }
}

/// Forward frames until the stream ends or we are cancelled.
async fn pump(
    mut stream: EventStream,
    tx: &mpsc::Sender<WorkerEvent>,
    cancel: &CancellationToken,
    close_timeout: Duration,
) -> CloseCause {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            msg = stream.next() => Some(msg),
        };

        let msg = match next {
            None => return close_locally(&mut stream, close_timeout).await,
            Some(None) => return CloseCause::Remote,
            Some(Some(Err(tungstenite::Error::ConnectionClosed))) => return CloseCause::Remote,
            Some(Some(Err(e))) => return CloseCause::Error(e.to_string()),
            Some(Some(Ok(msg))) => msg,
        };

        let frame = match msg {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) => data.to_vec(),
            Message::Close(frame) => {
                debug!(?frame, "teamserver sent close frame");
                return CloseCause::Remote;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        let delivered = tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = tx.send(WorkerEvent::Frame(frame)) => sent.is_ok(),
        };
        if !delivered {
            return close_locally(&mut stream, close_timeout).await;
        }
    }
}

/// Send a close frame and wait for the handshake, but never longer than
/// `limit`; a peer that stopped reading must not hold up shutdown.
async fn close_locally(stream: &mut EventStream, limit: Duration) -> CloseCause {
    match tokio::time::timeout(limit, stream.close(None)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "error closing event stream"),
        Err(_) => debug!("event stream close timed out, dropping connection"),
    }
    CloseCause::Local
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use axum::Router;
    use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
    use axum::http::HeaderMap;
    use axum::routing::get;

    use crate::test_helpers::{credentials, serve};

    async fn spawn_event_server<F, Fut>(session: F) -> (u16, tokio::sync::oneshot::Sender<()>)
    where
        F: Fn(WebSocket, HeaderMap) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let app = Router::new().route(
            "/api/event",
            get(move |upgrade: WebSocketUpgrade, headers: HeaderMap| {
                let session = session.clone();
                async move { upgrade.on_upgrade(move |socket| session(socket, headers)) }
            }),
        );
        serve(app).await
    }

    fn profile(port: u16) -> SessionProfile {
        SessionProfile::new(credentials(port), "tok-42".to_string())
    }

    fn plain() -> TransportOptions {
        TransportOptions {
            secure: false,
            connect_timeout: Duration::from_secs(5),
            ..Default::default()
        }
    }

    async fn drain(mut rx: mpsc::Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        loop {
            let next = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("worker stalled");
            match next {
                Some(event) => events.push(event),
                None => return events,
            }
        }
    }

    #[tokio::test]
    async fn forwards_frames_in_order_then_closes_once() {
        let (port, _shutdown) = spawn_event_server(|mut socket: WebSocket, _| async move {
            for text in ["one", "two", "three"] {
                socket.send(ws::Message::Text(text.into())).await.unwrap();
            }
            socket
                .send(ws::Message::Binary(vec![0xde, 0xad].into()))
                .await
                .unwrap();
            let _ = socket.send(ws::Message::Close(None)).await;
        })
        .await;

        let (worker, rx) = EventWorker::spawn(&profile(port), &plain(), 2, CancellationToken::new());
        let events = drain(rx).await;
        worker.join().await;

        assert_eq!(
            events,
            vec![
                WorkerEvent::Frame(b"one".to_vec()),
                WorkerEvent::Frame(b"two".to_vec()),
                WorkerEvent::Frame(b"three".to_vec()),
                WorkerEvent::Frame(vec![0xde, 0xad]),
                WorkerEvent::Closed(CloseCause::Remote),
            ]
        );
    }

    #[tokio::test]
    async fn authenticates_with_session_token() {
        let (port, _shutdown) = spawn_event_server(|mut socket: WebSocket, headers: HeaderMap| async move {
            let token = headers
                .get(TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<missing>")
                .to_string();
            socket.send(ws::Message::Text(token.into())).await.unwrap();
            let _ = socket.send(ws::Message::Close(None)).await;
        })
        .await;

        let (_worker, rx) = EventWorker::spawn(&profile(port), &plain(), 8, CancellationToken::new());
        let events = drain(rx).await;
        assert_eq!(events[0], WorkerEvent::Frame(b"tok-42".to_vec()));
    }

    #[tokio::test]
    async fn shutdown_closes_locally_exactly_once() {
        let (port, _shutdown) = spawn_event_server(|mut socket: WebSocket, _| async move {
            socket.send(ws::Message::Text("hello".into())).await.unwrap();
            // Hold the connection open until the client goes away
            while let Some(Ok(_)) = socket.recv().await {}
        })
        .await;

        let (worker, mut rx) =
            EventWorker::spawn(&profile(port), &plain(), 8, CancellationToken::new());
        assert_eq!(rx.recv().await, Some(WorkerEvent::Frame(b"hello".to_vec())));

        worker.shutdown();
        let rest = drain(rx).await;
        assert_eq!(rest, vec![WorkerEvent::Closed(CloseCause::Local)]);
        worker.join().await;
    }

    #[tokio::test]
    async fn connect_failure_is_reported_as_close() {
        // Port 1 is reserved and nothing listens on it
        let (_worker, rx) = EventWorker::spawn(&profile(1), &plain(), 8, CancellationToken::new());
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], WorkerEvent::Closed(CloseCause::Error(_))));
    }

    #[tokio::test]
    async fn dropped_consumer_stops_worker() {
        let (port, _shutdown) = spawn_event_server(|mut socket: WebSocket, _| async move {
            loop {
                if socket.send(ws::Message::Text("tick".into())).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        let (worker, mut rx) =
            EventWorker::spawn(&profile(port), &plain(), 1, CancellationToken::new());
        assert!(matches!(rx.recv().await, Some(WorkerEvent::Frame(_))));
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), worker.join())
            .await
            .expect("worker kept running without a consumer");
    }

    #[tokio::test]
    async fn shutdown_is_bounded_when_peer_stops_reading() {
        let (port, _shutdown) = spawn_event_server(|mut socket: WebSocket, _| async move {
            socket.send(ws::Message::Text("hello".into())).await.unwrap();
            // Keep the connection up but never read from it again
            std::future::pending::<()>().await;
            drop(socket);
        })
        .await;

        let options = TransportOptions {
            connect_timeout: Duration::from_millis(500),
            ..plain()
        };
        let (worker, mut rx) = EventWorker::spawn(&profile(port), &options, 8, CancellationToken::new());
        assert_eq!(rx.recv().await, Some(WorkerEvent::Frame(b"hello".to_vec())));

        worker.shutdown();
        let rest = drain(rx).await;
        assert_eq!(rest, vec![WorkerEvent::Closed(CloseCause::Local)]);
        tokio::time::timeout(Duration::from_secs(3), worker.join())
            .await
            .expect("shutdown hung on an unresponsive peer");
    }
}
