//! Session lifecycle: login, start the event worker, feed the dispatcher.
//!
//! All session state lives in [`SessionController`] and is only touched from
//! the task that calls [`SessionController::run`]. The worker runs elsewhere
//! and reaches that state only through the frame channel.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::AuthClient;
use crate::dispatcher::{EventDispatcher, ListenerView};
use crate::error::{CloseCause, LoginError};
use crate::profile::{Credentials, SessionProfile};
use crate::transport::TransportOptions;
use crate::worker::{EventWorker, WorkerEvent};

/// Default bound of the worker → dispatcher queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Supplies connection details, or `None` when the user backs out.
/// A cancelled prompt ends the run with [`SessionExit::Cancelled`].
pub trait CredentialsPrompt {
    fn prompt(&mut self) -> Option<Credentials>;
}

/// User-facing notifications about the session as a whole.
pub trait SessionObserver {
    fn login_failed(&mut self, error: &LoginError);

    fn session_started(&mut self, _profile: &SessionProfile) {}

    /// Called once when the event stream has ended.
    fn session_closed(&mut self, cause: &CloseCause);
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub transport: TransportOptions,
    pub queue_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// How a session run ended.
#[derive(Debug)]
pub enum SessionExit {
    /// No credentials were given
    Cancelled,
    /// Login failed; the event stream was never opened
    LoginFailed(LoginError),
    /// The event stream ended
    Closed(CloseCause),
}

impl SessionExit {
    /// Process exit code. A severed stream is reported distinctly from a
    /// shutdown we asked for.
    pub fn code(&self) -> i32 {
        match self {
            SessionExit::Cancelled => 0,
            SessionExit::LoginFailed(_) => 1,
            SessionExit::Closed(CloseCause::Local) => 0,
            SessionExit::Closed(_) => 3,
        }
    }
}

/// Everything a finished session leaves behind.
pub struct SessionReport<O, V> {
    pub exit: SessionExit,
    /// Set once login succeeded
    pub profile: Option<SessionProfile>,
    pub dispatcher: EventDispatcher<V>,
    pub observer: O,
}

/// Drives exactly one session. [`SessionController::run`] consumes the
/// controller, so a profile and its token can never be replaced by a
/// second login.
pub struct SessionController<O, V> {
    options: SessionOptions,
    observer: O,
    dispatcher: EventDispatcher<V>,
    shutdown: CancellationToken,
}

impl<O: SessionObserver, V: ListenerView> SessionController<O, V> {
    pub fn new(options: SessionOptions, observer: O, view: V) -> Self {
        Self {
            options,
            observer,
            dispatcher: EventDispatcher::new(view),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that ends the session when cancelled. Cancelling it before
    /// `run` skips the login entirely.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Log in and consume the event stream until it closes.
    pub async fn run(mut self, credentials: Credentials) -> SessionReport<O, V> {
        if self.shutdown.is_cancelled() {
            info!("shutdown requested before login");
            return self.finish(SessionExit::Cancelled, None);
        }

        let client = match AuthClient::new(self.options.transport.clone()) {
            Ok(client) => client,
            Err(e) => return self.login_failed(e),
        };
        let profile = match client.login(credentials).await {
            Ok(profile) => profile,
            Err(e) => return self.login_failed(e),
        };
        self.observer.session_started(&profile);

        let (worker, mut events) = EventWorker::spawn(
            &profile,
            &self.options.transport,
            self.options.queue_capacity,
            self.shutdown.child_token(),
        );

        let cause = loop {
            match events.recv().await {
                Some(WorkerEvent::Frame(frame)) => {
                    self.dispatcher.handle(&frame);
                }
                Some(WorkerEvent::Closed(cause)) => break cause,
                None => break CloseCause::Error("event worker stopped unexpectedly".to_string()),
            }
        };
        drop(events);
        worker.join().await;

        if cause.is_severed() {
            error!(cause = %cause, "websocket closed");
        } else {
            info!("session closed");
        }
        self.observer.session_closed(&cause);
        self.finish(SessionExit::Closed(cause), Some(profile))
    }

    fn login_failed(mut self, error: LoginError) -> SessionReport<O, V> {
        warn!(error = %error, "login failed");
        self.observer.login_failed(&error);
        self.finish(SessionExit::LoginFailed(error), None)
    }

    fn finish(self, exit: SessionExit, profile: Option<SessionProfile>) -> SessionReport<O, V> {
        SessionReport {
            exit,
            profile,
            dispatcher: self.dispatcher,
            observer: self.observer,
        }
    }
}
