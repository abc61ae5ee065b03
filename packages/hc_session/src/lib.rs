//! Teamserver session layer.
//!
//! Authenticates against a teamserver, keeps its event stream open on a
//! background task, and turns the events it pushes into listener state.
//!
//! ```text
//! AuthClient::login ──► SessionProfile ──► EventWorker (background task)
//!                                               │ WorkerEvent::Frame / Closed
//!                                               ▼
//!                          SessionController ──► EventDispatcher ──► ListenerView
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hc_session::{
//!     CloseCause, Credentials, ListenerRecord, ListenerView, LoginError, SessionController,
//!     SessionObserver, SessionOptions,
//! };
//!
//! struct Console;
//!
//! impl ListenerView for Console {
//!     fn register_listener(&mut self, listener: &ListenerRecord) {
//!         println!("listener {} started", listener.name);
//!     }
//!     fn append_log(&mut self, name: &str, line: &str) {
//!         println!("[{name}] {line}");
//!     }
//!     fn set_status(&mut self, name: &str, status: &str) {
//!         println!("listener {name}: {status}");
//!     }
//! }
//!
//! impl SessionObserver for Console {
//!     fn login_failed(&mut self, error: &LoginError) {
//!         eprintln!("{error}");
//!     }
//!     fn session_closed(&mut self, cause: &CloseCause) {
//!         eprintln!("{cause}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = SessionController::new(SessionOptions::default(), Console, Console);
//!     let report = session
//!         .run(Credentials {
//!             name: "lab".to_string(),
//!             host: "10.0.0.5".to_string(),
//!             port: 40056,
//!             username: "operator".to_string(),
//!             password: "secret".to_string(),
//!         })
//!         .await;
//!     println!("{} listeners seen", report.dispatcher.listeners().len());
//!     std::process::exit(report.exit.code());
//! }
//! ```

mod auth;
mod controller;
mod dispatcher;
mod error;
pub mod events;
mod listeners;
mod profile;
#[cfg(test)]
pub(crate) mod test_helpers;
mod transport;
mod worker;

pub use auth::AuthClient;
pub use controller::{
    CredentialsPrompt, DEFAULT_QUEUE_CAPACITY, SessionController, SessionExit, SessionObserver,
    SessionOptions, SessionReport,
};
pub use dispatcher::{Dispatch, EventDispatcher, ListenerView};
pub use error::{ApiError, CloseCause, EventError, LoginError};
pub use events::{Event, EventEnvelope, EventKind, ListenerDescriptor, ProtocolDescriptor};
pub use listeners::{ListenerRecord, ListenerTable, Registration};
pub use profile::{Credentials, SessionProfile};
pub use transport::{EVENT_PATH, LOGIN_PATH, TOKEN_HEADER, TransportOptions};
pub use worker::{EventWorker, WorkerEvent};
