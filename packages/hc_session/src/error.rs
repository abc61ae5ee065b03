use crate::events::EventKind;

/// Why a login attempt failed. None of these are retried.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The request never produced an HTTP response (refused, TLS, timeout, ...)
    #[error("failed to send login request: {0}")]
    Transport(String),

    /// Teamserver rejected the credentials (HTTP 401)
    #[error("failed to login: {0}")]
    Unauthorized(String),

    #[error("unexpected response: http status code {0}")]
    UnexpectedStatus(u16),

    /// A 200 response whose body carried no usable token
    #[error("failed to login: invalid response from the server")]
    MalformedResponse,
}

impl LoginError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        Self::Transport(transport_reason(&err))
    }
}

/// Failure of an authenticated API request issued with a session token.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to send api request: {0}")]
    Transport(String),

    #[error("api request rejected: http status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid api response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        Self::Transport(transport_reason(&err))
    }
}

/// Structural problem with a single server-pushed event. The event is
/// dropped and the session carries on.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid event: not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid event: \"{0}\" is not found")]
    MissingField(&'static str),

    #[error("invalid event: \"type\" is not string")]
    TypeNotString,

    #[error("invalid event: {0} not found")]
    UnknownType(String),

    #[error("{0}: invalid package (data empty)")]
    EmptyData(EventKind),

    #[error("{0}: invalid package (data is not an object)")]
    DataNotObject(EventKind),

    #[error("{kind}: \"{field}\" is not found")]
    MissingPayloadField {
        kind: EventKind,
        field: &'static str,
    },

    #[error("{kind}: \"{field}\" is not string")]
    PayloadFieldNotString {
        kind: EventKind,
        field: &'static str,
    },

    #[error("{kind}: invalid package: {reason}")]
    InvalidPayload { kind: EventKind, reason: String },

    #[error("listener.log: listener \"{0}\" is not registered")]
    UnknownListener(String),
}

/// How the event stream ended.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CloseCause {
    /// Shut down from this side
    #[error("event stream closed locally")]
    Local,

    /// Teamserver closed the connection
    #[error("event stream closed by teamserver")]
    Remote,

    /// Connect or read failure
    #[error("event stream failed: {0}")]
    Error(String),
}

impl CloseCause {
    /// True when the session ended without us asking for it.
    pub fn is_severed(&self) -> bool {
        !matches!(self, CloseCause::Local)
    }
}

/// Render a reqwest failure with its cause chain, prefixed by what kind of
/// transport failure it was.
fn transport_reason(err: &reqwest::Error) -> String {
    let kind = if err.is_connect() {
        "connection"
    } else if err.is_timeout() {
        "timeout"
    } else if err.is_redirect() {
        "redirect"
    } else if err.is_request() {
        "request"
    } else {
        "transport"
    };

    let mut reason = format!("{kind}: {err}");
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = std::error::Error::source(cause);
    }
    reason
}
