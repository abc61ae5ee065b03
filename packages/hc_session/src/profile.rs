/// Connection details entered by the user before login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Display name for this connection profile
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// An authenticated teamserver session.
///
/// Only constructed by a successful login, so the token is always present
/// and never changes for the lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    token: String,
}

impl SessionProfile {
    pub(crate) fn new(credentials: Credentials, token: String) -> Self {
        Self {
            name: credentials.name,
            host: credentials.host,
            port: credentials.port,
            username: credentials.username,
            password: credentials.password,
            token,
        }
    }

    /// Session token issued by the teamserver at login.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Server address as `host:port`.
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
