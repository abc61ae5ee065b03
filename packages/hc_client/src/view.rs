use std::io::Write;

use hc_session::{CloseCause, ListenerRecord, ListenerView, LoginError, SessionObserver, SessionProfile};
use tracing::{info, warn};

/// Line-oriented console rendering of the session.
pub struct ConsoleView<W> {
    out: W,
}

impl ConsoleView<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!(error = %e, "console write failed");
        }
    }
}

impl<W: Write> ListenerView for ConsoleView<W> {
    fn register_listener(&mut self, listener: &ListenerRecord) {
        info!(name = %listener.name, protocol = %listener.protocol, "listener registered");
        self.line(format_args!(
            "[+] listener {} ({}) {}:{} [{}]",
            listener.name, listener.protocol, listener.host, listener.port, listener.status
        ));
    }

    fn append_log(&mut self, name: &str, line: &str) {
        self.line(format_args!("[{name}] {line}"));
    }

    fn set_status(&mut self, name: &str, status: &str) {
        self.line(format_args!("[*] listener {name}: {status}"));
    }
}

impl<W: Write> SessionObserver for ConsoleView<W> {
    fn login_failed(&mut self, error: &LoginError) {
        self.line(format_args!("[-] {error}"));
    }

    fn session_started(&mut self, profile: &SessionProfile) {
        self.line(format_args!(
            "[+] connected to {} ({}) as {}",
            profile.name,
            profile.server(),
            profile.username
        ));
    }

    fn session_closed(&mut self, cause: &CloseCause) {
        match cause {
            CloseCause::Local => self.line(format_args!("[*] disconnected")),
            other => self.line(format_args!("[-] {other}")),
        }
    }
}
