//! Terminal credentials prompt.
//!
//! Fields already known from config or flags are not asked for. End of input
//! on any question cancels the whole prompt.

use std::io::{self, BufRead, Write};

use hc_session::{Credentials, CredentialsPrompt};
use tracing::warn;

use crate::config::ServerFileConfig;

type PasswordReader = Box<dyn FnMut(&str) -> io::Result<String> + Send>;

pub struct TerminalPrompt<R, W> {
    prefill: ServerFileConfig,
    input: R,
    output: W,
    read_password: PasswordReader,
}

impl TerminalPrompt<io::BufReader<io::Stdin>, io::Stderr> {
    /// Prompt on stderr, read answers from stdin and the password from the tty.
    pub fn stdio(prefill: ServerFileConfig) -> Self {
        Self::new(
            prefill,
            io::BufReader::new(io::stdin()),
            io::stderr(),
            Box::new(|label: &str| rpassword::prompt_password(label)),
        )
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(prefill: ServerFileConfig, input: R, output: W, read_password: PasswordReader) -> Self {
        Self {
            prefill,
            input,
            output,
            read_password,
        }
    }

    /// Ask until a non-empty answer arrives. `None` on end of input.
    fn ask(&mut self, label: &str) -> io::Result<Option<String>> {
        loop {
            write!(self.output, "  {label}: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
            writeln!(self.output, "  ({} is required)", label.to_lowercase())?;
        }
    }

    fn ask_port(&mut self) -> io::Result<Option<u16>> {
        loop {
            let Some(answer) = self.ask("Port")? else {
                return Ok(None);
            };
            match answer.parse::<u16>() {
                Ok(port) if port != 0 => return Ok(Some(port)),
                _ => writeln!(self.output, "  (port must be 1-65535)")?,
            }
        }
    }

    fn collect(&mut self) -> io::Result<Option<Credentials>> {
        let prefill = self.prefill.clone();

        let name = match prefill.name {
            Some(name) => name,
            None => match self.ask("Name")? {
                Some(name) => name,
                None => return Ok(None),
            },
        };
        let host = match prefill.host {
            Some(host) => host,
            None => match self.ask("Host")? {
                Some(host) => host,
                None => return Ok(None),
            },
        };
        let port = match prefill.port {
            Some(port) => port,
            None => match self.ask_port()? {
                Some(port) => port,
                None => return Ok(None),
            },
        };
        let username = match prefill.username {
            Some(username) => username,
            None => match self.ask("User")? {
                Some(username) => username,
                None => return Ok(None),
            },
        };
        let password = match prefill.password {
            Some(password) => password,
            None => (self.read_password)("  Password: ")?,
        };
        if password.is_empty() {
            return Ok(None);
        }

        Ok(Some(Credentials {
            name,
            host,
            port,
            username,
            password,
        }))
    }
}

impl<R: BufRead, W: Write> CredentialsPrompt for TerminalPrompt<R, W> {
    fn prompt(&mut self) -> Option<Credentials> {
        match self.collect() {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(error = %e, "failed to read credentials");
                None
            }
        }
    }
}
