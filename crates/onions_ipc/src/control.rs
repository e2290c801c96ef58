//! Tor control-port client.
//!
//! Commands are single CRLF-terminated lines. Replies are one or more lines
//! of `NNN<sep>text`, where `-` continues, `+` opens a dot-terminated data
//! block and a space ends the reply.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

pub const STATUS_OK: u16 = 250;
pub const BOOTSTRAP_PHASE: &str = "status/bootstrap-phase";
pub const BOOTSTRAP_DONE: &str = "BOOTSTRAP PROGRESS=100";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// One minute at the default interval.
pub const DEFAULT_POLL_LIMIT: u32 = 240;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control port I/O: {0}")]
    Io(#[from] io::Error),

    #[error("control port closed the connection")]
    Closed,

    #[error("malformed reply line {0:?}")]
    Malformed(String),

    #[error("Tor refused the command: {status} {message}")]
    Refused { status: u16, message: String },

    #[error("reply carries no value for {0:?}")]
    MissingKey(String),

    #[error("command argument contains a line break")]
    InvalidArgument,

    #[error("Tor did not finish bootstrapping after {0} polls")]
    BootstrapTimeout(u32),
}

/// How to prove control-port access.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `CookieAuthentication 0` and no password.
    Null,
    /// Raw contents of the control auth cookie file.
    Cookie(Vec<u8>),
    Password(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "Null",
            Self::Cookie(_) => "Cookie(..)",
            Self::Password(_) => "Password(..)",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Authenticate(Credential),
    ProtocolInfo,
    GetInfo(String),
    GetConf(String),
    SetConf(String, String),
    SignalReload,
}

impl Command {
    /// The command keyword, safe to log.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Authenticate(_) => "AUTHENTICATE",
            Self::ProtocolInfo => "PROTOCOLINFO",
            Self::GetInfo(_) => "GETINFO",
            Self::GetConf(_) => "GETCONF",
            Self::SetConf(..) => "SETCONF",
            Self::SignalReload => "SIGNAL RELOAD",
        }
    }

    /// The wire line including its CRLF terminator.
    ///
    /// # Errors
    ///
    /// `ControlError::InvalidArgument` if an argument would split the line.
    pub fn to_line(&self) -> Result<String, ControlError> {
        let line = self.to_string();
        if line.contains(|c| c == '\r' || c == '\n') {
            return Err(ControlError::InvalidArgument);
        }
        Ok(line + "\r\n")
    }
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticate(Credential::Null) => f.write_str("AUTHENTICATE"),
            Self::Authenticate(Credential::Cookie(c)) => write!(f, "AUTHENTICATE {}", hex::encode(c)),
            Self::Authenticate(Credential::Password(p)) => write!(f, "AUTHENTICATE {}", quoted(p)),
            Self::ProtocolInfo => f.write_str("PROTOCOLINFO 1"),
            Self::GetInfo(key) => write!(f, "GETINFO {key}"),
            Self::GetConf(key) => write!(f, "GETCONF {key}"),
            Self::SetConf(key, value) => {
                if value.is_empty() || value.contains(|c: char| c.is_whitespace() || c == '"') {
                    write!(f, "SETCONF {key}={}", quoted(value))
                } else {
                    write!(f, "SETCONF {key}={value}")
                }
            }
            Self::SignalReload => f.write_str("SIGNAL RELOAD"),
        }
    }
}

/// One complete reply. `lines` hold the text after the status and separator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub lines: Vec<String>,
}

impl Reply {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Text of the final line, usually `OK` or an error description.
    #[must_use]
    pub fn message(&self) -> &str {
        self.lines.last().map_or("", String::as_str)
    }

    /// Values of `key=value` lines, matching `key` case-insensitively.
    /// A bare `key` line yields an empty value.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines.iter().filter_map(move |line| match line.split_once('=') {
            Some((k, v)) if k.eq_ignore_ascii_case(key) => Some(v),
            None if line.eq_ignore_ascii_case(key) => Some(""),
            _ => None,
        })
    }
}

fn next_line<R: BufRead + ?Sized>(r: &mut R) -> Result<String, ControlError> {
    let mut line = String::new();
    if r.read_line(&mut line)? == 0 {
        return Err(ControlError::Closed);
    }
    Ok(line.trim_end_matches(|c| c == '\r' || c == '\n').to_owned())
}

/// Read one complete reply.
///
/// # Errors
///
/// `Closed` at end of stream, `Malformed` for a line without a status.
pub fn read_reply<R: BufRead + ?Sized>(r: &mut R) -> Result<Reply, ControlError> {
    let mut lines = Vec::new();
    loop {
        let line = next_line(r)?;
        let status = line
            .get(..3)
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| ControlError::Malformed(line.clone()))?;
        let text = line.get(4..).unwrap_or_default().to_owned();
        match line.get(3..4) {
            Some(" ") => {
                lines.push(text);
                return Ok(Reply { status, lines });
            }
            Some("-") => lines.push(text),
            Some("+") => {
                let mut data = text;
                loop {
                    let more = next_line(r)?;
                    if more == "." {
                        break;
                    }
                    if !data.ends_with('=') {
                        data.push('\n');
                    }
                    data.push_str(more.strip_prefix('.').unwrap_or(&more));
                }
                lines.push(data);
            }
            _ => return Err(ControlError::Malformed(line)),
        }
    }
}

/// What the core needs from Tor.
pub trait ControlPort {
    fn authenticate(&mut self, credential: &Credential) -> Result<(), ControlError>;
    fn wait_until_bootstrapped(&mut self) -> Result<(), ControlError>;
    fn get_conf(&mut self, key: &str) -> Result<Vec<String>, ControlError>;
    fn set_conf(&mut self, key: &str, value: &str) -> Result<(), ControlError>;
}

/// A control session over any buffered duplex stream.
#[derive(Debug)]
pub struct ControlSession<S> {
    stream: S,
    poll_limit: u32,
    poll_interval: Duration,
}

impl<S: BufRead + Write> ControlSession<S> {
    pub const fn new(stream: S) -> Self {
        Self {
            stream,
            poll_limit: DEFAULT_POLL_LIMIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_polling(mut self, limit: u32, interval: Duration) -> Self {
        self.poll_limit = limit;
        self.poll_interval = interval;
        self
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send `cmd` and return whatever Tor replied, success or not.
    pub fn request(&mut self, cmd: &Command) -> Result<Reply, ControlError> {
        let line = cmd.to_line()?;
        debug!(command = cmd.verb(), "control request");
        self.stream.write_all(line.as_bytes())?;
        self.stream.flush()?;
        read_reply(&mut self.stream)
    }

    /// Send `cmd` and require a `250` reply.
    pub fn command(&mut self, cmd: &Command) -> Result<Reply, ControlError> {
        let reply = self.request(cmd)?;
        if reply.is_ok() {
            Ok(reply)
        } else {
            warn!(command = cmd.verb(), status = reply.status, message = reply.message(), "command refused");
            Err(ControlError::Refused {
                status: reply.status,
                message: reply.message().to_owned(),
            })
        }
    }

    pub fn get_info(&mut self, key: &str) -> Result<String, ControlError> {
        let reply = self.command(&Command::GetInfo(key.to_owned()))?;
        let value = reply.values(key).next().map(str::to_owned);
        value.ok_or_else(|| ControlError::MissingKey(key.to_owned()))
    }

    /// Where Tor keeps its auth cookie, if cookie authentication is enabled.
    pub fn cookie_file(&mut self) -> Result<Option<PathBuf>, ControlError> {
        const NEEDLE: &str = "COOKIEFILE=\"";
        let reply = self.command(&Command::ProtocolInfo)?;
        Ok(reply.lines.iter().find_map(|line| {
            let start = line.find(NEEDLE)? + NEEDLE.len();
            let len = line[start..].find('"')?;
            Some(PathBuf::from(&line[start..start + len]))
        }))
    }

    pub fn reload(&mut self) -> Result<(), ControlError> {
        self.command(&Command::SignalReload).map(drop)
    }
}

impl<S: BufRead + Write> ControlPort for ControlSession<S> {
    fn authenticate(&mut self, credential: &Credential) -> Result<(), ControlError> {
        self.command(&Command::Authenticate(credential.clone()))?;
        info!("authenticated to Tor");
        Ok(())
    }

    fn wait_until_bootstrapped(&mut self) -> Result<(), ControlError> {
        for poll in 1..=self.poll_limit {
            let phase = self.get_info(BOOTSTRAP_PHASE)?;
            if phase.contains(BOOTSTRAP_DONE) {
                info!(polls = poll, "Tor is bootstrapped");
                return Ok(());
            }
            debug!(%phase, "waiting for Tor to bootstrap");
            thread::sleep(self.poll_interval);
        }
        Err(ControlError::BootstrapTimeout(self.poll_limit))
    }

    fn get_conf(&mut self, key: &str) -> Result<Vec<String>, ControlError> {
        let reply = self.command(&Command::GetConf(key.to_owned()))?;
        Ok(reply.values(key).map(str::to_owned).collect())
    }

    fn set_conf(&mut self, key: &str, value: &str) -> Result<(), ControlError> {
        self.command(&Command::SetConf(key.to_owned(), value.to_owned()))
            .map(drop)
    }
}

/// A TCP control connection split into a buffered reader and a writer.
#[derive(Debug)]
pub struct TcpDuplex {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl TcpDuplex {
    pub fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let writer = TcpStream::connect(addr)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }
}

impl Read for TcpDuplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for TcpDuplex {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt);
    }
}

impl Write for TcpDuplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl ControlSession<TcpDuplex> {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ControlError> {
        Ok(Self::new(TcpDuplex::connect(addr)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines() {
        assert_eq!(Command::ProtocolInfo.to_line().unwrap(), "PROTOCOLINFO 1\r\n");
        assert_eq!(Command::SignalReload.to_string(), "SIGNAL RELOAD");
        assert_eq!(
            Command::Authenticate(Credential::Cookie(vec![0xAB, 0x01])).to_string(),
            "AUTHENTICATE ab01"
        );
        assert_eq!(
            Command::Authenticate(Credential::Password(r#"pa"ss"#.into())).to_string(),
            r#"AUTHENTICATE "pa\"ss""#
        );
        assert_eq!(
            Command::SetConf("HiddenServicePort".into(), "53 127.0.0.1:15678".into()).to_string(),
            r#"SETCONF HiddenServicePort="53 127.0.0.1:15678""#
        );
        assert_eq!(
            Command::SetConf("SocksPort".into(), "9150".into()).to_string(),
            "SETCONF SocksPort=9150"
        );
    }

    #[test]
    fn line_breaks_are_refused() {
        let cmd = Command::GetConf("SocksPort\r\nSIGNAL HALT".into());
        assert!(matches!(cmd.to_line(), Err(ControlError::InvalidArgument)));
    }

    #[test]
    fn credentials_do_not_leak_through_debug() {
        let dbg = format!("{:?}", Credential::Password("hunter2".into()));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn multi_line_reply() {
        let mut input: &[u8] = b"250-PROTOCOLINFO 1\r\n250-AUTH METHODS=COOKIE\r\n250 OK\r\n";
        let reply = read_reply(&mut input).unwrap();
        assert!(reply.is_ok());
        assert_eq!(reply.lines, ["PROTOCOLINFO 1", "AUTH METHODS=COOKIE", "OK"]);
        assert_eq!(reply.message(), "OK");
    }

    #[test]
    fn data_reply() {
        let mut input: &[u8] = b"250+config-text=\r\nSocksPort 9050\r\n..dot\r\n.\r\n250 OK\r\n";
        let reply = read_reply(&mut input).unwrap();
        assert_eq!(reply.values("config-text").next(), Some("SocksPort 9050\n.dot"));
    }

    #[test]
    fn malformed_and_closed() {
        let mut input: &[u8] = b"OK\r\n";
        assert!(matches!(read_reply(&mut input), Err(ControlError::Malformed(_))));
        let mut input: &[u8] = b"250*x\r\n";
        assert!(matches!(read_reply(&mut input), Err(ControlError::Malformed(_))));
        let mut input: &[u8] = b"250-partial\r\n";
        assert!(matches!(read_reply(&mut input), Err(ControlError::Closed)));
    }

    #[test]
    fn values_match_keys_case_insensitively() {
        let reply = Reply {
            status: 250,
            lines: vec!["SocksPort=9050".into(), "socksport=9150".into(), "ORPort".into()],
        };
        assert_eq!(reply.values("SOCKSPORT").collect::<Vec<_>>(), ["9050", "9150"]);
        assert_eq!(reply.values("ORPort").collect::<Vec<_>>(), [""]);
    }
}
