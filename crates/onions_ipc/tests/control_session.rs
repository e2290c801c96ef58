use std::io::{self, BufRead, Cursor, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use hex_literal::hex;
use onions_ipc::{ControlError, ControlPort, ControlSession, Credential};

/// Replays canned Tor output and records what the client sent.
struct Script {
    tor: Cursor<Vec<u8>>,
    sent: Vec<u8>,
}

impl Script {
    fn new(replies: &str) -> Self {
        Self { tor: Cursor::new(replies.as_bytes().to_vec()), sent: Vec::new() }
    }

    fn sent(&self) -> String {
        String::from_utf8_lossy(&self.sent).into_owned()
    }
}

impl Read for Script {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.tor.read(buf)
    }
}

impl BufRead for Script {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.tor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.tor.consume(amt);
    }
}

impl Write for Script {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sent.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session(replies: &str) -> ControlSession<Script> {
    ControlSession::new(Script::new(replies)).with_polling(3, Duration::ZERO)
}

#[test]
fn cookie_authentication_sends_lowercase_hex() {
    let mut s = session("250 OK\r\n");
    s.authenticate(&Credential::Cookie(hex!("DEADBEEF").to_vec())).unwrap();
    assert_eq!(s.into_inner().sent(), "AUTHENTICATE deadbeef\r\n");
}

#[test]
fn refused_authentication_is_an_error() {
    let mut s = session("515 Authentication failed: Password did not match\r\n");
    let err = s.authenticate(&Credential::Password("wrong".into())).unwrap_err();
    match err {
        ControlError::Refused { status, message } => {
            assert_eq!(status, 515);
            assert!(message.starts_with("Authentication failed"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn bootstrap_polls_until_done() {
    let mut s = session(concat!(
        "250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=50 TAG=loading_descriptors\r\n250 OK\r\n",
        "250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY=\"Done\"\r\n250 OK\r\n",
    ));
    s.wait_until_bootstrapped().unwrap();
    assert_eq!(
        s.into_inner().sent(),
        "GETINFO status/bootstrap-phase\r\nGETINFO status/bootstrap-phase\r\n"
    );
}

#[test]
fn bootstrap_gives_up_after_the_poll_limit() {
    let stuck = "250-status/bootstrap-phase=NOTICE BOOTSTRAP PROGRESS=5 TAG=conn\r\n250 OK\r\n";
    let mut s = session(&stuck.repeat(3));
    assert!(matches!(s.wait_until_bootstrapped(), Err(ControlError::BootstrapTimeout(3))));
}

#[test]
fn get_and_set_conf() {
    let mut s = session(concat!(
        "250-HiddenServiceDir=/var/lib/tor/a\r\n250 HiddenServiceDir=/var/lib/tor/b\r\n",
        "250 OK\r\n",
    ));
    assert_eq!(
        s.get_conf("HiddenServiceDir").unwrap(),
        ["/var/lib/tor/a", "/var/lib/tor/b"]
    );
    s.set_conf("HiddenServicePort", "53 127.0.0.1:15678").unwrap();
    assert_eq!(
        s.into_inner().sent(),
        "GETCONF HiddenServiceDir\r\nSETCONF HiddenServicePort=\"53 127.0.0.1:15678\"\r\n"
    );
}

#[test]
fn cookie_file_from_protocol_info() {
    let mut s = session(concat!(
        "250-PROTOCOLINFO 1\r\n",
        "250-AUTH METHODS=COOKIE,SAFECOOKIE COOKIEFILE=\"/run/tor/control.authcookie\"\r\n",
        "250-VERSION Tor=\"0.4.8.10\"\r\n",
        "250 OK\r\n",
    ));
    assert_eq!(s.cookie_file().unwrap(), Some(PathBuf::from("/run/tor/control.authcookie")));
}

#[test]
fn closed_stream_mid_session() {
    let mut s = session("");
    assert!(matches!(s.reload(), Err(ControlError::Closed)));
}

#[test]
fn get_info_returns_the_keyed_value() {
    let mut s = session(concat!(
        "250-version=0.4.8.10\r\n250 OK\r\n",
        "250-net/listeners/socks=\"127.0.0.1:9050\"\r\n250 OK\r\n",
    ));
    assert_eq!(s.get_info("version").unwrap(), "0.4.8.10");
    assert!(matches!(s.get_info("version"), Err(ControlError::MissingKey(k)) if k == "version"));
    assert_eq!(s.into_inner().sent(), "GETINFO version\r\nGETINFO version\r\n");
}
