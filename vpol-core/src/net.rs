//! Network probes: OS ping, HTTP reachability, and raw TCP/UDP packet
//! emission.
//!
//! Two failure regimes on purpose. A probe that cannot even be attempted
//! (missing ping utility, exceeded deadline) is a fatal script error; an
//! unreachable target is an expected outcome for a diagnostic probe and is
//! reported on the output sink without aborting the run.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use colored::Colorize;
use tracing::debug;

use crate::error::RuntimeError;

// ─────────────────────────────────────────────────────────────
// Probe limits
// ─────────────────────────────────────────────────────────────
const PING_COUNT: u32 = 4;
const PING_DEADLINE: Duration = Duration::from_secs(30);
const PING_POLL: Duration = Duration::from_millis(50);
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const PACKET_FILL: u8 = b'X';

// ─────────────────────────────────────────────────────────────
// Ping
// ─────────────────────────────────────────────────────────────

/// Run the OS ping utility for four probes and write its output to `out`.
///
/// The subprocess gets a hard deadline; a utility that is missing, cannot
/// be spawned, or does not finish in time fails the script.
pub fn ping<W: Write>(out: &mut W, addr: &str) -> Result<(), RuntimeError> {
    let failed = || RuntimeError::PingFailed(addr.to_string());

    let ping_bin = which::which("ping").map_err(|_| failed())?;
    let started = Instant::now();
    let mut child = Command::new(ping_bin)
        .arg("-c")
        .arg(PING_COUNT.to_string())
        .arg(addr)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|_| failed())?;

    let deadline = started + PING_DEADLINE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(failed());
                }
                thread::sleep(PING_POLL);
            }
            Err(_) => return Err(failed()),
        }
    }

    let mut output = String::new();
    if let Some(mut stdout) = child.stdout.take() {
        let _ = stdout.read_to_string(&mut output);
    }
    debug!(addr, elapsed = ?started.elapsed(), "ping finished");
    writeln!(out, "{}", output)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// HTTP reachability
// ─────────────────────────────────────────────────────────────

/// Blocking GET with a 5 second timeout and one bounded retry on transport
/// failures. An HTTP error status still counts as reachable; only the
/// outcome line is produced, the probe never fails the script.
pub fn http_check<W: Write>(out: &mut W, url: &str) -> Result<(), RuntimeError> {
    let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();

    let mut attempt = agent.get(url).call();
    if matches!(attempt, Err(ureq::Error::Transport(_))) {
        eprintln!("{} http_check transport failure, retrying once", "[!]".yellow());
        attempt = agent.get(url).call();
    }

    match attempt {
        Ok(resp) => writeln!(
            out,
            "Successfully connected to {}. Status code: {}",
            url,
            resp.status()
        )?,
        Err(ureq::Error::Status(code, _)) => writeln!(
            out,
            "Successfully connected to {}. Status code: {}",
            url, code
        )?,
        Err(e) => writeln!(out, "Failed to connect to {}. Error: {}", url, e)?,
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// Packet emission
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Case-insensitive; anything other than tcp/udp is a script error.
    pub fn from_arg(arg: &str) -> Result<Self, RuntimeError> {
        match arg.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err(RuntimeError::InvalidProtocol),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// Emit one packet of `size` filler bytes and wait for a single reply.
///
/// Reachability failures are printed, not raised.
pub fn send_packet<W: Write>(
    out: &mut W,
    ip: &str,
    port: u16,
    protocol: Protocol,
    size: usize,
) -> Result<(), RuntimeError> {
    let target = format!("{}:{}", ip, port);
    let result = match protocol {
        Protocol::Tcp => send_tcp(&target, size),
        Protocol::Udp => send_udp(&target, size),
    };
    match result {
        Ok(true) => writeln!(
            out,
            "Packet sent successfully to {} using {}. Response received.",
            target, protocol
        )?,
        Ok(false) => writeln!(
            out,
            "Packet sent to {} using {}, but no response received.",
            target, protocol
        )?,
        Err(e) => writeln!(out, "Failed to send packet to {}. Error: {}", target, e)?,
    }
    Ok(())
}

fn send_tcp(target: &str, size: usize) -> io::Result<bool> {
    let addr = resolve(target)?;
    let mut stream = retry_transient(|| TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT))?;
    stream.set_read_timeout(Some(REPLY_TIMEOUT))?;
    stream.write_all(&vec![PACKET_FILL; size])?;
    stream.flush()?;

    let mut reply = [0u8; 1024];
    match stream.read(&mut reply) {
        Ok(n) if n > 0 => Ok(true),
        Ok(_) => Ok(false),
        Err(e) if is_timeout(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn send_udp(target: &str, size: usize) -> io::Result<bool> {
    let addr = resolve(target)?;
    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_read_timeout(Some(REPLY_TIMEOUT))?;

    let payload = vec![PACKET_FILL; size];
    retry_transient(|| socket.send_to(&payload, addr))?;

    let mut reply = [0u8; 1024];
    match socket.recv_from(&mut reply) {
        Ok(_) => Ok(true),
        Err(e) if is_timeout(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn resolve(target: &str) -> io::Result<SocketAddr> {
    target
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "address did not resolve"))
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// One bounded retry for interruptions the OS can deliver transiently.
fn retry_transient<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    match op() {
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {
            eprintln!("{} transient failure, retrying once: {}", "[!]".yellow(), e);
            op()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, UdpSocket};

    #[test]
    fn protocol_parse_is_case_insensitive() {
        assert_eq!(Protocol::from_arg("tcp").unwrap(), Protocol::Tcp);
        assert_eq!(Protocol::from_arg("UDP").unwrap(), Protocol::Udp);
        assert!(matches!(
            Protocol::from_arg("icmp"),
            Err(RuntimeError::InvalidProtocol)
        ));
    }

    #[test]
    fn protocol_prints_upper_case() {
        assert_eq!(Protocol::Tcp.to_string(), "TCP");
        assert_eq!(Protocol::Udp.to_string(), "UDP");
    }

    #[test]
    fn udp_reply_is_detected() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let echo = thread::spawn(move || {
            let mut buf = [0u8; 64];
            let (n, peer) = server.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"XXXX");
            server.send_to(b"pong", peer).unwrap();
        });

        let mut out = Vec::new();
        send_packet(&mut out, "127.0.0.1", port, Protocol::Udp, 4).unwrap();
        echo.join().unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!(
                "Packet sent successfully to 127.0.0.1:{} using UDP. Response received.\n",
                port
            )
        );
    }

    #[test]
    fn tcp_reply_is_detected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 8];
            let n = stream.read(&mut buf).unwrap();
            assert_eq!(&buf[..n], b"XX");
            stream.write_all(b"ack").unwrap();
        });

        let mut out = Vec::new();
        send_packet(&mut out, "127.0.0.1", port, Protocol::Tcp, 2).unwrap();
        server.join().unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Response received."), "got: {}", text);
    }

    #[test]
    fn refused_tcp_connect_is_reported_not_raised() {
        // Grab a port that is free, then close it so the connect is refused.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut out = Vec::new();
        send_packet(&mut out, "127.0.0.1", port, Protocol::Tcp, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Failed to send packet to"), "got: {}", text);
    }
}
