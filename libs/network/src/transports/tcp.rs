//! TCP Broker Connection
//!
//! A blocking socket to one broker endpoint. Opening never retries: any
//! resolution or connect failure is returned to the caller, which owns the
//! retry policy. Closing is idempotent and also happens on drop.

use super::{ConnectionOptions, Endpoint};
use crate::{Result, TransportError};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Connection wrapper tracking traffic and lifetime
#[derive(Debug)]
pub struct TcpConnection {
    stream: Option<TcpStream>,
    endpoint: Endpoint,
    peer_addr: SocketAddr,
    connected_at: Instant,
    last_activity: Instant,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    bytes_sent: u64,
    bytes_received: u64,
}

/// Connection statistics
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub peer_addr: SocketAddr,
    pub connected_duration: Duration,
    pub last_activity: Duration,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub open: bool,
}

impl TcpConnection {
    /// Resolve `endpoint` and connect to the first address that accepts
    pub fn open(endpoint: &Endpoint, options: &ConnectionOptions) -> Result<Self> {
        validate_timeout(options.connect_timeout, "connect_timeout")?;
        validate_timeout(options.read_timeout, "read_timeout")?;
        validate_timeout(options.write_timeout, "write_timeout")?;

        let addrs: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| {
                TransportError::connection_with_source(
                    format!("Failed to resolve {}", endpoint),
                    None,
                    e,
                )
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::connection(
                format!("No addresses found for {}", endpoint),
                None,
            ));
        }

        info!("Connecting to broker at {}", endpoint);

        let mut last_error = None;
        for addr in addrs {
            let attempt = match options.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => return Self::from_stream(stream, endpoint.clone(), addr, options),
                Err(e) => {
                    debug!(peer = %addr, error = %e, "Connect attempt failed");
                    last_error = Some((addr, e));
                }
            }
        }

        match last_error {
            Some((addr, e)) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Err(TransportError::timeout(
                    format!("connect to {}", addr),
                    millis(options.connect_timeout),
                ))
            }
            Some((addr, e)) => Err(TransportError::connection_with_source(
                format!("Failed to connect to {}", endpoint),
                Some(addr),
                e,
            )),
            None => Err(TransportError::connection(
                format!("Failed to connect to {}", endpoint),
                None,
            )),
        }
    }

    fn from_stream(
        stream: TcpStream,
        endpoint: Endpoint,
        peer_addr: SocketAddr,
        options: &ConnectionOptions,
    ) -> Result<Self> {
        let configure = |stream: &TcpStream| -> io::Result<()> {
            stream.set_nodelay(options.nodelay)?;
            stream.set_read_timeout(options.read_timeout)?;
            stream.set_write_timeout(options.write_timeout)
        };
        configure(&stream).map_err(|e| {
            TransportError::connection_with_source("Failed to configure socket", Some(peer_addr), e)
        })?;

        info!(peer = %peer_addr, "Connected to broker");

        let now = Instant::now();
        Ok(Self {
            stream: Some(stream),
            endpoint,
            peer_addr,
            connected_at: now,
            last_activity: now,
            read_timeout: options.read_timeout,
            write_timeout: options.write_timeout,
            bytes_sent: 0,
            bytes_received: 0,
        })
    }

    /// Write all of `data`, returning the number of bytes sent
    pub fn send(&mut self, data: &[u8]) -> Result<usize> {
        let write_timeout = self.write_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::closed("send"))?;

        stream
            .write_all(data)
            .and_then(|_| stream.flush())
            .map_err(|e| TransportError::from_io("send", e, write_timeout.map(as_millis)))?;

        self.bytes_sent += data.len() as u64;
        self.last_activity = Instant::now();
        Ok(data.len())
    }

    /// Read up to `buf.len()` bytes
    ///
    /// Returns the number of bytes read, which is never zero: end of stream is
    /// reported as [`TransportError::Closed`] and an elapsed read deadline as
    /// [`TransportError::Timeout`].
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read_timeout = self.read_timeout;
        let stream = self.stream.as_mut().ok_or(TransportError::closed("recv"))?;

        let read = loop {
            match stream.read(buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::from_io("recv", e, read_timeout.map(as_millis))),
            }
        };

        if read == 0 && !buf.is_empty() {
            return Err(TransportError::closed("recv"));
        }

        self.bytes_received += read as u64;
        self.last_activity = Instant::now();
        Ok(read)
    }

    /// Shut the socket down; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // Peer may already have gone away
                if e.kind() != io::ErrorKind::NotConnected {
                    warn!(peer = %self.peer_addr, error = %e, "Socket shutdown failed");
                }
            }
            debug!(
                peer = %self.peer_addr,
                bytes_sent = self.bytes_sent,
                bytes_received = self.bytes_received,
                "Connection closed"
            );
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            peer_addr: self.peer_addr,
            connected_duration: self.connected_at.elapsed(),
            last_activity: self.last_activity.elapsed(),
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            open: self.is_open(),
        }
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_timeout(timeout: Option<Duration>, field: &str) -> Result<()> {
    match timeout {
        Some(t) if t.is_zero() => Err(TransportError::configuration(
            format!("{} must be non-zero", field),
            Some(field),
        )),
        _ => Ok(()),
    }
}

fn as_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

fn millis(timeout: Option<Duration>) -> u64 {
    timeout.map(as_millis).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn local_listener() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("127.0.0.1", port))
    }

    #[test_log::test]
    fn test_send_and_recv_echo() {
        let (listener, endpoint) = local_listener();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            socket.read_exact(&mut buf).unwrap();
            socket.write_all(&buf).unwrap();
        });

        let mut conn = TcpConnection::open(&endpoint, &ConnectionOptions::default()).unwrap();
        assert_eq!(conn.send(b"hello").unwrap(), 5);

        let mut received = Vec::new();
        let mut buf = [0u8; 2];
        while received.len() < 5 {
            let n = conn.recv(&mut buf).unwrap();
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received, b"hello");

        let stats = conn.stats();
        assert_eq!(stats.bytes_sent, 5);
        assert_eq!(stats.bytes_received, 5);
        assert!(stats.open);
        server.join().unwrap();
    }

    #[test]
    fn test_close_is_idempotent() {
        let (_listener, endpoint) = local_listener();
        let mut conn = TcpConnection::open(&endpoint, &ConnectionOptions::default()).unwrap();

        conn.close();
        conn.close();
        assert!(!conn.is_open());
        assert!(matches!(conn.send(b"x"), Err(TransportError::Closed { operation: "send" })));
        assert!(matches!(conn.recv(&mut [0u8; 4]), Err(TransportError::Closed { operation: "recv" })));
    }

    #[test]
    fn test_peer_close_reported_as_closed() {
        let (listener, endpoint) = local_listener();
        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            drop(socket);
        });

        let mut conn = TcpConnection::open(&endpoint, &ConnectionOptions::default()).unwrap();
        server.join().unwrap();

        let err = conn.recv(&mut [0u8; 16]).unwrap_err();
        assert!(matches!(err, TransportError::Closed { .. }), "got {err:?}");
    }

    #[test]
    fn test_read_timeout_reported_as_timeout() {
        let (listener, endpoint) = local_listener();
        let options = ConnectionOptions::default().with_read_timeout(Duration::from_millis(50));
        let mut conn = TcpConnection::open(&endpoint, &options).unwrap();
        let _accepted = listener.accept().unwrap();

        let err = conn.recv(&mut [0u8; 16]).unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
        assert!(conn.is_open());
    }

    #[test]
    fn test_connect_refused_is_connection_error() {
        let (listener, endpoint) = local_listener();
        drop(listener);

        let err = TcpConnection::open(&endpoint, &ConnectionOptions::default()).unwrap_err();
        assert!(matches!(err, TransportError::Connection { .. }), "got {err:?}");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (_listener, endpoint) = local_listener();
        let options = ConnectionOptions::default().with_read_timeout(Duration::ZERO);
        let err = TcpConnection::open(&endpoint, &options).unwrap_err();
        assert!(matches!(err, TransportError::Configuration { .. }));
    }
}
