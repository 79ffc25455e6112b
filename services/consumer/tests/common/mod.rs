//! In-process broker speaking the RESP subset the consumer uses
//!
//! Supports `SUBSCRIBE <channel>` and `XADD <stream> * <field> <value> ...`.
//! Every XADD is recorded so tests can assert on the exact arguments.

#![allow(dead_code)]

use codec::{Reply, ReplyDecoder};
use consumer_config::ConsumerConfig;
use parking_lot::{Condvar, Mutex};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const HANDLER_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Default)]
pub struct BrokerOptions {
    /// Answer SUBSCRIBE with an error reply
    pub reject_subscribe: bool,
    /// Answer XADD with an error reply
    pub reject_publish: bool,
    /// `message` pushes written before the subscribe acknowledgement
    pub early_pushes: Vec<String>,
}

struct Subscriber {
    channel: String,
    stream: TcpStream,
}

#[derive(Default)]
struct BrokerState {
    subscribers: Vec<Subscriber>,
    subscribe_count: usize,
    published: Vec<Vec<String>>,
    next_entry: u64,
}

struct Shared {
    options: BrokerOptions,
    shutdown: AtomicBool,
    state: Mutex<BrokerState>,
    changed: Condvar,
}

pub struct FakeBroker {
    port: u16,
    shared: Arc<Shared>,
    acceptor: Option<JoinHandle<()>>,
}

impl FakeBroker {
    pub fn start() -> Self {
        Self::start_with(BrokerOptions::default())
    }

    pub fn start_with(options: BrokerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let shared = Arc::new(Shared {
            options,
            shutdown: AtomicBool::new(false),
            state: Mutex::new(BrokerState::default()),
            changed: Condvar::new(),
        });

        let accept_shared = Arc::clone(&shared);
        let acceptor = thread::spawn(move || accept_loop(listener, accept_shared));

        Self {
            port,
            shared,
            acceptor: Some(acceptor),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Consumer config pointing at this broker, with short timings
    pub fn config(&self, group_size: usize) -> ConsumerConfig {
        let mut config = ConsumerConfig::default().with_group_size(group_size);
        config.port = self.port;
        config.monitoring_interval_secs = 0;
        config.connection.poll_interval_ms = 20;
        config.connection.connect_timeout_ms = 1_000;
        config.connection.publish_timeout_ms = 1_000;
        config.reconnect.initial_backoff_ms = 10;
        config.reconnect.max_backoff_ms = 50;
        config
    }

    pub fn wait_for_subscribers(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.subscribers.len() >= count)
    }

    pub fn wait_for_published(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state.published.len() >= count)
    }

    /// Push `payload` to every subscriber of `channel`; returns how many received it
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let frame = message_push(channel, payload);
        let mut state = self.shared.state.lock();
        let mut delivered = 0;
        for subscriber in state.subscribers.iter_mut().filter(|s| s.channel == channel) {
            if subscriber.stream.write_all(&frame).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Push a message claiming to come from `reported_channel` to every subscriber
    pub fn push_to_all(&self, reported_channel: &str, payload: &str) {
        let frame = message_push(reported_channel, payload);
        let mut state = self.shared.state.lock();
        for subscriber in state.subscribers.iter_mut() {
            let _ = subscriber.stream.write_all(&frame);
        }
    }

    /// Write raw bytes to every subscriber
    pub fn push_raw(&self, bytes: &[u8]) {
        let mut state = self.shared.state.lock();
        for subscriber in state.subscribers.iter_mut() {
            let _ = subscriber.stream.write_all(bytes);
        }
    }

    /// Close every subscription connection from the broker side
    pub fn disconnect_subscribers(&self) {
        let mut state = self.shared.state.lock();
        for subscriber in state.subscribers.drain(..) {
            let _ = subscriber.stream.shutdown(Shutdown::Both);
        }
        self.shared.changed.notify_all();
    }

    /// Arguments of every XADD received, stream key first
    pub fn published(&self) -> Vec<Vec<String>> {
        self.shared.state.lock().published.clone()
    }

    /// Total SUBSCRIBE commands received, rejected ones included
    pub fn subscribe_count(&self) -> usize {
        self.shared.state.lock().subscribe_count
    }

    fn wait_until(&self, timeout: Duration, ready: impl Fn(&BrokerState) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while !ready(&state) {
            if self.shared.changed.wait_until(&mut state, deadline).timed_out() {
                return ready(&state);
            }
        }
        true
    }
}

impl Drop for FakeBroker {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.disconnect_subscribers();
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    while !shared.shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, _)) => {
                let shared = Arc::clone(&shared);
                thread::spawn(move || handle_connection(stream, shared));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(Duration::from_millis(5)),
            Err(_) => break,
        }
    }
}

fn handle_connection(mut stream: TcpStream, shared: Arc<Shared>) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(HANDLER_POLL));
    let mut decoder = ReplyDecoder::new();
    let mut buf = [0u8; 512];

    while !shared.shutdown.load(Ordering::Acquire) {
        let read = match stream.read(&mut buf) {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(_) => return,
        };
        decoder.feed(&buf[..read]);

        loop {
            let command = match decoder.next_reply() {
                Ok(Some(reply)) => command_args(reply),
                Ok(None) => break,
                Err(_) => return,
            };
            if handle_command(&mut stream, &shared, command).is_err() {
                return;
            }
        }
    }
}

fn handle_command(stream: &mut TcpStream, shared: &Shared, args: Vec<String>) -> std::io::Result<()> {
    let keyword = args.first().map(|k| k.to_ascii_uppercase()).unwrap_or_default();
    match keyword.as_str() {
        "SUBSCRIBE" if args.len() == 2 => {
            let channel = args[1].clone();
            let mut state = shared.state.lock();
            state.subscribe_count += 1;

            if shared.options.reject_subscribe {
                shared.changed.notify_all();
                return stream.write_all(b"-ERR subscriptions are disabled\r\n");
            }

            for payload in &shared.options.early_pushes {
                stream.write_all(&message_push(&channel, payload))?;
            }
            let ack = format!("*3\r\n$9\r\nsubscribe\r\n${}\r\n{}\r\n:1\r\n", channel.len(), channel);
            stream.write_all(ack.as_bytes())?;

            state.subscribers.push(Subscriber {
                channel,
                stream: stream.try_clone()?,
            });
            shared.changed.notify_all();
            Ok(())
        }
        "XADD" if args.len() >= 5 => {
            if shared.options.reject_publish {
                return stream.write_all(b"-ERR stream is read only\r\n");
            }

            let mut state = shared.state.lock();
            state.next_entry += 1;
            let entry_id = format!("1700000000000-{}", state.next_entry);
            state.published.push(args[1..].to_vec());
            shared.changed.notify_all();
            drop(state);

            stream.write_all(format!("${}\r\n{}\r\n", entry_id.len(), entry_id).as_bytes())
        }
        _ => stream.write_all(b"-ERR unknown command\r\n"),
    }
}

fn command_args(reply: Reply) -> Vec<String> {
    match reply {
        Reply::Array(items) => items
            .iter()
            .filter_map(|item| item.as_bulk_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn message_push(channel: &str, payload: &str) -> Vec<u8> {
    codec::CommandBuilder::new("message").arg(channel).arg(payload).build()
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
