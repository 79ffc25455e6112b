//! # Stream Consumer - Pub/Sub to Stream Republishing
//!
//! ## Purpose
//!
//! Subscribes to one broker channel, extracts a message identifier from each
//! pushed payload, enriches it with processing metadata, and appends the
//! result to an output stream. With a group size above one the payloads are
//! spread over a pool of workers, each owning its own publish connection.
//!
//! ## Architecture Role
//!
//! ```text
//! broker channel ──SUBSCRIBE──> SubscriptionLoop
//!                                   │
//!                    group = 1      │      group > 1
//!              ┌────────────────────┴──────────────────┐
//!              ▼                                       ▼
//!      SinglePathConsumer                DispatchQueue ─> Worker 1..N
//!              │                                       │
//!              └──────────── XADD <stream> ◄───────────┘
//! ```
//!
//! The [`Supervisor`] owns the session lifecycle: it reconnects with
//! backoff after connection faults and keeps the per-worker counters alive
//! across sessions. Everything below it runs on plain OS threads over
//! blocking sockets.
//!
//! ## Threads
//!
//! - one subscription reader (the supervisor's thread)
//! - `group_size` workers in grouped mode, none otherwise
//! - an optional throughput reporter
//!
//! Stop requests travel through a shared [`StopSignal`]; each thread checks it
//! at its own suspension point, so an in-flight publish always completes.

pub mod counters;
pub mod error;
pub mod extractor;
pub mod monitor;
pub mod pool;
pub mod processor;
pub mod publisher;
pub mod queue;
pub mod shutdown;
pub mod single;
pub mod subscription;
pub mod supervisor;
pub mod worker;

pub use counters::{CounterValues, Counters, GroupCounters, GroupSnapshot, ProcessedCount};
pub use error::{ConnectionRole, ConsumerError, ConsumerResult, PublishError};
pub use extractor::{Extractor, JsonIdExtractor, MESSAGE_ID_KEY};
pub use monitor::{RateTracker, ThroughputReport, ThroughputReporter};
pub use pool::{PoolStatus, WorkerPool};
pub use processor::{MessageProcessor, Outcome, ProcessingContext};
pub use publisher::{PublishTarget, StreamPublisher};
pub use queue::{DispatchQueue, QueueStopped};
pub use shutdown::StopSignal;
pub use single::SinglePathConsumer;
pub use subscription::{PayloadSink, SubscriptionLoop, SubscriptionState, SubscriptionStats};
pub use supervisor::Supervisor;
pub use worker::{Worker, WorkerState};
