//! Instrumented OpenFlow learning-switch controller.
//!
//! - `controller`: event handling, forwarding decisions, latency capture
//! - `metrics` / `snapshot`: shared metrics store and its persisted document
//! - `reporter`: periodic live summary
//! - `shutdown`: one-shot drain and persistence on stop
//! - `transport`: command types and the trait a protocol stack implements

pub mod config;
pub mod controller;
pub mod forwarding;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod packet;
pub mod replay;
pub mod reporter;
pub mod shutdown;
pub mod snapshot;
pub mod transport;

pub use controller::{Controller, ControllerError, ControllerSettings, PacketOutcome};
pub use metrics::MetricsStore;
pub use models::{MacAddr, SwitchEvent, SwitchId};
pub use snapshot::{Category, MetricsDocument, MetricsSnapshot};
pub use transport::{Transport, TransportError};
