/**
 * CONTROLLER CORE - learning switch with control-plane instrumentation
 *
 * ROLE: reacts to switch events (connect, packet-in, port status, handshake
 * messages), maintains the forwarding table, decides between flooding and
 * installing a rule, and records timing/size samples for every message it
 * sees or sends.
 *
 * ARCHITECTURE: `Controller` is cheap to clone (shared `Arc` state). The
 * event loop in `run` spawns one worker task per switch, so events of one
 * switch are handled in delivery order while different switches proceed
 * concurrently. The forwarding table and the connection registry each sit
 * behind their own mutex; metrics go through `MetricsStore`.
 *
 * LATENCY:
 * - flow_mod: time spent around the local dispatch call. This is a proxy,
 *   not a switch-side installation acknowledgment.
 * - packet_in: from packet arrival to completion of the flow-mod (or of the
 *   packet-out when the switch did not buffer the packet).
 */

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::forwarding::ForwardingTable;
use crate::metrics::{elapsed_ms, MessageRecord, MetricsError, MetricsStore};
use crate::models::{BufferId, HandshakeKind, MacAddr, PortNo, PortReason, SwitchEvent, SwitchId};
use crate::packet;
use crate::snapshot::Category;
use crate::transport::{Action, FlowMatch, FlowMod, PacketOut, Transport, TransportError};

pub const TABLE_MISS_PRIORITY: u16 = 0;
pub const FORWARDING_PRIORITY: u16 = 1;
const WORKER_QUEUE_DEPTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("metrics rejected: {0}")]
    Metrics(#[from] MetricsError),
}

/// Per-switch connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    /// Features reply seen, table-miss rule not yet installed.
    Connecting,
    Established,
}

/// What the controller did with one packet-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    /// Undecodable frame, dropped without metrics.
    Dropped,
    /// Discovery probe, consumed without metrics.
    Ignored,
    /// Destination unknown, packet-out with flood action.
    Flooded,
    /// Rule installed with the switch buffer; the switch releases the packet.
    Installed { out_port: PortNo },
    /// Rule installed, then an explicit packet-out since the switch kept no buffer.
    Forwarded { out_port: PortNo },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Connected { first_connection: bool },
    Packet(PacketOutcome),
    PortStatus,
    ControlMessage,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerSettings {
    /// Framing bytes charged to the overhead accumulator per message.
    pub header_bytes: u64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self { header_bytes: 20 }
    }
}

#[derive(Clone)]
pub struct Controller {
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsStore>,
    table: Arc<Mutex<ForwardingTable>>,
    connections: Arc<Mutex<HashMap<SwitchId, ConnectionState>>>,
    settings: ControllerSettings,
}

impl Controller {
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<MetricsStore>, settings: ControllerSettings) -> Self {
        Self {
            transport,
            metrics,
            table: Arc::new(Mutex::new(ForwardingTable::new())),
            connections: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn connection_state(&self, switch: SwitchId) -> ConnectionState {
        self.connections
            .lock()
            .get(&switch)
            .copied()
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn switch_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Port currently learned for `mac` on `switch`.
    pub fn lookup(&self, switch: SwitchId, mac: &MacAddr) -> Option<PortNo> {
        self.table.lock().lookup(switch, mac)
    }

    pub fn learned_hosts(&self, switch: SwitchId) -> usize {
        self.table.lock().hosts(switch)
    }

    pub fn handle_event(&self, event: SwitchEvent) -> Result<EventOutcome, ControllerError> {
        match event {
            SwitchEvent::SwitchConnected { switch, features_len } => {
                let first_connection = self.on_switch_connected(switch, features_len)?;
                Ok(EventOutcome::Connected { first_connection })
            }
            SwitchEvent::PacketArrived { switch, in_port, data, buffer_id } => {
                self.on_packet_in(switch, in_port, &data, buffer_id).map(EventOutcome::Packet)
            }
            SwitchEvent::PortStatusChanged { switch, port, reason } => {
                self.on_port_status(switch, port, reason);
                Ok(EventOutcome::PortStatus)
            }
            SwitchEvent::ControlMessage { switch, kind, size } => {
                self.on_control_message(switch, kind, size)?;
                Ok(EventOutcome::ControlMessage)
            }
        }
    }

    /// Features reply: register the switch and install the table-miss rule.
    /// Returns whether this was the first connection of the process.
    pub fn on_switch_connected(&self, switch: SwitchId, features_len: u64) -> Result<bool, ControllerError> {
        let now = Instant::now();
        self.connections.lock().insert(switch, ConnectionState::Connecting);

        let establishment = self.metrics.record_connection(switch, now);
        if let Some(ms) = establishment {
            info!("[CONNECTION] first switch after {:.2}ms", ms);
        }
        let timestamp = self.metrics.clock().timestamp_at(now);
        self.metrics
            .record(MessageRecord::new(Category::FeaturesReply, timestamp, features_len)?);

        info!(
            "[CONNECTION] switch {:#x} connected, active connections: {}, features reply: {} bytes",
            switch,
            self.metrics.active_connections(),
            features_len
        );

        let actions = vec![Action::Controller { max_len: Action::CONTROLLER_NO_BUFFER }];
        self.add_flow(switch, TABLE_MISS_PRIORITY, FlowMatch::any(), actions, None)?;
        self.connections.lock().insert(switch, ConnectionState::Established);
        Ok(establishment.is_some())
    }

    pub fn on_packet_in(
        &self,
        switch: SwitchId,
        in_port: PortNo,
        data: &[u8],
        buffer_id: Option<BufferId>,
    ) -> Result<PacketOutcome, ControllerError> {
        let arrival = Instant::now();

        let eth = match packet::parse_ethernet(data) {
            Ok(eth) => eth,
            Err(e) => {
                debug!("[PACKET_IN] dropped frame from {:#x} port {}: {}", switch, in_port, e);
                return Ok(PacketOutcome::Dropped);
            }
        };
        if eth.is_discovery_probe() {
            return Ok(PacketOutcome::Ignored);
        }
        if self.connection_state(switch) != ConnectionState::Established {
            warn!("[PACKET_IN] switch {:#x} sent packet-in before connection setup", switch);
        }

        let size = data.len() as u64;
        let timestamp = self.metrics.clock().timestamp_at(arrival);
        self.metrics.record(MessageRecord::new(Category::PacketIn, timestamp, size)?);
        self.metrics.add_overhead(self.settings.header_bytes, size);

        debug!(
            "[PACKET_IN] from {:#x} port {}, src={} dst={}, size={}B",
            switch, in_port, eth.src, eth.dst, size
        );

        let out_port = {
            let mut table = self.table.lock();
            table.learn(switch, eth.src, in_port);
            table.lookup(switch, &eth.dst)
        };

        let Some(out_port) = out_port else {
            let packet_out = PacketOut {
                switch,
                buffer_id,
                data: buffer_id.is_none().then(|| data.to_vec()),
                in_port,
                actions: vec![Action::Flood],
            };
            self.send_packet_out(&packet_out)?;
            return Ok(PacketOutcome::Flooded);
        };

        let actions = vec![Action::Output { port: out_port }];
        let matching = FlowMatch::exact(in_port, eth.dst, eth.src);
        if buffer_id.is_some() {
            self.add_flow(switch, FORWARDING_PRIORITY, matching, actions, buffer_id)?;
            self.record_end_to_end(arrival)?;
            return Ok(PacketOutcome::Installed { out_port });
        }

        // No buffer on the switch: the rule only covers later packets, so
        // this one goes out explicitly.
        self.add_flow(switch, FORWARDING_PRIORITY, matching, actions.clone(), None)?;
        let packet_out = PacketOut { switch, buffer_id: None, data: Some(data.to_vec()), in_port, actions };
        self.send_packet_out(&packet_out)?;
        self.record_end_to_end(arrival)?;
        Ok(PacketOutcome::Forwarded { out_port })
    }

    pub fn on_port_status(&self, switch: SwitchId, port: PortNo, reason: PortReason) {
        match reason {
            PortReason::Add => info!("[PORT] switch {:#x} port {} ADDED", switch, port),
            PortReason::Delete => info!("[PORT] switch {:#x} port {} DELETED", switch, port),
            PortReason::Modify => info!("[PORT] switch {:#x} port {} MODIFIED", switch, port),
        }
    }

    pub fn on_control_message(&self, switch: SwitchId, kind: HandshakeKind, size: u64) -> Result<(), ControllerError> {
        let timestamp = self.metrics.clock().now();
        self.metrics.record(MessageRecord::new(kind.category(), timestamp, size)?);
        debug!("[CONTROL] {:?} from {:#x}, size={}B", kind, switch, size);
        Ok(())
    }

    /// Build and dispatch a flow-mod, then record its dispatch latency.
    /// Nothing is recorded when the send fails.
    pub fn add_flow(
        &self,
        switch: SwitchId,
        priority: u16,
        matching: FlowMatch,
        actions: Vec<Action>,
        buffer_id: Option<BufferId>,
    ) -> Result<(), ControllerError> {
        let flow_mod = FlowMod { switch, priority, matching, actions, buffer_id };

        let start = Instant::now();
        let size = self.transport.install_rule(&flow_mod)? as u64;
        let end = Instant::now();
        let latency = elapsed_ms(start, end);

        let timestamp = self.metrics.clock().timestamp_at(end);
        self.metrics
            .record(MessageRecord::new(Category::FlowMod, timestamp, size)?.with_latency(latency)?);
        self.metrics.add_overhead(self.settings.header_bytes, size);

        debug!("[FLOW_MOD] sent to {:#x}, size={}B, latency={:.3}ms", switch, size, latency);
        Ok(())
    }

    fn send_packet_out(&self, packet_out: &PacketOut) -> Result<(), ControllerError> {
        let size = self.transport.send_packet_out(packet_out)? as u64;
        let timestamp = self.metrics.clock().now();
        self.metrics.record(MessageRecord::new(Category::PacketOut, timestamp, size)?);
        debug!("[PACKET_OUT] to {:#x} actions={:?}, size={}B", packet_out.switch, packet_out.actions, size);
        Ok(())
    }

    fn record_end_to_end(&self, arrival: Instant) -> Result<(), ControllerError> {
        let latency = elapsed_ms(arrival, Instant::now());
        self.metrics.record_latency(Category::PacketIn, latency)?;
        debug!("  -> e2e_latency={:.3}ms", latency);
        Ok(())
    }

    /// Event loop. Returns once the feed closes or a stop is signalled, after
    /// every event already queued or dispatched to a switch worker has been
    /// handled.
    pub async fn run(&self, mut events: mpsc::Receiver<SwitchEvent>, mut stop: watch::Receiver<bool>) {
        let mut workers: HashMap<SwitchId, (mpsc::Sender<SwitchEvent>, JoinHandle<()>)> = HashMap::new();

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(&mut workers, event).await;
                }
            }
        }

        // no new events from here on, but the ones already queued still count
        events.close();
        while let Some(event) = events.recv().await {
            self.dispatch(&mut workers, event).await;
        }

        info!("[controller] event loop stopping, draining {} switch workers", workers.len());
        for (switch, (sender, handle)) in workers.drain() {
            drop(sender);
            if let Err(e) = handle.await {
                error!("[controller] worker for switch {:#x} panicked: {}", switch, e);
            }
        }
    }

    async fn dispatch(
        &self,
        workers: &mut HashMap<SwitchId, (mpsc::Sender<SwitchEvent>, JoinHandle<()>)>,
        event: SwitchEvent,
    ) {
        let switch = event.switch();
        let (sender, _) = workers.entry(switch).or_insert_with(|| self.spawn_worker(switch));
        if sender.send(event).await.is_err() {
            error!("[controller] worker for switch {:#x} is gone", switch);
            workers.remove(&switch);
        }
    }

    fn spawn_worker(&self, switch: SwitchId) -> (mpsc::Sender<SwitchEvent>, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<SwitchEvent>(WORKER_QUEUE_DEPTH);
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                // transport sends may block; keep them off the runtime threads
                let handler = controller.clone();
                match task::spawn_blocking(move || handler.handle_event(event)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!("[controller] event from switch {:#x} failed: {}", switch, e),
                    Err(e) => error!("[controller] handler for switch {:#x} panicked: {}", switch, e),
                }
            }
        });
        (sender, handle)
    }
}
