//! End-to-end controller scenarios against the mock transport.

use ofmetrics_analyzer::{analyze, load_document};
use ofmetrics_controller::controller::{EventOutcome, PacketOutcome};
use ofmetrics_controller::models::{HandshakeKind, MacAddr, PortReason};
use ofmetrics_controller::transport::{Action, FlowMatch};
use ofmetrics_controller::SwitchEvent;
use ofmetrics_devkit::{EventBuilder, TestHarness};
use std::time::Duration;

#[test]
fn unknown_destinations_are_flooded() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1)]);
    let outcomes = h.feed([
        EventBuilder::packet(1, 1, 0x01, 0x09),
        EventBuilder::packet(1, 2, 0x02, 0x09),
        EventBuilder::packet(1, 3, 0x03, 0x09),
    ]);

    for outcome in outcomes {
        assert!(matches!(outcome, Ok(EventOutcome::Packet(PacketOutcome::Flooded))));
    }
    let packet_outs = h.transport.packet_outs();
    assert_eq!(packet_outs.len(), 3);
    assert!(packet_outs.iter().all(|p| p.actions == vec![Action::Flood] && p.data.is_some()));
    assert!(h.transport.forwarding_rules().is_empty());
    assert_eq!(h.controller.learned_hosts(1), 3);

    let snapshot = h.snapshot();
    assert_eq!(snapshot.connection.active_connections, 1);
    assert_eq!(snapshot.packet_out.count, 3);
    assert!(snapshot.packet_in.latencies().is_empty());
    h.assert_consistent().unwrap();
}

#[test]
fn known_destination_installs_one_rule() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1), EventBuilder::packet(1, 2, 0x0b, 0x0a)]);
    h.transport.clear();
    let before = h.snapshot();

    let outcome = h.controller.handle_event(EventBuilder::buffered_packet(1, 1, 0x0a, 0x0b, 42)).unwrap();
    assert_eq!(outcome, EventOutcome::Packet(PacketOutcome::Installed { out_port: 2 }));

    let rules = h.transport.flow_mods();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].priority, 1);
    assert_eq!(rules[0].buffer_id, Some(42));
    assert_eq!(
        rules[0].matching,
        FlowMatch::exact(1, EventBuilder::mac(0x0b), EventBuilder::mac(0x0a))
    );
    assert_eq!(rules[0].actions, vec![Action::Output { port: 2 }]);
    assert!(h.transport.packet_outs().is_empty());

    let after = h.snapshot();
    assert_eq!(after.packet_out.count, before.packet_out.count);
    assert_eq!(after.packet_in.latencies().len(), before.packet_in.latencies().len() + 1);
    assert!(after.packet_in.latencies().iter().all(|l| *l >= 0.0));
    assert_eq!(after.flow_mod.count, before.flow_mod.count + 1);
    h.assert_consistent().unwrap();
}

#[test]
fn unbuffered_known_destination_is_forwarded_explicitly() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1), EventBuilder::packet(1, 2, 0x0b, 0x0a)]);
    h.transport.clear();

    let outcome = h.controller.handle_event(EventBuilder::packet(1, 1, 0x0a, 0x0b)).unwrap();
    assert_eq!(outcome, EventOutcome::Packet(PacketOutcome::Forwarded { out_port: 2 }));
    assert_eq!(h.transport.forwarding_rules().len(), 1);
    let outs = h.transport.packet_outs();
    assert_eq!(outs.len(), 1);
    assert_eq!(outs[0].actions, vec![Action::Output { port: 2 }]);
    assert!(outs[0].data.is_some());
    assert_eq!(h.snapshot().packet_in.latencies().len(), 1);
}

#[test]
fn output_port_follows_latest_location() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(7)]);

    let moves: [u32; 6] = [1, 4, 4, 2, 6, 3];
    for (i, port) in moves.into_iter().enumerate() {
        // host 0x10 shows up on a new port, then host 0x20 sends to it
        h.feed([EventBuilder::packet(7, port, 0x10, 0xee)]);
        let outcome = h
            .controller
            .handle_event(EventBuilder::buffered_packet(7, 9, 0x20, 0x10, i as u32))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Packet(PacketOutcome::Installed { out_port: port }));
        assert_eq!(h.controller.lookup(7, &EventBuilder::mac(0x10)), Some(port));
    }
    assert_eq!(h.controller.learned_hosts(7), 2);
}

#[test]
fn tables_are_per_switch() {
    let h = TestHarness::new();
    h.feed([
        EventBuilder::connect(1),
        EventBuilder::connect(2),
        EventBuilder::packet(1, 5, 0x0b, 0x0a),
    ]);
    let outcome = h.controller.handle_event(EventBuilder::buffered_packet(2, 1, 0x0a, 0x0b, 1)).unwrap();
    assert_eq!(outcome, EventOutcome::Packet(PacketOutcome::Flooded));
    assert_eq!(h.controller.switch_count(), 2);
    assert_eq!(h.snapshot().connection.established.len(), 2);
    assert_eq!(h.snapshot().connection.establishment_times.len(), 1);
}

#[test]
fn probes_and_garbage_leave_no_trace() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1)]);
    h.transport.clear();
    let before = h.snapshot();

    let outcomes = h.feed([
        EventBuilder::lldp(1, 1),
        EventBuilder::truncated(1, 1),
        EventBuilder::port_status(1, 3, PortReason::Delete),
    ]);
    assert!(matches!(outcomes[0], Ok(EventOutcome::Packet(PacketOutcome::Ignored))));
    assert!(matches!(outcomes[1], Ok(EventOutcome::Packet(PacketOutcome::Dropped))));
    assert!(matches!(outcomes[2], Ok(EventOutcome::PortStatus)));

    assert!(h.transport.sent().is_empty());
    assert_eq!(h.snapshot(), before);
    assert_eq!(h.controller.learned_hosts(1), 0);
}

#[test]
fn send_failure_is_reported_and_not_recorded() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1)]);
    let before = h.snapshot();

    h.transport.fail_next(1);
    let results = h.feed([EventBuilder::packet(1, 1, 0x01, 0x02), EventBuilder::packet(1, 2, 0x02, 0x01)]);
    assert!(results[0].is_err());
    // the next event is handled normally
    assert!(matches!(results[1], Ok(EventOutcome::Packet(PacketOutcome::Forwarded { out_port: 1 }))));

    let after = h.snapshot();
    assert_eq!(after.packet_in.count, before.packet_in.count + 2);
    // one explicit packet-out for the forwarded packet, none for the failed flood
    assert_eq!(after.packet_out.count, before.packet_out.count + 1);
    assert_eq!(after.packet_in.latencies().len(), 1);
    h.assert_consistent().unwrap();
}

#[test]
fn blocking_send_time_is_part_of_the_latency() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1), EventBuilder::packet(1, 2, 0x0b, 0x0a)]);
    h.transport.set_send_delay(Some(Duration::from_millis(5)));

    h.controller.handle_event(EventBuilder::buffered_packet(1, 1, 0x0a, 0x0b, 3)).unwrap();
    let snapshot = h.snapshot();
    let flow_mod_latency = *snapshot.flow_mod.latencies().last().unwrap();
    let end_to_end = *snapshot.packet_in.latencies().last().unwrap();
    assert!(flow_mod_latency >= 5.0, "flow-mod latency {flow_mod_latency}");
    assert!(end_to_end >= flow_mod_latency);
}

#[test]
fn handshake_messages_are_counted() {
    let h = TestHarness::new();
    let results = h.feed([
        SwitchEvent::ControlMessage { switch: 1, kind: HandshakeKind::Hello, size: 8 },
        EventBuilder::echo_request(1),
        EventBuilder::echo_request(1),
        EventBuilder::connect(1),
    ]);
    assert!(results.iter().all(Result::is_ok));
    let snapshot = h.snapshot();
    assert_eq!(snapshot.hello.count, 1);
    assert_eq!(snapshot.echo_request.count, 2);
    assert_eq!(snapshot.features_reply.sizes, vec![32]);
    assert!(snapshot.hello.latencies.is_none());
}

#[test]
fn concurrent_switches_keep_metrics_consistent() {
    let h = TestHarness::new();
    let threads: Vec<_> = (1..=8u64)
        .map(|switch| {
            let controller = h.controller.clone();
            std::thread::spawn(move || {
                controller.handle_event(EventBuilder::connect(switch)).unwrap();
                for i in 0..50u8 {
                    let src = i % 10;
                    let dst = (i + 3) % 10;
                    let port = u32::from(src) + 1;
                    controller
                        .handle_event(EventBuilder::buffered_packet(switch, port, src, dst, u32::from(i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    h.assert_consistent().unwrap();
    let snapshot = h.snapshot();
    assert_eq!(snapshot.packet_in.count, 8 * 50);
    assert_eq!(snapshot.connection.active_connections, 8);
    assert_eq!(snapshot.connection.establishment_times.len(), 1);
    assert_eq!(snapshot.flow_mod.count as usize, h.transport.flow_mods().len());
    assert_eq!(snapshot.packet_out.count as usize, h.transport.packet_outs().len());
    for switch in 1..=8 {
        assert_eq!(h.controller.learned_hosts(switch), 10);
    }
}

#[tokio::test]
async fn event_loop_handles_interleaved_switches() {
    let h = TestHarness::new();
    let mut events: Vec<SwitchEvent> = (1..=4).map(EventBuilder::connect).collect();
    for i in 0..25u8 {
        for switch in 1..=4u64 {
            events.push(EventBuilder::packet(switch, u32::from(i % 5) + 1, i % 5, (i + 1) % 5));
        }
    }

    h.run_events(events).await.unwrap();
    h.assert_consistent().unwrap();
    let snapshot = h.snapshot();
    assert_eq!(snapshot.packet_in.count, 100);
    assert_eq!(snapshot.features_reply.count, 4);
    for switch in 1..=4 {
        assert_eq!(h.controller.learned_hosts(switch), 5);
    }
}

#[tokio::test]
async fn shutdown_writes_a_document_the_analyzer_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("tcp_baseline_metrics.json");
    let h = TestHarness::new();
    h.run_events(vec![
        EventBuilder::connect(1),
        EventBuilder::packet(1, 2, 0x0b, 0x0a),
        EventBuilder::buffered_packet(1, 1, 0x0a, 0x0b, 1),
        EventBuilder::buffered_packet(1, 2, 0x0b, 0x0a, 2),
    ])
    .await
    .unwrap();

    let handler = h.shutdown_handler(&path);
    assert_eq!(handler.shutdown().await.unwrap().unwrap(), path);
    assert!(handler.shutdown().await.is_none());

    let document = load_document(&path).unwrap();
    assert_eq!(document.metadata.run_id.as_deref(), Some("harness"));
    let live = h.snapshot();
    assert_eq!(document.metrics.packet_in.count, live.packet_in.count);
    assert_eq!(document.metrics.flow_mod.sizes, live.flow_mod.sizes);
    assert_eq!(document.metrics.overhead, live.overhead);

    let analysis = analyze(&document);
    let packet_in = analysis.latency[0].1.unwrap();
    assert_eq!(packet_in.count, 2);
    assert!(packet_in.min >= 0.0 && packet_in.p95 <= packet_in.max);
    let overhead = analysis.overhead.unwrap();
    assert!(overhead.percentage > 0.0 && overhead.percentage < 100.0);

    let report = analysis.render();
    assert!(report.contains("TCP BASELINE PERFORMANCE REPORT"));
    assert!(report.contains("Sample Count: 2"));
    assert_eq!(report, analyze(&load_document(&path).unwrap()).render());
}

#[test]
fn table_miss_rule_alone_gives_twenty_percent_overhead() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1)]);
    let rules = h.transport.flow_mods();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].priority, 0);
    assert_eq!(rules[0].matching, FlowMatch::any());

    // 20 header bytes against an 80-byte table-miss flow-mod
    let overhead = h.snapshot().overhead;
    assert_eq!((overhead.total_headers, overhead.payload), (20, 80));
    assert_eq!(overhead.percentage(), Some(20.0));
}

#[test]
fn broadcast_frames_are_always_flooded() {
    let h = TestHarness::new();
    h.feed([EventBuilder::connect(1), EventBuilder::packet(1, 4, 0x0b, 0x0a)]);
    h.transport.clear();

    let frame = EventBuilder::frame(MacAddr::BROADCAST, EventBuilder::mac(0x0a), 0x0806);
    let outcome = h
        .controller
        .handle_event(SwitchEvent::PacketArrived { switch: 1, in_port: 2, data: frame, buffer_id: None })
        .unwrap();
    assert_eq!(outcome, EventOutcome::Packet(PacketOutcome::Flooded));
    assert!(h.transport.forwarding_rules().is_empty());
    assert_eq!(h.controller.lookup(1, &EventBuilder::mac(0x0a)), Some(2));
}
