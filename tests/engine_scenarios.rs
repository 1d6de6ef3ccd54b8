use std::sync::Arc;
use std::thread;

use packet_telemetry::analysis::{ProtocolLabel, TransportFlags};
use packet_telemetry::capture::{decode_frame, DecodedPacket, IngestionAdapter};
use packet_telemetry::config::{Config, PublisherConfig};
use packet_telemetry::publish::{BroadcastSink, SnapshotPublisher};
use packet_telemetry::Aggregator;

const NOW: f64 = 1_700_000_000.0;

fn packet(src: Option<&str>, transport: TransportFlags, timestamp: f64) -> DecodedPacket {
    DecodedPacket {
        has_ip: src.is_some(),
        source_addr: src.map(str::to_string),
        dest_addr: src.map(|_| "10.0.0.254".to_string()),
        transport,
        ip_protocol: None,
        byte_length: 100,
        timestamp,
    }
}

fn tcp() -> TransportFlags {
    TransportFlags { tcp: true, ..TransportFlags::default() }
}

fn udp() -> TransportFlags {
    TransportFlags { udp: true, ..TransportFlags::default() }
}

#[test]
fn talkers_scenario_through_adapter_and_broadcast() {
    let config = Config::default();
    let aggregator = Arc::new(Aggregator::from_config(&config.engine).unwrap());
    let adapter = IngestionAdapter::new(Arc::clone(&aggregator));

    let publisher = SnapshotPublisher::new(Arc::clone(&aggregator), &config.publisher).unwrap();
    let broadcast = Arc::new(BroadcastSink::new(8));
    let mut viewer = broadcast.subscribe();
    publisher.add_sink(broadcast);

    for i in 0..3 {
        adapter.on_packet(packet(Some("10.0.0.1"), tcp(), NOW - 0.2 * i as f64));
    }
    for i in 0..2 {
        adapter.on_packet(packet(Some("10.0.0.2"), udp(), NOW - 0.7 - 0.1 * i as f64));
    }

    let report = publisher.publish_once(NOW).unwrap();
    assert_eq!(report.delivered, vec!["broadcast".to_string()]);

    let payload = viewer.try_recv().unwrap();
    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(value["total_packets"], 5);
    assert_eq!(value["protocol_counts"]["TCP"], 3);
    assert_eq!(value["protocol_counts"]["UDP"], 2);
    assert_eq!(value["packets_per_sec"], 0.5);
    assert_eq!(
        value["top_src_ips"],
        serde_json::json!([["10.0.0.1", 3], ["10.0.0.2", 2]])
    );
    assert_eq!(value["recent"].as_array().unwrap().len(), 5);
}

#[test]
fn non_ip_frame_is_counted_not_ranked() {
    let aggregator = Arc::new(Aggregator::new(100).unwrap());
    let adapter = IngestionAdapter::new(Arc::clone(&aggregator));

    let mut arp = vec![0xffu8; 12];
    arp.extend_from_slice(&[0x08, 0x06]);
    arp.extend_from_slice(&[0u8; 28]);
    adapter.on_packet(decode_frame(&arp, NOW - 1.0));

    let snapshot = aggregator.snapshot(10.0, NOW).unwrap();
    assert_eq!(snapshot.protocol_count(&ProtocolLabel::NonIp), 1);
    assert!(snapshot.top_sources.is_empty());
    assert_eq!(snapshot.recent_sample[0].byte_length, 42);
}

#[test]
fn eviction_keeps_latest_records_in_call_order() {
    let aggregator = Arc::new(Aggregator::new(5).unwrap());
    let adapter = IngestionAdapter::new(Arc::clone(&aggregator));

    for n in 1..=8u64 {
        let mut p = packet(Some("10.0.0.1"), tcp(), NOW - 1.0);
        p.byte_length = n;
        adapter.on_packet(p);
    }

    let snapshot = aggregator.snapshot(10.0, NOW).unwrap();
    let sizes: Vec<u64> = snapshot.recent_sample.iter().map(|r| r.byte_length).collect();
    assert_eq!(sizes, vec![4, 5, 6, 7, 8]);
    // Only the five retained records are inside the window.
    assert_eq!(snapshot.packets_per_second, 0.5);
    assert_eq!(snapshot.total_packets, 8);
}

#[test]
fn concurrent_sources_and_snapshots_stay_consistent() {
    let aggregator = Arc::new(Aggregator::new(1000).unwrap());
    let adapter = IngestionAdapter::new(Arc::clone(&aggregator));
    let publisher = SnapshotPublisher::new(Arc::clone(&aggregator), &PublisherConfig::default()).unwrap();

    let sources: Vec<_> = (0..3)
        .map(|worker| {
            let adapter = adapter.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    let transport = if i % 2 == 0 { tcp() } else { udp() };
                    let src = format!("10.0.{}.{}", worker, i % 7);
                    adapter.on_packet(packet(Some(&src), transport, NOW));
                }
            })
        })
        .collect();

    for _ in 0..100 {
        let snapshot = aggregator.snapshot(10.0, NOW + 1.0).unwrap();
        assert_eq!(snapshot.per_protocol.values().sum::<u64>(), snapshot.total_packets);
        assert!(snapshot.top_sources.len() <= 5);
        assert!(snapshot
            .top_sources
            .windows(2)
            .all(|pair| pair[0].1 >= pair[1].1));
        assert!(snapshot.recent_sample.len() <= 10);
        publisher.publish_once(NOW + 1.0).unwrap();
    }

    for source in sources {
        source.join().unwrap();
    }

    let snapshot = aggregator.snapshot(10.0, NOW + 1.0).unwrap();
    assert_eq!(snapshot.total_packets, 6000);
    assert_eq!(snapshot.protocol_count(&ProtocolLabel::Tcp), 3000);
    assert_eq!(snapshot.protocol_count(&ProtocolLabel::Udp), 3000);
    assert_eq!(aggregator.history_len(), 1000);
}
