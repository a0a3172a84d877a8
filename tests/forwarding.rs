//! Integration tests for transparent clock forwarding.
//!
//! Exercises full message flows through the public API with the mock
//! transport: Sync/Follow_Up fan-out with racing completions, the
//! delay request-response exchange, and timer-driven aging.

use std::net::SocketAddr;
use std::time::Duration;

use ptp_tc::message::{self, FLAG_TWO_STEP, PortIdentity, PtpHeader, PtpMessageType};
use ptp_tc::testing::{self, MockLocalClock, MockTransport};
use ptp_tc::timestamp::{PtpTimestamp, TimeInterval};
use ptp_tc::{TcConfig, TcPort, TransparentClock, event_channel};

type Tc = TransparentClock<MockTransport, MockLocalClock>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn make_tc(num_ports: u16) -> Tc {
    init_tracing();
    let ports = (1..=num_ports).map(TcPort::new).collect();
    let config = TcConfig {
        max_outstanding_records: 8,
        ..TcConfig::default()
    };
    TransparentClock::new(config, ports, MockTransport::new(), MockLocalClock)
}

fn sender() -> SocketAddr {
    "192.0.2.7:319".parse().unwrap()
}

// ===== Two-step Sync relay with racing completions =====

#[test]
fn test_sync_relay_with_interleaved_completions() {
    let mut tc = make_tc(4);
    tc.ports_mut()[2].delay_asymmetry = TimeInterval::from_nanos(5);

    // one-step Sync in on port 1: the TC converts and synthesizes
    let source = PortIdentity::new(0xFEED, 1);
    let mut header = PtpHeader::new(PtpMessageType::Sync, source, 21);
    let origin = PtpTimestamp::new(500, 0);
    let mut buffer = testing::event_buffer(&header, &origin, 1_000);
    assert!(tc.forward_sync(&mut buffer, &mut header, sender(), 1));
    assert_eq!(tc.sync_outstanding(), 1);

    let sent = &tc.transport().events[0];
    assert_eq!(sent.port_mask, 0b1110);
    assert!(message::has_flag(
        &sent.frame[sent.header_len..].to_vec(),
        FLAG_TWO_STEP
    ));

    // completions arrive out of port order
    let ctx = sent.ts_done.unwrap();
    let ts_id = sent.ts_id;
    for (port, tx_time) in [(4u16, 1_090u64), (2, 1_040), (3, 1_055)] {
        tc.handle_tx_done(&ptp_tc::TxDone {
            context: ctx,
            port,
            ts_id,
            tx_time,
        });
    }
    assert_eq!(tc.sync_outstanding(), 0);

    // one synthesized Follow_Up per egress port, each with its own
    // residence time plus that port's asymmetry
    let generals = &tc.transport().generals;
    assert_eq!(generals.len(), 3);
    let corrections: Vec<(u64, i64)> = (0..3)
        .map(|i| {
            let header = PtpHeader::decode(tc.transport().general_payload(i)).unwrap();
            assert_eq!(header.message_type, PtpMessageType::FollowUp);
            assert_eq!(header.sequence_id, 21);
            assert_eq!(
                message::unpack_origin_timestamp(tc.transport().general_payload(i)),
                Some(origin)
            );
            (generals[i].port_mask, header.correction_field.nanos())
        })
        .collect();
    assert_eq!(corrections, vec![(0b1000, 90), (0b0010, 40), (0b0100, 60)]);
}

// ===== Delay request-response exchange =====

#[test]
fn test_delay_exchange_round_trip() {
    let mut tc = make_tc(2);
    tc.ports_mut()[1].delay_asymmetry = TimeInterval::from_nanos(2);

    let requester = PortIdentity::new(0xCAFE, 3);
    let mut req_header = PtpHeader::new(PtpMessageType::DelayReq, requester, 9);
    let mut req = testing::event_buffer(&req_header, &PtpTimestamp::ZERO, 10_000);
    assert!(tc.forward_delay_req(&mut req, &mut req_header, sender(), 1));

    let ctx = tc.transport().events[0].ts_done.unwrap();
    let ts_id = tc.transport().events[0].ts_id;
    tc.handle_tx_done(&ptp_tc::TxDone {
        context: ctx,
        port: 2,
        ts_id,
        tx_time: 10_030,
    });

    let resp_header = PtpHeader::new(PtpMessageType::DelayResp, PortIdentity::new(0xB055, 1), 9);
    let mut resp =
        testing::delay_resp_buffer(&resp_header, &PtpTimestamp::new(100, 0), &requester, 0);
    assert!(tc.forward_delay_resp(&mut resp, &resp_header, sender(), 2));
    assert_eq!(tc.delay_req_outstanding(), 0);

    let forwarded = tc.transport().events.last().unwrap();
    assert_eq!(forwarded.port_mask, 0b01);
    let header = PtpHeader::decode(&forwarded.frame[forwarded.header_len..]).unwrap();
    assert_eq!(header.correction_field, TimeInterval::from_nanos(28));
}

// ===== Timer-driven aging =====

#[tokio::test(start_paused = true)]
async fn test_enabled_timer_reclaims_stale_entries() {
    let mut tc = make_tc(2);
    let (events, mut rx) = event_channel(16);
    tc.enable(events);

    let source = PortIdentity::new(0xFEED, 1);
    let mut header = PtpHeader::new(PtpMessageType::Sync, source, 1);
    header.flags |= FLAG_TWO_STEP;
    let mut buffer = testing::event_buffer(&header, &PtpTimestamp::ZERO, 100);
    assert!(tc.forward_sync(&mut buffer, &mut header, sender(), 1));
    assert_eq!(tc.sync_outstanding(), 1);

    // the TX-done never arrives; the sweep reclaims the entry
    for _ in 0..3 {
        tokio::time::advance(Duration::from_millis(1_100)).await;
        let event = rx.recv().await.unwrap();
        tc.handle_event(event);
    }
    assert_eq!(tc.sync_outstanding(), 0);
    tc.disable();
}
