//! Parsers for captured tool output.

use hc_common::Error;
use hc_core::tools::chrony::{has_no_sources, leap_status_normal};
use hc_core::tools::ethtool::{parse_channels, parse_features, parse_link_settings, parse_ring_buffer};
use hc_core::tools::ntp::{has_no_associations, leap_code_none};
use hc_core::tools::ntpstat::is_synchronised;
use proptest::prelude::*;

/// `ethtool -g` from ethtool 6.x on a netvsc device, with the extra fields
/// newer releases print after the ring sizes.
const NETVSC_RINGS: &str = "Ring parameters for eth0:
Pre-set maximums:
RX:\t\t\t18811
RX Mini:\t\tn/a
RX Jumbo:\t\tn/a
TX:\t\t\t2560
Current hardware settings:
RX:\t\t\t9709
RX Mini:\t\tn/a
RX Jumbo:\t\tn/a
TX:\t\t\t170
RX Buf Len:\t\tn/a
CQE Size:\t\tn/a
TX Push:\t\toff
TCP data split:\t\tn/a
";

const MLX_CHANNELS: &str = "Channel parameters for enP1s1:
Pre-set maximums:
RX:\t\tn/a
TX:\t\tn/a
Other:\t\t0
Combined:\t8
Current hardware settings:
RX:\t\tn/a
TX:\t\tn/a
Other:\t\t0
Combined:\t8
";

#[test]
fn netvsc_ring_parameters() {
    let parsed = parse_ring_buffer("eth0", NETVSC_RINGS).unwrap();
    assert_eq!(parsed.current_rx().unwrap(), 9709);
    assert_eq!(parsed.current_tx().unwrap(), 170);
    assert_eq!(parsed.max_value("TX").unwrap(), 2560);
    assert_eq!(parsed.current["TX Push"], "off");
    assert!(!parsed.max.contains_key("TX Push"));
}

#[test]
fn non_numeric_ring_value_is_parse_error() {
    let parsed = parse_ring_buffer("eth0", NETVSC_RINGS).unwrap();
    match parsed.current_value("RX Mini") {
        Err(Error::Parse { what, message }) => {
            assert_eq!(what, "eth0 ring buffer settings");
            assert!(message.contains("n/a"));
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(parsed.current_value("RX Huge"), Err(Error::Parse { .. })));
}

#[test]
fn accelerated_networking_channels() {
    let parsed = parse_channels("enP1s1", MLX_CHANNELS).unwrap();
    assert_eq!(parsed.device, "enP1s1");
    assert_eq!(parsed.current_channels, 8);
    assert_eq!(parsed.max_channels, 8);
}

#[test]
fn features_keep_order_and_skip_fixed_off() {
    let raw = "Features for eth0:
rx-checksumming: on
tx-checksumming: on
\ttx-checksum-ipv4: off [fixed]
\ttx-checksum-ip-generic: on
generic-receive-offload: on
large-receive-offload: off [fixed]
rx-vlan-offload: on [fixed]
hsr-dup-offload: off [fixed]
";
    let parsed = parse_features("eth0", raw).unwrap();
    assert_eq!(
        parsed.enabled_features,
        vec![
            "rx-checksumming",
            "tx-checksumming",
            "tx-checksum-ip-generic",
            "generic-receive-offload",
            "rx-vlan-offload",
        ]
    );
}

#[test]
fn features_need_header() {
    assert!(matches!(
        parse_features("eth0", "rx-checksumming: on\n"),
        Err(Error::Parse { .. })
    ));
}

#[test]
fn link_settings_of_synthetic_nic() {
    let raw = "Settings for eth0:
\tSupported ports: [  ]
\tSupported link modes:   Not reported
\tSupported pause frame use: No
\tSupports auto-negotiation: No
\tSupported FEC modes: Not reported
\tAdvertised link modes:  Not reported
\tSpeed: 100000Mb/s
\tDuplex: Full
\tAuto-negotiation: off
\tPort: Other
\tPHYAD: 0
\tTransceiver: internal
\tLink detected: yes
";
    let parsed = parse_link_settings("eth0", raw).unwrap();
    assert_eq!(parsed.settings["Speed"], "100000Mb/s");
    assert_eq!(parsed.settings["Transceiver"], "internal");
    assert_eq!(parsed.settings.len(), 13);
}

#[test]
fn time_sync_markers() {
    assert!(leap_status_normal("Leap status     : Normal\nSystem time : 0.000001 seconds\n"));
    assert!(!leap_status_normal("Leap status     : Insert second\n"));
    assert!(has_no_sources("210 Number of sources = 0"));
    assert!(has_no_associations("No association ID's returned"));
    assert!(leap_code_none("status=0615 leap_none, sync_ntp"));
    assert!(!is_synchronised("unsynchronised\n  polling server every 8 s"));
}

proptest! {
    #[test]
    fn ring_values_survive_any_alignment(
        rx in 0u32..100_000,
        tx in 0u32..100_000,
        pad in prop::collection::vec(prop::sample::select(vec![" ", "\t"]), 1..6),
    ) {
        let gap = pad.concat();
        let raw = format!(
            "Ring parameters for eth0:\nPre-set maximums:\nRX:{gap}100000\nTX:{gap}100000\n\
             Current hardware settings:\nRX:{gap}{rx}\nTX:{gap}{tx}\n"
        );
        let parsed = parse_ring_buffer("eth0", &raw).unwrap();
        prop_assert_eq!(parsed.current_rx().unwrap(), rx);
        prop_assert_eq!(parsed.current_tx().unwrap(), tx);
        prop_assert_eq!(parsed.max_value("RX").unwrap(), 100_000);
    }

    #[test]
    fn parsers_never_panic(raw in ".{0,400}") {
        let _ = parse_ring_buffer("eth0", &raw);
        let _ = parse_channels("eth0", &raw);
        let _ = parse_features("eth0", &raw);
        let _ = parse_link_settings("eth0", &raw);
    }
}
