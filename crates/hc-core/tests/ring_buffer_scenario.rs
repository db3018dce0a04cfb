//! Ring buffer change check and device inspection against a scripted host.

use std::sync::Arc;

use hc_common::{Error, OsFamily};
use hc_core::exec::mock::{Reply, ScriptedExecutor};
use hc_core::scenarios::validate_ring_buffer_change;
use hc_core::tools::Ethtool;
use hc_core::HostSession;

const NETDIR: &str = "/sys/devices/LNXSYSTM:00/LNXSYBUS:00/ACPI0004:00/VMBUS:00/000d3a1b-0000/net";

fn rings(device: &str, rx: u32, tx: u32) -> String {
    format!(
        "Ring parameters for {device}:\n\
         Pre-set maximums:\n\
         RX:\t\t18811\n\
         RX Mini:\t0\n\
         RX Jumbo:\t0\n\
         TX:\t\t2560\n\
         Current hardware settings:\n\
         RX:\t\t{rx}\n\
         RX Mini:\t0\n\
         RX Jumbo:\t0\n\
         TX:\t\t{tx}\n"
    )
}

fn vm_host() -> ScriptedExecutor {
    ScriptedExecutor::new()
        .on("command -v", Reply::ok("/usr/sbin/ethtool"))
        .on("find /sys/devices", Reply::ok(format!("{}\n", NETDIR)))
        .on("ls /sys/devices", Reply::ok("eth0\n"))
}

#[test]
fn ring_sizes_are_changed_and_restored() {
    let exec = Arc::new(
        vm_host()
            .on("ethtool -G eth0", Reply::ok(""))
            .on_sequence(
                "ethtool -g eth0",
                vec![
                    Reply::ok(rings("eth0", 9709, 170)),
                    Reply::ok(rings("eth0", 10011, 190)),
                    Reply::ok(rings("eth0", 9709, 170)),
                ],
            ),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    let changes = validate_ring_buffer_change(&session, 10011, 190).unwrap();

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.device, "eth0");
    assert_eq!((change.original_rx, change.original_tx), (9709, 170));
    assert_eq!((change.modified_rx, change.modified_tx), (10011, 190));

    let setters: Vec<String> = exec
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("ethtool -G"))
        .collect();
    assert_eq!(
        setters,
        vec!["ethtool -G eth0 rx 10011 tx 190", "ethtool -G eth0 rx 9709 tx 170"]
    );
    assert_eq!(exec.count_matching("ethtool -g eth0"), 3);
}

#[test]
fn setters_are_elevated_and_reads_are_not() {
    let exec = Arc::new(
        vm_host()
            .on("ethtool -G eth0", Reply::ok(""))
            .on_sequence(
                "ethtool -g eth0",
                vec![
                    Reply::ok(rings("eth0", 9709, 170)),
                    Reply::ok(rings("eth0", 10011, 190)),
                    Reply::ok(rings("eth0", 9709, 170)),
                ],
            ),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    validate_ring_buffer_change(&session, 10011, 190).unwrap();

    for recorded in exec.recorded() {
        if recorded.command.starts_with("ethtool -G") {
            assert!(recorded.opts.elevate);
        } else if recorded.command.starts_with("ethtool -g") {
            assert!(!recorded.opts.elevate);
        }
    }
}

#[test]
fn driver_ignoring_new_size_is_verification_error() {
    let exec = Arc::new(
        vm_host()
            .on("ethtool -G eth0", Reply::ok(""))
            .on("ethtool -g eth0", Reply::ok(rings("eth0", 9709, 170))),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    let err = validate_ring_buffer_change(&session, 10011, 190).unwrap_err();

    match err {
        Error::Verification {
            what,
            expected,
            actual,
        } => {
            assert!(what.contains("eth0 RX"));
            assert_eq!(expected, "10011");
            assert_eq!(actual, "9709");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(exec.count_matching("ethtool -G"), 1);
}

#[test]
fn unsupported_driver_is_reported() {
    let exec = Arc::new(vm_host().on(
        "ethtool -g eth0",
        Reply::output(95, "Ring parameters for eth0:\n", "Cannot get device ring settings: Operation not supported"),
    ));
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    let err = validate_ring_buffer_change(&session, 10011, 190).unwrap_err();

    match err {
        Error::Unsupported { operation, result } => {
            assert_eq!(operation, "ethtool -g eth0");
            assert_eq!(result.exit_code, 95);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!exec.executed("ethtool -G"));
}

#[test]
fn no_synthetic_devices_is_not_found() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("command -v", Reply::ok("/usr/sbin/ethtool"))
            .on("find /sys/devices", Reply::ok("")),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    let err = validate_ring_buffer_change(&session, 10011, 190).unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }));
    assert!(!exec.executed("ethtool -g"));
}

#[test]
fn every_device_is_checked() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("command -v", Reply::ok("/usr/sbin/ethtool"))
            .on("find /sys/devices", Reply::ok(format!("{}\n", NETDIR)))
            .on("ls /sys/devices", Reply::ok("eth1\neth0\n"))
            .on("ethtool -G", Reply::ok(""))
            .on_sequence(
                "ethtool -g eth0",
                vec![
                    Reply::ok(rings("eth0", 1024, 256)),
                    Reply::ok(rings("eth0", 2048, 512)),
                    Reply::ok(rings("eth0", 1024, 256)),
                ],
            )
            .on_sequence(
                "ethtool -g eth1",
                vec![
                    Reply::ok(rings("eth1", 4096, 1024)),
                    Reply::ok(rings("eth1", 2048, 512)),
                    Reply::ok(rings("eth1", 4096, 1024)),
                ],
            ),
    );
    let session = HostSession::scripted(OsFamily::Other, exec).build();

    let changes = validate_ring_buffer_change(&session, 2048, 512).unwrap();

    let devices: Vec<&str> = changes.iter().map(|c| c.device.as_str()).collect();
    assert_eq!(devices, vec!["eth0", "eth1"]);
    assert_eq!(changes[1].original_rx, 4096);
}

#[test]
fn device_list_is_cached_until_forced() {
    let exec = Arc::new(vm_host());
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();
    let ethtool = session.tool::<Ethtool>().unwrap();

    assert_eq!(ethtool.get_device_list(&session, false).unwrap(), vec!["eth0"]);
    assert_eq!(ethtool.get_device_list(&session, false).unwrap(), vec!["eth0"]);
    assert_eq!(exec.count_matching("find /sys/devices"), 1);

    ethtool.get_device_list(&session, true).unwrap();
    assert_eq!(exec.count_matching("find /sys/devices"), 2);
}

#[test]
fn channel_change_rereads_device() {
    let channels = |current: u32| {
        format!(
            "Channel parameters for eth0:\nPre-set maximums:\nRX:\t\t0\nTX:\t\t0\nOther:\t\t0\nCombined:\t8\n\
             Current hardware settings:\nRX:\t\t0\nTX:\t\t0\nOther:\t\t0\nCombined:\t{}\n",
            current
        )
    };
    let exec = Arc::new(
        vm_host()
            .on("ethtool -L eth0 combined 2", Reply::ok(""))
            .on_sequence("ethtool -l eth0", vec![Reply::ok(channels(4)), Reply::ok(channels(2))]),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();
    let ethtool = session.tool::<Ethtool>().unwrap();

    let before = ethtool.get_device_channels_info(&session, "eth0", false).unwrap();
    let cached = ethtool.get_device_channels_info(&session, "eth0", false).unwrap();
    let after = ethtool.change_device_channels_info(&session, "eth0", 2).unwrap();

    assert_eq!(before.current_channels, 4);
    assert_eq!(cached, before);
    assert_eq!(after.current_channels, 2);
    assert_eq!(after.max_channels, 8);
    assert_eq!(exec.count_matching("ethtool -l eth0"), 2);
}

#[test]
fn all_features_and_link_settings() {
    let exec = Arc::new(
        vm_host()
            .on(
                "ethtool -k eth0",
                Reply::ok("Features for eth0:\nrx-checksumming: on\nlarge-receive-offload: off [fixed]\n"),
            )
            .on(
                "ethtool eth0",
                Reply::ok("Settings for eth0:\n\tSpeed: 50000Mb/s\n\tDuplex: Full\n\tLink detected: yes\n"),
            ),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();
    let ethtool = session.tool::<Ethtool>().unwrap();

    let features = ethtool.get_all_device_enabled_features(&session).unwrap();
    assert_eq!(features[0].enabled_features, vec!["rx-checksumming"]);

    let links = ethtool.get_all_device_link_settings(&session).unwrap();
    assert_eq!(links[0].settings["Link detected"], "yes");
}

#[test]
fn unreadable_net_directory_is_reported() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("command -v", Reply::ok("/usr/sbin/ethtool"))
            .on("find /sys/devices", Reply::ok(format!("{}\n", NETDIR)))
            .on("ls /sys/devices", Reply::fail(2, "ls: cannot access: No such file or directory")),
    );
    let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();

    let err = validate_ring_buffer_change(&session, 10011, 190).unwrap_err();

    match err {
        Error::CommandFailed { message, result } => {
            assert!(message.contains(NETDIR));
            assert_eq!(result.exit_code, 2);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!exec.executed("ethtool -g"));
}
