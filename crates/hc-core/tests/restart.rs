//! Service restart fallback across candidate names.

use std::sync::Arc;

use hc_common::{Error, OsFamily};
use hc_core::exec::mock::{Reply, ScriptedExecutor};
use hc_core::{Capability, HostSession, RestartStrategy};

fn session(exec: &Arc<ScriptedExecutor>) -> HostSession {
    HostSession::scripted(OsFamily::RedhatLike, exec.clone()).build()
}

#[test]
fn second_name_succeeds_after_first_fails() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("service chronyd restart", Reply::ok("Redirecting to /bin/systemctl restart chronyd.service"))
            .on("service chrony restart", Reply::fail(1, "Failed to restart chrony.service: Unit chrony.service not found.")),
    );
    let session = session(&exec);

    let result = RestartStrategy::for_service("chrony").restart(&session).unwrap();

    assert!(result.success());
    assert_eq!(
        exec.commands(),
        vec!["service chrony restart", "service chronyd restart"]
    );
}

#[test]
fn first_success_stops_the_chain() {
    let exec = Arc::new(ScriptedExecutor::new().on("service ntp restart", Reply::ok("")));
    let session = session(&exec);

    RestartStrategy::for_service("ntp").restart(&session).unwrap();

    assert_eq!(exec.count_matching("restart"), 1);
    assert!(!exec.executed("ntpd"));
}

#[test]
fn all_names_failing_reports_last_attempt() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("service chronyd restart", Reply::output(5, "", "chronyd: unrecognized service"))
            .on("service chrony restart", Reply::output(1, "", "chrony: unrecognized service")),
    );
    let session = session(&exec);

    let err = RestartStrategy::for_service("chrony").restart(&session).unwrap_err();

    match err {
        Error::ServiceRestartFailure {
            service,
            attempted,
            last,
        } => {
            assert_eq!(service, "chrony");
            assert_eq!(attempted, vec!["chrony", "chronyd"]);
            assert_eq!(last.exit_code, 5);
            assert_eq!(last.command, "service chronyd restart");
            assert!(last.stderr.contains("chronyd: unrecognized service"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(exec.count_matching("restart"), 2);
}

#[test]
fn restart_commands_are_elevated() {
    let exec = Arc::new(ScriptedExecutor::new().on("restart", Reply::ok("")));
    let session = session(&exec);

    RestartStrategy::with_candidates("sshd", ["sshd"]).restart(&session).unwrap();

    let recorded = exec.recorded();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].opts.elevate);
    assert!(recorded[0].opts.shell);
}

#[test]
fn restart_through_systemctl() {
    let exec = Arc::new(
        ScriptedExecutor::new()
            .on("ls -lt /run/systemd/system", Reply::ok("total 0"))
            .on("systemctl restart chronyd", Reply::ok("")),
    );
    let session = session(&exec);

    RestartStrategy::with_candidates("chrony", ["chronyd"])
        .via(Capability::UnitManager)
        .restart(&session)
        .unwrap();

    assert!(exec.executed("systemctl restart chronyd"));
    assert!(!exec.executed("service "));
}

#[test]
fn empty_candidate_list_is_config_error() {
    let exec = Arc::new(ScriptedExecutor::new());
    let session = session(&exec);

    let err = RestartStrategy::with_candidates("nothing", Vec::<String>::new())
        .restart(&session)
        .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert!(exec.commands().is_empty());
}

#[test]
fn non_manager_capability_is_variant_mismatch() {
    let exec = Arc::new(ScriptedExecutor::new());
    let session = session(&exec);

    let err = RestartStrategy::for_service("chrony")
        .via(Capability::Shell)
        .restart(&session)
        .unwrap_err();

    assert!(matches!(err, Error::VariantMismatch { .. }));
}
