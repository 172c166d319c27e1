use crate::event::{ConnectivityState, EventKind, EventLog, StateChange, Trigger};
use crate::tests::mock::RecordingSink;

#[test]
fn test_transition_join_flow() {
    let state = ConnectivityState::default();
    assert_eq!(ConnectivityState::Disassociated, state);

    let state = state.transition(Trigger::JoinAccepted);
    assert_eq!(ConnectivityState::Associating, state);

    let state = state.transition(Trigger::StationUp);
    assert_eq!(ConnectivityState::Associated, state);

    let state = state.transition(Trigger::StationDown);
    assert_eq!(ConnectivityState::Disassociated, state);
}

#[test]
fn test_transition_join_rejected() {
    assert_eq!(
        ConnectivityState::Disassociated,
        ConnectivityState::Associating.transition(Trigger::JoinRejected)
    );
    assert_eq!(
        ConnectivityState::Associated,
        ConnectivityState::Associated.transition(Trigger::JoinRejected)
    );
    assert_eq!(
        ConnectivityState::Disassociated,
        ConnectivityState::Disassociated.transition(Trigger::JoinRejected)
    );
}

#[test]
fn test_transition_join_while_associated() {
    assert_eq!(
        ConnectivityState::Associated,
        ConnectivityState::Associated.transition(Trigger::JoinAccepted)
    );
}

#[test]
fn test_transition_leave() {
    assert_eq!(
        ConnectivityState::Disassociated,
        ConnectivityState::Associated.transition(Trigger::LeaveAccepted)
    );
    assert_eq!(
        ConnectivityState::Disassociated,
        ConnectivityState::Associating.transition(Trigger::LeaveAccepted)
    );
}

#[test]
fn test_transition_rebooting() {
    let state = ConnectivityState::Associated.transition(Trigger::RestartRequested);
    assert_eq!(ConnectivityState::Rebooting, state);

    // Station events of the previous session are ignored until the reboot is confirmed
    assert_eq!(ConnectivityState::Rebooting, state.transition(Trigger::StationUp));
    assert_eq!(ConnectivityState::Rebooting, state.transition(Trigger::JoinAccepted));

    assert_eq!(ConnectivityState::Disassociated, state.transition(Trigger::Rebooted));
    assert_eq!(
        ConnectivityState::Disassociated,
        ConnectivityState::Associated.transition(Trigger::Rebooted)
    );
}

#[test]
fn test_transition_restart_failed() {
    let state = ConnectivityState::Associated.transition(Trigger::RestartRequested);
    let state = state.transition(Trigger::RestartFailed);
    assert_eq!(ConnectivityState::Disassociated, state);

    let state = state.transition(Trigger::JoinAccepted);
    assert_eq!(ConnectivityState::Associating, state);
    assert_eq!(ConnectivityState::Associated, state.transition(Trigger::StationUp));
}

#[test]
fn test_event_kind_from_text() {
    assert_eq!(Some(EventKind::StationUp), EventKind::from_text("STATION_UP"));
    assert_eq!(Some(EventKind::StationDown), EventKind::from_text("STATION_DOWN"));
    assert_eq!(Some(EventKind::Reboot), EventKind::from_text("REBOOT"));
    assert_eq!(None, EventKind::from_text("reboot"));
    assert_eq!(None, EventKind::from_text(""));
}

#[test]
fn test_log_apply_notifies_changes_only() {
    let sink = RecordingSink::default();
    let mut log = EventLog::default();

    log.apply(Trigger::JoinAccepted, Some(&sink));
    log.apply(Trigger::JoinRejected, Some(&sink));
    log.apply(Trigger::JoinRejected, Some(&sink));

    assert_eq!(2, sink.count());
    assert_eq!(
        Some(StateChange {
            previous: ConnectivityState::Associating,
            current: ConnectivityState::Disassociated,
            trigger: Trigger::JoinRejected,
        }),
        sink.last()
    );
}

#[test]
fn test_log_apply_without_sink() {
    let mut log = EventLog::default();
    log.apply(Trigger::JoinAccepted, None);
    assert_eq!(ConnectivityState::Associating, log.state);
}

#[test]
fn test_log_reboot_always_notified() {
    let sink = RecordingSink::default();
    let mut log = EventLog::default();

    log.dispatch(EventKind::Reboot, "REBOOT", Some(&sink));
    log.dispatch(EventKind::Reboot, "REBOOT", Some(&sink));

    assert_eq!(2, sink.count());
    assert_eq!(Trigger::Rebooted, sink.last().unwrap().trigger);
}

#[test]
fn test_log_dispatch_records_event() {
    let mut log = EventLog::default();
    assert_eq!(0, log.sequence(EventKind::StationUp));

    log.dispatch(EventKind::StationUp, "STATION_UP", None);
    assert_eq!(1, log.sequence(EventKind::StationUp));
    assert_eq!(0, log.sequence(EventKind::StationDown));
    assert_eq!("STATION_UP", log.text(EventKind::StationUp).as_str());
    assert_eq!(ConnectivityState::Associated, log.state);
}
