use crate::event::{ConnectivityState, EventError, EventKind, Trigger};
use crate::stack::Transport;
use crate::tests::mock::{MockAtatClient, MockTimer, MockedCommand, RecordingSink, UrcChannel};
use crate::wifi::{Adapter, CommandError, JoinError, WifiAdapter};
use atat::Error as AtError;
use core::net::SocketAddr;
use core::str::FromStr;

type AdapterType<'a> = Adapter<'a, MockAtatClient<'a>, MockTimer, 1_000_000, 256, 16, 16, 4>;

#[test]
fn test_join_correct_command() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+WJAP=test_wifi,secret\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    let state = adapter.join("test_wifi", "secret").unwrap();

    assert_eq!(ConnectivityState::Associating, state);
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_join_station_up() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(
        Some(b"AT+WJAP=test_wifi,secret\r\n"),
        Some(&[b"+WEVENT:STATION_UP\r\n"]),
    ));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    let state = adapter.join("test_wifi", "secret").unwrap();

    assert_eq!(ConnectivityState::Associated, state);
}

#[test]
fn test_join_command_error() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::error(Some(b"AT+WJAP=test_wifi,secret\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&sink);

    let error = adapter.join("test_wifi", "secret").unwrap_err();
    assert_eq!(JoinError::ConnectError(AtError::Error), error);
    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());
    assert_eq!(0, sink.count());
}

#[test]
fn test_join_invalid_ssid_length() {
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    let error = adapter.join("0123456789012345678901234567890123", "secret").unwrap_err();

    assert_eq!(JoinError::InvalidSSDLength, error);
    assert!(adapter.client.get_commands_as_strings().is_empty());
}

#[test]
fn test_join_invalid_password_length() {
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    let password = "0123456789012345678901234567890123456789012345678901234567890123";
    let error = adapter.join("test_wifi", password).unwrap_err();

    assert_eq!(JoinError::InvalidPasswordLength, error);
    assert!(adapter.client.get_commands_as_strings().is_empty());
}

#[test]
fn test_join_notifies_sink() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(
        Some(b"AT+WJAP=test_wifi,secret\r\n"),
        Some(&[b"+WEVENT:STATION_UP\r\n"]),
    ));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&sink);
    adapter.join("test_wifi", "secret").unwrap();

    let changes = sink.changes.borrow();
    assert_eq!(2, changes.len());
    assert_eq!(Trigger::JoinAccepted, changes[0].trigger);
    assert_eq!(ConnectivityState::Associating, changes[0].current);
    assert_eq!(ConnectivityState::Associating, changes[1].previous);
    assert_eq!(ConnectivityState::Associated, changes[1].current);
}

#[test]
fn test_get_join_status_station_down() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(
        Some(b"AT+WJAP=test_wifi,secret\r\n"),
        Some(&[b"+WEVENT:STATION_UP\r\n"]),
    ));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.join("test_wifi", "secret").unwrap();
    assert_eq!(ConnectivityState::Associated, adapter.get_join_status());

    adapter.client.add_urc_station_down();
    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());

    adapter.client.add_urc_station_up();
    assert_eq!(ConnectivityState::Associated, adapter.get_join_status());
}

#[test]
fn test_unknown_wifi_event_ignored() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&sink);
    adapter.client.add_urc_message(b"+WEVENT:AP_UP\r\n");
    adapter.client.add_urc_message(b"+UNKNOWN\r\n");

    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());
    assert_eq!(0, sink.count());
}

#[test]
fn test_leave() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(
        Some(b"AT+WJAP=test_wifi,secret\r\n"),
        Some(&[b"+WEVENT:STATION_UP\r\n"]),
    ));
    client.add_response(MockedCommand::ok(Some(b"AT+WJAPQ\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.join("test_wifi", "secret").unwrap();
    adapter.attach(&sink);
    adapter.leave().unwrap();

    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());
    assert_eq!(Trigger::LeaveAccepted, sink.last().unwrap().trigger);
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_leave_error() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::error(Some(b"AT+WJAPQ\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    assert_eq!(CommandError::CommandFailed(AtError::Error), adapter.leave().unwrap_err());
}

#[test]
fn test_set_dhcp() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+DHCP=ON\r\n"), None));
    client.add_response(MockedCommand::ok(Some(b"AT+DHCP=OFF\r\n"), None));
    client.add_response(MockedCommand::error(Some(b"AT+DHCP=ON\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.set_dhcp(true).unwrap();
    adapter.set_dhcp(false).unwrap();
    assert_eq!(CommandError::CommandFailed(AtError::Error), adapter.set_dhcp(true).unwrap_err());
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_restart() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), Some(&[b"+WEVENT:REBOOT\r\n"])));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&sink);
    adapter.restart().unwrap();

    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());

    let changes = sink.changes.borrow();
    assert_eq!(2, changes.len());
    assert_eq!(ConnectivityState::Rebooting, changes[0].current);
    assert_eq!(Trigger::Rebooted, changes[1].trigger);
}

#[test]
fn test_restart_command_error() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::error(Some(b"AT+REBOOT\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    assert_eq!(CommandError::CommandFailed(AtError::Error), adapter.restart().unwrap_err());
    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());
}

#[test]
fn test_restart_ready_timeout() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::expiring(5_000));
    assert_eq!(CommandError::ReadyTimeout, adapter.restart().unwrap_err());
    assert_eq!(ConnectivityState::Disassociated, adapter.get_join_status());
}

#[test]
fn test_join_after_restart_ready_timeout() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), None));
    client.add_response(MockedCommand::ok(
        Some(b"AT+WJAP=test_wifi,secret\r\n"),
        Some(&[b"+WEVENT:STATION_UP\r\n"]),
    ));
    client.add_response(MockedCommand::ok(
        Some(b"AT+CIPSTART=0,tcp_client,127.0.0.1,5000\r\n"),
        None,
    ));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::expiring(5_000));
    assert_eq!(CommandError::ReadyTimeout, adapter.restart().unwrap_err());
    assert_eq!(ConnectivityState::Associated, adapter.join("test_wifi", "secret").unwrap());

    let mut socket = adapter.socket().unwrap();
    let remote = SocketAddr::from_str("127.0.0.1:5000").unwrap();
    adapter.connect(&mut socket, Transport::Tcp, remote).unwrap();

    assert!(adapter.is_writable(&socket));
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_restart_ignores_previous_reboot() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::expiring(5_000));

    // Reboot reported before the restart was requested
    adapter.client.add_urc_reboot();
    assert_eq!(CommandError::ReadyTimeout, adapter.restart().unwrap_err());
}

#[test]
fn test_restart_resets_sockets() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), Some(&[b"+WEVENT:REBOOT\r\n"])));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.socket().unwrap();
    adapter.socket().unwrap();
    adapter.client.add_urc_message(b"+CIPEVENT:SOCKET,0,3,abc");

    adapter.restart().unwrap();

    let socket = adapter.socket().unwrap();
    assert_eq!(0, socket.link_id());
    assert!(!adapter.is_readable(&socket));
}

#[test]
fn test_factory_reset() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+FACTORY\r\n"), Some(&[b"+WEVENT:REBOOT\r\n"])));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.reset().unwrap();
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_startup() {
    let channel = UrcChannel::new();
    let mut client = MockAtatClient::new(&channel);
    client.add_response(MockedCommand::ok(Some(b"AT+REBOOT\r\n"), Some(&[b"+WEVENT:REBOOT\r\n"])));
    client.add_response(MockedCommand::ok(Some(b"AT+DHCP=ON\r\n"), None));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.startup().unwrap();
    adapter.client.assert_all_cmds_sent();
}

#[test]
fn test_handle_event_pending() {
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.client.add_urc_station_up();

    let text = adapter.handle_event(EventKind::StationUp, 1_000).unwrap();
    assert_eq!("STATION_UP", text.as_str());
}

#[test]
fn test_handle_event_already_observed() {
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::expiring(1_000));
    adapter.client.add_urc_station_up();
    assert_eq!(ConnectivityState::Associated, adapter.get_join_status());

    assert_eq!(
        EventError::Timeout,
        adapter.handle_event(EventKind::StationUp, 1_000).unwrap_err()
    );
}

#[test]
fn test_handle_event_other_kind() {
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::expiring(500));
    adapter.client.add_urc_station_down();

    assert_eq!(EventError::Timeout, adapter.handle_event(EventKind::Reboot, 500).unwrap_err());
}

#[test]
fn test_handle_event_timer_error() {
    let mut timer = MockTimer::new();
    timer.expect_start().times(1).returning(|_| Err(1));

    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), timer);
    assert_eq!(
        EventError::TimerError,
        adapter.handle_event(EventKind::Reboot, 500).unwrap_err()
    );
}

#[test]
fn test_reboot_notified_once() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut timer = MockTimer::new();
    timer.expect_start().times(1).returning(|_| Ok(()));
    timer.expect_wait().times(1).returning(|| Ok(()));

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), timer);
    adapter.attach(&sink);
    adapter.client.add_urc_reboot();

    adapter.handle_event(EventKind::Reboot, 1_000).unwrap();
    adapter.get_join_status();
    assert_eq!(
        EventError::Timeout,
        adapter.handle_event(EventKind::Reboot, 1_000).unwrap_err()
    );
    adapter.get_join_status();

    assert_eq!(1, sink.count());
    assert_eq!(Trigger::Rebooted, sink.last().unwrap().trigger);
}

#[test]
fn test_detach() {
    let sink = RecordingSink::default();
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&sink);
    adapter.client.add_urc_station_up();
    adapter.get_join_status();

    adapter.detach();
    adapter.client.add_urc_station_down();
    adapter.get_join_status();

    assert_eq!(1, sink.count());
}

#[test]
fn test_attach_replaces_sink() {
    let first = RecordingSink::default();
    let second = RecordingSink::default();
    let channel = UrcChannel::new();
    let client = MockAtatClient::new(&channel);

    let mut adapter: AdapterType = Adapter::new(client, channel.subscriber().unwrap(), MockTimer::new());
    adapter.attach(&first);
    adapter.attach(&second);
    adapter.client.add_urc_station_up();
    adapter.get_join_status();

    assert_eq!(0, first.count());
    assert_eq!(1, second.count());
}
