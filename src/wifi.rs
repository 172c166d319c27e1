//! # WIFI access point client
//!
//! Joining a network, waiting for network events and obtaining address information is supported.
//!
//! ## Example
//!
//! ````
//! # use mxchip_at_nal::event::ConnectivityState;
//! # use mxchip_at_nal::example::{ExampleAtClient as AtClient, ExampleTimer};
//! # use mxchip_at_nal::wifi::{Adapter, WifiAdapter};
//! #
//! let channel = AtClient::urc_channel();
//! let client = AtClient::init(&channel);
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 128, 8, 4> =
//!     Adapter::new(client, channel.subscriber().unwrap(), ExampleTimer::default());
//!
//! // Joining the WIFI access point
//! let state = adapter.join("test_wifi", "secret").unwrap();
//! assert_eq!(ConnectivityState::Associated, state);
//!
//! let address = adapter.get_address().unwrap();
//! assert_eq!("10:fe:ed:05:ba:50", address.mac.unwrap().as_str());
//! assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
//! assert_eq!(-52, adapter.get_rssi().unwrap());
//! ````
use crate::commands::{
    CommandErrorHandler, DhcpCommand, FactoryResetCommand, IpConfigCommand, JoinCommand, LeaveCommand,
    LinkStatusCommand, MacAddressCommand, RebootCommand,
};
use crate::event::{ConnectivityState, EventError, EventKind, EventLog, EventSink, Trigger, EVENT_TEXT_LEN};
use crate::packet::{Packet, PacketQueue, QueueLimits, MAX_SOCKETS};
use crate::responses::{IpConfigResponse, LinkStatusResponse, MacAddressResponse};
use crate::stack::ConnectionState;
use crate::urc::URCMessages;
use atat::blocking::AtatClient;
use atat::{AtatCmd, Error as AtError, UrcSubscription};
use core::fmt::Debug;
use core::net::Ipv4Addr;
use core::str::FromStr;
use fugit::{ExtU32, TimerDurationU32};
use fugit_timer::Timer;
use heapless::{String, Vec};
use log::{debug, trace, warn};

/// Time the module takes at most for rebooting
pub(crate) const RESTART_TIMEOUT_MS: u32 = 5_000;

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Errors for configuration commands
    type ConfigurationErrors: Debug;

    /// Errors when restarting the module
    type RestartError: Debug;

    /// Connects to an WIFI access point and returns the connectivity state
    fn join(&mut self, ssid: &str, key: &str) -> Result<ConnectivityState, Self::JoinError>;

    /// Disconnects from the current access point
    fn leave(&mut self) -> Result<(), Self::ConfigurationErrors>;

    /// Returns the current connectivity state
    fn get_join_status(&mut self) -> ConnectivityState;

    /// Returns local address information
    fn get_address(&mut self) -> Result<LocalAddress, Self::AddressError>;

    /// Enables/Disables the DHCP client
    fn set_dhcp(&mut self, enabled: bool) -> Result<(), Self::ConfigurationErrors>;

    /// Restarts the module and blocks until ready
    fn restart(&mut self) -> Result<(), Self::RestartError>;

    /// Blocks until the given event is reported by the module and returns the event text.
    /// Events already observed before this call are not taken into account.
    fn handle_event(&mut self, kind: EventKind, timeout_ms: u32) -> Result<String<EVENT_TEXT_LEN>, EventError>;
}

/// Central client for network communication
///
/// TX_SIZE: Chunk size in bytes when sending data. Max. value: 1024
///
/// RX_SIZE: Max. size of a single received data message
///
/// URC_CAPACITY: Capacity of the URC channel
///
/// QUEUE_DEPTH: Max. number of received but not yet read data messages of all sockets
pub struct Adapter<
    'a,
    A: AtatClient,
    T: Timer<TIMER_HZ>,
    const TIMER_HZ: u32,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
    const URC_CAPACITY: usize,
    const QUEUE_DEPTH: usize,
> {
    /// ATAT client
    pub(crate) client: A,

    /// URC message subscriber
    pub(crate) urc_subscription: UrcSubscription<'a, URCMessages<RX_SIZE>, URC_CAPACITY, 1>,

    /// Timer used for timeout measurement
    pub(crate) timer: T,

    /// Max. time for waiting on received data
    pub(crate) timeout: TimerDurationU32<TIMER_HZ>,

    /// Network state
    pub(crate) session: Session<RX_SIZE, QUEUE_DEPTH>,

    /// Receiver of state changes
    pub(crate) sink: Option<&'a dyn EventSink>,
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
pub enum JoinError {
    /// Error while setting WIFI credentials
    ConnectError(AtError),

    /// Given SSD is longer then the max. size of 32 chars
    InvalidSSDLength,

    /// Given password is longer then the max. size of 63 chars
    InvalidPasswordLength,
}

/// Errors when receiving local address information
#[derive(Clone, Debug, PartialEq)]
pub enum AddressErrors {
    /// Query command failed or response could not be parsed
    CommandError(AtError),

    /// Response contained an invalid IPv4 address
    AddressParseError,

    /// Response contained an invalid MAC address
    MacParseError,
}

/// Errors of configuration commands
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// Command was not accepted
    CommandFailed(AtError),

    /// Module did not report the reboot in time
    ReadyTimeout,

    /// Upstream timer error
    TimerError,
}

/// Local addresses of the station interface
#[derive(Default, Clone, Debug, PartialEq)]
pub struct LocalAddress {
    /// Local IPv4 address if assigned
    pub ipv4: Option<Ipv4Addr>,

    /// True if the address got assigned by a DHCP server
    pub dhcp: bool,

    /// Subnet mask if assigned
    pub netmask: Option<Ipv4Addr>,

    /// Default gateway if assigned
    pub gateway: Option<Ipv4Addr>,

    /// DNS server if assigned
    pub dns: Option<Ipv4Addr>,

    /// Local MAC address
    pub mac: Option<String<17>>,

    /// Signal strength of the last link query
    pub rssi: Option<i8>,

    /// WiFi channel of the last link query
    pub channel: Option<u8>,
}

impl LocalAddress {
    /// Takes over the result of an IPCONFIG query. Keeps the previous values if any address is invalid.
    pub(crate) fn update_ip_config(&mut self, response: &IpConfigResponse) -> Result<(), AddressErrors> {
        let ipv4 = Self::parse_ipv4(response.address.as_slice())?;
        let netmask = Self::parse_ipv4(response.netmask.as_slice())?;
        let gateway = Self::parse_ipv4(response.gateway.as_slice())?;
        let dns = Self::parse_ipv4(response.dns.as_slice())?;

        self.ipv4 = ipv4;
        self.netmask = netmask;
        self.gateway = gateway;
        self.dns = dns;
        self.dhcp = response.mode.as_slice() == b"DHCP";
        Ok(())
    }

    /// Takes over the result of a WMAC query
    pub(crate) fn update_mac(&mut self, response: &MacAddressResponse) -> Result<String<17>, AddressErrors> {
        let mac = core::str::from_utf8(response.mac.as_slice()).map_err(|_| AddressErrors::MacParseError)?;
        let mac = String::from_str(mac).map_err(|_| AddressErrors::MacParseError)?;

        self.mac = Some(mac.clone());
        Ok(mac)
    }

    /// Takes over the result of a WLINK query
    pub(crate) fn update_link_status(&mut self, response: &LinkStatusResponse) -> i8 {
        self.rssi = Some(response.rssi);
        self.channel = Some(response.channel);
        response.rssi
    }

    /// Unspecified address `0.0.0.0` is mapped to None
    fn parse_ipv4(address: &[u8]) -> Result<Option<Ipv4Addr>, AddressErrors> {
        let address = core::str::from_utf8(address).map_err(|_| AddressErrors::AddressParseError)?;
        let address = Ipv4Addr::from_str(address).map_err(|_| AddressErrors::AddressParseError)?;

        Ok(Some(address).filter(|address| !address.is_unspecified()))
    }
}

/// Network state shared by blocking and async adapters
#[derive(Default)]
pub(crate) struct Session<const RX_SIZE: usize, const QUEUE_DEPTH: usize> {
    /// Connectivity state and observed WiFi events
    pub(crate) events: EventLog,

    /// Current socket states, array index = link_id
    pub(crate) sockets: [ConnectionState; MAX_SOCKETS],

    /// Received socket data of all sockets
    pub(crate) packets: PacketQueue<RX_SIZE, QUEUE_DEPTH>,

    /// Number of received data messages which got dropped
    pub(crate) dropped_packets: usize,

    /// Last queried local addresses
    pub(crate) local_address: LocalAddress,
}

impl<const RX_SIZE: usize, const QUEUE_DEPTH: usize> Session<RX_SIZE, QUEUE_DEPTH> {
    /// Handles a single URC message
    pub(crate) fn handle_urc(&mut self, message: URCMessages<RX_SIZE>, sink: Option<&dyn EventSink>) {
        match message {
            URCMessages::Data { link_id, data } => self.receive_data(link_id, data),
            URCMessages::DataOverflow { link_id, length } => {
                warn!("Dropped {} bytes of link {}, exceeding RX_SIZE", length, link_id);
                self.dropped_packets += 1;
            }
            URCMessages::SocketClosed(link_id) => {
                if link_id < MAX_SOCKETS && self.sockets[link_id] == ConnectionState::Connected {
                    debug!("Link {} closed by remote", link_id);
                    self.sockets[link_id] = ConnectionState::Closing;
                }
            }
            URCMessages::WifiEvent(text) => match EventKind::from_text(text.as_str()) {
                Some(EventKind::Reboot) => {
                    self.reset_links();
                    self.events.dispatch(EventKind::Reboot, text.as_str(), sink);
                }
                Some(kind) => self.events.dispatch(kind, text.as_str(), sink),
                None => trace!("Ignored WiFi event {}", text.as_str()),
            },
            URCMessages::Unknown => {}
        }
    }

    /// Appends received socket data to the packet queue
    fn receive_data(&mut self, link_id: usize, data: Vec<u8, RX_SIZE>) {
        if link_id >= MAX_SOCKETS {
            warn!("Dropped {} bytes of invalid link {}", data.len(), link_id);
            self.dropped_packets += 1;
            return;
        }

        if data.is_empty() {
            trace!("Ignored empty data message of link {}", link_id);
            return;
        }

        trace!("Received {} bytes on link {}", data.len(), link_id);
        if let Err(overflow) = self.packets.enqueue(Packet::new(link_id, data)) {
            warn!(
                "Packet queue overflow, dropped {} bytes of link {}",
                overflow.length, overflow.link_id
            );
            self.dropped_packets += 1;
        }
    }

    /// Connections are lost after the module rebooted. Buffered data gets dropped.
    fn reset_links(&mut self) {
        for state in self.sockets.iter_mut() {
            if *state == ConnectionState::Connected {
                *state = ConnectionState::Closing;
            }
        }

        self.packets.clear();
    }

    /// Resets all socket states, e.g. on restart requested by application
    pub(crate) fn reset_sockets(&mut self) {
        self.sockets = [ConnectionState::Closed; MAX_SOCKETS];
        self.packets.clear();
    }
}

impl<
        'a,
        A: AtatClient,
        T: Timer<TIMER_HZ>,
        const TIMER_HZ: u32,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > WifiAdapter for Adapter<'a, A, T, TIMER_HZ, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type JoinError = JoinError;
    type AddressError = AddressErrors;
    type ConfigurationErrors = CommandError;
    type RestartError = CommandError;

    /// Connects to an WIFI access point and returns the connectivity state
    ///
    /// Note: Command confirmation just means that the module accepted the credentials.
    /// Returns [ConnectivityState::Associating] until the station up event has been received.
    fn join(&mut self, ssid: &str, key: &str) -> Result<ConnectivityState, JoinError> {
        if ssid.len() > 32 {
            return Err(JoinError::InvalidSSDLength);
        }

        if key.len() > 63 {
            return Err(JoinError::InvalidPasswordLength);
        }

        let ssid = atat::heapless::String::from_str(ssid).map_err(|_| JoinError::InvalidSSDLength)?;
        let key = atat::heapless::String::from_str(key).map_err(|_| JoinError::InvalidPasswordLength)?;

        self.process_urc_messages();
        if let Err(error) = self.send_command(JoinCommand::new(ssid, key)) {
            self.session.events.apply(Trigger::JoinRejected, self.sink);
            return Err(error);
        }

        self.session.events.apply(Trigger::JoinAccepted, self.sink);
        self.process_urc_messages();

        Ok(self.session.events.state)
    }

    fn leave(&mut self) -> Result<(), CommandError> {
        self.send_command(LeaveCommand)?;
        self.session.events.apply(Trigger::LeaveAccepted, self.sink);
        self.process_urc_messages();
        Ok(())
    }

    fn get_join_status(&mut self) -> ConnectivityState {
        self.process_urc_messages();
        self.session.events.state
    }

    /// Queries IP and MAC address
    fn get_address(&mut self) -> Result<LocalAddress, AddressErrors> {
        self.get_ip_address()?;
        self.get_mac_address()?;
        Ok(self.session.local_address.clone())
    }

    fn set_dhcp(&mut self, enabled: bool) -> Result<(), CommandError> {
        self.send_command(DhcpCommand::new(enabled))?;
        Ok(())
    }

    fn restart(&mut self) -> Result<(), CommandError> {
        self.reboot_with(RebootCommand)
    }

    fn handle_event(&mut self, kind: EventKind, timeout_ms: u32) -> Result<String<EVENT_TEXT_LEN>, EventError> {
        let sequence = self.session.events.sequence(kind);
        self.wait_for_event(kind, sequence, timeout_ms.millis())
    }
}

impl<
        'a,
        A: AtatClient,
        T: Timer<TIMER_HZ>,
        const TIMER_HZ: u32,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > Adapter<'a, A, T, TIMER_HZ, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    /// Creates a new network adapter
    pub fn new(
        client: A,
        urc_subscription: UrcSubscription<'a, URCMessages<RX_SIZE>, URC_CAPACITY, 1>,
        timer: T,
    ) -> Self {
        Self {
            client,
            urc_subscription,
            timer,
            timeout: 5_000.millis(),
            session: Session::default(),
            sink: None,
        }
    }

    /// Restarts the module and enables DHCP
    pub fn startup(&mut self) -> Result<(), CommandError> {
        self.restart()?;
        self.set_dhcp(true)
    }

    /// Restores the factory settings and blocks until the module rebooted
    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.reboot_with(FactoryResetCommand)
    }

    /// Queries the local IPv4 address. Returns None if no address is assigned.
    pub fn get_ip_address(&mut self) -> Result<Option<Ipv4Addr>, AddressErrors> {
        let response = self.send_command(IpConfigCommand)?;
        self.session.local_address.update_ip_config(&response)?;
        Ok(self.session.local_address.ipv4)
    }

    /// Queries the MAC address of the station interface
    pub fn get_mac_address(&mut self) -> Result<String<17>, AddressErrors> {
        let response = self.send_command(MacAddressCommand)?;
        self.session.local_address.update_mac(&response)
    }

    /// Queries the signal strength of the current link in dBm
    pub fn get_rssi(&mut self) -> Result<i8, AddressErrors> {
        let response = self.send_command(LinkStatusCommand)?;
        Ok(self.session.local_address.update_link_status(&response))
    }

    /// Returns true if an IP address is assigned
    pub fn is_connected(&mut self) -> bool {
        matches!(self.get_ip_address(), Ok(Some(_)))
    }

    /// Returns the addresses of the last queries without sending any command
    pub fn local_address(&self) -> &LocalAddress {
        &self.session.local_address
    }

    /// Sets the receiver of network state changes. Replaces any previous receiver.
    pub fn attach(&mut self, sink: &'a dyn EventSink) {
        self.sink = Some(sink);
    }

    /// Removes the receiver of network state changes
    pub fn detach(&mut self) {
        self.sink = None;
    }

    /// Sets the timeout for waiting on received data in ms
    pub fn set_timeout_ms(&mut self, timeout: u32) {
        self.timeout = TimerDurationU32::millis(timeout);
    }

    /// Sets limits of the packet queue for received data
    pub fn set_queue_limits(&mut self, limits: QueueLimits) {
        self.session.packets.set_limits(limits);
    }

    /// Returns the current limits of the packet queue
    pub fn queue_limits(&self) -> QueueLimits {
        self.session.packets.limits()
    }

    /// Number of received data messages which got dropped since creation
    pub fn dropped_packets(&self) -> usize {
        self.session.dropped_packets
    }

    /// Processes all pending messages in the queue
    pub(crate) fn process_urc_messages(&mut self) {
        while let Some(message) = self.urc_subscription.try_next_message_pure() {
            self.session.handle_urc(message, self.sink);
        }
    }

    /// Sends the given reset command and waits for the reboot event
    fn reboot_with<Cmd>(&mut self, command: Cmd) -> Result<(), CommandError>
    where
        Cmd: AtatCmd + CommandErrorHandler<Error = CommandError>,
    {
        self.process_urc_messages();
        let sequence = self.session.events.sequence(EventKind::Reboot);

        self.send_command(command)?;
        self.session.reset_sockets();
        self.session.events.apply(Trigger::RestartRequested, self.sink);

        if let Err(error) = self.wait_for_event(EventKind::Reboot, sequence, RESTART_TIMEOUT_MS.millis()) {
            self.session.events.apply(Trigger::RestartFailed, self.sink);

            return Err(match error {
                EventError::Timeout => CommandError::ReadyTimeout,
                EventError::TimerError => CommandError::TimerError,
            });
        }

        Ok(())
    }

    /// Blocks until the sequence of the given event kind differs from `sequence`
    fn wait_for_event(
        &mut self,
        kind: EventKind,
        sequence: u32,
        timeout: TimerDurationU32<TIMER_HZ>,
    ) -> Result<String<EVENT_TEXT_LEN>, EventError> {
        self.process_urc_messages();
        if self.session.events.sequence(kind) != sequence {
            return Ok(self.session.events.text(kind));
        }

        self.timer.start(timeout).map_err(|_| EventError::TimerError)?;

        loop {
            self.process_urc_messages();

            if self.session.events.sequence(kind) != sequence {
                return Ok(self.session.events.text(kind));
            }

            match self.timer.wait() {
                Ok(_) => return Err(EventError::Timeout),
                Err(nb::Error::Other(_)) => return Err(EventError::TimerError),
                Err(nb::Error::WouldBlock) => {}
            }
        }
    }

    /// Sends a command and maps the error if the command failed
    pub(crate) fn send_command<Cmd: AtatCmd + CommandErrorHandler>(
        &mut self,
        command: Cmd,
    ) -> Result<Cmd::Response, Cmd::Error> {
        self.client.send(&command).map_err(|error| command.command_error(error))
    }
}
