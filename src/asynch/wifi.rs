use core::fmt::Debug;
use core::net::{Ipv4Addr, SocketAddr};
use core::str::FromStr;

use atat::{asynch::AtatClient, AtatCmd, UrcSubscription};
use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use embedded_nal_async::TcpConnect;
use heapless::String;

use crate::commands::{
    CommandErrorHandler, DhcpCommand, FactoryResetCommand, IpConfigCommand, JoinCommand, LeaveCommand,
    LinkStatusCommand, MacAddressCommand, RebootCommand, TcpConnectCommand, UdpConnectCommand,
};
use crate::event::{ConnectivityState, EventError, EventKind, EventSink, Trigger, EVENT_TEXT_LEN};
use crate::packet::QueueLimits;
use crate::stack::{ConnectionState, Error, Socket, Transport};
use crate::urc::URCMessages;
use crate::wifi::{AddressErrors, CommandError, JoinError, LocalAddress, Session, RESTART_TIMEOUT_MS};

use super::connection::Connection;

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
    fn join(
        &mut self,
        ssid: &str,
        key: &str,
    ) -> impl core::future::Future<Output = Result<ConnectivityState, Self::JoinError>>;

    /// Disconnects from the current access point
    fn leave(&mut self) -> impl core::future::Future<Output = Result<(), Self::ConfigurationErrors>>;

    /// Returns the current connectivity state
    fn get_join_status(&mut self) -> impl core::future::Future<Output = ConnectivityState>;

    /// Returns local address information
    fn get_address(&mut self) -> impl core::future::Future<Output = Result<LocalAddress, Self::AddressError>>;

    /// Enables/Disables the DHCP client
    fn set_dhcp(&mut self, enabled: bool) -> impl core::future::Future<Output = Result<(), Self::ConfigurationErrors>>;

    /// Restarts the module and waits until ready
    fn restart(&mut self) -> impl core::future::Future<Output = Result<(), Self::RestartError>>;

    /// Waits until the given event is reported by the module and returns the event text.
    /// Events already observed before this call are not taken into account.
    fn handle_event(
        &mut self,
        kind: EventKind,
        timeout: Duration,
    ) -> impl core::future::Future<Output = Result<String<EVENT_TEXT_LEN>, EventError>>;
}

pub struct InnerAdapter<
    'urc_sub,
    A: AtatClient,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
    const URC_CAPACITY: usize,
    const QUEUE_DEPTH: usize,
> {
    /// ATAT client
    pub(crate) client: A,

    /// URC message subscriber
    pub(crate) urc_subscription: UrcSubscription<'urc_sub, URCMessages<RX_SIZE>, URC_CAPACITY, 1>,

    /// Network state
    pub(crate) session: Session<RX_SIZE, QUEUE_DEPTH>,

    /// Max. time for waiting on received data
    pub(crate) timeout: Duration,

    /// Receiver of state changes
    pub(crate) sink: Option<&'urc_sub dyn EventSink>,
}

impl<
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > InnerAdapter<'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    pub fn new(
        client: A,
        urc_subscription: UrcSubscription<'urc_sub, URCMessages<RX_SIZE>, URC_CAPACITY, 1>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            urc_subscription,
            session: Session::default(),
            timeout,
            sink: None,
        }
    }

    pub(crate) fn process_urc_messages(&mut self) {
        while let Some(message) = self.urc_subscription.try_next_message_pure() {
            self.session.handle_urc(message, self.sink);
        }
    }

    async fn connect_access_point(&mut self, ssid: &str, key: &str) -> Result<(), JoinError> {
        if ssid.len() > 32 {
            return Err(JoinError::InvalidSSDLength);
        }

        if key.len() > 63 {
            return Err(JoinError::InvalidPasswordLength);
        }

        let ssid = String::from_str(ssid).map_err(|_| JoinError::InvalidSSDLength)?;
        let key = String::from_str(key).map_err(|_| JoinError::InvalidPasswordLength)?;

        self.process_urc_messages();
        if let Err(error) = self.send_command(JoinCommand::new(ssid, key)).await {
            self.session.events.apply(Trigger::JoinRejected, self.sink);
            return Err(error);
        }

        self.session.events.apply(Trigger::JoinAccepted, self.sink);
        Ok(())
    }

    async fn get_ip_address(&mut self) -> Result<Option<Ipv4Addr>, AddressErrors> {
        let response = self.send_command(IpConfigCommand).await?;
        self.session.local_address.update_ip_config(&response)?;
        Ok(self.session.local_address.ipv4)
    }

    async fn get_mac_address(&mut self) -> Result<String<17>, AddressErrors> {
        let response = self.send_command(MacAddressCommand).await?;
        self.session.local_address.update_mac(&response)
    }

    pub(crate) async fn send_command<Cmd: AtatCmd + CommandErrorHandler>(
        &mut self,
        command: Cmd,
    ) -> Result<Cmd::Response, Cmd::Error> {
        self.client.send(&command).await.map_err(|e| command.command_error(e))
    }

    /// Assigns a free link_id. Returns an error in case no more free sockets are available
    fn open_socket(&mut self) -> Result<Socket, Error> {
        if let Some(link_id) = self.session.get_next_open() {
            self.session.sockets[link_id] = ConnectionState::Open;
            return Ok(Socket::new(link_id));
        }

        Err(Error::NoSocketAvailable)
    }
}

pub struct Adapter<
    'urc_sub,
    A: AtatClient,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
    const URC_CAPACITY: usize,
    const QUEUE_DEPTH: usize,
> {
    inner: Mutex<CriticalSectionRawMutex, InnerAdapter<'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>>,
}

impl<
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > TcpConnect for Adapter<'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type Error = Error;

    type Connection<'a>
        = Connection<'a, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
    where
        Self: 'a;

    /// Opens a new TCP connection to the given IPv4 remote
    async fn connect<'a>(&'a self, remote: SocketAddr) -> Result<Self::Connection<'a>, Self::Error> {
        Adapter::connect(self, Transport::Tcp, remote).await
    }
}

impl<
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > WifiAdapter for Adapter<'_, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type JoinError = JoinError;
    type AddressError = AddressErrors;
    type ConfigurationErrors = CommandError;
    type RestartError = CommandError;

    async fn join(&mut self, ssid: &str, key: &str) -> Result<ConnectivityState, JoinError> {
        let mut inner = self.inner.lock().await;
        inner.connect_access_point(ssid, key).await?;
        inner.process_urc_messages();

        Ok(inner.session.events.state)
    }

    async fn leave(&mut self) -> Result<(), CommandError> {
        let mut inner = self.inner.lock().await;
        inner.send_command(LeaveCommand).await?;

        let sink = inner.sink;
        inner.session.events.apply(Trigger::LeaveAccepted, sink);
        inner.process_urc_messages();
        Ok(())
    }

    async fn get_join_status(&mut self) -> ConnectivityState {
        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();
        inner.session.events.state
    }

    async fn get_address(&mut self) -> Result<LocalAddress, AddressErrors> {
        let mut inner = self.inner.lock().await;
        inner.get_ip_address().await?;
        inner.get_mac_address().await?;

        Ok(inner.session.local_address.clone())
    }

    async fn set_dhcp(&mut self, enabled: bool) -> Result<(), CommandError> {
        self.inner.lock().await.send_command(DhcpCommand::new(enabled)).await?;
        Ok(())
    }

    async fn restart(&mut self) -> Result<(), CommandError> {
        self.reboot_with(RebootCommand).await
    }

    async fn handle_event(&mut self, kind: EventKind, timeout: Duration) -> Result<String<EVENT_TEXT_LEN>, EventError> {
        let sequence = self.inner.lock().await.session.events.sequence(kind);
        self.wait_for_event(kind, sequence, timeout).await
    }
}

impl<
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > Adapter<'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    pub fn new(
        client: A,
        urc_subscription: UrcSubscription<'urc_sub, URCMessages<RX_SIZE>, URC_CAPACITY, 1>,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Mutex::new(InnerAdapter::new(client, urc_subscription, timeout)),
        }
    }

    /// Opens a new connection to the given IPv4 remote using the lowest free link id
    pub async fn connect(
        &self,
        transport: Transport,
        remote: SocketAddr,
    ) -> Result<Connection<'_, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>, Error> {
        let remote = match remote {
            SocketAddr::V4(address) => address,
            SocketAddr::V6(_) => return Err(Error::UnsupportedAddress),
        };

        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();
        let mut socket = inner.open_socket()?;

        let result = match transport {
            Transport::Tcp => inner.send_command(TcpConnectCommand::new(socket.link_id, remote)).await,
            Transport::Udp => inner.send_command(UdpConnectCommand::new(socket.link_id, remote)).await,
        };

        if let Err(error) = result {
            inner.session.sockets[socket.link_id] = ConnectionState::Closed;
            return Err(error);
        }

        inner.session.sockets[socket.link_id] = ConnectionState::Connected;
        socket.remote = Some(SocketAddr::V4(remote));
        Ok(Connection {
            socket,
            inner: &self.inner,
        })
    }

    /// Restarts the module and enables DHCP
    pub async fn startup(&mut self) -> Result<(), CommandError> {
        self.restart().await?;
        self.set_dhcp(true).await
    }

    /// Restores the factory settings and waits until the module rebooted
    pub async fn reset(&mut self) -> Result<(), CommandError> {
        self.reboot_with(FactoryResetCommand).await
    }

    /// Queries the local IPv4 address. Returns None if no address is assigned.
    pub async fn get_ip_address(&self) -> Result<Option<Ipv4Addr>, AddressErrors> {
        self.inner.lock().await.get_ip_address().await
    }

    /// Queries the MAC address of the station interface
    pub async fn get_mac_address(&self) -> Result<String<17>, AddressErrors> {
        self.inner.lock().await.get_mac_address().await
    }

    /// Queries the signal strength of the current link in dBm
    pub async fn get_rssi(&self) -> Result<i8, AddressErrors> {
        let mut inner = self.inner.lock().await;
        let response = inner.send_command(LinkStatusCommand).await?;
        Ok(inner.session.local_address.update_link_status(&response))
    }

    /// Returns true if an IP address is assigned
    pub async fn is_connected(&self) -> bool {
        matches!(self.get_ip_address().await, Ok(Some(_)))
    }

    /// Sets the receiver of network state changes. Replaces any previous receiver.
    pub async fn attach(&self, sink: &'urc_sub dyn EventSink) {
        self.inner.lock().await.sink = Some(sink);
    }

    /// Removes the receiver of network state changes
    pub async fn detach(&self) {
        self.inner.lock().await.sink = None;
    }

    /// Sets the timeout for waiting on received data
    pub async fn set_timeout(&self, timeout: Duration) {
        self.inner.lock().await.timeout = timeout;
    }

    /// Sets limits of the packet queue for received data
    pub async fn set_queue_limits(&self, limits: QueueLimits) {
        self.inner.lock().await.session.packets.set_limits(limits);
    }

    /// Returns the current limits of the packet queue
    pub async fn queue_limits(&self) -> QueueLimits {
        self.inner.lock().await.session.packets.limits()
    }

    /// Number of received data messages which got dropped since creation
    pub async fn dropped_packets(&self) -> usize {
        self.inner.lock().await.session.dropped_packets
    }

    /// Sends the given reset command and waits for the reboot event
    async fn reboot_with<Cmd>(&self, command: Cmd) -> Result<(), CommandError>
    where
        Cmd: AtatCmd + CommandErrorHandler<Error = CommandError>,
    {
        let sequence = {
            let mut inner = self.inner.lock().await;
            inner.process_urc_messages();
            let sequence = inner.session.events.sequence(EventKind::Reboot);

            inner.send_command(command).await?;
            inner.session.reset_sockets();

            let sink = inner.sink;
            inner.session.events.apply(Trigger::RestartRequested, sink);
            sequence
        };

        let timeout = Duration::from_millis(RESTART_TIMEOUT_MS as u64);
        if self.wait_for_event(EventKind::Reboot, sequence, timeout).await.is_err() {
            let mut inner = self.inner.lock().await;
            let sink = inner.sink;
            inner.session.events.apply(Trigger::RestartFailed, sink);

            return Err(CommandError::ReadyTimeout);
        }

        Ok(())
    }

    /// Waits until the sequence of the given event kind differs from `sequence`.
    /// The lock is released between polls, so connections may be used in the meantime.
    async fn wait_for_event(
        &self,
        kind: EventKind,
        sequence: u32,
        timeout: Duration,
    ) -> Result<String<EVENT_TEXT_LEN>, EventError> {
        let task = async {
            loop {
                {
                    let mut inner = self.inner.lock().await;
                    inner.process_urc_messages();

                    if inner.session.events.sequence(kind) != sequence {
                        return inner.session.events.text(kind);
                    }
                }

                yield_now().await;
            }
        };

        match select(Timer::after(timeout), task).await {
            Either::First(_) => Err(EventError::Timeout),
            Either::Second(text) => Ok(text),
        }
    }
}
