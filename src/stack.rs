//! # Socket stack
//!
//! Up to five TCP client or UDP unicast connections are supported in parallel.
//! Received data is buffered as packets per socket, s. [PacketQueue](crate::packet::PacketQueue).
//!
//! The adapter implements [TcpClientStack] and [UdpClientStack] of [embedded_nal] as well.
//!
//! Block/chunk size is defined a const generics, s. [Adapter] for more details.
//!
//! ## Example
//!
//! ````
//! # use core::str::FromStr;
//! # use core::net::SocketAddr;
//! # use mxchip_at_nal::example::{ExampleAtClient as AtClient, ExampleTimer};
//! # use mxchip_at_nal::stack::Transport;
//! # use mxchip_at_nal::wifi::Adapter;
//! #
//! let channel = AtClient::urc_channel();
//! let client = AtClient::init(&channel);
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 128, 8, 4> =
//!     Adapter::new(client, channel.subscriber().unwrap(), ExampleTimer::default());
//!
//! // Creating a TCP connection
//! let mut socket = adapter.socket().unwrap();
//! adapter.connect(&mut socket, Transport::Tcp, SocketAddr::from_str("10.0.0.1:21").unwrap()).unwrap();
//!
//! // Sending some data
//! adapter.send(&socket, b"hallo!").unwrap();
//!
//! // Receiving some data
//! let mut rx_buffer = [0x0; 64];
//! let length = adapter.receive(&socket, &mut rx_buffer).unwrap();
//! assert_eq!(16, length);
//! assert_eq!(b"nice to see you!", &rx_buffer[..16]);
//!
//! // Closing socket
//! adapter.close(socket).unwrap();
//! ````
use crate::commands::{
    CloseSocketCommand, TcpConnectCommand, TransmissionCommand, TransmissionPrepareCommand, UdpConnectCommand,
};
use crate::event::ConnectivityState;
use crate::packet::MAX_SOCKETS;
use crate::wifi::{Adapter, Session};
use atat::blocking::AtatClient;
use atat::Error as AtError;
use core::net::SocketAddr;
use embedded_nal::{TcpClientStack, TcpErrorKind, UdpClientStack};
use fugit_timer::Timer;

/// Unique socket for a network connection
#[derive(Debug)]
pub struct Socket {
    /// Unique link id of AT
    pub(crate) link_id: usize,

    /// Remote of the last successful connect
    pub(crate) remote: Option<SocketAddr>,
}

impl Socket {
    pub(crate) fn new(link_id: usize) -> Self {
        Self { link_id, remote: None }
    }

    /// Link id used by the module for this socket
    pub fn link_id(&self) -> usize {
        self.link_id
    }
}

/// Transport protocol of a connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Transport {
    /// TCP client connection
    Tcp,

    /// UDP unicast, the remote port is used as local port
    Udp,
}

/// Internal connection state
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub(crate) enum ConnectionState {
    /// Socket is closed an may be (re)used
    #[default]
    Closed,
    /// Socket was returned by socket() but is not connected yet
    Open,
    /// Connection is fully open
    Connected,
    /// Socket was closed by URC message, but Socket object still exists and needs to be fully closed
    /// by calling 'close()'
    Closing,
}

/// Network related errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Connect command failed
    ConnectError(AtError),

    /// Preparing the transmission failed (CIPSEND command)
    TransmissionStartFailed(AtError),

    /// Transmission of data failed
    SendFailed(AtError),

    /// Socket close command failed
    CloseError(AtError),

    /// No socket available, since the maximum number is in use.
    NoSocketAvailable,

    /// Link id is outside of the supported range
    InvalidLinkId,

    /// Requested link id is already in use by another socket
    LinkIdInUse,

    /// Given socket is already connected to another remote. Socket needs to be closed first.
    AlreadyConnected,

    /// Unable to send data if socket is not connected
    SocketUnconnected,

    /// Socket was remotely closed and needs to either reconnected to fully closed by calling `close()` for [Adapter]
    ClosingSocket,

    /// Only IPv4 remotes are supported
    UnsupportedAddress,

    /// No data was received within the timeout
    ReceiveTimeout,

    /// Data chunk exceeds the transmission size
    ChunkTooLarge,

    /// Upstream timer error
    TimerError,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::ConnectError(e) => defmt::write!(f, "Error::ConnectError({})", e),
            Error::TransmissionStartFailed(e) => defmt::write!(f, "Error::TransmissionStartFailed({})", e),
            Error::SendFailed(e) => defmt::write!(f, "Error::SendFailed({})", e),
            Error::CloseError(e) => defmt::write!(f, "Error::CloseError({})", e),
            Error::NoSocketAvailable => defmt::write!(f, "Error::NoSocketAvailable"),
            Error::InvalidLinkId => defmt::write!(f, "Error::InvalidLinkId"),
            Error::LinkIdInUse => defmt::write!(f, "Error::LinkIdInUse"),
            Error::AlreadyConnected => defmt::write!(f, "Error::AlreadyConnected"),
            Error::SocketUnconnected => defmt::write!(f, "Error::SocketUnconnected"),
            Error::ClosingSocket => defmt::write!(f, "Error::ClosingSocket"),
            Error::UnsupportedAddress => defmt::write!(f, "Error::UnsupportedAddress"),
            Error::ReceiveTimeout => defmt::write!(f, "Error::ReceiveTimeout"),
            Error::ChunkTooLarge => defmt::write!(f, "Error::ChunkTooLarge"),
            Error::TimerError => defmt::write!(f, "Error::TimerError"),
        }
    }
}

impl embedded_nal::TcpError for Error {
    fn kind(&self) -> TcpErrorKind {
        match self {
            Error::ClosingSocket | Error::SocketUnconnected => TcpErrorKind::PipeClosed,
            _ => TcpErrorKind::Other,
        }
    }
}

impl<
        A: AtatClient,
        T: Timer<TIMER_HZ>,
        const TIMER_HZ: u32,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > TcpClientStack for Adapter<'_, A, T, TIMER_HZ, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type TcpSocket = Socket;
    type Error = Error;

    fn socket(&mut self) -> Result<Socket, Error> {
        Adapter::socket(self)
    }

    /// Opens a new TCP connection to the given IPv4 remote
    fn connect(&mut self, socket: &mut Socket, remote: SocketAddr) -> nb::Result<(), Error> {
        Adapter::connect(self, socket, Transport::Tcp, remote)?;
        Ok(())
    }

    fn send(&mut self, socket: &mut Socket, buffer: &[u8]) -> nb::Result<usize, Error> {
        Ok(Adapter::send(self, socket, buffer)?)
    }

    fn receive(&mut self, socket: &mut Socket, buffer: &mut [u8]) -> nb::Result<usize, Error> {
        Adapter::receive(self, socket, buffer)
    }

    fn close(&mut self, socket: Socket) -> Result<(), Error> {
        Adapter::close(self, socket)
    }
}

impl<
        A: AtatClient,
        T: Timer<TIMER_HZ>,
        const TIMER_HZ: u32,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > UdpClientStack for Adapter<'_, A, T, TIMER_HZ, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type UdpSocket = Socket;
    type Error = Error;

    fn socket(&mut self) -> Result<Socket, Error> {
        Adapter::socket(self)
    }

    /// Opens a UDP unicast connection. The remote port is used as local port.
    fn connect(&mut self, socket: &mut Socket, remote: SocketAddr) -> Result<(), Error> {
        Adapter::connect(self, socket, Transport::Udp, remote)
    }

    fn send(&mut self, socket: &mut Socket, buffer: &[u8]) -> nb::Result<(), Error> {
        Adapter::send(self, socket, buffer)?;
        Ok(())
    }

    /// Returns the received length and the connected remote
    fn receive(&mut self, socket: &mut Socket, buffer: &mut [u8]) -> nb::Result<(usize, SocketAddr), Error> {
        let remote = socket.remote.ok_or(Error::SocketUnconnected)?;
        let length = Adapter::receive(self, socket, buffer)?;
        Ok((length, remote))
    }

    fn close(&mut self, socket: Socket) -> Result<(), Error> {
        Adapter::close(self, socket)
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
    /// Opens and returns a new socket using the lowest free link id.
    /// If no socket is available [Error::NoSocketAvailable] is returned.
    pub fn socket(&mut self) -> Result<Socket, Error> {
        self.process_urc_messages();

        let link_id = self.session.get_next_open().ok_or(Error::NoSocketAvailable)?;
        self.session.sockets[link_id] = ConnectionState::Open;
        Ok(Socket::new(link_id))
    }

    /// Opens a socket with the given link id (0-4)
    pub fn socket_with_id(&mut self, link_id: usize) -> Result<Socket, Error> {
        self.process_urc_messages();

        if link_id >= MAX_SOCKETS {
            return Err(Error::InvalidLinkId);
        }

        if !self.session.is_link_closed(link_id) {
            return Err(Error::LinkIdInUse);
        }

        self.session.sockets[link_id] = ConnectionState::Open;
        Ok(Socket::new(link_id))
    }

    /// Opens a new connection to the given IPv4 remote.
    /// Returns [Error::AlreadyConnected] if socket is already connected.
    ///
    /// On failure the socket state is left unchanged.
    pub fn connect(&mut self, socket: &mut Socket, transport: Transport, remote: SocketAddr) -> Result<(), Error> {
        self.process_urc_messages();

        if self.session.is_socket_connected(socket) {
            return Err(Error::AlreadyConnected);
        }

        let remote = match remote {
            SocketAddr::V4(address) => address,
            SocketAddr::V6(_) => return Err(Error::UnsupportedAddress),
        };

        match transport {
            Transport::Tcp => self.send_command(TcpConnectCommand::new(socket.link_id, remote))?,
            Transport::Udp => self.send_command(UdpConnectCommand::new(socket.link_id, remote))?,
        };

        self.session.sockets[socket.link_id] = ConnectionState::Connected;
        socket.remote = Some(SocketAddr::V4(remote));
        self.process_urc_messages();
        Ok(())
    }

    /// Returns true if the socket is currently connected.
    /// Connection aborts by the remote side are also taken into account.
    pub fn is_socket_connected(&mut self, socket: &Socket) -> bool {
        self.process_urc_messages();
        self.session.is_socket_connected(socket)
    }

    /// Sends the given buffer and returns the length (in bytes) sent.
    /// The data is divided into smaller blocks. The block size is determined by the generic constant TX_SIZE.
    pub fn send(&mut self, socket: &Socket, buffer: &[u8]) -> Result<usize, Error> {
        self.process_urc_messages();
        self.session.assert_socket_connected(socket)?;

        for chunk in buffer.chunks(TX_SIZE) {
            self.send_command(TransmissionPrepareCommand::new(socket.link_id, chunk.len()))?;
            self.send_command(TransmissionCommand::<TX_SIZE>::new(chunk)?)?;
        }

        Ok(buffer.len())
    }

    /// Copies the oldest received packet of the socket to the given buffer and returns the copied length.
    /// A packet exceeding the buffer is split, the rest is returned by the following calls.
    ///
    /// Waits for data up to the configured timeout (s. [Adapter::set_timeout_ms]) and returns
    /// [nb::Error::WouldBlock] if still no data is available.
    pub fn receive(&mut self, socket: &Socket, buffer: &mut [u8]) -> nb::Result<usize, Error> {
        if buffer.is_empty() {
            return Ok(0);
        }

        self.process_urc_messages();
        if let Some(length) = self.session.packets.read_into(socket.link_id, buffer) {
            return Ok(length);
        }

        if self.session.is_socket_closing(socket) {
            return Err(nb::Error::Other(Error::ClosingSocket));
        }

        self.timer.start(self.timeout).map_err(|_| nb::Error::Other(Error::TimerError))?;

        loop {
            match self.timer.wait() {
                Ok(_) => return Err(nb::Error::WouldBlock),
                Err(nb::Error::Other(_)) => return Err(nb::Error::Other(Error::TimerError)),
                Err(nb::Error::WouldBlock) => {}
            }

            self.process_urc_messages();
            if let Some(length) = self.session.packets.read_into(socket.link_id, buffer) {
                return Ok(length);
            }
        }
    }

    /// Closes a socket
    ///
    /// If the socket has already been closed by the remote side or is not connected, no command
    /// is sent but only the internal status is set.
    /// In case of an error (which is returned) the socket is internally set to closed so that it is not lost
    /// and can be reused.
    ///
    /// Received but not yet read data of the socket stays buffered.
    pub fn close(&mut self, socket: Socket) -> Result<(), Error> {
        self.process_urc_messages();

        // Socket already closed during restart
        if self.session.is_link_closed(socket.link_id) {
            return Ok(());
        }

        // Socket is not connected yet or was already closed remotely
        if self.session.is_socket_closing(&socket) || self.session.is_socket_open(&socket) {
            self.session.sockets[socket.link_id] = ConnectionState::Closed;
            return Ok(());
        }

        let result = self.send_command(CloseSocketCommand::new(socket.link_id));

        // Setting to Closed even on error. Otherwise socket can not be reused in future, as its consumed.
        self.session.sockets[socket.link_id] = ConnectionState::Closed;

        result?;
        Ok(())
    }

    /// Returns true if received data of the socket is buffered
    pub fn is_readable(&mut self, socket: &Socket) -> bool {
        self.process_urc_messages();
        self.session.packets.has_data(socket.link_id)
    }

    /// Returns true if the socket is connected and the module is not rebooting
    pub fn is_writable(&mut self, socket: &Socket) -> bool {
        self.process_urc_messages();
        self.session.is_socket_writable(socket)
    }

    /// Drops all buffered data of the socket and returns the count of dropped packets
    pub fn discard(&mut self, socket: &Socket) -> usize {
        self.process_urc_messages();
        self.session.packets.discard(socket.link_id)
    }
}

impl<const RX_SIZE: usize, const QUEUE_DEPTH: usize> Session<RX_SIZE, QUEUE_DEPTH> {
    /// Returns the lowest free link id
    pub(crate) fn get_next_open(&self) -> Option<usize> {
        self.sockets.iter().position(|state| *state == ConnectionState::Closed)
    }

    pub(crate) fn is_link_closed(&self, link_id: usize) -> bool {
        self.sockets[link_id] == ConnectionState::Closed
    }

    pub(crate) fn is_socket_open(&self, socket: &Socket) -> bool {
        self.sockets[socket.link_id] == ConnectionState::Open
    }

    pub(crate) fn is_socket_connected(&self, socket: &Socket) -> bool {
        self.sockets[socket.link_id] == ConnectionState::Connected
    }

    pub(crate) fn is_socket_closing(&self, socket: &Socket) -> bool {
        self.sockets[socket.link_id] == ConnectionState::Closing
    }

    pub(crate) fn is_socket_writable(&self, socket: &Socket) -> bool {
        self.is_socket_connected(socket) && self.events.state != ConnectivityState::Rebooting
    }

    /// Asserts that the given socket is connected and returns otherwise the appropriate error
    pub(crate) fn assert_socket_connected(&self, socket: &Socket) -> Result<(), Error> {
        if self.is_socket_closing(socket) {
            return Err(Error::ClosingSocket);
        }

        if !self.is_socket_connected(socket) {
            return Err(Error::SocketUnconnected);
        }

        Ok(())
    }
}
