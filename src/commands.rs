use crate::responses::{IpConfigResponse, LinkStatusResponse, MacAddressResponse, NoResponse};
use crate::stack::Error as StackError;
use crate::wifi::{AddressErrors, CommandError, JoinError};
use atat::atat_derive::AtatCmd;
use atat::heapless::String;
use atat::{Error as AtError, InternalError};
use core::fmt::Write;
use core::net::SocketAddrV4;

/// Trait for mapping command errors
pub trait CommandErrorHandler {
    type Error;

    /// Maps regular errors
    fn command_error(&self, error: AtError) -> Self::Error;
}

/// Command for joining an access point
#[derive(Clone, AtatCmd)]
#[at_cmd("+WJAP", NoResponse, timeout_ms = 20_000, quote_escape_strings = false, termination = "\r\n")]
pub struct JoinCommand {
    /// The SSID of the target access point
    #[at_arg(position = 0)]
    ssid: String<32>,

    /// The pass phrase of the target access point, passed verbatim
    #[at_arg(position = 1)]
    password: String<64>,
}

impl JoinCommand {
    pub fn new(ssid: String<32>, password: String<64>) -> Self {
        Self { ssid, password }
    }
}

impl CommandErrorHandler for JoinCommand {
    type Error = JoinError;

    fn command_error(&self, error: AtError) -> Self::Error {
        JoinError::ConnectError(error)
    }
}

/// Disconnects from the current access point
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+WJAPQ", NoResponse, timeout_ms = 5_000, termination = "\r\n")]
pub struct LeaveCommand;

impl CommandErrorHandler for LeaveCommand {
    type Error = CommandError;

    fn command_error(&self, error: AtError) -> Self::Error {
        CommandError::CommandFailed(error)
    }
}

/// Enables/Disables the DHCP client of the station interface
#[derive(Clone, AtatCmd)]
#[at_cmd("+DHCP", NoResponse, timeout_ms = 1_000, quote_escape_strings = false, termination = "\r\n")]
pub struct DhcpCommand {
    /// ON or OFF
    mode: String<3>,
}

impl DhcpCommand {
    pub fn new(enabled: bool) -> Self {
        Self {
            mode: String::try_from(if enabled { "ON" } else { "OFF" }).unwrap(),
        }
    }
}

impl CommandErrorHandler for DhcpCommand {
    type Error = CommandError;

    fn command_error(&self, error: AtError) -> Self::Error {
        CommandError::CommandFailed(error)
    }
}

/// Reboots the module
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+REBOOT", NoResponse, timeout_ms = 1_000, termination = "\r\n")]
pub struct RebootCommand;

impl CommandErrorHandler for RebootCommand {
    type Error = CommandError;

    fn command_error(&self, error: AtError) -> Self::Error {
        CommandError::CommandFailed(error)
    }
}

/// Restores the factory settings and reboots the module
#[derive(Clone, Default, AtatCmd)]
#[at_cmd("+FACTORY", NoResponse, timeout_ms = 1_000, termination = "\r\n")]
pub struct FactoryResetCommand;

impl CommandErrorHandler for FactoryResetCommand {
    type Error = CommandError;

    fn command_error(&self, error: AtError) -> Self::Error {
        CommandError::CommandFailed(error)
    }
}

/// Opens a TCP client connection
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTART", NoResponse, timeout_ms = 5_000, attempts = 1, quote_escape_strings = false, termination = "\r\n")]
pub struct TcpConnectCommand {
    /// Socket ID
    link_id: usize,

    /// Always tcp_client
    connection_type: String<10>,

    /// Remote IPv4 address
    remote_host: String<15>,

    /// Remote port
    port: u16,
}

impl TcpConnectCommand {
    pub fn new(link_id: usize, remote: SocketAddrV4) -> Self {
        Self {
            link_id,
            connection_type: String::try_from("tcp_client").unwrap(),
            remote_host: format_ip(&remote),
            port: remote.port(),
        }
    }
}

impl CommandErrorHandler for TcpConnectCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConnectError(error)
    }
}

/// Opens a UDP unicast connection. The remote port is used as local port as well.
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTART", NoResponse, timeout_ms = 5_000, attempts = 1, quote_escape_strings = false, termination = "\r\n")]
pub struct UdpConnectCommand {
    /// Socket ID
    link_id: usize,

    /// Always udp_unicast
    connection_type: String<11>,

    /// Remote IPv4 address
    remote_host: String<15>,

    /// Remote port
    port: u16,

    /// Local port
    local_port: u16,
}

impl UdpConnectCommand {
    pub fn new(link_id: usize, remote: SocketAddrV4) -> Self {
        Self {
            link_id,
            connection_type: String::try_from("udp_unicast").unwrap(),
            remote_host: format_ip(&remote),
            port: remote.port(),
            local_port: remote.port(),
        }
    }
}

impl CommandErrorHandler for UdpConnectCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::ConnectError(error)
    }
}

/// Announces the transmission of the given byte count
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSEND", NoResponse, timeout_ms = 1_000, attempts = 1, termination = "\r\n")]
pub struct TransmissionPrepareCommand {
    /// Socket ID
    link_id: usize,

    /// Byte count of the following data
    length: usize,
}

impl TransmissionPrepareCommand {
    pub fn new(link_id: usize, length: usize) -> Self {
        Self { link_id, length }
    }
}

impl CommandErrorHandler for TransmissionPrepareCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::TransmissionStartFailed(error)
    }
}

/// Max. byte count of a single transmission accepted by the module
pub const MAX_TX_SIZE: usize = 1024;

/// Raw socket data following a [TransmissionPrepareCommand]
#[derive(Clone)]
pub struct TransmissionCommand<'a, const TX_SIZE: usize> {
    data: &'a [u8],
}

impl<'a, const TX_SIZE: usize> TransmissionCommand<'a, TX_SIZE> {
    const VALID_TX_SIZE: () = assert!(TX_SIZE > 0 && TX_SIZE <= MAX_TX_SIZE, "TX_SIZE must be in range 1..=1024");

    /// Returns [StackError::ChunkTooLarge] if the data exceeds TX_SIZE
    pub fn new(data: &'a [u8]) -> Result<Self, StackError> {
        let () = Self::VALID_TX_SIZE;

        if data.len() > TX_SIZE {
            return Err(StackError::ChunkTooLarge);
        }

        Ok(Self { data })
    }
}

impl<const TX_SIZE: usize> atat::AtatCmd for TransmissionCommand<'_, TX_SIZE> {
    type Response = NoResponse;

    const MAX_LEN: usize = TX_SIZE;
    const MAX_TIMEOUT_MS: u32 = 5_000;

    fn write(&self, buf: &mut [u8]) -> usize {
        buf[..self.data.len()].copy_from_slice(self.data);
        self.data.len()
    }

    fn parse(&self, resp: Result<&[u8], InternalError>) -> Result<Self::Response, AtError> {
        resp.map(|_| NoResponse).map_err(|_| AtError::Error)
    }
}

impl<const TX_SIZE: usize> CommandErrorHandler for TransmissionCommand<'_, TX_SIZE> {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::SendFailed(error)
    }
}

/// Closes the given socket
#[derive(Clone, AtatCmd)]
#[at_cmd("+CIPSTOP", NoResponse, timeout_ms = 1_000, attempts = 1, termination = "\r\n")]
pub struct CloseSocketCommand {
    /// Socket ID
    link_id: usize,
}

impl CommandErrorHandler for CloseSocketCommand {
    type Error = StackError;

    fn command_error(&self, error: AtError) -> Self::Error {
        StackError::CloseError(error)
    }
}

impl CloseSocketCommand {
    pub fn new(link_id: usize) -> Self {
        Self { link_id }
    }
}

/// Queries the IP configuration of the station interface
#[derive(Clone, AtatCmd)]
#[at_cmd("+IPCONFIG", IpConfigResponse, timeout_ms = 1_000, termination = "\r\n")]
pub struct IpConfigCommand;

impl CommandErrorHandler for IpConfigCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: AtError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Queries the MAC address of the station interface
#[derive(Clone, AtatCmd)]
#[at_cmd("+WMAC?", MacAddressResponse, timeout_ms = 1_000, termination = "\r\n")]
pub struct MacAddressCommand;

impl CommandErrorHandler for MacAddressCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: AtError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Queries the state of the current WiFi link
#[derive(Clone, AtatCmd)]
#[at_cmd("+WLINK?", LinkStatusResponse, timeout_ms = 1_000, termination = "\r\n")]
pub struct LinkStatusCommand;

impl CommandErrorHandler for LinkStatusCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: AtError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Formats the IPv4 address of the given socket address
fn format_ip(address: &SocketAddrV4) -> String<15> {
    let mut buffer = String::new();

    // Max. length of a dotted IPv4 address is 15 chars, so this never fails
    let _ = write!(buffer, "{}", address.ip());
    buffer
}
