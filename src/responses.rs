use atat::atat_derive::AtatResp;
use atat::heapless_bytes::Bytes;

/// Commands which gets just responded by OK
#[derive(Clone, AtatResp)]
pub struct NoResponse;

/// Response of IPCONFIG command, e.g. `+IPCONFIG:DHCP,192.168.1.10,255.255.255.0,192.168.1.1,192.168.1.1`
#[derive(Clone, AtatResp, Debug)]
pub struct IpConfigResponse {
    /// Address assignment
    /// * DHCP: Assigned by DHCP server
    /// * STATIC: Static configuration
    #[at_arg(position = 0)]
    pub mode: Bytes<8>,

    /// Local IPv4 address, `0.0.0.0` if unassigned
    #[at_arg(position = 1)]
    pub address: Bytes<15>,

    #[at_arg(position = 2)]
    pub netmask: Bytes<15>,

    #[at_arg(position = 3)]
    pub gateway: Bytes<15>,

    #[at_arg(position = 4)]
    pub dns: Bytes<15>,
}

/// Response of WMAC query, e.g. `+WMAC:C8:93:46:4E:27:A1`
#[derive(Clone, AtatResp, Debug)]
pub struct MacAddressResponse {
    #[at_arg(position = 0)]
    pub mac: Bytes<17>,
}

/// Response of WLINK query, e.g. `+WLINK:C8:93:46:4E:27:A1,-52,6`
#[derive(Clone, AtatResp, Debug)]
pub struct LinkStatusResponse {
    /// MAC address of the access point
    #[allow(unused)]
    #[at_arg(position = 0)]
    pub bssid: Bytes<17>,

    /// Signal strength in dBm
    #[at_arg(position = 1)]
    pub rssi: i8,

    /// WiFi channel
    #[at_arg(position = 2)]
    pub channel: u8,
}
