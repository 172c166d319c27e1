use crate::event::EVENT_TEXT_LEN;
use atat::digest::ParseError;
use atat::{AtatUrc, Parser};
use heapless::{String, Vec};

/// Prefix of received socket data: `+CIPEVENT:SOCKET,<link_id>,<length>,<data>`
const DATA_PREFIX: &[u8] = b"+CIPEVENT:SOCKET,";

/// Prefix of a remotely closed socket: `+CIPEVENT:CLOSED,<link_id>`
const CLOSED_PREFIX: &[u8] = b"+CIPEVENT:CLOSED,";

/// Prefix of WiFi events, e.g. `+WEVENT:STATION_UP`
const WIFI_EVENT_PREFIX: &[u8] = b"+WEVENT:";

/// Max. digit count of link id and length fields
const MAX_DIGITS: usize = 5;

/// URC definitions, needs to passed as generic of [AtDigester](atat::digest::AtDigester): `AtDigester<URCMessages>`
///
/// RX_SIZE: Max. payload size of a single received socket data message
#[derive(Clone, Debug, PartialEq)]
pub enum URCMessages<const RX_SIZE: usize> {
    /// Socket data received by the module
    Data { link_id: usize, data: Vec<u8, RX_SIZE> },
    /// Socket data was received, but the payload exceeds RX_SIZE
    DataOverflow { link_id: usize, length: usize },
    /// Socket with the given link_id was closed by remote side
    SocketClosed(usize),
    /// WiFi event with its text, e.g. STATION_UP
    WifiEvent(String<EVENT_TEXT_LEN>),
    /// Unknown URC message
    Unknown,
}

impl<const RX_SIZE: usize> AtatUrc for URCMessages<RX_SIZE> {
    type Response = Self;

    fn parse(resp: &[u8]) -> Option<Self::Response> {
        if resp.starts_with(DATA_PREFIX) {
            return Self::parse_data(resp);
        }

        let line = trim_line_end(resp);

        if line.starts_with(CLOSED_PREFIX) {
            let (link_id, _) = parse_number(&line[CLOSED_PREFIX.len()..]).ok()?;
            return Some(Self::SocketClosed(link_id));
        }

        if line.starts_with(WIFI_EVENT_PREFIX) {
            let text = core::str::from_utf8(&line[WIFI_EVENT_PREFIX.len()..]).ok()?;
            let mut event = String::new();
            for c in text.chars() {
                if event.push(c).is_err() {
                    break;
                }
            }

            return Some(Self::WifiEvent(event));
        }

        Some(Self::Unknown)
    }
}

impl<const RX_SIZE: usize> URCMessages<RX_SIZE> {
    /// Parses a complete socket data message
    fn parse_data(resp: &[u8]) -> Option<Self> {
        let (link_id, length, header_length) = parse_data_header(resp).ok()?;
        let payload = &resp[header_length..];

        if payload.len() != length {
            return None;
        }

        match Vec::from_slice(payload) {
            Ok(data) => Some(Self::Data { link_id, data }),
            Err(_) => Some(Self::DataOverflow { link_id, length }),
        }
    }
}

impl<const RX_SIZE: usize> Parser for URCMessages<RX_SIZE> {
    fn parse(buf: &[u8]) -> Result<(&[u8], usize), ParseError> {
        // Skipping empty lines
        let mut start = 0;
        while buf[start..].starts_with(b"\r\n") {
            start += 2;
        }

        let frame = &buf[start..];
        if frame.is_empty() {
            return Err(ParseError::Incomplete);
        }

        // Socket data is binary and not terminated by CRLF
        if frame.starts_with(DATA_PREFIX) {
            let (_, length, header_length) = parse_data_header(frame)?;
            let end = start + header_length + length;

            if buf.len() < end {
                return Err(ParseError::Incomplete);
            }

            return Ok((&buf[start..end], end));
        }

        if !is_line_urc(frame) {
            if is_prefix_of_urc(frame) {
                return Err(ParseError::Incomplete);
            }

            return Err(ParseError::NoMatch);
        }

        match frame.windows(2).position(|window| window == b"\r\n") {
            Some(position) => {
                let end = start + position + 2;
                Ok((&buf[start..end], end))
            }
            None => Err(ParseError::Incomplete),
        }
    }
}

/// Returns true if the frame starts with the prefix of a line based URC
fn is_line_urc(frame: &[u8]) -> bool {
    frame.starts_with(CLOSED_PREFIX) || frame.starts_with(WIFI_EVENT_PREFIX)
}

/// Returns true if the frame may become a URC once more bytes have been received
fn is_prefix_of_urc(frame: &[u8]) -> bool {
    [DATA_PREFIX, CLOSED_PREFIX, WIFI_EVENT_PREFIX]
        .iter()
        .any(|prefix| frame.len() < prefix.len() && prefix.starts_with(frame))
}

/// Parses the header of socket data message. Returns link_id, payload length and header length.
fn parse_data_header(frame: &[u8]) -> Result<(usize, usize, usize), ParseError> {
    let mut position = DATA_PREFIX.len();

    let (link_id, consumed) = parse_field(&frame[position..])?;
    position += consumed;

    let (length, consumed) = parse_field(&frame[position..])?;
    position += consumed;

    Ok((link_id, length, position))
}

/// Parses a decimal number terminated by a comma. Returns the number and the consumed length incl. comma.
fn parse_field(buf: &[u8]) -> Result<(usize, usize), ParseError> {
    let (number, digits) = parse_number(buf)?;

    match buf.get(digits) {
        Some(b',') => Ok((number, digits + 1)),
        Some(_) => Err(ParseError::NoMatch),
        None => Err(ParseError::Incomplete),
    }
}

/// Parses the leading decimal digits. Returns the number and the digit count.
fn parse_number(buf: &[u8]) -> Result<(usize, usize), ParseError> {
    let digits = buf.iter().take_while(|byte| byte.is_ascii_digit()).count();

    if digits == 0 {
        return Err(if buf.is_empty() {
            ParseError::Incomplete
        } else {
            ParseError::NoMatch
        });
    }

    if digits > MAX_DIGITS {
        return Err(ParseError::NoMatch);
    }

    let number = buf[..digits]
        .iter()
        .fold(0, |number, digit| number * 10 + (digit - b'0') as usize);

    Ok((number, digits))
}

/// Strips a trailing CRLF
fn trim_line_end(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r\n").unwrap_or(line)
}
