//! # Received socket data
//!
//! All data received by the module is kept in one queue for the whole device. Packets of different
//! sockets are interleaved in arrival order and distinguished by their link id only. Reading the data of
//! one socket never removes or reorders packets of other sockets.
//!
//! The queue is bounded twice: by the number of slots (`QUEUE_DEPTH`) and by a runtime limit of packets
//! per socket, s. [QueueLimits].
use heapless::Vec;

/// Max. number of sockets supported by the module
pub const MAX_SOCKETS: usize = 5;

/// A chunk of received data belonging to a single socket
#[derive(Clone, Debug, PartialEq)]
pub struct Packet<const RX_SIZE: usize> {
    /// Link id of the socket the data belongs to
    pub(crate) link_id: usize,

    /// Payload as received from the module
    pub(crate) data: Vec<u8, RX_SIZE>,

    /// Index of the first byte not yet delivered to the reader
    pub(crate) position: usize,
}

impl<const RX_SIZE: usize> Packet<RX_SIZE> {
    pub fn new(link_id: usize, data: Vec<u8, RX_SIZE>) -> Self {
        Self {
            link_id,
            data,
            position: 0,
        }
    }

    /// Number of bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Copies as much unread data as fits into `buffer` and advances the read position
    fn read_into(&mut self, buffer: &mut [u8]) -> usize {
        let length = self.remaining().min(buffer.len());
        let end = self.position + length;

        buffer[..length].copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        length
    }
}

/// What happens to a received packet if the queue limits are reached
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// The new packet gets dropped, already buffered data is kept
    #[default]
    RejectNew,

    /// The oldest buffered packet of the same socket gets dropped in favour of the new one.
    /// If the queue is full with packets of other sockets, the oldest packet of the device is dropped.
    DropOldest,
}

/// Runtime limits of the packet queue
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueLimits {
    /// Max. number of buffered packets per socket
    pub max_packets_per_socket: usize,

    /// Applied when either the socket limit or the total queue capacity is reached
    pub policy: OverflowPolicy,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_packets_per_socket: usize::MAX,
            policy: OverflowPolicy::RejectNew,
        }
    }
}

/// Packet which got dropped due to a queue overflow
#[derive(Clone, Debug, PartialEq)]
pub struct Overflow {
    /// Link id of the dropped packet
    pub link_id: usize,

    /// Unread byte count of the dropped packet
    pub length: usize,
}

/// Device wide FIFO of received packets
#[derive(Default)]
pub struct PacketQueue<const RX_SIZE: usize, const QUEUE_DEPTH: usize> {
    /// Packets in order of arrival
    packets: Vec<Packet<RX_SIZE>, QUEUE_DEPTH>,

    limits: QueueLimits,
}

impl<const RX_SIZE: usize, const QUEUE_DEPTH: usize> PacketQueue<RX_SIZE, QUEUE_DEPTH> {
    pub fn new(limits: QueueLimits) -> Self {
        Self {
            packets: Vec::new(),
            limits,
        }
    }

    pub fn set_limits(&mut self, limits: QueueLimits) {
        self.limits = limits;
    }

    pub fn limits(&self) -> QueueLimits {
        self.limits
    }

    /// Appends the packet at the tail.
    ///
    /// Returns the packet dropped by the overflow policy, which may be the given one.
    pub fn enqueue(&mut self, packet: Packet<RX_SIZE>) -> Result<(), Overflow> {
        let socket_full = self.pending(packet.link_id) >= self.limits.max_packets_per_socket;
        let queue_full = self.packets.is_full();

        if !socket_full && !queue_full {
            return self.push(packet);
        }

        let rejected = Overflow {
            link_id: packet.link_id,
            length: packet.remaining(),
        };

        if self.limits.policy == OverflowPolicy::RejectNew || self.packets.is_empty() {
            return Err(rejected);
        }

        let victim = match (socket_full, self.position(packet.link_id)) {
            (true, Some(index)) => index,
            (true, None) => return Err(rejected),
            (false, _) => 0,
        };

        let dropped = self.packets.remove(victim);
        self.push(packet)?;

        Err(Overflow {
            link_id: dropped.link_id,
            length: dropped.remaining(),
        })
    }

    /// Copies the data of the oldest packet of the given socket into the buffer.
    ///
    /// If the packet does not fit, just the first `buffer.len()` bytes are returned and the remaining data
    /// stays at the front of the socket stream. Returns None if no data is buffered for the socket.
    pub fn read_into(&mut self, link_id: usize, buffer: &mut [u8]) -> Option<usize> {
        let index = self.position(link_id)?;
        let length = self.packets[index].read_into(buffer);

        if self.packets[index].remaining() == 0 {
            self.packets.remove(index);
        }

        Some(length)
    }

    /// Returns true if at least one packet of the given socket is buffered
    pub fn has_data(&self, link_id: usize) -> bool {
        self.position(link_id).is_some()
    }

    /// Number of buffered packets of the given socket
    pub fn pending(&self, link_id: usize) -> usize {
        self.packets.iter().filter(|packet| packet.link_id == link_id).count()
    }

    /// Number of unread bytes of the given socket
    pub fn pending_bytes(&self, link_id: usize) -> usize {
        self.packets
            .iter()
            .filter(|packet| packet.link_id == link_id)
            .map(Packet::remaining)
            .sum()
    }

    /// Total number of buffered packets
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Drops all packets of the given socket and returns the number of dropped packets
    pub fn discard(&mut self, link_id: usize) -> usize {
        let before = self.packets.len();
        self.packets.retain(|packet| packet.link_id != link_id);
        before - self.packets.len()
    }

    /// Drops all buffered packets
    pub fn clear(&mut self) {
        self.packets.clear();
    }

    fn position(&self, link_id: usize) -> Option<usize> {
        self.packets.iter().position(|packet| packet.link_id == link_id)
    }

    fn push(&mut self, packet: Packet<RX_SIZE>) -> Result<(), Overflow> {
        self.packets.push(packet).map_err(|packet| Overflow {
            link_id: packet.link_id,
            length: packet.remaining(),
        })
    }
}
