use atat::asynch::AtatClient;
use embassy_futures::{
    select::{select, Either},
    yield_now,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;

use crate::{
    commands::{CloseSocketCommand, TransmissionCommand, TransmissionPrepareCommand},
    stack::{ConnectionState, Error, Socket},
};

use super::wifi::InnerAdapter;

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::ReceiveTimeout => embedded_io::ErrorKind::TimedOut,
            Error::SocketUnconnected => embedded_io::ErrorKind::NotConnected,
            Error::ClosingSocket => embedded_io::ErrorKind::ConnectionReset,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

/// Open connection returned by [Adapter::connect()](super::wifi::Adapter::connect)
pub struct Connection<
    'inner,
    'urc_sub,
    A: AtatClient,
    const TX_SIZE: usize,
    const RX_SIZE: usize,
    const URC_CAPACITY: usize,
    const QUEUE_DEPTH: usize,
> {
    pub(crate) socket: Socket,
    pub(crate) inner:
        &'inner Mutex<CriticalSectionRawMutex, InnerAdapter<'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>>,
}

impl<
        'inner,
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > Connection<'inner, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    /// Link id used by the module for this connection
    pub fn link_id(&self) -> usize {
        self.socket.link_id
    }

    /// Returns true if received data is buffered
    pub async fn is_readable(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();
        inner.session.packets.has_data(self.socket.link_id)
    }

    /// Returns true if the connection is still open and the module is not rebooting
    pub async fn is_writable(&self) -> bool {
        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();
        inner.session.is_socket_writable(&self.socket)
    }

    /// Closes the connection. Received but not yet read data stays buffered.
    pub async fn close(self) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();

        if !inner.session.is_socket_connected(&self.socket) {
            inner.session.sockets[self.socket.link_id] = ConnectionState::Closed;
            return Ok(());
        }

        let result = inner.send_command(CloseSocketCommand::new(self.socket.link_id)).await;
        inner.session.sockets[self.socket.link_id] = ConnectionState::Closed;

        result?;
        Ok(())
    }
}

impl<
        'inner,
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > embedded_io::ErrorType for Connection<'inner, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    type Error = Error;
}

impl<
        'inner,
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > embedded_io_async::Read for Connection<'inner, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    /// Reads the oldest received packet, splitting it if it exceeds the buffer.
    /// Returns Ok(0) once the connection was closed by the remote side and all data was read.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let link_id = self.socket.link_id;
        let inner = self.inner;
        let timeout = inner.lock().await.timeout;

        let task = async {
            loop {
                {
                    let mut inner = inner.lock().await;
                    inner.process_urc_messages();

                    if let Some(length) = inner.session.packets.read_into(link_id, buf) {
                        return Ok(length);
                    }

                    if inner.session.sockets[link_id] != ConnectionState::Connected {
                        return Ok(0);
                    }
                }

                yield_now().await;
            }
        };

        match select(Timer::after(timeout), task).await {
            Either::First(_) => Err(Error::ReceiveTimeout),
            Either::Second(res) => res,
        }
    }
}

impl<
        'inner,
        'urc_sub,
        A: AtatClient,
        const TX_SIZE: usize,
        const RX_SIZE: usize,
        const URC_CAPACITY: usize,
        const QUEUE_DEPTH: usize,
    > embedded_io_async::Write for Connection<'inner, 'urc_sub, A, TX_SIZE, RX_SIZE, URC_CAPACITY, QUEUE_DEPTH>
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut inner = self.inner.lock().await;
        inner.process_urc_messages();
        inner.session.assert_socket_connected(&self.socket)?;

        for chunk in buf.chunks(TX_SIZE) {
            inner
                .send_command(TransmissionPrepareCommand::new(self.socket.link_id, chunk.len()))
                .await?;
            inner.send_command(TransmissionCommand::<TX_SIZE>::new(chunk)?).await?;
        }

        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
