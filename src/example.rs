//! Mocks for doc examples
use crate::urc::URCMessages;
use atat::blocking::AtatClient;
use atat::{AtatCmd, AtatUrc, Error};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{PubSubChannel, Publisher};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;

/// ATAT client mock
pub struct ExampleAtClient<'a> {
    /// URC publisher used for statically mocking URC messages
    urc_publisher: Publisher<'a, CriticalSectionRawMutex, URCMessages<128>, 8, 1, 1>,
}

impl<'a> ExampleAtClient<'a> {
    pub fn urc_channel() -> PubSubChannel<CriticalSectionRawMutex, URCMessages<128>, 8, 1, 1> {
        PubSubChannel::new()
    }

    pub fn init(channel: &'a PubSubChannel<CriticalSectionRawMutex, URCMessages<128>, 8, 1, 1>) -> Self {
        Self {
            urc_publisher: channel.publisher().unwrap(),
        }
    }

    fn publish_urc(&self, message: &[u8]) {
        let message = <URCMessages<128> as AtatUrc>::parse(message).unwrap();
        self.urc_publisher.try_publish(message).unwrap();
    }
}

impl AtatClient for ExampleAtClient<'_> {
    fn send<A: AtatCmd>(&mut self, cmd: &A) -> Result<A::Response, Error> {
        let mut buffer = [0x0; 128];
        let length = cmd.write(&mut buffer);

        let response: &[u8] = match &buffer[..length] {
            b"AT+WJAP=test_wifi,secret\r\n" => {
                self.publish_urc(b"+WEVENT:STATION_UP\r\n");
                b""
            }
            b"hallo!" => {
                self.publish_urc(b"+CIPEVENT:SOCKET,0,16,nice to see you!");
                b""
            }
            b"AT+REBOOT\r\n" => {
                self.publish_urc(b"+WEVENT:REBOOT\r\n");
                b""
            }
            b"AT+IPCONFIG\r\n" => b"+IPCONFIG:DHCP,10.0.0.181,255.255.255.0,10.0.0.1,10.0.0.1",
            b"AT+WMAC?\r\n" => b"+WMAC:10:fe:ed:05:ba:50",
            b"AT+WLINK?\r\n" => b"+WLINK:10:fe:ed:05:ba:01,-52,6",
            &_ => b"",
        };

        cmd.parse(Ok(response)).map_err(|_| Error::Error)
    }
}

/// Timer mock
#[derive(Default)]
pub struct ExampleTimer {}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1000000> {
        unimplemented!()
    }

    fn start(&mut self, _duration: TimerDurationU32<1000000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        unimplemented!()
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
