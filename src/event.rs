//! # Network state events
//!
//! The connectivity of the module is tracked as explicit [ConnectivityState]. State changes are derived
//! from command outcomes and from unsolicited WiFi events and are reported to an optional [EventSink].
//!
//! All unsolicited events are dispatched at a single point while processing URC messages. Therefore each
//! event reported by the module is delivered to the sink at most once, no matter whether the application
//! is waiting for it by [handle_event()](crate::wifi::WifiAdapter::handle_event) or not.
//!
//! ## Example
//!
//! ````
//! # use core::cell::Cell;
//! # use mxchip_at_nal::event::{ConnectivityState, EventSink, StateChange};
//! # use mxchip_at_nal::example::{ExampleAtClient as AtClient, ExampleTimer};
//! # use mxchip_at_nal::wifi::{Adapter, WifiAdapter};
//! #
//! #[derive(Default)]
//! struct Recorder {
//!     last: Cell<Option<ConnectivityState>>,
//! }
//!
//! impl EventSink for Recorder {
//!     fn on_state_change(&self, change: StateChange) {
//!         self.last.set(Some(change.current));
//!     }
//! }
//!
//! let channel = AtClient::urc_channel();
//! let client = AtClient::init(&channel);
//! let recorder = Recorder::default();
//!
//! let mut adapter: Adapter<_, _, 1_000_000, 256, 128, 8, 4> =
//!     Adapter::new(client, channel.subscriber().unwrap(), ExampleTimer::default());
//! adapter.attach(&recorder);
//!
//! adapter.join("test_wifi", "secret").unwrap();
//! assert_eq!(Some(ConnectivityState::Associated), recorder.last.get());
//! ````
use heapless::String;

/// Max. length of the text of a WiFi event
pub const EVENT_TEXT_LEN: usize = 32;

/// Connectivity of the module to an access point
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum ConnectivityState {
    /// Not joined to any access point
    #[default]
    Disassociated,

    /// Join was requested and accepted, waiting for the station to come up
    Associating,

    /// Station is up
    Associated,

    /// Module is restarting
    Rebooting,
}

/// Inputs of the connectivity state machine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Join command was accepted by the module
    JoinAccepted,

    /// Join command failed
    JoinRejected,

    /// Module reported that the station is up
    StationUp,

    /// Module reported that the station is down
    StationDown,

    /// Leave command was accepted by the module
    LeaveAccepted,

    /// Restart or factory reset was requested
    RestartRequested,

    /// Module did not report the reboot after a requested restart
    RestartFailed,

    /// Module reported a reboot
    Rebooted,
}

impl ConnectivityState {
    /// Returns the state following on the given trigger
    pub fn transition(self, trigger: Trigger) -> Self {
        match (self, trigger) {
            (_, Trigger::RestartRequested) => Self::Rebooting,
            (_, Trigger::Rebooted) | (_, Trigger::RestartFailed) => Self::Disassociated,
            (Self::Rebooting, _) => Self::Rebooting,
            (_, Trigger::StationUp) => Self::Associated,
            (_, Trigger::StationDown) | (_, Trigger::LeaveAccepted) => Self::Disassociated,
            (Self::Associated, Trigger::JoinAccepted) => Self::Associated,
            (_, Trigger::JoinAccepted) => Self::Associating,
            (Self::Associating, Trigger::JoinRejected) => Self::Disassociated,
            (state, Trigger::JoinRejected) => state,
        }
    }
}

/// Change of the connectivity state passed to the [EventSink]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectivityState,
    pub current: ConnectivityState,

    /// Cause of the change
    pub trigger: Trigger,
}

/// Receiver of network state changes
pub trait EventSink {
    /// Gets called whenever the connectivity state has changed or the module rebooted
    fn on_state_change(&self, change: StateChange);
}

/// Unsolicited WiFi events which can be awaited by `handle_event()`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Station connected to the access point
    StationUp,

    /// Station lost the connection
    StationDown,

    /// Module rebooted
    Reboot,
}

impl EventKind {
    pub(crate) const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        match self {
            EventKind::StationUp => 0,
            EventKind::StationDown => 1,
            EventKind::Reboot => 2,
        }
    }

    /// Maps the text of a `+WEVENT:<TEXT>` message
    pub(crate) fn from_text(text: &str) -> Option<Self> {
        match text {
            "STATION_UP" => Some(Self::StationUp),
            "STATION_DOWN" => Some(Self::StationDown),
            "REBOOT" => Some(Self::Reboot),
            _ => None,
        }
    }

    pub(crate) fn trigger(self) -> Trigger {
        match self {
            EventKind::StationUp => Trigger::StationUp,
            EventKind::StationDown => Trigger::StationDown,
            EventKind::Reboot => Trigger::Rebooted,
        }
    }
}

/// Errors when waiting for an event
#[derive(Clone, Debug, PartialEq)]
pub enum EventError {
    /// Event was not observed within the timeout
    Timeout,

    /// Upstream timer error
    TimerError,
}

/// Last observed occurrence of a single event kind
#[derive(Clone, Debug, Default)]
pub(crate) struct EventRecord {
    /// Incremented on every dispatched event, used to tell apart events already observed by a waiter
    pub(crate) sequence: u32,

    /// Text of the last event
    pub(crate) text: String<EVENT_TEXT_LEN>,
}

/// Connectivity state and event bookkeeping of a session
#[derive(Clone, Debug, Default)]
pub(crate) struct EventLog {
    pub(crate) state: ConnectivityState,

    records: [EventRecord; EventKind::COUNT],
}

impl EventLog {
    /// Applies the trigger and informs the sink if the state changed. Reboots are always reported.
    pub(crate) fn apply(&mut self, trigger: Trigger, sink: Option<&dyn EventSink>) {
        let previous = self.state;
        self.state = previous.transition(trigger);

        if previous == self.state && trigger != Trigger::Rebooted {
            return;
        }

        log::debug!("Connectivity {:?} -> {:?} ({:?})", previous, self.state, trigger);

        if let Some(sink) = sink {
            sink.on_state_change(StateChange {
                previous,
                current: self.state,
                trigger,
            });
        }
    }

    /// Records the event and applies the related transition
    pub(crate) fn dispatch(&mut self, kind: EventKind, text: &str, sink: Option<&dyn EventSink>) {
        let record = &mut self.records[kind.index()];
        record.sequence = record.sequence.wrapping_add(1);
        record.text.clear();
        for c in text.chars() {
            if record.text.push(c).is_err() {
                break;
            }
        }

        self.apply(kind.trigger(), sink);
    }

    pub(crate) fn sequence(&self, kind: EventKind) -> u32 {
        self.records[kind.index()].sequence
    }

    pub(crate) fn text(&self, kind: EventKind) -> String<EVENT_TEXT_LEN> {
        self.records[kind.index()].text.clone()
    }
}
