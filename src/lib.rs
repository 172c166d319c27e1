//! # MXCHIP AT network layer client
//!
//! Client for MXCHIP WiFi modules driven by AT commands, based on [atat].
//!
//! Received socket data is delivered by the module as unsolicited messages. These are demultiplexed
//! into a bounded packet queue per socket, s. [packet]. WiFi events update the connectivity state, s. [event].
//!
//! Blocking adapter: [wifi::Adapter], async adapter: [asynch::wifi::Adapter]
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[cfg(test)]
extern crate alloc;

pub mod asynch;
pub(crate) mod commands;
pub mod event;
#[cfg(feature = "examples")]
pub mod example;
pub mod packet;
pub(crate) mod responses;
pub mod stack;
pub mod urc;
pub mod wifi;

#[cfg(test)]
mod tests;
