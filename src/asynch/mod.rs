//! # Async network adapter
//!
//! Async counterpart of [wifi::Adapter](crate::wifi::Adapter) based on [atat::asynch::AtatClient].
//! Connections implement [embedded_io_async::Read] and [embedded_io_async::Write].
pub mod connection;
pub mod wifi;
