//! Single-client request/response sessions over TCP.
//!
//! A server accepts one client at a time, greets it, acknowledges every
//! message, and goes back to accepting when the client leaves. Two reserved
//! messages drive the lifecycle: `qqq` ends the current session and `qqqs`
//! also stops the server. Modules, leaves first:
//!
//! - [`framing`] cuts a byte stream into messages, either by newline
//!   terminator or by whatever a single fixed-size read returns.
//! - [`endpoint`] owns one connection and its framing state, and reports a
//!   clean hangup as [`endpoint::Received::EndOfStream`] rather than an error.
//! - [`command`] decides, without doing any I/O, what a message means.
//! - [`server`] runs the accept loop and the per-client session.
//! - [`client`] connects, prints the greeting, and relays operator input.
//! - [`cli`] parses the command line for both modes.
//! - [`error`] holds the per-connection error type.
//!
//! Everything runs sequentially on a single task; only one connection is ever
//! in flight.

pub mod cli;
pub mod client;
pub mod command;
pub mod endpoint;
pub mod error;
pub mod framing;
pub mod server;
