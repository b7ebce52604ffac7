//! Asynchronous remote method invocation (ARMI) dispatch engine.
//!
//! This crate implements the request/reply core that sits between a generated proxy/stub
//! layer and an untyped byte-oriented duplex transport: [`client::ClientContext`] issues
//! requests and correlates replies; [`server::ServerContext`] decodes requests and dispatches
//! to [`server::InterfaceStub`]s; [`channel_manager::ChannelManager`] tracks connection
//! lifecycle for both sides. The wire codec ([`wire::Codec`]) and the transport
//! ([`transport::ChannelWriter`], [`transport::Scheduler`]) are abstract here; concrete
//! implementations live in the `armi-codec` and `armi-transport` crates.

pub mod category;
pub mod channel_manager;
pub mod client;
pub mod config;
pub mod error;
pub mod reply;
pub mod server;
pub mod testutil;
pub mod transport;
pub mod types;
pub mod wire;

pub use category::{CategoryRegistry, ErrorCategory};
pub use client::{ClientContext, ClientContextBuilder};
pub use config::Config;
pub use error::{Error, ErrorKind};
pub use server::{InterfaceStub, ServerContext, ServerContextBuilder};
pub use types::{ChannelId, InterfaceId, MethodId, RawReply, ReplyKind, RequestId, INVALID_CHANNEL_ID};
pub use wire::Codec;
