//! Concrete wire codecs for the ARMI dispatch engine.
//!
//! Two formats are provided, both implementing [`armi::wire::Codec`]: [`tagged::TaggedCodec`],
//! a hand-rolled tagged binary format, and [`archive::ArchiveCodec`], a `serde`-driven binary
//! archive built on `bincode`. Either can be plugged into a [`armi::client::ClientContext`] or
//! [`armi::server::ServerContext`]; the dispatch engine itself never depends on either.

pub mod archive;
pub mod tagged;

pub use archive::ArchiveCodec;
pub use tagged::TaggedCodec;
