//! Concrete transport adapters binding `armi-core` contexts to real and in-memory byte
//! streams: a length-prefix [`framer`], a [`tcp`] adapter, an in-process [`duplex`] adapter
//! wrapping `tokio::io::duplex`, and an [`inproc`] adapter over plain channels for contexts
//! configured with `framing: false`.

pub mod config;
pub mod duplex;
pub mod framer;
pub mod inproc;
pub mod link;
pub mod tcp;
