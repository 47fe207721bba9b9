//! Steve connection manager.
//!
//! A [`Connection`] owns the schema registry, one [`steve_store::TypeStore`] per
//! type, the watch bookkeeping for the subscribe socket and the event queue
//! that batches incoming changes before they reach the stores.

#![forbid(unsafe_code)]

mod config;
mod connection;
mod http;
pub mod mock;
mod transport;

pub use config::{ConnectionConfig, DEFAULT_BASE_URL};
pub use connection::{Connection, ConnectionEvent};
pub use http::{resolve_url, HttpClient, ReqwestHttp};
pub use transport::Transport;
