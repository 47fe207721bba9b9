//! Steve core types: the data model shared by the socket, store and connection crates.

#![forbid(unsafe_code)]

mod backend;
mod error;
mod path;
mod queue;
mod request;
mod resource;
mod schema;
mod watch;
mod wire;

pub use backend::Backend;
pub use error::{SteveError, SteveResult};
pub use path::lookup;
pub use queue::QueueAction;
pub use request::{HttpRequest, HttpResponse, Method, RequestOpts};
pub use resource::{join_id, parse_revision, resource_id, resource_version, split_id, Revision};
pub use schema::{FieldSpec, FieldType, Schema, SchemaAttributes};
pub use watch::{WatchDescriptor, WatchFrame, WatchKey};
pub use wire::{RawServerFrame, ServerMessage};

/// Type id of the schema collection itself.
pub const SCHEMA_TYPE: &str = "schema";

pub mod prelude {
    pub use super::{
        Backend, HttpResponse, Method, QueueAction, RequestOpts, Revision, Schema, ServerMessage,
        SteveError, SteveResult, WatchDescriptor, WatchKey,
    };
}
