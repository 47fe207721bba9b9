//! Steve type stores: one authoritative client-side cache per resource type,
//! the decorated resources handed out from it, and the queue that batches
//! incoming watch events before they are applied.

#![forbid(unsafe_code)]

mod config;
mod find;
mod queue;
mod resource;
mod selector;
mod store;

pub use config::StoreConfig;
pub use find::{Collection, FindOpts, Scope, SortOrder};
pub use queue::EventQueue;
pub use resource::{state_of, Resource, ResourceState, SaveOpts, StateColor};
pub use selector::{LabelSelector, Requirement};
pub use store::{StoreEvent, TypeStore};
