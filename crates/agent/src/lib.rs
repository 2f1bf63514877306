//! Session runtime around the resolution core
//!
//! - `catalog`: provider seam, atomically swapped index snapshots, background refresh
//! - `session`: session ids and the context store seam
//! - `runtime`: `ResolutionService::resolve(session_id, raw_query)`
//! - `fixtures`: demo catalog and acceptance conversations
//!
//! Resolution itself is synchronous and lives in `shelfbot-core`. This crate
//! only decides which catalog snapshot and which context a turn sees, and
//! keeps turns of one session in arrival order.

pub mod catalog;
pub mod fixtures;
pub mod runtime;
pub mod session;

pub use catalog::{
    CatalogHandle, CatalogProvider, CatalogRefresher, JsonFileCatalogProvider,
    StaticCatalogProvider,
};
pub use runtime::{ResolutionReport, ResolutionService};
pub use session::{InMemorySessionStore, SessionId, SessionStore, SessionStoreError};
