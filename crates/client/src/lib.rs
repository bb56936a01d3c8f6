//! # Pivot Client
//!
//! Socket-backed client for one pivot view's data: submits a JAQL query
//! over a persistent connection, assembles the ordered chunk stream into
//! row/column trees, and supports cancellation, resubmission on sort
//! changes, and "load more" pagination without re-fetching loaded data.
//!
//! ## Architecture
//!
//! ```text
//! PivotDataBuilder ── config validation, sorting settings, resubmission
//!     │
//!     └──> QueryClient ── one lazy connection, result cache, events
//!            │
//!            └──> DataLoadService ── session state machine,
//!                   │                at-most-one-in-flight, cancellation
//!                   ├──> StreamOrder (pivot-protocol) ── order gate
//!                   ├──> ResponseProcessor (pivot-processor) ── chunk → tree
//!                   └──> PivotTreeModel (pivot-tree) ── per-session trees
//! ```

mod auth;
mod builder;
mod cache;
mod client;
mod error;
mod events;
mod service;
mod session;
pub mod test_support;
mod transport;

pub use auth::{Authenticator, NoAuth, StaticTokenAuth};
pub use builder::{PivotConfig, PivotDataBuilder};
pub use client::QueryClient;
pub use error::{LoadError, Result};
pub use events::PivotEvent;
pub use service::{AddMoreData, DataLoadService, QueryResultData};
pub use session::{new_query_guid, QuerySession, SessionState};
pub use transport::{SocketTransport, TransportConnector, TransportError};
