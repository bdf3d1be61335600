//! Geospatial matching and notification fan-out.
//!
//! - [`geo_index`] finds active workers near a point, backed by [`geohash`]
//!   prefix lookups and exact [`distance`] re-filtering
//! - [`hygiene`] deactivates registrations whose tokens the provider rejected
//! - [`orchestrator`] drives the request-created and queue-drain entry points
//! - [`registry`] and [`retention`] maintain the worker location records
//! - [`store`] defines the repositories and their Postgres, Redis and
//!   in-memory implementations

pub mod distance;
pub mod error;
pub mod geo_index;
pub mod geohash;
pub mod hygiene;
pub mod orchestrator;
pub mod registry;
pub mod retention;
pub mod store;

pub use error::FanOutError;
pub use geo_index::{GeoIndex, NearbyWorker};
pub use hygiene::{HygieneReport, TokenHygieneService};
pub use orchestrator::FanOutOrchestrator;
pub use registry::{LocationRegistry, LocationUpdate};
pub use retention::RetentionSweep;
