//! HTTP surface of the dispatch platform.
//!
//! - `POST /api/locations` worker location ingestion (JWT)
//! - `POST /api/notifications/send` direct single send
//! - `POST /api/requests/intake` service request intake
//! - `GET  /health`

pub mod middleware;
pub mod routes;
pub mod state;
