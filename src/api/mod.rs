//! HTTP API layer.
//!
//! One router file per resource. Every handler follows the same shape:
//! validate the payload, scope the query by the caller's tenant, call the
//! store, and serialize the response with string IDs.

mod attachments;
mod audit;
mod bugs;
mod cases;
mod comments;
mod extract;
mod health;
mod integrations;
mod notifications;
mod plans;
mod projects;
mod repositories;
mod routes;
mod runs;
mod suites;
mod tenants;
mod tokens;
mod users;

pub use routes::{api_routes, public_routes};
