//! Domain layer modules
//!
//! This module contains cross-cutting domain logic:
//! - `changelog`: change-data-capture audit writes
//! - `events`: in-process domain event bus
//! - `ids`: bigint-as-string serde helpers
//! - `pagination`: page/limit parameters and the paged envelope

pub mod changelog;
pub mod events;
pub mod ids;
pub mod pagination;
