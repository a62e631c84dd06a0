//! In-process domain event bus.
//!
//! Routes that mutate quality data publish events here; listeners keep the
//! denormalized test-runs view fresh and fan out notification rows. The bus
//! is process-local and best-effort by design.

mod bus;
mod types;

pub use bus::{EventBus, EventBusStats};
pub use types::DomainEvent;
