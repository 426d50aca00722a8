//! Clock-injectable temporal query harness with randomized fixtures.
//!
//! Dependency order (leaves first):
//!   clock → calendar → scope → fixture → harness
//!
//! `store` is the SQLite mirror used to check that a storage-backed scope
//! agrees with the in-memory `scope::filter`.

pub mod calendar;
pub mod clock;
pub mod config;
pub mod error;
pub mod fixture;
pub mod harness;
pub mod name_generator;
pub mod rng;
pub mod scope;
pub mod store;
pub mod types;

pub use calendar::CalendarRange;
pub use clock::Clock;
pub use error::{HarnessError, HarnessResult};
pub use fixture::{AttributeSpec, FixtureDefinition, FixtureRegistry, Overrides};
pub use harness::{Harness, Scenario, ScenarioReport};
pub use scope::{Scope, ScopeBackend};
pub use types::{AttrValue, Instant, Record, RecordId};
