//! Reconciliation engine for GitHub organizations.
//!
//! The engine turns a desired-state document into GitHub mutations in three
//! stages, all stateless between invocations:
//!
//! 1. [`LiveStateFetcher`] builds the "what GitHub currently has" model over
//!    the REST, GraphQL and web channels;
//! 2. [`DiffEngine`] compares live and desired trees into a [`Plan`] of
//!    per-resource, per-field changes;
//! 3. [`Executor`] walks the plan in dependency order and issues the
//!    mutations, recording every entity's outcome independently.
//!
//! No state survives a run: live state is always re-fetched, and the only
//! cache is the in-run REST response cache inside the client.

pub mod errors;
pub use errors::{EngineError, EngineResult};

pub mod plan;
pub use plan::{ChangeAction, FieldDelta, Plan, PlanSummary, ResourceChange};

pub mod diff;
pub use diff::{DiffEngine, DiffOptions};

pub mod mapping;

pub mod fetcher;
pub use fetcher::{FetchOptions, LiveStateFetcher};

pub mod executor;
pub use executor::{
    EntityOutcome, ExecutionReport, Executor, ExecutorOptions, OutcomeStatus, RunOutcome,
};
