//! `buybye-core`: the synchronization engine.
//!
//! Independent concepts (wishlist items, swipes, queues, profiles, auth) never
//! call each other. Instead, every invocation becomes an [`Occurrence`] in a
//! per-request log, and declarative [`Sync`] rules join those occurrences,
//! refine the matches with read-only queries, and dispatch further actions.
//!
//! ```text
//! Requesting.request ──► OccurrenceLog ──► matcher (when) ──► Frames
//!        ▲                     ▲                                 │
//!        │                     │                                 ▼
//!   HTTP boundary              └──── dispatch (then) ◄── evaluator (where)
//!        ▲                                  │
//!        └────────── Requesting.respond ◄───┘
//! ```
//!
//! One [`Engine::handle_request`] call drives rounds until no rule produces a
//! new occurrence, then hands back the payload passed to `Requesting.respond`.

pub mod concept;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod log;
pub mod matcher;
pub mod passthrough;
pub mod pattern;
pub mod requesting;
pub mod sync;
pub mod value;

#[doc(hidden)]
pub use serde_json;

pub use concept::{
    ActionRef, ActionSignature, Concept, ConceptFailure, ConceptRegistry, OperationKind,
    QuerySource,
};
pub use config::{Config, ConfigWarning, EngineConfig, QueryErrorPolicy, WarnLevel};
pub use engine::{Engine, Firing, RequestOutcome, RunReport};
pub use error::{EngineError, Result};
pub use evaluator::Step;
pub use frame::{Frame, Frames, Var};
pub use log::{Occurrence, OccurrenceId, OccurrenceLog, Outcome};
pub use passthrough::{PassthroughTable, Route, RouteKind};
pub use pattern::{Pattern, Term};
pub use requesting::Requesting;
// `Sync` is the rule type; inside this crate the marker trait is spelled
// `std::marker::Sync`.
pub use sync::{Sync, SyncSet, Then, When};
pub use value::{Record, Value};
