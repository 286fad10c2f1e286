//! The uniform contract every concept exposes to the engine.
//!
//! A concept owns private state and publishes named operations. Actions
//! mutate and return one record; queries only read and return zero or more
//! rows. Either kind may fail with a [`ConceptFailure`], which the engine
//! surfaces as an `{error: reason}` record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{EngineError, Result};
use crate::value::Record;

// ---------------------------------------------------------------------------
// ActionRef
// ---------------------------------------------------------------------------

/// Identifies one concept operation, e.g. `UserAuth.login`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionRef {
    pub concept: String,
    pub name: String,
}

impl ActionRef {
    pub fn new(concept: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.concept, self.name)
    }
}

/// `"Concept.name"` shorthand used by rule declarations. A string without a
/// dot yields an empty concept name, which registration rejects.
impl From<&str> for ActionRef {
    fn from(s: &str) -> Self {
        match s.split_once('.') {
            Some((concept, name)) => Self::new(concept, name),
            None => Self::new("", s),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionSignature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Action,
    Query,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Action => write!(f, "action"),
            OperationKind::Query => write!(f, "query"),
        }
    }
}

/// Declared shape of an operation. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSignature {
    pub action: ActionRef,
    pub kind: OperationKind,
    pub inputs: Vec<String>,
    /// Success fields. The failure shape is always the single field `error`.
    pub outputs: Vec<String>,
}

impl ActionSignature {
    pub fn action(concept: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self::build(OperationKind::Action, concept, name, inputs, outputs)
    }

    pub fn query(concept: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self::build(OperationKind::Query, concept, name, inputs, outputs)
    }

    fn build(
        kind: OperationKind,
        concept: &str,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Self {
        Self {
            action: ActionRef::new(concept, name),
            kind,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConceptFailure
// ---------------------------------------------------------------------------

/// The `{error: reason}` result of a concept operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConceptFailure(pub String);

impl ConceptFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn unknown_operation(concept: &str, name: &str) -> Self {
        Self(format!("{concept} has no operation named '{name}'"))
    }

    /// A required argument was absent or had the wrong type.
    pub fn bad_argument(name: &str) -> Self {
        Self(format!("missing or invalid argument '{name}'"))
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Concept
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Concept: Send + Sync {
    /// Registry key, also the first segment of every `ActionRef`.
    fn name(&self) -> &str;

    fn signatures(&self) -> Vec<ActionSignature>;

    async fn perform(&self, action: &str, args: &Record) -> std::result::Result<Record, ConceptFailure>;

    async fn query(
        &self,
        query: &str,
        args: &Record,
    ) -> std::result::Result<Vec<Record>, ConceptFailure>;
}

/// Read-only view over the registered concepts.
///
/// `where` clauses receive only this, so rule refinement cannot mutate state.
#[async_trait]
pub trait QuerySource: Send + Sync {
    async fn query(
        &self,
        action: &ActionRef,
        args: &Record,
    ) -> std::result::Result<Vec<Record>, ConceptFailure>;
}

// ---------------------------------------------------------------------------
// ConceptRegistry
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
pub struct ConceptRegistry {
    concepts: BTreeMap<String, Arc<dyn Concept>>,
    signatures: HashMap<ActionRef, ActionSignature>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, concept: Arc<dyn Concept>) -> Result<()> {
        let name = concept.name().to_string();
        if self.concepts.contains_key(&name) {
            return Err(EngineError::DuplicateConcept(name));
        }
        for sig in concept.signatures() {
            self.signatures.insert(sig.action.clone(), sig);
        }
        tracing::debug!(concept = %name, "registered concept");
        self.concepts.insert(name, concept);
        Ok(())
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, concept: Arc<dyn Concept>) -> Result<Self> {
        self.register(concept)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Concept>> {
        self.concepts.get(name)
    }

    pub fn concept_names(&self) -> impl Iterator<Item = &str> {
        self.concepts.keys().map(|k| k.as_str())
    }

    pub fn signature(&self, action: &ActionRef) -> Option<&ActionSignature> {
        self.signatures.get(action)
    }

    /// All signatures, ordered by concept then operation name.
    pub fn signatures(&self) -> Vec<&ActionSignature> {
        let mut all: Vec<_> = self.signatures.values().collect();
        all.sort_by(|a, b| a.action.cmp(&b.action));
        all
    }

    /// Look up a signature, distinguishing an unknown concept from an
    /// unknown operation on a known concept.
    pub fn resolve(&self, action: &ActionRef) -> Result<&ActionSignature> {
        if !self.concepts.contains_key(&action.concept) {
            return Err(EngineError::UnknownConcept(action.concept.clone()));
        }
        self.signatures
            .get(action)
            .ok_or_else(|| EngineError::UnknownAction(action.to_string()))
    }

    /// Invoke an action. Unknown targets come back as a failure record so
    /// they flow through the log like any other concept error.
    pub async fn perform(
        &self,
        action: &ActionRef,
        args: &Record,
    ) -> std::result::Result<Record, ConceptFailure> {
        let concept = self
            .concepts
            .get(&action.concept)
            .ok_or_else(|| ConceptFailure::unknown_operation(&action.concept, &action.name))?;
        concept.perform(&action.name, args).await
    }
}

#[async_trait]
impl QuerySource for ConceptRegistry {
    async fn query(
        &self,
        action: &ActionRef,
        args: &Record,
    ) -> std::result::Result<Vec<Record>, ConceptFailure> {
        match self.signatures.get(action) {
            Some(sig) if sig.kind == OperationKind::Query => {}
            Some(_) => {
                return Err(ConceptFailure::new(format!("{action} is not a query")));
            }
            None => {
                return Err(ConceptFailure::unknown_operation(
                    &action.concept,
                    &action.name,
                ))
            }
        }
        let concept = self
            .concepts
            .get(&action.concept)
            .ok_or_else(|| ConceptFailure::unknown_operation(&action.concept, &action.name))?;
        concept.query(&action.name, args).await
    }
}

// ---------------------------------------------------------------------------
// Argument helpers for concept implementations
// ---------------------------------------------------------------------------

pub fn arg_str<'a>(args: &'a Record, name: &str) -> std::result::Result<&'a str, ConceptFailure> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ConceptFailure::bad_argument(name))
}

pub fn arg_f64(args: &Record, name: &str) -> std::result::Result<f64, ConceptFailure> {
    args.get(name)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| ConceptFailure::bad_argument(name))
}

pub fn arg_opt_str<'a>(args: &'a Record, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted concept used by engine tests.

    use super::*;
    use std::sync::Mutex;

    type ActionFn = Box<dyn Fn(&Record) -> std::result::Result<Record, ConceptFailure> + Send + Sync>;
    type QueryFn =
        Box<dyn Fn(&Record) -> std::result::Result<Vec<Record>, ConceptFailure> + Send + Sync>;

    pub struct Scripted {
        name: String,
        actions: HashMap<String, ActionFn>,
        queries: HashMap<String, QueryFn>,
        pub calls: Mutex<Vec<(String, Record)>>,
    }

    impl Scripted {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                actions: HashMap::new(),
                queries: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn action(
            mut self,
            name: &str,
            f: impl Fn(&Record) -> std::result::Result<Record, ConceptFailure> + Send + Sync + 'static,
        ) -> Self {
            self.actions.insert(name.to_string(), Box::new(f));
            self
        }

        pub fn query(
            mut self,
            name: &str,
            f: impl Fn(&Record) -> std::result::Result<Vec<Record>, ConceptFailure>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.queries.insert(name.to_string(), Box::new(f));
            self
        }

        pub fn call_count(&self, name: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(n, _)| n == name)
                .count()
        }
    }

    #[async_trait]
    impl Concept for Scripted {
        fn name(&self) -> &str {
            &self.name
        }

        fn signatures(&self) -> Vec<ActionSignature> {
            let mut sigs: Vec<_> = self
                .actions
                .keys()
                .map(|a| ActionSignature::action(&self.name, a, &[], &[]))
                .collect();
            sigs.extend(
                self.queries
                    .keys()
                    .map(|q| ActionSignature::query(&self.name, q, &[], &[])),
            );
            sigs
        }

        async fn perform(
            &self,
            action: &str,
            args: &Record,
        ) -> std::result::Result<Record, ConceptFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((action.to_string(), args.clone()));
            match self.actions.get(action) {
                Some(f) => f(args),
                None => Err(ConceptFailure::unknown_operation(&self.name, action)),
            }
        }

        async fn query(
            &self,
            query: &str,
            args: &Record,
        ) -> std::result::Result<Vec<Record>, ConceptFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), args.clone()));
            match self.queries.get(query) {
                Some(f) => f(args),
                None => Err(ConceptFailure::unknown_operation(&self.name, query)),
            }
        }
    }
}
