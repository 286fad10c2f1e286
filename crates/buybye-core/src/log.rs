//! Append-only occurrence log, scoped to one request's run.

use serde::Serialize;

use crate::concept::{ActionRef, ConceptFailure};
use crate::value::{Record, Value};

/// Insertion index within one run's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OccurrenceId(pub usize);

/// What an invocation returned. Serializes as the record a rule sees:
/// the success fields, or `{error: reason}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Success(Record),
    Error { error: String },
}

impl Outcome {
    pub fn error(reason: impl Into<String>) -> Self {
        Outcome::Error {
            error: reason.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error { .. })
    }

    pub fn to_record(&self) -> Record {
        match self {
            Outcome::Success(r) => r.clone(),
            Outcome::Error { error } => {
                let mut r = Record::new();
                r.insert("error".into(), Value::String(error.clone()));
                r
            }
        }
    }
}

impl From<Result<Record, ConceptFailure>> for Outcome {
    fn from(result: Result<Record, ConceptFailure>) -> Self {
        match result {
            Ok(r) => Outcome::Success(r),
            Err(e) => Outcome::error(e.0),
        }
    }
}

/// One realized invocation. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Occurrence {
    pub id: OccurrenceId,
    pub action: ActionRef,
    pub inputs: Record,
    pub outputs: Outcome,
}

impl Occurrence {
    pub fn is_error(&self) -> bool {
        self.outputs.is_error()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outputs {
            Outcome::Error { error } => Some(error),
            Outcome::Success(_) => None,
        }
    }

    pub fn input(&self, field: &str) -> Option<&Value> {
        self.inputs.get(field)
    }

    pub fn output(&self, field: &str) -> Option<&Value> {
        match &self.outputs {
            Outcome::Success(r) => r.get(field),
            Outcome::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OccurrenceLog {
    entries: Vec<Occurrence>,
}

impl OccurrenceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, action: ActionRef, inputs: Record, outputs: Outcome) -> OccurrenceId {
        let id = OccurrenceId(self.entries.len());
        self.entries.push(Occurrence {
            id,
            action,
            inputs,
            outputs,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: OccurrenceId) -> Option<&Occurrence> {
        self.entries.get(id.0)
    }

    pub fn entries(&self) -> &[Occurrence] {
        &self.entries
    }

    /// Entries appended at or after `mark` (a previous `len()`).
    pub fn since(&self, mark: usize) -> &[Occurrence] {
        self.entries.get(mark..).unwrap_or(&[])
    }

    pub fn of<'a>(&'a self, action: &'a ActionRef) -> impl Iterator<Item = &'a Occurrence> + 'a {
        self.entries.iter().filter(move |o| &o.action == action)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Occurrence> {
        self.entries.iter()
    }
}
