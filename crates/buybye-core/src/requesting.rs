//! The boundary concept: inbound calls become `request` occurrences, rules
//! answer them with `respond`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::concept::{arg_str, ActionSignature, Concept, ConceptFailure};
use crate::value::{Record, Value};

pub const NAME: &str = "Requesting";
pub const REQUEST: &str = "request";
pub const RESPOND: &str = "respond";

/// Mints a fresh request id per inbound call. Holds no state: correlation
/// lives in the run's log, where `respond` carries the id back.
#[derive(Debug, Default)]
pub struct Requesting;

impl Requesting {
    pub fn new() -> Self {
        Self
    }

    /// Strip the correlation id from a `respond` input record, leaving the
    /// payload the caller sees.
    pub fn payload_of(inputs: &Record) -> Record {
        let mut payload = inputs.clone();
        payload.remove(REQUEST);
        payload
    }
}

#[async_trait]
impl Concept for Requesting {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(NAME, REQUEST, &["path"], &["request"]),
            ActionSignature::action(NAME, RESPOND, &["request"], &["request"]),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            REQUEST => {
                arg_str(args, "path")?;
                let mut out = Record::new();
                out.insert(REQUEST.into(), Value::String(Uuid::new_v4().to_string()));
                Ok(out)
            }
            RESPOND => {
                let id = arg_str(args, REQUEST)?;
                let mut out = Record::new();
                out.insert(REQUEST.into(), Value::String(id.to_string()));
                Ok(out)
            }
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, _args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        Err(ConceptFailure::unknown_operation(NAME, query))
    }
}
