//! The `then` phase: turn surviving frames into concept invocations.

use futures::future::join_all;

use crate::concept::{ActionRef, ConceptRegistry};
use crate::error::{EngineError, Result};
use crate::frame::Frame;
use crate::log::Outcome;
use crate::sync::Then;
use crate::value::Record;

/// One frame's worth of work: every `then` template of one rule.
pub struct Job<'a> {
    pub sync: &'a str,
    pub then: &'a [Then],
    pub frame: Frame,
}

/// A completed invocation, not yet in the log.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub action: ActionRef,
    pub inputs: Record,
    pub outcome: Outcome,
}

/// Run one job's templates in declaration order.
pub async fn dispatch_frame(registry: &ConceptRegistry, job: &Job<'_>) -> Result<Vec<Dispatched>> {
    let mut out = Vec::with_capacity(job.then.len());
    for then in job.then {
        let inputs = then
            .args
            .instantiate(&job.frame)
            .map_err(|var| EngineError::UnboundVariable {
                sync: job.sync.to_string(),
                var: var.to_string(),
            })?;
        let outcome: Outcome = registry.perform(&then.action, &inputs).await.into();
        if let Outcome::Error { error } = &outcome {
            tracing::debug!(sync = job.sync, action = %then.action, error = %error, "action failed");
        }
        out.push(Dispatched {
            action: then.action.clone(),
            inputs,
            outcome,
        });
    }
    Ok(out)
}

/// Run all jobs concurrently. Results come back grouped per job, in job
/// order, only once every job has returned.
pub async fn dispatch_all(
    registry: &ConceptRegistry,
    jobs: &[Job<'_>],
) -> Result<Vec<Vec<Dispatched>>> {
    join_all(jobs.iter().map(|job| dispatch_frame(registry, job)))
        .await
        .into_iter()
        .collect()
}
