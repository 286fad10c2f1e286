//! The `where` phase: read-only refinement of a rule's frame-set.
//!
//! Steps run left to right over the whole set. Query-backed steps call the
//! concept once per frame (concurrently), through a [`QuerySource`], so they
//! can never reach a mutating action.

use futures::future::join_all;
use std::fmt;
use std::sync::Arc;

use crate::concept::{ActionRef, QuerySource};
use crate::config::QueryErrorPolicy;
use crate::error::{EngineError, Result};
use crate::frame::{Frame, Frames, Var};
use crate::pattern::{Pattern, Term};
use crate::value::{Record, Value};

// ---------------------------------------------------------------------------
// Closures carried by steps
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FramePredicate(Arc<dyn Fn(&Frame) -> bool + Send + Sync>);

impl FramePredicate {
    pub fn new(f: impl Fn(&Frame) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, frame: &Frame) -> bool {
        (self.0)(frame)
    }
}

impl fmt::Debug for FramePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FramePredicate(..)")
    }
}

#[derive(Clone)]
pub struct FrameDerivation(Arc<dyn Fn(&Frame) -> Option<Value> + Send + Sync>);

impl FrameDerivation {
    pub fn new(f: impl Fn(&Frame) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn compute(&self, frame: &Frame) -> Option<Value> {
        (self.0)(frame)
    }
}

impl fmt::Debug for FrameDerivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FrameDerivation(..)")
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Step {
    /// Inner join: one output frame per row; zero rows drop the frame.
    Query {
        action: ActionRef,
        input: Pattern,
        output: Pattern,
    },
    /// Left join: zero matching rows keep the frame with `defaults` bound.
    Optional {
        action: ActionRef,
        input: Pattern,
        output: Pattern,
        defaults: Vec<(Var, Value)>,
    },
    /// Anti-join: the frame survives only if the query yields no rows.
    Absent { action: ActionRef, input: Pattern },
    Filter {
        label: String,
        predicate: FramePredicate,
    },
    Derive {
        var: Var,
        derive: FrameDerivation,
    },
    CollectAs { fields: Vec<Var>, into: Var },
}

impl Step {
    /// The query this step calls, if any.
    pub fn queried(&self) -> Option<&ActionRef> {
        match self {
            Step::Query { action, .. } | Step::Optional { action, .. } | Step::Absent { action, .. } => {
                Some(action)
            }
            _ => None,
        }
    }

    /// Variables that must already be bound when the step runs.
    pub fn reads(&self) -> Vec<&Var> {
        match self {
            Step::Query { input, .. } | Step::Optional { input, .. } | Step::Absent { input, .. } => {
                input.vars_used().collect()
            }
            Step::CollectAs { fields, .. } => fields.iter().collect(),
            Step::Filter { .. } | Step::Derive { .. } => Vec::new(),
        }
    }

    /// Variables the step may add to a surviving frame.
    pub fn binds(&self) -> Vec<Var> {
        match self {
            Step::Query { output, .. } => output_binds(output),
            Step::Optional {
                output, defaults, ..
            } => output_binds(output)
                .into_iter()
                .chain(defaults.iter().map(|(v, _)| v.clone()))
                .collect(),
            Step::Derive { var, .. } => vec![var.clone()],
            Step::CollectAs { into, .. } => vec![into.clone()],
            Step::Absent { .. } | Step::Filter { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Query {
                action,
                input,
                output,
            } => write!(f, "query {action} {} -> {}", input.describe(), output.describe()),
            Step::Optional {
                action,
                input,
                output,
                ..
            } => write!(
                f,
                "optional {action} {} -> {}",
                input.describe(),
                output.describe()
            ),
            Step::Absent { action, input } => write!(f, "absent {action} {}", input.describe()),
            Step::Filter { label, .. } => write!(f, "filter {label}"),
            Step::Derive { var, .. } => write!(f, "derive {var}"),
            Step::CollectAs { fields, into } => {
                let names: Vec<&str> = fields.iter().map(|v| v.as_str()).collect();
                write!(f, "collect [{}] as {into}", names.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct Evaluator<'a> {
    source: &'a dyn QuerySource,
    policy: QueryErrorPolicy,
}

impl<'a> Evaluator<'a> {
    pub fn new(source: &'a dyn QuerySource, policy: QueryErrorPolicy) -> Self {
        Self { source, policy }
    }

    /// Run every step in order. Stops early once no frame is left.
    pub async fn evaluate(&self, steps: &[Step], frames: Frames) -> Result<Frames> {
        let mut frames = frames;
        for step in steps {
            if frames.is_empty() {
                break;
            }
            frames = self.apply(step, frames).await?;
        }
        Ok(frames)
    }

    pub async fn apply(&self, step: &Step, frames: Frames) -> Result<Frames> {
        match step {
            Step::Query {
                action,
                input,
                output,
            } => {
                self.per_frame(&frames, |frame| self.join(action, input, output, frame, None))
                    .await
            }
            Step::Optional {
                action,
                input,
                output,
                defaults,
            } => {
                self.per_frame(&frames, |frame| {
                    self.join(action, input, output, frame, Some(defaults))
                })
                .await
            }
            Step::Absent { action, input } => {
                self.per_frame(&frames, |frame| self.anti_join(action, input, frame))
                    .await
            }
            Step::Filter { predicate, .. } => Ok(frames.filter(|f| predicate.test(f))),
            Step::Derive { var, derive } => Ok(frames
                .into_iter()
                .filter_map(|f| derive.compute(&f).and_then(|v| f.bind(var, &v)))
                .collect()),
            Step::CollectAs { fields, into } => Ok(frames.collect_as(fields, into)),
        }
    }

    /// Run `f` for every frame concurrently and concatenate, keeping the
    /// input order of frames.
    async fn per_frame<'f, F, Fut>(&self, frames: &'f Frames, f: F) -> Result<Frames>
    where
        F: Fn(&'f Frame) -> Fut,
        Fut: std::future::Future<Output = Result<Vec<Frame>>>,
    {
        let results = join_all(frames.iter().map(f)).await;
        let mut out = Frames::new();
        for r in results {
            out.extend(r?);
        }
        Ok(out)
    }

    async fn join(
        &self,
        action: &ActionRef,
        input: &Pattern,
        output: &Pattern,
        frame: &Frame,
        defaults: Option<&Vec<(Var, Value)>>,
    ) -> Result<Vec<Frame>> {
        let (rest, error_term) = output.split_error();
        let args = instantiate(action, input, frame)?;

        let matched: Vec<Frame> = match (self.source.query(action, &args).await, &error_term) {
            (Ok(rows), None) => rows.iter().filter_map(|row| rest.matches(row, frame)).collect(),
            // An `error` pattern matches failures only.
            (Ok(_), Some(_)) => Vec::new(),
            (Err(failure), Some(term)) => {
                return Ok(bind_error(term, failure.reason(), frame).into_iter().collect());
            }
            (Err(failure), None) => {
                self.on_failure(action, failure.reason())?;
                Vec::new()
            }
        };

        match defaults {
            Some(defaults) if matched.is_empty() => {
                let mut next = frame.clone();
                for (var, value) in defaults {
                    if !next.unify(var, value) {
                        return Ok(Vec::new());
                    }
                }
                Ok(vec![next])
            }
            _ => Ok(matched),
        }
    }

    async fn anti_join(
        &self,
        action: &ActionRef,
        input: &Pattern,
        frame: &Frame,
    ) -> Result<Vec<Frame>> {
        let args = instantiate(action, input, frame)?;
        let keep = match self.source.query(action, &args).await {
            Ok(rows) => rows.is_empty(),
            Err(failure) => {
                self.on_failure(action, failure.reason())?;
                true
            }
        };
        Ok(if keep { vec![frame.clone()] } else { Vec::new() })
    }

    /// A failed query that the step does not bind `error` for.
    fn on_failure(&self, action: &ActionRef, reason: &str) -> Result<()> {
        match self.policy {
            QueryErrorPolicy::Absorb => {
                tracing::debug!(query = %action, reason, "query failed; treated as no rows");
                Ok(())
            }
            QueryErrorPolicy::Fail => Err(EngineError::QueryFailed {
                action: action.to_string(),
                reason: reason.to_string(),
            }),
        }
    }
}

/// A pattern naming `error` binds only the error; the rest of it never
/// applies because the step matches failures only.
fn output_binds(output: &Pattern) -> Vec<Var> {
    match output.split_error() {
        (_, Some(term)) => term.as_var().cloned().into_iter().collect(),
        (rest, None) => rest.vars_used().cloned().collect(),
    }
}

fn instantiate(action: &ActionRef, input: &Pattern, frame: &Frame) -> Result<Record> {
    input.instantiate(frame).map_err(|var| EngineError::QueryFailed {
        action: action.to_string(),
        reason: format!("variable '{var}' is unbound"),
    })
}

fn bind_error(term: &Term, reason: &str, frame: &Frame) -> Option<Frame> {
    let value = Value::String(reason.to_string());
    match term {
        Term::Var(var) | Term::Default(var, _) => frame.bind(var, &value),
        Term::Literal(expected) => (*expected == value).then(|| frame.clone()),
    }
}
