//! Synchronization rules: `when` patterns, `where` steps, `then` templates.

use std::collections::BTreeSet;
use std::fmt;

use crate::concept::{ActionRef, ConceptRegistry, OperationKind};
use crate::error::{EngineError, Result};
use crate::evaluator::{FrameDerivation, FramePredicate, Step};
use crate::frame::{Frame, Var};
use crate::log::Occurrence;
use crate::pattern::Pattern;
use crate::value::Value;

// ---------------------------------------------------------------------------
// When / Then
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct When {
    pub action: ActionRef,
    pub input: Pattern,
    pub output: Pattern,
}

impl When {
    /// Match one occurrence against this pattern, extending `frame`.
    ///
    /// An output pattern naming `error` matches only failed occurrences;
    /// any other output pattern (including the empty one) matches only
    /// successful ones.
    pub fn match_occurrence(&self, occ: &Occurrence, frame: &Frame) -> Option<Frame> {
        if occ.action != self.action {
            return None;
        }
        if occ.is_error() != self.output.mentions("error") {
            return None;
        }
        let frame = self.input.matches(&occ.inputs, frame)?;
        let frame = self.output.matches(&occ.outputs.to_record(), &frame)?;
        Some(frame.with_occurrence(occ.id))
    }

    fn vars(&self) -> impl Iterator<Item = &Var> {
        self.input.vars_used().chain(self.output.vars_used())
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.action,
            self.input.describe(),
            self.output.describe()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Then {
    pub action: ActionRef,
    pub args: Pattern,
}

impl fmt::Display for Then {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.args.describe())
    }
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// One declarative rule. Built fluently and registered once at startup.
///
/// ```
/// use buybye_core::{Pattern, Sync};
///
/// let login = Sync::new("LoginRequest")
///     .when(
///         "Requesting.request",
///         Pattern::new().lit("path", "/UserAuth/login").vars(&["email", "password"]),
///         Pattern::new().var("request"),
///     )
///     .then("UserAuth.login", Pattern::new().vars(&["email", "password"]));
/// assert_eq!(login.when.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Sync {
    pub name: String,
    pub when: Vec<When>,
    pub steps: Vec<Step>,
    pub then: Vec<Then>,
}

impl Sync {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: Vec::new(),
            steps: Vec::new(),
            then: Vec::new(),
        }
    }

    pub fn when(mut self, action: impl Into<ActionRef>, input: Pattern, output: Pattern) -> Self {
        self.when.push(When {
            action: action.into(),
            input,
            output,
        });
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Inner join against a query: one frame per returned row.
    pub fn query(self, action: impl Into<ActionRef>, input: Pattern, output: Pattern) -> Self {
        self.step(Step::Query {
            action: action.into(),
            input,
            output,
        })
    }

    /// Left join: zero rows keep the frame with `defaults` bound instead.
    pub fn optional(
        self,
        action: impl Into<ActionRef>,
        input: Pattern,
        output: Pattern,
        defaults: Vec<(&str, Value)>,
    ) -> Self {
        self.step(Step::Optional {
            action: action.into(),
            input,
            output,
            defaults: defaults
                .into_iter()
                .map(|(k, v)| (Var::from(k), v))
                .collect(),
        })
    }

    /// Anti-join: keep the frame only when the query yields no rows.
    pub fn absent(self, action: impl Into<ActionRef>, input: Pattern) -> Self {
        self.step(Step::Absent {
            action: action.into(),
            input,
        })
    }

    pub fn filter(
        self,
        label: &str,
        predicate: impl Fn(&Frame) -> bool + Send + std::marker::Sync + 'static,
    ) -> Self {
        self.step(Step::Filter {
            label: label.to_string(),
            predicate: FramePredicate::new(predicate),
        })
    }

    /// Bind `var` to a value computed from the frame; `None` drops the frame.
    pub fn derive(
        self,
        var: &str,
        derive: impl Fn(&Frame) -> Option<Value> + Send + std::marker::Sync + 'static,
    ) -> Self {
        self.step(Step::Derive {
            var: Var::from(var),
            derive: FrameDerivation::new(derive),
        })
    }

    /// Shorthand derive: `var = source.path` (e.g. `userId = user._id`).
    pub fn extract(self, var: &str, source: &str, path: &str) -> Self {
        let source = Var::from(source);
        let path = path.to_string();
        self.derive(var, move |frame| {
            frame
                .get(&source)
                .and_then(|v| crate::value::lookup_path(v, &path))
                .cloned()
        })
    }

    pub fn collect_as(self, fields: &[&str], into: &str) -> Self {
        self.step(Step::CollectAs {
            fields: fields.iter().map(|f| Var::from(*f)).collect(),
            into: Var::from(into),
        })
    }

    pub fn then(mut self, action: impl Into<ActionRef>, args: Pattern) -> Self {
        self.then.push(Then {
            action: action.into(),
            args,
        });
        self
    }

    /// Every `when` action this rule listens to.
    pub fn triggers(&self) -> impl Iterator<Item = &ActionRef> {
        self.when.iter().map(|w| &w.action)
    }

    /// Check the rule against the registry.
    ///
    /// Rejects unknown targets, queries in `then`, actions in `where`,
    /// variables read before anything could have bound them, and a
    /// `collect_as` whose target is already bound to something it does not
    /// aggregate.
    pub fn validate(&self, registry: &ConceptRegistry) -> Result<()> {
        if self.when.is_empty() {
            return Err(EngineError::EmptyWhen(self.name.clone()));
        }

        let mut bound: BTreeSet<Var> = BTreeSet::new();
        for w in &self.when {
            registry.resolve(&w.action)?;
            bound.extend(w.vars().cloned());
        }

        for step in &self.steps {
            if let Some(action) = step.queried() {
                let sig = registry.resolve(action)?;
                if sig.kind != OperationKind::Query {
                    return Err(EngineError::ActionInWhere {
                        sync: self.name.clone(),
                        action: action.to_string(),
                    });
                }
            }
            for var in step.reads() {
                if !bound.contains(var) {
                    return Err(self.unbound(var));
                }
            }
            if let Step::CollectAs { fields, into } = step {
                if bound.contains(into) && !fields.contains(into) {
                    return Err(EngineError::CollectOverwrites {
                        sync: self.name.clone(),
                        var: into.to_string(),
                    });
                }
            }
            bound.extend(step.binds());
        }

        for t in &self.then {
            let sig = registry.resolve(&t.action)?;
            if sig.kind == OperationKind::Query {
                return Err(EngineError::QueryInThen {
                    sync: self.name.clone(),
                    action: t.action.to_string(),
                });
            }
            if let Some(var) = t.args.vars_used().find(|v| !bound.contains(*v)) {
                return Err(self.unbound(var));
            }
        }
        Ok(())
    }

    fn unbound(&self, var: &Var) -> EngineError {
        EngineError::UnboundVariable {
            sync: self.name.clone(),
            var: var.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncSet
// ---------------------------------------------------------------------------

/// The validated rule set. Indices are stable for the life of the engine.
#[derive(Debug, Clone, Default)]
pub struct SyncSet {
    syncs: Vec<Sync>,
}

impl SyncSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add one rule. Names must be unique.
    pub fn register(&mut self, sync: Sync, registry: &ConceptRegistry) -> Result<()> {
        if self.syncs.iter().any(|s| s.name == sync.name) {
            return Err(EngineError::DuplicateSync(sync.name));
        }
        sync.validate(registry)?;
        self.syncs.push(sync);
        Ok(())
    }

    pub fn from_syncs(syncs: Vec<Sync>, registry: &ConceptRegistry) -> Result<Self> {
        let mut set = Self::new();
        for sync in syncs {
            set.register(sync, registry)?;
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.syncs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.syncs.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Sync> {
        self.syncs.get(idx)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sync> {
        self.syncs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::testing::Scripted;
    use crate::log::OccurrenceLog;
    use crate::log::Outcome;
    use crate::record;
    use crate::value::Record;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> ConceptRegistry {
        let auth = Scripted::new("UserAuth")
            .action("login", |_| Ok(record! { "user": "u1" }))
            .query("_lookup", |_| Ok(vec![]));
        let req = Scripted::new("Requesting")
            .action("request", |_| Ok(record! { "request": "r1" }))
            .action("respond", |_| Ok(Record::new()));
        ConceptRegistry::new()
            .with(Arc::new(auth))
            .unwrap()
            .with(Arc::new(req))
            .unwrap()
    }

    fn request_when() -> Sync {
        Sync::new("T").when(
            "Requesting.request",
            Pattern::new().lit("path", "/UserAuth/login").var("email"),
            Pattern::new().var("request"),
        )
    }

    #[test]
    fn empty_output_pattern_matches_only_success() {
        let w = When {
            action: ActionRef::from("UserAuth.login"),
            input: Pattern::new(),
            output: Pattern::new(),
        };
        let mut log = OccurrenceLog::new();
        let ok = log.append(w.action.clone(), Record::new(), Outcome::Success(Record::new()));
        let bad = log.append(w.action.clone(), Record::new(), Outcome::error("x"));
        assert!(w.match_occurrence(log.get(ok).unwrap(), &Frame::new()).is_some());
        assert!(w.match_occurrence(log.get(bad).unwrap(), &Frame::new()).is_none());
    }

    #[test]
    fn error_output_pattern_matches_only_failures() {
        let w = When {
            action: ActionRef::from("UserAuth.login"),
            input: Pattern::new(),
            output: Pattern::new().var("error"),
        };
        let mut log = OccurrenceLog::new();
        let ok = log.append(w.action.clone(), Record::new(), Outcome::Success(record! { "user": "u" }));
        let bad = log.append(w.action.clone(), Record::new(), Outcome::error("Invalid credentials."));
        assert!(w.match_occurrence(log.get(ok).unwrap(), &Frame::new()).is_none());
        let f = w.match_occurrence(log.get(bad).unwrap(), &Frame::new()).unwrap();
        assert_eq!(f.value("error"), Some(&json!("Invalid credentials.")));
        assert!(f.provenance().contains(&bad));
    }

    #[test]
    fn validate_accepts_well_formed_rule() {
        let sync = request_when().then("UserAuth.login", Pattern::new().var("email"));
        sync.validate(&registry()).unwrap();
    }

    #[test]
    fn validate_rejects_unbound_then_variable() {
        let sync = request_when().then("UserAuth.login", Pattern::new().var("password"));
        let err = sync.validate(&registry()).unwrap_err();
        assert!(matches!(err, EngineError::UnboundVariable { var, .. } if var == "password"));
    }

    #[test]
    fn validate_rejects_query_in_then_and_action_in_where() {
        let q = request_when().then("UserAuth._lookup", Pattern::new());
        assert!(matches!(
            q.validate(&registry()),
            Err(EngineError::QueryInThen { .. })
        ));

        let a = request_when().query("UserAuth.login", Pattern::new(), Pattern::new());
        assert!(matches!(
            a.validate(&registry()),
            Err(EngineError::ActionInWhere { .. })
        ));
    }

    #[test]
    fn validate_tracks_where_bindings() {
        let sync = request_when()
            .query(
                "UserAuth._lookup",
                Pattern::new().var("email"),
                Pattern::new().var("user"),
            )
            .extract("userId", "user", "_id")
            .then("Requesting.respond", Pattern::new().vars(&["request", "userId"]));
        sync.validate(&registry()).unwrap();
    }

    #[test]
    fn validate_rejects_collect_into_a_bound_variable() {
        let clobber = request_when()
            .query(
                "UserAuth._lookup",
                Pattern::new().var("email"),
                Pattern::new().var("item"),
            )
            .collect_as(&["item"], "request")
            .then("UserAuth.login", Pattern::new().var("request"));
        let err = clobber.validate(&registry()).unwrap_err();
        assert!(matches!(err, EngineError::CollectOverwrites { var, .. } if var == "request"));

        let in_place = request_when()
            .query(
                "UserAuth._lookup",
                Pattern::new().var("email"),
                Pattern::new().var("item"),
            )
            .collect_as(&["item"], "item")
            .then("Requesting.respond", Pattern::new().vars(&["request", "item"]));
        in_place.validate(&registry()).unwrap();
    }

    #[test]
    fn sync_set_rejects_duplicate_names() {
        let reg = registry();
        let rule = || request_when().then("UserAuth.login", Pattern::new().var("email"));
        let err = SyncSet::from_syncs(vec![rule(), rule()], &reg).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateSync(n) if n == "T"));
    }

    #[test]
    fn validate_rejects_unknown_targets_and_empty_when() {
        let unknown = request_when().then("Nope.go", Pattern::new());
        assert!(matches!(
            unknown.validate(&registry()),
            Err(EngineError::UnknownConcept(_))
        ));
        let empty = Sync::new("Empty").then("UserAuth.login", Pattern::new());
        assert!(matches!(
            empty.validate(&registry()),
            Err(EngineError::EmptyWhen(_))
        ));
    }
}
