//! The fixpoint run loop and the request/response entry point.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::concept::{ActionRef, ConceptFailure, ConceptRegistry, OperationKind, QuerySource};
use crate::config::EngineConfig;
use crate::dispatch::{dispatch_all, Job};
use crate::error::{EngineError, Result};
use crate::evaluator::Evaluator;
use crate::frame::Frames;
use crate::log::{OccurrenceId, OccurrenceLog, Outcome};
use crate::matcher::match_when;
use crate::requesting::{self, Requesting};
use crate::sync::{Sync, SyncSet};
use crate::value::{Record, Value};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One rule firing for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Firing {
    pub sync: String,
    pub round: usize,
    /// The occurrences the frame was joined from.
    pub occurrences: Vec<OccurrenceId>,
    /// The occurrences its `then` list produced.
    pub dispatched: Vec<OccurrenceId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub log: OccurrenceLog,
    pub rounds: usize,
    pub fired: Vec<Firing>,
}

impl RunReport {
    pub fn fired_count(&self, sync: &str) -> usize {
        self.fired.iter().filter(|f| f.sync == sync).count()
    }
}

/// Result of one inbound call driven through the rules.
#[derive(Debug)]
pub struct RequestOutcome {
    pub request: String,
    /// The payload handed to `Requesting.respond`, or why there is none.
    pub result: Result<Record>,
    /// Absent when the run itself faulted or timed out.
    pub report: Option<RunReport>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    registry: ConceptRegistry,
    syncs: SyncSet,
    config: EngineConfig,
}

impl Engine {
    /// Validate `syncs` against `registry`. The boundary concept is
    /// registered automatically when missing.
    pub fn new(mut registry: ConceptRegistry, syncs: Vec<Sync>, config: EngineConfig) -> Result<Self> {
        if registry.get(requesting::NAME).is_none() {
            registry.register(Arc::new(Requesting::new()))?;
        }
        let syncs = SyncSet::from_syncs(syncs, &registry)?;
        tracing::debug!(syncs = syncs.len(), "engine ready");
        Ok(Self {
            registry,
            syncs,
            config,
        })
    }

    pub fn registry(&self) -> &ConceptRegistry {
        &self.registry
    }

    pub fn syncs(&self) -> &SyncSet {
        &self.syncs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drive rounds from `log` until a round appends nothing.
    ///
    /// Each round matches rules against the whole log but only keeps frames
    /// that involve at least one occurrence from the previous round, and
    /// only once per (rule, occurrence set).
    pub async fn run(&self, mut log: OccurrenceLog) -> Result<RunReport> {
        let evaluator = Evaluator::new(&self.registry, self.config.query_errors);
        let mut seen: HashSet<(usize, Vec<OccurrenceId>)> = HashSet::new();
        let mut fired = Vec::new();
        let mut delta_start = 0;
        let mut rounds = 0;

        while delta_start < log.len() {
            if rounds == self.config.max_rounds {
                tracing::error!(max_rounds = self.config.max_rounds, "round limit exceeded");
                return Err(EngineError::RoundLimitExceeded(self.config.max_rounds));
            }
            rounds += 1;

            let delta = log.since(delta_start);
            let matched: Vec<(&Sync, Frames)> = self
                .syncs
                .iter()
                .enumerate()
                .filter(|(_, sync)| sync.triggers().any(|a| delta.iter().any(|o| &o.action == a)))
                .filter_map(|(idx, sync)| {
                    let frames: Frames = match_when(&sync.when, log.entries())
                        .into_iter()
                        .filter(|f| f.provenance().iter().any(|id| id.0 >= delta_start))
                        .filter(|f| seen.insert((idx, f.provenance().iter().copied().collect())))
                        .collect();
                    (!frames.is_empty()).then_some((sync, frames))
                })
                .collect();
            delta_start = log.len();

            let refined = join_all(matched.into_iter().map(|(sync, frames)| {
                let evaluator = &evaluator;
                async move { evaluator.evaluate(&sync.steps, frames).await.map(|f| (sync, f)) }
            }))
            .await;

            let mut jobs = Vec::new();
            for result in refined {
                let (sync, frames) = result?;
                if !frames.is_empty() {
                    tracing::debug!(sync = %sync.name, round = rounds, frames = frames.len(), "sync fired");
                }
                jobs.extend(frames.into_iter().map(|frame| Job {
                    sync: sync.name.as_str(),
                    then: &sync.then,
                    frame,
                }));
            }

            let results = dispatch_all(&self.registry, &jobs).await?;
            for (job, dispatched) in jobs.iter().zip(results) {
                let ids = dispatched
                    .into_iter()
                    .map(|d| log.append(d.action, d.inputs, d.outcome))
                    .collect();
                fired.push(Firing {
                    sync: job.sync.to_string(),
                    round: rounds,
                    occurrences: job.frame.provenance().iter().copied().collect(),
                    dispatched: ids,
                });
            }
        }

        Ok(RunReport { log, rounds, fired })
    }

    /// Reify an inbound call as `Requesting.request`, run to fixpoint under
    /// the configured timeout, and pick out the correlated response.
    pub async fn handle_request(&self, path: &str, body: Record) -> RequestOutcome {
        let span = tracing::info_span!("sync_run", request = tracing::field::Empty, path);
        self.handle_request_inner(path, body, span.clone())
            .instrument(span)
            .await
    }

    async fn handle_request_inner(&self, path: &str, body: Record, span: tracing::Span) -> RequestOutcome {
        let mut inputs = body;
        inputs.insert("path".into(), Value::String(path.to_string()));

        let request_action = ActionRef::new(requesting::NAME, requesting::REQUEST);
        let outcome: Outcome = self.registry.perform(&request_action, &inputs).await.into();
        let request = match &outcome {
            Outcome::Success(out) => out
                .get(requesting::REQUEST)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            Outcome::Error { .. } => String::new(),
        };
        span.record("request", request.as_str());

        let mut log = OccurrenceLog::new();
        log.append(request_action, inputs, outcome);

        let ms = self.config.request_timeout_ms;
        let report = match tokio::time::timeout(Duration::from_millis(ms), self.run(log)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "run failed");
                return RequestOutcome {
                    request,
                    result: Err(e),
                    report: None,
                };
            }
            Err(_) => {
                tracing::warn!(timeout_ms = ms, "run timed out");
                return RequestOutcome {
                    request,
                    result: Err(EngineError::Timeout(ms)),
                    report: None,
                };
            }
        };

        let result = Self::response_for(&report.log, &request);
        tracing::info!(
            rounds = report.rounds,
            occurrences = report.log.len(),
            responded = result.is_ok(),
            "run complete"
        );
        RequestOutcome {
            request,
            result,
            report: Some(report),
        }
    }

    /// The first successful `respond` carrying `request`; later ones are
    /// ignored with a warning.
    fn response_for(log: &OccurrenceLog, request: &str) -> Result<Record> {
        let respond = ActionRef::new(requesting::NAME, requesting::RESPOND);
        let mut responses = log.of(&respond).filter(|o| {
            !o.is_error() && o.input(requesting::REQUEST).and_then(|v| v.as_str()) == Some(request)
        });
        let first = responses
            .next()
            .ok_or_else(|| EngineError::NoResponse(request.to_string()))?;
        let extra = responses.count();
        if extra > 0 {
            tracing::warn!(extra, "request answered more than once; keeping the first response");
        }
        Ok(Requesting::payload_of(&first.inputs))
    }

    /// Invoke an operation directly, outside any rule. Queries return their
    /// rows as an array, actions their record.
    pub async fn call_direct(
        &self,
        action: &ActionRef,
        args: &Record,
    ) -> Result<std::result::Result<Value, ConceptFailure>> {
        let sig = self.registry.resolve(action)?;
        let result = match sig.kind {
            OperationKind::Query => QuerySource::query(&self.registry, action, args)
                .await
                .map(|rows| Value::Array(rows.into_iter().map(Value::Object).collect())),
            OperationKind::Action => self.registry.perform(action, args).await.map(Value::Object),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::testing::Scripted;
    use crate::concept::{ActionSignature, Concept};
    use crate::config::QueryErrorPolicy;
    use crate::pattern::Pattern;
    use crate::record;
    use async_trait::async_trait;
    use serde_json::json;

    // ----- fixtures -----

    fn auth() -> Scripted {
        Scripted::new("UserAuth").action("login", |args| {
            match (args.get("email"), args.get("password")) {
                (Some(e), Some(p)) if e == "ada@example.com" && p == "hunter2" => {
                    Ok(record! { "user": "u1" })
                }
                _ => Err(ConceptFailure::new("Invalid credentials.")),
            }
        })
    }

    fn sessioning() -> Scripted {
        Scripted::new("Sessioning")
            .action("create", |args| {
                Ok(record! { "session": format!("s-{}", args["user"].as_str().unwrap_or("")) })
            })
            .query("_getUser", |args| {
                Ok(match args.get("session").and_then(|v| v.as_str()) {
                    Some("s-u1") => vec![record! { "user": "u1" }],
                    _ => vec![],
                })
            })
    }

    fn items() -> Scripted {
        Scripted::new("ItemCollection").query("_getWishListItems", |_| {
            Ok(vec![
                record! { "item": { "_id": "i1" } },
                record! { "item": { "_id": "i2" } },
            ])
        })
    }

    fn login_syncs() -> Vec<Sync> {
        vec![
            Sync::new("LoginRequest")
                .when(
                    "Requesting.request",
                    Pattern::new().lit("path", "/UserAuth/login").vars(&["email", "password"]),
                    Pattern::new().var("request"),
                )
                .then("UserAuth.login", Pattern::new().vars(&["email", "password"])),
            Sync::new("LoginSuccessCreatesSession")
                .when("UserAuth.login", Pattern::new(), Pattern::new().var("user"))
                .then("Sessioning.create", Pattern::new().var("user")),
            Sync::new("LoginResponse")
                .when(
                    "Requesting.request",
                    Pattern::new().lit("path", "/UserAuth/login"),
                    Pattern::new().var("request"),
                )
                .when("UserAuth.login", Pattern::new(), Pattern::new().var("user"))
                .when("Sessioning.create", Pattern::new().var("user"), Pattern::new().var("session"))
                .then("Requesting.respond", Pattern::new().vars(&["request", "session", "user"])),
            Sync::new("LoginErrorResponse")
                .when(
                    "Requesting.request",
                    Pattern::new().lit("path", "/UserAuth/login"),
                    Pattern::new().var("request"),
                )
                .when("UserAuth.login", Pattern::new(), Pattern::new().var("error"))
                .then("Requesting.respond", Pattern::new().vars(&["request", "error"])),
        ]
    }

    fn wishlist_syncs() -> Vec<Sync> {
        vec![
            Sync::new("GetWishListRequest")
                .when(
                    "Requesting.request",
                    Pattern::new().lit("path", "/ItemCollection/_getWishListItems").var("session"),
                    Pattern::new().var("request"),
                )
                .query("Sessioning._getUser", Pattern::new().var("session"), Pattern::new().var("user"))
                .query(
                    "ItemCollection._getWishListItems",
                    Pattern::new().bind("owner", "user"),
                    Pattern::new().var("item"),
                )
                .collect_as(&["item"], "items")
                .then("Requesting.respond", Pattern::new().vars(&["request", "items"])),
            Sync::new("GetWishListAuthError")
                .when(
                    "Requesting.request",
                    Pattern::new().lit("path", "/ItemCollection/_getWishListItems").var("session"),
                    Pattern::new().var("request"),
                )
                .absent("Sessioning._getUser", Pattern::new().var("session"))
                .then(
                    "Requesting.respond",
                    Pattern::new().var("request").lit("error", "Invalid or expired session"),
                ),
        ]
    }

    struct Fixture {
        engine: Engine,
        auth: Arc<Scripted>,
        sessioning: Arc<Scripted>,
        items: Arc<Scripted>,
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let auth = Arc::new(auth());
        let sessioning = Arc::new(sessioning());
        let items = Arc::new(items());
        let registry = ConceptRegistry::new()
            .with(auth.clone())
            .unwrap()
            .with(sessioning.clone())
            .unwrap()
            .with(items.clone())
            .unwrap();
        let mut syncs = login_syncs();
        syncs.extend(wishlist_syncs());
        Fixture {
            engine: Engine::new(registry, syncs, config).unwrap(),
            auth,
            sessioning,
            items,
        }
    }

    // ----- request scenarios -----

    #[tokio::test]
    async fn login_happy_path_responds_once_with_session_and_user() {
        let fx = fixture(EngineConfig::default());
        let out = fx
            .engine
            .handle_request(
                "/UserAuth/login",
                record! { "email": "ada@example.com", "password": "hunter2" },
            )
            .await;

        let payload = out.result.unwrap();
        assert_eq!(payload, record! { "session": "s-u1", "user": "u1" });

        let report = out.report.unwrap();
        assert!(report.log.iter().all(|o| !o.is_error()));
        assert_eq!(report.fired_count("LoginResponse"), 1);
        assert_eq!(report.fired_count("LoginErrorResponse"), 0);
        assert_eq!(
            report
                .log
                .of(&ActionRef::from("Requesting.respond"))
                .count(),
            1
        );
        assert_eq!(fx.auth.call_count("login"), 1);
    }

    #[tokio::test]
    async fn invalid_credentials_cascade_to_error_response_without_session() {
        let fx = fixture(EngineConfig::default());
        let out = fx
            .engine
            .handle_request(
                "/UserAuth/login",
                record! { "email": "ada@example.com", "password": "wrong" },
            )
            .await;

        assert_eq!(out.result.unwrap(), record! { "error": "Invalid credentials." });
        assert_eq!(fx.sessioning.call_count("create"), 0);
        let report = out.report.unwrap();
        assert_eq!(report.fired_count("LoginSuccessCreatesSession"), 0);
        assert_eq!(
            report
                .log
                .of(&ActionRef::from("Requesting.respond"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn unknown_session_only_reaches_the_auth_error_rule() {
        let fx = fixture(EngineConfig::default());
        let out = fx
            .engine
            .handle_request("/ItemCollection/_getWishListItems", record! { "session": "forged" })
            .await;

        assert_eq!(
            out.result.unwrap(),
            record! { "error": "Invalid or expired session" }
        );
        assert_eq!(fx.items.call_count("_getWishListItems"), 0);
        assert_eq!(out.report.unwrap().fired_count("GetWishListRequest"), 0);
    }

    #[tokio::test]
    async fn valid_session_gets_the_collected_item_list() {
        let fx = fixture(EngineConfig::default());
        let out = fx
            .engine
            .handle_request("/ItemCollection/_getWishListItems", record! { "session": "s-u1" })
            .await;
        assert_eq!(
            out.result.unwrap(),
            record! { "items": [{ "_id": "i1" }, { "_id": "i2" }] }
        );
    }

    #[tokio::test]
    async fn unhandled_path_reports_no_response() {
        let fx = fixture(EngineConfig::default());
        let out = fx.engine.handle_request("/Nobody/listens", Record::new()).await;
        assert!(matches!(out.result, Err(EngineError::NoResponse(ref id)) if *id == out.request));
        assert_eq!(out.report.unwrap().rounds, 1);
    }

    // ----- fixpoint control -----

    #[tokio::test]
    async fn a_rule_fires_at_most_once_per_occurrence_set() {
        let chain = Arc::new(
            Scripted::new("Chain")
                .action("a", |_| Ok(record! { "n": 1 }))
                .action("b", |_| Ok(record! { "n": 2 }))
                .action("c", |_| Ok(record! {})),
        );
        let syncs = vec![
            Sync::new("AfterRequest")
                .when("Requesting.request", Pattern::new(), Pattern::new().var("request"))
                .then("Chain.a", Pattern::new()),
            Sync::new("AfterA")
                .when("Chain.a", Pattern::new(), Pattern::new())
                .then("Chain.b", Pattern::new()),
            Sync::new("RequestAndA")
                .when("Requesting.request", Pattern::new(), Pattern::new().var("request"))
                .when("Chain.a", Pattern::new(), Pattern::new().var("n"))
                .then("Chain.c", Pattern::new()),
        ];
        let registry = ConceptRegistry::new().with(chain.clone()).unwrap();
        let engine = Engine::new(registry, syncs, EngineConfig::default()).unwrap();
        let out = engine.handle_request("/x", Record::new()).await;

        let report = out.report.unwrap();
        assert_eq!(chain.call_count("a"), 1);
        assert_eq!(chain.call_count("b"), 1);
        assert_eq!(chain.call_count("c"), 1);
        assert_eq!(report.fired_count("RequestAndA"), 1);
        assert_eq!(report.rounds, 3);
    }

    #[tokio::test]
    async fn rematching_consumed_occurrences_does_not_refire() {
        let x = Arc::new(
            Scripted::new("X")
                .action("p", |_| Ok(record! {}))
                .action("q", |_| Ok(record! {})),
        );
        let syncs = vec![Sync::new("Pair")
            .when("X.p", Pattern::new().var("v"), Pattern::new())
            .when("X.q", Pattern::new().var("v"), Pattern::new())
            .then("X.q", Pattern::new().lit("v", 2))];
        let registry = ConceptRegistry::new().with(x.clone()).unwrap();
        let engine = Engine::new(registry, syncs, EngineConfig::default()).unwrap();

        let mut log = OccurrenceLog::new();
        log.append(ActionRef::from("X.p"), record! { "v": 1 }, Outcome::Success(Record::new()));
        log.append(ActionRef::from("X.q"), record! { "v": 1 }, Outcome::Success(Record::new()));
        let report = engine.run(log).await.unwrap();

        assert_eq!(report.fired_count("Pair"), 1);
        assert_eq!(x.call_count("q"), 1);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.fired[0].occurrences, vec![OccurrenceId(0), OccurrenceId(1)]);
        assert_eq!(report.fired[0].dispatched, vec![OccurrenceId(2)]);
    }

    #[tokio::test]
    async fn one_occurrence_fans_out_to_one_firing_per_frame() {
        let fx = fixture(EngineConfig::default());
        let mut log = OccurrenceLog::new();
        log.append(
            ActionRef::from("UserAuth.login"),
            Record::new(),
            Outcome::Success(record! { "user": "u1" }),
        );
        log.append(
            ActionRef::from("UserAuth.login"),
            Record::new(),
            Outcome::Success(record! { "user": "u2" }),
        );
        let report = fx.engine.run(log).await.unwrap();
        assert_eq!(report.fired_count("LoginSuccessCreatesSession"), 2);
        assert_eq!(fx.sessioning.call_count("create"), 2);
    }

    #[tokio::test]
    async fn cyclic_rules_hit_the_round_limit() {
        let ticker = Arc::new(Scripted::new("Loop").action("tick", |_| Ok(record! {})));
        let syncs = vec![
            Sync::new("Start")
                .when("Requesting.request", Pattern::new(), Pattern::new())
                .then("Loop.tick", Pattern::new()),
            Sync::new("Again")
                .when("Loop.tick", Pattern::new(), Pattern::new())
                .then("Loop.tick", Pattern::new()),
        ];
        let registry = ConceptRegistry::new().with(ticker).unwrap();
        let config = EngineConfig {
            max_rounds: 5,
            ..EngineConfig::default()
        };
        let engine = Engine::new(registry, syncs, config).unwrap();
        let out = engine.handle_request("/loop", Record::new()).await;
        assert!(matches!(out.result, Err(EngineError::RoundLimitExceeded(5))));
        assert!(out.report.is_none());
    }

    /// Sleeps for a fixed time on every `wait`.
    struct Slow(Duration);

    #[async_trait]
    impl Concept for Slow {
        fn name(&self) -> &str {
            "Slow"
        }

        fn signatures(&self) -> Vec<ActionSignature> {
            vec![ActionSignature::action("Slow", "wait", &[], &[])]
        }

        async fn perform(&self, _action: &str, _args: &Record) -> std::result::Result<Record, ConceptFailure> {
            tokio::time::sleep(self.0).await;
            Ok(Record::new())
        }

        async fn query(&self, q: &str, _args: &Record) -> std::result::Result<Vec<Record>, ConceptFailure> {
            Err(ConceptFailure::unknown_operation("Slow", q))
        }
    }

    #[tokio::test]
    async fn slow_runs_time_out() {
        let syncs = vec![Sync::new("Wait")
            .when("Requesting.request", Pattern::new(), Pattern::new())
            .then("Slow.wait", Pattern::new())];
        let registry = ConceptRegistry::new()
            .with(Arc::new(Slow(Duration::from_secs(5))))
            .unwrap();
        let config = EngineConfig {
            request_timeout_ms: 20,
            ..EngineConfig::default()
        };
        let engine = Engine::new(registry, syncs, config).unwrap();
        let out = engine.handle_request("/slow", Record::new()).await;
        assert!(matches!(out.result, Err(EngineError::Timeout(20))));
    }

    #[tokio::test]
    async fn independent_frames_are_dispatched_concurrently() {
        let source = Arc::new(
            Scripted::new("Batch")
                .action("start", |_| Ok(record! {}))
                .query("_rows", |_| Ok((0..4).map(|n| record! { "n": n }).collect())),
        );
        let syncs = vec![Sync::new("WaitPerRow")
            .when("Batch.start", Pattern::new(), Pattern::new())
            .query("Batch._rows", Pattern::new(), Pattern::new().var("n"))
            .then("Slow.wait", Pattern::new().var("n"))];
        let registry = ConceptRegistry::new()
            .with(source)
            .unwrap()
            .with(Arc::new(Slow(Duration::from_millis(200))))
            .unwrap();
        let engine = Engine::new(registry, syncs, EngineConfig::default()).unwrap();

        let mut log = OccurrenceLog::new();
        log.append(ActionRef::from("Batch.start"), Record::new(), Outcome::Success(Record::new()));
        let started = std::time::Instant::now();
        let report = engine.run(log).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.fired_count("WaitPerRow"), 4);
        assert!(
            elapsed < Duration::from_millis(600),
            "four 200ms waits took {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn concurrent_requests_keep_separate_logs() {
        let fx = fixture(EngineConfig::default());
        let (ok, bad) = tokio::join!(
            fx.engine.handle_request(
                "/UserAuth/login",
                record! { "email": "ada@example.com", "password": "hunter2" },
            ),
            fx.engine.handle_request(
                "/UserAuth/login",
                record! { "email": "ada@example.com", "password": "wrong" },
            ),
        );

        assert_ne!(ok.request, bad.request);
        assert_eq!(
            ok.result.as_ref().unwrap(),
            &record! { "session": "s-u1", "user": "u1" }
        );
        assert_eq!(
            bad.result.as_ref().unwrap(),
            &record! { "error": "Invalid credentials." }
        );

        for (out, other) in [(&ok, &bad.request), (&bad, &ok.request)] {
            let report = out.report.as_ref().unwrap();
            let request_ref = ActionRef::from("Requesting.request");
            let requests: Vec<_> = report.log.of(&request_ref).collect();
            assert_eq!(requests.len(), 1);
            assert!(report
                .log
                .iter()
                .all(|o| o.input("request").and_then(|v| v.as_str()) != Some(other.as_str())));
            assert!(report
                .log
                .of(&ActionRef::from("Requesting.respond"))
                .all(|o| o.input("request").and_then(|v| v.as_str()) == Some(out.request.as_str())));
        }
        assert_eq!(ok.report.as_ref().unwrap().fired_count("LoginErrorResponse"), 0);
        assert_eq!(bad.report.as_ref().unwrap().fired_count("LoginResponse"), 0);
    }

    #[tokio::test]
    async fn failing_where_query_aborts_only_under_fail_policy() {
        let broken = Arc::new(
            Scripted::new("Broken")
                .query("_rows", |_| Err(ConceptFailure::new("down")))
                .action("never", |_| Ok(record! {})),
        );
        let make = |policy| {
            let syncs = vec![Sync::new("Lookup")
                .when("Requesting.request", Pattern::new(), Pattern::new().var("request"))
                .query("Broken._rows", Pattern::new(), Pattern::new().var("row"))
                .then("Requesting.respond", Pattern::new().vars(&["request", "row"]))];
            let registry = ConceptRegistry::new().with(broken.clone()).unwrap();
            Engine::new(
                registry,
                syncs,
                EngineConfig {
                    query_errors: policy,
                    ..EngineConfig::default()
                },
            )
            .unwrap()
        };

        let absorbed = make(QueryErrorPolicy::Absorb).handle_request("/q", Record::new()).await;
        assert!(matches!(absorbed.result, Err(EngineError::NoResponse(_))));

        let failed = make(QueryErrorPolicy::Fail).handle_request("/q", Record::new()).await;
        assert!(matches!(failed.result, Err(EngineError::QueryFailed { .. })));
    }

    #[tokio::test]
    async fn duplicate_responses_keep_the_first() {
        let syncs = vec![
            Sync::new("First")
                .when("Requesting.request", Pattern::new(), Pattern::new().var("request"))
                .then("Requesting.respond", Pattern::new().var("request").lit("n", 1)),
            Sync::new("Second")
                .when("Requesting.request", Pattern::new(), Pattern::new().var("request"))
                .then("Requesting.respond", Pattern::new().var("request").lit("n", 2)),
        ];
        let engine = Engine::new(ConceptRegistry::new(), syncs, EngineConfig::default()).unwrap();
        let out = engine.handle_request("/dup", Record::new()).await;
        assert_eq!(out.result.unwrap(), record! { "n": 1 });
    }

    #[tokio::test]
    async fn call_direct_returns_rows_or_record() {
        let fx = fixture(EngineConfig::default());
        let rows = fx
            .engine
            .call_direct(&ActionRef::from("Sessioning._getUser"), &record! { "session": "s-u1" })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows, json!([{ "user": "u1" }]));

        let failure = fx
            .engine
            .call_direct(&ActionRef::from("UserAuth.login"), &record! {})
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(failure.reason(), "Invalid credentials.");

        assert!(fx
            .engine
            .call_direct(&ActionRef::from("Nope.x"), &Record::new())
            .await
            .is_err());
    }

    #[test]
    fn invalid_rules_are_rejected_at_construction() {
        let syncs = vec![Sync::new("Bad")
            .when("Requesting.request", Pattern::new(), Pattern::new())
            .then("Requesting.respond", Pattern::new().var("request"))];
        let err = Engine::new(ConceptRegistry::new(), syncs, EngineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::UnboundVariable { .. }));
    }
}
