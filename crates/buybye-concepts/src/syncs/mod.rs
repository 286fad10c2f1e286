//! The application's synchronization rules.
//!
//! Request rules turn a `Requesting.request` into a concept action (after a
//! session check where the route needs one). Response and error rules join
//! the request with the action's outcome and answer it. Query endpoints do
//! their work in `where` and answer directly.

mod auth;
mod items;
mod profile;
mod queue;
mod swipe;

use buybye_core::{ActionRef, Pattern, Sync};

pub(crate) const REQUEST: &str = "Requesting.request";
pub(crate) const RESPOND: &str = "Requesting.respond";
pub(crate) const GET_USER: &str = "Sessioning._getUser";

/// Reply for a request whose session token is missing from `Sessioning`.
pub const AUTH_ERROR: &str = "Invalid or expired session";

/// The complete rule set.
pub fn all() -> Vec<Sync> {
    let mut syncs = Vec::new();
    syncs.extend(auth::syncs());
    syncs.extend(profile::syncs());
    syncs.extend(items::syncs());
    syncs.extend(queue::syncs());
    syncs.extend(swipe::syncs());
    syncs
}

/// Rule-name prefix and request path for one endpoint.
///
/// The path defaults to `/{Concept}/{op}` of the operation it fronts.
pub(crate) struct Endpoint {
    prefix: String,
    action: ActionRef,
    path: String,
}

impl Endpoint {
    pub fn new(prefix: &str, action: &str) -> Self {
        let action = ActionRef::from(action);
        Self {
            prefix: prefix.to_string(),
            path: format!("/{}/{}", action.concept, action.name),
            action,
        }
    }

    fn name(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, suffix)
    }

    /// `Requesting.request` at this path carrying `fields`, binding `request`.
    pub fn on_request(&self, suffix: &str, fields: Pattern) -> Sync {
        Sync::new(self.name(suffix)).when(
            REQUEST,
            Pattern::new().lit("path", self.path.as_str()).with(fields),
            Pattern::new().var("request"),
        )
    }

    /// Like [`on_request`](Self::on_request) but only for a live session;
    /// binds `user`.
    pub fn with_session(&self, suffix: &str, fields: Pattern) -> Sync {
        self.on_request(suffix, Pattern::new().var("session").with(fields))
            .query(GET_USER, Pattern::new().var("session"), Pattern::new().var("user"))
    }

    /// Answers the request when the session is unknown or was not sent.
    pub fn auth_error(&self) -> Sync {
        self.on_request("AuthError", Pattern::new().var_or("session", ""))
            .absent(GET_USER, Pattern::new().var("session"))
            .then(
                RESPOND,
                Pattern::new().var("request").lit("error", AUTH_ERROR),
            )
    }

    /// Answers with `payload` once the action succeeds with `output`.
    pub fn response(&self, output: Pattern, payload: Pattern) -> Sync {
        self.on_request("Response", Pattern::new())
            .when(self.action.clone(), Pattern::new(), output)
            .then(RESPOND, Pattern::new().var("request").with(payload))
    }

    /// Relays the action's failure.
    pub fn error(&self) -> Sync {
        self.on_request("Error", Pattern::new())
            .when(self.action.clone(), Pattern::new(), Pattern::new().var("error"))
            .then(RESPOND, Pattern::new().vars(&["request", "error"]))
    }

    /// The four rules of a session-gated action endpoint: request, success
    /// response, error relay, auth error.
    pub fn gated(&self, fields: Pattern, args: Pattern, output: Pattern, payload: Pattern) -> Vec<Sync> {
        vec![
            self.with_session("Request", fields)
                .then(self.action.clone(), args),
            self.response(output, payload),
            self.error(),
            self.auth_error(),
        ]
    }

    /// A gated action that answers `{success: true}`.
    pub fn gated_ack(&self, fields: Pattern, args: Pattern) -> Vec<Sync> {
        self.gated(
            fields,
            args,
            Pattern::new(),
            Pattern::new().lit("success", true),
        )
    }
}
