//! Signup, login and logout.

use buybye_core::{Pattern, Sync};
use serde_json::json;

use super::{Endpoint, RESPOND};

const LOGIN: &str = "UserAuth.login";
const SIGNUP: &str = "UserAuth.signup";
const CREATE_SESSION: &str = "Sessioning.create";

pub(crate) fn syncs() -> Vec<Sync> {
    let mut syncs = Vec::new();
    syncs.extend(credential_flow("Login", LOGIN));
    syncs.extend(credential_flow("Signup", SIGNUP));

    // A new account starts with an empty profile.
    syncs.push(
        Sync::new("SignupCreateProfile")
            .when(SIGNUP, Pattern::new(), Pattern::new().var("user"))
            .extract("userId", "user", "_id")
            .extract("email", "user", "email")
            .then(
                "UserProfile.createUser",
                Pattern::new()
                    .bind("uid", "userId")
                    .lit("name", "")
                    .var("email")
                    .lit("profilePicture", "")
                    .lit("fieldOfInterests", json!([])),
            ),
    );

    let logout = Endpoint::new("Logout", "Sessioning.delete");
    syncs.push(
        logout
            .on_request("Request", Pattern::new().var("session"))
            .then("Sessioning.delete", Pattern::new().var("session")),
    );
    syncs.push(logout.response(Pattern::new(), Pattern::new().lit("success", true)));
    syncs.push(logout.error());
    syncs
}

/// Login and signup share a shape: check credentials, open a session for
/// the user, answer with both.
fn credential_flow(prefix: &str, action: &str) -> Vec<Sync> {
    let endpoint = Endpoint::new(prefix, action);
    vec![
        endpoint
            .on_request("Request", Pattern::new().vars(&["email", "password"]))
            .then(action, Pattern::new().vars(&["email", "password"])),
        Sync::new(format!("{prefix}SuccessSession"))
            .when(action, Pattern::new(), Pattern::new().var("user"))
            .extract("userId", "user", "_id")
            .then(CREATE_SESSION, Pattern::new().bind("user", "userId")),
        endpoint
            .on_request("SessionResponse", Pattern::new())
            .when(action, Pattern::new(), Pattern::new().var("user"))
            .when(CREATE_SESSION, Pattern::new(), Pattern::new().var("session"))
            .then(RESPOND, Pattern::new().vars(&["request", "user", "session"])),
        endpoint.error(),
    ]
}
