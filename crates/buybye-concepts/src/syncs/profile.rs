//! Reading and editing the signed-in user's profile.

use buybye_core::{Pattern, Sync, Value};

use super::{Endpoint, RESPOND};

pub(crate) fn syncs() -> Vec<Sync> {
    let get = Endpoint::new("GetProfile", "UserProfile._getProfile");
    let mut syncs = vec![
        get.with_session("Request", Pattern::new())
            .optional(
                "UserProfile._getProfile",
                Pattern::new().var("user"),
                Pattern::new().var("profile"),
                vec![("profile", Value::Null)],
            )
            .then(RESPOND, Pattern::new().vars(&["request", "profile"])),
        get.auth_error(),
    ];

    for (prefix, op, field) in [
        ("UpdateProfileName", "updateProfileName", "name"),
        ("UpdateProfilePicture", "updateProfilePicture", "profilePicture"),
        ("UpdateInterests", "updateInterests", "interests"),
    ] {
        let endpoint = Endpoint::new(prefix, &format!("UserProfile.{op}"));
        syncs.extend(endpoint.gated_ack(
            Pattern::new().var(field),
            Pattern::new().var("user").var(field),
        ));
    }
    syncs
}
