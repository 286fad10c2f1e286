//! `buybye-concepts`: the wishlist application's concepts and the rules
//! that connect them.
//!
//! Every concept keeps its state in memory behind a `tokio` lock and knows
//! nothing about the others. [`syncs::all`] holds the rule set that turns
//! HTTP requests into concept actions and back.

pub mod item_collection;
pub mod queue_system;
pub mod sessioning;
pub mod swipe_system;
pub mod syncs;
pub mod user_auth;
pub mod user_profile;

use buybye_core::{
    ConceptFailure, ConceptRegistry, Engine, EngineConfig, PassthroughTable, Record, Result, Value,
};
use std::sync::Arc;

pub use item_collection::ItemCollection;
pub use queue_system::QueueSystem;
pub use sessioning::Sessioning;
pub use swipe_system::SwipeSystem;
pub use user_auth::UserAuth;
pub use user_profile::UserProfile;

/// Every application concept, freshly initialised.
pub fn registry() -> Result<ConceptRegistry> {
    ConceptRegistry::new()
        .with(Arc::new(UserAuth::new()))?
        .with(Arc::new(Sessioning::new()))?
        .with(Arc::new(UserProfile::new()))?
        .with(Arc::new(ItemCollection::new()))?
        .with(Arc::new(QueueSystem::new()))?
        .with(Arc::new(SwipeSystem::new()))
}

/// A ready engine: [`registry`] plus [`syncs::all`].
pub fn engine(config: EngineConfig) -> Result<Engine> {
    Engine::new(registry()?, syncs::all(), config)
}

/// Routes served without rules.
///
/// Only public aggregates are included. Everything that touches a user's
/// own data is excluded and goes through the session-checking rules.
pub fn default_passthrough(base_url: &str) -> PassthroughTable {
    let included = [
        (
            "SwipeSystem/_getCommunitySwipeStats",
            "anonymous community totals for an item",
        ),
        (
            "SwipeSystem/_getSwipeComments",
            "comments are shown alongside community totals",
        ),
    ];
    let excluded = [
        "UserAuth/signup",
        "UserAuth/login",
        "UserAuth/_getUserByEmail",
        "Sessioning/create",
        "Sessioning/delete",
        "Sessioning/_getUser",
        "UserProfile/createUser",
        "UserProfile/updateProfileName",
        "UserProfile/updateProfilePicture",
        "UserProfile/updateInterests",
        "UserProfile/_getProfile",
        "ItemCollection/addItem",
        "ItemCollection/removeItem",
        "ItemCollection/updateItem",
        "ItemCollection/updateItemName",
        "ItemCollection/updateDescription",
        "ItemCollection/updatePhoto",
        "ItemCollection/updatePrice",
        "ItemCollection/updateReason",
        "ItemCollection/updateIsNeed",
        "ItemCollection/updateIsFutureApprove",
        "ItemCollection/setPurchased",
        "ItemCollection/_getWishListItems",
        "ItemCollection/_getUserWishList",
        "ItemCollection/_getPurchasedItems",
        "ItemCollection/_getItemDetails",
        "ItemCollection/_getTenRandomItems",
        "QueueSystem/generateDailyQueue",
        "QueueSystem/incrementCompletedQueue",
        "QueueSystem/_getTodayQueue",
        "QueueSystem/_getCompletedQueue",
        "SwipeSystem/recordSwipe",
        "SwipeSystem/updateDecision",
        "SwipeSystem/incrementItemOwnerStats",
        "SwipeSystem/adjustItemOwnerStats",
        "SwipeSystem/_getSwipeStats",
        "SwipeSystem/_getUserSwipeCount",
        "SwipeSystem/_getUserSwipeStatistics",
        "SwipeSystem/_getItemOwnerStats",
        "SwipeSystem/_getItemOwnerRejectionRate",
    ];

    let base = base_url.trim_end_matches('/');
    let table = included
        .iter()
        .fold(PassthroughTable::new(base), |t, (route, why)| {
            t.include(&format!("{base}/{route}"), why)
        });
    excluded
        .iter()
        .fold(table, |t, route| t.exclude(&format!("{base}/{route}")))
}

pub(crate) fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A list-of-strings argument.
pub(crate) fn arg_strings(args: &Record, name: &str) -> std::result::Result<Vec<String>, ConceptFailure> {
    args.get(name)
        .and_then(Value::as_array)
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| ConceptFailure::bad_argument(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buybye_core::{record, RouteKind};

    #[test]
    fn every_operation_is_listed() {
        let reg = registry().unwrap();
        let table = default_passthrough("/api");
        let unlisted: Vec<_> = table
            .entries(&reg)
            .into_iter()
            .filter(|e| e.kind == RouteKind::Unlisted)
            .map(|e| e.route)
            .collect();
        assert!(unlisted.is_empty(), "unlisted routes: {unlisted:?}");
    }

    #[test]
    fn only_public_aggregates_go_direct() {
        let reg = registry().unwrap();
        let direct: Vec<_> = default_passthrough("/api/")
            .entries(&reg)
            .into_iter()
            .filter(|e| e.direct)
            .map(|e| e.route)
            .collect();
        assert_eq!(
            direct,
            vec![
                "/api/SwipeSystem/_getCommunitySwipeStats",
                "/api/SwipeSystem/_getSwipeComments",
            ]
        );
    }

    #[test]
    fn string_lists_reject_mixed_items() {
        assert_eq!(
            arg_strings(&record! { "ids": ["a", "b"] }, "ids").unwrap(),
            vec!["a", "b"]
        );
        assert!(arg_strings(&record! { "ids": ["a", 1] }, "ids").is_err());
        assert!(arg_strings(&record! {}, "ids").is_err());
    }

    #[test]
    fn the_rule_set_validates_against_the_registry() {
        engine(EngineConfig::default()).unwrap();
    }
}
