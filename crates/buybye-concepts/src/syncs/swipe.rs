//! Swiping on other people's items, and the owner totals that follow.

use buybye_core::{Pattern, Sync};

use super::{Endpoint, RESPOND};

const RECORD: &str = "SwipeSystem.recordSwipe";
const UPDATE: &str = "SwipeSystem.updateDecision";
const ITEM_DETAILS: &str = "ItemCollection._getItemDetails";

pub(crate) fn syncs() -> Vec<Sync> {
    let record = Endpoint::new("RecordSwipe", RECORD);
    let update = Endpoint::new("UpdateDecision", UPDATE);

    let mut syncs = record.gated_ack(
        Pattern::new().vars(&["itemId", "decision"]).var_or("comment", ""),
        Pattern::new()
            .bind("ownerUserId", "user")
            .vars(&["itemId", "decision", "comment"]),
    );
    syncs.extend(update.gated_ack(
        Pattern::new()
            .vars(&["itemId", "newDecision"])
            .var_or("newComment", ""),
        Pattern::new()
            .bind("ownerUserId", "user")
            .vars(&["itemId", "newDecision", "newComment"]),
    ));

    // Owner totals move with every recorded or changed verdict. An item
    // that cannot be found skips the update; the swipe still stands.
    syncs.push(
        record
            .on_request("OwnerStats", Pattern::new().vars(&["itemId", "decision"]))
            .when(RECORD, Pattern::new(), Pattern::new())
            .query(ITEM_DETAILS, Pattern::new().var("itemId"), Pattern::new().var("item"))
            .extract("itemOwner", "item", "owner")
            .then(
                "SwipeSystem.incrementItemOwnerStats",
                Pattern::new()
                    .bind("itemOwnerId", "itemOwner")
                    .var("decision"),
            ),
    );
    syncs.push(
        update
            .on_request("OwnerStats", Pattern::new().vars(&["itemId", "newDecision"]))
            .when(UPDATE, Pattern::new(), Pattern::new().var("oldDecision"))
            .query(ITEM_DETAILS, Pattern::new().var("itemId"), Pattern::new().var("item"))
            .extract("itemOwner", "item", "owner")
            .then(
                "SwipeSystem.adjustItemOwnerStats",
                Pattern::new()
                    .bind("itemOwnerId", "itemOwner")
                    .vars(&["oldDecision", "newDecision"]),
            ),
    );

    syncs.extend(stats_query(
        "GetSwipeStats",
        "SwipeSystem._getSwipeStats",
        Pattern::new().var("itemId"),
        Pattern::new().bind("ownerUserId", "user").var("itemId"),
        &["total", "approval"],
    ));
    syncs.extend(stats_query(
        "GetUserSwipeCount",
        "SwipeSystem._getUserSwipeCount",
        Pattern::new(),
        Pattern::new().bind("userId", "user"),
        &["count"],
    ));
    syncs.extend(stats_query(
        "GetUserSwipeStatistics",
        "SwipeSystem._getUserSwipeStatistics",
        Pattern::new(),
        Pattern::new().bind("userId", "user"),
        &["buyCount", "dontBuyCount"],
    ));
    syncs.extend(stats_query(
        "GetItemOwnerStats",
        "SwipeSystem._getItemOwnerStats",
        Pattern::new(),
        Pattern::new().bind("itemOwnerId", "user"),
        &["totalBuySwipes", "totalSwipes"],
    ));
    syncs.extend(stats_query(
        "GetItemsRejectionRate",
        "SwipeSystem._getItemOwnerRejectionRate",
        Pattern::new(),
        Pattern::new().bind("itemOwnerId", "user"),
        &["rejectionRate"],
    ));
    syncs
}

/// A session-gated query answered with the named output fields, or with
/// the query's error.
fn stats_query(
    prefix: &str,
    query: &str,
    fields: Pattern,
    args: Pattern,
    outputs: &[&str],
) -> Vec<Sync> {
    let endpoint = Endpoint::new(prefix, query);
    vec![
        endpoint
            .with_session("Request", fields.clone())
            .query(query, args.clone(), Pattern::new().vars(outputs))
            .then(RESPOND, Pattern::new().var("request").vars(outputs)),
        endpoint
            .with_session("Error", fields)
            .query(query, args, Pattern::new().var("error"))
            .then(RESPOND, Pattern::new().vars(&["request", "error"])),
        endpoint.auth_error(),
    ]
}
