//! The daily swiping queue.

use buybye_core::{Pattern, Sync};
use serde_json::json;

use super::{Endpoint, RESPOND};

const TODAY: &str = "QueueSystem._getTodayQueue";

pub(crate) fn syncs() -> Vec<Sync> {
    let today = Endpoint::new("GetTodayQueue", TODAY);
    let completed = Endpoint::new("GetCompletedQueue", "QueueSystem._getCompletedQueue");
    let generate = Endpoint::new("GenerateDailyQueue", "QueueSystem.generateDailyQueue");
    let increment = Endpoint::new("IncrementCompletedQueue", "QueueSystem.incrementCompletedQueue");

    // No queue yet today reads as an empty one.
    let mut syncs = vec![
        today
            .with_session("Request", Pattern::new())
            .optional(
                TODAY,
                Pattern::new().bind("owner", "user"),
                Pattern::new().vars(&["itemIdSet", "completedQueue"]),
                vec![("itemIdSet", json!([])), ("completedQueue", json!(0))],
            )
            .then(
                RESPOND,
                Pattern::new().vars(&["request", "itemIdSet", "completedQueue"]),
            ),
        today.auth_error(),
        completed
            .with_session("Request", Pattern::new())
            .optional(
                TODAY,
                Pattern::new().bind("owner", "user"),
                Pattern::new().var("completedQueue"),
                vec![("completedQueue", json!(0))],
            )
            .then(RESPOND, Pattern::new().vars(&["request", "completedQueue"])),
        completed.auth_error(),
    ];

    syncs.extend(generate.gated(
        Pattern::new().var("itemIds"),
        Pattern::new().bind("owner", "user").var("itemIds"),
        Pattern::new().var("queue"),
        Pattern::new().var("queue"),
    ));
    syncs.extend(increment.gated_ack(
        Pattern::new().var("itemId"),
        Pattern::new().bind("owner", "user").var("itemId"),
    ));
    syncs
}
