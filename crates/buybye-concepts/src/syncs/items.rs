//! Wishlist management and item lookups.

use buybye_core::{Frame, Pattern, Sync, Value};
use serde_json::json;

use super::{Endpoint, RESPOND};
use crate::item_collection::RANDOM_DRAW;

const ITEM_FIELDS: &[&str] = &[
    "itemName",
    "description",
    "photo",
    "price",
    "reason",
    "isNeed",
    "isFutureApprove",
];

/// `(rule prefix, operation, field)` for the single-field edits.
const ATTRIBUTE_EDITS: &[(&str, &str, &str)] = &[
    ("UpdateItemName", "updateItemName", "itemName"),
    ("UpdateDescription", "updateDescription", "description"),
    ("UpdatePhoto", "updatePhoto", "photo"),
    ("UpdatePrice", "updatePrice", "price"),
    ("UpdateReason", "updateReason", "reason"),
    ("UpdateIsNeed", "updateIsNeed", "isNeed"),
    ("UpdateIsFutureApprove", "updateIsFutureApprove", "isFutureApprove"),
];

/// Shown when the owner has no profile name.
const DEFAULT_OWNER_NAME: &str = "User";

pub(crate) fn syncs() -> Vec<Sync> {
    let mut syncs = Vec::new();

    let add = Endpoint::new("AddItem", "ItemCollection.addItem");
    syncs.extend(add.gated(
        Pattern::new().vars(ITEM_FIELDS).var_or("amazonUrl", ""),
        Pattern::new()
            .bind("owner", "user")
            .vars(ITEM_FIELDS)
            .var("amazonUrl"),
        Pattern::new().var("item"),
        Pattern::new().var("item"),
    ));

    let remove = Endpoint::new("RemoveItem", "ItemCollection.removeItem");
    syncs.extend(remove.gated_ack(
        Pattern::new().var("itemId"),
        Pattern::new().bind("owner", "user").var("itemId"),
    ));

    // Every attribute is optional here; absent ones reach the concept as
    // null and are left as they are.
    let update = Endpoint::new("UpdateItem", "ItemCollection.updateItem");
    let optional_fields = ITEM_FIELDS
        .iter()
        .fold(Pattern::new().var("itemId"), |p, f| p.var_or(f, Value::Null));
    syncs.extend(update.gated_ack(
        optional_fields,
        Pattern::new()
            .bind("owner", "user")
            .var("itemId")
            .vars(ITEM_FIELDS),
    ));

    for (prefix, op, field) in ATTRIBUTE_EDITS {
        let endpoint = Endpoint::new(prefix, &format!("ItemCollection.{op}"));
        syncs.extend(endpoint.gated_ack(
            Pattern::new().var("itemId").var(field),
            Pattern::new().bind("owner", "user").var("itemId").var(field),
        ));
    }

    let purchased = Endpoint::new("SetPurchased", "ItemCollection.setPurchased");
    syncs.extend(purchased.gated_ack(
        Pattern::new()
            .vars(&["itemId", "quantity"])
            .var_or("purchaseTime", Value::Null)
            .var_or("actualPrice", Value::Null),
        Pattern::new()
            .bind("owner", "user")
            .vars(&["itemId", "quantity", "purchaseTime", "actualPrice"]),
    ));

    syncs.extend(item_lists());
    syncs.extend(user_wishlist());
    syncs.extend(item_details());
    syncs.extend(random_items());
    syncs
}

/// Wishlist and purchased-items listings. An owner with nothing yet gets `[]`.
fn item_lists() -> Vec<Sync> {
    let mut syncs = Vec::new();
    for (prefix, query) in [
        ("GetWishListItems", "ItemCollection._getWishListItems"),
        ("GetPurchasedItems", "ItemCollection._getPurchasedItems"),
    ] {
        let endpoint = Endpoint::new(prefix, query);
        syncs.push(
            endpoint
                .with_session("Request", Pattern::new())
                .optional(
                    query,
                    Pattern::new().bind("owner", "user"),
                    Pattern::new().var("item"),
                    Vec::new(),
                )
                .collect_as(&["item"], "items")
                .then(RESPOND, Pattern::new().vars(&["request", "items"])),
        );
        syncs.push(endpoint.auth_error());
    }
    syncs
}

/// The owner's wishlist screen. Community verdicts on each item are only
/// revealed once the owner has worked through a full daily queue.
fn user_wishlist() -> Vec<Sync> {
    const WISHLIST: &str = "ItemCollection._getUserWishList";
    const TODAY: &str = "QueueSystem._getTodayQueue";
    const STATS: &str = "SwipeSystem._getCommunitySwipeStats";

    let endpoint = Endpoint::new("GetUserWishList", WISHLIST);
    let progress = |sync: Sync| {
        sync.optional(
            TODAY,
            Pattern::new().bind("owner", "user"),
            Pattern::new().var("completedQueue"),
            vec![("completedQueue", json!(0))],
        )
        .derive("hasCompletedQueue", |frame| {
            let done = frame.value("completedQueue")?.as_u64()?;
            Some(json!(done >= RANDOM_DRAW as u64))
        })
    };

    vec![
        progress(endpoint.with_session("Request", Pattern::new()))
            .query(WISHLIST, Pattern::new().bind("owner", "user"), Pattern::new().var("item"))
            .extract("itemId", "item", "_id")
            .optional(
                STATS,
                Pattern::new().var("itemId").bind("excludeUserId", "user"),
                Pattern::new().vars(&["total", "approval"]),
                vec![("total", Value::Null), ("approval", Value::Null)],
            )
            .collect_as(&["item", "itemId", "total", "approval"], "rows")
            .derive("items", with_community_stats)
            .then(
                RESPOND,
                Pattern::new().vars(&["request", "items", "hasCompletedQueue"]),
            ),
        progress(
            endpoint
                .with_session("Empty", Pattern::new())
                .absent(WISHLIST, Pattern::new().bind("owner", "user")),
        )
        .then(
            RESPOND,
            Pattern::new()
                .var("request")
                .lit("items", json!([]))
                .var("hasCompletedQueue"),
        ),
        endpoint.auth_error(),
    ]
}

/// Unpack collected `rows` into items, adding `communityStats` where the
/// owner may see them and anyone has swiped.
fn with_community_stats(frame: &Frame) -> Option<Value> {
    let reveal = frame.value("hasCompletedQueue")?.as_bool()?;
    let rows = frame.value("rows")?.as_array()?;
    let items = rows
        .iter()
        .filter_map(|row| {
            let mut item = row.get("item")?.as_object()?.clone();
            let total = row.get("total").filter(|t| !t.is_null());
            if let (true, Some(total)) = (reveal, total) {
                let approval = row.get("approval").cloned().unwrap_or(json!(0));
                item.insert(
                    "communityStats".into(),
                    json!({ "total": total, "approval": approval }),
                );
            }
            Some(Value::Object(item))
        })
        .collect();
    Some(Value::Array(items))
}

/// One item, with its owner's display name folded in.
fn item_details() -> Vec<Sync> {
    const DETAILS: &str = "ItemCollection._getItemDetails";
    let endpoint = Endpoint::new("GetItemDetails", DETAILS);
    vec![
        endpoint
            .with_session("Request", Pattern::new().var("itemId"))
            .query(DETAILS, Pattern::new().var("itemId"), Pattern::new().var("item"))
            .extract("itemOwner", "item", "owner")
            .optional(
                "UserProfile._getProfile",
                Pattern::new().bind("user", "itemOwner"),
                Pattern::new().var("profile"),
                vec![("profile", Value::Null)],
            )
            .derive("detail", |frame| {
                let mut item = frame.value("item")?.as_object()?.clone();
                let name = frame
                    .value("profile")
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(DEFAULT_OWNER_NAME);
                item.insert("ownerName".into(), json!(name));
                Some(Value::Object(item))
            })
            .then(RESPOND, Pattern::new().var("request").bind("item", "detail")),
        endpoint
            .with_session("Error", Pattern::new().var("itemId"))
            .query(DETAILS, Pattern::new().var("itemId"), Pattern::new().var("error"))
            .then(RESPOND, Pattern::new().vars(&["request", "error"])),
        endpoint.auth_error(),
    ]
}

/// Ten item ids from other owners, for swiping.
fn random_items() -> Vec<Sync> {
    const RANDOM: &str = "ItemCollection._getTenRandomItems";
    let endpoint = Endpoint::new("GetTenRandomItems", RANDOM);
    vec![
        endpoint
            .with_session("Request", Pattern::new())
            .query(
                RANDOM,
                Pattern::new().bind("owner", "user"),
                Pattern::new().var("itemIdSet"),
            )
            .then(RESPOND, Pattern::new().vars(&["request", "itemIdSet"])),
        endpoint
            .with_session("Error", Pattern::new())
            .query(
                RANDOM,
                Pattern::new().bind("owner", "user"),
                Pattern::new().var("error"),
            )
            .then(RESPOND, Pattern::new().vars(&["request", "error"])),
        endpoint.auth_error(),
    ]
}
