//! Wishlist items: what a user is thinking of buying, and what they bought.

use async_trait::async_trait;
use buybye_core::concept::{arg_f64, arg_opt_str, arg_str};
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record, Value};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::fresh_id;

pub const NAME: &str = "ItemCollection";

/// How many items a random draw returns.
pub const RANDOM_DRAW: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    #[serde(rename = "_id")]
    id: String,
    owner: String,
    item_name: String,
    description: String,
    photo: String,
    price: f64,
    reason: String,
    is_need: Value,
    is_future_approve: Value,
    was_purchased: bool,
    #[serde(rename = "PurchasedTime", skip_serializing_if = "Option::is_none")]
    purchased_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amazon_url: Option<String>,
}

impl Item {
    fn set(&mut self, field: &str, value: &Value) -> Result<(), ConceptFailure> {
        let text = || {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ConceptFailure::bad_argument(field))
        };
        match field {
            "itemName" => self.item_name = text()?,
            "description" => self.description = text()?,
            "photo" => self.photo = text()?,
            "reason" => self.reason = text()?,
            "price" => {
                let price = value
                    .as_f64()
                    .ok_or_else(|| ConceptFailure::bad_argument(field))?;
                if price < 0.0 {
                    return Err(ConceptFailure::new("Price cannot be negative."));
                }
                self.price = price;
            }
            "isNeed" => self.is_need = value.clone(),
            "isFutureApprove" => self.is_future_approve = value.clone(),
            other => return Err(ConceptFailure::bad_argument(other)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Collection {
    items: HashMap<String, Item>,
    /// Owner → item ids, in the order they were added.
    wishlists: HashMap<String, Vec<String>>,
}

impl Collection {
    /// The owner's item, checked the way every mutation checks it.
    fn owned_mut(&mut self, owner: &str, item_id: &str) -> Result<&mut Item, ConceptFailure> {
        let wishlist = self
            .wishlists
            .get(owner)
            .ok_or_else(|| ConceptFailure::new(format!("No wishlist found for owner: {owner}")))?;
        if !wishlist.iter().any(|id| id == item_id) {
            return Err(ConceptFailure::new(format!(
                "Item {item_id} not found in wishlist for owner: {owner}"
            )));
        }
        self.items
            .get_mut(item_id)
            .filter(|item| item.owner == owner)
            .ok_or_else(|| {
                ConceptFailure::new(format!(
                    "Item details for {item_id} not found or not owned by {owner}."
                ))
            })
    }

    fn wishlist_items<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.wishlists
            .get(owner)
            .into_iter()
            .flatten()
            .filter_map(|id| self.items.get(id))
            .filter(move |item| item.owner == owner)
    }
}

/// Attribute updates that differ only in the field they touch.
const ATTRIBUTE_UPDATES: &[(&str, &str)] = &[
    ("updateItemName", "itemName"),
    ("updateDescription", "description"),
    ("updatePhoto", "photo"),
    ("updatePrice", "price"),
    ("updateReason", "reason"),
    ("updateIsNeed", "isNeed"),
    ("updateIsFutureApprove", "isFutureApprove"),
];

#[derive(Debug, Default)]
pub struct ItemCollection {
    state: RwLock<Collection>,
}

impl ItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    async fn add_item(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item = Item {
            id: fresh_id(),
            owner: owner.to_string(),
            item_name: arg_str(args, "itemName")?.to_string(),
            description: arg_str(args, "description")?.to_string(),
            photo: arg_str(args, "photo")?.to_string(),
            price: arg_f64(args, "price")?,
            reason: arg_str(args, "reason")?.to_string(),
            is_need: required(args, "isNeed")?,
            is_future_approve: required(args, "isFutureApprove")?,
            was_purchased: false,
            purchased_time: None,
            quantity: None,
            actual_price: None,
            amazon_url: arg_opt_str(args, "amazonUrl")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        };
        let out = to_value(&item)?;

        let mut state = self.state.write().await;
        state
            .wishlists
            .entry(owner.to_string())
            .or_default()
            .push(item.id.clone());
        tracing::debug!(owner, item = %item.id, "added item");
        state.items.insert(item.id.clone(), item);
        Ok(record! { "item": out })
    }

    /// Drops the item from the owner's wishlist. The item itself is kept.
    async fn remove_item(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_id = arg_str(args, "itemId")?;
        let mut state = self.state.write().await;
        let wishlist = state
            .wishlists
            .get_mut(owner)
            .ok_or_else(|| ConceptFailure::new(format!("No wishlist found for owner: {owner}")))?;
        let before = wishlist.len();
        wishlist.retain(|id| id != item_id);
        if wishlist.len() == before {
            return Err(ConceptFailure::new(format!(
                "Item {item_id} not found in wishlist for owner: {owner}"
            )));
        }
        Ok(Record::new())
    }

    async fn update_attribute(&self, field: &str, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_id = arg_str(args, "itemId")?;
        let value = required(args, field)?;

        let mut state = self.state.write().await;
        let item = state.owned_mut(owner, item_id)?;
        item.set(field, &value)?;
        Ok(Record::new())
    }

    /// Edits every attribute present in `args` at once. Missing or null
    /// fields are left alone; one bad field leaves the item untouched.
    async fn update_item(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_id = arg_str(args, "itemId")?;

        let mut state = self.state.write().await;
        let item = state.owned_mut(owner, item_id)?;
        let mut edited = item.clone();
        for (_, field) in ATTRIBUTE_UPDATES {
            if let Some(value) = args.get(*field).filter(|v| !v.is_null()) {
                edited.set(field, value)?;
            }
        }
        *item = edited;
        Ok(Record::new())
    }

    async fn set_purchased(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_id = arg_str(args, "itemId")?;
        let quantity = arg_f64(args, "quantity")?;
        let purchase_time = args.get("purchaseTime").and_then(Value::as_i64);
        let actual_price = args.get("actualPrice").and_then(Value::as_f64);

        let mut state = self.state.write().await;
        let item = state.owned_mut(owner, item_id)?;
        if item.was_purchased {
            return Err(ConceptFailure::new(format!(
                "Item {item_id} has already been marked as purchased."
            )));
        }
        if quantity <= 0.0 {
            return Err(ConceptFailure::new("Quantity must be greater than 0."));
        }
        if quantity.fract() != 0.0 {
            return Err(ConceptFailure::new("Quantity must be a whole number."));
        }
        if actual_price.is_some_and(|p| p < 0.0) {
            return Err(ConceptFailure::new("Actual price cannot be negative."));
        }

        item.was_purchased = true;
        item.quantity = Some(quantity as u64);
        item.purchased_time =
            Some(purchase_time.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()));
        if actual_price.is_some() {
            item.actual_price = actual_price;
        }
        Ok(Record::new())
    }

    /// Owners without a wishlist simply have no items.
    async fn get_wishlist_items(
        &self,
        args: &Record,
        keep: impl Fn(&Item) -> bool,
    ) -> Result<Vec<Record>, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let state = self.state.read().await;
        state
            .wishlist_items(owner)
            .filter(|item| keep(item))
            .map(|item| to_value(item).map(|v| record! { "item": v }))
            .collect()
    }

    async fn get_item_details(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let item_id = arg_str(args, "itemId")?;
        let state = self.state.read().await;
        let item = state
            .items
            .get(item_id)
            .ok_or_else(|| ConceptFailure::new(format!("Item details for {item_id} not found.")))?;
        Ok(vec![record! { "item": to_value(item)? }])
    }

    async fn get_ten_random_items(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let state = self.state.read().await;
        let mut others: Vec<&str> = state
            .items
            .values()
            .filter(|item| item.owner != owner)
            .map(|item| item.id.as_str())
            .collect();
        if others.len() < RANDOM_DRAW {
            return Err(ConceptFailure::new(
                "Not enough items from other owners to select ten.",
            ));
        }
        others.shuffle(&mut rand::thread_rng());
        others.truncate(RANDOM_DRAW);
        Ok(vec![record! { "itemIdSet": others }])
    }
}

fn required(args: &Record, name: &str) -> Result<Value, ConceptFailure> {
    args.get(name)
        .filter(|v| !v.is_null())
        .cloned()
        .ok_or_else(|| ConceptFailure::bad_argument(name))
}

fn to_value(item: &Item) -> Result<Value, ConceptFailure> {
    serde_json::to_value(item).map_err(|e| ConceptFailure::new(e.to_string()))
}

#[async_trait]
impl Concept for ItemCollection {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        let mut sigs = vec![
            ActionSignature::action(
                NAME,
                "addItem",
                &[
                    "owner",
                    "itemName",
                    "description",
                    "photo",
                    "price",
                    "reason",
                    "isNeed",
                    "isFutureApprove",
                    "amazonUrl",
                ],
                &["item"],
            ),
            ActionSignature::action(NAME, "removeItem", &["owner", "itemId"], &[]),
            ActionSignature::action(
                NAME,
                "updateItem",
                &[
                    "owner",
                    "itemId",
                    "itemName",
                    "description",
                    "photo",
                    "price",
                    "reason",
                    "isNeed",
                    "isFutureApprove",
                ],
                &[],
            ),
            ActionSignature::action(
                NAME,
                "setPurchased",
                &["owner", "itemId", "quantity", "purchaseTime", "actualPrice"],
                &[],
            ),
            ActionSignature::query(NAME, "_getWishListItems", &["owner"], &["item"]),
            ActionSignature::query(NAME, "_getUserWishList", &["owner"], &["item"]),
            ActionSignature::query(NAME, "_getPurchasedItems", &["owner"], &["item"]),
            ActionSignature::query(NAME, "_getItemDetails", &["itemId"], &["item"]),
            ActionSignature::query(NAME, "_getTenRandomItems", &["owner"], &["itemIdSet"]),
        ];
        sigs.extend(
            ATTRIBUTE_UPDATES
                .iter()
                .map(|&(op, field)| ActionSignature::action(NAME, op, &["owner", "itemId", field], &[])),
        );
        sigs
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "addItem" => self.add_item(args).await,
            "removeItem" => self.remove_item(args).await,
            "updateItem" => self.update_item(args).await,
            "setPurchased" => self.set_purchased(args).await,
            other => match ATTRIBUTE_UPDATES.iter().find(|(op, _)| *op == other) {
                Some((_, field)) => self.update_attribute(field, args).await,
                None => Err(ConceptFailure::unknown_operation(NAME, other)),
            },
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        match query {
            "_getWishListItems" | "_getUserWishList" => self.get_wishlist_items(args, |_| true).await,
            "_getPurchasedItems" => self.get_wishlist_items(args, |item| item.was_purchased).await,
            "_getItemDetails" => self.get_item_details(args).await,
            "_getTenRandomItems" => self.get_ten_random_items(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }
}
