//! One swiping queue per user per UTC day.

use async_trait::async_trait;
use buybye_core::concept::arg_str;
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{arg_strings, fresh_id};

pub const NAME: &str = "QueueSystem";

#[derive(Debug, Clone)]
struct Queue {
    id: String,
    item_ids: Vec<String>,
    completed: u64,
}

pub struct QueueSystem {
    queues: RwLock<HashMap<(String, NaiveDate), Queue>>,
    today: fn() -> NaiveDate,
}

impl Default for QueueSystem {
    fn default() -> Self {
        Self::with_clock(|| Utc::now().date_naive())
    }
}

impl QueueSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed notion of "today"; the default is the current UTC date.
    pub fn with_clock(today: fn() -> NaiveDate) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            today,
        }
    }

    fn key(&self, owner: &str) -> (String, NaiveDate) {
        (owner.to_string(), (self.today)())
    }

    async fn generate(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_ids = arg_strings(args, "itemIds")?;
        let mut queues = self.queues.write().await;
        let key = self.key(owner);
        if queues.contains_key(&key) {
            return Err(ConceptFailure::new(format!(
                "A queue already exists for user {owner} for today"
            )));
        }
        let queue = Queue {
            id: fresh_id(),
            item_ids,
            completed: 0,
        };
        let id = queue.id.clone();
        queues.insert(key, queue);
        Ok(record! { "queue": id })
    }

    /// Swiping an item takes it off the queue and counts it as done.
    async fn increment(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let item_id = arg_str(args, "itemId")?;
        let mut queues = self.queues.write().await;
        let queue = queues
            .get_mut(&self.key(owner))
            .ok_or_else(|| no_queue(owner))?;
        let pos = queue
            .item_ids
            .iter()
            .position(|id| id == item_id)
            .ok_or_else(|| {
                ConceptFailure::new(format!(
                    "Item {item_id} not found in queue for user {owner} for today"
                ))
            })?;
        queue.item_ids.remove(pos);
        queue.completed += 1;
        Ok(Record::new())
    }

    async fn today_queue(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let queues = self.queues.read().await;
        Ok(queues
            .get(&self.key(owner))
            .map(|q| record! { "itemIdSet": q.item_ids, "completedQueue": q.completed })
            .into_iter()
            .collect())
    }

    async fn completed(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let owner = arg_str(args, "owner")?;
        let queues = self.queues.read().await;
        let queue = queues.get(&self.key(owner)).ok_or_else(|| no_queue(owner))?;
        Ok(vec![record! { "completedQueue": queue.completed }])
    }
}

fn no_queue(owner: &str) -> ConceptFailure {
    ConceptFailure::new(format!("No queue found for user {owner} for today"))
}

#[async_trait]
impl Concept for QueueSystem {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(NAME, "generateDailyQueue", &["owner", "itemIds"], &["queue"]),
            ActionSignature::action(NAME, "incrementCompletedQueue", &["owner", "itemId"], &[]),
            ActionSignature::query(
                NAME,
                "_getTodayQueue",
                &["owner"],
                &["itemIdSet", "completedQueue"],
            ),
            ActionSignature::query(NAME, "_getCompletedQueue", &["owner"], &["completedQueue"]),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "generateDailyQueue" => self.generate(args).await,
            "incrementCompletedQueue" => self.increment(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        match query {
            "_getTodayQueue" => self.today_queue(args).await,
            "_getCompletedQueue" => self.completed(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generate(owner: &str, ids: &[&str]) -> Record {
        record! { "owner": owner, "itemIds": ids }
    }

    #[tokio::test]
    async fn one_queue_per_day() {
        let q = QueueSystem::new();
        q.perform("generateDailyQueue", &generate("u1", &["a", "b"]))
            .await
            .unwrap();
        let err = q
            .perform("generateDailyQueue", &generate("u1", &["c"]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "A queue already exists for user u1 for today");
    }

    #[tokio::test]
    async fn increment_moves_an_item_to_completed() {
        let q = QueueSystem::new();
        q.perform("generateDailyQueue", &generate("u1", &["a", "b"]))
            .await
            .unwrap();
        q.perform("incrementCompletedQueue", &record! { "owner": "u1", "itemId": "a" })
            .await
            .unwrap();

        let rows = q.query("_getTodayQueue", &record! { "owner": "u1" }).await.unwrap();
        assert_eq!(rows[0]["itemIdSet"], json!(["b"]));
        assert_eq!(rows[0]["completedQueue"], 1);

        let err = q
            .perform("incrementCompletedQueue", &record! { "owner": "u1", "itemId": "a" })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "Item a not found in queue for user u1 for today");
    }

    #[tokio::test]
    async fn no_queue_today() {
        let q = QueueSystem::new();
        let rows = q.query("_getTodayQueue", &record! { "owner": "u1" }).await.unwrap();
        assert!(rows.is_empty());
        let err = q
            .query("_getCompletedQueue", &record! { "owner": "u1" })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "No queue found for user u1 for today");
    }

    #[tokio::test]
    async fn queues_are_keyed_by_day() {
        fn day_one() -> NaiveDate {
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        }
        fn day_two() -> NaiveDate {
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
        }
        let first = QueueSystem::with_clock(day_one);
        first
            .perform("generateDailyQueue", &generate("u1", &["a"]))
            .await
            .unwrap();

        let second = QueueSystem {
            queues: RwLock::new(first.queues.into_inner()),
            today: day_two,
        };
        let rows = second.query("_getTodayQueue", &record! { "owner": "u1" }).await.unwrap();
        assert!(rows.is_empty());
        second
            .perform("generateDailyQueue", &generate("u1", &["b"]))
            .await
            .unwrap();
    }
}
