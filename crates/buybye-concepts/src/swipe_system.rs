//! Community "buy / don't buy" verdicts on other people's wishlist items,
//! plus running totals per item owner.

use async_trait::async_trait;
use buybye_core::concept::{arg_opt_str, arg_str};
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;

pub const NAME: &str = "SwipeSystem";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Buy,
    DontBuy,
}

impl Decision {
    fn parse(raw: &str) -> Result<Self, ConceptFailure> {
        match raw {
            "Buy" => Ok(Decision::Buy),
            "Don't Buy" => Ok(Decision::DontBuy),
            other => Err(ConceptFailure::new(format!(
                "Decision must be \"Buy\" or \"Don't Buy\", got \"{other}\"."
            ))),
        }
    }

    fn arg(args: &Record, name: &str) -> Result<Self, ConceptFailure> {
        Self::parse(arg_str(args, name)?)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "Buy"),
            Decision::DontBuy => write!(f, "Don't Buy"),
        }
    }
}

#[derive(Debug, Clone)]
struct Swipe {
    user: String,
    item: String,
    decision: Decision,
    comment: Option<String>,
}

#[derive(Debug, Default, Clone, Copy)]
struct OwnerStats {
    buy: u64,
    total: u64,
}

#[derive(Debug, Default)]
struct State {
    swipes: Vec<Swipe>,
    owners: HashMap<String, OwnerStats>,
}

impl State {
    fn find_mut(&mut self, user: &str, item: &str) -> Option<&mut Swipe> {
        self.swipes
            .iter_mut()
            .find(|s| s.user == user && s.item == item)
    }
}

/// `(total, approval)` for a set of swipes, or `None` when there are none.
fn tally<'a>(swipes: impl Iterator<Item = &'a Swipe>) -> Option<(u64, u64)> {
    let (total, approval) = swipes.fold((0, 0), |(t, a), s| {
        (t + 1, a + u64::from(s.decision == Decision::Buy))
    });
    (total > 0).then_some((total, approval))
}

/// Empty comments count as no comment.
fn comment_arg(args: &Record, name: &str) -> Option<String> {
    arg_opt_str(args, name)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Default)]
pub struct SwipeSystem {
    state: RwLock<State>,
}

impl SwipeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record_swipe(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let user = arg_str(args, "ownerUserId")?;
        let item = arg_str(args, "itemId")?;
        let decision = Decision::arg(args, "decision")?;

        let mut state = self.state.write().await;
        if state.find_mut(user, item).is_some() {
            return Err(ConceptFailure::new(
                "A swipe already exists for this user and item.",
            ));
        }
        state.swipes.push(Swipe {
            user: user.to_string(),
            item: item.to_string(),
            decision,
            comment: comment_arg(args, "comment"),
        });
        Ok(Record::new())
    }

    async fn update_decision(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let user = arg_str(args, "ownerUserId")?;
        let item = arg_str(args, "itemId")?;
        let decision = Decision::arg(args, "newDecision")?;

        let mut state = self.state.write().await;
        let swipe = state.find_mut(user, item).ok_or_else(|| {
            ConceptFailure::new("No existing swipe found for this user and item to update.")
        })?;
        let old = swipe.decision;
        swipe.decision = decision;
        swipe.comment = comment_arg(args, "newComment");
        Ok(record! { "oldDecision": old.to_string() })
    }

    async fn increment_owner_stats(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "itemOwnerId")?;
        let decision = Decision::arg(args, "decision")?;
        let mut state = self.state.write().await;
        let stats = state.owners.entry(owner.to_string()).or_default();
        stats.total += 1;
        if decision == Decision::Buy {
            stats.buy += 1;
        }
        tracing::debug!(owner, %decision, "owner stats incremented");
        Ok(Record::new())
    }

    /// A changed verdict moves one swipe between the buy and don't-buy
    /// columns; the total is unchanged.
    async fn adjust_owner_stats(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let owner = arg_str(args, "itemOwnerId")?;
        let old = Decision::arg(args, "oldDecision")?;
        let new = Decision::arg(args, "newDecision")?;
        let mut state = self.state.write().await;
        let stats = state.owners.entry(owner.to_string()).or_default();
        match (old, new) {
            (Decision::Buy, Decision::DontBuy) => stats.buy = stats.buy.saturating_sub(1),
            (Decision::DontBuy, Decision::Buy) => stats.buy += 1,
            _ => {}
        }
        Ok(Record::new())
    }

    async fn run_query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let state = self.state.read().await;
        let row = match query {
            "_getSwipeStats" => {
                let user = arg_str(args, "ownerUserId")?;
                let item = arg_str(args, "itemId")?;
                let (total, approval) = tally(
                    state
                        .swipes
                        .iter()
                        .filter(|s| s.user == user && s.item == item),
                )
                .ok_or_else(|| {
                    ConceptFailure::new("No swipes found for the given user and item.")
                })?;
                record! { "total": total, "approval": approval }
            }
            "_getCommunitySwipeStats" => {
                let item = arg_str(args, "itemId")?;
                let exclude = arg_opt_str(args, "excludeUserId").filter(|u| !u.is_empty());
                let (total, approval) = tally(
                    state
                        .swipes
                        .iter()
                        .filter(|s| s.item == item && Some(s.user.as_str()) != exclude),
                )
                .ok_or_else(|| ConceptFailure::new("No community swipes found for this item."))?;
                record! { "total": total, "approval": approval }
            }
            "_getSwipeComments" => {
                let user = arg_str(args, "ownerUserId")?;
                let item = arg_str(args, "itemId")?;
                let comments: Vec<&str> = state
                    .swipes
                    .iter()
                    .filter(|s| s.user == user && s.item == item)
                    .filter_map(|s| s.comment.as_deref())
                    .collect();
                if comments.is_empty() {
                    return Err(ConceptFailure::new(
                        "No comments found for the given user and item.",
                    ));
                }
                record! { "comments": comments }
            }
            "_getUserSwipeCount" => {
                let user = arg_str(args, "userId")?;
                let count = state.swipes.iter().filter(|s| s.user == user).count();
                record! { "count": count }
            }
            "_getUserSwipeStatistics" => {
                let user = arg_str(args, "userId")?;
                let (total, buy) =
                    tally(state.swipes.iter().filter(|s| s.user == user)).unwrap_or((0, 0));
                record! { "buyCount": buy, "dontBuyCount": total - buy }
            }
            "_getItemOwnerStats" => {
                let owner = arg_str(args, "itemOwnerId")?;
                let stats = state.owners.get(owner).copied().unwrap_or_default();
                record! { "totalBuySwipes": stats.buy, "totalSwipes": stats.total }
            }
            // Share of "Buy" verdicts on the owner's items, as a rounded
            // percentage. Zero until anyone has swiped.
            "_getItemOwnerRejectionRate" => {
                let owner = arg_str(args, "itemOwnerId")?;
                let stats = state.owners.get(owner).copied().unwrap_or_default();
                let rate = if stats.total == 0 {
                    0
                } else {
                    (stats.buy as f64 / stats.total as f64 * 100.0).round() as u64
                };
                record! { "rejectionRate": rate }
            }
            other => return Err(ConceptFailure::unknown_operation(NAME, other)),
        };
        Ok(vec![row])
    }
}

#[async_trait]
impl Concept for SwipeSystem {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(
                NAME,
                "recordSwipe",
                &["ownerUserId", "itemId", "decision", "comment"],
                &[],
            ),
            ActionSignature::action(
                NAME,
                "updateDecision",
                &["ownerUserId", "itemId", "newDecision", "newComment"],
                &["oldDecision"],
            ),
            ActionSignature::action(NAME, "incrementItemOwnerStats", &["itemOwnerId", "decision"], &[]),
            ActionSignature::action(
                NAME,
                "adjustItemOwnerStats",
                &["itemOwnerId", "oldDecision", "newDecision"],
                &[],
            ),
            ActionSignature::query(NAME, "_getSwipeStats", &["ownerUserId", "itemId"], &["total", "approval"]),
            ActionSignature::query(
                NAME,
                "_getCommunitySwipeStats",
                &["itemId", "excludeUserId"],
                &["total", "approval"],
            ),
            ActionSignature::query(NAME, "_getSwipeComments", &["ownerUserId", "itemId"], &["comments"]),
            ActionSignature::query(NAME, "_getUserSwipeCount", &["userId"], &["count"]),
            ActionSignature::query(
                NAME,
                "_getUserSwipeStatistics",
                &["userId"],
                &["buyCount", "dontBuyCount"],
            ),
            ActionSignature::query(
                NAME,
                "_getItemOwnerStats",
                &["itemOwnerId"],
                &["totalBuySwipes", "totalSwipes"],
            ),
            ActionSignature::query(
                NAME,
                "_getItemOwnerRejectionRate",
                &["itemOwnerId"],
                &["rejectionRate"],
            ),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "recordSwipe" => self.record_swipe(args).await,
            "updateDecision" => self.update_decision(args).await,
            "incrementItemOwnerStats" => self.increment_owner_stats(args).await,
            "adjustItemOwnerStats" => self.adjust_owner_stats(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        self.run_query(query, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn swipe(user: &str, item: &str, decision: &str) -> Record {
        record! { "ownerUserId": user, "itemId": item, "decision": decision, "comment": "" }
    }

    #[tokio::test]
    async fn one_swipe_per_user_and_item() {
        let s = SwipeSystem::new();
        s.perform("recordSwipe", &swipe("u1", "i1", "Buy")).await.unwrap();
        let err = s
            .perform("recordSwipe", &swipe("u1", "i1", "Don't Buy"))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "A swipe already exists for this user and item.");
    }

    #[tokio::test]
    async fn unknown_decision_is_rejected() {
        let s = SwipeSystem::new();
        let err = s.perform("recordSwipe", &swipe("u1", "i1", "Maybe")).await.unwrap_err();
        assert!(err.reason().contains("Maybe"));
    }

    #[tokio::test]
    async fn community_stats_exclude_the_asking_user() {
        let s = SwipeSystem::new();
        s.perform("recordSwipe", &swipe("u1", "i1", "Buy")).await.unwrap();
        s.perform("recordSwipe", &swipe("u2", "i1", "Don't Buy")).await.unwrap();
        s.perform("recordSwipe", &swipe("u3", "i1", "Buy")).await.unwrap();

        let all = s
            .query("_getCommunitySwipeStats", &record! { "itemId": "i1" })
            .await
            .unwrap();
        assert_eq!(all, vec![record! { "total": 3, "approval": 2 }]);

        let others = s
            .query(
                "_getCommunitySwipeStats",
                &record! { "itemId": "i1", "excludeUserId": "u1" },
            )
            .await
            .unwrap();
        assert_eq!(others, vec![record! { "total": 2, "approval": 1 }]);

        let err = s
            .query("_getCommunitySwipeStats", &record! { "itemId": "nope" })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "No community swipes found for this item.");
    }

    #[tokio::test]
    async fn update_returns_the_previous_decision() {
        let s = SwipeSystem::new();
        s.perform("recordSwipe", &swipe("u1", "i1", "Buy")).await.unwrap();
        let out = s
            .perform(
                "updateDecision",
                &record! {
                    "ownerUserId": "u1",
                    "itemId": "i1",
                    "newDecision": "Don't Buy",
                    "newComment": "you have three lamps",
                },
            )
            .await
            .unwrap();
        assert_eq!(out["oldDecision"], "Buy");

        let comments = s
            .query("_getSwipeComments", &record! { "ownerUserId": "u1", "itemId": "i1" })
            .await
            .unwrap();
        assert_eq!(comments[0]["comments"], json!(["you have three lamps"]));
    }

    #[tokio::test]
    async fn owner_stats_track_increments_and_changes() {
        let s = SwipeSystem::new();
        let bump = |d: &str| record! { "itemOwnerId": "owner", "decision": d };
        s.perform("incrementItemOwnerStats", &bump("Buy")).await.unwrap();
        s.perform("incrementItemOwnerStats", &bump("Don't Buy")).await.unwrap();
        s.perform(
            "adjustItemOwnerStats",
            &record! { "itemOwnerId": "owner", "oldDecision": "Don't Buy", "newDecision": "Buy" },
        )
        .await
        .unwrap();

        let rows = s
            .query("_getItemOwnerStats", &record! { "itemOwnerId": "owner" })
            .await
            .unwrap();
        assert_eq!(rows, vec![record! { "totalBuySwipes": 2, "totalSwipes": 2 }]);
    }

    #[tokio::test]
    async fn rejection_rate_is_the_rounded_buy_share() {
        let s = SwipeSystem::new();
        let args = record! { "itemOwnerId": "owner" };
        let rows = s.query("_getItemOwnerRejectionRate", &args).await.unwrap();
        assert_eq!(rows, vec![record! { "rejectionRate": 0 }]);

        for d in ["Buy", "Don't Buy", "Don't Buy"] {
            s.perform(
                "incrementItemOwnerStats",
                &record! { "itemOwnerId": "owner", "decision": d },
            )
            .await
            .unwrap();
        }
        let rows = s.query("_getItemOwnerRejectionRate", &args).await.unwrap();
        assert_eq!(rows, vec![record! { "rejectionRate": 33 }]);
    }

    #[tokio::test]
    async fn per_user_counts() {
        let s = SwipeSystem::new();
        s.perform("recordSwipe", &swipe("u1", "i1", "Buy")).await.unwrap();
        s.perform("recordSwipe", &swipe("u1", "i2", "Don't Buy")).await.unwrap();
        s.perform("recordSwipe", &swipe("u1", "i3", "Don't Buy")).await.unwrap();

        let count = s.query("_getUserSwipeCount", &record! { "userId": "u1" }).await.unwrap();
        assert_eq!(count, vec![record! { "count": 3 }]);
        let stats = s
            .query("_getUserSwipeStatistics", &record! { "userId": "u1" })
            .await
            .unwrap();
        assert_eq!(stats, vec![record! { "buyCount": 1, "dontBuyCount": 2 }]);
        let none = s
            .query("_getUserSwipeStatistics", &record! { "userId": "u9" })
            .await
            .unwrap();
        assert_eq!(none, vec![record! { "buyCount": 0, "dontBuyCount": 0 }]);
    }
}
