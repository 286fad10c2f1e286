//! Opaque session tokens mapped to users.

use async_trait::async_trait;
use buybye_core::concept::arg_str;
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::fresh_id;

pub const NAME: &str = "Sessioning";

#[derive(Debug, Default)]
struct Sessions {
    by_session: HashMap<String, String>,
    by_user: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct Sessioning {
    state: RwLock<Sessions>,
}

impl Sessioning {
    pub fn new() -> Self {
        Self::default()
    }

    /// One live session per user: creating again hands back the same token.
    async fn create(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let user = arg_str(args, "user")?;
        let mut state = self.state.write().await;
        if let Some(existing) = state.by_user.get(user) {
            return Ok(record! { "session": existing });
        }
        let session = fresh_id();
        state.by_session.insert(session.clone(), user.to_string());
        state.by_user.insert(user.to_string(), session.clone());
        Ok(record! { "session": session })
    }

    async fn delete(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let session = arg_str(args, "session")?;
        let mut state = self.state.write().await;
        let user = state
            .by_session
            .remove(session)
            .ok_or_else(|| ConceptFailure::new(format!("Session {session} not found.")))?;
        state.by_user.remove(&user);
        Ok(Record::new())
    }

    async fn get_user(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let session = arg_str(args, "session")?;
        let state = self.state.read().await;
        Ok(state
            .by_session
            .get(session)
            .map(|user| record! { "user": user })
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl Concept for Sessioning {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(NAME, "create", &["user"], &["session"]),
            ActionSignature::action(NAME, "delete", &["session"], &[]),
            ActionSignature::query(NAME, "_getUser", &["session"], &["user"]),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "create" => self.create(args).await,
            "delete" => self.delete(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        match query {
            "_getUser" => self.get_user(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }
}
