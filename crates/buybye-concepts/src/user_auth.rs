//! Email/password registration and login.

use async_trait::async_trait;
use buybye_core::concept::arg_str;
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record, Value};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::fresh_id;

pub const NAME: &str = "UserAuth";

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    salt: String,
    digest: String,
}

impl Account {
    /// The user record handed to callers. Never carries credentials.
    fn to_value(&self) -> Value {
        json!({ "_id": self.id, "email": self.email })
    }
}

/// Accounts keyed by email.
#[derive(Debug, Default)]
pub struct UserAuth {
    accounts: RwLock<HashMap<String, Account>>,
}

impl UserAuth {
    pub fn new() -> Self {
        Self::default()
    }

    async fn signup(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let email = arg_str(args, "email")?;
        let password = arg_str(args, "password")?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(ConceptFailure::new("Email already registered."));
        }
        let salt = fresh_id();
        let account = Account {
            id: fresh_id(),
            email: email.to_string(),
            digest: digest(&salt, password),
            salt,
        };
        let user = account.to_value();
        accounts.insert(email.to_string(), account);
        tracing::debug!(email, "registered user");
        Ok(record! { "user": user })
    }

    async fn login(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let email = arg_str(args, "email")?;
        let password = arg_str(args, "password")?;

        let accounts = self.accounts.read().await;
        match accounts.get(email) {
            Some(acc) if acc.digest == digest(&acc.salt, password) => {
                Ok(record! { "user": acc.to_value() })
            }
            _ => Err(ConceptFailure::new("Invalid credentials.")),
        }
    }

    async fn get_user_by_email(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let email = arg_str(args, "email")?;
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(email)
            .map(|acc| record! { "user": acc.to_value() })
            .into_iter()
            .collect())
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl Concept for UserAuth {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(NAME, "signup", &["email", "password"], &["user"]),
            ActionSignature::action(NAME, "login", &["email", "password"], &["user"]),
            ActionSignature::query(NAME, "_getUserByEmail", &["email"], &["user"]),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "signup" => self.signup(args).await,
            "login" => self.login(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        match query {
            "_getUserByEmail" => self.get_user_by_email(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }
}
