//! Display name, picture and interests for each user.

use async_trait::async_trait;
use buybye_core::concept::arg_str;
use buybye_core::{record, ActionSignature, Concept, ConceptFailure, Record, Value};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::arg_strings;

pub const NAME: &str = "UserProfile";

const MISSING: &str = "Profile does not exist for this user.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    user: String,
    name: String,
    email: String,
    profile_picture: String,
    fields_of_interests: Vec<String>,
}

#[derive(Debug, Default)]
pub struct UserProfile {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl UserProfile {
    pub fn new() -> Self {
        Self::default()
    }

    async fn create_user(&self, args: &Record) -> Result<Record, ConceptFailure> {
        let uid = arg_str(args, "uid")?;
        let profile = Profile {
            user: uid.to_string(),
            name: arg_str(args, "name")?.to_string(),
            email: arg_str(args, "email")?.to_string(),
            profile_picture: arg_str(args, "profilePicture")?.to_string(),
            fields_of_interests: arg_strings(args, "fieldOfInterests")?,
        };

        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(uid) {
            return Err(ConceptFailure::new("Profile already exists for this user."));
        }
        let out = to_value(&profile)?;
        profiles.insert(uid.to_string(), profile);
        Ok(record! { "profile": out })
    }

    async fn update(
        &self,
        args: &Record,
        apply: impl FnOnce(&mut Profile) -> Result<(), ConceptFailure>,
    ) -> Result<Record, ConceptFailure> {
        let user = arg_str(args, "user")?;
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user)
            .ok_or_else(|| ConceptFailure::new(MISSING))?;
        apply(profile)?;
        Ok(Record::new())
    }

    async fn get_profile(&self, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        let user = arg_str(args, "user")?;
        let profiles = self.profiles.read().await;
        profiles
            .get(user)
            .map(|p| to_value(p).map(|v| record! { "profile": v }))
            .into_iter()
            .collect()
    }
}

fn to_value(profile: &Profile) -> Result<Value, ConceptFailure> {
    serde_json::to_value(profile).map_err(|e| ConceptFailure::new(e.to_string()))
}

#[async_trait]
impl Concept for UserProfile {
    fn name(&self) -> &str {
        NAME
    }

    fn signatures(&self) -> Vec<ActionSignature> {
        vec![
            ActionSignature::action(
                NAME,
                "createUser",
                &["uid", "name", "email", "profilePicture", "fieldOfInterests"],
                &["profile"],
            ),
            ActionSignature::action(NAME, "updateProfileName", &["user", "name"], &[]),
            ActionSignature::action(NAME, "updateProfilePicture", &["user", "profilePicture"], &[]),
            ActionSignature::action(NAME, "updateInterests", &["user", "interests"], &[]),
            ActionSignature::query(NAME, "_getProfile", &["user"], &["profile"]),
        ]
    }

    async fn perform(&self, action: &str, args: &Record) -> Result<Record, ConceptFailure> {
        match action {
            "createUser" => self.create_user(args).await,
            "updateProfileName" => {
                let name = arg_str(args, "name")?.to_string();
                self.update(args, |p| {
                    p.name = name;
                    Ok(())
                })
                .await
            }
            "updateProfilePicture" => {
                let picture = arg_str(args, "profilePicture")?.to_string();
                self.update(args, |p| {
                    p.profile_picture = picture;
                    Ok(())
                })
                .await
            }
            "updateInterests" => {
                let interests = arg_strings(args, "interests")?;
                self.update(args, |p| {
                    p.fields_of_interests = interests;
                    Ok(())
                })
                .await
            }
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }

    async fn query(&self, query: &str, args: &Record) -> Result<Vec<Record>, ConceptFailure> {
        match query {
            "_getProfile" => self.get_profile(args).await,
            other => Err(ConceptFailure::unknown_operation(NAME, other)),
        }
    }
}
