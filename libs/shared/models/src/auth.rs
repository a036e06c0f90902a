use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => write!(f, "patient"),
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// The caller of a core operation. Passed explicitly into every store and
/// projection call; nothing reads identity from ambient state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(id, Role::Patient)
    }

    pub fn doctor(id: Uuid) -> Self {
        Self::new(id, Role::Doctor)
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl TryFrom<&User> for Actor {
    type Error = AppError;

    fn try_from(user: &User) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;

        // Supabase puts application roles in user metadata when the top-level
        // claim is the database role ("authenticated")
        let role = user
            .role
            .as_deref()
            .and_then(|r| r.parse::<Role>().ok())
            .or_else(|| {
                user.metadata
                    .as_ref()
                    .and_then(|m| m.get("role"))
                    .and_then(|r| r.as_str())
                    .and_then(|r| r.parse::<Role>().ok())
            })
            .ok_or_else(|| AppError::Forbidden("User has no clinic role".to_string()))?;

        Ok(Actor { id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn user(id: &str, role: Option<&str>, metadata: Option<serde_json::Value>) -> User {
        User {
            id: id.to_string(),
            email: None,
            role: role.map(str::to_string),
            metadata,
            created_at: None,
        }
    }

    #[test]
    fn test_actor_from_top_level_role() {
        let id = Uuid::new_v4();
        let actor = Actor::try_from(&user(&id.to_string(), Some("Doctor"), None)).unwrap();
        assert_eq!(actor, Actor::doctor(id));
    }

    #[test]
    fn test_actor_falls_back_to_metadata_role() {
        let id = Uuid::new_v4();
        let actor = Actor::try_from(&user(
            &id.to_string(),
            Some("authenticated"),
            Some(json!({ "role": "admin" })),
        ))
        .unwrap();
        assert!(actor.is_admin());
    }

    #[test]
    fn test_actor_rejects_bad_subject_and_missing_role() {
        assert_matches!(
            Actor::try_from(&user("not-a-uuid", Some("patient"), None)),
            Err(AppError::Auth(_))
        );
        assert_matches!(
            Actor::try_from(&user(&Uuid::new_v4().to_string(), None, None)),
            Err(AppError::Forbidden(_))
        );
    }
}
