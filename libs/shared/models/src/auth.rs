use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

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

/// Who is acting on the scheduling core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Patient,
    Reception,
    Physician { physician_id: i64 },
    Manager,
}

impl Actor {
    pub fn is_reception(&self) -> bool {
        matches!(self, Actor::Reception)
    }

    pub fn is_manager(&self) -> bool {
        matches!(self, Actor::Manager)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Patient => write!(f, "patient"),
            Actor::Reception => write!(f, "reception"),
            Actor::Physician { physician_id } => write!(f, "physician:{}", physician_id),
            Actor::Manager => write!(f, "manager"),
        }
    }
}

impl User {
    /// Map the role claim onto a scheduling actor. Physicians carry their
    /// physician id in `user_metadata.physician_id`.
    pub fn actor(&self) -> Result<Actor, String> {
        let role = self
            .role
            .as_deref()
            .ok_or_else(|| "Token carries no role".to_string())?;

        match role.to_ascii_lowercase().as_str() {
            "patient" | "paciente" => Ok(Actor::Patient),
            "reception" | "receptionist" | "recepcion" => Ok(Actor::Reception),
            "manager" | "admin" | "gerente" => Ok(Actor::Manager),
            "physician" | "doctor" | "medico" => {
                let physician_id = self
                    .metadata
                    .as_ref()
                    .and_then(|meta| meta.get("physician_id"))
                    .and_then(|value| {
                        value
                            .as_i64()
                            .or_else(|| value.as_str().and_then(|raw| raw.parse().ok()))
                    })
                    .ok_or_else(|| "Physician token is missing physician_id".to_string())?;
                Ok(Actor::Physician { physician_id })
            }
            other => Err(format!("Role '{}' cannot act on appointments", other)),
        }
    }
}
