use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::error::NotificationError;
use crate::models::PatientContact;

/// Resolves where a patient's notifications go.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    async fn contact(&self, patient_id: i64) -> Result<Option<PatientContact>, NotificationError>;
}

#[derive(Default)]
pub struct InMemoryPatientDirectory {
    contacts: RwLock<HashMap<i64, PatientContact>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, contact: PatientContact) {
        self.contacts.write().await.insert(contact.patient_id, contact);
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn contact(&self, patient_id: i64) -> Result<Option<PatientContact>, NotificationError> {
        Ok(self.contacts.read().await.get(&patient_id).cloned())
    }
}

pub struct SupabasePatientDirectory {
    supabase: SupabaseClient,
}

#[derive(Deserialize)]
struct PatientRow {
    id: i64,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    full_name: Option<String>,
}

impl SupabasePatientDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl PatientDirectory for SupabasePatientDirectory {
    async fn contact(&self, patient_id: i64) -> Result<Option<PatientContact>, NotificationError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id,email,full_name", patient_id);
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| NotificationError::Storage(e.to_string()))?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let row: PatientRow = serde_json::from_value(row)
            .map_err(|e| NotificationError::Storage(format!("bad patient row: {}", e)))?;

        // A patient without an address on file cannot be notified.
        Ok(row
            .email
            .filter(|email| !email.trim().is_empty())
            .map(|email| PatientContact {
                patient_id: row.id,
                email,
                full_name: row.full_name,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn directory_for(server: &MockServer) -> SupabasePatientDirectory {
        SupabasePatientDirectory::new(&AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "anon".to_string(),
            ..AppConfig::default()
        })
    }

    #[tokio::test]
    async fn resolves_contact_from_patients_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .and(query_param("id", "eq.12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 12, "email": "ana@example.com", "full_name": "Ana Ruiz"}
            ])))
            .mount(&server)
            .await;

        let contact = directory_for(&server).await.contact(12).await.unwrap();
        assert_eq!(
            contact,
            Some(PatientContact {
                patient_id: 12,
                email: "ana@example.com".to_string(),
                full_name: Some("Ana Ruiz".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn blank_email_means_no_contact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/patients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 12, "email": "  ", "full_name": null}
            ])))
            .mount(&server)
            .await;

        assert_eq!(directory_for(&server).await.contact(12).await.unwrap(), None);
    }
}
