use crate::circuit_breaker::{create_crm_circuit_breaker, CrmCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AccountRecord, ContactRecord};
use crate::token::TokenProvider;
use failsafe::futures::CircuitBreaker;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Client for the CRM record store (Zoho-style REST API).
///
/// Covers the collaborator capability set the engine consumes: fetch by id,
/// two independent search paths (criteria search and the COQL query
/// language), related-record listing, update and delete. Every request is
/// authorized through the injected [`TokenProvider`] and guarded by a
/// circuit breaker so a flapping CRM does not cascade into the engine.
#[derive(Clone)]
pub struct ZohoClient {
    client: reqwest::Client,
    api_base: String,
    tokens: TokenProvider,
    breaker: CrmCircuitBreaker,
}

impl ZohoClient {
    pub fn new(api_base: String, tokens: TokenProvider) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::ExternalApi(format!("Failed to create CRM client: {}", e)))?;

        Ok(Self {
            client,
            api_base: format!("{}/crm/v2", api_base.trim_end_matches('/')),
            tokens,
            breaker: create_crm_circuit_breaker(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let tokens = TokenProvider::from_config(config)?;
        Self::new(config.zoho_api_base.clone(), tokens)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        let token = self.tokens.access_token().await?;
        let request = request.header("Authorization", format!("Zoho-oauthtoken {}", token));

        match self.breaker.call(request.send()).await {
            Ok(response) => Ok(response),
            Err(failsafe::Error::Inner(e)) => {
                Err(AppError::ExternalApi(format!("CRM request failed: {}", e)))
            }
            Err(failsafe::Error::Rejected) => Err(AppError::ExternalApi(
                "CRM circuit breaker open, request rejected".to_string(),
            )),
        }
    }

    /// Fetch one record. 204/404 responses are an explicit `NotFound`.
    pub async fn get_record(&self, module: &str, id: &str) -> Result<Value, AppError> {
        let url = format!("{}/{}/{}", self.api_base, module, id);
        let response = self.send(self.client.get(&url)).await?;

        match response.status().as_u16() {
            204 | 404 => {
                return Err(AppError::NotFound(format!("{} {} not found", module, id)))
            }
            code if !(200..300).contains(&code) => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::LookupFailure(format!(
                    "get {}/{} returned {}: {}",
                    module, id, code, body
                )));
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::LookupFailure(format!("Failed to parse {} record: {}", module, e))
        })?;

        body.get("data")
            .and_then(|d| d.as_array())
            .and_then(|a| a.first())
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{} {} not found", module, id)))
    }

    pub async fn get_contact(&self, id: &str) -> Result<ContactRecord, AppError> {
        let value = self.get_record(crate::models::CONTACTS_MODULE, id).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::LookupFailure(format!("Failed to parse contact {}: {}", id, e)))
    }

    pub async fn get_account(&self, id: &str) -> Result<AccountRecord, AppError> {
        let value = self.get_record(crate::models::ACCOUNTS_MODULE, id).await?;
        serde_json::from_value(value)
            .map_err(|e| AppError::LookupFailure(format!("Failed to parse account {}: {}", id, e)))
    }

    /// Criteria-search path: `GET /{module}/search?criteria=(...)`.
    /// Returns matching record ids. An HTTP 400 means the criteria
    /// expression itself was rejected (`InvalidCriteria`).
    pub async fn search_ids(&self, module: &str, criteria: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/{}/search", self.api_base, module);
        let response = self
            .send(self.client.get(&url).query(&[("criteria", criteria)]))
            .await?;

        match response.status().as_u16() {
            204 => return Ok(Vec::new()),
            400 => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::InvalidCriteria(format!(
                    "search criteria rejected for {}: {}",
                    module, body
                )));
            }
            code if !(200..300).contains(&code) => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::LookupFailure(format!(
                    "search in {} returned {}: {}",
                    module, code, body
                )));
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::LookupFailure(format!("Failed to parse search response: {}", e))
        })?;
        Ok(extract_ids(&body))
    }

    /// Query-language path: `POST /coql` with a select statement. The second,
    /// independent lookup path. The two can return different result sets
    /// and are always both consulted by Candidate Discovery.
    pub async fn coql_ids(&self, select_query: &str) -> Result<Vec<String>, AppError> {
        let url = format!("{}/coql", self.api_base);
        let body = json!({ "select_query": select_query });
        let response = self.send(self.client.post(&url).json(&body)).await?;

        match response.status().as_u16() {
            204 => return Ok(Vec::new()),
            400 => {
                let text = response.text().await.unwrap_or_default();
                return Err(AppError::InvalidCriteria(format!(
                    "COQL query rejected: {}",
                    text
                )));
            }
            code if !(200..300).contains(&code) => {
                let text = response.text().await.unwrap_or_default();
                return Err(AppError::LookupFailure(format!(
                    "COQL query returned {}: {}",
                    code, text
                )));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::LookupFailure(format!("Failed to parse COQL response: {}", e)))?;
        Ok(extract_ids(&body))
    }

    /// List records related to `id` through a related list (e.g. Deals of a
    /// Contact). 204 means no related records.
    pub async fn related_records(
        &self,
        module: &str,
        id: &str,
        related_list: &str,
    ) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/{}/{}/{}", self.api_base, module, id, related_list);
        let response = self.send(self.client.get(&url)).await?;

        match response.status().as_u16() {
            204 => return Ok(Vec::new()),
            code if !(200..300).contains(&code) => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::LookupFailure(format!(
                    "related {} of {}/{} returned {}: {}",
                    related_list, module, id, code, body
                )));
            }
            _ => {}
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::LookupFailure(format!("Failed to parse related records: {}", e))
        })?;
        Ok(body
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Update one record. The CRM reports per-record status inside a 2xx
    /// envelope, so both the HTTP code and the `status` field are checked.
    pub async fn update_record(
        &self,
        module: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        let url = format!("{}/{}/{}", self.api_base, module, id);
        let body = json!({ "data": [Value::Object(fields)] });
        let response = self.send(self.client.put(&url).json(&body)).await?;

        let code = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let record_status = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|a| a.first())
            .and_then(|r| r.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or("");

        if !(200..300).contains(&code) || record_status != "success" {
            return Err(AppError::UpdateFailure(format!(
                "update {}/{} returned {} ({})",
                module, id, code, record_status
            )));
        }

        tracing::debug!("Updated {}/{}", module, id);
        Ok(())
    }

    /// Delete one record. Workflow triggers are suppressed so the deletion
    /// does not fan out automation on the loser record.
    pub async fn delete_record(&self, module: &str, id: &str) -> Result<(), AppError> {
        let url = format!("{}/{}/{}", self.api_base, module, id);
        let response = self
            .send(self.client.delete(&url).query(&[("wf_trigger", "false")]))
            .await?;

        let code = response.status().as_u16();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let record_status = body
            .get("data")
            .and_then(|d| d.as_array())
            .and_then(|a| a.first())
            .and_then(|r| r.get("status"))
            .and_then(|s| s.as_str())
            .unwrap_or("");

        if !(200..300).contains(&code) || record_status != "success" {
            return Err(AppError::DeleteFailure(format!(
                "delete {}/{} returned {} ({})",
                module, id, code, record_status
            )));
        }

        tracing::info!("Deleted {}/{}", module, id);
        Ok(())
    }
}

/// Pull record ids out of a `{"data":[...]}` envelope. Ids may arrive as
/// strings or (from COQL) numbers.
fn extract_ids(body: &Value) -> Vec<String> {
    body.get("data")
        .and_then(|d| d.as_array())
        .map(|records| {
            records
                .iter()
                .filter_map(|r| match r.get("id") {
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}
