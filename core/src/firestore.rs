//! Firestore REST adapter.
//!
//! SYSTEM CONTEXT
//! ==============
//! Production deployments keep documents in Firestore. The REST documents
//! API wraps every value in a typed envelope (`stringValue`, `integerValue`
//! and friends), so this module carries a small codec between plain JSON
//! and that envelope form. Merge writes use `PATCH` with an `updateMask`
//! listing the top-level fields being replaced, which is how the API
//! expresses set-with-merge.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::store::{Document, DocumentStore, StoreError};

const DEFAULT_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// How requests authenticate against the Firestore API.
#[derive(Debug, Clone)]
pub enum FirestoreAuth {
    /// Web API key sent as the `key` query parameter (client-side access).
    ApiKey(String),
    /// OAuth bearer token (admin/server-side access).
    Bearer(String),
}

/// `DocumentStore` over the Firestore REST documents API.
pub struct FirestoreStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: FirestoreAuth,
}

impl FirestoreStore {
    #[must_use]
    pub fn new(project_id: impl Into<String>, auth: FirestoreAuth) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            project_id: project_id.into(),
            auth,
        }
    }

    /// Override the API base URL. Used to point tests at a local stub.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn document_url(&self, collection: &str, key: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}/{}",
            self.base_url, self.project_id, collection, key
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            FirestoreAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            FirestoreAuth::Bearer(token) => request.bearer_auth(token),
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, key);
        let response = self
            .apply_auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("get {collection}/{key}: {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let fields = body.get("fields").cloned().unwrap_or_else(|| json!({}));
        Ok(Some(decode_fields(&fields)?))
    }

    async fn set_merge(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError> {
        let url = self.document_url(collection, key);
        let mask = update_mask(&fields);
        let body = json!({ "fields": encode_fields(&fields) });

        let response = self
            .apply_auth(self.http.patch(&url).query(&mask).json(&body))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("set {collection}/{key}: {status}: {body}")));
        }
        Ok(())
    }
}

/// Build the `updateMask.fieldPaths` query pairs for a merge write.
fn update_mask(fields: &Document) -> Vec<(&'static str, String)> {
    fields
        .keys()
        .map(|name| ("updateMask.fieldPaths", name.clone()))
        .collect()
}

// =============================================================================
// VALUE CODEC
// =============================================================================

fn encode_fields(fields: &Document) -> Value {
    let encoded: Map<String, Value> = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect();
    Value::Object(encoded)
}

/// Encode a plain JSON value into the Firestore typed envelope.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                // The API represents 64-bit integers as decimal strings.
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(name, v)| (name.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

fn decode_fields(fields: &Value) -> Result<Document, StoreError> {
    let Some(map) = fields.as_object() else {
        return Err(StoreError::Decode(format!("fields is {fields}, expected object")));
    };
    map.iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

/// Decode a Firestore typed envelope back into a plain JSON value.
fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some(map) = value.as_object() else {
        return Err(StoreError::Decode(format!("value is {value}, expected envelope")));
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Err(StoreError::Decode("empty value envelope".to_owned()));
    };
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(inner.clone()),
        "integerValue" => {
            let raw = inner
                .as_str()
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| inner.to_string());
            let parsed: i64 = raw
                .parse()
                .map_err(|_| StoreError::Decode(format!("bad integerValue: {raw}")))?;
            Ok(json!(parsed))
        }
        "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" => Ok(inner.clone()),
        "arrayValue" => {
            let items = inner
                .get("values")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let decoded: Vec<Value> = items.iter().map(decode_value).collect::<Result<_, _>>()?;
            Ok(Value::Array(decoded))
        }
        "mapValue" => {
            let fields = inner.get("fields").cloned().unwrap_or_else(|| json!({}));
            Ok(Value::Object(decode_fields(&fields)?))
        }
        other => Err(StoreError::Decode(format!("unsupported value kind: {other}"))),
    }
}

#[cfg(test)]
#[path = "firestore_test.rs"]
mod tests;
