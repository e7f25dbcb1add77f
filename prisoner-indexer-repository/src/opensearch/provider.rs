//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `DocumentIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::{
        request::JsonBody,
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
    indices::{
        IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetAliasParts,
    },
    BulkParts, CountParts, DeleteParts, GetParts, IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::DocumentIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::types::{BatchOperationResult, BatchOperationSummary};
use prisoner_indexer_shared::{PrisonerDocument, SyncIndex};

/// Default per-request timeout for OpenSearch calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use prisoner_indexer_repository::opensearch::IndexConfig;
/// use prisoner_indexer_shared::SyncIndex;
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", IndexConfig::default()).await?;
/// provider.create_index(SyncIndex::A).await?;
/// provider.switch_alias(SyncIndex::A).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration containing the alias
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            alias = %index_config.alias,
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Resolve a `SyncIndex` to its physical index name.
    fn index_name(&self, index: SyncIndex) -> Result<String, SearchIndexError> {
        self.index_config.index_name(index).ok_or_else(|| {
            SearchIndexError::validation("No physical index exists for SyncIndex::None")
        })
    }

    /// Return the response if successful, otherwise turn its status and body into an error.
    async fn check(
        response: Response,
        operation: &str,
        otherwise: fn(String) -> SearchIndexError,
    ) -> Result<Response, SearchIndexError> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %error_body, operation = operation, "OpenSearch request failed");
        Err(SearchIndexError::from_status(
            status.as_u16(),
            &error_body,
            otherwise,
        ))
    }

    /// Build the actions for an alias switch, removing the alias from `previous`
    /// when it points elsewhere.
    fn alias_actions(alias: &str, previous: Option<&str>, next: &str) -> Value {
        let mut actions = Vec::with_capacity(2);
        if let Some(previous) = previous.filter(|previous| *previous != next) {
            actions.push(json!({ "remove": { "index": previous, "alias": alias } }));
        }
        actions.push(json!({ "add": { "index": next, "alias": alias } }));
        json!({ "actions": actions })
    }

    /// Parse the per-item results of a bulk response.
    fn parse_bulk_response(
        body: &Value,
        documents: &[PrisonerDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        let items = body["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("Bulk response has no items"))?;

        let results = documents
            .iter()
            .zip(items.iter())
            .map(|(document, item)| {
                let outcome = &item["index"];
                let failed = outcome.get("error").is_some();
                BatchOperationResult {
                    prisoner_number: document.prisoner_number.clone(),
                    success: !failed,
                    error: failed.then(|| SearchIndexError::index(outcome["error"].to_string())),
                }
            })
            .collect();

        Ok(BatchOperationSummary::from_results(results))
    }
}

#[async_trait]
impl DocumentIndexProvider for OpenSearchProvider {
    async fn create_index(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&name))
            .body(get_index_settings())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check(response, "create_index", SearchIndexError::IndexAdminError).await?;

        info!(index = %name, "Created index");
        Ok(())
    }

    async fn delete_index(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[&name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // 404 is acceptable - index may not exist
        if response.status_code().as_u16() == 404 {
            debug!(index = %name, "Index to delete did not exist");
            return Ok(());
        }
        Self::check(response, "delete_index", SearchIndexError::IndexAdminError).await?;

        info!(index = %name, "Deleted index");
        Ok(())
    }

    async fn index_exists(&self, index: SyncIndex) -> Result<bool, SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            _ => Self::check(response, "index_exists", SearchIndexError::IndexAdminError)
                .await
                .map(|_| false),
        }
    }

    async fn count(&self, index: SyncIndex) -> Result<u64, SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .count(CountParts::Index(&[&name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(0);
        }
        let response = Self::check(response, "count", SearchIndexError::IndexAdminError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        body["count"]
            .as_u64()
            .ok_or_else(|| SearchIndexError::parse(format!("Count response missing count: {}", body)))
    }

    async fn get_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<Option<PrisonerDocument>, SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .get(GetParts::IndexId(&name, prisoner_number))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check(response, "get_document", SearchIndexError::IndexError).await?;

        let mut body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        if !body["found"].as_bool().unwrap_or(false) {
            return Ok(None);
        }

        let document = serde_json::from_value(body["_source"].take())
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        Ok(Some(document))
    }

    async fn put_document(
        &self,
        index: SyncIndex,
        document: &PrisonerDocument,
    ) -> Result<(), SearchIndexError> {
        let name = self.index_name(index)?;
        let body =
            serde_json::to_value(document).map_err(|e| SearchIndexError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&name, document.document_id()))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check(response, "put_document", SearchIndexError::IndexError).await?;

        debug!(index = %name, prisoner_number = %document.prisoner_number, "Document indexed");
        Ok(())
    }

    async fn bulk_put_documents(
        &self,
        index: SyncIndex,
        documents: &[PrisonerDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }
        let name = self.index_name(index)?;

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            let source = serde_json::to_value(document)
                .map_err(|e| SearchIndexError::serialization(e.to_string()))?;
            body.push(json!({ "index": { "_id": document.document_id() } }).into());
            body.push(source.into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&name))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let response = Self::check(response, "bulk_put_documents", SearchIndexError::BulkIndexError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(&body, documents)?;
        debug!(
            index = %name,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk index completed"
        );
        Ok(summary)
    }

    async fn delete_document(
        &self,
        index: SyncIndex,
        prisoner_number: &str,
    ) -> Result<(), SearchIndexError> {
        let name = self.index_name(index)?;

        let response = self
            .client
            .delete(DeleteParts::IndexId(&name, prisoner_number))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        // 404 is acceptable - document may not exist
        if response.status_code().as_u16() == 404 {
            return Ok(());
        }
        Self::check(response, "delete_document", SearchIndexError::DeleteError).await?;

        debug!(index = %name, prisoner_number = %prisoner_number, "Document deleted");
        Ok(())
    }

    async fn alias_target(&self) -> Result<Option<SyncIndex>, SearchIndexError> {
        let alias = self.index_config.alias.as_str();

        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().as_u16() == 404 {
            return Ok(None);
        }
        let response = Self::check(response, "alias_target", SearchIndexError::AliasError).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        // Response is keyed by physical index name: { "prisoner-search-a": { "aliases": {...} } }
        let targets: Vec<SyncIndex> = body
            .as_object()
            .map(|indices| {
                indices
                    .keys()
                    .filter_map(|name| self.index_config.index_for_name(name))
                    .collect()
            })
            .unwrap_or_default();

        match targets.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(*index)),
            _ => Err(SearchIndexError::alias(format!(
                "Alias {} resolves to more than one index: {:?}",
                alias, targets
            ))),
        }
    }

    async fn switch_alias(&self, index: SyncIndex) -> Result<(), SearchIndexError> {
        let next = self.index_name(index)?;
        let previous = self
            .alias_target()
            .await?
            .and_then(|previous| self.index_config.index_name(previous));

        let actions = Self::alias_actions(&self.index_config.alias, previous.as_deref(), &next);

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(actions)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        Self::check(response, "switch_alias", SearchIndexError::AliasError).await?;

        info!(
            alias = %self.index_config.alias,
            from = ?previous,
            to = %next,
            "Switched alias"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(prisoner_number: &str) -> PrisonerDocument {
        PrisonerDocument::new(prisoner_number)
    }

    #[test]
    fn test_alias_actions_first_switch_only_adds() {
        let actions =
            OpenSearchProvider::alias_actions("prisoner-search", None, "prisoner-search-a");
        let actions = actions["actions"].as_array().unwrap();

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["add"]["index"], "prisoner-search-a");
        assert_eq!(actions[0]["add"]["alias"], "prisoner-search");
    }

    #[test]
    fn test_alias_actions_removes_previous_target() {
        let actions = OpenSearchProvider::alias_actions(
            "prisoner-search",
            Some("prisoner-search-a"),
            "prisoner-search-b",
        );
        let actions = actions["actions"].as_array().unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0]["remove"]["index"], "prisoner-search-a");
        assert_eq!(actions[1]["add"]["index"], "prisoner-search-b");
    }

    #[test]
    fn test_alias_actions_same_target_is_idempotent() {
        let actions = OpenSearchProvider::alias_actions(
            "prisoner-search",
            Some("prisoner-search-a"),
            "prisoner-search-a",
        );
        assert_eq!(actions["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_bulk_response_reports_item_failures() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "A1111AA", "status": 201 } },
                { "index": { "_id": "A2222AA", "status": 400, "error": { "type": "mapper_parsing_exception" } } }
            ]
        });
        let documents = vec![document("A1111AA"), document("A2222AA")];

        let summary = OpenSearchProvider::parse_bulk_response(&body, &documents).unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].prisoner_number, "A2222AA");
        assert!(summary.results[1].error.is_some());
    }

    #[test]
    fn test_parse_bulk_response_without_items_is_an_error() {
        let result = OpenSearchProvider::parse_bulk_response(&json!({}), &[document("A1111AA")]);
        assert!(matches!(result, Err(SearchIndexError::ParseError(_))));
    }
}
