//! Databricks vector search index client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Chunk, Retriever, RetrieverError, SearchQuery};
use crate::config::RetrieverConfig;

/// Queries `POST {host}/api/2.0/vector-search/indexes/{index}/query`
pub struct VectorSearchRetriever {
    url: String,
    token: String,
    http: Client,
    default_columns: Vec<String>,
    id_column: String,
    text_column: String,
}

impl VectorSearchRetriever {
    pub fn new(host: &str, token: String, config: &RetrieverConfig, timeout_ms: u64) -> Result<Self, RetrieverError> {
        if config.index.trim().is_empty() {
            return Err(RetrieverError::Config("vector search index name is empty".to_string()));
        }
        let url = format!(
            "{}/api/2.0/vector-search/indexes/{}/query",
            host.trim_end_matches('/'),
            config.index
        );
        debug!(%url, "VectorSearchRetriever::new: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(RetrieverError::Network)?;

        Ok(Self {
            url,
            token,
            http,
            default_columns: config.columns.clone(),
            id_column: config.id_column.clone(),
            text_column: config.text_column.clone(),
        })
    }

    fn build_body(&self, query: &SearchQuery) -> serde_json::Value {
        let mut columns = if query.columns.is_empty() {
            self.default_columns.clone()
        } else {
            query.columns.clone()
        };
        // The id and text columns are needed to build chunks
        for required in [&self.id_column, &self.text_column] {
            if !columns.contains(required) {
                columns.push(required.clone());
            }
        }

        serde_json::json!({
            "query_text": query.text,
            "num_results": query.top_k,
            "columns": columns,
            "query_type": query.mode.as_query_type(),
        })
    }

    fn parse_response(&self, response: QueryResponse) -> Result<Vec<Chunk>, RetrieverError> {
        let names: Vec<String> = response.manifest.columns.into_iter().map(|c| c.name).collect();
        let position = |name: &str| names.iter().position(|n| n == name);

        let id_idx = position(&self.id_column).ok_or_else(|| {
            RetrieverError::InvalidResponse(format!("response has no '{}' column", self.id_column))
        })?;
        let text_idx = position(&self.text_column).ok_or_else(|| {
            RetrieverError::InvalidResponse(format!("response has no '{}' column", self.text_column))
        })?;

        let rows = response.result.map(|r| r.data_array).unwrap_or_default();
        let mut chunks = Vec::with_capacity(rows.len());
        for (row_num, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(RetrieverError::InvalidResponse(format!(
                    "row {} has {} values for {} columns",
                    row_num,
                    row.len(),
                    names.len()
                )));
            }

            let id = match &row[id_idx] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => {
                    warn!(row_num, "parse_response: skipping row without id");
                    continue;
                }
                other => other.to_string(),
            };
            let content = row[text_idx].as_str().unwrap_or_default().to_string();

            let metadata = names
                .iter()
                .zip(row)
                .enumerate()
                .filter(|(idx, _)| *idx != id_idx && *idx != text_idx)
                .map(|(_, (name, value))| (name.clone(), value))
                .collect();

            chunks.push(Chunk { id, content, metadata });
        }
        Ok(chunks)
    }
}

#[async_trait]
impl Retriever for VectorSearchRetriever {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Chunk>, RetrieverError> {
        debug!(top_k = query.top_k, mode = ?query.mode, "search: called");
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&self.build_body(query))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrieverError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RetrieverError::InvalidResponse(e.to_string()))?;
        let mut chunks = self.parse_response(parsed)?;
        chunks.truncate(query.top_k);
        debug!(count = chunks.len(), "search: done");
        Ok(chunks)
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    manifest: Manifest,
    result: Option<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    data_array: Vec<Vec<serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::SearchMode;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const QUERY_PATH: &str = "/api/2.0/vector-search/indexes/main.docs.index/query";

    fn retriever(server: &MockServer) -> VectorSearchRetriever {
        let config = RetrieverConfig {
            index: "main.docs.index".to_string(),
            ..Default::default()
        };
        VectorSearchRetriever::new(&server.uri(), "dapi-test".to_string(), &config, 5_000).unwrap()
    }

    fn query(text: &str) -> SearchQuery {
        SearchQuery {
            text: text.to_string(),
            top_k: 10,
            mode: SearchMode::Hybrid,
            columns: vec![],
        }
    }

    #[tokio::test]
    async fn test_search_parses_manifest_and_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .and(header("authorization", "Bearer dapi-test"))
            .and(body_partial_json(serde_json::json!({
                "query_text": "nightly etl job",
                "num_results": 10,
                "query_type": "HYBRID"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "manifest": {
                    "column_count": 4,
                    "columns": [{"name": "id"}, {"name": "content"}, {"name": "url"}, {"name": "score"}]
                },
                "result": {
                    "row_count": 2,
                    "data_array": [
                        ["jobs-1", "Create a job with the Jobs API.", "https://docs/jobs", 0.91],
                        [42, "Schedule with cron.", "https://docs/cron", 0.80]
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let chunks = retriever(&server).search(&query("nightly etl job")).await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "jobs-1");
        assert_eq!(chunks[0].content, "Create a job with the Jobs API.");
        assert_eq!(chunks[0].metadata["url"], "https://docs/jobs");
        assert!(chunks[0].metadata.contains_key("score"));
        assert!(!chunks[0].metadata.contains_key("id"));
        assert_eq!(chunks[1].id, "42");
    }

    #[tokio::test]
    async fn test_search_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "manifest": { "columns": [{"name": "id"}, {"name": "content"}] },
                "result": { "row_count": 0 }
            })))
            .mount(&server)
            .await;

        let chunks = retriever(&server).search(&query("anything")).await.unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_search_missing_id_column() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "manifest": { "columns": [{"name": "content"}] },
                "result": { "data_array": [["text"]] }
            })))
            .mount(&server)
            .await;

        let err = retriever(&server).search(&query("q")).await.unwrap_err();
        assert!(matches!(err, RetrieverError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_search_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("index not ready"))
            .mount(&server)
            .await;

        let err = retriever(&server).search(&query("q")).await.unwrap_err();
        assert!(matches!(err, RetrieverError::Api { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn test_build_body_adds_required_columns() {
        let config = RetrieverConfig {
            index: "i".to_string(),
            ..Default::default()
        };
        let r = VectorSearchRetriever::new("https://h", "t".to_string(), &config, 1000).unwrap();
        let mut q = query("q");
        q.columns = vec!["url".to_string()];
        q.mode = SearchMode::Ann;

        let body = r.build_body(&q);
        assert_eq!(body["columns"], serde_json::json!(["url", "id", "content"]));
        assert_eq!(body["query_type"], "ANN");
    }
}
