use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use assure_core::error::{AssureError, Result};

/// A single retrieved chunk's text content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source_file: Option<String>,
}

/// Common interface over the vector store, so flows don't depend on the
/// concrete backend — mirrors the source's two tool shapes (hybrid search,
/// and an unfiltered-by-query benefits fetch).
#[async_trait]
pub trait RetrievalClient: Send + Sync {
    /// Hybrid (BM25 + vector) search scoped to a product and optional doc
    /// type, matching the source's `RAGTool`.
    async fn hybrid_search(
        &self,
        query: &str,
        product: &str,
        doc_type: Option<&str>,
        top_k: u32,
    ) -> Result<Vec<RetrievedChunk>>;

    /// Pure-keyword fallback used when the hybrid path errors or returns
    /// nothing, per the router's degraded-retrieval edge case.
    async fn lexical_search(
        &self,
        query: &str,
        product: &str,
        top_k: u32,
    ) -> Result<Vec<RetrievedChunk>>;

    /// All `doc_type = benefits` chunks for a product, matching the
    /// source's `BenefitsTool` (limit 500, no query).
    async fn fetch_benefits(&self, product: &str) -> Result<Vec<RetrievedChunk>>;
}

/// HTTP client against a Weaviate-compatible GraphQL endpoint.
pub struct WeaviateClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    alpha: f32,
}

impl WeaviateClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, alpha: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            alpha,
        }
    }

    fn request(&self, body: serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .post(format!("{}/v1/graphql", self.base_url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn run_query(&self, query: String) -> Result<Vec<RetrievedChunk>> {
        let resp = self
            .request(serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| AssureError::Retrieval(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AssureError::Retrieval(format!("{status}: {text}")));
        }

        let parsed: GraphQlResponse = resp
            .json()
            .await
            .map_err(|e| AssureError::Retrieval(e.to_string()))?;

        if let Some(errors) = parsed.errors {
            warn!(?errors, "weaviate returned GraphQL errors");
        }

        Ok(parsed
            .data
            .and_then(|d| d.get)
            .and_then(|g| g.insurance_knowledge_base)
            .unwrap_or_default()
            .into_iter()
            .map(|o| RetrievedChunk {
                content: o.content,
                source_file: o.source_file,
            })
            .collect())
    }
}

#[async_trait]
impl RetrievalClient for WeaviateClient {
    async fn hybrid_search(
        &self,
        query: &str,
        product: &str,
        doc_type: Option<&str>,
        top_k: u32,
    ) -> Result<Vec<RetrievedChunk>> {
        let doc_type_filter = doc_type
            .map(|dt| format!(r#", {{ path: ["doc_type"], operator: Equal, valueText: "{dt}" }}"#))
            .unwrap_or_default();

        let query = format!(
            r#"{{
                Get {{
                    Insurance_Knowledge_Base(
                        hybrid: {{
                            query: "{query}"
                            alpha: {alpha}
                            targetVectors: ["content_vector", "questions_vector"]
                        }}
                        where: {{
                            operator: And
                            operands: [
                                {{ path: ["product_name"], operator: Equal, valueText: "{product}" }}
                                {doc_type_filter}
                            ]
                        }}
                        limit: {top_k}
                    ) {{
                        content
                        source_file
                    }}
                }}
            }}"#,
            query = escape(query),
            alpha = self.alpha,
            product = escape(product),
        );

        self.run_query(query).await
    }

    async fn lexical_search(
        &self,
        query: &str,
        product: &str,
        top_k: u32,
    ) -> Result<Vec<RetrievedChunk>> {
        let query = format!(
            r#"{{
                Get {{
                    Insurance_Knowledge_Base(
                        bm25: {{ query: "{query}" }}
                        where: {{ path: ["product_name"], operator: Equal, valueText: "{product}" }}
                        limit: {top_k}
                    ) {{
                        content
                        source_file
                    }}
                }}
            }}"#,
            query = escape(query),
            product = escape(product),
        );

        self.run_query(query).await
    }

    async fn fetch_benefits(&self, product: &str) -> Result<Vec<RetrievedChunk>> {
        let query = format!(
            r#"{{
                Get {{
                    Insurance_Knowledge_Base(
                        where: {{
                            operator: And
                            operands: [
                                {{ path: ["product_name"], operator: Equal, valueText: "{product}" }}
                                {{ path: ["doc_type"], operator: Equal, valueText: "benefits" }}
                            ]
                        }}
                        limit: 500
                    ) {{
                        content
                        source_file
                    }}
                }}
            }}"#,
            product = escape(product),
        );

        self.run_query(query).await
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    errors: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct GraphQlData {
    #[serde(rename = "Get")]
    get: Option<GraphQlGet>,
}

#[derive(Deserialize)]
struct GraphQlGet {
    #[serde(rename = "Insurance_Knowledge_Base")]
    insurance_knowledge_base: Option<Vec<ObjectProps>>,
}

#[derive(Deserialize)]
struct ObjectProps {
    content: String,
    source_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape(r#"say "hi" \ bye"#), r#"say \"hi\" \\ bye"#);
    }
}
