//! Bedrock knowledge base provider
//!
//! Retrieval runs against the agent runtime (`Retrieve`); the manager drives
//! the control plane (knowledge bases, data sources, ingestion jobs).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{uri_encode, AwsAuth, ServiceRequest};
use crate::config::SearchType;
use crate::error::{Error, Result};
use crate::providers::retriever::Retriever;
use crate::types::RetrievedChunk;

const SIGNING_NAME: &str = "bedrock";

/// Knowledge base retriever (vector search over a managed index)
pub struct KnowledgeBaseRetriever {
    auth: Arc<AwsAuth>,
    knowledge_base_id: String,
    search_type: SearchType,
}

impl KnowledgeBaseRetriever {
    /// Create a retriever for one knowledge base
    pub fn new(auth: Arc<AwsAuth>, knowledge_base_id: String, search_type: SearchType) -> Self {
        Self {
            auth,
            knowledge_base_id,
            search_type,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/knowledgebases/{}/retrieve",
            self.auth.endpoint("bedrock-agent-runtime"),
            uri_encode(&self.knowledge_base_id, true)
        )
    }

    fn build_request(&self, query: &str, max_results: usize) -> RetrieveRequest {
        RetrieveRequest {
            retrieval_query: RetrievalQuery {
                text: query.to_string(),
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: max_results,
                    override_search_type: self.search_type,
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest {
    retrieval_query: RetrievalQuery,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Serialize)]
struct RetrievalQuery {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: usize,
    override_search_type: SearchType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Deserialize)]
struct RetrievalResult {
    content: RetrievalContent,
    #[serde(default)]
    score: Option<f32>,
    #[serde(default)]
    location: Option<RetrievalLocation>,
}

#[derive(Deserialize)]
struct RetrievalContent {
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RetrievalLocation {
    #[serde(default)]
    s3_location: Option<UriLocation>,
    #[serde(default)]
    web_location: Option<UrlLocation>,
    #[serde(default)]
    confluence_location: Option<UrlLocation>,
    #[serde(default)]
    salesforce_location: Option<UrlLocation>,
    #[serde(default)]
    share_point_location: Option<UrlLocation>,
}

#[derive(Deserialize)]
struct UriLocation {
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize)]
struct UrlLocation {
    #[serde(default)]
    url: String,
}

impl RetrievalLocation {
    /// Source identifier: the S3 URI when present, otherwise the first URL
    fn source(&self) -> String {
        if let Some(s3) = &self.s3_location {
            if !s3.uri.is_empty() {
                return s3.uri.clone();
            }
        }
        [
            &self.web_location,
            &self.confluence_location,
            &self.salesforce_location,
            &self.share_point_location,
        ]
        .into_iter()
        .flatten()
        .map(|loc| loc.url.clone())
        .find(|url| !url.is_empty())
        .unwrap_or_default()
    }
}

/// Convert a `Retrieve` response body into ranked chunks, preserving order
fn chunks_from_response(response: RetrieveResponse) -> Vec<RetrievedChunk> {
    response
        .retrieval_results
        .into_iter()
        .enumerate()
        .map(|(i, result)| RetrievedChunk {
            text: result.content.text,
            score: result.score.unwrap_or(0.0),
            source: result.location.map(|l| l.source()).unwrap_or_default(),
            rank: i + 1,
        })
        .collect()
}

#[async_trait]
impl Retriever for KnowledgeBaseRetriever {
    #[tracing::instrument(skip(self, query), fields(kb = %self.knowledge_base_id))]
    async fn retrieve(&self, query: &str, max_results: usize) -> Result<Vec<RetrievedChunk>> {
        let request = ServiceRequest::json(
            SIGNING_NAME,
            "Retrieve",
            Method::POST,
            self.endpoint(),
            &self.build_request(query, max_results),
        )
        .map_err(|e| Error::Retrieval(format!("Failed to encode Retrieve request: {}", e)))?;

        let response: RetrieveResponse = self.auth.call(request, Error::Retrieval).await?;
        let chunks = chunks_from_response(response);

        tracing::info!("Retrieved {} documents", chunks.len());
        Ok(chunks)
    }
}

/// Settings for a new vector knowledge base on OpenSearch Serverless
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewKnowledgeBase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub role_arn: String,
    pub embedding_model_arn: String,
    pub collection_arn: String,
    pub vector_index_name: String,
}

/// Settings for a new S3 data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDataSource {
    pub name: String,
    pub bucket_arn: String,
    #[serde(default)]
    pub inclusion_prefixes: Vec<String>,
}

/// Knowledge base administration (control plane)
pub struct KnowledgeBaseManager {
    auth: Arc<AwsAuth>,
}

impl KnowledgeBaseManager {
    pub fn new(auth: Arc<AwsAuth>) -> Self {
        Self { auth }
    }

    fn base(&self) -> String {
        self.auth.endpoint("bedrock-agent")
    }

    /// Create a knowledge base and return its id
    pub async fn create_knowledge_base(&self, kb: &NewKnowledgeBase) -> Result<String> {
        let body = create_knowledge_base_body(kb, &Uuid::new_v4().to_string());
        let request = ServiceRequest::json(
            SIGNING_NAME,
            "CreateKnowledgeBase",
            Method::PUT,
            format!("{}/knowledgebases/", self.base()),
            &body,
        )?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            knowledge_base: KnowledgeBaseRef,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct KnowledgeBaseRef {
            knowledge_base_id: String,
        }

        let response: Response = self.auth.call(request, Error::KnowledgeBase).await?;
        let id = response.knowledge_base.knowledge_base_id;
        tracing::info!("Created Knowledge Base: {}", id);
        Ok(id)
    }

    /// Attach an S3 data source and return its id
    pub async fn add_data_source(
        &self,
        knowledge_base_id: &str,
        source: &NewDataSource,
    ) -> Result<String> {
        let body = add_data_source_body(source, &Uuid::new_v4().to_string());
        let request = ServiceRequest::json(
            SIGNING_NAME,
            "CreateDataSource",
            Method::PUT,
            format!(
                "{}/knowledgebases/{}/datasources/",
                self.base(),
                uri_encode(knowledge_base_id, true)
            ),
            &body,
        )?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            data_source: DataSourceRef,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct DataSourceRef {
            data_source_id: String,
        }

        let response: Response = self.auth.call(request, Error::KnowledgeBase).await?;
        let id = response.data_source.data_source_id;
        tracing::info!("Created data source: {}", id);
        Ok(id)
    }

    /// Start syncing a data source into the index and return the job id
    pub async fn start_ingestion_job(
        &self,
        knowledge_base_id: &str,
        data_source_id: &str,
    ) -> Result<String> {
        let body = serde_json::json!({ "clientToken": Uuid::new_v4().to_string() });
        let request = ServiceRequest::json(
            SIGNING_NAME,
            "StartIngestionJob",
            Method::PUT,
            format!(
                "{}/knowledgebases/{}/datasources/{}/ingestionjobs/",
                self.base(),
                uri_encode(knowledge_base_id, true),
                uri_encode(data_source_id, true)
            ),
            &body,
        )?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Response {
            ingestion_job: IngestionJobRef,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct IngestionJobRef {
            ingestion_job_id: String,
        }

        let response: Response = self.auth.call(request, Error::KnowledgeBase).await?;
        let id = response.ingestion_job.ingestion_job_id;
        tracing::info!("Started ingestion job: {}", id);
        Ok(id)
    }
}

fn create_knowledge_base_body(kb: &NewKnowledgeBase, client_token: &str) -> serde_json::Value {
    serde_json::json!({
        "clientToken": client_token,
        "name": kb.name,
        "description": kb.description,
        "roleArn": kb.role_arn,
        "knowledgeBaseConfiguration": {
            "type": "VECTOR",
            "vectorKnowledgeBaseConfiguration": {
                "embeddingModelArn": kb.embedding_model_arn
            }
        },
        "storageConfiguration": {
            "type": "OPENSEARCH_SERVERLESS",
            "opensearchServerlessConfiguration": {
                "collectionArn": kb.collection_arn,
                "vectorIndexName": kb.vector_index_name,
                "fieldMapping": {
                    "vectorField": "vector",
                    "textField": "text",
                    "metadataField": "metadata"
                }
            }
        }
    })
}

fn add_data_source_body(source: &NewDataSource, client_token: &str) -> serde_json::Value {
    let mut s3_configuration = serde_json::json!({ "bucketArn": source.bucket_arn });
    if !source.inclusion_prefixes.is_empty() {
        s3_configuration["inclusionPrefixes"] = serde_json::json!(source.inclusion_prefixes);
    }

    serde_json::json!({
        "clientToken": client_token,
        "name": source.name,
        "dataSourceConfiguration": {
            "type": "S3",
            "s3Configuration": s3_configuration
        }
    })
}
