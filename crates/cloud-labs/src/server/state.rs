//! Application state for the lab server

use std::sync::Arc;
use std::time::Duration;

use crate::config::LabConfig;
use crate::error::{Error, Result};
use crate::pipeline::RagPipeline;
use crate::providers::aws::{
    AwsAuth, BedrockGenerator, DynamoDbClient, KnowledgeBaseManager, KnowledgeBaseRetriever,
    PollyClient, S3Client, TextractClient,
};
use crate::providers::{
    Generator, ItemTable, ObjectStore, Retriever, SpeechSynthesizer, TextExtractor,
};
use crate::speech::DocumentSpeechHandler;
use crate::trace::{NoopEmitter, SegmentEmitter, TraceLabHandler, UdpEmitter};

/// Clients the handlers are built from
pub struct Services {
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub extractor: Arc<dyn TextExtractor>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub store: Arc<dyn ObjectStore>,
    pub table: Arc<dyn ItemTable>,
    pub emitter: Arc<dyn SegmentEmitter>,
    pub knowledge_bases: Option<Arc<KnowledgeBaseManager>>,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: LabConfig,
    /// Present only when a knowledge base id is configured
    pipeline: Option<RagPipeline>,
    speech: DocumentSpeechHandler,
    trace: TraceLabHandler,
    knowledge_bases: Option<Arc<KnowledgeBaseManager>>,
}

impl AppState {
    /// Build state backed by the AWS clients
    pub async fn new(config: LabConfig) -> Result<Self> {
        tracing::info!("Initializing lab state (region: {})", config.aws.region);

        let auth = Arc::new(AwsAuth::from_env(&config.aws)?);
        if let Some(endpoint) = &config.aws.endpoint_url {
            tracing::info!("Routing AWS calls to {}", endpoint);
        }

        let retriever = Arc::new(KnowledgeBaseRetriever::new(
            Arc::clone(&auth),
            config.rag.knowledge_base_id.clone().unwrap_or_default(),
            config.rag.search_type,
        ));
        let generator = Arc::new(BedrockGenerator::new(Arc::clone(&auth), &config.rag));
        tracing::info!("Bedrock model: {}", generator.model_id());

        let emitter: Arc<dyn SegmentEmitter> = if config.trace.enabled {
            tracing::info!("Trace daemon: {}", config.trace.daemon_address);
            Arc::new(UdpEmitter::new(config.trace.daemon_address.clone()))
        } else {
            Arc::new(NoopEmitter)
        };

        let services = Services {
            retriever,
            generator,
            extractor: Arc::new(TextractClient::new(Arc::clone(&auth))),
            synthesizer: Arc::new(PollyClient::new(Arc::clone(&auth))),
            store: Arc::new(S3Client::new(Arc::clone(&auth))),
            table: Arc::new(DynamoDbClient::new(Arc::clone(&auth))),
            emitter,
            knowledge_bases: Some(Arc::new(KnowledgeBaseManager::new(auth))),
        };

        let state = Self::from_services(config, services)?;
        tracing::info!("Lab state initialized");
        Ok(state)
    }

    /// Build state from explicit clients
    ///
    /// The query pipeline is only enabled when `rag.knowledge_base_id` is set.
    pub fn from_services(config: LabConfig, services: Services) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.aws.request_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let pipeline = if config.rag.knowledge_base_id.is_some() {
            Some(RagPipeline::new(services.retriever, services.generator))
        } else {
            tracing::warn!("No knowledge base id configured; /api/query is disabled");
            None
        };
        let speech = DocumentSpeechHandler::new(
            services.extractor,
            Arc::clone(&services.synthesizer),
            Arc::clone(&services.store),
            config.speech.clone(),
        );
        let trace = TraceLabHandler::new(
            services.table,
            services.store,
            services.emitter,
            http,
            config.trace.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                speech,
                trace,
                knowledge_bases: services.knowledge_bases,
            }),
        })
    }

    pub fn config(&self) -> &LabConfig {
        &self.inner.config
    }

    /// Question answering pipeline, if a knowledge base is configured
    pub fn pipeline(&self) -> Result<&RagPipeline> {
        self.inner
            .pipeline
            .as_ref()
            .ok_or_else(|| Error::Config("knowledge_base_id is not configured".to_string()))
    }

    pub fn speech(&self) -> &DocumentSpeechHandler {
        &self.inner.speech
    }

    pub fn trace(&self) -> &TraceLabHandler {
        &self.inner.trace
    }

    /// Knowledge base administration client, if available
    pub fn knowledge_bases(&self) -> Result<&KnowledgeBaseManager> {
        self.inner
            .knowledge_bases
            .as_deref()
            .ok_or_else(|| {
                Error::Config("Knowledge base administration is not available".to_string())
            })
    }
}
