//! Pipeline orchestrator

use std::sync::Arc;
use std::time::Instant;

use super::state::{PipelineRun, PipelineState};
use crate::error::Result;
use crate::generation::PromptBuilder;
use crate::providers::{Generator, Retriever};
use crate::retrieval::filter_by_score;
use crate::types::{Query, QueryResult};

/// Retrieval-augmented answering over a knowledge base
///
/// Holds only shared clients, so one instance serves concurrent queries.
#[derive(Clone)]
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
}

impl RagPipeline {
    /// Create a pipeline over the given retriever and generator
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer one query
    ///
    /// Returns the fallback result when nothing clears the threshold.
    /// Retrieval and generation failures propagate unchanged.
    pub async fn run(&self, query: &Query) -> Result<QueryResult> {
        let mut run = PipelineRun::new();
        self.execute(query, &mut run).await
    }

    /// Answer one query, recording the visited states in `run`
    #[tracing::instrument(
        skip(self, query, run),
        fields(max_results = query.max_results(), threshold = query.confidence_threshold())
    )]
    pub async fn execute(&self, query: &Query, run: &mut PipelineRun) -> Result<QueryResult> {
        let started = Instant::now();
        tracing::info!("Processing query: {}", query.text());

        match self.stages(query, run, started).await {
            Ok(result) => {
                tracing::info!(
                    "Query processed in {:.2}s ({} chunks used)",
                    result.processing_time.as_secs_f64(),
                    result.retrieval_count
                );
                Ok(result)
            }
            Err(e) => {
                run.fail();
                tracing::error!("Query processing failed: {}", e);
                Err(e)
            }
        }
    }

    async fn stages(
        &self,
        query: &Query,
        run: &mut PipelineRun,
        started: Instant,
    ) -> Result<QueryResult> {
        query.validate()?;

        run.advance(PipelineState::Retrieving)?;
        let chunks = self
            .retriever
            .retrieve(query.text(), query.max_results())
            .await?;

        run.advance(PipelineState::Filtering)?;
        let relevant = filter_by_score(chunks, query.confidence_threshold());

        if relevant.is_empty() {
            tracing::warn!("No relevant documents found above confidence threshold");
            run.advance(PipelineState::Done)?;
            return Ok(QueryResult::fallback(query.text(), started.elapsed()));
        }

        run.advance(PipelineState::BuildingContext)?;
        let context = PromptBuilder::build_context(&relevant);
        let prompt = PromptBuilder::build_rag_prompt(query.text(), &context);

        run.advance(PipelineState::Generating)?;
        let response = self.generator.generate(&prompt).await?;
        tracing::info!("Generated response ({} characters)", response.len());

        run.advance(PipelineState::Done)?;
        Ok(QueryResult::answered(
            query.text(),
            response,
            &relevant,
            started.elapsed(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::generator::MockGenerator;
    use crate::providers::retriever::MockRetriever;
    use crate::types::{RetrievedChunk, FALLBACK_RESPONSE};
    use PipelineState::*;

    fn retriever_returning(chunks: Vec<RetrievedChunk>) -> MockRetriever {
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .times(1)
            .returning(move |_, _| Ok(chunks.clone()));
        retriever
    }

    fn unused_generator() -> MockGenerator {
        let mut generator = MockGenerator::new();
        generator.expect_generate().times(0);
        generator
    }

    fn pipeline(retriever: MockRetriever, generator: MockGenerator) -> RagPipeline {
        RagPipeline::new(Arc::new(retriever), Arc::new(generator))
    }

    #[tokio::test]
    async fn test_empty_retrieval_falls_back() {
        let pipeline = pipeline(retriever_returning(vec![]), unused_generator());
        let mut run = PipelineRun::new();

        let result = pipeline
            .execute(&Query::new("What is Glacier?"), &mut run)
            .await
            .unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.response, FALLBACK_RESPONSE);
        assert!(result.sources.is_empty());
        assert_eq!(result.confidence_score, 0.0);
        assert_eq!(run.history(), &[Idle, Retrieving, Filtering, Done]);
    }

    #[tokio::test]
    async fn test_nothing_above_threshold_falls_back() {
        let chunks = vec![
            RetrievedChunk::new("a", 0.5, "doc1", 1),
            RetrievedChunk::new("b", 0.6, "doc2", 2),
        ];
        let pipeline = pipeline(retriever_returning(chunks), unused_generator());

        let result = pipeline
            .run(&Query::new("q").with_threshold(0.7))
            .await
            .unwrap();

        assert_eq!(result.retrieval_count, 0);
        assert_eq!(result.response, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_answer_with_deduplicated_sources() {
        let chunks = vec![
            RetrievedChunk::new("A", 0.9, "doc1", 1),
            RetrievedChunk::new("B", 0.8, "doc1", 2),
        ];
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| {
                let first = prompt.find("[Document 1 | Relevance: 0.90 | Source: doc1]\nA");
                let second = prompt.find("[Document 2 | Relevance: 0.80 | Source: doc1]\nB");
                matches!((first, second), (Some(f), Some(s)) if f < s)
                    && prompt.contains("**User Question:** How are buckets named?")
            })
            .times(1)
            .returning(|_| Ok("Bucket names are globally unique.".to_string()));

        let pipeline = pipeline(retriever_returning(chunks), generator);
        let mut run = PipelineRun::new();
        let result = pipeline
            .execute(&Query::new("How are buckets named?"), &mut run)
            .await
            .unwrap();

        assert_eq!(result.response, "Bucket names are globally unique.");
        assert_eq!(result.sources, vec!["doc1"]);
        assert_eq!(result.confidence_score, 0.9);
        assert_eq!(result.retrieval_count, 2);
        assert_eq!(result.query, "How are buckets named?");
        assert_eq!(
            run.history(),
            &[Idle, Retrieving, Filtering, BuildingContext, Generating, Done]
        );
    }

    #[tokio::test]
    async fn test_only_passing_chunks_reach_the_prompt() {
        let chunks = vec![
            RetrievedChunk::new("kept", 0.75, "s3://kb/a.md", 1),
            RetrievedChunk::new("dropped", 0.4, "s3://kb/b.md", 2),
            RetrievedChunk::new("also kept", 0.95, "s3://kb/c.md", 3),
        ];
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .withf(|prompt: &str| {
                !prompt.contains("dropped")
                    && prompt.contains("[Document 2 | Relevance: 0.95 | Source: s3://kb/c.md]")
            })
            .times(1)
            .returning(|_| Ok("answer".to_string()));

        let result = pipeline(retriever_returning(chunks), generator)
            .run(&Query::new("q"))
            .await
            .unwrap();

        assert_eq!(result.sources, vec!["s3://kb/a.md", "s3://kb/c.md"]);
        assert_eq!(result.confidence_score, 0.95);
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let mut generator = MockGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(Error::generation("model unavailable")));

        let pipeline = pipeline(
            retriever_returning(vec![RetrievedChunk::new("A", 0.9, "doc1", 1)]),
            generator,
        );
        let mut run = PipelineRun::new();
        let err = pipeline
            .execute(&Query::new("q"), &mut run)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(run.state(), Failed);
        assert_eq!(
            run.history(),
            &[Idle, Retrieving, Filtering, BuildingContext, Generating, Failed]
        );
    }

    #[tokio::test]
    async fn test_retrieval_failure_propagates() {
        let mut retriever = MockRetriever::new();
        retriever
            .expect_retrieve()
            .withf(|query: &str, max_results: &usize| query == "q" && *max_results == 3)
            .times(1)
            .returning(|_, _| Err(Error::retrieval("timeout")));

        let pipeline = pipeline(retriever, unused_generator());
        let mut run = PipelineRun::new();
        let err = pipeline
            .execute(&Query::new("q").with_max_results(3), &mut run)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Retrieval(_)));
        assert_eq!(run.history(), &[Idle, Retrieving, Failed]);
    }

    #[tokio::test]
    async fn test_invalid_query_never_calls_out() {
        let mut retriever = MockRetriever::new();
        retriever.expect_retrieve().times(0);

        let pipeline = pipeline(retriever, unused_generator());
        let err = pipeline.run(&Query::new("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_run_cannot_be_reused() {
        let pipeline = pipeline(retriever_returning(vec![]), unused_generator());
        let mut run = PipelineRun::new();
        pipeline.execute(&Query::new("q"), &mut run).await.unwrap();

        let mut retriever = MockRetriever::new();
        retriever.expect_retrieve().times(0);
        let second = RagPipeline::new(Arc::new(retriever), Arc::new(unused_generator()));
        assert!(second.execute(&Query::new("q"), &mut run).await.is_err());
        assert_eq!(run.state(), Done);
    }
}
