//! Prompt templates for knowledge base answers

use crate::types::RetrievedChunk;

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the context block from filtered chunks
    ///
    /// Each chunk gets a header with its 1-based position, score and source,
    /// followed by its raw text. Chunks are separated by one blank line.
    pub fn build_context(chunks: &[RetrievedChunk]) -> String {
        let context = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                format!(
                    "[Document {} | Relevance: {:.2} | Source: {}]\n{}",
                    i + 1,
                    chunk.score,
                    chunk.source,
                    chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        tracing::info!(
            "Built context from {} chunks ({} characters)",
            chunks.len(),
            context.len()
        );
        context
    }

    /// Build the full prompt around the context and the verbatim question
    pub fn build_rag_prompt(query: &str, context: &str) -> String {
        format!(
            r#"You are an expert assistant that provides accurate, helpful answers based on the provided context documents.

**Context Documents:**
{context}

**User Question:** {query}

**Instructions:**
1. Answer the question based ONLY on the information provided in the context documents
2. If the context doesn't contain enough information to fully answer the question, clearly state what information is missing
3. Include specific references to the source documents when possible
4. Provide a comprehensive but concise answer
5. If there are conflicting information in the sources, acknowledge this and explain the differences

**Answer:**"#,
            context = context,
            query = query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks() -> Vec<RetrievedChunk> {
        vec![
            RetrievedChunk::new("Buckets are global.", 0.9, "s3://kb/s3.md", 1),
            RetrievedChunk::new("Roles grant temporary credentials.", 0.756, "s3://kb/iam.md", 3),
        ]
    }

    #[test]
    fn test_context_format() {
        assert_eq!(
            PromptBuilder::build_context(&chunks()),
            "[Document 1 | Relevance: 0.90 | Source: s3://kb/s3.md]\nBuckets are global.\n\n\
             [Document 2 | Relevance: 0.76 | Source: s3://kb/iam.md]\nRoles grant temporary credentials."
        );
    }

    #[test]
    fn test_context_is_stable() {
        let chunks = chunks();
        assert_eq!(
            PromptBuilder::build_context(&chunks),
            PromptBuilder::build_context(&chunks)
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(PromptBuilder::build_context(&[]), "");
    }

    #[test]
    fn test_prompt_embeds_query_verbatim() {
        let query = "What's the {max} size of an S3 object?\nBe precise.";
        let prompt = PromptBuilder::build_rag_prompt(query, "CTX");

        assert!(prompt.contains(&format!("**User Question:** {}\n", query)));
        assert!(prompt.contains("**Context Documents:**\nCTX\n"));
        assert!(prompt.ends_with("**Answer:**"));
        assert_eq!(prompt.matches("\n5. ").count(), 1);
    }
}
