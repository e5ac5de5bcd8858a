use minirag_core::types::Chunk;

pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant answering questions based on the provided context.\n\n\
Use the following pieces of context to answer the question at the end. If you don't know the answer based on the \
context, just say that you don't know, don't try to make up an answer.";

/// Stuff every context into a single prompt, separated by blank lines.
pub fn render_prompt(question: &str, contexts: &[Chunk]) -> String {
    let context = contexts.iter().map(|c| c.content.trim()).collect::<Vec<_>>().join("\n\n");
    format!("{SYSTEM_PREAMBLE}\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use minirag_core::types::{ChunkMetadata, DocumentFormat};

    fn chunk(content: &str) -> Chunk {
        Chunk {
            id: "x:0".into(),
            content: content.into(),
            metadata: ChunkMetadata {
                source: "x.txt".into(),
                page: None,
                format: DocumentFormat::Text,
                chunk_index: 0,
                total_chunks: 1,
                start_index: 0,
            },
        }
    }

    #[test]
    fn contexts_are_joined_with_blank_lines() {
        let prompt = render_prompt("What colour is the sky?", &[chunk("The sky is blue. "), chunk("Grass is green.")]);
        assert!(prompt.contains("Context:\nThe sky is blue.\n\nGrass is green.\n\nQuestion: What colour is the sky?"));
        assert!(prompt.ends_with("Answer:"));
        assert!(prompt.contains("just say that you don't know"));
    }

    #[test]
    fn question_text_is_inserted_verbatim() {
        let prompt = render_prompt("{context}?", &[]);
        assert!(prompt.contains("Question: {context}?"));
    }
}
