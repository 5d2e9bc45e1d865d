//! Prompt augmentation with retrieved context.

const CONTEXT_HEADER: &str = "Context:";
const CONTEXT_INSTRUCTION: &str =
    "Use the context above to answer the question below. If the context does not contain the answer, say so instead of guessing.";
const QUESTION_HEADER: &str = "Question:";

/// Builds the prompt sent to the language model.
///
/// With no context the prompt is returned unchanged. Otherwise both the context
/// and the prompt are embedded verbatim, never trimmed or truncated.
pub fn augment(original_prompt: &str, context: Option<&str>) -> String {
    let Some(context) = context else {
        return original_prompt.to_string();
    };

    format!(
        "{}\n{}\n\n{}\n\n{}\n{}",
        CONTEXT_HEADER, context, CONTEXT_INSTRUCTION, QUESTION_HEADER, original_prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_context_returns_prompt_unchanged() {
        assert_eq!(augment("What is RAG?", None), "What is RAG?");
        assert_eq!(augment("", None), "");
    }

    #[test]
    fn context_and_prompt_appear_verbatim() {
        let prompt = "  How do foxes sleep?\n";
        let context = "The quick brown fox.\n\nThe lazy dog sleeps.  ";
        let out = augment(prompt, Some(context));

        assert!(out.contains(context));
        assert!(out.contains(prompt));
        assert!(out.find(context).unwrap() < out.find(prompt).unwrap());
    }

    #[test]
    fn augmentation_is_deterministic() {
        let a = augment("q", Some("ctx"));
        let b = augment("q", Some("ctx"));
        assert_eq!(a, b);
        assert_eq!(
            a,
            "Context:\nctx\n\nUse the context above to answer the question below. If the context does not contain the answer, say so instead of guessing.\n\nQuestion:\nq"
        );
    }
}
