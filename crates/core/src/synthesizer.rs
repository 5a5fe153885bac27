use crate::error::AskError;
use crate::models::{Answer, ScoredSegment};
use crate::traits::LanguageModel;
use tracing::debug;

pub const NO_CONTEXT_MARKER: &str = "(no relevant content was retrieved)";

pub struct AnswerSynthesizer<'a> {
    model: &'a dyn LanguageModel,
    preview_chars: usize,
}

impl<'a> AnswerSynthesizer<'a> {
    pub fn new(model: &'a dyn LanguageModel, preview_chars: usize) -> Self {
        Self {
            model,
            preview_chars,
        }
    }

    /// Always calls the model, even with no segments; the prompt tells it to
    /// say nothing relevant was found.
    pub async fn answer(
        &self,
        question: &str,
        retrieved: &[ScoredSegment],
    ) -> Result<Answer, AskError> {
        let prompt = build_prompt(question, retrieved);
        debug!(
            model = self.model.name(),
            segments = retrieved.len(),
            prompt_chars = prompt.chars().count(),
            "generating answer"
        );

        let text = self
            .model
            .generate(&prompt)
            .await
            .map_err(AskError::Generation)?;

        let sources = retrieved
            .iter()
            .map(|hit| hit.segment.preview(self.preview_chars))
            .collect();

        Ok(Answer { text, sources })
    }
}

pub fn build_prompt(question: &str, retrieved: &[ScoredSegment]) -> String {
    let context = if retrieved.is_empty() {
        NO_CONTEXT_MARKER.to_string()
    } else {
        retrieved
            .iter()
            .map(|hit| hit.segment.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Use only the following pieces of context from the loaded document to answer the \
         question at the end. If the context does not contain the answer, say that no \
         relevant content was found in the document; do not make up an answer.\n\n\
         {context}\n\n\
         Question: {question}\n\
         Helpful Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::stores::memory::tests::segment;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String, ServiceError> {
            self.prompts
                .lock()
                .map_err(|_| ServiceError::Config("poisoned".to_string()))?
                .push(prompt.to_string());
            Ok("The answer.".to_string())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl LanguageModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ServiceError> {
            Err(ServiceError::Auth {
                provider: "broken".to_string(),
            })
        }
    }

    fn hit(index: usize, text: &str) -> ScoredSegment {
        ScoredSegment {
            segment: segment(index, text),
            distance: index as f32,
        }
    }

    #[tokio::test]
    async fn sources_are_previews_in_retrieval_order() {
        let model = RecordingModel::default();
        let synthesizer = AnswerSynthesizer::new(&model, 5);
        let retrieved = vec![hit(2, "second segment text"), hit(0, "tiny")];

        let answer = synthesizer.answer("What?", &retrieved).await.unwrap();

        assert_eq!(answer.text, "The answer.");
        assert_eq!(answer.sources, vec!["secon...".to_string(), "tiny".to_string()]);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("second segment text\n\ntiny"));
        assert!(prompts[0].ends_with("Question: What?\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn empty_retrieval_still_calls_the_model() {
        let model = RecordingModel::default();
        let answer = AnswerSynthesizer::new(&model, 100)
            .answer("Anything?", &[])
            .await
            .unwrap();

        assert!(answer.sources.is_empty());
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(NO_CONTEXT_MARKER));
    }

    #[tokio::test]
    async fn model_failure_is_generation_error() {
        let result = AnswerSynthesizer::new(&BrokenModel, 100)
            .answer("Why?", &[hit(0, "text")])
            .await;
        assert!(matches!(
            result,
            Err(AskError::Generation(ServiceError::Auth { .. }))
        ));
    }
}
