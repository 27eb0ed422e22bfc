//! Cross-page summary: one text-only call over every page's analysis.

use crate::error::AnalyzerError;
use crate::inference::{InferenceClient, InferenceRequest};
use crate::output::AnalysisSet;
use crate::prompts::summary_prompt;
use tracing::{info, warn};

/// Join page analyses as `"Page <n>: <text>"` blocks separated by a blank
/// line, in page order. Failed pages contribute their placeholder text.
pub fn aggregate_text(set: &AnalysisSet) -> String {
    set.iter()
        .map(|r| format!("Page {}: {}", r.page_num, r.display_text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Produce the document summary with a single text-only inference call.
///
/// Returns the model text verbatim, or [`AnalyzerError::SummaryFailed`].
pub async fn summarize(
    client: &dyn InferenceClient,
    set: &AnalysisSet,
    model_id: &str,
) -> Result<String, AnalyzerError> {
    let prompt = summary_prompt(&aggregate_text(set));
    info!("Summarising {} page analyses ({} chars)", set.len(), prompt.len());

    match client.generate(InferenceRequest::text(model_id, &prompt)).await {
        Ok(response) => Ok(response.text),
        Err(e) => {
            warn!("Summary failed: {}", e);
            Err(AnalyzerError::SummaryFailed {
                detail: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InferenceError, PageError};
    use crate::inference::InferenceResponse;
    use crate::output::{AnalysisResult, RenderedImage};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn result(n: usize, outcome: Result<String, PageError>) -> AnalysisResult {
        AnalysisResult {
            page_num: n,
            outcome,
            image: Arc::new(RenderedImage {
                page_num: n,
                width: 1,
                height: 1,
                png: vec![],
            }),
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    struct Echo {
        prompts: Mutex<Vec<(String, bool)>>,
        fail: bool,
    }

    #[async_trait]
    impl InferenceClient for Echo {
        async fn generate(
            &self,
            request: InferenceRequest<'_>,
        ) -> Result<InferenceResponse, InferenceError> {
            self.prompts
                .lock()
                .unwrap()
                .push((request.instruction.to_string(), request.image.is_some()));
            if self.fail {
                return Err(InferenceError::Provider {
                    message: "deadline exceeded".into(),
                });
            }
            Ok(InferenceResponse {
                text: "SUM".into(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn aggregate_includes_placeholders_in_order() {
        let set = AnalysisSet::from_results(vec![
            result(1, Ok("alpha".into())),
            result(
                2,
                Err(PageError::InferenceFailed {
                    page: 2,
                    detail: "timeout".into(),
                }),
            ),
            result(3, Ok("gamma".into())),
        ])
        .unwrap();

        assert_eq!(
            aggregate_text(&set),
            "Page 1: alpha\n\nPage 2: Error analyzing this page: timeout\n\nPage 3: gamma"
        );
    }

    #[tokio::test]
    async fn single_text_only_call() {
        let set =
            AnalysisSet::from_results(vec![result(1, Ok("A".into())), result(2, Ok("B".into()))])
                .unwrap();
        let client = Echo {
            prompts: Mutex::new(vec![]),
            fail: false,
        };

        let summary = summarize(&client, &set, "gemini-1.5-flash").await.unwrap();
        assert_eq!(summary, "SUM");

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("Page 1: A\n\nPage 2: B"));
        assert!(!prompts[0].1, "summary call carries no image");
    }

    #[tokio::test]
    async fn failure_is_surfaced() {
        let set = AnalysisSet::from_results(vec![result(1, Ok("A".into()))]).unwrap();
        let client = Echo {
            prompts: Mutex::new(vec![]),
            fail: true,
        };
        let err = summarize(&client, &set, "gemini-1.5-flash").await.unwrap_err();
        assert_eq!(err.to_string(), "Error generating summary: deadline exceeded");
    }
}
