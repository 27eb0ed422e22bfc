//! Page analysis: one multimodal call per rendered page.
//!
//! Always returns an [`AnalysisResult`]. A failed call is captured as a
//! [`PageError`] so a single bad page doesn't abort the document.

use crate::error::PageError;
use crate::inference::{InferenceClient, InferenceRequest};
use crate::output::{AnalysisResult, RenderedImage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Analyse one page image with `instruction`.
///
/// Exactly one inference attempt is made. On success the model text is
/// stored verbatim.
pub async fn analyze_page(
    client: &dyn InferenceClient,
    image: Arc<RenderedImage>,
    instruction: &str,
    model_id: &str,
) -> AnalysisResult {
    let start = Instant::now();
    let page_num = image.page_num;

    let request = InferenceRequest::multimodal(model_id, instruction, &image);
    let outcome = client.generate(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(response) => {
            debug!(
                "Page {}: {} chars, {} input tokens, {} output tokens, {}ms",
                page_num,
                response.text.len(),
                response.input_tokens,
                response.output_tokens,
                duration_ms
            );
            AnalysisResult {
                page_num,
                outcome: Ok(response.text),
                image,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                duration_ms,
            }
        }
        Err(e) => {
            warn!("Page {}: analysis failed: {}", page_num, e);
            AnalysisResult {
                page_num,
                outcome: Err(PageError::InferenceFailed {
                    page: page_num,
                    detail: e.to_string(),
                }),
                image,
                input_tokens: 0,
                output_tokens: 0,
                duration_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::InferenceResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, String>,
        seen: Mutex<Vec<(String, String, bool)>>,
    }

    #[async_trait]
    impl InferenceClient for Scripted {
        async fn generate(
            &self,
            request: InferenceRequest<'_>,
        ) -> Result<InferenceResponse, InferenceError> {
            self.seen.lock().unwrap().push((
                request.model_id.to_string(),
                request.instruction.to_string(),
                request.image.is_some(),
            ));
            match &self.reply {
                Ok(text) => Ok(InferenceResponse {
                    text: text.clone(),
                    input_tokens: 258,
                    output_tokens: 40,
                }),
                Err(message) => Err(InferenceError::Provider {
                    message: message.clone(),
                }),
            }
        }
    }

    fn page(n: usize) -> Arc<RenderedImage> {
        Arc::new(RenderedImage {
            page_num: n,
            width: 2,
            height: 2,
            png: vec![0x89, b'P', b'N', b'G'],
        })
    }

    #[tokio::test]
    async fn success_keeps_text_verbatim() {
        let client = Scripted {
            reply: Ok("  **Memo** dated 1963 \n".into()),
            seen: Mutex::new(vec![]),
        };
        let r = analyze_page(&client, page(4), "Describe.", "gemini-1.5-flash").await;

        assert_eq!(r.page_num, 4);
        assert_eq!(r.outcome.as_deref(), Ok("  **Memo** dated 1963 \n"));
        assert_eq!((r.input_tokens, r.output_tokens), (258, 40));
        assert_eq!(
            *client.seen.lock().unwrap(),
            vec![("gemini-1.5-flash".to_string(), "Describe.".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn failure_becomes_placeholder() {
        let client = Scripted {
            reply: Err("429 quota exceeded".into()),
            seen: Mutex::new(vec![]),
        };
        let r = analyze_page(&client, page(2), "Describe.", "gemini-1.5-pro").await;

        assert!(r.is_error());
        assert_eq!(r.display_text(), "Error analyzing this page: 429 quota exceeded");
        assert_eq!(r.error().map(|e| e.page()), Some(2));
        assert_eq!(client.seen.lock().unwrap().len(), 1, "no retries");
    }
}
