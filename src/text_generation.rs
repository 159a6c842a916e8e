//! AI-assisted reply drafting.
//!
//! Prompts go to a Gemini-style `generateContent` endpoint when an API key is
//! configured. Without one, or when the remote call fails, a fixed local
//! template is returned so the caller always has a draft to work with.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const SYSTEM_INSTRUCTION: &str = "Você é o assistente oficial de IA da \"Hidro Clean Canalizações\" (Portugal). \
Gere respostas curtas e proativas em PT-PT. Sugira sempre visita técnica.";
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("request to text service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("text service answered with status {0}")]
    Status(StatusCode),
    #[error("text service returned no text")]
    EmptyAnswer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    Remote,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub source: TextSource,
    /// Set when the remote service was configured but could not be used.
    pub notice: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Clone)]
struct RemoteModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl RemoteModel {
    async fn generate(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        );
        let body = GenerateContentRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: system_instruction,
                }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GenerationError::Status(response.status()));
        }
        response
            .json::<GenerateContentResponse>()
            .await?
            .text()
            .ok_or(GenerationError::EmptyAnswer)
    }
}

#[derive(Debug, Clone)]
pub struct TextGenerator {
    remote: Option<RemoteModel>,
    system_instruction: String,
}

impl TextGenerator {
    /// Generator that only ever answers with the local template.
    pub fn fallback_only() -> Self {
        Self {
            remote: None,
            system_instruction: SYSTEM_INSTRUCTION.into(),
        }
    }

    pub fn remote(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            remote: Some(RemoteModel {
                client: reqwest::Client::new(),
                endpoint: endpoint.into(),
                model: model.into(),
                api_key: api_key.into(),
            }),
            system_instruction: SYSTEM_INSTRUCTION.into(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn generate(&self, prompt: &str) -> Result<GeneratedText, GenerationError> {
        self.generate_with_instruction(prompt, &self.system_instruction)
            .await
    }

    /// Only an empty prompt is an error. Remote failures degrade to the
    /// local template and are reported through [`GeneratedText::notice`].
    pub async fn generate_with_instruction(
        &self,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<GeneratedText, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::EmptyPrompt);
        }

        let Some(remote) = &self.remote else {
            return Ok(GeneratedText {
                text: fallback_text(prompt),
                source: TextSource::Fallback,
                notice: None,
            });
        };

        match remote.generate(prompt, system_instruction).await {
            Ok(text) => {
                info!(model = %remote.model, "Generated reply");
                Ok(GeneratedText {
                    text,
                    source: TextSource::Remote,
                    notice: None,
                })
            }
            Err(err) => {
                warn!(%err, "Text generation failed, using local template");
                Ok(GeneratedText {
                    text: fallback_text(prompt),
                    source: TextSource::Fallback,
                    notice: Some(err.to_string()),
                })
            }
        }
    }
}

/// Deterministic reply used when no model answer is available.
pub fn fallback_text(prompt: &str) -> String {
    format!(
        "Olá! Obrigado pelo seu contacto sobre \"{}\".\n\n\
         Para avaliarmos a situação com rigor, propomos uma visita técnica ao local. \
         Indique-nos, por favor, a sua disponibilidade e a morada do serviço.\n\n\
         Com os melhores cumprimentos,\nHidro Clean Canalizações",
        prompt.trim()
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::{net::TcpListener, task::JoinHandle};

    async fn fake_model(
        Path(call): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, StatusCode> {
        if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("secret") {
            return Err(StatusCode::FORBIDDEN);
        }
        if call != "test-model:generateContent" {
            return Err(StatusCode::NOT_FOUND);
        }
        let prompt = body["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default();
        if prompt == "silence" {
            return Ok(Json(json!({ "candidates": [] })));
        }
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Hidro Clean"));
        assert_eq!(body["generationConfig"]["temperature"], json!(0.7));
        Ok(Json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Bom dia! "}, {"text": format!("Resposta a: {prompt}")}]}
            }]
        })))
    }

    async fn spawn_fake_model() -> (JoinHandle<()>, String) {
        let app = Router::new().route("/models/:call", post(fake_model));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (server, format!("http://{address}"))
    }

    #[tokio::test]
    async fn test_fallback_when_unconfigured() {
        let generator = TextGenerator::fallback_only();
        assert!(!generator.is_remote());

        let generated = generator.generate("  fuga na cozinha ").await.unwrap();
        assert_eq!(generated.source, TextSource::Fallback);
        assert_eq!(generated.notice, None);
        assert_eq!(generated.text, fallback_text("fuga na cozinha"));
        assert!(generated.text.contains("\"fuga na cozinha\""));
        assert!(generated.text.contains("visita técnica"));
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let generator = TextGenerator::fallback_only();
        assert!(matches!(
            generator.generate("   ").await,
            Err(GenerationError::EmptyPrompt)
        ));
    }

    #[tokio::test]
    async fn test_remote_answer() {
        let (server, endpoint) = spawn_fake_model().await;
        let generator = TextGenerator::remote(endpoint, "test-model", "secret");

        let generated = generator.generate("esgoto entupido").await.unwrap();
        assert_eq!(
            generated,
            GeneratedText {
                text: "Bom dia! Resposta a: esgoto entupido".into(),
                source: TextSource::Remote,
                notice: None,
            }
        );
        server.abort();
    }

    #[tokio::test]
    async fn test_remote_failures_fall_back_with_notice() {
        let (server, endpoint) = spawn_fake_model().await;

        let wrong_key = TextGenerator::remote(endpoint.clone(), "test-model", "wrong");
        let generated = wrong_key.generate("esgoto entupido").await.unwrap();
        assert_eq!(generated.source, TextSource::Fallback);
        assert_eq!(generated.text, fallback_text("esgoto entupido"));
        assert!(generated.notice.unwrap().contains("403"));

        let generator = TextGenerator::remote(endpoint, "test-model", "secret");
        let generated = generator.generate("silence").await.unwrap();
        assert_eq!(generated.source, TextSource::Fallback);
        assert_eq!(
            generated.notice.as_deref(),
            Some("text service returned no text")
        );
        server.abort();
    }

    #[test]
    fn fallback_is_deterministic() {
        assert_eq!(fallback_text("orçamento"), fallback_text(" orçamento "));
    }
}
