//! Gemini API client
//!
//! Implements [`CompletionEngine`] on top of `generateContent` with function
//! declarations. Uses a long-lived reqwest::Client for connection pooling.

use super::{Completion, CompletionEngine, CompletionRequest, ToolCall, Turn};
use crate::error::AssistantError;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            ),
        })
    }
}

#[async_trait::async_trait]
impl CompletionEngine for GeminiClient {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(AssistantError::CompletionEngine(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let url = format!("{}?key={}", self.base_url, self.api_key);
        let body = build_request(&request);

        info!(
            turns = request.turns.len(),
            capabilities = request.capabilities.len(),
            "Calling Gemini API"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::CompletionEngine(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(AssistantError::CompletionEngine(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::CompletionEngine(format!("Gemini parse error: {}", e))
        })?;

        parse_completion(gemini_response)
    }
}

fn build_request(request: &CompletionRequest<'_>) -> GeminiRequest {
    let mut contents: Vec<Content> = Vec::with_capacity(request.turns.len());

    for turn in request.turns {
        match turn {
            Turn::User(text) => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(text)],
            }),
            Turn::Assistant { text, calls } => {
                let mut parts = Vec::with_capacity(calls.len() + 1);
                if !text.is_empty() {
                    parts.push(Part::text(text));
                }
                parts.extend(calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Part::default()
                }));
                contents.push(Content {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            Turn::ToolResult { call, result } => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        name: call.name.clone(),
                        response: json!({ "result": result }),
                    }),
                    ..Part::default()
                };

                // Results of one step travel together in a single content.
                match contents.last_mut() {
                    Some(last) if last.parts.iter().all(|p| p.function_response.is_some()) => {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    let tools = if request.capabilities.is_empty() {
        None
    } else {
        Some(vec![ToolDeclarations {
            function_declarations: request
                .capabilities
                .iter()
                .map(|spec| FunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.parameters.clone(),
                })
                .collect(),
        }])
    };

    GeminiRequest {
        contents,
        tools,
        generation_config: GenerationConfig {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        },
        system_instruction: SystemInstruction {
            parts: vec![Part::text(request.instructions)],
        },
    }
}

fn parse_completion(response: GeminiResponse) -> Result<Completion> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AssistantError::CompletionEngine("No response from Gemini API".to_string()))?;

    debug!(finish_reason = ?candidate.finish_reason, "Gemini candidate received");

    let mut completion = Completion::default();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(text) = part.text {
            completion.text.push_str(&text);
        }
        if let Some(call) = part.function_call {
            completion.calls.push(ToolCall {
                id: format!("call_{}", Uuid::new_v4().simple()),
                name: call.name,
                arguments: call.args,
            });
        }
    }

    Ok(completion)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDeclarations>>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CapabilitySpec;

    #[test]
    fn test_request_serialization_with_tools() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "price_lookup".to_string(),
            arguments: json!({"token": "SOL"}),
        };
        let turns = vec![
            Turn::User("price of SOL?".to_string()),
            Turn::Assistant { text: String::new(), calls: vec![call.clone()] },
            Turn::ToolResult { call, result: json!({"success": true}) },
        ];
        let specs = vec![CapabilitySpec {
            name: "price_lookup".to_string(),
            description: "Look up a token price".to_string(),
            parameters: json!({"type": "object"}),
        }];
        let request = CompletionRequest {
            instructions: "You are Solpilot",
            turns: &turns,
            capabilities: &specs,
        };

        let json = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(json["contents"].as_array().unwrap().len(), 3);
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["contents"][1]["parts"][0]["functionCall"]["name"], "price_lookup");
        assert_eq!(json["contents"][2]["parts"][0]["functionResponse"]["name"], "price_lookup");
        assert_eq!(json["tools"][0]["functionDeclarations"][0]["name"], "price_lookup");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are Solpilot");
    }

    #[test]
    fn test_plain_request_omits_tools() {
        let turns = vec![Turn::User("hello".to_string())];
        let json = serde_json::to_value(build_request(&CompletionRequest::plain("x", &turns))).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn test_parse_function_calls_and_text() {
        let raw = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Checking. "},
                    {"functionCall": {"name": "balance_lookup", "args": {"address": "abc"}}}
                ]},
                "finishReason": "STOP"
            }]
        });
        let response: GeminiResponse = serde_json::from_value(raw).unwrap();
        let completion = parse_completion(response).unwrap();

        assert_eq!(completion.text, "Checking. ");
        assert_eq!(completion.calls.len(), 1);
        assert_eq!(completion.calls[0].name, "balance_lookup");
        assert_eq!(completion.calls[0].arguments["address"], "abc");
    }

    #[test]
    fn test_empty_candidates_is_engine_error() {
        let response: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(matches!(parse_completion(response), Err(AssistantError::CompletionEngine(_))));
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let client = GeminiClient::new(String::new(), "gemini-2.0-flash", Duration::from_secs(1)).unwrap();
        let turns = vec![Turn::User("hi".to_string())];
        let result = client.complete(CompletionRequest::plain("", &turns)).await;
        assert!(matches!(result, Err(AssistantError::CompletionEngine(_))));
    }
}
