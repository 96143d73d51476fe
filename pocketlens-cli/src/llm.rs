use anyhow::{Context, Result, bail};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::config::LlmSection;

pub const SYSTEM_INSTRUCTION: &str = "\
Keep responses concise: no long paragraphs, no storytelling, no filler.
Favour insight density over word count.
Compare the user's income and spending against common benchmarks (savings rate, typical spending ratios, expense share per category).
Bring outside context instead of repeating the data back.
Use short bullet-style lines unless the user asks for something else.
Tie the numbers to the user's question or goal (career change, saving, investing).
Give direct opinions, for example: Yes, you can afford this because...
Only quote individual transactions when an exact number supports a point.
Turn raw numbers into metrics such as savings rate %, expense ratios and deviation from average.
End every insight with what it means in practice for the user.
Offer 2 to 4 sharp actions.
Finish with a one-sentence verdict.
Call out risks the user may miss: income volatility, lifestyle inflation, runway, category imbalance.
Friendly but punchy tone.
Plain text only, no markdown of any kind. Use spacing and line breaks for structure.";

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
struct PartOut {
    text: Option<String>,
}

fn build_request<'a>(prompt: &'a str, json_mode: bool) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_INSTRUCTION,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: prompt }],
        }],
        generation_config: json_mode.then_some(GenerationConfig {
            response_mime_type: "application/json",
        }),
    }
}

/// Text of the first candidate; empty when the model returned none
fn response_text(resp: GenerateResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect::<String>())
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub async fn ask(config: &LlmSection, prompt: &str) -> Result<String> {
    let key = config
        .api_key
        .as_deref()
        .context("missing Gemini API key; set GOOGLE_API_KEY or [llm] api_key")?;

    let url = format!(
        "{}/v1beta/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        config.model
    );

    let mut headers = HeaderMap::new();
    headers.insert("x-goog-api-key", HeaderValue::from_str(key)?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let client = reqwest::Client::new();
    let resp = client
        .post(&url)
        .headers(headers)
        .json(&build_request(prompt, config.json_mode))
        .send()
        .await
        .context("gemini request")?;

    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        bail!("gemini error: {status} {txt}");
    }

    let out: GenerateResponse = resp.json().await.context("parse gemini response")?;
    Ok(response_text(out))
}
