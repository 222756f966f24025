use reqwest::Client;
use serde_json::Value;

use parley_config::SummaryProviderConfig;

use crate::{Error, Result};

const SUMMARY_INSTRUCTIONS: &str = "\
You summarize chat threads. Write one short paragraph that captures the topic, decisions, and \
open questions of the thread below. Use only information stated in the thread. Do not add facts, \
names, dates, or conclusions that are not present in the input. Reply with the paragraph only.";

pub struct SummaryClient {
	http: Client,
	url: String,
	model: String,
	temperature: f32,
	max_output_tokens: u32,
}
impl SummaryClient {
	pub fn new(cfg: &SummaryProviderConfig) -> Result<Self> {
		let http = crate::build_client(&cfg.api_key, &cfg.default_headers, cfg.timeout_ms)?;

		Ok(Self {
			http,
			url: format!("{}{}", cfg.api_base, cfg.path),
			model: cfg.model.clone(),
			temperature: cfg.temperature,
			max_output_tokens: cfg.max_output_tokens,
		})
	}

	/// One-paragraph abstractive summary of a thread transcript.
	pub async fn summarize(&self, transcript: &str) -> Result<String> {
		let body = serde_json::json!({
			"model": self.model,
			"temperature": self.temperature,
			"max_tokens": self.max_output_tokens,
			"messages": [
				{ "role": "system", "content": SUMMARY_INSTRUCTIONS },
				{ "role": "user", "content": transcript },
			],
		});
		let res = self.http.post(&self.url).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_summary_response(&json)
	}
}

fn parse_summary_response(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::response("Summary response is missing message content."))?;
	let paragraph = content.split_whitespace().collect::<Vec<_>>().join(" ");

	if paragraph.is_empty() {
		return Err(Error::response("Summary response content is empty."));
	}

	Ok(paragraph)
}
