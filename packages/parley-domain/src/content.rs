//! Embedding input construction.
//!
//! Token counts here are estimates: one token per [`CHARS_PER_TOKEN`] characters. The real
//! tokenizer of the embedding model is never consulted.

use unicode_segmentation::UnicodeSegmentation;

pub const CHARS_PER_TOKEN: usize = 4;

const THREAD_CONTEXT_PREFIX: &str = "[Thread context: ";
const THREAD_CONTEXT_SUFFIX: &str = "] ";

pub fn estimate_tokens(text: &str) -> u32 {
	let chars = text.chars().count();

	chars.div_ceil(CHARS_PER_TOKEN).try_into().unwrap_or(u32::MAX)
}

pub fn char_budget(max_tokens: u32) -> usize {
	(max_tokens as usize).saturating_mul(CHARS_PER_TOKEN)
}

/// Cuts `text` to at most `max_chars` characters without splitting a grapheme cluster.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	let mut used = 0_usize;
	let mut end = 0_usize;

	for (idx, grapheme) in text.grapheme_indices(true) {
		let width = grapheme.chars().count();

		if used + width > max_chars {
			return &text[..end];
		}

		used += width;
		end = idx + grapheme.len();
	}

	text
}

pub fn truncate_to_token_budget(text: &str, max_tokens: u32) -> &str {
	truncate_chars(text, char_budget(max_tokens))
}

/// Final embedding input for one message.
///
/// With a summary the result is `"[Thread context: <summary>] " + text`, where the message text
/// is truncated to what the budget leaves after the prefix. The whole string never exceeds the
/// budget, even when the prefix alone would.
pub fn build_embedding_content(
	text: &str,
	thread_summary: Option<&str>,
	max_tokens: u32,
) -> String {
	let budget = char_budget(max_tokens);
	let Some(summary) = thread_summary.filter(|summary| !summary.trim().is_empty()) else {
		return truncate_chars(text, budget).to_string();
	};
	let prefix = format!("{THREAD_CONTEXT_PREFIX}{summary}{THREAD_CONTEXT_SUFFIX}");
	let remaining = budget.saturating_sub(prefix.chars().count());
	let enriched = format!("{prefix}{}", truncate_chars(text, remaining));

	truncate_chars(&enriched, budget).to_string()
}
