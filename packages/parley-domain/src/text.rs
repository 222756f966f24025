use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Replies with at most this many words lean on their thread for meaning.
pub const SHORT_ANSWER_MAX_WORDS: usize = 5;

// Tag-shaped only, so a bare `<` or `>` in prose survives.
static MARKUP: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").ok());

/// Plain text for a message: `text` when present and non-blank, otherwise `body` with markup
/// removed. The result is NFKC-normalized with whitespace runs collapsed to a single space.
pub fn normalize_message_text(text: Option<&str>, body: &str) -> String {
	let source = match text {
		Some(text) if !text.trim().is_empty() => text.to_string(),
		_ => strip_markup(body),
	};
	let normalized: String = source.nfkc().collect();

	collapse_whitespace(&normalized)
}

pub fn is_blank(text: &str) -> bool {
	text.trim().is_empty()
}

pub fn is_short_answer(normalized: &str) -> bool {
	let words = normalized.split_whitespace().count();

	words > 0 && words <= SHORT_ANSWER_MAX_WORDS
}

fn strip_markup(body: &str) -> String {
	let stripped = match MARKUP.as_ref() {
		Some(re) => re.replace_all(body, " ").into_owned(),
		None => body.to_string(),
	};

	decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
	if !text.contains('&') {
		return text.to_string();
	}

	text.replace("&nbsp;", " ")
		.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&#39;", "'")
		.replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefers_plain_text_over_body() {
		assert_eq!(
			normalize_message_text(Some("  hello \n world "), "<b>ignored</b>"),
			"hello world"
		);
	}

	#[test]
	fn falls_back_to_body_without_markup() {
		let normalized = normalize_message_text(None, "<p>Ship&nbsp;it <b>today</b></p>");

		assert_eq!(normalized, "Ship it today");
	}

	#[test]
	fn comparisons_in_body_are_not_markup() {
		assert_eq!(normalize_message_text(None, "x < 3 and y > 2"), "x < 3 and y > 2");
		assert_eq!(normalize_message_text(None, "<p>a <b>b</b> c</p> <br/>"), "a b c");
	}

	#[test]
	fn blank_text_uses_body() {
		assert_eq!(normalize_message_text(Some("   "), "from body"), "from body");
	}

	#[test]
	fn markup_only_body_is_blank() {
		assert!(is_blank(&normalize_message_text(None, "<br/><p> </p>")));
	}

	#[test]
	fn fullwidth_latin_is_folded() {
		assert_eq!(normalize_message_text(Some("ｄｅｐｌｏｙ"), ""), "deploy");
	}

	#[test]
	fn short_answers_are_counted_by_words() {
		assert!(is_short_answer("yes, ship it"));
		assert!(!is_short_answer(""));
		assert!(!is_short_answer("we should ship it after the review lands"));
	}
}
