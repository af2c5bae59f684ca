use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

pub const ELLIPSIS: &str = "…";
pub const MIDDLE_MARKER: &str = "\n[... earlier context omitted ...]\n";

/// NFKC-normalizes and collapses runs of whitespace into single spaces.
pub fn normalize_text(input: &str) -> String {
	let normalized: String = input.nfkc().collect();

	normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn char_len(input: &str) -> usize {
	input.chars().count()
}

/// Cuts `input` to at most `max_chars` characters on a grapheme boundary. Truncated output ends
/// with an ellipsis that is counted against the limit.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
	if char_len(input) <= max_chars {
		return input.to_string();
	}
	if max_chars == 0 {
		return String::new();
	}

	let budget = max_chars - char_len(ELLIPSIS);
	let mut out = take_graphemes(input, budget);

	out.push_str(ELLIPSIS);

	out
}

/// Keeps the head and the tail of `input` and drops the middle so the result fits in `max_chars`.
pub fn truncate_middle(input: &str, max_chars: usize) -> String {
	let total = char_len(input);

	if total <= max_chars {
		return input.to_string();
	}

	let marker_len = char_len(MIDDLE_MARKER);

	if max_chars <= marker_len + 2 {
		return truncate_chars(input, max_chars);
	}

	let keep = max_chars - marker_len;
	let head_len = keep / 2;
	let tail_len = keep - head_len;
	let head = take_graphemes(input, head_len);
	let tail = take_graphemes_from_end(input, tail_len);

	format!("{head}{MIDDLE_MARKER}{tail}")
}

/// Lowercased, punctuation-stripped terms from the first `max_tokens` whitespace tokens.
pub fn keyword_terms(query: &str, max_tokens: usize) -> Vec<String> {
	let mut out: Vec<String> = Vec::new();

	for raw in query.split_whitespace().take(max_tokens) {
		let term: String = raw
			.nfkc()
			.filter(|ch| ch.is_alphanumeric())
			.flat_map(char::to_lowercase)
			.collect();

		if term.is_empty() || out.contains(&term) {
			continue;
		}

		out.push(term);
	}

	out
}

fn take_graphemes(input: &str, max_chars: usize) -> String {
	let mut out = String::new();
	let mut used = 0;

	for grapheme in input.graphemes(true) {
		let len = char_len(grapheme);

		if used + len > max_chars {
			break;
		}

		out.push_str(grapheme);

		used += len;
	}

	out
}

fn take_graphemes_from_end(input: &str, max_chars: usize) -> String {
	let mut parts = Vec::new();
	let mut used = 0;

	for grapheme in input.graphemes(true).rev() {
		let len = char_len(grapheme);

		if used + len > max_chars {
			break;
		}

		parts.push(grapheme);

		used += len;
	}

	parts.into_iter().rev().collect()
}
