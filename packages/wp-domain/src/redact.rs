//! Redaction applied to session turn summaries before they are stored for usage accounting.

use std::sync::LazyLock;

use regex::Regex;

const PII_PATTERNS: [(&str, &str); 4] = [
	("email", r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"),
	("card", r"\b(?:\d[ -]?){13,19}\b"),
	("phone", r"(?:\+?\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b"),
	("iban", r"\b[A-Z]{2}\d{2}[A-Z0-9]{11,30}\b"),
];
const PROFANITY: [&str; 8] =
	["fuck", "fucking", "shit", "bitch", "asshole", "bastard", "dick", "cunt"];

static PII: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	PII_PATTERNS
		.iter()
		.filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
		.collect()
});
static PROFANITY_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	let alternation = PROFANITY.join("|");

	Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).ok()
});

/// Replaces detected personal data with `[REDACTED:<kind>]` and masks profanity.
pub fn redact_text(input: &str) -> String {
	let mut out = input.to_string();

	for (label, re) in PII.iter() {
		let replacement = format!("[REDACTED:{label}]");

		out = re.replace_all(&out, replacement.as_str()).into_owned();
	}

	if let Some(re) = PROFANITY_RE.as_ref() {
		out = re.replace_all(&out, "****").into_owned();
	}

	out
}

pub fn contains_pii(input: &str) -> bool {
	PII.iter().any(|(_, re)| re.is_match(input))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn redacts_email_and_phone() {
		let out = redact_text("Mail ana@example.com or call 415-555-0134.");

		assert!(out.contains("[REDACTED:email]"));
		assert!(out.contains("[REDACTED:phone]"));
		assert!(!out.contains("ana@example.com"));
	}

	#[test]
	fn masks_profanity_case_insensitively() {
		assert_eq!(redact_text("This is SHIT weather"), "This is **** weather");
	}

	#[test]
	fn leaves_clean_text_untouched() {
		let text = "Dinner at 7 near the harbor";

		assert_eq!(redact_text(text), text);
		assert!(!contains_pii(text));
	}
}
