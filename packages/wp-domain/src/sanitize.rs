use std::sync::LazyLock;

use regex::Regex;

pub const MAX_ERROR_CHARS: usize = 512;

const SECRET_KEYS: [&str; 7] =
	["api_key", "apikey", "api-key", "password", "secret", "token", "authorization"];

static PROVIDER_KEY_RE: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"(?i)\b(?:sk|pk|rk)-[A-Za-z0-9_-]{8,}").ok());
static URL_QUERY_SECRET_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"(?i)([?&](?:key|api_key|apikey|token|access_token|signature)=)[^&\s]+").ok()
});

/// Strips credentials from an error message and caps its length.
///
/// Used for anything that is logged or persisted from a failure path. Client-facing text is a
/// fixed message per error code; this only bounds what operators see.
pub fn sanitize_error_message(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in SECRET_KEYS {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = raw.split(sep).next().unwrap_or(raw);

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if let Some(re) = URL_QUERY_SECRET_RE.as_ref() {
		out = re.replace_all(&out, "${1}[REDACTED]").into_owned();
	}
	if let Some(re) = PROVIDER_KEY_RE.as_ref() {
		out = re.replace_all(&out, "[REDACTED]").into_owned();
	}
	if out.chars().count() > MAX_ERROR_CHARS {
		out = out.chars().take(MAX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}
