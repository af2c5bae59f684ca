//! Places lookups. Requests carry only the query text the tool gateway validated; workspace
//! identifiers never reach this backend.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::Result;

const MAX_PLACES: usize = 10;
const MAX_STEPS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSummary {
	pub place_id: String,
	pub name: String,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub rating: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetails {
	pub place_id: String,
	pub name: String,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub phone: Option<String>,
	#[serde(default)]
	pub website: Option<String>,
	#[serde(default)]
	pub opening_hours: Vec<String>,
	#[serde(default)]
	pub rating: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directions {
	#[serde(default)]
	pub summary: Option<String>,
	pub distance_meters: u64,
	pub duration_seconds: u64,
	#[serde(default)]
	pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
	#[serde(default)]
	results: Vec<PlaceSummary>,
}

pub async fn search_places(
	cfg: &wp_config::ProviderConfig,
	query: &str,
	near: Option<&str>,
) -> Result<Vec<PlaceSummary>> {
	let mut params = vec![("query", query)];

	if let Some(near) = near {
		params.push(("near", near));
	}

	let res = get(cfg, "/places/search", &params).await?;
	let parsed: SearchResponse = res.json().await?;

	Ok(parsed.results.into_iter().take(MAX_PLACES).collect())
}

pub async fn place_details(
	cfg: &wp_config::ProviderConfig,
	place_id: &str,
) -> Result<PlaceDetails> {
	let res = get(cfg, "/places/details", &[("place_id", place_id)]).await?;

	Ok(res.json().await?)
}

pub async fn directions(
	cfg: &wp_config::ProviderConfig,
	origin: &str,
	destination: &str,
	mode: &str,
) -> Result<Directions> {
	let res = get(cfg, "/directions", &[
		("origin", origin),
		("destination", destination),
		("mode", mode),
	])
	.await?;
	let mut parsed: Directions = res.json().await?;

	parsed.steps.truncate(MAX_STEPS);

	Ok(parsed)
}

async fn get(
	cfg: &wp_config::ProviderConfig,
	path: &str,
	params: &[(&str, &str)],
) -> Result<reqwest::Response> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{path}", cfg.api_base.trim_end_matches('/'));
	let res = client
		.get(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.query(params)
		.send()
		.await?;

	crate::check_status(res).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn search_response_tolerates_missing_optional_fields() {
		let json = r#"{"results":[{"place_id":"p1","name":"Harbor Grill"}]}"#;
		let parsed: SearchResponse = serde_json::from_str(json).expect("Failed to parse places.");

		assert_eq!(parsed.results.len(), 1);
		assert_eq!(parsed.results[0].address, None);
	}
}
