//! Tool Gateway: the closed set of actions the model may request.
//!
//! Every invocation moves through `received -> schema_validated -> authorized -> executed`.
//! Identity overrides are rejected before anything else, schema problems before authorization,
//! and nothing touches the store until both pass. The acting user always comes from [`ToolContext`].

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use wp_config::{ProviderConfig, Tools};
use wp_domain::{
	RefreshJob, SourceSelector, UserId, WorkspaceId, sanitize,
	workspace::{CreatedItem, NewCalendarEvent, NewPayment, NewPoll, NewTask, format_amount},
};
use wp_providers::chat::ToolSpec;

use crate::{
	PlacesProvider,
	refresh::{self, RefreshQueue},
	store::WorkspaceStore,
};

/// Argument keys that would let the caller pick whose identity a tool acts under.
pub const IDENTITY_KEYS: [&str; 8] = [
	"user_id",
	"userId",
	"workspace_id",
	"workspaceId",
	"trip_id",
	"tripId",
	"created_by",
	"owner_id",
];

const MAX_AMOUNT: f64 = 1_000_000.0;
const MAX_SPLIT: usize = 50;
const PAYMENT_SUMMARY_ROWS: u32 = 50;
const TRAVEL_MODES: [&str; 4] = ["driving", "walking", "transit", "bicycling"];
const HASH_LOG_CHARS: usize = 16;
const HIGH_RISK_TOOLS: [&str; 1] = ["record_payment"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
	pub tool: String,
	pub args_hash: String,
}

/// Who is acting and where. Built from the verified session, never from model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
	pub workspace_id: WorkspaceId,
	pub user_id: UserId,
	pub confirmation: Option<Confirmation>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
	#[error("Unknown tool {name:?}.")]
	UnknownTool { name: String },
	#[error("Argument {key:?} may not be set by the caller.")]
	IdentityOverride { key: String },
	#[error("Invalid arguments: {message}")]
	Schema { message: String },
	#[error("The user is not a member of this trip.")]
	Forbidden,
	#[error("The user must confirm this action in the app.")]
	ConfirmationRequired { args_hash: String },
	#[error("Tool failed: {message}")]
	Execution { message: String },
}
impl ToolError {
	pub fn reason(&self) -> &'static str {
		match self {
			Self::UnknownTool { .. } => "unknown_tool",
			Self::IdentityOverride { .. } => "identity_override",
			Self::Schema { .. } => "schema",
			Self::Forbidden => "not_a_member",
			Self::ConfirmationRequired { .. } => "confirmation_missing",
			Self::Execution { .. } => "execution_failed",
		}
	}

	/// Result object handed back to the model in place of a tool result.
	pub fn to_payload(&self) -> Value {
		match self {
			Self::ConfirmationRequired { args_hash } => serde_json::json!({
				"ok": false,
				"status": "confirmation_required",
				"args_hash": args_hash,
				"message": "Ask the user to confirm this action in the app before it is recorded.",
			}),
			other => serde_json::json!({
				"ok": false,
				"error": other.reason(),
				"message": other.to_string(),
			}),
		}
	}

	fn schema(message: impl Into<String>) -> Self {
		Self::Schema { message: message.into() }
	}

	fn execution(err: impl std::fmt::Display) -> Self {
		Self::Execution { message: sanitize::sanitize_error_message(&err.to_string()) }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCalendarEventArgs {
	pub title: String,
	#[serde(alias = "startTime")]
	pub start_time: String,
	#[serde(default, alias = "endTime")]
	pub end_time: Option<String>,
	#[serde(default)]
	pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskArgs {
	pub title: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default, alias = "dueDate")]
	pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePollArgs {
	pub question: String,
	pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetPaymentSummaryArgs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordPaymentArgs {
	pub description: String,
	pub amount: f64,
	pub currency: String,
	#[serde(default, alias = "splitWith")]
	pub split_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchPlacesArgs {
	pub query: String,
	#[serde(default)]
	pub near: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetPlaceDetailsArgs {
	#[serde(alias = "placeId")]
	pub place_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GetDirectionsArgs {
	pub origin: String,
	pub destination: String,
	#[serde(default)]
	pub mode: Option<String>,
}

/// Typed, validated arguments of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolArgs {
	AddCalendarEvent(AddCalendarEventArgs),
	CreateTask(CreateTaskArgs),
	CreatePoll(CreatePollArgs),
	GetPaymentSummary(GetPaymentSummaryArgs),
	RecordPayment(RecordPaymentArgs),
	SearchPlaces(SearchPlacesArgs),
	GetPlaceDetails(GetPlaceDetailsArgs),
	GetDirections(GetDirectionsArgs),
}
impl ToolArgs {
	/// Parses raw arguments for `name`. Identity keys are rejected before the schema is consulted.
	pub fn parse(name: &str, raw: &Value) -> Result<Self, ToolError> {
		if !TOOL_NAMES.contains(&name) {
			return Err(ToolError::UnknownTool { name: name.to_string() });
		}

		let object = match raw {
			Value::Object(map) => map.clone(),
			Value::Null => Map::new(),
			_ => return Err(ToolError::schema("Arguments must be a JSON object.")),
		};

		if let Some(key) = IDENTITY_KEYS.iter().find(|key| object.contains_key(**key)) {
			return Err(ToolError::IdentityOverride { key: key.to_string() });
		}

		let value = Value::Object(object);
		let mut args = match name {
			"add_calendar_event" => Self::AddCalendarEvent(decode(value)?),
			"create_task" => Self::CreateTask(decode(value)?),
			"create_poll" => Self::CreatePoll(decode(value)?),
			"get_payment_summary" => Self::GetPaymentSummary(decode(value)?),
			"record_payment" => Self::RecordPayment(decode(value)?),
			"search_places" => Self::SearchPlaces(decode(value)?),
			"get_place_details" => Self::GetPlaceDetails(decode(value)?),
			"get_directions" => Self::GetDirections(decode(value)?),
			other => return Err(ToolError::UnknownTool { name: other.to_string() }),
		};

		args.validate()?;

		Ok(args)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::AddCalendarEvent(_) => "add_calendar_event",
			Self::CreateTask(_) => "create_task",
			Self::CreatePoll(_) => "create_poll",
			Self::GetPaymentSummary(_) => "get_payment_summary",
			Self::RecordPayment(_) => "record_payment",
			Self::SearchPlaces(_) => "search_places",
			Self::GetPlaceDetails(_) => "get_place_details",
			Self::GetDirections(_) => "get_directions",
		}
	}

	/// Range checks the types alone cannot express. Text fields are trimmed in place.
	fn validate(&mut self) -> Result<(), ToolError> {
		match self {
			Self::AddCalendarEvent(args) => {
				args.title = bounded("title", &args.title, 1, 200)?;
				args.location = optional("location", args.location.as_deref(), 300)?;

				let start = timestamp("start_time", &args.start_time)?;

				if let Some(end) = args.end_time.as_deref()
					&& timestamp("end_time", end)? < start
				{
					return Err(ToolError::schema("end_time must not be before start_time."));
				}
			},
			Self::CreateTask(args) => {
				args.title = bounded("title", &args.title, 1, 200)?;
				args.description = optional("description", args.description.as_deref(), 2_000)?;

				if let Some(due) = args.due_date.as_deref() {
					timestamp("due_date", due)?;
				}
			},
			Self::CreatePoll(args) => {
				args.question = bounded("question", &args.question, 1, 300)?;

				if !(2..=10).contains(&args.options.len()) {
					return Err(ToolError::schema("options must contain between 2 and 10 items."));
				}

				args.options = args
					.options
					.iter()
					.map(|option| bounded("options[]", option, 1, 100))
					.collect::<Result<_, _>>()?;
			},
			Self::GetPaymentSummary(_) => {},
			Self::RecordPayment(args) => {
				args.description = bounded("description", &args.description, 1, 200)?;

				if !args.amount.is_finite() || args.amount <= 0.0 || args.amount > MAX_AMOUNT {
					return Err(ToolError::schema(
						"amount must be greater than 0 and at most 1000000.",
					));
				}

				let currency = args.currency.trim().to_ascii_uppercase();

				if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_alphabetic()) {
					return Err(ToolError::schema("currency must be a 3-letter ISO code."));
				}

				args.currency = currency;

				if args.split_with.len() > MAX_SPLIT {
					return Err(ToolError::schema("split_with may name at most 50 members."));
				}

				args.split_with = args
					.split_with
					.iter()
					.map(|id| bounded("split_with[]", id, 1, 200))
					.collect::<Result<_, _>>()?;
			},
			Self::SearchPlaces(args) => {
				args.query = bounded("query", &args.query, 1, 200)?;
				args.near = optional("near", args.near.as_deref(), 200)?;
			},
			Self::GetPlaceDetails(args) => {
				args.place_id = bounded("place_id", &args.place_id, 1, 200)?;
			},
			Self::GetDirections(args) => {
				args.origin = bounded("origin", &args.origin, 1, 300)?;
				args.destination = bounded("destination", &args.destination, 1, 300)?;

				if let Some(mode) = args.mode.as_deref() {
					let mode = mode.trim().to_ascii_lowercase();

					if !TRAVEL_MODES.contains(&mode.as_str()) {
						return Err(ToolError::schema(
							"mode must be one of driving, walking, transit, bicycling.",
						));
					}

					args.mode = Some(mode);
				}
			},
		}

		Ok(())
	}
}

const TOOL_NAMES: [&str; 8] = [
	"add_calendar_event",
	"create_task",
	"create_poll",
	"get_payment_summary",
	"record_payment",
	"search_places",
	"get_place_details",
	"get_directions",
];

/// Hex blake3 digest of the validated arguments in canonical (key-sorted) JSON form.
pub fn args_hash(args: &ToolArgs) -> String {
	let canonical = serde_json::to_value(args).map(|value| value.to_string()).unwrap_or_default();

	blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

fn raw_hash(name: &str, raw: &str) -> String {
	blake3::hash(format!("{name}:{raw}").as_bytes()).to_hex().to_string()
}

fn decode<T>(value: Value) -> Result<T, ToolError>
where
	T: DeserializeOwned,
{
	serde_json::from_value(value).map_err(|err| ToolError::schema(err.to_string()))
}

fn bounded(field: &str, value: &str, min: usize, max: usize) -> Result<String, ToolError> {
	let trimmed = value.trim();
	let len = trimmed.chars().count();

	if len < min || len > max {
		return Err(ToolError::schema(format!(
			"{field} must be between {min} and {max} characters."
		)));
	}

	Ok(trimmed.to_string())
}

fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>, ToolError> {
	match value.map(str::trim).filter(|value| !value.is_empty()) {
		Some(value) => bounded(field, value, 1, max).map(Some),
		None => Ok(None),
	}
}

fn timestamp(field: &str, value: &str) -> Result<OffsetDateTime, ToolError> {
	OffsetDateTime::parse(value.trim(), &Rfc3339)
		.map_err(|_| ToolError::schema(format!("{field} must be an RFC 3339 timestamp.")))
}

fn optional_timestamp(value: Option<&str>) -> Result<Option<OffsetDateTime>, ToolError> {
	value.map(|value| timestamp("timestamp", value)).transpose()
}

fn amount_to_cents(amount: f64) -> i64 {
	(amount * 100.0).round() as i64
}

pub struct ToolGateway {
	cfg: Tools,
	places_cfg: ProviderConfig,
	store: Arc<dyn WorkspaceStore>,
	places: Arc<dyn PlacesProvider>,
	queue: Option<Arc<dyn RefreshQueue>>,
}
impl ToolGateway {
	pub fn new(
		cfg: Tools,
		places_cfg: ProviderConfig,
		store: Arc<dyn WorkspaceStore>,
		places: Arc<dyn PlacesProvider>,
		queue: Option<Arc<dyn RefreshQueue>>,
	) -> Self {
		Self { cfg, places_cfg, store, places, queue }
	}

	pub fn specs(&self) -> Vec<ToolSpec> {
		tool_specs()
	}

	/// High-risk tools always need a grant. Config can only add to that set.
	pub fn requires_confirmation(&self, name: &str) -> bool {
		HIGH_RISK_TOOLS.contains(&name)
			|| self.cfg.confirmation_required.iter().any(|tool| tool == name)
	}

	/// Validates, authorizes and runs one model-requested call. `raw_arguments` is the JSON text
	/// the model produced.
	pub async fn execute(
		&self,
		ctx: &ToolContext,
		name: &str,
		raw_arguments: &str,
	) -> Result<Value, ToolError> {
		let raw = if raw_arguments.trim().is_empty() {
			Ok(Value::Null)
		} else {
			serde_json::from_str::<Value>(raw_arguments)
				.map_err(|_| ToolError::schema("Arguments are not valid JSON."))
		};
		let parsed = raw.and_then(|raw| ToolArgs::parse(name, &raw));
		let args = match parsed {
			Ok(args) => args,
			Err(err) => {
				self.log_decision(ctx, name, &raw_hash(name, raw_arguments), "block", err.reason());

				return Err(err);
			},
		};
		let hash = args_hash(&args);

		match self.store.is_member(&ctx.workspace_id, &ctx.user_id).await {
			Ok(true) => {},
			Ok(false) => {
				self.log_decision(ctx, name, &hash, "block", ToolError::Forbidden.reason());

				return Err(ToolError::Forbidden);
			},
			Err(err) => {
				self.log_decision(ctx, name, &hash, "block", "membership_unavailable");

				return Err(ToolError::execution(err));
			},
		}

		if self.requires_confirmation(name) {
			let confirmed = ctx
				.confirmation
				.as_ref()
				.is_some_and(|grant| grant.tool == name && grant.args_hash == hash);

			if !confirmed {
				self.log_decision(ctx, name, &hash, "confirm_required", "confirmation_missing");

				return Err(ToolError::ConfirmationRequired { args_hash: hash });
			}

			self.log_decision(ctx, name, &hash, "allow", "confirmed");
		} else {
			self.log_decision(ctx, name, &hash, "allow", "authorized");
		}

		let result = self.run(ctx, args).await;

		if let Err(err) = &result {
			tracing::warn!(
				tool = name,
				args_hash = short_hash(&hash),
				error = %err,
				"Tool execution failed."
			);
		}

		result
	}

	fn log_decision(
		&self,
		ctx: &ToolContext,
		tool: &str,
		hash: &str,
		decision: &str,
		reason: &str,
	) {
		tracing::info!(
			workspace_id = %ctx.workspace_id,
			user_id = %ctx.user_id,
			tool,
			args_hash = short_hash(hash),
			decision,
			reason,
			"Tool decision."
		);
	}

	async fn run(&self, ctx: &ToolContext, args: ToolArgs) -> Result<Value, ToolError> {
		let ws = &ctx.workspace_id;
		let user = &ctx.user_id;

		match args {
			ToolArgs::AddCalendarEvent(args) => {
				let event = NewCalendarEvent {
					title: args.title,
					start_time: timestamp("start_time", &args.start_time)?,
					end_time: optional_timestamp(args.end_time.as_deref())?,
					location: args.location,
				};
				let created = self
					.store
					.add_calendar_event(ws, user, &event)
					.await
					.map_err(ToolError::execution)?;

				Ok(self.created(ws, created, "Event added to the trip calendar."))
			},
			ToolArgs::CreateTask(args) => {
				let task = NewTask {
					title: args.title,
					description: args.description,
					due_date: optional_timestamp(args.due_date.as_deref())?,
				};
				let created =
					self.store.create_task(ws, user, &task).await.map_err(ToolError::execution)?;

				Ok(self.created(ws, created, "Task created."))
			},
			ToolArgs::CreatePoll(args) => {
				let poll = NewPoll { question: args.question, options: args.options };
				let created =
					self.store.create_poll(ws, user, &poll).await.map_err(ToolError::execution)?;

				Ok(self.created(ws, created, "Poll created."))
			},
			ToolArgs::GetPaymentSummary(_) => self.payment_summary(ws).await,
			ToolArgs::RecordPayment(args) => {
				let split_with = self.split_members(ws, user, &args.split_with).await?;
				let payment = NewPayment {
					description: args.description,
					amount_cents: amount_to_cents(args.amount),
					currency: args.currency,
					split_with,
				};
				let created =
					self.store
						.record_payment(ws, user, &payment)
						.await
						.map_err(ToolError::execution)?;

				Ok(self.created(ws, created, "Payment recorded."))
			},
			ToolArgs::SearchPlaces(args) => {
				let results = self
					.places
					.search_places(&self.places_cfg, &args.query, args.near.as_deref())
					.await
					.map_err(ToolError::execution)?;

				Ok(serde_json::json!({ "ok": true, "results": results }))
			},
			ToolArgs::GetPlaceDetails(args) => {
				let details = self
					.places
					.place_details(&self.places_cfg, &args.place_id)
					.await
					.map_err(ToolError::execution)?;

				Ok(serde_json::json!({ "ok": true, "place": details }))
			},
			ToolArgs::GetDirections(args) => {
				let mode = args.mode.as_deref().unwrap_or("driving");
				let directions = self
					.places
					.directions(&self.places_cfg, &args.origin, &args.destination, mode)
					.await
					.map_err(ToolError::execution)?;

				Ok(serde_json::json!({ "ok": true, "mode": mode, "directions": directions }))
			},
		}
	}

	/// Acknowledges a write and schedules the new row for indexing without waiting on it.
	fn created(&self, workspace_id: &WorkspaceId, created: CreatedItem, message: &str) -> Value {
		if let Some(queue) = &self.queue {
			refresh::enqueue_detached(
				queue.clone(),
				RefreshJob::new(
					workspace_id.clone(),
					Some(created.source_type),
					SourceSelector::One(created.source_id.clone()),
				),
			);
		}

		serde_json::json!({
			"ok": true,
			"id": created.source_id,
			"kind": created.source_type,
			"message": message,
		})
	}

	async fn payment_summary(&self, workspace_id: &WorkspaceId) -> Result<Value, ToolError> {
		let payments = self
			.store
			.recent_payments(workspace_id, PAYMENT_SUMMARY_ROWS)
			.await
			.map_err(ToolError::execution)?;
		let mut outstanding: BTreeMap<String, i64> = BTreeMap::new();
		let mut settled: BTreeMap<String, i64> = BTreeMap::new();
		let mut recent = Vec::new();

		for payment in payments.iter().filter(|payment| &payment.workspace_id == workspace_id) {
			let bucket = if payment.settled { &mut settled } else { &mut outstanding };

			*bucket.entry(payment.currency.clone()).or_default() += payment.amount_cents;

			if recent.len() < 10 {
				recent.push(serde_json::json!({
					"description": payment.description,
					"amount": format_amount(payment.amount_cents),
					"currency": payment.currency,
					"paid_by": payment.paid_by,
					"split_count": payment.split_count,
					"settled": payment.settled,
				}));
			}
		}

		let totals = |map: BTreeMap<String, i64>| {
			map.into_iter()
				.map(|(currency, cents)| (currency, Value::String(format_amount(cents))))
				.collect::<Map<String, Value>>()
		};

		Ok(serde_json::json!({
			"ok": true,
			"outstanding": totals(outstanding),
			"settled": totals(settled),
			"recent": recent,
		}))
	}

	/// Resolves `split_with` against the roster. An empty list splits with everyone.
	async fn split_members(
		&self,
		workspace_id: &WorkspaceId,
		payer: &UserId,
		requested: &[String],
	) -> Result<Vec<UserId>, ToolError> {
		let roster = self.store.roster(workspace_id).await.map_err(ToolError::execution)?;

		if requested.is_empty() {
			return Ok(roster.into_iter().map(|member| member.user_id).collect());
		}

		let mut out = Vec::with_capacity(requested.len());

		for id in requested {
			let Some(member) = roster.iter().find(|member| {
				member.user_id.as_str() == id || member.display_name.eq_ignore_ascii_case(id)
			}) else {
				return Err(ToolError::schema("split_with must only name members of this trip."));
			};

			if !out.contains(&member.user_id) {
				out.push(member.user_id.clone());
			}
		}

		if !out.contains(payer) {
			out.push(payer.clone());
		}

		Ok(out)
	}
}

fn short_hash(hash: &str) -> &str {
	hash.get(..HASH_LOG_CHARS).unwrap_or(hash)
}

/// JSON schemas offered to the model. They mirror the typed argument structs.
pub fn tool_specs() -> Vec<ToolSpec> {
	let spec = |name: &str, description: &str, parameters: Value| ToolSpec {
		name: name.to_string(),
		description: description.to_string(),
		parameters,
	};

	vec![
		spec(
			"add_calendar_event",
			"Add an event to the trip calendar.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"title": { "type": "string", "minLength": 1, "maxLength": 200 },
					"start_time": { "type": "string", "format": "date-time" },
					"end_time": { "type": "string", "format": "date-time" },
					"location": { "type": "string", "maxLength": 300 }
				},
				"required": ["title", "start_time"],
				"additionalProperties": false
			}),
		),
		spec(
			"create_task",
			"Create a task on the trip checklist.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"title": { "type": "string", "minLength": 1, "maxLength": 200 },
					"description": { "type": "string", "maxLength": 2000 },
					"due_date": { "type": "string", "format": "date-time" }
				},
				"required": ["title"],
				"additionalProperties": false
			}),
		),
		spec(
			"create_poll",
			"Create a poll for trip members to vote on.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"question": { "type": "string", "minLength": 1, "maxLength": 300 },
					"options": {
						"type": "array",
						"items": { "type": "string", "minLength": 1, "maxLength": 100 },
						"minItems": 2,
						"maxItems": 10
					}
				},
				"required": ["question", "options"],
				"additionalProperties": false
			}),
		),
		spec(
			"get_payment_summary",
			"Summarize shared trip expenses, outstanding and settled.",
			serde_json::json!({ "type": "object", "properties": {}, "additionalProperties": false }),
		),
		spec(
			"record_payment",
			"Record a shared expense. The user must confirm it in the app before it is saved.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"description": { "type": "string", "minLength": 1, "maxLength": 200 },
					"amount": { "type": "number", "exclusiveMinimum": 0, "maximum": 1000000 },
					"currency": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
					"split_with": { "type": "array", "items": { "type": "string" }, "maxItems": 50 }
				},
				"required": ["description", "amount", "currency"],
				"additionalProperties": false
			}),
		),
		spec(
			"search_places",
			"Search for places such as restaurants, sights or hotels.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"query": { "type": "string", "minLength": 1, "maxLength": 200 },
					"near": { "type": "string", "maxLength": 200 }
				},
				"required": ["query"],
				"additionalProperties": false
			}),
		),
		spec(
			"get_place_details",
			"Get opening hours, contact details and rating for a place.",
			serde_json::json!({
				"type": "object",
				"properties": { "place_id": { "type": "string", "minLength": 1, "maxLength": 200 } },
				"required": ["place_id"],
				"additionalProperties": false
			}),
		),
		spec(
			"get_directions",
			"Get directions between two locations.",
			serde_json::json!({
				"type": "object",
				"properties": {
					"origin": { "type": "string", "minLength": 1, "maxLength": 300 },
					"destination": { "type": "string", "minLength": 1, "maxLength": 300 },
					"mode": { "type": "string", "enum": TRAVEL_MODES }
				},
				"required": ["origin", "destination"],
				"additionalProperties": false
			}),
		),
	]
}
