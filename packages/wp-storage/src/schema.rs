pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

pub fn statements(sql: &str) -> impl Iterator<Item = &str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_embedding_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_embedding_records.sql")),
				"tables/002_index_refresh_outbox.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_index_refresh_outbox.sql")),
				"tables/003_session_turns.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_session_turns.sql")),
				"tables/010_trips.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_trips.sql")),
				"tables/011_trip_members.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_trip_members.sql")),
				"tables/012_trip_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/012_trip_messages.sql")),
				"tables/013_trip_events.sql" =>
					out.push_str(include_str!("../../../sql/tables/013_trip_events.sql")),
				"tables/014_trip_tasks.sql" =>
					out.push_str(include_str!("../../../sql/tables/014_trip_tasks.sql")),
				"tables/015_trip_polls.sql" =>
					out.push_str(include_str!("../../../sql/tables/015_trip_polls.sql")),
				"tables/016_trip_payments.sql" =>
					out.push_str(include_str!("../../../sql/tables/016_trip_payments.sql")),
				"tables/017_trip_places.sql" =>
					out.push_str(include_str!("../../../sql/tables/017_trip_places.sql")),
				"tables/018_trip_links.sql" =>
					out.push_str(include_str!("../../../sql/tables/018_trip_links.sql")),
				"tables/019_user_preferences.sql" =>
					out.push_str(include_str!("../../../sql/tables/019_user_preferences.sql")),
				"tables/020_trip_capabilities.sql" =>
					out.push_str(include_str!("../../../sql/tables/020_trip_capabilities.sql")),
				"tables/021_user_entitlements.sql" =>
					out.push_str(include_str!("../../../sql/tables/021_user_entitlements.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
