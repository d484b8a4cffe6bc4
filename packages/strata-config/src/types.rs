use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub search: Search,
	pub schema: Schema,
	pub identity: Identity,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub default_page_size: u32,
	pub max_page_size: u32,
	pub query_timeout_ms: u64,
	#[serde(default = "default_max_redaction_depth")]
	pub max_redaction_depth: usize,
	/// Upper bound on candidates a store may load for one query. `0` disables the bound.
	#[serde(default = "default_max_candidates")]
	pub max_candidates: u32,
	/// Adds `active = true` next to every `"true"`-valued filter, as older clients expect.
	#[serde(default = "default_legacy_active_flag")]
	pub legacy_active_flag: bool,
	#[serde(default)]
	pub date_range: SearchDateRange,
	#[serde(default)]
	pub text: SearchText,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchDateRange {
	pub start_suffix: String,
	pub end_suffix: String,
}
impl Default for SearchDateRange {
	fn default() -> Self {
		Self { start_suffix: "Start".to_string(), end_suffix: "End".to_string() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchText {
	/// Number of term hits at which the frequency half of the relevance score reaches 0.5.
	pub half_saturation: f32,
	/// Weight of query-term coverage in the relevance score; the rest goes to hit frequency.
	pub coverage_weight: f32,
}
impl Default for SearchText {
	fn default() -> Self {
		Self { half_saturation: 4.0, coverage_weight: 0.8 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Schema {
	pub kinds: Vec<SchemaKind>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchemaKind {
	pub name: String,
	#[serde(default)]
	pub flavours: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Identity {
	pub api_base: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	#[serde(default = "default_public_roles")]
	pub public_roles: Vec<String>,
}

fn default_max_redaction_depth() -> usize {
	32
}

fn default_max_candidates() -> u32 {
	10_000
}

fn default_legacy_active_flag() -> bool {
	true
}

fn default_public_roles() -> Vec<String> {
	vec!["public".to_string()]
}
