use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use strata_config::{Config, SchemaKind};

const SAMPLE_CONFIG_TOML: &str = include_str!("fixtures/sample_config.toml");

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("strata_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse test config.")
}

fn assert_invalid(cfg: &Config, expected: &str) {
	let err = strata_config::validate(cfg).expect_err("Expected validation error.");

	assert!(err.to_string().contains(expected), "Unexpected error: {err}");
}

#[test]
fn strata_example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../strata.example.toml");

	strata_config::load(&path).expect("Expected strata.example.toml to be a valid config.");
}

#[test]
fn optional_sections_take_defaults() {
	let payload = SAMPLE_CONFIG_TOML
		.lines()
		.filter(|line| {
			!line.starts_with("max_redaction_depth")
				&& !line.starts_with("max_candidates")
				&& !line.starts_with("legacy_active_flag")
				&& !line.starts_with("start_suffix")
				&& !line.starts_with("end_suffix")
		})
		.collect::<Vec<_>>()
		.join("\n");
	let path = write_temp_config(payload);
	let result = strata_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected defaults to fill optional keys.");

	assert_eq!(cfg.search.max_redaction_depth, 32);
	assert_eq!(cfg.search.max_candidates, 10_000);
	assert!(cfg.search.legacy_active_flag);
	assert_eq!(cfg.search.date_range.start_suffix, "Start");
	assert_eq!(cfg.search.date_range.end_suffix, "End");
}

#[test]
fn load_reports_parse_errors_with_path() {
	let path = write_temp_config("[service\nhttp_bind = 1".to_string());
	let result = strata_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected parse error.");

	assert!(err.to_string().contains("strata_config_test_"), "Unexpected error: {err}");
}

#[test]
fn page_sizes_must_be_ordered() {
	let mut cfg = base_config();

	cfg.search.default_page_size = 0;

	assert_invalid(&cfg, "search.default_page_size must be greater than zero.");

	let mut cfg = base_config();

	cfg.search.max_page_size = 10;

	assert_invalid(&cfg, "search.max_page_size must be at least search.default_page_size.");
}

#[test]
fn date_suffixes_must_be_distinct() {
	let mut cfg = base_config();

	cfg.search.date_range.end_suffix = "Start".to_string();

	assert_invalid(&cfg, "search.date_range.start_suffix and end_suffix must differ.");
}

#[test]
fn text_weights_must_be_in_range() {
	let mut cfg = base_config();

	cfg.search.text.coverage_weight = 1.5;

	assert_invalid(&cfg, "search.text.coverage_weight must be in the range 0.0-1.0.");

	let mut cfg = base_config();

	cfg.search.text.half_saturation = f32::NAN;

	assert_invalid(&cfg, "search.text.half_saturation must be a finite number greater than zero.");
}

#[test]
fn schema_kinds_must_be_unique_and_not_reserved() {
	let mut cfg = base_config();

	cfg.schema.kinds.push(SchemaKind {
		name: "Permit".to_string(),
		flavours: vec!["OrderLNG".to_string()],
	});

	assert_invalid(&cfg, "schema kind \"OrderLNG\" is declared more than once.");

	let mut cfg = base_config();

	cfg.schema.kinds.push(SchemaKind { name: "Item".to_string(), flavours: Vec::new() });

	assert_invalid(&cfg, "schema kind name \"Item\" is reserved.");

	let mut cfg = base_config();

	cfg.schema.kinds.clear();

	assert_invalid(&cfg, "schema.kinds must declare at least one kind.");
}

#[test]
fn blank_public_roles_are_dropped_on_load() {
	let payload = SAMPLE_CONFIG_TOML.replace(
		"public_roles        = [\"public\"]",
		"public_roles        = [\"  \", \"public\"]",
	);
	let path = write_temp_config(payload);
	let result = strata_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	assert_eq!(result.expect("Expected valid config.").security.public_roles, vec!["public"]);

	let mut cfg = base_config();

	cfg.security.public_roles.clear();

	assert_invalid(&cfg, "security.public_roles must be non-empty.");
}
