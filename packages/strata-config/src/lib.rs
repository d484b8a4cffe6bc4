mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Identity, Postgres, Schema, SchemaKind, Search, SearchDateRange, SearchText, Security,
	Service, Storage,
};

use std::{collections::HashSet, fs, path::Path};

/// Kind name reserved for the by-id fetch path.
pub const ITEM_KIND: &str = "Item";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_page_size == 0 {
		return Err(Error::Validation {
			message: "search.default_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_page_size < cfg.search.default_page_size {
		return Err(Error::Validation {
			message: "search.max_page_size must be at least search.default_page_size."
				.to_string(),
		});
	}
	if cfg.search.query_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.query_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_redaction_depth == 0 {
		return Err(Error::Validation {
			message: "search.max_redaction_depth must be greater than zero.".to_string(),
		});
	}

	let date_range = &cfg.search.date_range;

	if date_range.start_suffix.is_empty() || date_range.end_suffix.is_empty() {
		return Err(Error::Validation {
			message: "search.date_range suffixes must be non-empty.".to_string(),
		});
	}
	if date_range.start_suffix == date_range.end_suffix {
		return Err(Error::Validation {
			message: "search.date_range.start_suffix and end_suffix must differ.".to_string(),
		});
	}
	if !cfg.search.text.half_saturation.is_finite() || cfg.search.text.half_saturation <= 0.0 {
		return Err(Error::Validation {
			message: "search.text.half_saturation must be a finite number greater than zero."
				.to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.search.text.coverage_weight) {
		return Err(Error::Validation {
			message: "search.text.coverage_weight must be in the range 0.0-1.0.".to_string(),
		});
	}

	validate_schema(&cfg.schema)?;

	if cfg.identity.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "identity.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.security.public_roles.is_empty() {
		return Err(Error::Validation {
			message: "security.public_roles must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn validate_schema(schema: &Schema) -> Result<()> {
	if schema.kinds.is_empty() {
		return Err(Error::Validation {
			message: "schema.kinds must declare at least one kind.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for kind in &schema.kinds {
		for name in std::iter::once(&kind.name).chain(kind.flavours.iter()) {
			if name.trim().is_empty() {
				return Err(Error::Validation {
					message: "schema kind names must be non-empty.".to_string(),
				});
			}
			if name == ITEM_KIND {
				return Err(Error::Validation {
					message: format!("schema kind name {ITEM_KIND:?} is reserved."),
				});
			}
			if !seen.insert(name.as_str()) {
				return Err(Error::Validation {
					message: format!("schema kind {name:?} is declared more than once."),
				});
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for kind in &mut cfg.schema.kinds {
		kind.name = kind.name.trim().to_string();

		for flavour in &mut kind.flavours {
			*flavour = flavour.trim().to_string();
		}
	}

	cfg.security.public_roles.retain(|role| !role.trim().is_empty());
}
