mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Claim, Config, Context, Dispatch, EmbeddingProviderConfig, Postgres, Providers, Service,
	Storage, SummaryProviderConfig, Worker,
};

use std::{fs, path::Path};

/// Largest number of entries a single queue send call may carry.
pub const MAX_WIRE_BATCH_SIZE: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	parse(&raw).map_err(|err| match err {
		Error::ParseConfig { source, .. } =>
			Error::ParseConfig { path: path.to_path_buf(), source },
		other => other,
	})
}

pub fn parse(raw: &str) -> Result<Config> {
	let mut cfg: Config = toml::from_str(raw)
		.map_err(|err| Error::ParseConfig { path: Default::default(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::invalid("storage.postgres.dsn", "must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::invalid("storage.postgres.pool_max_conns", "must be greater than zero."));
	}

	validate_embedding(&cfg.providers.embedding)?;
	validate_summary(&cfg.providers.summary)?;

	let context = &cfg.context;

	if !context.similarity_threshold.is_finite() {
		return Err(Error::invalid("context.similarity_threshold", "must be a finite number."));
	}
	if !(0.0..=1.0).contains(&context.similarity_threshold) {
		return Err(Error::invalid("context.similarity_threshold", "must be in the range 0.0-1.0."));
	}
	if context.time_window_hours == 0 {
		return Err(Error::invalid("context.time_window_hours", "must be greater than zero."));
	}
	if context.neighbor_limit == 0 {
		return Err(Error::invalid("context.neighbor_limit", "must be greater than zero."));
	}
	if context.neighbor_timeout_ms == 0 {
		return Err(Error::invalid("context.neighbor_timeout_ms", "must be greater than zero."));
	}
	if cfg.claim.batch_size == 0 {
		return Err(Error::invalid("claim.batch_size", "must be greater than zero."));
	}
	if cfg.claim.max_messages_per_run < cfg.claim.batch_size {
		return Err(Error::invalid(
			"claim.max_messages_per_run",
			"must be greater than or equal to claim.batch_size.",
		));
	}
	if cfg.claim.stale_after_seconds <= cfg.worker.visibility_timeout_seconds {
		return Err(Error::invalid(
			"claim.stale_after_seconds",
			"must be greater than worker.visibility_timeout_seconds.",
		));
	}
	if cfg.dispatch.queue_name.trim().is_empty() {
		return Err(Error::invalid("dispatch.queue_name", "must be non-empty."));
	}
	if cfg.dispatch.wire_batch_size == 0 || cfg.dispatch.wire_batch_size > MAX_WIRE_BATCH_SIZE {
		return Err(Error::invalid(
			"dispatch.wire_batch_size",
			format!("must be in the range 1-{MAX_WIRE_BATCH_SIZE}."),
		));
	}
	if cfg.worker.delivery_batch_size == 0 {
		return Err(Error::invalid("worker.delivery_batch_size", "must be greater than zero."));
	}
	if cfg.worker.visibility_timeout_seconds == 0 {
		return Err(Error::invalid(
			"worker.visibility_timeout_seconds",
			"must be greater than zero.",
		));
	}
	if cfg.worker.max_receive_count == 0 {
		return Err(Error::invalid("worker.max_receive_count", "must be greater than zero."));
	}

	Ok(())
}

fn validate_embedding(cfg: &EmbeddingProviderConfig) -> Result<()> {
	if cfg.api_key.is_empty() {
		return Err(Error::invalid("providers.embedding.api_key", "must be non-empty."));
	}
	if cfg.model.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.model", "must be non-empty."));
	}
	if cfg.dimensions == 0 {
		return Err(Error::invalid("providers.embedding.dimensions", "must be greater than zero."));
	}
	if cfg.max_input_tokens == 0 {
		return Err(Error::invalid(
			"providers.embedding.max_input_tokens",
			"must be greater than zero.",
		));
	}
	if cfg.timeout_ms == 0 {
		return Err(Error::invalid("providers.embedding.timeout_ms", "must be greater than zero."));
	}
	if !cfg.cost_per_million_tokens.is_finite() || cfg.cost_per_million_tokens < 0.0 {
		return Err(Error::invalid(
			"providers.embedding.cost_per_million_tokens",
			"must be a finite number, zero or greater.",
		));
	}
	if cfg.embedding_version.trim().is_empty() {
		return Err(Error::invalid("providers.embedding.embedding_version", "must be non-empty."));
	}

	validate_header_values("providers.embedding.default_headers", &cfg.default_headers)
}

fn validate_summary(cfg: &SummaryProviderConfig) -> Result<()> {
	if cfg.api_key.is_empty() {
		return Err(Error::invalid("providers.summary.api_key", "must be non-empty."));
	}
	if cfg.model.trim().is_empty() {
		return Err(Error::invalid("providers.summary.model", "must be non-empty."));
	}
	if cfg.max_input_tokens == 0 {
		return Err(Error::invalid(
			"providers.summary.max_input_tokens",
			"must be greater than zero.",
		));
	}
	if !cfg.temperature.is_finite() || !(0.0..=2.0).contains(&cfg.temperature) {
		return Err(Error::invalid(
			"providers.summary.temperature",
			"must be in the range 0.0-2.0.",
		));
	}
	if cfg.max_output_tokens == 0 {
		return Err(Error::invalid(
			"providers.summary.max_output_tokens",
			"must be greater than zero.",
		));
	}
	if cfg.timeout_ms == 0 {
		return Err(Error::invalid("providers.summary.timeout_ms", "must be greater than zero."));
	}

	validate_header_values("providers.summary.default_headers", &cfg.default_headers)
}

fn validate_header_values(
	key: &'static str,
	headers: &serde_json::Map<String, serde_json::Value>,
) -> Result<()> {
	if headers.values().any(|value| !value.is_string()) {
		return Err(Error::invalid(key, "values must be strings."));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	cfg.providers.embedding.api_key = cfg.providers.embedding.api_key.trim().to_string();
	cfg.providers.summary.api_key = cfg.providers.summary.api_key.trim().to_string();

	for api_base in
		[&mut cfg.providers.embedding.api_base, &mut cfg.providers.summary.api_base]
	{
		while api_base.ends_with('/') {
			api_base.pop();
		}
	}
}
