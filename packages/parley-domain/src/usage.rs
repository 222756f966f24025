use time::{Date, OffsetDateTime};

/// Linear cost estimate in USD. Not a billing source of truth.
pub fn estimate_cost(tokens: u64, cost_per_million_tokens: f64) -> f64 {
	tokens as f64 * cost_per_million_tokens / 1_000_000.0
}

/// First day of the UTC month containing `ts`, the key of the monthly usage row.
pub fn month_start(ts: OffsetDateTime) -> Date {
	let utc = ts.to_offset(time::UtcOffset::UTC);

	utc.date().replace_day(1).unwrap_or(utc.date())
}

/// Distributes a provider-reported token total across shares proportional to their estimates.
///
/// Rounding remainders go to the last share so the parts always sum to `reported_total`. With no
/// estimated tokens at all the estimates are returned unchanged.
pub fn apportion_tokens(estimates: &[u64], reported_total: u64) -> Vec<u64> {
	let estimated_total: u64 = estimates.iter().sum();

	if estimated_total == 0 || estimates.is_empty() {
		return estimates.to_vec();
	}

	let mut parts: Vec<u64> = estimates
		.iter()
		.map(|estimate| {
			((*estimate as u128 * reported_total as u128) / estimated_total as u128) as u64
		})
		.collect();
	let assigned: u64 = parts.iter().sum();

	if let Some(last) = parts.last_mut() {
		*last += reported_total.saturating_sub(assigned);
	}

	parts
}
