//! Static cost table and token approximation.
//!
//! Rates are USD per 1K tokens as `(input, output)`. Lookup is an exact
//! match on the model identifier; anything else is billed at
//! [`DEFAULT_RATES`].

/// Rates applied to models missing from [`PRICING`].
pub const DEFAULT_RATES: (f64, f64) = (0.001, 0.002);

/// Known `(model, (input_rate, output_rate))` pairs.
pub const PRICING: &[(&str, (f64, f64))] = &[
    ("gpt-4o-mini", (0.00015, 0.0006)),
    ("gpt-4o", (0.005, 0.015)),
    ("gpt-4", (0.03, 0.06)),
    ("claude-3-5-sonnet-20241022", (0.003, 0.015)),
    ("claude-3-haiku-20240307", (0.00025, 0.00125)),
];

/// Look up the `(input, output)` rate pair for a model.
pub fn rates_for(model: &str) -> (f64, f64) {
    PRICING
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rates)| *rates)
        .unwrap_or(DEFAULT_RATES)
}

/// Estimated cost of a call, rounded to 6 decimal places.
///
/// ```
/// use prompt_engine::pricing::estimate_cost;
///
/// assert_eq!(estimate_cost("gpt-4o", 1000, 0), 0.005);
/// ```
pub fn estimate_cost(model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    let (rate_in, rate_out) = rates_for(model);
    let raw = tokens_in as f64 / 1000.0 * rate_in + tokens_out as f64 / 1000.0 * rate_out;
    round6(raw)
}

/// Round to 6 decimal places.
pub(crate) fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Naive whitespace word count, used when a provider omits usage metadata.
pub fn approximate_tokens(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
