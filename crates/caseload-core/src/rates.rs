use std::collections::HashMap;

/// Hourly rate applied when a contractor is not in the rate table.
pub const DEFAULT_HOURLY_RATE: f64 = 100.0;

const SENIOR_RATE: f64 = 95.0;
const ASSOCIATE_RATE: f64 = 70.0;

/// Build the default contractor rate map keyed by lowercased first name.
fn default_rate_map() -> HashMap<String, f64> {
    let mut map = HashMap::new();
    for name in ["nancy", "kathleen", "david", "melissa", "emily", "tarik"] {
        map.insert(name.to_string(), SENIOR_RATE);
    }
    for name in ["angela", "caroline", "julie", "lexi", "shirley"] {
        map.insert(name.to_string(), ASSOCIATE_RATE);
    }
    map
}

/// Resolves cost-per-hour rates for contractors.
///
/// Lookup is by first name, case-insensitive, so `"Nancy Smith"` and
/// `"nancy"` resolve identically. A flat override (from the filter spec)
/// outranks everything; otherwise the per-contractor table applies with
/// [`DEFAULT_HOURLY_RATE`] as the fallback.
#[derive(Debug, Clone)]
pub struct RateBook {
    rate_map: HashMap<String, f64>,
    default_rate: f64,
    flat_override: Option<f64>,
}

impl RateBook {
    /// Create a rate book.
    ///
    /// Pass `Some(map)` to override individual contractor rates; entries not
    /// present in `custom_rates` fall back to the built-in table.
    pub fn new(custom_rates: Option<HashMap<String, f64>>) -> Self {
        let mut rate_map = default_rate_map();
        if let Some(overrides) = custom_rates {
            for (name, rate) in overrides {
                rate_map.insert(name.to_lowercase(), rate);
            }
        }
        Self {
            rate_map,
            default_rate: DEFAULT_HOURLY_RATE,
            flat_override: None,
        }
    }

    /// Apply a flat cost-per-hour override. `None` leaves the book unchanged.
    pub fn with_flat_override(mut self, rate: Option<f64>) -> Self {
        self.flat_override = rate.or(self.flat_override);
        self
    }

    /// Replace the fallback rate for contractors absent from the table.
    /// `None` leaves the book unchanged.
    pub fn with_default_rate(mut self, rate: Option<f64>) -> Self {
        if let Some(rate) = rate {
            self.default_rate = rate;
        }
        self
    }

    /// The hourly rate for a contractor name.
    pub fn rate_for(&self, contractor: &str) -> f64 {
        if let Some(flat) = self.flat_override {
            return flat;
        }
        let first_name = contractor
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        self.rate_map
            .get(&first_name)
            .copied()
            .unwrap_or(self.default_rate)
    }

    /// Labor cost for a contractor working the given hours.
    pub fn cost_of(&self, contractor: &str, hours: f64) -> f64 {
        hours * self.rate_for(contractor)
    }
}

impl Default for RateBook {
    fn default() -> Self {
        Self::new(None)
    }
}
