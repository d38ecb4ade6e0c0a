//! Price resolution across rental pricing tiers.

use indexmap::IndexMap;

/// Display label for a pricing tier, e.g. `monthly` -> `/ month`.
///
/// Matching is case-insensitive. Unknown tiers are shown as `/ <tier>`.
pub fn tier_label(tier: &str) -> String {
  let label = match tier.to_lowercase().as_str() {
    "nightly" => "night",
    "daily" => "day",
    "weekly" => "week",
    "monthly" => "month",
    "quarterly" => "quarter",
    "biannually" | "biannual" => "6 months",
    "yearly" | "annually" | "annual" => "year",
    _ => return format!("/ {}", tier),
  };
  format!("/ {}", label)
}

/// Cheapest tier as `(amount, label)`.
///
/// Equal amounts resolve to the tier that comes first in `pricing`. Returns
/// `None` when no tier carries an amount.
pub fn cheapest_tier(pricing: &IndexMap<String, Option<f64>>) -> Option<(f64, String)> {
  let mut cheapest: Option<(&str, f64)> = None;

  for (tier, amount) in pricing {
    let Some(amount) = *amount else {
      continue;
    };
    match cheapest {
      Some((_, best)) if amount >= best => {}
      _ => cheapest = Some((tier.as_str(), amount)),
    }
  }

  cheapest.map(|(tier, amount)| (amount, tier_label(tier)))
}
