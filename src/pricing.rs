// Pricing Engine - Rates as Data
// Category-specific hourly rates, grace periods, and overtime penalties.
// Pure: a charge is a function of (category, duration, rate table).

use crate::error::{RentalError, RentalResult};
use anyhow::{Context as AnyhowContext, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Billing unit: durations are rounded up to whole hours before
/// rate multiplication.
pub const BILLING_UNIT_SECS: i64 = 3600;

// ============================================================================
// BIKE CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BikeCategory {
    Mountain,
    Road,
    Hybrid,
    Electric,
}

impl BikeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BikeCategory::Mountain => "Mountain",
            BikeCategory::Road => "Road",
            BikeCategory::Hybrid => "Hybrid",
            BikeCategory::Electric => "Electric",
        }
    }

    /// Parse a category name (case-insensitive). Unknown names are a
    /// validation error, never a silent fallback.
    pub fn parse(s: &str) -> RentalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "mountain" => Ok(BikeCategory::Mountain),
            "road" => Ok(BikeCategory::Road),
            "hybrid" => Ok(BikeCategory::Hybrid),
            "electric" => Ok(BikeCategory::Electric),
            other => Err(RentalError::validation(format!(
                "unknown bike category: {:?}",
                other
            ))),
        }
    }

    pub fn all() -> [BikeCategory; 4] {
        [
            BikeCategory::Mountain,
            BikeCategory::Road,
            BikeCategory::Hybrid,
            BikeCategory::Electric,
        ]
    }
}

impl std::fmt::Display for BikeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RATE POLICY
// ============================================================================

/// Per-category pricing rule. All amounts are integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatePolicy {
    /// Rate per billed hour within the grace period
    pub hourly_cents: i64,

    /// Hours included before overtime applies (inclusive boundary)
    pub grace_hours: i64,

    /// Multiplier applied to the hourly rate for hours past the grace period
    pub overtime_multiplier: f64,

    /// Flat per-hour surcharge on every billed hour (battery fee for
    /// electric bikes)
    #[serde(default)]
    pub surcharge_cents: i64,
}

impl RatePolicy {
    /// Overtime rate per hour, rounded to the nearest cent.
    pub fn overtime_cents(&self) -> i64 {
        (self.hourly_cents as f64 * self.overtime_multiplier).round() as i64
    }
}

// ============================================================================
// CHARGE
// ============================================================================

/// Charge breakdown for a completed rental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    pub billed_hours: i64,
    pub base_cents: i64,
    pub overtime_cents: i64,
    pub surcharge_cents: i64,
}

impl Charge {
    pub fn total_cents(&self) -> i64 {
        self.base_cents + self.overtime_cents + self.surcharge_cents
    }
}

/// Render integer cents as a dollar string ("1550" -> "$15.50").
pub fn format_cents(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, (cents % 100).abs())
}

// ============================================================================
// RATE TABLE
// ============================================================================

/// The rate table maps each category to its policy. Rules are data: the
/// table can be loaded from a JSON file or built from the compiled-in
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    policies: HashMap<BikeCategory, RatePolicy>,
}

impl RateTable {
    /// Default rates. Grace periods follow the per-category hourly
    /// thresholds the business has always used; overtime is billed at
    /// 1.5x the hourly rate.
    pub fn builtin() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            BikeCategory::Mountain,
            RatePolicy {
                hourly_cents: 1500,
                grace_hours: 4,
                overtime_multiplier: 1.5,
                surcharge_cents: 0,
            },
        );
        policies.insert(
            BikeCategory::Road,
            RatePolicy {
                hourly_cents: 1200,
                grace_hours: 3,
                overtime_multiplier: 1.5,
                surcharge_cents: 0,
            },
        );
        policies.insert(
            BikeCategory::Hybrid,
            RatePolicy {
                hourly_cents: 1000,
                grace_hours: 6,
                overtime_multiplier: 1.5,
                surcharge_cents: 0,
            },
        );
        policies.insert(
            BikeCategory::Electric,
            RatePolicy {
                hourly_cents: 2500,
                grace_hours: 8,
                overtime_multiplier: 1.5,
                surcharge_cents: 200,
            },
        );
        RateTable { policies }
    }

    /// Load a rate table from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rate table: {:?}", path.as_ref()))?;

        let policies: HashMap<BikeCategory, RatePolicy> =
            serde_json::from_str(&content).context("Failed to parse rate table JSON")?;

        Ok(RateTable { policies })
    }

    pub fn from_policies(policies: HashMap<BikeCategory, RatePolicy>) -> Self {
        RateTable { policies }
    }

    pub fn policy(&self, category: BikeCategory) -> Option<&RatePolicy> {
        self.policies.get(&category)
    }

    pub fn category_count(&self) -> usize {
        self.policies.len()
    }

    /// Compute the charge for a rental of the given category and elapsed
    /// duration.
    ///
    /// The duration is rounded up to the next whole billing unit. Hours up
    /// to and including the grace period bill at the hourly rate; hours
    /// past it bill at the overtime rate. The grace boundary itself is not
    /// overtime. Zero duration yields a zero charge (no minimum-charge
    /// policy).
    pub fn quote(&self, category: BikeCategory, duration: Duration) -> RentalResult<Charge> {
        if duration < Duration::zero() {
            return Err(RentalError::validation(format!(
                "rental duration must be non-negative, got {}s",
                duration.num_seconds()
            )));
        }

        let policy = self.policies.get(&category).ok_or_else(|| {
            RentalError::validation(format!("no rate policy for category {}", category))
        })?;

        let secs = duration.num_seconds();
        let billed_hours = (secs + BILLING_UNIT_SECS - 1) / BILLING_UNIT_SECS;

        let grace_billed = billed_hours.min(policy.grace_hours);
        let overtime_hours = (billed_hours - policy.grace_hours).max(0);

        Ok(Charge {
            billed_hours,
            base_cents: policy.hourly_cents * grace_billed,
            overtime_cents: policy.overtime_cents() * overtime_hours,
            surcharge_cents: policy.surcharge_cents * billed_hours,
        })
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ============================================================================
// TESTS
// ============================================================================
