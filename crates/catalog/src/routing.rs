//! Price-bracket shard routing.
//!
//! A product lives in exactly one shard, chosen solely by its current price.
//! The bracket table is an ordered set of half-open intervals `[low, high)`
//! that partitions `[0, ∞)`; the last bracket is unbounded.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shardcat_core::{DomainError, DomainResult, Price, ShardId};

/// One row of the bracket table: `[low, high)` mapped to a shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBracket {
    pub shard: ShardId,
    pub low: Price,
    /// `None` means unbounded above.
    pub high: Option<Price>,
}

impl PriceBracket {
    pub fn new(shard: impl Into<ShardId>, low: Price, high: Option<Price>) -> Self {
        Self {
            shard: shard.into(),
            low,
            high,
        }
    }

    /// Returns true if `price` lies in `[low, high)`.
    pub fn contains(&self, price: Price) -> bool {
        price >= self.low && self.high.is_none_or(|h| price < h)
    }

    /// Clamp the query interval `[min, max)` to this bracket.
    ///
    /// Returns `None` when the two intervals do not intersect.
    pub fn intersect(&self, min: Price, max: Price) -> Option<RangeSlice> {
        let low = min.max(self.low);
        let high = match self.high {
            Some(h) => max.min(h),
            None => max,
        };
        (low < high).then(|| RangeSlice {
            shard: self.shard.clone(),
            low,
            high,
        })
    }
}

/// A price interval `[low, high)` restricted to a single shard's bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSlice {
    pub shard: ShardId,
    pub low: Price,
    pub high: Price,
}

/// Routing failure.
///
/// Cannot happen with a validated table (it covers `[0, ∞)`); treat it as a
/// configuration invariant violation, not a retryable condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("price {0} is outside every configured bracket")]
    OutOfRange(Price),
}

/// Pure, deterministic mapping from price to shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRouter {
    brackets: Vec<PriceBracket>,
}

impl ShardRouter {
    /// Validate a bracket table and build the router.
    ///
    /// Brackets may be given in any order. The table must be non-empty, start
    /// at 0, be contiguous (`high[i] == low[i+1]`), end with the only
    /// unbounded bracket, and name each shard once.
    pub fn new(mut brackets: Vec<PriceBracket>) -> DomainResult<Self> {
        if brackets.is_empty() {
            return Err(DomainError::configuration("bracket table is empty"));
        }

        brackets.sort_by_key(|b| b.low);

        let mut seen = std::collections::HashSet::new();
        for b in &brackets {
            if !seen.insert(b.shard.clone()) {
                return Err(DomainError::configuration(format!(
                    "shard '{}' appears in more than one bracket",
                    b.shard
                )));
            }
            if let Some(high) = b.high {
                if high <= b.low {
                    return Err(DomainError::configuration(format!(
                        "bracket for '{}' is empty or inverted: [{}, {})",
                        b.shard, b.low, high
                    )));
                }
            }
        }

        if brackets[0].low != Price::ZERO {
            return Err(DomainError::configuration(format!(
                "brackets must start at 0.00, first starts at {}",
                brackets[0].low
            )));
        }

        for pair in brackets.windows(2) {
            let (cur, next) = (&pair[0], &pair[1]);
            match cur.high {
                None => {
                    return Err(DomainError::configuration(format!(
                        "only the last bracket may be unbounded, '{}' is not last",
                        cur.shard
                    )));
                }
                Some(high) if high < next.low => {
                    return Err(DomainError::configuration(format!(
                        "gap between '{}' and '{}': [{}, {}) is not covered",
                        cur.shard, next.shard, high, next.low
                    )));
                }
                Some(high) if high > next.low => {
                    return Err(DomainError::configuration(format!(
                        "brackets '{}' and '{}' overlap",
                        cur.shard, next.shard
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(last) = brackets.last() {
            if let Some(high) = last.high {
                return Err(DomainError::configuration(format!(
                    "last bracket '{}' must be unbounded, ends at {}",
                    last.shard, high
                )));
            }
        }

        Ok(Self { brackets })
    }

    /// The standard three-shard table: `low_price [0, 50)`,
    /// `mid_price [50, 500)`, `high_price [500, ∞)`.
    pub fn standard() -> Self {
        Self {
            brackets: vec![
                PriceBracket::new("low_price", Price::ZERO, Some(Price::from_units(50))),
                PriceBracket::new("mid_price", Price::from_units(50), Some(Price::from_units(500))),
                PriceBracket::new("high_price", Price::from_units(500), None),
            ],
        }
    }

    /// Return the unique shard whose bracket contains `price`.
    pub fn route(&self, price: Price) -> Result<&ShardId, RouteError> {
        // Brackets are sorted and contiguous: the candidate is the last one
        // starting at or below `price`.
        let idx = self.brackets.partition_point(|b| b.low <= price);
        idx.checked_sub(1)
            .map(|i| &self.brackets[i])
            .filter(|b| b.contains(price))
            .map(|b| &b.shard)
            .ok_or(RouteError::OutOfRange(price))
    }

    /// Split the query interval `[min, max)` into one clamped slice per
    /// intersecting shard, in bracket order.
    pub fn slices(&self, min: Price, max: Price) -> DomainResult<Vec<RangeSlice>> {
        if max < min {
            return Err(DomainError::validation(format!(
                "max price {max} is below min price {min}"
            )));
        }
        Ok(self
            .brackets
            .iter()
            .filter_map(|b| b.intersect(min, max))
            .collect())
    }

    /// Shards in bracket order (the fixed scan order for point lookups).
    pub fn shards(&self) -> impl Iterator<Item = &ShardId> {
        self.brackets.iter().map(|b| &b.shard)
    }

    pub fn brackets(&self) -> &[PriceBracket] {
        &self.brackets
    }
}
