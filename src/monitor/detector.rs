//! Spread detection over venue quotes
//!
//! Each chain loop publishes one quote per monitored pool; detection runs
//! over the shared board. Same-pair venues on one chain make inter-venue
//! opportunities; across chains they make inter-chain ones. No synthetic or
//! placeholder data: a quote only exists if the reserves were just read.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::types::{Opportunity, StrategyHints, Venue, oracle_symbol};

/// Quotes older than this never participate in detection.
pub const QUOTE_STALENESS_SECS: i64 = 30;
/// Opportunities are actionable for this long after detection.
const OPPORTUNITY_TTL_SECS: i64 = 30;

/// One freshly-read pool state, reduced to an implied price.
#[derive(Debug, Clone)]
pub struct VenueQuote {
    pub venue: Venue,
    pub network: String,
    pub borrow_token: alloy::primitives::Address,
    pub counter_token: alloy::primitives::Address,
    /// Borrow-token units per counter-token unit.
    pub price: Decimal,
    /// Borrow-token liquidity available in the pool, USD.
    pub borrow_liquidity: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl VenueQuote {
    fn pair_key(&self) -> &'static str {
        oracle_symbol(self.counter_token)
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.observed_at <= Duration::seconds(QUOTE_STALENESS_SECS)
    }
}

/// Scan a quote board for price spreads above the threshold. The borrow
/// amount is capped by the cheap venue's available liquidity.
pub fn detect_spreads(
    quotes: &[VenueQuote],
    min_spread_pct: Decimal,
    borrow_amount: Decimal,
    now: DateTime<Utc>,
) -> Vec<Opportunity> {
    let mut opportunities = Vec::new();

    for (i, a) in quotes.iter().enumerate() {
        for b in quotes.iter().skip(i + 1) {
            if !a.is_fresh(now) || !b.is_fresh(now) {
                continue;
            }
            if a.pair_key() != b.pair_key() {
                continue;
            }
            if a.price <= dec!(0) || b.price <= dec!(0) {
                continue;
            }

            // Buy where the counter token is cheap, sell where it is dear.
            let (cheap, dear) = if a.price <= b.price { (a, b) } else { (b, a) };
            let spread_pct = ((dear.price - cheap.price) / cheap.price) * dec!(100);
            if spread_pct < min_spread_pct {
                continue;
            }

            let size = borrow_amount.min(cheap.borrow_liquidity);
            if size <= dec!(0) {
                continue;
            }

            let mut chain_ids = vec![cheap.venue.chain_id];
            if dear.venue.chain_id != cheap.venue.chain_id {
                chain_ids.push(dear.venue.chain_id);
            }
            let mut tokens = vec![cheap.borrow_token, cheap.counter_token];
            if dear.counter_token != cheap.counter_token {
                tokens.push(dear.counter_token);
            }

            opportunities.push(Opportunity {
                id: Uuid::new_v4(),
                detected_at: now,
                deadline: now + Duration::seconds(OPPORTUNITY_TTL_SECS),
                tokens,
                venues: vec![cheap.venue.clone(), dear.venue.clone()],
                chain_ids,
                network: cheap.network.clone(),
                borrow_token: cheap.borrow_token,
                borrow_amount: size,
                expected_gross_output: size * (dear.price / cheap.price),
                hints: StrategyHints::default(),
            });
        }
    }

    opportunities
}
