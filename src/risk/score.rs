//! Weighted risk score
//!
//! Deterministic function of the current ledger picture: the same history
//! always produces the same score.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::RiskParameters;

/// Score above which the gate forces an emergency halt.
pub const EMERGENCY_SCORE: Decimal = dec!(80);
/// Score above which the gate raises the Warning state.
pub const WARNING_SCORE: Decimal = dec!(50);

#[derive(Debug, Clone, Default)]
pub struct RiskScoreInputs {
    pub drawdown_pct: Decimal,
    pub daily_pnl: Decimal,
    pub volatility_pct: Decimal,
    /// Largest single-network exposure, USD.
    pub max_network_exposure: Decimal,
    pub critical_alerts: usize,
}

fn ratio(value: Decimal, limit: Decimal) -> Decimal {
    if limit <= dec!(0) {
        dec!(0)
    } else {
        value / limit
    }
}

/// drawdown/limit x30 + loss/limit x25 + volatility/limit x20 +
/// exposure/limit x15 + critical alerts x10, clamped to [0, 100].
pub fn compute_risk_score(inputs: &RiskScoreInputs, params: &RiskParameters) -> Decimal {
    let mut score = dec!(0);

    score += ratio(inputs.drawdown_pct.max(dec!(0)), params.max_drawdown_pct) * dec!(30);

    if inputs.daily_pnl < dec!(0) {
        score += ratio(-inputs.daily_pnl, params.max_daily_loss) * dec!(25);
    }

    score += ratio(inputs.volatility_pct.max(dec!(0)), params.max_volatility_pct) * dec!(20);
    score += ratio(
        inputs.max_network_exposure.max(dec!(0)),
        params.max_network_exposure,
    ) * dec!(15);
    score += Decimal::from(inputs.critical_alerts as u64) * dec!(10);

    score.clamp(dec!(0), dec!(100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calm_book_scores_zero() {
        let score = compute_risk_score(&RiskScoreInputs::default(), &RiskParameters::default());
        assert_eq!(score, dec!(0));
    }

    #[test]
    fn weights_sum_as_specified() {
        let params = RiskParameters::default();
        let inputs = RiskScoreInputs {
            drawdown_pct: params.max_drawdown_pct,        // 30
            daily_pnl: -params.max_daily_loss,            // 25
            volatility_pct: params.max_volatility_pct,    // 20
            max_network_exposure: params.max_network_exposure, // 15
            critical_alerts: 0,
        };
        assert_eq!(compute_risk_score(&inputs, &params), dec!(90));
    }

    #[test]
    fn positive_daily_pnl_does_not_score() {
        let params = RiskParameters::default();
        let inputs = RiskScoreInputs {
            daily_pnl: params.max_daily_loss, // profit, not loss
            ..Default::default()
        };
        assert_eq!(compute_risk_score(&inputs, &params), dec!(0));
    }

    #[test]
    fn clamped_at_one_hundred() {
        let params = RiskParameters::default();
        let inputs = RiskScoreInputs {
            drawdown_pct: params.max_drawdown_pct * dec!(10),
            critical_alerts: 12,
            ..Default::default()
        };
        assert_eq!(compute_risk_score(&inputs, &params), dec!(100));
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let params = RiskParameters::default();
        let inputs = RiskScoreInputs {
            drawdown_pct: dec!(7.5),
            daily_pnl: dec!(-1234.56),
            volatility_pct: dec!(3.2),
            max_network_exposure: dec!(42000),
            critical_alerts: 1,
        };
        let first = compute_risk_score(&inputs, &params);
        for _ in 0..10 {
            assert_eq!(compute_risk_score(&inputs, &params), first);
        }
    }
}
