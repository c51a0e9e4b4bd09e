//! Commission schemes: percentage-of-value stocks and fixed-fee,
//! margin-backed futures.

/// Per-feed commission and margining rules.
///
/// The scheme decides three things at once: what a fill costs in commission,
/// how much cash an open position consumes, and how profit flows back. Stock
/// positions tie up their full traded value and settle profit when they
/// close; futures positions tie up margin per contract and settle profit
/// against cash every bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionInfo {
    scheme: Scheme,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scheme {
    Stock { rate: f64 },
    Futures { commission: f64, margin: f64, mult: f64 },
}

impl Default for CommissionInfo {
    fn default() -> Self {
        Self::stocks(0.0)
    }
}

impl CommissionInfo {
    /// Percentage commission on traded value.
    pub fn stocks(rate: f64) -> Self {
        assert!(rate >= 0.0, "commission rate must be nonnegative");
        Self {
            scheme: Scheme::Stock { rate },
        }
    }

    /// Fixed commission per contract, margin per contract, point multiplier.
    pub fn futures(commission: f64, margin: f64, mult: f64) -> Self {
        assert!(margin > 0.0, "futures margin must be positive");
        assert!(mult > 0.0, "futures multiplier must be positive");
        Self {
            scheme: Scheme::Futures {
                commission,
                margin,
                mult,
            },
        }
    }

    /// Commission charged for trading `size` at `price`. Sign-insensitive.
    pub fn commission(&self, size: f64, price: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { rate } => size.abs() * price * rate,
            Scheme::Futures { commission, .. } => size.abs() * commission,
        }
    }

    /// Cash the operation moves, before commission. Signed for stocks
    /// (a sale returns cash); margin-based and unsigned for futures.
    pub fn operation_cost(&self, size: f64, price: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => size * price,
            Scheme::Futures { margin, .. } => size.abs() * margin,
        }
    }

    /// Profit of holding `size` from `entry` to `exit`.
    pub fn pnl(&self, size: f64, entry: f64, exit: f64) -> f64 {
        size * (exit - entry) * self.multiplier()
    }

    /// Cash settled when the mark moves from `prev` to `current`. Zero for
    /// stocks, whose profit only materializes on close.
    pub fn cash_adjust(&self, size: f64, prev: f64, current: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => 0.0,
            Scheme::Futures { mult, .. } => size * (current - prev) * mult,
        }
    }

    /// Contribution of an open position to account value at `price`.
    pub fn position_value(&self, size: f64, price: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => size * price,
            Scheme::Futures { margin, .. } => size.abs() * margin,
        }
    }

    /// Cash moved by a fill split into its `opened` and `closed` portions,
    /// before commission. Negative consumes cash. Stocks move full traded
    /// value; futures move margin plus the closed contracts' profit since
    /// the last settled `mark`.
    pub fn fill_cash_flow(&self, opened: f64, closed: f64, price: f64, mark: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => -(opened + closed) * price,
            Scheme::Futures { margin, mult, .. } => {
                -opened.abs() * margin + closed.abs() * margin
                    + (-closed) * (price - mark) * mult
            }
        }
    }

    /// Settlement basis after a fill: `kept` contracts stood settled at
    /// `mark` and `opened` more arrived at `price`. Stocks keep their mark,
    /// which is pure valuation; futures blend so the next bar's settlement
    /// credits new contracts only from their own fill price.
    pub fn settled_mark(&self, kept: f64, mark: f64, opened: f64, price: f64) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => mark,
            Scheme::Futures { .. } => {
                let total = kept + opened;
                if total == 0.0 {
                    price
                } else {
                    (kept * mark + opened * price) / total
                }
            }
        }
    }

    fn multiplier(&self) -> f64 {
        match self.scheme {
            Scheme::Stock { .. } => 1.0,
            Scheme::Futures { mult, .. } => mult,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_commission_is_rate_on_value() {
        let info = CommissionInfo::stocks(0.5);
        assert_eq!(info.commission(100.0, 10.0), 500.0);
        assert_eq!(info.commission(-100.0, 10.0), 500.0);
        assert_eq!(info.operation_cost(100.0, 10.0), 1000.0);
        assert_eq!(info.operation_cost(-100.0, 10.0), -1000.0);
    }

    #[test]
    fn stock_pnl_has_unit_multiplier_and_no_bar_settlement() {
        let info = CommissionInfo::stocks(0.001);
        assert_eq!(info.pnl(100.0, 10.0, 12.0), 200.0);
        assert_eq!(info.cash_adjust(100.0, 10.0, 12.0), 0.0);
        assert_eq!(info.position_value(-50.0, 10.0), -500.0);
    }

    #[test]
    fn futures_commission_is_flat_per_contract() {
        let info = CommissionInfo::futures(0.5, 10.0, 10.0);
        assert_eq!(info.commission(100.0, 3.0), 50.0);
        assert_eq!(info.commission(-100.0, 999.0), 50.0);
    }

    #[test]
    fn futures_cost_and_value_ride_on_margin() {
        let info = CommissionInfo::futures(0.5, 10.0, 10.0);
        assert_eq!(info.operation_cost(100.0, 7.0), 1000.0);
        assert_eq!(info.operation_cost(-100.0, 7.0), 1000.0);
        assert_eq!(info.position_value(-100.0, 7.0), 1000.0);
    }

    #[test]
    fn futures_pnl_scales_by_multiplier() {
        let info = CommissionInfo::futures(0.5, 10.0, 10.0);
        assert_eq!(info.pnl(100.0, 10.0, 5.0), -5000.0);
        assert_eq!(info.pnl(-100.0, 10.0, 5.0), 5000.0);
        assert_eq!(info.cash_adjust(100.0, 10.0, 10.3), 300.0);
    }

    #[test]
    fn stock_fill_cash_flow_is_signed_traded_value() {
        let info = CommissionInfo::stocks(0.0);
        // Pure open: pay for the shares.
        assert_eq!(info.fill_cash_flow(100.0, 0.0, 10.0, 9.0), -1000.0);
        // Pure close of a long: the sale returns cash at the sale price.
        assert_eq!(info.fill_cash_flow(0.0, -100.0, 12.0, 9.0), 1200.0);
    }

    #[test]
    fn futures_fill_cash_flow_moves_margin_and_settles_vs_mark() {
        let info = CommissionInfo::futures(0.0, 10.0, 10.0);
        // Open 10 long: margin out.
        assert_eq!(info.fill_cash_flow(10.0, 0.0, 50.0, 50.0), -100.0);
        // Close them at 52 after settling at 51: margin back plus the last leg.
        let flow = info.fill_cash_flow(0.0, -10.0, 52.0, 51.0);
        assert_eq!(flow, 100.0 + 10.0 * (52.0 - 51.0) * 10.0);
    }

    #[test]
    fn futures_mark_blends_on_opens_only() {
        let info = CommissionInfo::futures(0.0, 10.0, 10.0);
        // 10 settled at 50, 10 more filled at 52.
        assert_eq!(info.settled_mark(10.0, 50.0, 10.0, 52.0), 51.0);
        // Pure close keeps the basis of what is left.
        assert_eq!(info.settled_mark(5.0, 50.0, 0.0, 55.0), 50.0);
        // Stocks never blend.
        let stock = CommissionInfo::stocks(0.0);
        assert_eq!(stock.settled_mark(10.0, 50.0, 10.0, 52.0), 50.0);
    }
}
