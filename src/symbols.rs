//! Symbol-specific pip/point conversion and trading-parameter helpers.
//!
//! Re-expresses `original_source/src/bitten_core/symbols.py` as pure
//! functions over a [`SymbolSpec`] table (`config::SymbolTable`) instead
//! of a dict with a `DEFAULT` key: callers pass the already-resolved
//! spec rather than a symbol string, so the fallback chain lives in one
//! place (`config::SymbolTable::get`).

use crate::model::{Direction, SymbolSpec};

/// Default spec used for any symbol absent from the on-disk table,
/// mirroring the Python `DEFAULT` fallback dict.
pub const DEFAULT_SPEC: SymbolSpec = SymbolSpec {
    pip_size: 0.0001,
    points_per_pip: 10.0,
    min_stop_pips: 5.0,
    be_offset_min_pips: 2.0,
    trail_min_pips: 12.0,
    atr_mult_default: 2.0,
    decimals: 5,
};

/// Standard pip sizes by symbol family (symbols.py `get_pip_size`).
pub fn pip_size_for(symbol: &str) -> f64 {
    if symbol == "XAUUSD" {
        0.1
    } else if symbol == "XAGUSD" {
        0.001
    } else if symbol.contains("JPY") {
        0.01
    } else {
        0.0001
    }
}

pub fn pips_to_points(spec: &SymbolSpec, pips: f64) -> i64 {
    (pips * spec.points_per_pip) as i64
}

pub fn points_to_pips(spec: &SymbolSpec, points: i64) -> f64 {
    points as f64 / spec.points_per_pip
}

/// Add pips to a price considering direction, rounded to the symbol's
/// native decimal places.
pub fn price_plus_pips(spec: &SymbolSpec, entry: f64, direction: Direction, pips: f64) -> f64 {
    let pip_value = pips * spec.pip_size;
    let result = match direction {
        Direction::Buy => entry + pip_value,
        Direction::Sell => entry - pip_value,
    };
    normalize_price(spec, result)
}

pub fn spread_pips(spec: &SymbolSpec, bid: f64, ask: f64) -> f64 {
    (ask - bid).abs() / spec.pip_size
}

/// Minimum stop distance in pips; a broker-reported minimum (in points)
/// takes priority over the configured default.
pub fn min_stop_pips(spec: &SymbolSpec, broker_min_points: Option<i64>) -> f64 {
    match broker_min_points {
        Some(points) => points_to_pips(spec, points),
        None => spec.min_stop_pips,
    }
}

/// Safe break-even offset: the largest of the configured minimum, twice
/// the current spread, and the broker's minimum stop distance.
pub fn be_offset_pips(spec: &SymbolSpec, current_spread_pips: f64, broker_min_stop: Option<i64>) -> f64 {
    let spread_offset = current_spread_pips * 2.0;
    let min_stop = min_stop_pips(spec, broker_min_stop);
    spec.be_offset_min_pips.max(spread_offset).max(min_stop)
}

pub fn trail_min_pips(spec: &SymbolSpec) -> f64 {
    spec.trail_min_pips
}

/// Trailing-stop distance; ATR-based when an ATR reading is available,
/// otherwise a fixed 20-pip step, both floored at the symbol's minimum.
pub fn calculate_trail_distance(spec: &SymbolSpec, atr_value: Option<f64>) -> f64 {
    match atr_value {
        Some(atr) if atr > 0.0 => {
            let atr_pips = atr / spec.pip_size;
            let trail_dist = atr_pips * spec.atr_mult_default;
            trail_dist.max(spec.trail_min_pips)
        }
        _ => 20.0_f64.max(spec.trail_min_pips),
    }
}

pub fn normalize_price(spec: &SymbolSpec, price: f64) -> f64 {
    let factor = 10f64.powi(spec.decimals as i32);
    (price * factor).round() / factor
}

pub fn price_to_pips(spec: &SymbolSpec, price1: f64, price2: f64) -> f64 {
    (price1 - price2).abs() / spec.pip_size
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> SymbolSpec {
        DEFAULT_SPEC
    }

    #[test]
    fn price_plus_pips_buy_adds() {
        let spec = eurusd();
        let p = price_plus_pips(&spec, 1.08000, Direction::Buy, 20.0);
        assert!((p - 1.08200).abs() < 1e-9);
    }

    #[test]
    fn price_plus_pips_sell_subtracts() {
        let spec = eurusd();
        let p = price_plus_pips(&spec, 1.08000, Direction::Sell, 20.0);
        assert!((p - 1.07800).abs() < 1e-9);
    }

    #[test]
    fn be_offset_takes_max_of_constraints() {
        let spec = eurusd();
        // spread_offset = 2 * 6 = 12, beats both the 2-pip default and 5-pip min stop
        let offset = be_offset_pips(&spec, 6.0, None);
        assert_eq!(offset, 12.0);
    }

    #[test]
    fn jpy_pip_size_is_two_decimals() {
        assert_eq!(pip_size_for("USDJPY"), 0.01);
        assert_eq!(pip_size_for("XAUUSD"), 0.1);
        assert_eq!(pip_size_for("EURUSD"), 0.0001);
    }
}
