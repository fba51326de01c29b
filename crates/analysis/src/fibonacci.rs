use serde::{Deserialize, Serialize};

const OTE_SHALLOW: f64 = 0.62;
const OTE_DEEP: f64 = 0.786;

/// Premium/discount split and optimal-trade-entry band of one swing leg.
///
/// Retracement levels are measured back from `end` toward `start`, so the
/// same arithmetic serves up-legs and down-legs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibonacciZones {
    pub start: f64,
    pub end: f64,
    /// 50% retracement. Below it is discount, above it premium.
    pub equilibrium: f64,
    pub ote_lower: f64,
    pub ote_upper: f64,
}

impl FibonacciZones {
    /// `None` when either price is zero or the leg is flat.
    pub fn from_swing(start: f64, end: f64) -> Option<Self> {
        if start == 0.0 || end == 0.0 || start == end {
            return None;
        }
        let shallow = retrace(start, end, OTE_SHALLOW);
        let deep = retrace(start, end, OTE_DEEP);
        Some(Self {
            start,
            end,
            equilibrium: retrace(start, end, 0.5),
            ote_lower: shallow.min(deep),
            ote_upper: shallow.max(deep),
        })
    }

    pub fn is_bullish(&self) -> bool {
        self.end > self.start
    }

    pub fn in_discount(&self, price: f64) -> bool {
        price <= self.equilibrium
    }

    pub fn in_premium(&self, price: f64) -> bool {
        price >= self.equilibrium
    }

    /// True when `[bottom, top]` lies entirely inside the OTE band.
    pub fn ote_contains(&self, bottom: f64, top: f64) -> bool {
        bottom >= self.ote_lower && top <= self.ote_upper
    }
}

fn retrace(start: f64, end: f64, ratio: f64) -> f64 {
    end - (end - start) * ratio
}
