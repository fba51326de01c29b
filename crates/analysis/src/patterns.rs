use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Bar;

use crate::structure::{find_swings, swings_of, StructureOutput, SwingKind, SwingPoint};
use crate::AnalysisConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneKind {
    Bullish,
    Bearish,
}

/// Three-bar price gap (fair value gap).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceZone {
    /// Index of the third bar, the one that completes the gap.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: ZoneKind,
    pub top: f64,
    pub bottom: f64,
    pub mitigated: bool,
}

/// Last opposite-colour candle before a validated displacement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlockZone {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: ZoneKind,
    pub top: f64,
    pub bottom: f64,
    pub mitigated: bool,
}

/// Clusters of near-equal swing highs and lows, one price per cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LiquidityZones {
    pub equal_highs: Vec<f64>,
    pub equal_lows: Vec<f64>,
}

/// Latest bar wicked through the last swing and closed back inside it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityGrab {
    /// Bullish when lows were swept, bearish when highs were.
    pub kind: ZoneKind,
    pub timestamp: DateTime<Utc>,
    /// The swing level that was swept.
    pub swept: f64,
    /// The opposite swing, where the resting liquidity sits.
    pub target: f64,
}

/// Swing order used when looking for swept levels.
const GRAB_SWING_ORDER: usize = 3;
const GRAB_MIN_BARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternOutput {
    /// Unmitigated order blocks only.
    pub order_blocks: Vec<OrderBlockZone>,
    /// Unmitigated imbalances only.
    pub imbalances: Vec<ImbalanceZone>,
    /// Raw levels; liquidity is a target, mitigation does not apply.
    pub liquidity: LiquidityZones,
    pub liquidity_grab: Option<LiquidityGrab>,
}

/// Finds imbalances, liquidity pools and validated order blocks.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    liquidity_tolerance: f64,
    lookahead: usize,
}

impl PatternDetector {
    pub fn new(liquidity_tolerance: f64, lookahead: usize) -> Self {
        Self {
            liquidity_tolerance: liquidity_tolerance.max(0.0),
            lookahead: lookahead.max(1),
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.liquidity_tolerance, cfg.order_block_lookahead)
    }

    pub fn detect(&self, ltf: &[Bar], structure: &StructureOutput) -> PatternOutput {
        let all_imbalances = scan_imbalances(ltf);
        let order_blocks: Vec<OrderBlockZone> =
            scan_order_blocks(ltf, &structure.ltf_swings, &all_imbalances, self.lookahead)
                .into_iter()
                .filter(|ob| !ob.mitigated)
                .collect();
        let imbalances: Vec<ImbalanceZone> =
            all_imbalances.into_iter().filter(|z| !z.mitigated).collect();
        let liquidity = liquidity_zones(&structure.ltf_swings, self.liquidity_tolerance);
        let liquidity_grab = liquidity_grab(ltf);

        debug!(
            order_blocks = order_blocks.len(),
            imbalances = imbalances.len(),
            equal_highs = liquidity.equal_highs.len(),
            equal_lows = liquidity.equal_lows.len(),
            grab = ?liquidity_grab.map(|g| g.kind),
            "Patterns detected"
        );

        PatternOutput {
            order_blocks,
            imbalances,
            liquidity,
            liquidity_grab,
        }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// All three-bar gaps in `bars`, mitigated or not.
///
/// A gap is mitigated by the first later bar whose range re-enters
/// `[bottom, top]`.
pub fn scan_imbalances(bars: &[Bar]) -> Vec<ImbalanceZone> {
    if bars.len() < 3 {
        return Vec::new();
    }

    let mut zones = Vec::new();
    for (i, w) in bars.windows(3).enumerate() {
        let (first, third) = (&w[0], &w[2]);
        let (kind, bottom, top) = if first.high < third.low {
            (ZoneKind::Bullish, first.high, third.low)
        } else if first.low > third.high {
            (ZoneKind::Bearish, third.high, first.low)
        } else {
            continue;
        };

        let index = i + 2;
        zones.push(ImbalanceZone {
            index,
            timestamp: third.timestamp,
            kind,
            top,
            bottom,
            mitigated: touched_after(bars, index, bottom, top),
        });
    }
    zones
}

/// Collapse adjacent same-kind swings within `tolerance` of each other.
pub fn liquidity_zones(swings: &[SwingPoint], tolerance: f64) -> LiquidityZones {
    let highs: Vec<f64> = swings_of(swings, SwingKind::High).map(|s| s.price).collect();
    let lows: Vec<f64> = swings_of(swings, SwingKind::Low).map(|s| s.price).collect();

    LiquidityZones {
        equal_highs: equal_levels(&highs, tolerance, f64::min),
        equal_lows: equal_levels(&lows, tolerance, f64::max),
    }
}

fn equal_levels(prices: &[f64], tolerance: f64, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut levels: Vec<f64> = Vec::new();
    for pair in prices.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a == 0.0 {
            continue;
        }
        if ((a - b) / a).abs() <= tolerance {
            let level = pick(a, b);
            if !levels.contains(&level) {
                levels.push(level);
            }
        }
    }
    levels
}

/// Order blocks passing the colour, imbalance and structure-break gates,
/// each flagged with whether price has since returned into it.
pub fn scan_order_blocks(
    bars: &[Bar],
    swings: &[SwingPoint],
    imbalances: &[ImbalanceZone],
    lookahead: usize,
) -> Vec<OrderBlockZone> {
    if bars.len() < 3 {
        return Vec::new();
    }

    let mut blocks = Vec::new();
    for i in 0..bars.len() - 1 {
        let (candle, next) = (&bars[i], &bars[i + 1]);
        let kind = if candle.is_bearish() && next.is_bullish() {
            ZoneKind::Bullish
        } else if candle.is_bullish() && next.is_bearish() {
            ZoneKind::Bearish
        } else {
            continue;
        };

        let window_end = (i + 1 + lookahead).min(bars.len() - 1);

        // Displacement must leave an open imbalance in its own direction.
        let Some(gap) = imbalances.iter().find(|z| {
            z.kind == kind && !z.mitigated && z.index >= i + 2 && z.index <= window_end
        }) else {
            continue;
        };

        // ...and break the latest swing formed before the candle.
        let leg = &bars[i + 1..=window_end];
        let broke_structure = match kind {
            ZoneKind::Bullish => swings_of(swings, SwingKind::High)
                .filter(|s| s.index < i)
                .last()
                .is_some_and(|s| leg.iter().any(|b| b.high > s.price)),
            ZoneKind::Bearish => swings_of(swings, SwingKind::Low)
                .filter(|s| s.index < i)
                .last()
                .is_some_and(|s| leg.iter().any(|b| b.low < s.price)),
        };
        if !broke_structure {
            continue;
        }

        blocks.push(OrderBlockZone {
            index: i,
            timestamp: candle.timestamp,
            kind,
            top: candle.high,
            bottom: candle.low,
            mitigated: touched_after(bars, gap.index, candle.low, candle.high),
        });
    }
    blocks
}

/// Stop hunt on the latest bar: its wick crosses the last swing low (or high)
/// of the preceding bars but it closes back on the near side. Needs an
/// opposite swing to target. Swept lows are checked first.
pub fn liquidity_grab(bars: &[Bar]) -> Option<LiquidityGrab> {
    if bars.len() < GRAB_MIN_BARS {
        return None;
    }
    let (last, prior) = bars.split_last()?;
    let swings = find_swings(prior, GRAB_SWING_ORDER);
    let last_low = swings_of(&swings, SwingKind::Low).last().map(|s| s.price);
    let last_high = swings_of(&swings, SwingKind::High).last().map(|s| s.price);

    let grab = |kind, swept, target| LiquidityGrab { kind, timestamp: last.timestamp, swept, target };
    if let (Some(low), Some(high)) = (last_low, last_high) {
        if last.low < low && last.close > low {
            return Some(grab(ZoneKind::Bullish, low, high));
        }
        if last.high > high && last.close < high {
            return Some(grab(ZoneKind::Bearish, high, low));
        }
    }
    None
}

fn touched_after(bars: &[Bar], index: usize, bottom: f64, top: f64) -> bool {
    bars.iter().skip(index + 1).any(|b| b.touches(bottom, top))
}
