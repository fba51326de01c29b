use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Bar;

use crate::AnalysisConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwingKind {
    High,
    Low,
}

/// A local extremum: the strict high (or low) of `order` bars on each side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    /// Position of the bar in the analysed series.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: SwingKind,
}

/// Higher-timeframe directional context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketBias {
    Bullish,
    Bearish,
    #[default]
    Ranging,
}

impl std::fmt::Display for MarketBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketBias::Bullish => write!(f, "bullish"),
            MarketBias::Bearish => write!(f, "bearish"),
            MarketBias::Ranging => write!(f, "ranging"),
        }
    }
}

/// A close beyond a swing level: continuation (BOS) or reversal (CHoCH).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureEvent {
    BosBullish,
    BosBearish,
    ChochBullish,
    ChochBearish,
}

/// A structure event located in time, with the level that was broken.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub event: StructureEvent,
    pub level: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructureOutput {
    /// Bias from the higher timeframe.
    pub bias: MarketBias,
    /// Break made by the latest lower-timeframe close, filtered by `bias`.
    pub ltf_event: Option<StructureEvent>,
    /// Every BOS/CHoCH found walking the lower-timeframe swings in order.
    pub ltf_history: Vec<StructureBreak>,
    pub htf_swings: Vec<SwingPoint>,
    pub ltf_swings: Vec<SwingPoint>,
}

/// Classifies swings and trend bias across a higher and a lower timeframe.
#[derive(Debug, Clone)]
pub struct StructureAnalyzer {
    htf_order: usize,
    ltf_order: usize,
}

impl StructureAnalyzer {
    pub fn new(htf_order: usize, ltf_order: usize) -> Self {
        Self {
            htf_order: htf_order.max(1),
            ltf_order: ltf_order.max(1),
        }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(cfg.htf_order, cfg.ltf_order)
    }

    pub fn ltf_order(&self) -> usize {
        self.ltf_order
    }

    /// Derive bias on `htf` and the latest structure break on `ltf`.
    pub fn analyze(&self, htf: &[Bar], ltf: &[Bar]) -> StructureOutput {
        let htf_swings = find_swings(htf, self.htf_order);
        let ltf_swings = find_swings(ltf, self.ltf_order);
        let bias = market_bias(&htf_swings);

        let enough_data =
            htf.len() >= min_bars(self.htf_order) && ltf.len() >= min_bars(self.ltf_order);
        let ltf_event = match ltf.last() {
            Some(last) if enough_data => structure_event(last.close, &ltf_swings, bias),
            _ => None,
        };
        let ltf_history = structure_history(&ltf_swings);

        debug!(
            bias = %bias,
            htf_swings = htf_swings.len(),
            ltf_swings = ltf_swings.len(),
            event = ?ltf_event,
            "Structure analysed"
        );

        StructureOutput {
            bias,
            ltf_event,
            ltf_history,
            htf_swings,
            ltf_swings,
        }
    }
}

impl Default for StructureAnalyzer {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

fn min_bars(order: usize) -> usize {
    2 * order + 1
}

/// Find swing highs and lows, ordered by bar index.
///
/// Bar `i` is a swing high when its high is strictly greater than the highs
/// of the `order` bars before and after it (lows analogously). Bars closer
/// than `order` to either edge never qualify.
pub fn find_swings(bars: &[Bar], order: usize) -> Vec<SwingPoint> {
    let order = order.max(1);
    if bars.len() < min_bars(order) {
        return Vec::new();
    }

    let mut swings = Vec::new();
    for i in order..bars.len() - order {
        let neighbours = bars[i - order..i].iter().chain(&bars[i + 1..=i + order]);
        let (mut is_high, mut is_low) = (true, true);
        for other in neighbours {
            is_high &= bars[i].high > other.high;
            is_low &= bars[i].low < other.low;
        }
        if is_high {
            swings.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].high,
                kind: SwingKind::High,
            });
        }
        if is_low {
            swings.push(SwingPoint {
                index: i,
                timestamp: bars[i].timestamp,
                price: bars[i].low,
                kind: SwingKind::Low,
            });
        }
    }
    swings
}

pub fn swings_of(swings: &[SwingPoint], kind: SwingKind) -> impl Iterator<Item = &SwingPoint> {
    swings.iter().filter(move |s| s.kind == kind)
}

/// Higher highs and higher lows are bullish, lower highs and lower lows
/// bearish; anything else (or fewer than two of either) is ranging.
pub fn market_bias(swings: &[SwingPoint]) -> MarketBias {
    let highs: Vec<f64> = swings_of(swings, SwingKind::High).map(|s| s.price).collect();
    let lows: Vec<f64> = swings_of(swings, SwingKind::Low).map(|s| s.price).collect();
    if highs.len() < 2 || lows.len() < 2 {
        return MarketBias::Ranging;
    }

    let (prev_high, last_high) = (highs[highs.len() - 2], highs[highs.len() - 1]);
    let (prev_low, last_low) = (lows[lows.len() - 2], lows[lows.len() - 1]);

    if last_high > prev_high && last_low > prev_low {
        MarketBias::Bullish
    } else if last_high < prev_high && last_low < prev_low {
        MarketBias::Bearish
    } else {
        MarketBias::Ranging
    }
}

/// Classify `close` against the most recent swing high and low.
pub fn structure_event(
    close: f64,
    swings: &[SwingPoint],
    bias: MarketBias,
) -> Option<StructureEvent> {
    let last_high = swings_of(swings, SwingKind::High).last().map(|s| s.price);
    let last_low = swings_of(swings, SwingKind::Low).last().map(|s| s.price);
    let above = last_high.is_some_and(|h| close > h);
    let below = last_low.is_some_and(|l| close < l);

    match bias {
        MarketBias::Bullish if above => Some(StructureEvent::BosBullish),
        MarketBias::Bullish if below => Some(StructureEvent::ChochBearish),
        MarketBias::Bearish if below => Some(StructureEvent::BosBearish),
        MarketBias::Bearish if above => Some(StructureEvent::ChochBullish),
        MarketBias::Ranging if above => Some(StructureEvent::ChochBullish),
        MarketBias::Ranging if below => Some(StructureEvent::ChochBearish),
        _ => None,
    }
}

/// Walk swings chronologically and record every break of a protected level.
///
/// The first higher high after a higher low (or lower low after a lower high)
/// establishes the trend. In a trend, exceeding the protected swing in the
/// trend direction is a BOS, exceeding the opposite one a CHoCH that flips
/// the trend.
pub fn structure_history(swings: &[SwingPoint]) -> Vec<StructureBreak> {
    let mut events = Vec::new();
    let mut trend = MarketBias::Ranging;
    let mut last_high: Option<&SwingPoint> = None;
    let mut last_low: Option<&SwingPoint> = None;
    let mut key_high: Option<&SwingPoint> = None;
    let mut key_low: Option<&SwingPoint> = None;

    for swing in swings {
        match swing.kind {
            SwingKind::High => {
                last_high = Some(swing);
                let Some(key) = key_high else {
                    key_high = Some(swing);
                    continue;
                };
                if swing.price <= key.price {
                    continue;
                }
                match trend {
                    MarketBias::Bullish => {
                        events.push(break_at(StructureEvent::BosBullish, key, swing));
                        key_high = Some(swing);
                        if let (Some(low), Some(protected)) = (last_low, key_low) {
                            if low.index > protected.index {
                                key_low = Some(low);
                            }
                        }
                    }
                    MarketBias::Bearish => {
                        events.push(break_at(StructureEvent::ChochBullish, key, swing));
                        trend = MarketBias::Bullish;
                        key_high = Some(swing);
                        if last_low.is_some() {
                            key_low = last_low;
                        }
                    }
                    MarketBias::Ranging => {
                        if key_low.is_some() {
                            trend = MarketBias::Bullish;
                            key_high = Some(swing);
                        }
                    }
                }
            }
            SwingKind::Low => {
                last_low = Some(swing);
                let Some(key) = key_low else {
                    key_low = Some(swing);
                    continue;
                };
                if swing.price >= key.price {
                    continue;
                }
                match trend {
                    MarketBias::Bearish => {
                        events.push(break_at(StructureEvent::BosBearish, key, swing));
                        key_low = Some(swing);
                        if let (Some(high), Some(protected)) = (last_high, key_high) {
                            if high.index > protected.index {
                                key_high = Some(high);
                            }
                        }
                    }
                    MarketBias::Bullish => {
                        events.push(break_at(StructureEvent::ChochBearish, key, swing));
                        trend = MarketBias::Bearish;
                        key_low = Some(swing);
                        if last_high.is_some() {
                            key_high = last_high;
                        }
                    }
                    MarketBias::Ranging => {
                        if key_high.is_some() {
                            trend = MarketBias::Bearish;
                            key_low = Some(swing);
                        }
                    }
                }
            }
        }
    }
    events
}

fn break_at(event: StructureEvent, level: &SwingPoint, at: &SwingPoint) -> StructureBreak {
    StructureBreak {
        event,
        level: level.price,
        timestamp: at.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(points: &[(f64, f64)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open: (high + low) / 2.0,
                high,
                low,
                close: (high + low) / 2.0,
                volume: 1.0,
            })
            .collect()
    }

    fn from_highs(highs: &[f64]) -> Vec<Bar> {
        let pts: Vec<(f64, f64)> = highs.iter().map(|&h| (h, h - 1.0)).collect();
        series(&pts)
    }

    /// Drifting wave: rising peaks and troughs every 20 bars.
    fn stair_uptrend(n: usize) -> Vec<Bar> {
        let pts: Vec<(f64, f64)> = (0..n)
            .map(|i| {
                let mid = 100.0
                    + 0.2 * i as f64
                    + 5.0 * (2.0 * std::f64::consts::PI * i as f64 / 20.0).sin();
                (mid + 0.5, mid - 0.5)
            })
            .collect();
        series(&pts)
    }

    #[test]
    fn single_peak_is_swing_high() {
        let bars = from_highs(&[1.0, 2.0, 5.0, 2.0, 1.0]);
        let swings = find_swings(&bars, 2);
        let highs: Vec<_> = swings_of(&swings, SwingKind::High).collect();
        assert_eq!(highs.len(), 1);
        assert_eq!(highs[0].index, 2);
        assert_eq!(highs[0].price, 5.0);
    }

    #[test]
    fn ties_do_not_qualify() {
        let bars = from_highs(&[1.0, 5.0, 5.0, 1.0, 0.5]);
        let swings = find_swings(&bars, 1);
        assert_eq!(swings_of(&swings, SwingKind::High).count(), 0);
    }

    #[test]
    fn too_few_bars_yield_no_swings() {
        let bars = from_highs(&[1.0, 3.0, 1.0, 0.0]);
        assert!(find_swings(&bars, 2).is_empty());
    }

    #[test]
    fn bias_needs_two_of_each() {
        let bars = from_highs(&[1.0, 2.0, 5.0, 2.0, 1.0]);
        assert_eq!(market_bias(&find_swings(&bars, 2)), MarketBias::Ranging);
    }

    #[test]
    fn stair_uptrend_is_bullish_without_bearish_bos() {
        let bars = stair_uptrend(300);
        let out = StructureAnalyzer::default().analyze(&bars, &bars);
        assert_eq!(out.bias, MarketBias::Bullish);
        assert!(out
            .ltf_history
            .iter()
            .all(|b| b.event != StructureEvent::BosBearish));
        assert_ne!(out.ltf_event, Some(StructureEvent::BosBearish));
    }

    #[test]
    fn stair_uptrend_records_bullish_bos() {
        let bars = stair_uptrend(300);
        let swings = find_swings(&bars, 3);
        let history = structure_history(&swings);
        assert!(history.iter().any(|b| b.event == StructureEvent::BosBullish));
    }

    #[test]
    fn strictly_monotonic_series_has_no_swings() {
        let pts: Vec<(f64, f64)> = (0..300).map(|i| (101.0 + i as f64, 99.0 + i as f64)).collect();
        let bars = series(&pts);
        let out = StructureAnalyzer::default().analyze(&bars, &bars);
        assert!(out.htf_swings.is_empty());
        assert_eq!(out.bias, MarketBias::Ranging);
        assert!(out.ltf_history.is_empty());
        assert_eq!(out.ltf_event, None);
    }

    #[test]
    fn event_follows_bias() {
        let swings = vec![
            SwingPoint { index: 3, timestamp: Utc::now(), price: 110.0, kind: SwingKind::High },
            SwingPoint { index: 6, timestamp: Utc::now(), price: 100.0, kind: SwingKind::Low },
        ];
        assert_eq!(structure_event(111.0, &swings, MarketBias::Bullish), Some(StructureEvent::BosBullish));
        assert_eq!(structure_event(99.0, &swings, MarketBias::Bullish), Some(StructureEvent::ChochBearish));
        assert_eq!(structure_event(99.0, &swings, MarketBias::Bearish), Some(StructureEvent::BosBearish));
        assert_eq!(structure_event(111.0, &swings, MarketBias::Bearish), Some(StructureEvent::ChochBullish));
        assert_eq!(structure_event(111.0, &swings, MarketBias::Ranging), Some(StructureEvent::ChochBullish));
        assert_eq!(structure_event(105.0, &swings, MarketBias::Bullish), None);
    }

    #[test]
    fn short_htf_series_suppresses_event() {
        let ltf = stair_uptrend(100);
        let htf = stair_uptrend(5);
        let out = StructureAnalyzer::default().analyze(&htf, &ltf);
        assert!(out.htf_swings.is_empty());
        assert_eq!(out.bias, MarketBias::Ranging);
        assert_eq!(out.ltf_event, None);
        assert!(!out.ltf_swings.is_empty());
    }

    #[test]
    fn bearish_reversal_emits_choch() {
        // Up-leg (HL, HH), then a low that undercuts the protected low.
        let highs = [
            5.0, 6.0, 10.0, 6.0, 4.0, 2.0, 4.0, 7.0, 12.0, 7.0, 5.0, 3.0, 1.0, 3.0, 5.0, 4.0,
        ];
        let bars = from_highs(&highs);
        let swings = find_swings(&bars, 2);
        let history = structure_history(&swings);
        assert!(history.iter().any(|b| b.event == StructureEvent::ChochBearish));
    }

    #[test]
    fn event_serializes_screaming_snake() {
        let json = serde_json::to_string(&StructureEvent::ChochBullish).unwrap();
        assert_eq!(json, "\"CHOCH_BULLISH\"");
    }
}
