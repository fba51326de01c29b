//! The five scoring strategies. Each one is a pure function of the bar
//! window it is handed and returns exactly one signal.

use chrono::{NaiveTime, Timelike};
use tracing::debug;

use common::{Bar, Direction, StrategySignal};

use crate::indicators::{donchian, Bollinger, Macd, RsiIndicator};

pub const TREND: &str = "TREND";
pub const MEAN_REVERSION: &str = "MEAN_REV";
pub const SMC: &str = "SMC";
pub const VOLATILITY_BREAKOUT: &str = "VOL_BRK";
pub const SESSION_BREAKOUT: &str = "LONDON_BRK";

/// All scoring strategy implementations must satisfy this trait.
pub trait ScoringStrategy: Send + Sync {
    /// Map key under which this strategy's signal is reported.
    fn name(&self) -> &str;

    /// Score the window ending at the last bar. Never fails: too little data
    /// yields a neutral signal.
    fn score(&self, bars: &[Bar]) -> StrategySignal;
}

fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

// ─── Trend ────────────────────────────────────────────────────────────────────

/// EMA 12/26 alignment confirmed by MACD vs its signal line.
#[derive(Debug, Clone, Default)]
pub struct TrendStrategy {
    macd: Macd,
}

impl ScoringStrategy for TrendStrategy {
    fn name(&self) -> &str {
        TREND
    }

    fn score(&self, bars: &[Bar]) -> StrategySignal {
        let Some(last) = bars.last() else {
            return StrategySignal::neutral(TREND);
        };
        let Some(snap) = self.macd.compute(&closes(bars)) else {
            return StrategySignal::neutral(TREND);
        };
        if last.close == 0.0 {
            return StrategySignal::neutral(TREND);
        }

        let separation = (snap.fast_ema - snap.slow_ema) / last.close;
        let strength = ((separation.abs() * 200.0).tanh() * 100.0).max(0.0);

        if snap.fast_ema > snap.slow_ema && snap.macd > snap.signal {
            StrategySignal::new(TREND, strength, Direction::Buy)
        } else if snap.fast_ema < snap.slow_ema && snap.macd < snap.signal {
            StrategySignal::new(TREND, strength, Direction::Sell)
        } else {
            StrategySignal::neutral(TREND)
        }
    }
}

// ─── Mean reversion ───────────────────────────────────────────────────────────

/// Close outside a Bollinger band with RSI confirming the extreme.
#[derive(Debug, Clone, Default)]
pub struct MeanReversionStrategy {
    bands: Bollinger,
    rsi: RsiIndicator,
}

impl ScoringStrategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        MEAN_REVERSION
    }

    fn score(&self, bars: &[Bar]) -> StrategySignal {
        let closes = closes(bars);
        let (Some(bands), Some(rsi), Some(&close)) =
            (self.bands.compute(&closes), self.rsi.compute(&closes), closes.last())
        else {
            return StrategySignal::neutral(MEAN_REVERSION);
        };

        let span = 100.0 - self.rsi.overbought;
        if close > bands.upper && self.rsi.is_overbought(rsi) {
            let score = (rsi - self.rsi.overbought) * 100.0 / span;
            StrategySignal::new(MEAN_REVERSION, score, Direction::Sell)
        } else if close < bands.lower && self.rsi.is_oversold(rsi) {
            let score = (self.rsi.oversold - rsi) * 100.0 / self.rsi.oversold;
            StrategySignal::new(MEAN_REVERSION, score, Direction::Buy)
        } else {
            StrategySignal::neutral(MEAN_REVERSION)
        }
    }
}

// ─── Structure break ──────────────────────────────────────────────────────────

const SMC_LOOKBACK: usize = 20;
const SMC_SCORE: f64 = 85.0;

/// Swing low followed by a close above the swing highs that formed after it
/// (and the mirror image for sells), inside a short trailing window.
#[derive(Debug, Clone, Default)]
pub struct SmcBreakStrategy;

impl ScoringStrategy for SmcBreakStrategy {
    fn name(&self) -> &str {
        SMC
    }

    fn score(&self, bars: &[Bar]) -> StrategySignal {
        let Some(last) = bars.last() else {
            return StrategySignal::neutral(SMC);
        };
        let recent = &bars[bars.len().saturating_sub(SMC_LOOKBACK)..];
        let highs: Vec<f64> = recent.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = recent.iter().map(|b| b.low).collect();

        if let Some(level) = break_level(&lows, &highs, Extreme::Low) {
            if last.close > level {
                debug!(level, close = last.close, "Bullish break after swing low");
                return StrategySignal::new(SMC, SMC_SCORE, Direction::Buy);
            }
        }
        if let Some(level) = break_level(&highs, &lows, Extreme::High) {
            if last.close < level {
                debug!(level, close = last.close, "Bearish break after swing high");
                return StrategySignal::new(SMC, SMC_SCORE, Direction::Sell);
            }
        }
        StrategySignal::neutral(SMC)
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    High,
    Low,
}

impl Extreme {
    /// Whether `a` is strictly more extreme than `b`.
    fn beats(self, a: f64, b: f64) -> bool {
        match self {
            Extreme::High => a > b,
            Extreme::Low => a < b,
        }
    }

    fn opposite(self) -> Self {
        match self {
            Extreme::High => Extreme::Low,
            Extreme::Low => Extreme::High,
        }
    }
}

/// Locate the latest two-bar swing of kind `anchor_kind` in `anchor`, then
/// the one-bar swings of the opposite kind in `legs` from that index on, and
/// return the most extreme of them.
fn break_level(anchor: &[f64], legs: &[f64], anchor_kind: Extreme) -> Option<f64> {
    let n = anchor.len();
    if n < 5 {
        return None;
    }
    let pivot = (2..n - 2).rev().find(|&j| {
        [j - 2, j - 1, j + 1, j + 2]
            .iter()
            .all(|&k| anchor_kind.beats(anchor[j], anchor[k]))
    })?;

    let after = &legs[pivot..];
    let leg_kind = anchor_kind.opposite();
    (1..after.len().saturating_sub(1))
        .filter(|&k| leg_kind.beats(after[k], after[k - 1]) && leg_kind.beats(after[k], after[k + 1]))
        .map(|k| after[k])
        .reduce(|a, b| if leg_kind.beats(b, a) { b } else { a })
}

// ─── Volatility breakout ──────────────────────────────────────────────────────

/// Close beyond the Donchian channel of the preceding bars.
#[derive(Debug, Clone)]
pub struct VolatilityBreakoutStrategy {
    window: usize,
}

impl Default for VolatilityBreakoutStrategy {
    fn default() -> Self {
        Self { window: 20 }
    }
}

impl ScoringStrategy for VolatilityBreakoutStrategy {
    fn name(&self) -> &str {
        VOLATILITY_BREAKOUT
    }

    fn score(&self, bars: &[Bar]) -> StrategySignal {
        let (Some(channel), Some(last)) = (donchian(bars, self.window), bars.last()) else {
            return StrategySignal::neutral(VOLATILITY_BREAKOUT);
        };
        let range = channel.range();
        if range <= 0.0 {
            return StrategySignal::neutral(VOLATILITY_BREAKOUT);
        }

        let strength = |excess: f64| (60.0 + excess / range * 80.0).min(100.0);
        if last.close > channel.high {
            StrategySignal::new(VOLATILITY_BREAKOUT, strength(last.close - channel.high), Direction::Buy)
        } else if last.close < channel.low {
            StrategySignal::new(VOLATILITY_BREAKOUT, strength(channel.low - last.close), Direction::Sell)
        } else {
            StrategySignal::neutral(VOLATILITY_BREAKOUT)
        }
    }
}

// ─── Session breakout ─────────────────────────────────────────────────────────

const SESSION_SCORE: f64 = 80.0;

/// Breakout of the overnight (00:00–08:00 UTC) range during the first hours
/// of the London session.
#[derive(Debug, Clone)]
pub struct SessionBreakoutStrategy {
    range_end: NaiveTime,
    active_until: NaiveTime,
}

impl Default for SessionBreakoutStrategy {
    fn default() -> Self {
        Self {
            range_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            active_until: NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ScoringStrategy for SessionBreakoutStrategy {
    fn name(&self) -> &str {
        SESSION_BREAKOUT
    }

    fn score(&self, bars: &[Bar]) -> StrategySignal {
        let Some(last) = bars.last() else {
            return StrategySignal::neutral(SESSION_BREAKOUT);
        };
        let time = last.timestamp.time();
        if time < self.range_end || time > self.active_until {
            return StrategySignal::neutral(SESSION_BREAKOUT);
        }

        let day = last.timestamp.date_naive();
        let range = bars
            .iter()
            .filter(|b| b.timestamp.date_naive() == day && b.timestamp.time() < self.range_end)
            .fold(None, |acc: Option<(f64, f64)>, b| match acc {
                None => Some((b.high, b.low)),
                Some((h, l)) => Some((h.max(b.high), l.min(b.low))),
            });
        let Some((high, low)) = range else {
            debug!(hour = time.hour(), "No overnight bars for session range");
            return StrategySignal::neutral(SESSION_BREAKOUT);
        };

        if last.close > high {
            StrategySignal::new(SESSION_BREAKOUT, SESSION_SCORE, Direction::Buy)
        } else if last.close < low {
            StrategySignal::new(SESSION_BREAKOUT, SESSION_SCORE, Direction::Sell)
        } else {
            StrategySignal::neutral(SESSION_BREAKOUT)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn bar_at(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar { timestamp, open, high, low, close, volume: 1.0 }
    }

    fn from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar_at(start() + Duration::hours(i as i64), c, c + 0.1, c - 0.1, c))
            .collect()
    }

    fn from_lows(lows: &[f64], last_close: f64) -> Vec<Bar> {
        let n = lows.len();
        lows.iter()
            .enumerate()
            .map(|(i, &l)| {
                let close = if i + 1 == n { last_close } else { l + 0.5 };
                bar_at(start() + Duration::hours(i as i64), l + 0.5, l + 1.0, l, close)
            })
            .collect()
    }

    fn mirror(bars: &[Bar]) -> Vec<Bar> {
        bars.iter()
            .map(|b| bar_at(b.timestamp, 200.0 - b.open, 200.0 - b.low, 200.0 - b.high, 200.0 - b.close))
            .collect()
    }

    const V_LOWS: [f64; 20] = [
        105.0, 104.0, 103.0, 102.0, 101.0, 100.0, 101.0, 102.0, 103.0, 104.0, 103.8, 104.5, 105.0,
        105.5, 106.0, 106.5, 107.0, 107.5, 108.0, 108.5,
    ];

    #[test]
    fn trend_buys_steady_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 0.5).collect();
        let sig = TrendStrategy::default().score(&from_closes(&closes));
        assert_eq!(sig.direction, Direction::Buy);
        assert!(sig.score > 90.0, "score {}", sig.score);
    }

    #[test]
    fn trend_sells_steady_downtrend() {
        let closes: Vec<f64> = (0..60).map(|i| 150.0 - i as f64 * 0.5).collect();
        let sig = TrendStrategy::default().score(&from_closes(&closes));
        assert_eq!(sig.direction, Direction::Sell);
        assert!(sig.score > 0.0);
    }

    #[test]
    fn trend_neutral_when_flat() {
        let sig = TrendStrategy::default().score(&from_closes(&[100.0; 60]));
        assert_eq!(sig, StrategySignal::neutral(TREND));
    }

    #[test]
    fn mean_reversion_sells_spike_above_band() {
        let mut closes: Vec<f64> = (0..49).map(|i| if i % 2 == 0 { 100.0 } else { 100.2 }).collect();
        closes.push(105.0);
        let sig = MeanReversionStrategy::default().score(&from_closes(&closes));
        assert_eq!(sig.direction, Direction::Sell);
        // RSI = 100 - 100 / (1 + 6.2 / 1.4)
        assert!((sig.score - 38.596).abs() < 0.01, "score {}", sig.score);
    }

    #[test]
    fn mean_reversion_buys_flush_below_band() {
        let mut closes: Vec<f64> = (0..49).map(|i| if i % 2 == 0 { 100.0 } else { 99.8 }).collect();
        closes.push(95.0);
        let sig = MeanReversionStrategy::default().score(&from_closes(&closes));
        assert_eq!(sig.direction, Direction::Buy);
        assert!((sig.score - 38.596).abs() < 0.01, "score {}", sig.score);
    }

    #[test]
    fn mean_reversion_neutral_inside_bands() {
        let closes: Vec<f64> = (0..50).map(|i| if i % 2 == 0 { 100.0 } else { 100.2 }).collect();
        let sig = MeanReversionStrategy::default().score(&from_closes(&closes));
        assert_eq!(sig.direction, Direction::Neutral);
    }

    #[test]
    fn smc_buys_break_above_swing_high_after_low() {
        // Swing low at 5, swing high 105.0 at 9, final close 109 clears it.
        let sig = SmcBreakStrategy.score(&from_lows(&V_LOWS, 109.0));
        assert_eq!(sig, StrategySignal::new(SMC, 85.0, Direction::Buy));
    }

    #[test]
    fn smc_holds_below_break_level() {
        let sig = SmcBreakStrategy.score(&from_lows(&V_LOWS, 104.9));
        assert_eq!(sig.direction, Direction::Neutral);
    }

    #[test]
    fn smc_sells_mirrored_structure() {
        let bars = mirror(&from_lows(&V_LOWS, 109.0));
        let sig = SmcBreakStrategy.score(&bars);
        assert_eq!(sig, StrategySignal::new(SMC, 85.0, Direction::Sell));
    }

    #[test]
    fn smc_neutral_without_swings() {
        let sig = SmcBreakStrategy.score(&from_closes(&[100.0; 30]));
        assert_eq!(sig.direction, Direction::Neutral);
    }

    fn channel_then(close: f64) -> Vec<Bar> {
        let mut bars: Vec<Bar> = (0..20)
            .map(|i| bar_at(start() + Duration::hours(i), 100.0, 101.0, 99.0, 100.0))
            .collect();
        bars.push(bar_at(start() + Duration::hours(20), 100.0, close.max(100.0), close.min(100.0), close));
        bars
    }

    #[test]
    fn volatility_breakout_scales_with_excess() {
        let up = VolatilityBreakoutStrategy::default().score(&channel_then(101.5));
        assert_eq!(up.direction, Direction::Buy);
        assert!((up.score - 80.0).abs() < 1e-9);

        let down = VolatilityBreakoutStrategy::default().score(&channel_then(98.0));
        assert_eq!(down.direction, Direction::Sell);
        assert!((down.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_breakout_neutral_inside_or_flat() {
        let inside = VolatilityBreakoutStrategy::default().score(&channel_then(100.5));
        assert_eq!(inside.direction, Direction::Neutral);

        let flat: Vec<Bar> = (0..21)
            .map(|i| bar_at(start() + Duration::hours(i), 100.0, 100.0, 100.0, 100.0))
            .collect();
        assert_eq!(VolatilityBreakoutStrategy::default().score(&flat).direction, Direction::Neutral);
    }

    #[test]
    fn volatility_channel_spans_twenty_prior_bars() {
        // Oldest bar of the 20 carries the channel high
        let mut bars = channel_then(102.0);
        bars[0].high = 103.0;
        let sig = VolatilityBreakoutStrategy::default().score(&bars);
        assert_eq!(sig.direction, Direction::Neutral);

        // One bar further back it no longer counts
        let mut bars = channel_then(102.0);
        bars.insert(0, bar_at(start() - Duration::hours(1), 100.0, 103.0, 99.0, 100.0));
        let sig = VolatilityBreakoutStrategy::default().score(&bars);
        assert_eq!(sig.direction, Direction::Buy);
    }

    fn session_day(last_hour: i64, last_close: f64) -> Vec<Bar> {
        let day = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        // Previous evening's spike must not widen today's range.
        let mut bars = vec![bar_at(day - Duration::hours(2), 105.0, 110.0, 90.0, 100.0)];
        bars.extend((0..8).map(|h| bar_at(day + Duration::hours(h), 100.0, 101.0, 99.0, 100.0)));
        bars.push(bar_at(day + Duration::hours(last_hour), 100.0, last_close.max(100.0), last_close.min(100.0), last_close));
        bars
    }

    #[test]
    fn session_breakout_inside_window() {
        let buy = SessionBreakoutStrategy::default().score(&session_day(9, 101.5));
        assert_eq!(buy, StrategySignal::new(SESSION_BREAKOUT, 80.0, Direction::Buy));

        let sell = SessionBreakoutStrategy::default().score(&session_day(10, 98.5));
        assert_eq!(sell, StrategySignal::new(SESSION_BREAKOUT, 80.0, Direction::Sell));
    }

    #[test]
    fn session_breakout_inactive_outside_window() {
        let sig = SessionBreakoutStrategy::default().score(&session_day(11, 101.5));
        assert_eq!(sig.direction, Direction::Neutral);
    }

    #[test]
    fn session_range_is_todays_overnight_only() {
        // Yesterday's 03:00 bar is inside the clock window but a day old
        let day = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut bars = vec![bar_at(day - Duration::hours(21), 100.0, 110.0, 90.0, 100.0)];
        bars.extend(session_day(9, 101.5).into_iter().skip(1));
        let sig = SessionBreakoutStrategy::default().score(&bars);
        assert_eq!(sig, StrategySignal::new(SESSION_BREAKOUT, 80.0, Direction::Buy));
    }

    #[test]
    fn session_breakout_needs_overnight_bars() {
        let day = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        let bars = vec![bar_at(day, 100.0, 102.0, 99.0, 101.0)];
        assert_eq!(SessionBreakoutStrategy::default().score(&bars).direction, Direction::Neutral);
    }

    #[test]
    fn every_strategy_is_neutral_on_empty_input() {
        let all: Vec<Box<dyn ScoringStrategy>> = vec![
            Box::new(TrendStrategy::default()),
            Box::new(MeanReversionStrategy::default()),
            Box::new(SmcBreakStrategy),
            Box::new(VolatilityBreakoutStrategy::default()),
            Box::new(SessionBreakoutStrategy::default()),
        ];
        for s in all {
            assert_eq!(s.score(&[]), StrategySignal::neutral(s.name()));
        }
    }
}
