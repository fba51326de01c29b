use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Bar, Direction};

use crate::fibonacci::FibonacciZones;
use crate::patterns::{PatternDetector, PatternOutput, ZoneKind};
use crate::structure::{swings_of, MarketBias, StructureAnalyzer, SwingKind};
use crate::AnalysisConfig;

/// Stop and target are pushed this fraction beyond the zone / liquidity level.
const LEVEL_BUFFER: f64 = 0.0005;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoiKind {
    OrderBlock,
    Imbalance,
}

impl std::fmt::Display for PoiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoiKind::OrderBlock => write!(f, "OB"),
            PoiKind::Imbalance => write!(f, "FVG"),
        }
    }
}

/// A retracement entry into a point of interest inside the OTE band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySetup {
    pub direction: Direction,
    pub poi: PoiKind,
    pub zone_top: f64,
    pub zone_bottom: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
struct Poi {
    kind: PoiKind,
    top: f64,
    bottom: f64,
}

/// Combines higher-timeframe bias with lower-timeframe premium/discount and
/// untouched zones to find a retracement entry on the latest bar.
#[derive(Debug, Clone, Default)]
pub struct EntryFinder {
    structure: StructureAnalyzer,
    patterns: PatternDetector,
}

impl EntryFinder {
    pub fn new(structure: StructureAnalyzer, patterns: PatternDetector) -> Self {
        Self { structure, patterns }
    }

    pub fn from_config(cfg: &AnalysisConfig) -> Self {
        Self::new(
            StructureAnalyzer::from_config(cfg),
            PatternDetector::from_config(cfg),
        )
    }

    /// Zones are computed on every bar before the latest one, so a zone counts
    /// as untouched until the latest bar trades into it.
    pub fn find(&self, htf: &[Bar], ltf: &[Bar]) -> Option<EntrySetup> {
        let (current, history) = ltf.split_last()?;
        let structure = self.structure.analyze(htf, history);

        let highs: Vec<_> = swings_of(&structure.ltf_swings, SwingKind::High).collect();
        let lows: Vec<_> = swings_of(&structure.ltf_swings, SwingKind::Low).collect();
        if highs.len() < 2 || lows.len() < 2 {
            debug!("Not enough lower-timeframe swings for an entry");
            return None;
        }

        let patterns = self.patterns.detect(history, &structure);

        let setup = match structure.bias {
            MarketBias::Bullish => {
                let leg_end = *highs.last()?;
                let leg_start = lows.iter().rev().find(|s| s.index < leg_end.index)?;
                let fib = FibonacciZones::from_swing(leg_start.price, leg_end.price)?;
                if !fib.in_discount(current.low) {
                    debug!(low = current.low, eq = fib.equilibrium, "Still in premium");
                    return None;
                }

                let mut pois = pois_in_ote(&patterns, ZoneKind::Bullish, &fib);
                pois.sort_by(|a, b| b.top.total_cmp(&a.top));
                let poi = pois.into_iter().find(|p| current.low <= p.top)?;

                EntrySetup {
                    direction: Direction::Buy,
                    poi: poi.kind,
                    zone_top: poi.top,
                    zone_bottom: poi.bottom,
                    stop_loss: poi.bottom * (1.0 - LEVEL_BUFFER),
                    take_profit: leg_end.price * (1.0 + LEVEL_BUFFER),
                    reason: format!("BUY: HTF bullish + LTF discount/OTE + {}", poi.kind),
                }
            }
            MarketBias::Bearish => {
                let leg_end = *lows.last()?;
                let leg_start = highs.iter().rev().find(|s| s.index < leg_end.index)?;
                let fib = FibonacciZones::from_swing(leg_start.price, leg_end.price)?;
                if !fib.in_premium(current.high) {
                    debug!(high = current.high, eq = fib.equilibrium, "Still in discount");
                    return None;
                }

                let mut pois = pois_in_ote(&patterns, ZoneKind::Bearish, &fib);
                pois.sort_by(|a, b| a.bottom.total_cmp(&b.bottom));
                let poi = pois.into_iter().find(|p| current.high >= p.bottom)?;

                EntrySetup {
                    direction: Direction::Sell,
                    poi: poi.kind,
                    zone_top: poi.top,
                    zone_bottom: poi.bottom,
                    stop_loss: poi.top * (1.0 + LEVEL_BUFFER),
                    take_profit: leg_end.price * (1.0 - LEVEL_BUFFER),
                    reason: format!("SELL: HTF bearish + LTF premium/OTE + {}", poi.kind),
                }
            }
            MarketBias::Ranging => {
                debug!("HTF bias unclear, no entry");
                return None;
            }
        };

        info!(
            direction = %setup.direction,
            poi = %setup.poi,
            stop = setup.stop_loss,
            target = setup.take_profit,
            "Entry setup found"
        );
        Some(setup)
    }
}

fn pois_in_ote(patterns: &PatternOutput, kind: ZoneKind, fib: &FibonacciZones) -> Vec<Poi> {
    let blocks = patterns
        .order_blocks
        .iter()
        .filter(|ob| ob.kind == kind)
        .map(|ob| Poi { kind: PoiKind::OrderBlock, top: ob.top, bottom: ob.bottom });
    let gaps = patterns
        .imbalances
        .iter()
        .filter(|z| z.kind == kind)
        .map(|z| Poi { kind: PoiKind::Imbalance, top: z.top, bottom: z.bottom });

    blocks
        .chain(gaps)
        .filter(|p| fib.ote_contains(p.bottom, p.top))
        .collect()
}
