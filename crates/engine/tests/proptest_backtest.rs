use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use common::{Bar, InstrumentMeta};
use engine::{BacktestConfig, BacktestSimulator, DecisionPipeline, NoopObserver};
use risk::{RiskConfig, RiskSizer};
use strategy::{Aggregator, StrategyScorer};

fn walk(moves: &[(f64, f64, f64)]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut price = 1.1;
    moves
        .iter()
        .enumerate()
        .map(|(i, &(step, up, down))| {
            let open = price;
            price = (price + step).max(0.5);
            Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open,
                high: open.max(price) + up,
                low: open.min(price) - down,
                close: price,
                volume: 1.0,
            }
        })
        .collect()
}

fn simulator() -> BacktestSimulator {
    let pipeline = DecisionPipeline::new(
        StrategyScorer::default(),
        Aggregator::default(),
        RiskSizer::without_fx(RiskConfig::default()),
        InstrumentMeta::default(),
        "USD",
        60.0,
    );
    BacktestSimulator::new(pipeline, BacktestConfig::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Replaying the same series twice yields identical results.
    #[test]
    fn backtest_is_deterministic(
        mv in prop::collection::vec((-0.003f64..0.003, 0.0f64..0.002, 0.0f64..0.002), 210..330)
    ) {
        let bars = walk(&mv);
        let sim = simulator();
        let first = sim.run(&bars, &NoopObserver).unwrap();
        let second = sim.run(&bars, &NoopObserver).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first.trade_count, first.trades.len());
        prop_assert_eq!(first.equity_curve.len(), first.trades.len() + 1);
        prop_assert!((0.0..=1.0).contains(&first.win_rate));
        if let Some(pf) = first.profit_factor {
            prop_assert!(pf >= 0.0);
        }
        let grouped: usize = first.by_trigger.values().map(|s| s.trades).sum();
        prop_assert_eq!(grouped, first.trade_count);
        prop_assert!(first.max_drawdown_percent >= 0.0);
        for t in &first.trades {
            prop_assert!(t.open_index < t.close_index);
        }
    }
}
