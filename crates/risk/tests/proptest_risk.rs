use proptest::prelude::*;

use common::{InstrumentMeta, SizingFailure};
use risk::{RiskConfig, RiskSizer};

fn instrument() -> impl Strategy<Value = InstrumentMeta> {
    (
        prop_oneof![Just(0.001), Just(0.01), Just(0.1), Just(1.0)],
        prop_oneof![Just(1.0), Just(100.0), Just(100_000.0)],
        0.0f64..1.0,
        1.0f64..500.0,
    )
        .prop_map(|(step, contract_size, min, max)| InstrumentMeta {
            symbol: "PROP".into(),
            tick_size: 0.00001,
            contract_size,
            volume_min: min,
            volume_max: max,
            volume_step: step,
            profit_currency: "USD".into(),
        })
}

proptest! {
    /// A sized volume lies between the instrument limits and on the step grid.
    /// Anything smaller than the minimum is refused.
    #[test]
    fn volume_respects_instrument_limits(
        meta in instrument(),
        equity in 1.0f64..10_000_000.0,
        risk_fraction in 0.001f64..0.1,
        entry in 0.5f64..50_000.0,
        distance in 0.0001f64..100.0,
        long in any::<bool>(),
    ) {
        let sizer = RiskSizer::without_fx(RiskConfig { risk_fraction, ..RiskConfig::default() });
        let stop = if long { entry - distance } else { entry + distance };

        let volume = match sizer.calculate_volume(equity, entry, stop, &meta, "USD") {
            Ok(volume) => volume,
            Err(SizingFailure::BelowMinimumVolume { volume, min }) => {
                prop_assert!(volume < min || volume == 0.0);
                return Ok(());
            }
            Err(other) => return Err(TestCaseError::fail(format!("unexpected {other}"))),
        };
        prop_assert!(volume > 0.0);
        prop_assert!(volume + 1e-9 >= meta.volume_min);
        prop_assert!(volume <= meta.volume_max + 1e-9);
        let steps = volume / meta.volume_step;
        prop_assert!((steps - steps.round()).abs() < 1e-6, "{} is off the {} grid", volume, meta.volume_step);
    }

    /// Sizing never panics, whatever the inputs.
    #[test]
    fn sizing_never_panics(
        equity in -1e6f64..1e9,
        entry in -10.0f64..1e5,
        stop in -10.0f64..1e5,
    ) {
        let sizer = RiskSizer::without_fx(RiskConfig::default());
        let _ = sizer.calculate_volume(equity, entry, stop, &InstrumentMeta::default(), "USD");
    }
}
