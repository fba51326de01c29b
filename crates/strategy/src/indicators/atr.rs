use common::Bar;

/// Average true range with Wilder smoothing (`alpha = 1 / period`), seeded
/// with the first bar's high − low. `None` below `period` bars.
pub fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let alpha = 1.0 / period as f64;
    let mut prev_close: Option<f64> = None;
    let mut value: Option<f64> = None;

    for bar in bars {
        let tr = match prev_close {
            None => bar.high - bar.low,
            Some(pc) => (bar.high - bar.low)
                .max((bar.high - pc).abs())
                .max((bar.low - pc).abs()),
        };
        value = Some(match value {
            None => tr,
            Some(v) => alpha * tr + (1.0 - alpha) * v,
        });
        prev_close = Some(bar.close);
    }
    value
}
