/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// Computes: MACD line = EMA(fast) − EMA(slow), Signal = EMA(macd_line, signal_period).
/// All averages use the recursive form seeded with the first value, so every
/// input bar contributes to the latest reading.
#[derive(Debug, Clone, Copy)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

/// Latest values of every MACD component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSnapshot {
    pub fast_ema: f64,
    pub slow_ema: f64,
    pub macd: f64,
    pub signal: f64,
}

impl Default for Macd {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        debug_assert!(fast < slow, "MACD fast period must be less than slow period");
        Self { fast, slow, signal }
    }

    /// Compute the latest MACD readings from close prices (oldest first).
    /// Returns `None` on an empty slice.
    pub fn compute(&self, closes: &[f64]) -> Option<MacdSnapshot> {
        let fast = ema_series(closes, self.fast);
        let slow = ema_series(closes, self.slow);
        let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = ema_series(&macd_line, self.signal);

        Some(MacdSnapshot {
            fast_ema: *fast.last()?,
            slow_ema: *slow.last()?,
            macd: *macd_line.last()?,
            signal: *signal_line.last()?,
        })
    }
}

/// Exponential moving average series with `alpha = 2 / (span + 1)`,
/// seeded with the first value.
pub fn ema_series(data: &[f64], span: usize) -> Vec<f64> {
    let k = 2.0 / (span.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(data.len());
    let mut prev: Option<f64> = None;
    for &price in data {
        let value = match prev {
            None => price,
            Some(p) => price * k + p * (1.0 - k),
        };
        out.push(value);
        prev = Some(value);
    }
    out
}
