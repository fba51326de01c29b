/// RSI (Relative Strength Index) indicator.
///
/// Uses a simple average of the last `period` gains and losses rather than
/// Wilder smoothing. Zero average loss reads as 100.
#[derive(Debug, Clone, Copy)]
pub struct RsiIndicator {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for RsiIndicator {
    fn default() -> Self {
        Self::new(14, 70.0, 30.0)
    }
}

impl RsiIndicator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self { period: period.max(1), overbought, oversold }
    }

    /// Compute RSI from a slice of close prices (oldest first).
    /// Returns `None` if there are fewer than `period + 1` values.
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period + 1 {
            return None;
        }

        let recent = &closes[closes.len() - self.period - 1..];
        let (gain, loss) = recent.windows(2).map(|w| w[1] - w[0]).fold(
            (0.0, 0.0),
            |(g, l), change| {
                if change > 0.0 {
                    (g + change, l)
                } else {
                    (g, l - change)
                }
            },
        );

        let avg_gain = gain / self.period as f64;
        let avg_loss = loss / self.period as f64;
        if avg_loss == 0.0 {
            return Some(100.0);
        }

        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }

    pub fn is_overbought(&self, value: f64) -> bool {
        value > self.overbought
    }

    pub fn is_oversold(&self, value: f64) -> bool {
        value < self.oversold
    }
}
