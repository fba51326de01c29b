/// Mean of the last `period` values.
pub fn sma(data: &[f64], period: usize) -> Option<f64> {
    if period == 0 || data.len() < period {
        return None;
    }
    let window = &data[data.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Sample (n − 1) standard deviation of the last `period` values.
pub fn std_dev(data: &[f64], period: usize) -> Option<f64> {
    if period < 2 {
        return None;
    }
    let mean = sma(data, period)?;
    let window = &data[data.len() - period..];
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
    Some(var.sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands: `period`-bar moving average ± `width` standard deviations.
#[derive(Debug, Clone, Copy)]
pub struct Bollinger {
    pub period: usize,
    pub width: f64,
}

impl Default for Bollinger {
    fn default() -> Self {
        Self { period: 20, width: 2.0 }
    }
}

impl Bollinger {
    pub fn compute(&self, closes: &[f64]) -> Option<Bands> {
        let middle = sma(closes, self.period)?;
        let sd = std_dev(closes, self.period)?;
        Some(Bands {
            upper: middle + sd * self.width,
            middle,
            lower: middle - sd * self.width,
        })
    }
}
