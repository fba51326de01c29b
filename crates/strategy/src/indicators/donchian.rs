use common::Bar;

/// Highest high and lowest low of a window of bars.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channel {
    pub high: f64,
    pub low: f64,
}

impl Channel {
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Channel over the `window` bars preceding the last bar. The last bar is
/// excluded so it can be tested against the channel.
pub fn donchian(bars: &[Bar], window: usize) -> Option<Channel> {
    if window == 0 || bars.len() < window + 1 {
        return None;
    }
    let prior = &bars[bars.len() - 1 - window..bars.len() - 1];
    let high = prior.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = prior.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    Some(Channel { high, low })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn bar(i: i64, high: f64, low: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open: low,
            high,
            low,
            close: high,
            volume: 1.0,
        }
    }

    #[test]
    fn excludes_current_bar() {
        let bars = vec![bar(0, 10.0, 5.0), bar(1, 12.0, 6.0), bar(2, 50.0, 1.0)];
        let ch = donchian(&bars, 2).unwrap();
        assert_eq!(ch, Channel { high: 12.0, low: 5.0 });
        assert_eq!(ch.range(), 7.0);
    }

    #[test]
    fn needs_window_plus_one_bars() {
        let bars = vec![bar(0, 10.0, 5.0), bar(1, 12.0, 6.0)];
        assert!(donchian(&bars, 2).is_none());
    }
}
