//! Technical indicators over a close-price series.
//!
//! Computation is pure: the same closes and config always yield the same
//! [`TechnicalIndicators`]. An indicator whose history requirement is not met is
//! `None`, never zero.

use ta::indicators::{MovingAverageConvergenceDivergence, SimpleMovingAverage};
use ta::Next;

use crate::{Macd, MovingAverage, PriceHistory, TechnicalIndicators, ValidationError};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    /// Price points needed before RSI is reported.
    pub rsi_window: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub sma_windows: Vec<usize>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_window: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            sma_windows: vec![50, 200],
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("indicators.rsi_window", self.rsi_window),
            ("indicators.macd_fast", self.macd_fast),
            ("indicators.macd_slow", self.macd_slow),
            ("indicators.macd_signal", self.macd_signal),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroConfigValue { field });
            }
        }
        if self.sma_windows.iter().any(|window| *window == 0) {
            return Err(ValidationError::ZeroConfigValue {
                field: "indicators.sma_windows",
            });
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ValidationError::InvalidConfigValue {
                field: "indicators.macd_fast",
                value: format!("{} (must be below slow {})", self.macd_fast, self.macd_slow),
            });
        }
        let in_range = |value: f64| (0.0..=100.0).contains(&value);
        if !in_range(self.rsi_oversold) || !in_range(self.rsi_overbought) {
            return Err(ValidationError::InvalidConfigValue {
                field: "indicators.rsi_thresholds",
                value: format!("{}/{}", self.rsi_oversold, self.rsi_overbought),
            });
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ValidationError::InvertedRsiThresholds {
                oversold: self.rsi_oversold,
                overbought: self.rsi_overbought,
            });
        }
        Ok(())
    }

    /// Points needed for a MACD value and its signal line.
    pub fn macd_min_points(&self) -> usize {
        self.macd_slow + self.macd_signal - 1
    }
}

pub fn compute_indicators(
    history: &PriceHistory,
    config: &IndicatorConfig,
) -> Result<TechnicalIndicators, ValidationError> {
    compute_from_closes(&history.closes(), config)
}

/// Indicators over `closes`, oldest first.
pub fn compute_from_closes(
    closes: &[f64],
    config: &IndicatorConfig,
) -> Result<TechnicalIndicators, ValidationError> {
    config.validate()?;
    if closes.iter().any(|close| !close.is_finite()) {
        return Err(ValidationError::NonFiniteValue { field: "close" });
    }

    let rsi = rsi(closes, config.rsi_window);
    let (macd, macd_crossover) = macd(closes, config)?;
    let last_close = closes.last().copied();

    let moving_averages = config
        .sma_windows
        .iter()
        .map(|window| {
            let value = sma(closes, *window)?;
            Ok(MovingAverage {
                window: *window,
                value,
                price_above: value.zip(last_close).map(|(average, close)| close > average),
            })
        })
        .collect::<Result<Vec<_>, ValidationError>>()?;

    Ok(TechnicalIndicators {
        history_len: closes.len(),
        rsi,
        macd,
        moving_averages,
        overbought: rsi.map(|value| value > config.rsi_overbought),
        oversold: rsi.map(|value| value < config.rsi_oversold),
        macd_crossover,
    })
}

/// Simple-average RSI over the last `window` close-to-close changes.
///
/// The first close has no predecessor and counts as a zero change, so RSI is
/// defined from exactly `window` closes. A window without any movement has no RSI.
fn rsi(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }

    let changes = std::iter::once(0.0).chain(closes.windows(2).map(|pair| pair[1] - pair[0]));
    let (gains, losses) = changes
        .skip(closes.len() - window)
        .fold((0.0, 0.0), |(gains, losses), change: f64| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let samples = window as f64;
    let average_gain = gains / samples;
    let average_loss = losses / samples;
    if average_loss == 0.0 {
        return (average_gain > 0.0).then_some(100.0);
    }

    let value = 100.0 - 100.0 / (1.0 + average_gain / average_loss);
    Some(value.clamp(0.0, 100.0))
}

fn macd(closes: &[f64], config: &IndicatorConfig) -> Result<(Option<Macd>, Option<bool>), ValidationError> {
    let needed = config.macd_min_points();
    if closes.len() < needed {
        return Ok((None, None));
    }

    let mut indicator =
        MovingAverageConvergenceDivergence::new(config.macd_fast, config.macd_slow, config.macd_signal)
            .map_err(|error| invalid("indicators.macd", error))?;

    let mut previous_histogram = None;
    let mut latest = None;
    for (index, close) in closes.iter().enumerate() {
        let output = indicator.next(*close);
        if index + 1 == closes.len() {
            latest = Some(output);
        } else if index + 2 == closes.len() {
            previous_histogram = Some(output.histogram);
        }
    }

    let Some(latest) = latest else {
        return Ok((None, None));
    };

    // The prior delta only counts once it is itself backed by a full signal window.
    let crossover = (closes.len() > needed)
        .then_some(previous_histogram)
        .flatten()
        .map(|previous| crossed(previous, latest.histogram));

    Ok((
        Some(Macd {
            value: latest.macd,
            signal: latest.signal,
            histogram: latest.histogram,
        }),
        crossover,
    ))
}

fn crossed(previous: f64, current: f64) -> bool {
    (previous <= 0.0 && current > 0.0) || (previous >= 0.0 && current < 0.0)
}

fn sma(closes: &[f64], window: usize) -> Result<Option<f64>, ValidationError> {
    if closes.len() < window {
        return Ok(None);
    }

    let mut indicator =
        SimpleMovingAverage::new(window).map_err(|error| invalid("indicators.sma_windows", error))?;
    Ok(closes.iter().fold(None, |_, close| Some(indicator.next(*close))))
}

fn invalid(field: &'static str, error: impl std::fmt::Debug) -> ValidationError {
    ValidationError::InvalidConfigValue {
        field,
        value: format!("{error:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(len: usize) -> Vec<f64> {
        (0..len).map(|index| 100.0 + index as f64).collect()
    }

    #[test]
    fn short_history_yields_no_rsi() {
        let indicators = compute_from_closes(&rising(13), &IndicatorConfig::default()).expect("compute");
        assert!(indicators.rsi.is_none());
        assert!(indicators.overbought.is_none());
        assert!(indicators.macd.is_none());
    }

    #[test]
    fn exact_window_yields_bounded_rsi() {
        let indicators = compute_from_closes(&rising(14), &IndicatorConfig::default()).expect("compute");
        let rsi = indicators.rsi.expect("rsi defined at exactly the window");
        assert!((0.0..=100.0).contains(&rsi));
        assert_eq!(rsi, 100.0);
    }

    fn close_enough(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|value| (value - expected).abs() < 0.01)
    }

    #[test]
    fn rsi_averages_gains_and_losses_over_window() {
        // Ten rises of one, then four falls of one: 10/14 against 4/14.
        let mut closes = rising(11);
        closes.extend([109.0, 108.0, 107.0, 106.0]);

        let indicators = compute_from_closes(&closes, &IndicatorConfig::default()).expect("compute");
        assert!(close_enough(indicators.rsi, 71.43), "rsi = {:?}", indicators.rsi);
        assert_eq!(indicators.overbought, Some(true));
        assert_eq!(indicators.oversold, Some(false));
    }

    #[test]
    fn rsi_at_exact_window_counts_first_change_as_zero() {
        // 13 changes plus the leading zero: gains 10/14, losses 3/14.
        let mut closes = rising(11);
        closes.extend([109.0, 108.0, 107.0]);

        let indicators = compute_from_closes(&closes, &IndicatorConfig::default()).expect("compute");
        assert!(close_enough(indicators.rsi, 76.92), "rsi = {:?}", indicators.rsi);
    }

    #[test]
    fn rsi_ignores_changes_before_window() {
        // An early crash followed by 14 equal rises and falls.
        let mut closes = vec![500.0, 100.0];
        for step in 0..14 {
            let last = closes[closes.len() - 1];
            closes.push(if step % 2 == 0 { last + 2.0 } else { last - 2.0 });
        }

        let indicators = compute_from_closes(&closes, &IndicatorConfig::default()).expect("compute");
        assert!(close_enough(indicators.rsi, 50.0), "rsi = {:?}", indicators.rsi);
    }

    #[test]
    fn flat_series_has_no_rsi() {
        let indicators = compute_from_closes(&[50.0; 30], &IndicatorConfig::default()).expect("compute");
        assert!(indicators.rsi.is_none());
        assert!(indicators.overbought.is_none());
    }

    #[test]
    fn steady_rally_is_overbought() {
        let indicators = compute_from_closes(&rising(60), &IndicatorConfig::default()).expect("compute");
        assert_eq!(indicators.overbought, Some(true));
        assert_eq!(indicators.oversold, Some(false));
    }

    #[test]
    fn macd_requires_slow_plus_signal_points() {
        let config = IndicatorConfig::default();
        let short = compute_from_closes(&rising(config.macd_min_points() - 1), &config).expect("compute");
        assert!(short.macd.is_none());

        let exact = compute_from_closes(&rising(config.macd_min_points()), &config).expect("compute");
        assert!(exact.macd.is_some());
        assert!(exact.macd_crossover.is_none());

        let longer = compute_from_closes(&rising(config.macd_min_points() + 1), &config).expect("compute");
        assert!(longer.macd_crossover.is_some());
    }

    #[test]
    fn sma_windows_respect_history_length() {
        let indicators = compute_from_closes(&rising(60), &IndicatorConfig::default()).expect("compute");

        let sma_50 = indicators.sma(50).expect("configured");
        assert!(sma_50.value.is_some());
        assert_eq!(sma_50.price_above, Some(true));

        let sma_200 = indicators.sma(200).expect("configured");
        assert!(sma_200.value.is_none());
        assert!(sma_200.price_above.is_none());
    }

    #[test]
    fn sma_matches_arithmetic_mean() {
        let config = IndicatorConfig {
            sma_windows: vec![3],
            ..IndicatorConfig::default()
        };
        let indicators = compute_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0], &config).expect("compute");
        let value = indicators.sma(3).and_then(|sma| sma.value).expect("sma");
        assert!((value - 4.0).abs() < 1e-9);
    }

    #[test]
    fn crossover_detects_both_directions() {
        assert!(crossed(-0.5, 0.2));
        assert!(crossed(0.5, -0.2));
        assert!(!crossed(0.5, 0.2));
        assert!(!crossed(-0.5, -0.2));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let config = IndicatorConfig {
            rsi_overbought: 30.0,
            rsi_oversold: 70.0,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            compute_from_closes(&rising(20), &config),
            Err(ValidationError::InvertedRsiThresholds { .. })
        ));
    }
}
