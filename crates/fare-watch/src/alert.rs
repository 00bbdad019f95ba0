// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Alert decision: threshold gate plus best-price-ever-alerted hysteresis.

use crate::error::{MonitorError, MonitorResult};
use crate::normalize::PriceObservation;
use serde::{Deserialize, Serialize};

/// Monitor state held for the lifetime of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    /// Lowest price an alert has been delivered for. Never increases once set.
    pub best_price_ever_alerted: Option<u64>,
    /// Lowest price seen in the most recent successful evaluation.
    pub last_observed_lowest: Option<u64>,
}

/// Result of evaluating one batch of observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub fire: bool,
    /// Every valid observation below the threshold, in input order. Empty unless `fire`.
    pub payload: Vec<PriceObservation>,
    pub current_lowest: u64,
    pub new_state: MonitorState,
}

/// Decide whether a batch warrants an alert. Pure: no I/O, no mutation.
pub fn evaluate(
    observations: &[PriceObservation],
    threshold: u64,
    state: &MonitorState,
) -> MonitorResult<Evaluation> {
    let valid: Vec<&PriceObservation> = observations
        .iter()
        .filter(|obs| obs.amount.is_some())
        .collect();

    let current_lowest = valid
        .iter()
        .filter_map(|obs| obs.amount)
        .min()
        .ok_or(MonitorError::NoValidPrices)?;

    let fire = current_lowest < threshold
        && state
            .best_price_ever_alerted
            .map_or(true, |best| current_lowest < best);

    let (payload, best_price_ever_alerted) = if fire {
        let payload = valid
            .into_iter()
            .filter(|obs| obs.amount.is_some_and(|amount| amount < threshold))
            .cloned()
            .collect();
        (payload, Some(current_lowest))
    } else {
        (Vec::new(), state.best_price_ever_alerted)
    };

    Ok(Evaluation {
        fire,
        payload,
        current_lowest,
        new_state: MonitorState {
            best_price_ever_alerted,
            last_observed_lowest: Some(current_lowest),
        },
    })
}

/// Owns the [`MonitorState`] and applies evaluations to it.
pub struct AlertEvaluator {
    threshold: u64,
    state: MonitorState,
}

impl AlertEvaluator {
    pub fn new(threshold: u64) -> Self {
        Self {
            threshold,
            state: MonitorState::default(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Evaluate against the held state without changing it.
    pub fn evaluate(&self, observations: &[PriceObservation]) -> MonitorResult<Evaluation> {
        let evaluation = evaluate(observations, self.threshold, &self.state)?;

        if let Some(best) = self.state.best_price_ever_alerted {
            tracing::info!(best_price_ever_alerted = best, "lowest alerted price so far");
        }
        if evaluation.fire {
            tracing::info!(
                current_lowest = evaluation.current_lowest,
                threshold = self.threshold,
                matches = evaluation.payload.len(),
                "price dropped below threshold"
            );
        } else if evaluation.current_lowest < self.threshold {
            tracing::info!(
                current_lowest = evaluation.current_lowest,
                best_price_ever_alerted = ?self.state.best_price_ever_alerted,
                "price is below threshold but not lower than the best alerted price"
            );
        } else {
            tracing::info!(
                current_lowest = evaluation.current_lowest,
                threshold = self.threshold,
                "price is above the threshold"
            );
        }

        Ok(evaluation)
    }

    /// Adopt the state computed by a completed evaluation.
    pub fn commit(&mut self, evaluation: &Evaluation) {
        debug_assert!(
            match (
                self.state.best_price_ever_alerted,
                evaluation.new_state.best_price_ever_alerted
            ) {
                (Some(old), Some(new)) => new <= old,
                (Some(_), None) => false,
                _ => true,
            },
            "best alerted price must never increase"
        );
        self.state = evaluation.new_state;
    }

    /// Record the lowest observed price of an evaluation whose alert was not delivered.
    ///
    /// The best-alerted price stays put so the same price fires again next cycle.
    pub fn record_undelivered(&mut self, evaluation: &Evaluation) {
        self.state.last_observed_lowest = Some(evaluation.current_lowest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SearchKey;
    use chrono::NaiveDate;

    fn key(day: u32) -> SearchKey {
        SearchKey::new(
            "GOT-BJS",
            NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
        )
    }

    fn obs(day: u32, amount: Option<u64>) -> PriceObservation {
        PriceObservation {
            key: key(day),
            amount,
        }
    }

    #[test]
    fn test_first_drop_fires() {
        let state = MonitorState::default();
        let eval = evaluate(&[obs(21, Some(7500)), obs(22, Some(9000))], 8000, &state).unwrap();
        assert!(eval.fire);
        assert_eq!(eval.payload, vec![obs(21, Some(7500))]);
        assert_eq!(eval.new_state.best_price_ever_alerted, Some(7500));
        assert_eq!(eval.new_state.last_observed_lowest, Some(7500));
    }

    #[test]
    fn test_no_improvement_does_not_fire() {
        let state = MonitorState {
            best_price_ever_alerted: Some(7500),
            last_observed_lowest: Some(7500),
        };
        let eval = evaluate(&[obs(21, Some(7600))], 8000, &state).unwrap();
        assert!(!eval.fire);
        assert!(eval.payload.is_empty());
        assert_eq!(eval.new_state.best_price_ever_alerted, Some(7500));
        assert_eq!(eval.new_state.last_observed_lowest, Some(7600));
    }

    #[test]
    fn test_improvement_fires_again() {
        let state = MonitorState {
            best_price_ever_alerted: Some(7500),
            last_observed_lowest: None,
        };
        let eval = evaluate(&[obs(21, Some(7200))], 8000, &state).unwrap();
        assert!(eval.fire);
        assert_eq!(eval.new_state.best_price_ever_alerted, Some(7200));
    }

    #[test]
    fn test_no_valid_prices_is_an_error() {
        let state = MonitorState {
            best_price_ever_alerted: Some(7000),
            last_observed_lowest: Some(7100),
        };
        let err = evaluate(&[obs(21, None), obs(22, None)], 8000, &state).unwrap_err();
        assert!(matches!(err, MonitorError::NoValidPrices));
        assert!(matches!(
            evaluate(&[], 8000, &state),
            Err(MonitorError::NoValidPrices)
        ));

        let evaluator = AlertEvaluator::new(8000);
        assert!(evaluator.evaluate(&[obs(21, None)]).is_err());
        assert_eq!(*evaluator.state(), MonitorState::default());
    }

    #[test]
    fn test_threshold_gate_is_strict() {
        let eval = evaluate(&[obs(21, Some(8000))], 8000, &MonitorState::default()).unwrap();
        assert!(!eval.fire);
        assert_eq!(eval.new_state.best_price_ever_alerted, None);
    }

    #[test]
    fn test_payload_includes_every_match_below_threshold() {
        let eval = evaluate(
            &[
                obs(21, Some(7900)),
                obs(22, None),
                obs(23, Some(7100)),
                obs(24, Some(8000)),
            ],
            8000,
            &MonitorState::default(),
        )
        .unwrap();
        assert!(eval.fire);
        assert_eq!(eval.payload, vec![obs(21, Some(7900)), obs(23, Some(7100))]);
        assert_eq!(eval.current_lowest, 7100);
    }

    #[test]
    fn test_best_price_is_monotonic_over_history() {
        let mut evaluator = AlertEvaluator::new(8000);
        let history = [7800, 9000, 7900, 7400, 7400, 8100, 6900, 7000];
        let mut previous: Option<u64> = None;

        for price in history {
            let eval = evaluator.evaluate(&[obs(21, Some(price))]).unwrap();
            let before = evaluator.state().best_price_ever_alerted;
            evaluator.commit(&eval);
            let after = evaluator.state().best_price_ever_alerted;

            if !eval.fire {
                assert_eq!(before, after, "best price changed without an alert");
            }
            if let (Some(p), Some(a)) = (previous, after) {
                assert!(a <= p);
            }
            previous = after;
        }

        assert_eq!(evaluator.state().best_price_ever_alerted, Some(6900));
        assert_eq!(evaluator.state().last_observed_lowest, Some(7000));
    }

    #[test]
    fn test_record_undelivered_keeps_best() {
        let mut evaluator = AlertEvaluator::new(8000);
        let eval = evaluator.evaluate(&[obs(21, Some(7500))]).unwrap();
        assert!(eval.fire);
        evaluator.record_undelivered(&eval);
        assert_eq!(evaluator.state().best_price_ever_alerted, None);
        assert_eq!(evaluator.state().last_observed_lowest, Some(7500));

        // The same price is still worth an alert on the retry.
        assert!(evaluator.evaluate(&[obs(21, Some(7500))]).unwrap().fire);
    }
}
