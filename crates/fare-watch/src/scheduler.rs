// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The polling loop.
//!
//! Each cycle launches one renderer, fetches every key in order, normalizes the
//! raw text, evaluates the batch against the held [`MonitorState`] and, when an
//! alert fires, delivers it. A successful cycle waits `check_interval`; a failed
//! one waits `retry_interval`. A stop request is observed before every key and
//! before NOTIFYING; the cycle then ends with [`MonitorError::Cancelled`] without
//! alerting or touching the held state.

use crate::alert::{AlertEvaluator, Evaluation, MonitorState};
use crate::config::MonitorConfig;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{MonitorError, MonitorResult};
use crate::extract::PriceExtractor;
use crate::history::{CycleHistory, CycleRecord};
use crate::keys::{SearchKey, SearchKeySet};
use crate::normalize::{normalize_all, PriceObservation, RawObservation};
use crate::notify::{compose, Notifier};
use crate::renderer::{RenderContext, Renderer, RendererLauncher};
use crate::retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Where the monitor is in its cycle. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Normalizing,
    Evaluating,
    Notifying,
    IdleWait,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Fetching => "fetching",
            Phase::Normalizing => "normalizing",
            Phase::Evaluating => "evaluating",
            Phase::Notifying => "notifying",
            Phase::IdleWait => "idle_wait",
        })
    }
}

/// Result of a successful cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub observations: Vec<PriceObservation>,
    pub lowest: u64,
    pub fired: bool,
    pub state: MonitorState,
}

impl CycleReport {
    pub fn valid_prices(&self) -> usize {
        self.observations
            .iter()
            .filter(|o| o.amount.is_some())
            .count()
    }
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failures: u64,
    pub alerts: u64,
}

pub struct Monitor {
    config: MonitorConfig,
    keys: SearchKeySet,
    launcher: Box<dyn RendererLauncher>,
    notifier: Box<dyn Notifier>,
    extractor: PriceExtractor,
    evaluator: AlertEvaluator,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    diagnostics: Option<Box<dyn DiagnosticsSink>>,
    history: Option<CycleHistory>,
    cancel: watch::Receiver<bool>,
    cycle: u64,
    phase: Phase,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        keys: SearchKeySet,
        launcher: Box<dyn RendererLauncher>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let extractor = PriceExtractor::new(
            config.selector_chain(),
            config.currency_marker.clone(),
            config.selector_wait,
        );
        let evaluator = AlertEvaluator::new(config.threshold);
        let retry = RetryPolicy::new(config.max_fetch_attempts, config.fetch_retry_delay);

        Self {
            config,
            keys,
            launcher,
            notifier,
            extractor,
            evaluator,
            retry,
            sleeper: Arc::new(TokioSleeper),
            diagnostics: None,
            history: None,
            cancel: watch::channel(false).1,
            cycle: 0,
            phase: Phase::IdleWait,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn with_history(mut self, history: CycleHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn state(&self) -> &MonitorState {
        self.evaluator.state()
    }

    /// Run cycles until `shutdown` turns `true` or its sender is dropped. The same
    /// signal cuts a running cycle short at its next key.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunSummary {
        let mut summary = RunSummary::default();
        self.cancel = shutdown.clone();
        tracing::info!(
            destination = %self.config.destination,
            keys = self.keys.len(),
            threshold = self.config.threshold,
            "flight price monitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            let outcome = AssertUnwindSafe(self.run_cycle())
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    Err(MonitorError::Unexpected(panic_message(payload.as_ref())))
                });
            summary.cycles += 1;
            self.record(&outcome, started.elapsed());

            if matches!(outcome, Err(MonitorError::Cancelled)) {
                tracing::info!(cycle = self.cycle, "check cancelled");
                break;
            }

            let wait = match &outcome {
                Ok(report) => {
                    if report.fired {
                        summary.alerts += 1;
                    }
                    self.config.check_interval
                }
                Err(e) => {
                    summary.failures += 1;
                    tracing::error!(
                        cycle = self.cycle,
                        stage = e.stage(),
                        error = %e,
                        "cycle failed"
                    );
                    self.config.retry_interval
                }
            };

            self.enter(Phase::IdleWait);
            tracing::info!(seconds = wait.as_secs(), "waiting before next check");
            let stop = tokio::select! {
                _ = self.sleeper.sleep(wait) => false,
                // A dropped sender can never signal again; stop rather than spin.
                changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
            };
            if stop {
                break;
            }
        }

        tracing::info!(
            cycles = summary.cycles,
            failures = summary.failures,
            alerts = summary.alerts,
            "monitoring stopped"
        );
        summary
    }

    /// One full FETCHING → NORMALIZING → EVALUATING → NOTIFYING pass.
    pub async fn run_cycle(&mut self) -> MonitorResult<CycleReport> {
        self.cycle += 1;
        tracing::info!(cycle = self.cycle, "starting flight price check");

        self.enter(Phase::Fetching);
        let raw = self.fetch_all().await?;

        self.enter(Phase::Normalizing);
        let observations = normalize_all(&raw, &self.config.currency_marker);

        self.enter(Phase::Evaluating);
        let evaluation = self.evaluator.evaluate(&observations)?;

        if evaluation.fire {
            self.ensure_running()?;
            self.enter(Phase::Notifying);
            if let Err(e) = self.notify(&evaluation).await {
                self.evaluator.record_undelivered(&evaluation);
                return Err(e);
            }
        }
        self.evaluator.commit(&evaluation);

        Ok(CycleReport {
            cycle: self.cycle,
            observations,
            lowest: evaluation.current_lowest,
            fired: evaluation.fire,
            state: *self.evaluator.state(),
        })
    }

    fn ensure_running(&self) -> MonitorResult<()> {
        if *self.cancel.borrow() {
            return Err(MonitorError::Cancelled);
        }
        Ok(())
    }

    /// Sleep that returns early when a stop is requested.
    async fn pause(&self, duration: Duration) {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            _ = self.sleeper.sleep(duration) => {}
            Ok(()) = cancel.changed() => {}
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(cycle = self.cycle, from = %self.phase, to = %phase, "phase");
        self.phase = phase;
    }

    async fn notify(&self, evaluation: &Evaluation) -> MonitorResult<()> {
        let message = compose(
            &self.config.alert_recipient(),
            &self.config.destination,
            &self.config.currency_marker,
            &evaluation.payload,
        );
        self.notifier.send(&message).await
    }

    /// Launch a renderer, fetch every key, and shut the renderer down whatever happened.
    async fn fetch_all(&self) -> MonitorResult<Vec<RawObservation>> {
        let renderer = self
            .launcher
            .launch()
            .await
            .map_err(|e| MonitorError::RendererUnavailable(e.to_string()))?;

        let result = self.fetch_with(renderer.as_ref()).await;

        if let Err(e) = renderer.shutdown().await {
            tracing::warn!(error = %e, "renderer shutdown failed");
        }
        result
    }

    async fn fetch_with(&self, renderer: &dyn Renderer) -> MonitorResult<Vec<RawObservation>> {
        let mut page = renderer
            .new_context()
            .await
            .map_err(|e| MonitorError::RendererUnavailable(e.to_string()))?;

        let result = self.fetch_keys(page.as_mut()).await;

        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        result
    }

    async fn fetch_keys(
        &self,
        page: &mut dyn RenderContext,
    ) -> MonitorResult<Vec<RawObservation>> {
        let mut raw = Vec::with_capacity(self.keys.len());
        for (index, (key, url)) in self.keys.iter().enumerate() {
            if index > 0 && !self.config.request_delay.is_zero() {
                self.pause(self.config.request_delay).await;
            }
            if *self.cancel.borrow() {
                tracing::info!(
                    fetched = index,
                    remaining = self.keys.len() - index,
                    "stop requested, skipping remaining keys"
                );
                return Err(MonitorError::Cancelled);
            }
            let raw_text = self.fetch_one(page, key, url).await;
            raw.push(RawObservation {
                key: key.clone(),
                raw_text,
            });
        }
        Ok(raw)
    }

    /// Navigate with retries, dismiss consent, extract. `None` on any per-key failure.
    async fn fetch_one(
        &self,
        page: &mut dyn RenderContext,
        key: &SearchKey,
        url: &str,
    ) -> Option<String> {
        let mut attempt = 1;
        loop {
            tracing::info!(key = %key, attempt, "loading result page");
            match page.navigate(url, self.config.page_load_timeout).await {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(key = %key, attempt, error = %e, "page load failed");
                    match self.retry.after_failure(attempt) {
                        RetryDecision::Retry { attempt: next, after } => {
                            self.pause(after).await;
                            if *self.cancel.borrow() {
                                return None;
                            }
                            attempt = next;
                        }
                        RetryDecision::GiveUp { attempts } => {
                            let err = MonitorError::FetchTimeout {
                                key: key.to_string(),
                                attempts,
                            };
                            tracing::error!(key = %key, stage = err.stage(), error = %err, "giving up on key");
                            return None;
                        }
                    }
                }
            }
        }

        if let Some(button) = &self.config.consent_button {
            match page.dismiss_consent(button, self.config.consent_wait).await {
                Ok(true) => tracing::info!(key = %key, "cookie consent accepted"),
                Ok(false) => tracing::debug!(key = %key, "no cookie consent dialog"),
                Err(e) => tracing::debug!(key = %key, error = %e, "cookie consent not handled"),
            }
        }

        if let Some(text) = self.extractor.extract(&*page).await {
            return Some(text);
        }

        let err = MonitorError::Extraction {
            key: key.to_string(),
        };
        tracing::warn!(key = %key, stage = err.stage(), error = %err, "price element not found");
        if let Some(sink) = &self.diagnostics {
            match page.get_html().await {
                Ok(html) => {
                    if let Err(e) = sink.save(key, &html).await {
                        tracing::warn!(key = %key, error = %e, "failed to save page source");
                    }
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "page source unavailable"),
            }
        }
        None
    }

    fn record(&mut self, outcome: &MonitorResult<CycleReport>, elapsed: Duration) {
        let Some(history) = self.history.as_mut() else {
            return;
        };

        let mut rec = match outcome {
            Ok(report) => {
                let mut rec = CycleRecord::now(self.cycle, "success");
                rec.observations = report.observations.len();
                rec.valid_prices = report.valid_prices();
                rec.lowest = Some(report.lowest);
                rec.fired = report.fired;
                rec
            }
            Err(MonitorError::Cancelled) => CycleRecord::now(self.cycle, "cancelled"),
            Err(e) => {
                let mut rec = CycleRecord::now(self.cycle, "failure");
                rec.error = Some(e.to_string());
                rec
            }
        };
        rec.duration_ms = elapsed.as_millis() as u64;

        if let Err(e) = history.append(&rec) {
            tracing::warn!(error = %e, "failed to append cycle history");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::Fetching.to_string(), "fetching");
        assert_eq!(Phase::IdleWait.to_string(), "idle_wait");
    }

    #[test]
    fn test_panic_message_variants() {
        let p: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(p.as_ref()), "boom");
        let p: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(p.as_ref()), "bang");
        let p: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(p.as_ref()), "panic");
    }
}
