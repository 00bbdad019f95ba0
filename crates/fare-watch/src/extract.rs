// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Price extraction over a rendered page with an ordered locator fallback chain.
//!
//! Result pages change structure often. The chain goes from the most specific
//! structural path down to "any element whose text carries the currency marker",
//! and the first locator that yields marked text wins.

use crate::renderer::{Locator, RenderContext, RenderError};
use std::future::Future;
use std::time::Duration;

/// Locator chain for kayak.se result lists, most specific first.
pub fn default_chain(marker: &str) -> Vec<Locator> {
    vec![
        Locator::XPath(
            r#"//*[@id="flight-results-list-wrapper"]/div[2]/div[1]/div/div[2]/div/span[1]"#
                .to_string(),
        ),
        Locator::XPath(
            r#"//*[@id="flight-results-list-wrapper"]/div[6]/div[2]/div/div[1]/div[2]/div/div/div/div[2]/div/div[2]/div/div[1]/div[1]/a/div/div/div/div/div"#
                .to_string(),
        ),
        Locator::Css("div.e2GB-price-text".to_string()),
        Locator::Css(".e2GB-price-text".to_string()),
        Locator::TextContains(marker.to_string()),
    ]
}

/// Cookie banner accept button on kayak.se.
pub fn default_consent_button() -> Locator {
    Locator::XPath("/html/body/div[3]/div/div[2]/div/div/div[3]/div/div[1]/button[1]/div".to_string())
}

/// Run `attempt` over `strategies` in order and return the first `Some`, with its index.
///
/// Strategies after the first success are never attempted.
pub async fn first_success<'a, S, T, F, Fut>(
    strategies: &'a [S],
    mut attempt: F,
) -> Option<(usize, T)>
where
    F: FnMut(&'a S) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for (index, strategy) in strategies.iter().enumerate() {
        if let Some(found) = attempt(strategy).await {
            return Some((index, found));
        }
    }
    None
}

/// Pulls raw price text from a rendered page.
#[derive(Debug, Clone)]
pub struct PriceExtractor {
    chain: Vec<Locator>,
    marker: String,
    wait: Duration,
}

impl PriceExtractor {
    /// `wait` bounds each locator individually.
    pub fn new(chain: Vec<Locator>, marker: impl Into<String>, wait: Duration) -> Self {
        Self {
            chain,
            marker: marker.into(),
            wait,
        }
    }

    /// Text of the first locator match containing the currency marker, or `None`.
    ///
    /// On `None` the caller is expected to save a diagnostic snapshot of the page.
    pub async fn extract(&self, page: &dyn RenderContext) -> Option<String> {
        let found = first_success(&self.chain, |locator| async move {
            match page.find_first_match(locator, self.wait).await {
                Ok(text) if text.contains(self.marker.as_str()) => Some(text),
                Ok(text) => {
                    tracing::debug!(%locator, text = %text, "match has no currency marker");
                    None
                }
                Err(RenderError::NotFound { .. }) => {
                    tracing::debug!(%locator, "locator not found");
                    None
                }
                Err(e) => {
                    tracing::debug!(%locator, error = %e, "locator failed");
                    None
                }
            }
        })
        .await;

        found.map(|(index, text)| {
            tracing::info!(locator = %self.chain[index], raw = %text, "raw price fetched");
            text
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers lookups from a fixed table and records every locator asked for.
    struct ScriptedPage {
        answers: Vec<(Locator, String)>,
        asked: Mutex<Vec<Locator>>,
    }

    impl ScriptedPage {
        fn new(answers: Vec<(Locator, &str)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(l, t)| (l, t.to_string()))
                    .collect(),
                asked: Mutex::new(Vec::new()),
            }
        }

        fn asked(&self) -> Vec<Locator> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RenderContext for ScriptedPage {
        async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), RenderError> {
            Ok(())
        }

        async fn dismiss_consent(
            &mut self,
            _button: &Locator,
            _wait: Duration,
        ) -> Result<bool, RenderError> {
            Ok(false)
        }

        async fn find_first_match(
            &self,
            locator: &Locator,
            _wait: Duration,
        ) -> Result<String, RenderError> {
            self.asked.lock().unwrap().push(locator.clone());
            self.answers
                .iter()
                .find(|(l, _)| l == locator)
                .map(|(_, t)| t.clone())
                .ok_or_else(|| RenderError::NotFound {
                    locator: locator.to_string(),
                    waited_ms: 0,
                })
        }

        async fn get_html(&self) -> Result<String, RenderError> {
            Ok(String::new())
        }

        async fn close(self: Box<Self>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn chain() -> Vec<Locator> {
        vec![
            Locator::Css("#first".into()),
            Locator::Css("#second".into()),
            Locator::TextContains("kr".into()),
        ]
    }

    #[tokio::test]
    async fn test_second_strategy_short_circuits() {
        let page = ScriptedPage::new(vec![
            (Locator::Css("#second".into()), "8 120 kr"),
            (Locator::TextContains("kr".into()), "1 kr"),
        ]);
        let extractor = PriceExtractor::new(chain(), "kr", Duration::from_millis(10));

        let text = extractor.extract(&page).await;
        assert_eq!(text.as_deref(), Some("8 120 kr"));
        assert_eq!(
            page.asked(),
            vec![Locator::Css("#first".into()), Locator::Css("#second".into())]
        );
    }

    #[tokio::test]
    async fn test_text_without_marker_falls_through() {
        let page = ScriptedPage::new(vec![
            (Locator::Css("#first".into()), "Loading…"),
            (Locator::TextContains("kr".into()), "Från 6 999 kr"),
        ]);
        let extractor = PriceExtractor::new(chain(), "kr", Duration::from_millis(10));

        assert_eq!(extractor.extract(&page).await.as_deref(), Some("Från 6 999 kr"));
        assert_eq!(page.asked().len(), 3);
    }

    #[tokio::test]
    async fn test_unparseable_winner_is_still_returned() {
        // Marker present but no digits: extraction still stops here.
        let page = ScriptedPage::new(vec![
            (Locator::Css("#first".into()), "kr —"),
            (Locator::Css("#second".into()), "7 000 kr"),
        ]);
        let extractor = PriceExtractor::new(chain(), "kr", Duration::from_millis(10));

        assert_eq!(extractor.extract(&page).await.as_deref(), Some("kr —"));
        assert_eq!(page.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_total_failure_returns_none() {
        let page = ScriptedPage::new(vec![]);
        let extractor = PriceExtractor::new(chain(), "kr", Duration::from_millis(10));

        assert!(extractor.extract(&page).await.is_none());
        assert_eq!(page.asked().len(), 3);
    }

    #[tokio::test]
    async fn test_first_success_index() {
        let items = [1, 2, 3, 4];
        let hit = first_success(&items, |n| async move { (*n > 2).then_some(n * 10) }).await;
        assert_eq!(hit, Some((2, 30)));

        let miss = first_success(&items, |_| async { None::<i32> }).await;
        assert!(miss.is_none());
    }

    #[test]
    fn test_default_chain_ends_with_marker_fallback() {
        let chain = default_chain("kr");
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.last(), Some(&Locator::TextContains("kr".into())));
    }
}
