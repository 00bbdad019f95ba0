// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP-only renderer: fetches markup with reqwest and evaluates locators statically.
//!
//! Useful for result pages that are server-rendered. No scripts run, so consent
//! dialogs never appear and XPath locators are rejected.

use super::{html, Locator, RenderContext, RenderError, Renderer, RendererLauncher};
use async_trait::async_trait;
use std::time::Duration;

/// Launches [`HttpRenderer`]s sharing one user agent.
pub struct HttpLauncher {
    user_agent: String,
}

impl HttpLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl RendererLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| RenderError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Box::new(HttpRenderer { client }))
    }
}

pub struct HttpRenderer {
    client: reqwest::Client,
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        Ok(Box::new(StaticPage {
            client: Some(self.client.clone()),
            html: None,
        }))
    }

    async fn shutdown(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// A context holding the markup of the last loaded page.
pub struct StaticPage {
    client: Option<reqwest::Client>,
    html: Option<String>,
}

impl StaticPage {
    /// A page preloaded with fixed markup. Navigation is a no-op.
    pub fn from_html(html: impl Into<String>) -> Self {
        Self {
            client: None,
            html: Some(html.into()),
        }
    }
}

#[async_trait]
impl RenderContext for StaticPage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let Some(client) = &self.client else {
            return Ok(());
        };

        let response = client.get(url).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body = response.text().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.html = Some(body);
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
        wait: Duration,
    ) -> Result<String, RenderError> {
        let page = self.html.as_deref().ok_or(RenderError::NoPage)?;
        html::find_first_match(page, locator)?.ok_or_else(|| RenderError::NotFound {
            locator: locator.to_string(),
            waited_ms: wait.as_millis() as u64,
        })
    }

    async fn get_html(&self) -> Result<String, RenderError> {
        self.html.clone().ok_or(RenderError::NoPage)
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_page_lookup() {
        let page = StaticPage::from_html("<html><body><span class=p>9 990 kr</span></body></html>");
        let text = page
            .find_first_match(&Locator::Css("span.p".into()), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "9 990 kr");

        let err = page
            .find_first_match(&Locator::Css("span.q".into()), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_http_renderer_navigates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flights/GOT-BJS"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><div class=price>6 540 kr</div></body></html>"),
            )
            .mount(&server)
            .await;

        let renderer = HttpLauncher::new("fare-watch-test").launch().await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        ctx.navigate(
            &format!("{}/flights/GOT-BJS", server.uri()),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let text = ctx
            .find_first_match(&Locator::TextContains("kr".into()), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(text, "6 540 kr");
        assert!(ctx.get_html().await.unwrap().contains("price"));

        ctx.close().await.unwrap();
        renderer.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_http_renderer_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let renderer = HttpLauncher::new("fare-watch-test").launch().await.unwrap();
        let mut ctx = renderer.new_context().await.unwrap();
        let err = ctx
            .navigate(&server.uri(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Navigation { .. }));
    }
}
