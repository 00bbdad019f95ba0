// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Chromium-based renderer using chromiumoxide.

use super::{Locator, RenderContext, RenderError, Renderer, RendererLauncher};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Desktop user agents; one is picked at random per launch.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const HIDE_WEBDRIVER_JS: &str =
    "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})";

/// Delay between element lookups while waiting for a locator to match.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pause after clicking a consent button so the overlay can close.
const CONSENT_SETTLE: Duration = Duration::from_secs(2);

/// Pick a user agent at random.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Executable names looked up on `PATH`, in order.
const CHROMIUM_NAMES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Resolve the Chromium executable.
///
/// A configured path is authoritative: it is returned if it exists and never
/// replaced by a discovered one. Without it, `PATH` is searched first and then
/// the platform's standard install locations.
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return path.is_file().then(|| path.to_path_buf());
    }

    CHROMIUM_NAMES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| install_locations().into_iter().find(|p| p.is_file()))
}

fn install_locations() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if cfg!(target_os = "macos") {
        let app = "Applications/Google Chrome.app/Contents/MacOS/Google Chrome";
        paths.push(Path::new("/").join(app));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(app));
        }
    } else if cfg!(windows) {
        if let Some(local) = dirs::data_local_dir() {
            paths.push(local.join("Google/Chrome/Application/chrome.exe"));
        }
        paths.push(PathBuf::from(
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        ));
    } else {
        paths.push(PathBuf::from("/snap/bin/chromium"));
    }
    paths
}

/// Launches a fresh headless Chromium for every cycle.
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
}

impl ChromiumLauncher {
    /// Use an explicit executable, or search `PATH` at launch time.
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl RendererLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>, RenderError> {
        let chrome_path = find_chromium(self.executable.as_deref()).ok_or_else(|| {
            RenderError::Unavailable(match &self.executable {
                Some(path) => format!("configured Chromium {} does not exist", path.display()),
                None => "Chromium not found. Set FARE_WATCH_CHROMIUM_PATH or install Chrome."
                    .to_string(),
            })
        })?;

        let user_agent = random_user_agent();
        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(1920, 1080)
            .arg("--headless=new")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={user_agent}"))
            .build()
            .map_err(|e| RenderError::Unavailable(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        tracing::info!(user_agent, "Chromium started");
        Ok(Box::new(ChromiumRenderer {
            browser,
            handler_task,
        }))
    }
}

/// A running headless Chromium.
pub struct ChromiumRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>, RenderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to create new page: {e}")))?;

        if let Err(e) = page
            .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                HIDE_WEBDRIVER_JS,
            ))
            .await
        {
            tracing::debug!("could not install webdriver shim: {e}");
        }

        Ok(Box::new(ChromiumContext { page }))
    }

    async fn shutdown(self: Box<Self>) -> Result<(), RenderError> {
        let ChromiumRenderer {
            mut browser,
            handler_task,
        } = *self;

        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();
        closed.map_err(|e| RenderError::Unavailable(format!("failed to close Chromium: {e}")))?;
        tracing::info!("Chromium closed");
        Ok(())
    }
}

/// Result of an in-page element lookup.
#[derive(Debug, Deserialize)]
struct Lookup {
    found: bool,
    #[serde(default)]
    text: String,
}

/// A single Chromium tab.
pub struct ChromiumContext {
    page: Page,
}

impl ChromiumContext {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, RenderError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| RenderError::Script(format!("failed to convert JS result: {e:?}")))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), RenderError> {
        let load = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, load).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(RenderError::NavigationTimeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    async fn dismiss_consent(
        &mut self,
        button: &Locator,
        wait: Duration,
    ) -> Result<bool, RenderError> {
        let script = click_script(button)?;
        let deadline = Instant::now() + wait;

        loop {
            if self.eval::<bool>(&script).await? {
                tokio::time::sleep(CONSENT_SETTLE).await;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn find_first_match(
        &self,
        locator: &Locator,
        wait: Duration,
    ) -> Result<String, RenderError> {
        let script = lookup_script(locator)?;
        let deadline = Instant::now() + wait;

        loop {
            let lookup: Lookup = self.eval(&script).await?;
            if lookup.found {
                return Ok(lookup.text.split_whitespace().collect::<Vec<_>>().join(" "));
            }
            if Instant::now() >= deadline {
                return Err(RenderError::NotFound {
                    locator: locator.to_string(),
                    waited_ms: wait.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn get_html(&self) -> Result<String, RenderError> {
        self.eval("document.documentElement.outerHTML").await
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let _ = self.page.close().await;
        Ok(())
    }
}

/// JS expression yielding the first matching element, or a falsy value.
fn element_expr(locator: &Locator) -> Result<String, RenderError> {
    let quote = |s: &str| serde_json::to_string(s).map_err(|e| RenderError::Script(e.to_string()));
    Ok(match locator {
        Locator::Css(css) => format!("document.querySelector({})", quote(css)?),
        Locator::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            quote(xpath)?
        ),
        Locator::TextContains(needle) => format!(
            "Array.from(document.querySelectorAll('body *')).find(el => \
             Array.from(el.childNodes).some(n => n.nodeType === 3 && n.textContent.includes({})))",
            quote(needle)?
        ),
    })
}

fn lookup_script(locator: &Locator) -> Result<String, RenderError> {
    Ok(format!(
        "(() => {{ const el = {}; return el ? {{ found: true, text: el.innerText || el.textContent || '' }} : {{ found: false }}; }})()",
        element_expr(locator)?
    ))
}

fn click_script(locator: &Locator) -> Result<String, RenderError> {
    Ok(format!(
        "(() => {{ const el = {}; if (!el) return false; (el.closest('button') || el).click(); return true; }})()",
        element_expr(locator)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_script_quotes_input() {
        let script = lookup_script(&Locator::TextContains("it's \"kr\"".into())).unwrap();
        assert!(script.contains(r#""it's \"kr\"""#));

        let script = lookup_script(&Locator::XPath("//span[1]".into())).unwrap();
        assert!(script.contains("XPathResult.FIRST_ORDERED_NODE_TYPE"));
    }

    #[test]
    fn test_configured_chromium_path_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let exe = dir.path().join("chrome");
        std::fs::write(&exe, b"").unwrap();
        assert_eq!(find_chromium(Some(exe.as_path())), Some(exe.clone()));
    }

    #[test]
    fn test_missing_configured_chromium_is_not_replaced() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(find_chromium(Some(dir.path().join("no-such-chrome").as_path())), None);
        // A directory is not an executable either.
        assert_eq!(find_chromium(Some(dir.path())), None);
    }

    #[tokio::test]
    async fn test_launch_reports_missing_configured_chromium() {
        let missing = PathBuf::from("/nonexistent/fare-watch/chrome");
        let launcher = ChromiumLauncher::new(Some(missing));
        let err = match launcher.launch().await {
            Ok(_) => panic!("launch should fail without an executable"),
            Err(e) => e,
        };
        assert!(matches!(err, RenderError::Unavailable(_)));
        assert!(err.to_string().contains("/nonexistent/fare-watch/chrome"));
    }

    #[test]
    fn test_random_user_agent_is_known() {
        assert!(USER_AGENTS.contains(&random_user_agent()));
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_find() {
        let renderer = ChromiumLauncher::new(None)
            .launch()
            .await
            .expect("failed to launch Chromium");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<div class='e2GB-price-text'>7 412 kr</div>",
            Duration::from_secs(10),
        )
        .await
        .expect("navigation failed");

        let text = ctx
            .find_first_match(&Locator::Css(".e2GB-price-text".into()), Duration::from_secs(2))
            .await
            .expect("lookup failed");
        assert_eq!(text, "7 412 kr");

        let missing = ctx
            .find_first_match(&Locator::Css("#nothing".into()), Duration::from_millis(300))
            .await;
        assert!(matches!(missing, Err(RenderError::NotFound { .. })));

        assert!(ctx.get_html().await.unwrap().contains("e2GB-price-text"));

        ctx.close().await.expect("close failed");
        renderer.shutdown().await.expect("shutdown failed");
    }
}
