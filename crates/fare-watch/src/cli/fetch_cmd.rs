// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fetch a single key once and show what the extractor sees.

use anyhow::{bail, Context, Result};
use fare_watch::config::MonitorConfig;
use fare_watch::diagnostics::{DiagnosticsSink, FileDiagnostics};
use fare_watch::extract::PriceExtractor;
use fare_watch::normalize::normalize;

pub async fn run(cfg: &MonitorConfig, index: usize, save_page: bool) -> Result<()> {
    let keys = cfg.validate()?;
    let Some((key, url)) = keys.nth(index) else {
        bail!("key index {index} out of range (0..{})", keys.len());
    };

    println!("Key: {key}");
    println!("URL: {url}");

    let renderer = super::launcher(cfg)
        .launch()
        .await
        .context("failed to start renderer")?;

    let outcome = async {
        let mut page = renderer.new_context().await?;
        page.navigate(url, cfg.page_load_timeout).await?;
        if let Some(button) = &cfg.consent_button {
            page.dismiss_consent(button, cfg.consent_wait).await.ok();
        }

        let extractor = PriceExtractor::new(
            cfg.selector_chain(),
            cfg.currency_marker.clone(),
            cfg.selector_wait,
        );
        let raw = extractor.extract(page.as_ref()).await;
        let html = if raw.is_none() && save_page {
            Some(page.get_html().await?)
        } else {
            None
        };
        page.close().await.ok();
        Ok::<_, fare_watch::renderer::RenderError>((raw, html))
    }
    .await;

    renderer.shutdown().await.ok();
    let (raw, html) = outcome.context("page fetch failed")?;

    match raw {
        Some(text) => {
            println!("Raw:   {text}");
            match normalize(&text, &cfg.currency_marker) {
                Some(amount) => println!("Price: {amount} {}", cfg.currency_marker),
                None => println!("Price: (unparseable)"),
            }
        }
        None => {
            println!("Raw:   (no price element found)");
            if let Some(html) = html {
                let sink = FileDiagnostics::new(cfg.diagnostics_dir.clone());
                sink.save(key, &html).await?;
                println!("Saved: {}", sink.path_for(key).display());
            }
        }
    }
    Ok(())
}
