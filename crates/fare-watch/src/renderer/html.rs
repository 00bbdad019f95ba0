// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Locator evaluation over static HTML using `scraper`.
//!
//! `scraper::Html` is `!Send`, so documents are parsed on every call and never held
//! across an await point.

use super::{Locator, RenderError};
use scraper::{ElementRef, Html, Selector};

/// Find the first element matching `locator` and return its whitespace-collapsed text.
///
/// Returns `Ok(None)` when nothing matches. XPath is not supported over static HTML.
pub fn find_first_match(html: &str, locator: &Locator) -> Result<Option<String>, RenderError> {
    let document = Html::parse_document(html);

    match locator {
        Locator::Css(css) => {
            let selector = Selector::parse(css)
                .map_err(|e| RenderError::Script(format!("invalid CSS selector {css:?}: {e}")))?;
            Ok(document.select(&selector).next().map(|el| element_text(&el)))
        }
        Locator::TextContains(needle) => {
            let selector = Selector::parse("body *")
                .map_err(|e| RenderError::Script(format!("invalid CSS selector: {e}")))?;
            Ok(document
                .select(&selector)
                .find(|el| own_text_contains(el, needle))
                .map(|el| element_text(&el)))
        }
        Locator::XPath(_) => Err(RenderError::Unsupported(locator.to_string())),
    }
}

/// Whether any direct text child of `el` contains `needle`.
fn own_text_contains(el: &ElementRef<'_>, needle: &str) -> bool {
    el.children()
        .filter_map(|child| child.value().as_text())
        .any(|text| text.contains(needle))
}

/// Collect all text content from an element, trimmed and whitespace-collapsed.
fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div id="flight-results-list-wrapper">
            <div class="header">Results</div>
            <div class="result">
              <div class="e2GB-price-text">7 412 kr</div>
            </div>
          </div>
          <footer><span>Prices in kr include taxes</span></footer>
        </body></html>
    "#;

    #[test]
    fn test_css_match() {
        let text = find_first_match(PAGE, &Locator::Css("div.e2GB-price-text".into())).unwrap();
        assert_eq!(text.as_deref(), Some("7 412 kr"));
    }

    #[test]
    fn test_css_no_match() {
        let text = find_first_match(PAGE, &Locator::Css("span.missing".into())).unwrap();
        assert!(text.is_none());
    }

    #[test]
    fn test_text_contains_uses_own_text() {
        // <div id="flight-results-list-wrapper"> contains "kr" only through a descendant,
        // so the first hit is the price div itself.
        let text = find_first_match(PAGE, &Locator::TextContains("kr".into())).unwrap();
        assert_eq!(text.as_deref(), Some("7 412 kr"));
    }

    #[test]
    fn test_invalid_css_is_an_error() {
        assert!(find_first_match(PAGE, &Locator::Css("div[".into())).is_err());
    }

    #[test]
    fn test_xpath_unsupported() {
        let err = find_first_match(PAGE, &Locator::XPath("//div".into())).unwrap_err();
        assert!(matches!(err, RenderError::Unsupported(_)));
    }
}
