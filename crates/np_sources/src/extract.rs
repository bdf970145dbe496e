use scraper::{Html, Selector};
use url::Url;

/// Markers left on pages that serve a JS challenge instead of the article.
const BOT_MARKERS: [&str; 2] = ["Just a moment...", "Checking your browser"];

pub fn looks_bot_blocked(text: &str) -> bool {
    BOT_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Collect the visible text of a page, one line per text node, skipping
/// script and style subtrees.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let skip = Selector::parse("script, style, noscript").unwrap();

    let skipped: Vec<_> = document.select(&skip).map(|el| el.id()).collect();

    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let inside_skipped = node
                .ancestors()
                .any(|ancestor| skipped.contains(&ancestor.id()));
            if inside_skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
    lines.join("\n")
}

/// Google search results wrap targets as `/url?q=<target>&...`.
pub fn unwrap_redirect(href: &str) -> Option<String> {
    if !href.starts_with("/url?") {
        return Some(href.to_string());
    }
    let absolute = Url::parse("https://www.google.com")
        .ok()?
        .join(href)
        .ok()?;
    absolute
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
}

pub struct SearchHit {
    pub title: String,
    pub url: String,
}

/// Parse the news-tab search results page into candidate (title, url) pairs.
pub fn parse_search_results(html: &str) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse("div.Gx5Zad").unwrap();
    let title_selector = Selector::parse("div.BNeawe").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut hits = Vec::new();
    for result in document.select(&result_selector) {
        let title = result
            .select(&title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "No Title".to_string());

        let href = result
            .select(&link_selector)
            .next()
            .and_then(|el| el.value().attr("href"));

        let Some(href) = href else { continue };
        let Some(url) = unwrap_redirect(href) else { continue };
        if !url.starts_with("http") {
            continue;
        }

        hits.push(SearchHit { title, url });
    }
    hits
}
