//! HTML to markdown rendering and short-block filtering.

use std::sync::LazyLock;

use htmd::HtmlToMarkdown;
use regex::Regex;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<script.*?</script>|<style.*?</style>|<[^>]+>").expect("valid tag pattern")
});

/// Render `html` as markdown, dropping scripts and styles.
///
/// Falls back to the document's bare text when the converter rejects the input.
pub fn html_to_markdown(html: &str) -> String {
    let converter = HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "noscript", "head"])
        .build();
    converter.convert(html).unwrap_or_else(|error| {
        tracing::debug!(%error, "HTML conversion failed; stripping tags instead");
        TAG_PATTERN.replace_all(html, " ").into_owned()
    })
}

/// Keep headings and blank-line separated blocks with at least `threshold` words.
pub fn filter_blocks(markdown: &str, threshold: usize) -> String {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .filter(|block| block.starts_with('#') || block.split_whitespace().count() >= threshold)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headings_and_drops_scripts() {
        let markdown = html_to_markdown(
            "<html><head><title>t</title></head><body><h1>Who is hiring?</h1>\
             <script>alert(1)</script><p>Acme | Rust | Remote</p></body></html>",
        );
        assert!(markdown.contains("# Who is hiring?"));
        assert!(markdown.contains("Acme | Rust | Remote"));
        assert!(!markdown.contains("alert"));
    }

    #[test]
    fn short_blocks_are_dropped_but_headings_survive() {
        let markdown = "# Jobs\n\nreply\n\nAcme is hiring Rust engineers in NYC\n\n\n\n";
        assert_eq!(
            filter_blocks(markdown, 3),
            "# Jobs\n\nAcme is hiring Rust engineers in NYC"
        );
    }
}
