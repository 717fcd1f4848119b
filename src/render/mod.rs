//! Dynamic rendering pass
//!
//! Runs once, after the crawl has drained: one headless browser loads one
//! page, lets it settle, scrolls to the bottom to trigger lazy loading and
//! captures the rendered markup plus whatever message log the page keeps in
//! `window._websocketMessages`. The renderer only reads that buffer; it does
//! not intercept any traffic itself.

pub mod chromium;

pub use chromium::ChromiumRenderer;

use crate::corpus::ContentStore;
use crate::transform::{beautify, deobfuscate, SourceKind};
use crate::HarvestError;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// What a rendering pass captured
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// Serialized DOM after scripts ran
    pub markup: String,
    /// Entries of the page's message buffer, kept verbatim
    pub messages: Vec<serde_json::Value>,
}

/// A headless browser able to render one page
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Loads, settles, scrolls and captures `url`, then tears the session down
    async fn render(&self, url: &str) -> anyhow::Result<RenderedPage>;
}

/// Inline code blocks found in rendered markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineBlocks {
    pub scripts: Vec<String>,
    pub styles: Vec<String>,
}

fn script_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<script[^>]*>(.*?)</script>").expect("script block regex is valid")
    })
}

fn style_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<style[^>]*>(.*?)</style>").expect("style block regex is valid")
    })
}

/// Extracts inline `<script>` and `<style>` bodies by delimiter matching
///
/// Blocks with no content (external scripts, empty styles) are skipped.
pub fn extract_inline_blocks(markup: &str) -> InlineBlocks {
    let collect = |re: &Regex| -> Vec<String> {
        re.captures_iter(markup)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|body| !body.trim().is_empty())
            .map(str::to_string)
            .collect()
    };

    InlineBlocks {
        scripts: collect(script_pattern()),
        styles: collect(style_pattern()),
    }
}

/// Counts for one rendering pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub scripts: usize,
    pub deobfuscated: usize,
    pub styles: usize,
    pub messages: usize,
    pub transform_failures: usize,
    pub characters: usize,
}

/// Renders `url` and stores the artifacts
///
/// Artifacts go directly under the content root: `rendered_page.html`,
/// `inline_script_{i}.js`, `deobfuscated_script_{i}.js` and
/// `inline_style_{i}.css`. The message log is written to `message_log_path`
/// as a JSON array. A block that fails to reformat is stored as found; a
/// failed deobfuscation only drops that one artifact.
pub async fn run_render_pass(
    renderer: &dyn Renderer,
    url: &str,
    store: &ContentStore,
    message_log_path: &Path,
) -> Result<RenderSummary, HarvestError> {
    tracing::info!("Rendering {}", url);
    let page = renderer
        .render(url)
        .await
        .map_err(|e| HarvestError::Render(format!("{:#}", e)))?;

    let mut summary = RenderSummary {
        messages: page.messages.len(),
        ..RenderSummary::default()
    };

    write_message_log(message_log_path, &page.messages)?;

    let rendered = beautify(&page.markup, SourceKind::Markup)?;
    store
        .write_artifact("rendered_page.html", Some("text/html"), rendered.as_bytes())
        .await?;
    summary.characters += rendered.chars().count();

    let blocks = extract_inline_blocks(&page.markup);

    for (i, script) in blocks.scripts.iter().enumerate() {
        let pretty = match beautify(script, SourceKind::Script) {
            Ok(pretty) => pretty,
            Err(e) => {
                tracing::warn!("Inline script {} stored unformatted: {}", i, e);
                summary.transform_failures += 1;
                script.clone()
            }
        };
        store
            .write_artifact(
                &format!("inline_script_{}.js", i),
                Some("application/javascript"),
                pretty.as_bytes(),
            )
            .await?;
        summary.scripts += 1;
        summary.characters += pretty.chars().count();

        match deobfuscate(&pretty) {
            Ok(normalized) => {
                store
                    .write_artifact(
                        &format!("deobfuscated_script_{}.js", i),
                        Some("application/javascript"),
                        normalized.as_bytes(),
                    )
                    .await?;
                summary.deobfuscated += 1;
                summary.characters += normalized.chars().count();
            }
            Err(e) => {
                tracing::warn!("Error deobfuscating script {}: {}", i, e);
                summary.transform_failures += 1;
            }
        }
    }

    for (i, style) in blocks.styles.iter().enumerate() {
        let pretty = match beautify(style, SourceKind::Style) {
            Ok(pretty) => pretty,
            Err(e) => {
                tracing::warn!("Inline style {} stored unformatted: {}", i, e);
                summary.transform_failures += 1;
                style.clone()
            }
        };
        store
            .write_artifact(
                &format!("inline_style_{}.css", i),
                Some("text/css"),
                pretty.as_bytes(),
            )
            .await?;
        summary.styles += 1;
        summary.characters += pretty.chars().count();
    }

    tracing::info!(
        "Render pass stored {} scripts ({} normalized), {} styles, {} messages",
        summary.scripts,
        summary.deobfuscated,
        summary.styles,
        summary.messages
    );

    Ok(summary)
}

fn write_message_log(path: &Path, messages: &[serde_json::Value]) -> Result<(), HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(messages)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SqliteStorage, Storage};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct StaticRenderer(RenderedPage);

    #[async_trait]
    impl Renderer for StaticRenderer {
        async fn render(&self, _url: &str) -> anyhow::Result<RenderedPage> {
            Ok(self.0.clone())
        }
    }

    struct FailingRenderer;

    #[async_trait]
    impl Renderer for FailingRenderer {
        async fn render(&self, _url: &str) -> anyhow::Result<RenderedPage> {
            anyhow::bail!("browser missing")
        }
    }

    fn store(dir: &TempDir) -> ContentStore {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("h", "https://example.com/").unwrap();
        ContentStore::open(
            dir.path().join("content"),
            "example.com",
            Arc::new(Mutex::new(storage)),
            run_id,
        )
        .unwrap()
    }

    #[test]
    fn test_extract_inline_blocks() {
        let markup = r#"<html><head>
            <script src="/app.js"></script>
            <script type="module">
                import x from "./x.js";
            </script>
            <style>body{margin:0}</style>
        </head><body><script>var a=1;</script></body></html>"#;

        let blocks = extract_inline_blocks(markup);
        assert_eq!(blocks.scripts.len(), 2);
        assert!(blocks.scripts[0].contains("import x"));
        assert_eq!(blocks.scripts[1], "var a=1;");
        assert_eq!(blocks.styles, vec!["body{margin:0}"]);
    }

    #[tokio::test]
    async fn test_render_pass_writes_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let log_path = dir.path().join("messages.json");

        let renderer = StaticRenderer(RenderedPage {
            markup: "<html><script>var s=\"\\x41\";</script><script>f(</script><style>a{b:c}</style></html>"
                .to_string(),
            messages: vec![serde_json::json!({"dir": "in", "data": "hello"})],
        });

        let summary = run_render_pass(&renderer, "https://example.com/", &store, &log_path)
            .await
            .unwrap();

        assert_eq!(summary.scripts, 2);
        assert_eq!(summary.deobfuscated, 1);
        assert_eq!(summary.styles, 1);
        assert_eq!(summary.messages, 1);
        assert_eq!(summary.transform_failures, 1);

        let content = dir.path().join("content");
        assert!(content.join("rendered_page.html").exists());
        assert!(content.join("inline_script_0.js").exists());
        assert!(content.join("inline_script_1.js").exists());
        assert!(content.join("deobfuscated_script_0.js").exists());
        assert!(!content.join("deobfuscated_script_1.js").exists());
        assert!(content.join("inline_style_0.css").exists());

        let normalized = std::fs::read_to_string(content.join("deobfuscated_script_0.js")).unwrap();
        assert_eq!(normalized, "var s=\"A\";\n");

        let log: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
        assert_eq!(log[0]["data"], "hello");

        let corpus = store.list_corpus().unwrap();
        assert_eq!(corpus[0].path, "rendered_page.html");
    }

    #[tokio::test]
    async fn test_render_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let result = run_render_pass(
            &FailingRenderer,
            "https://example.com/",
            &store,
            &dir.path().join("messages.json"),
        )
        .await;

        assert!(matches!(result, Err(HarvestError::Render(_))));
        assert!(store.list_corpus().unwrap().is_empty());
    }
}
