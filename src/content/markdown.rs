//! Markdown rendering with syntax highlighting

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::config::HighlightConfig;

/// Markdown renderer with syntax highlighting
pub struct MarkdownRenderer {
    options: Options,
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    highlight: HighlightConfig,
}

impl MarkdownRenderer {
    /// Create a renderer with the `extra` extension set
    pub fn new() -> Self {
        Self::with_options(&["extra".to_string()], &HighlightConfig::default())
    }

    /// Create a renderer for the given extension names.
    ///
    /// `extra` enables tables, footnotes and definition lists; the other
    /// names map to a single parser option. `meta` is accepted and ignored,
    /// front matter is parsed before rendering.
    pub fn with_options(extensions: &[String], highlight: &HighlightConfig) -> Self {
        let mut options = Options::empty();
        for ext in extensions {
            match ext.as_str() {
                "extra" => {
                    options |= Options::ENABLE_TABLES
                        | Options::ENABLE_FOOTNOTES
                        | Options::ENABLE_DEFINITION_LIST
                        | Options::ENABLE_HEADING_ATTRIBUTES;
                }
                "tables" => options |= Options::ENABLE_TABLES,
                "footnotes" => options |= Options::ENABLE_FOOTNOTES,
                "def_list" => options |= Options::ENABLE_DEFINITION_LIST,
                "attr_list" => options |= Options::ENABLE_HEADING_ATTRIBUTES,
                "strikethrough" => options |= Options::ENABLE_STRIKETHROUGH,
                "tasklist" => options |= Options::ENABLE_TASKLISTS,
                "smarty" => options |= Options::ENABLE_SMART_PUNCTUATION,
                "gfm" => options |= Options::ENABLE_GFM,
                "meta" => {}
                other => tracing::warn!("Unknown markdown extension '{}'", other),
            }
        }
        Self {
            options,
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            highlight: highlight.clone(),
        }
    }

    /// Render markdown to HTML
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, self.options);

        if !self.highlight.enable {
            let mut html_output = String::new();
            html::push_html(&mut html_output, parser);
            return html_output;
        }

        let mut events: Vec<Event> = Vec::new();
        let mut in_code_block = false;
        let mut code_block_lang: Option<String> = None;
        let mut code_block_content = String::new();

        for event in parser {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    in_code_block = true;
                    code_block_lang = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                    code_block_content.clear();
                }
                Event::End(TagEnd::CodeBlock) => {
                    let highlighted =
                        self.highlight_code(&code_block_content, code_block_lang.as_deref());
                    events.push(Event::Html(CowStr::from(highlighted)));
                    in_code_block = false;
                    code_block_lang = None;
                }
                Event::Text(text) if in_code_block => {
                    code_block_content.push_str(&text);
                }
                _ => {
                    if !in_code_block {
                        events.push(event);
                    }
                }
            }
        }

        let mut html_output = String::new();
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Highlight a code block
    fn highlight_code(&self, code: &str, lang: Option<&str>) -> String {
        let lang = lang.unwrap_or("text");

        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let theme = self
            .theme_set
            .themes
            .get(&self.highlight.theme)
            .or_else(|| self.theme_set.themes.values().next());

        let highlighted = theme.and_then(|theme| {
            highlighted_html_for_string(code, &self.syntax_set, syntax, theme).ok()
        });

        match highlighted {
            Some(highlighted) if self.highlight.line_number => {
                add_line_numbers(&highlighted, lang)
            }
            Some(highlighted) => format!(
                r#"<figure class="highlight {}">{}</figure>"#,
                lang, highlighted
            ),
            None => format!(
                r#"<pre><code class="language-{}">{}</code></pre>"#,
                lang,
                html_escape(code)
            ),
        }
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Add a line number gutter to highlighted code
fn add_line_numbers(code: &str, lang: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();

    let gutter = (1..=lines.len())
        .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
        lang,
        gutter,
        lines.join("\n")
    )
}

/// Simple HTML escaping
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("# Hello World\n\nThis is a test.");
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
    }

    #[test]
    fn test_render_code_block() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains("highlight rust"));
        assert!(!html.contains("```"));
    }

    #[test]
    fn test_render_without_highlight() {
        let highlight = HighlightConfig {
            enable: false,
            ..Default::default()
        };
        let renderer = MarkdownRenderer::with_options(&[], &highlight);
        let html = renderer.render("```rust\nfn main() {}\n```");
        assert!(html.contains("<code class=\"language-rust\">"));
    }

    #[test]
    fn test_tables_need_extension() {
        let table = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let plain = MarkdownRenderer::with_options(&[], &HighlightConfig::default());
        assert!(!plain.render(table).contains("<table>"));
        assert!(MarkdownRenderer::new().render(table).contains("<table>"));
    }

    #[test]
    fn test_reference_links() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("See [lux][].\n\n[lux]: https://example.com \"Lux\"");
        assert!(html.contains(r#"<a href="https://example.com" title="Lux">lux</a>"#));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">"), "&lt;a href=&quot;x&quot;&gt;");
    }
}
