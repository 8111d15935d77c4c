use once_cell::sync::Lazy;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use scraper::Html;
use syntect::{
    highlighting::ThemeSet,
    html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator},
    parsing::{SyntaxReference, SyntaxSet},
    util::LinesWithEndings,
};
use tracing::warn;

pub const EXCERPT_LENGTH: usize = 200;

const HIGHLIGHT_THEME: &str = "InspiredGitHub";
const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Where relative image references in a post resolve to.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Slug of a directory post whose `images/` folder is served under `/blog/<slug>/images/`.
    pub bundle_slug: Option<&'a str>,
}

impl<'a> RenderContext<'a> {
    pub fn flat() -> Self {
        RenderContext { bundle_slug: None }
    }

    pub fn bundle(slug: &'a str) -> Self {
        RenderContext {
            bundle_slug: Some(slug),
        }
    }
}

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_MATH);
    options
}

pub fn render_markdown_to_html(markdown: &str, ctx: &RenderContext<'_>) -> String {
    let normalized_markdown = normalize_latex_delimiters(markdown);
    let parser = Parser::new_ext(&normalized_markdown, markdown_options());

    let mut events = Vec::new();
    let mut code_block: Option<(Option<String>, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                code_block = Some((language, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((language, source)) = code_block.take() {
                    let highlighted = highlight_code(language.as_deref(), &source);
                    events.push(Event::Html(CowStr::from(highlighted)));
                }
            }
            Event::Text(text) => match code_block.as_mut() {
                Some((_, source)) => source.push_str(&text),
                None => events.push(Event::Text(text)),
            },
            Event::InlineMath(math) => {
                events.push(Event::Html(CowStr::from(render_math_html(&math, false))))
            }
            Event::DisplayMath(math) => {
                events.push(Event::Html(CowStr::from(render_math_html(&math, true))))
            }
            other => events.push(other),
        }
    }

    let mut html_out = String::new();
    html::push_html(&mut html_out, events.into_iter());
    rewrite_image_paths(&html_out, ctx)
}

/// Points relative image sources at the paths the site serves them from:
/// `assets/..` to `/images/..`, and a bundled post's `images/..` to `/blog/<slug>/images/..`.
pub fn rewrite_image_paths(html: &str, ctx: &RenderContext<'_>) -> String {
    let mut out = html
        .replace("src=\"./assets/", "src=\"/images/")
        .replace("src=\"assets/", "src=\"/images/");

    if let Some(slug) = ctx.bundle_slug {
        let target = format!("src=\"/blog/{slug}/images/");
        out = out
            .replace("src=\"./images/", &target)
            .replace("src=\"images/", &target);
    }

    out
}

fn normalize_latex_delimiters(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        if let Some((open, close, display_mode)) = delimiter_at(input, i) {
            let content_start = i + open.len();
            if let Some(close_at) = input[content_start..].find(close) {
                let content_end = content_start + close_at;
                let content = &input[content_start..content_end];
                if display_mode || content.contains('\n') {
                    out.push_str("$$");
                    out.push_str(content);
                    out.push_str("$$");
                } else {
                    out.push('$');
                    out.push_str(content);
                    out.push('$');
                }
                i = content_end + close.len();
                continue;
            }
        }

        if let Some(ch) = input[i..].chars().next() {
            out.push(ch);
            i += ch.len_utf8();
        } else {
            break;
        }
    }

    out
}

fn delimiter_at(input: &str, index: usize) -> Option<(&'static str, &'static str, bool)> {
    let tail = &input[index..];
    if tail.starts_with("\\(") {
        Some(("\\(", "\\)", false))
    } else if tail.starts_with("\\[") {
        Some(("\\[", "\\]", true))
    } else {
        None
    }
}

fn render_math_html(source: &str, display_mode: bool) -> String {
    let mut opts = katex::Opts::builder();
    opts.display_mode(display_mode);

    let rendered = match opts.build() {
        Ok(opts) => katex::render_with_opts(source, opts),
        Err(_) => return fallback_math_html(source, display_mode),
    };

    match rendered {
        Ok(html) => html,
        Err(_) => fallback_math_html(source, display_mode),
    }
}

fn fallback_math_html(source: &str, display_mode: bool) -> String {
    let class_name = if display_mode { "math math-display" } else { "math math-inline" };
    format!(
        "<span class=\"{class_name}\">{}</span>",
        htmlescape::encode_minimal(source)
    )
}

/// Highlights a fenced code block into class-based spans; unknown languages render as plain text.
pub fn highlight_code(language: Option<&str>, code: &str) -> String {
    let lang_token = language.unwrap_or("text").to_ascii_lowercase();
    let syntax = find_syntax(&lang_token).unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());

    let mut source = code.to_string();
    if !source.ends_with('\n') {
        source.push('\n');
    }

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, CLASS_STYLE);
    for line in LinesWithEndings::from(source.as_str()) {
        if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
            warn!(language = %lang_token, "Syntax highlighting failed: {}", err);
            return plain_code_html(&lang_token, code);
        }
    }

    format!(
        "<pre class=\"syntax-highlight\" data-language=\"{lang}\"><code class=\"language-{lang}\">{}</code></pre>\n",
        generator.finalize(),
        lang = htmlescape::encode_minimal(&lang_token),
    )
}

fn plain_code_html(lang_token: &str, code: &str) -> String {
    format!(
        "<pre class=\"syntax-highlight\" data-language=\"{lang}\"><code class=\"language-{lang}\">{}</code></pre>\n",
        htmlescape::encode_minimal(code),
        lang = htmlescape::encode_minimal(lang_token),
    )
}

fn find_syntax(token: &str) -> Option<&'static SyntaxReference> {
    let syntax_set: &'static SyntaxSet = &SYNTAX_SET;
    syntax_set
        .find_syntax_by_token(token)
        .or_else(|| syntax_set.find_syntax_by_name(token))
        .or_else(|| syntax_set.find_syntax_by_extension(token))
}

/// Stylesheet for the classes emitted by [`highlight_code`].
pub fn syntax_stylesheet() -> String {
    let themes = ThemeSet::load_defaults();
    themes
        .themes
        .get(HIGHLIGHT_THEME)
        .and_then(|theme| css_for_theme_with_class_style(theme, CLASS_STYLE).ok())
        .unwrap_or_default()
}

/// Text content of an HTML fragment with all markup removed.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect()
}

/// Plain-text excerpt of at most `length` characters plus `...` when cut.
/// Surrounding whitespace left by block tags is trimmed whether or not the text is cut.
pub fn create_excerpt(html: &str, length: usize) -> String {
    let text = plain_text(html);
    if text.chars().count() <= length {
        return text.trim().to_string();
    }
    let head: String = text.chars().take(length).collect();
    format!("{}...", head.trim())
}

pub fn count_words(html: &str) -> usize {
    plain_text(html).split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(input: &str) -> String {
        render_markdown_to_html(input, &RenderContext::flat())
    }

    #[test]
    fn renders_math_with_latex_paren_and_bracket_delimiters() {
        let output = render("\\(x^2\\) and \\[y^2\\]");
        assert!(output.contains("katex"));
    }

    #[test]
    fn renders_multiline_paren_delimited_math() {
        let output = render("Start \\( \\frac{2.24T}{2.08T}\n\\approx 1.077 \\) end");
        assert!(output.contains("katex"));
    }

    #[test]
    fn highlights_fenced_code_blocks() {
        let output = render("```rust\nfn main() {}\n```\n");
        assert!(output.contains("data-language=\"rust\""));
        assert!(output.contains("class=\"language-rust\""));
        assert!(output.contains("hl-"));
        assert!(!output.contains("<pre><code"));
    }

    #[test]
    fn unknown_languages_fall_back_to_plain_text() {
        let output = render("```nosuchlang\n<b>x</b>\n```\n");
        assert!(output.contains("data-language=\"nosuchlang\""));
        assert!(output.contains("&lt;b&gt;"));
    }

    #[test]
    fn rewrites_flat_asset_images() {
        let output = render("![diagram](assets/hello/diagram.png)");
        assert!(output.contains("src=\"/images/hello/diagram.png\""));
    }

    #[test]
    fn rewrites_bundled_images_under_post_path() {
        let output = render_markdown_to_html(
            "![a](images/a.png) ![b](./images/b.png) ![c](https://cdn.example/c.png)",
            &RenderContext::bundle("let-go"),
        );
        assert!(output.contains("src=\"/blog/let-go/images/a.png\""));
        assert!(output.contains("src=\"/blog/let-go/images/b.png\""));
        assert!(output.contains("src=\"https://cdn.example/c.png\""));
    }

    #[test]
    fn flat_posts_leave_images_folder_alone() {
        let output = render("![a](images/a.png)");
        assert!(output.contains("src=\"images/a.png\""));
    }

    #[test]
    fn plain_text_strips_tags() {
        assert_eq!(plain_text("<h1>Title</h1><p>Some <em>body</em></p>"), "TitleSome body");
    }

    #[test]
    fn excerpt_truncates_long_text() {
        let html = format!("<p>{}</p>", "word ".repeat(100));
        let excerpt = create_excerpt(&html, EXCERPT_LENGTH);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 199 + 3);
        assert_eq!(create_excerpt("<p>short</p>", EXCERPT_LENGTH), "short");
    }

    #[test]
    fn short_excerpt_drops_block_whitespace() {
        let html = render("Just one line.\n");
        assert!(plain_text(&html).ends_with('\n'));
        assert_eq!(create_excerpt(&html, EXCERPT_LENGTH), "Just one line.");
        assert_eq!(create_excerpt("\n  <p> padded </p>\n", EXCERPT_LENGTH), "padded");
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let html = format!("<p>{}</p>", "ü".repeat(250));
        let excerpt = create_excerpt(&html, 10);
        assert_eq!(excerpt, format!("{}...", "ü".repeat(10)));
    }

    #[test]
    fn counts_words_by_whitespace() {
        assert_eq!(count_words("<p>one  two</p>\n<p>three</p>"), 3);
        assert_eq!(count_words("<p> </p>"), 0);
    }

    #[test]
    fn stylesheet_targets_prefixed_classes() {
        assert!(syntax_stylesheet().contains(".hl-"));
    }
}
