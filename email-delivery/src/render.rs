use maud::{html, PreEscaped, DOCTYPE};
use pulldown_cmark::{html as cmark_html, Options, Parser};

const STYLESHEET: &str = r#"
body {
    font-family: Arial, sans-serif;
    line-height: 1.6;
    color: #333;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
}
h1, h2, h3, h4, h5, h6 {
    color: #2c3e50;
    margin-top: 1.5em;
    margin-bottom: 0.5em;
}
a {
    color: #3498db;
    text-decoration: none;
}
a:hover {
    text-decoration: underline;
}
code {
    background-color: #f8f9fa;
    padding: 2px 4px;
    border-radius: 4px;
    font-family: monospace;
}
pre {
    background-color: #f8f9fa;
    padding: 15px;
    border-radius: 8px;
    overflow-x: auto;
}
blockquote {
    border-left: 4px solid #3498db;
    margin: 0;
    padding-left: 20px;
    color: #666;
}
img {
    max-width: 100%;
    height: auto;
}
ul, ol {
    padding-left: 20px;
}
li {
    margin-bottom: 8px;
}
strong {
    color: #2c3e50;
}
"#;

/// A newsletter rendered once and shared by every message in a batch.
#[derive(Clone, Debug)]
pub struct RenderedNewsletter {
    pub subject: String,
    pub plain: String,
    pub html: String,
}

pub fn render_newsletter(title: &str, text: &str) -> RenderedNewsletter {
    let text = strip_code_fence(text);
    let body = markdown_to_html(text);
    RenderedNewsletter {
        subject: title.to_string(),
        plain: text.to_string(),
        html: styled_document(title, &body),
    }
}

/// Removes a single fence wrapping the whole text, as models sometimes emit
/// ```` ```markdown ... ``` ```` despite being asked not to.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") || !trimmed.ends_with("```") || trimmed.len() < 6 {
        return trimmed;
    }
    let Some(first_newline) = trimmed.find('\n') else {
        return trimmed;
    };
    let inner = &trimmed[first_newline + 1..trimmed.len() - 3];
    if inner.contains("\n```") {
        // More than one fenced block; the fences belong to the content.
        return trimmed;
    }
    inner.trim()
}

pub fn markdown_to_html(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 2);
    cmark_html::push_html(&mut out, parser);
    out
}

fn styled_document(title: &str, body_html: &str) -> String {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
                style { (PreEscaped(STYLESHEET)) }
            }
            body {
                (PreEscaped(body_html))
            }
        }
    }
    .into_string()
}
