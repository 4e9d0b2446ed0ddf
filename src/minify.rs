//! Conservative minifiers for CSS, JavaScript and HTML.
//!
//! None of these parse their language. Each is a single-pass scanner that
//! knows just enough syntax (strings, comments, template and regex literals,
//! raw-text elements) to drop whitespace and comments only where the grammar
//! guarantees they carry no meaning. The output is never larger than the
//! input for well-formed documents, but callers still compare sizes before
//! overwriting.
//!
//! | Language | Removed | Kept verbatim |
//! |---|---|---|
//! | CSS | comments, whitespace around `{}:;,`, last `;` in a block | strings |
//! | JS | comments, indentation, blank lines, spaces around `{}()[];,:=` | line breaks, strings, templates, regex literals |
//! | HTML | comments, whitespace runs, default `type` attributes | `<pre>`, `<textarea>`, `<!--[if` comments |

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+type\s*=\s*(?:"text/javascript"|'text/javascript'|text/javascript\b)"#)
        .expect("script type regex")
});
static CSS_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+type\s*=\s*(?:"text/css"|'text/css'|text/css\b)"#).expect("css type regex")
});
static TYPE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\stype\s*=\s*["']?([^"'\s>]+)"#).expect("type attribute regex")
});

/// Keywords after which a `/` starts a regex literal rather than a division.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Elements whose surrounding whitespace never renders.
const BLOCK_ELEMENTS: &[&str] = &[
    "!doctype", "html", "head", "body", "title", "meta", "link", "base", "style", "div", "p",
    "pre", "blockquote", "ul", "ol", "li", "dl", "dt", "dd", "section", "header", "footer", "nav",
    "main", "article", "aside", "address", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "br", "table",
    "thead", "tbody", "tfoot", "tr", "td", "th", "caption", "form", "fieldset", "legend", "figure",
    "figcaption",
];

/// Elements that render nothing where they stand. Text on either side of
/// them is one run, so `a <script>..</script> b` keeps exactly one space.
const OPAQUE_ELEMENTS: &[&str] = &["script"];

/// Elements whose content is not markup.
const RAW_ELEMENTS: &[&str] = &["script", "style", "pre", "textarea"];

// =============================================================================
// Shared scanning helpers
// =============================================================================

/// Index just past the `*/` closing a block comment whose body starts at
/// `start`, or the end of input when unterminated.
fn skip_block_comment(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            return i + 2;
        }
        i += 1;
    }
    chars.len()
}

/// Copy a quoted string starting at `start` (the opening quote). Stops
/// before an unescaped line break.
fn copy_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '\n' => return i,
            _ => {
                out.push(c);
                i += 1;
                if c == quote {
                    return i;
                }
            }
        }
    }
    chars.len()
}

// =============================================================================
// CSS
// =============================================================================

/// Minify a stylesheet.
pub fn minify_css(css: &str) -> String {
    let chars: Vec<char> = css.chars().collect();
    let mut out = String::with_capacity(css.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            // A comment still separates tokens: `0/**/auto`
            i = skip_block_comment(&chars, i + 2);
            pending_space = true;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }
        if pending_space {
            pending_space = false;
            if css_needs_space(out.chars().last(), c) {
                out.push(' ');
            }
        }
        match c {
            '"' | '\'' => i = copy_quoted(&chars, i, &mut out),
            '}' => {
                if out.ends_with(';') {
                    out.pop();
                }
                out.push(c);
                i += 1;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn css_needs_space(prev: Option<char>, next: char) -> bool {
    match prev {
        None => false,
        Some(p) => !matches!(p, '{' | '}' | ';' | ',' | ':') && !matches!(next, '{' | '}' | ';' | ','),
    }
}

// =============================================================================
// JavaScript
// =============================================================================

/// Minify a script, keeping its line structure so automatic semicolon
/// insertion behaves exactly as before.
pub fn minify_js(js: &str) -> String {
    let chars: Vec<char> = js.chars().collect();
    let mut out = String::with_capacity(js.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '\n' {
            end_line(&mut out);
            pending_space = false;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }
        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            let end = skip_block_comment(&chars, i + 2);
            // A comment spanning lines counts as a line terminator.
            if chars[i..end].contains(&'\n') {
                end_line(&mut out);
                pending_space = false;
            } else {
                pending_space = true;
            }
            i = end;
            continue;
        }

        if pending_space {
            pending_space = false;
            if js_needs_space(out.chars().last(), c) {
                out.push(' ');
            }
        }
        match c {
            '"' | '\'' => i = copy_quoted(&chars, i, &mut out),
            '`' => i = copy_template(&chars, i, &mut out),
            '/' if regex_allowed(&out) => i = copy_regex(&chars, i, &mut out),
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.trim_end().to_string()
}

fn end_line(out: &mut String) {
    while out.ends_with(' ') || out.ends_with('\t') || out.ends_with('\r') {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn js_needs_space(prev: Option<char>, next: char) -> bool {
    const TIGHT: &[char] = &['{', '}', '(', ')', '[', ']', ';', ',', ':', '='];
    match prev {
        None | Some('\n') => false,
        Some(p) => !TIGHT.contains(&p) && !TIGHT.contains(&next),
    }
}

/// Whether a `/` at this point begins a regex literal, judged by the last
/// significant character already emitted.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    let Some(last) = trimmed.chars().last() else {
        return true;
    };
    // A postfix increment ends an operand.
    if trimmed.ends_with("++") || trimmed.ends_with("--") {
        return false;
    }
    if is_ident_char(last) {
        let word_len = trimmed
            .chars()
            .rev()
            .take_while(|&c| is_ident_char(c))
            .map(char::len_utf8)
            .sum::<usize>();
        let word = &trimmed[trimmed.len() - word_len..];
        return REGEX_KEYWORDS.contains(&word);
    }
    !matches!(last, ')' | ']' | '"' | '\'' | '`')
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn copy_regex(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('/');
    let mut in_class = false;
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => return i,
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
                continue;
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => {
                out.push(c);
                return i + 1;
            }
            _ => {}
        }
        out.push(c);
        i += 1;
    }
    chars.len()
}

fn copy_template(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('`');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                out.push(c);
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '`' => {
                out.push(c);
                return i + 1;
            }
            '$' if chars.get(i + 1) == Some(&'{') => {
                out.push_str("${");
                i = copy_template_expr(chars, i + 2, out);
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    chars.len()
}

/// Copy a `${ … }` substitution, tracking nested braces and literals.
fn copy_template_expr(chars: &[char], start: usize, out: &mut String) -> usize {
    let mut depth = 1;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => i = copy_quoted(chars, i, out),
            '`' => i = copy_template(chars, i, out),
            _ => {
                out.push(c);
                i += 1;
                if c == '{' {
                    depth += 1;
                } else if c == '}' {
                    depth -= 1;
                    if depth == 0 {
                        return i;
                    }
                }
            }
        }
    }
    chars.len()
}

// =============================================================================
// HTML
// =============================================================================

#[derive(Debug, PartialEq)]
enum Node<'a> {
    Text(&'a str),
    Tag(&'a str),
    Comment(&'a str),
    /// Content of a raw element, with the opening tag that owns it.
    Raw { owner: &'a str, content: &'a str },
}

/// Lowercased element name of a tag, `!doctype` for the doctype.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '!')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Byte index just past the `>` closing the tag that starts at `start`.
fn tag_end(html: &str, start: usize) -> usize {
    let mut quote: Option<u8> = None;
    for (offset, &b) in html.as_bytes()[start + 1..].iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return start + 1 + offset + 1,
            None => {}
        }
    }
    html.len()
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

fn tokenize(html: &str) -> Vec<Node<'_>> {
    let bytes = html.as_bytes();
    let mut nodes = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let rest = &html[pos..];
        let is_comment = rest.starts_with("<!--");
        let is_tag = bytes
            .get(pos + 1)
            .is_some_and(|b| b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'));
        if !is_comment && !is_tag {
            pos += 1;
            continue;
        }

        if text_start < pos {
            nodes.push(Node::Text(&html[text_start..pos]));
        }
        if is_comment {
            let end = rest.find("-->").map_or(html.len(), |e| pos + e + 3);
            nodes.push(Node::Comment(&html[pos..end]));
            pos = end;
        } else {
            let end = tag_end(html, pos);
            let tag = &html[pos..end];
            nodes.push(Node::Tag(tag));
            pos = end;

            let name = tag_name(tag);
            let opening = !tag.starts_with("</") && !tag.ends_with("/>");
            if opening && RAW_ELEMENTS.contains(&name.as_str()) {
                let close = find_ignore_case(&html[pos..], &format!("</{name}"))
                    .map_or(html.len(), |o| pos + o);
                if close > pos {
                    nodes.push(Node::Raw {
                        owner: tag,
                        content: &html[pos..close],
                    });
                }
                pos = close;
            }
        }
        text_start = pos;
    }
    if text_start < html.len() {
        nodes.push(Node::Text(&html[text_start..]));
    }
    nodes
}

/// Collapse whitespace inside a tag (outside attribute values) and drop
/// default `type` attributes.
fn clean_tag(tag: &str, name: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    for c in tag.chars() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if is_html_space(c) => pending_space = true,
            None => {
                if pending_space && c != '>' {
                    out.push(' ');
                }
                pending_space = false;
                if c == '"' || c == '\'' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    match name {
        "script" => SCRIPT_TYPE.replace(&out, "").into_owned(),
        "style" | "link" => CSS_TYPE.replace(&out, "").into_owned(),
        _ => out,
    }
}

/// Whether a `<script>` tag holds JavaScript (no type, or a JS type).
fn is_js_script(tag: &str) -> bool {
    match TYPE_ATTR.captures(tag) {
        None => true,
        Some(caps) => matches!(
            caps[1].to_ascii_lowercase().as_str(),
            "text/javascript" | "application/javascript" | "module"
        ),
    }
}

/// HTML's ASCII whitespace. U+00A0 and other Unicode spaces are content.
fn is_html_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0C')
}

/// Content buffered between two layout-relevant nodes.
enum Run<'a> {
    Text(&'a str),
    /// Markup that renders nothing, emitted as-is.
    Opaque(String),
}

/// Emit buffered runs with whitespace collapsed to single spaces, dropping
/// leading whitespace after a block boundary and trailing whitespace before
/// one.
fn flush_runs(out: &mut String, runs: &mut Vec<Run<'_>>, prev_block: bool, next_block: bool) {
    let mut after_space = prev_block;
    // Byte index of an emitted space not yet followed by visible text.
    let mut trailing_space = None;
    for run in runs.drain(..) {
        match run {
            Run::Text(text) => {
                for c in text.chars() {
                    if !is_html_space(c) {
                        out.push(c);
                        after_space = false;
                        trailing_space = None;
                    } else if !after_space {
                        trailing_space = Some(out.len());
                        out.push(' ');
                        after_space = true;
                    }
                }
            }
            Run::Opaque(markup) => out.push_str(&markup),
        }
    }
    if next_block && let Some(index) = trailing_space {
        out.remove(index);
    }
}

/// Minify an HTML document.
pub fn minify_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut runs = Vec::new();
    let mut prev_block = true;

    for node in tokenize(html) {
        match node {
            Node::Text(t) => runs.push(Run::Text(t)),
            Node::Comment(c) if c.starts_with("<!--[if") => {
                flush_runs(&mut out, &mut runs, prev_block, false);
                out.push_str(c);
                prev_block = false;
            }
            Node::Comment(_) => {}
            Node::Tag(tag) => {
                let name = tag_name(tag);
                if OPAQUE_ELEMENTS.contains(&name.as_str()) {
                    runs.push(Run::Opaque(clean_tag(tag, &name)));
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name.as_str());
                flush_runs(&mut out, &mut runs, prev_block, block);
                out.push_str(&clean_tag(tag, &name));
                prev_block = block;
            }
            Node::Raw { owner, content } => match tag_name(owner).as_str() {
                "script" if is_js_script(owner) => runs.push(Run::Opaque(minify_js(content))),
                "script" => runs.push(Run::Opaque(content.to_string())),
                name => {
                    flush_runs(&mut out, &mut runs, prev_block, false);
                    if name == "style" {
                        out.push_str(&minify_css(content));
                    } else {
                        out.push_str(content);
                    }
                    prev_block = false;
                }
            },
        }
    }
    flush_runs(&mut out, &mut runs, prev_block, true);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // CSS
    // =========================================================================

    #[test]
    fn css_drops_comments_and_whitespace() {
        let css = r#"/* header */
body {
  color: red;
  margin: 0 auto;
}

a:hover , a:focus { content: "a  /* b */  c"; }
"#;
        assert_eq!(
            minify_css(css),
            r#"body{color:red;margin:0 auto}a:hover,a:focus{content:"a  /* b */  c"}"#
        );
    }

    #[test]
    fn css_comment_between_tokens_keeps_separation() {
        assert_eq!(minify_css("p{margin:0/**/auto}"), "p{margin:0 auto}");
    }

    #[test]
    fn css_descendant_combinator_preserved() {
        assert_eq!(minify_css(".nav  .item  :hover { x: y }"), ".nav .item :hover{x:y}");
    }

    #[test]
    fn css_critical_markers_are_comments() {
        let css = "/* CRITICAL-START */ body{color:red} /* CRITICAL-END */";
        assert_eq!(minify_css(css), "body{color:red}");
    }

    // =========================================================================
    // JavaScript
    // =========================================================================

    #[test]
    fn js_strips_comments_and_indentation() {
        let js = r#"// leading comment
function greet(name) {
    /* block */
    const url = "http://example.com"; // trailing
    return `Hello ${name} // not a comment`;
}

const re = /\/\/+/g;
"#;
        let expected = r#"function greet(name){
const url="http://example.com";
return `Hello ${name} // not a comment`;
}
const re=/\/\/+/g;"#;
        assert_eq!(minify_js(js), expected);
    }

    #[test]
    fn js_keeps_line_breaks_for_asi() {
        assert_eq!(minify_js("let a = 1\nlet b = 2\n"), "let a=1\nlet b=2");
    }

    #[test]
    fn js_regex_with_comment_like_class() {
        assert_eq!(minify_js("x = /[/*]/.test(s)"), "x=/[/*]/.test(s)");
    }

    #[test]
    fn js_division_is_not_a_regex() {
        assert_eq!(minify_js("a = b / c / d"), "a=b / c / d");
    }

    #[test]
    fn js_division_after_postfix_increment() {
        assert_eq!(
            minify_js("i++ / 2;\nvar b = 3 / 4;"),
            "i++ / 2;\nvar b=3 / 4;"
        );
        assert_eq!(minify_js("n-- / 2"), "n-- / 2");
    }

    #[test]
    fn js_regex_after_return() {
        assert_eq!(minify_js("return /a\\/b/.test(x)"), "return /a\\/b/.test(x)");
    }

    #[test]
    fn js_nested_template_substitution() {
        let js = "const s = `a ${ cond ? `b ${ \"}\" }` : '//' } c`;";
        assert_eq!(minify_js(js), "const s=`a ${ cond ? `b ${ \"}\" }` : '//' } c`;");
    }

    #[test]
    fn js_multiline_block_comment_acts_as_line_break() {
        assert_eq!(minify_js("a /*\n*/ b"), "a\nb");
    }

    #[test]
    fn js_string_with_escaped_quote() {
        assert_eq!(minify_js(r#"s = 'it\'s // fine';"#), r#"s='it\'s // fine';"#);
    }

    // =========================================================================
    // HTML
    // =========================================================================

    #[test]
    fn html_full_document() {
        let html = r#"<!DOCTYPE html>
<html>
  <head>
    <!-- a comment -->
    <!--[if IE]><p>old</p><![endif]-->
    <script type="text/javascript">
      // hi
      var x = 1;
    </script>
    <style type="text/css">
      body { color: red; }
    </style>
  </head>
  <body>
    <p>  Hello   <b>world</b>  </p>
    <pre>  keep
   this  </pre>
  </body>
</html>
"#;
        let expected = "<!DOCTYPE html><html><head><!--[if IE]><p>old</p><![endif]-->\
<script>var x=1;</script><style>body{color:red}</style></head><body>\
<p>Hello <b>world</b></p><pre>  keep\n   this  </pre></body></html>";
        assert_eq!(minify_html(html), expected);
    }

    #[test]
    fn html_inline_spacing_kept() {
        assert_eq!(
            minify_html("<p><b>a</b>   <i>b</i></p>"),
            "<p><b>a</b> <i>b</i></p>"
        );
    }

    #[test]
    fn html_textarea_preserved() {
        let html = "<form><textarea>  a\n\n  b </textarea></form>";
        assert_eq!(minify_html(html), html);
    }

    #[test]
    fn html_non_js_script_untouched() {
        let html = "<script type=\"application/ld+json\">\n  { \"a\": 1 }\n</script>";
        assert_eq!(
            minify_html(html),
            "<script type=\"application/ld+json\">\n  { \"a\": 1 }\n</script>"
        );
    }

    #[test]
    fn html_attribute_values_untouched() {
        let html = r#"<div   class="a   b"  data-x='  y '  >z</div>"#;
        assert_eq!(minify_html(html), r#"<div class="a   b" data-x='  y '>z</div>"#);
    }

    #[test]
    fn html_link_default_type_removed() {
        let html = r#"<link rel="stylesheet" type="text/css" href="/a.css">"#;
        assert_eq!(minify_html(html), r#"<link rel="stylesheet" href="/a.css">"#);
    }

    #[test]
    fn html_less_than_in_text_is_text() {
        assert_eq!(minify_html("<p>1 < 2</p>"), "<p>1 < 2</p>");
    }

    #[test]
    fn html_inline_script_keeps_one_space() {
        assert_eq!(
            minify_html("<p>Hello <script>var x = 1;</script> world</p>"),
            "<p>Hello <script>var x=1;</script>world</p>"
        );
    }

    #[test]
    fn html_form_controls_are_inline() {
        assert_eq!(
            minify_html("<label>Country <select> <option>FR</option> </select></label>"),
            "<label>Country <select> <option>FR</option> </select></label>"
        );
    }

    #[test]
    fn html_scripts_in_head_lose_whitespace() {
        let html = "<head>\n  <script src=\"a.js\"></script>\n  <script src=\"b.js\"></script>\n</head>";
        assert_eq!(
            minify_html(html),
            "<head><script src=\"a.js\"></script><script src=\"b.js\"></script></head>"
        );
    }

    #[test]
    fn html_no_break_space_is_content() {
        assert_eq!(minify_html("<p>10\u{a0}km</p>"), "<p>10\u{a0}km</p>");
        assert_eq!(
            minify_html("<p>\u{a0} a \u{a0}</p>"),
            "<p>\u{a0} a \u{a0}</p>"
        );
    }
}
