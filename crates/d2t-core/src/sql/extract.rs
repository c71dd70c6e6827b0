//! Best-effort recovery of a SQL statement from model output.
//!
//! Rules are tried in order and the first one that matches wins:
//!
//! 1. the interior of the first ```` ```sql … ``` ```` fence;
//! 2. the statement following a `SQL Query:` / `Query:` / `Revised Query Example:`
//!    label, then one starting a line with a statement keyword;
//! 3. the input with markdown headings, backticks, emphasis markers and
//!    blank lines stripped.
//!
//! A statement found by rule 2 stops at a backtick, a blank line or just
//! after its first `;`, so trailing prose is left behind. There is no
//! grammar here and no failure path.

use std::sync::LazyLock;

use regex::Regex;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```sql(.+?)```").expect("valid regex"));

/// Label followed by any emphasis markers or an opening fence that precede
/// the statement itself.
static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:SQL Query:|Query:|Revised Query Example:)[\s*_]*(?:```[A-Za-z]*)?")
        .expect("valid regex")
});

static KEYWORD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:SELECT|UPDATE|INSERT|DELETE|CREATE|ALTER|DROP)\b").expect("valid regex")
});

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").expect("valid regex"));

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#+.*$").expect("valid regex"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*|\*|__").expect("valid regex"));
static BLANK_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*\r?\n").expect("valid regex"));

/// Pull the SQL statement out of `raw`.
pub fn extract_sql(raw: &str) -> String {
    if let Some(body) = SQL_FENCE.captures(raw).and_then(|c| c.get(1)) {
        return body.as_str().trim().to_owned();
    }

    if let Some(label) = LABEL.find(raw) {
        let sql = statement(&raw[label.end()..]);
        if !sql.is_empty() {
            return sql.to_owned();
        }
    }

    if let Some(start) = KEYWORD_LINE.find(raw) {
        return statement(&raw[start.start()..]).to_owned();
    }

    strip_markdown(raw)
}

/// The statement at the head of `text`: it ends at a backtick, a blank
/// line, or just after the first `;`, whichever comes first.
fn statement(text: &str) -> &str {
    let mut end = text.find('`').unwrap_or(text.len());
    if let Some(m) = PARAGRAPH_BREAK.find(&text[..end]) {
        end = m.start();
    }
    if let Some(semi) = text[..end].find(';') {
        end = semi + 1;
    }
    text[..end].trim().trim_end_matches("**").trim_end()
}

fn strip_markdown(raw: &str) -> String {
    let text = HEADING.replace_all(raw, "");
    let text = text.replace('`', "");
    let text = EMPHASIS.replace_all(&text, "");
    let text = BLANK_LINE.replace_all(&text, "");
    text.trim().to_owned()
}
