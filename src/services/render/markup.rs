//! 数学公式标记
//!
//! 打印版面和交互列表共用这一套切分规则：
//! - `$$...$$`、`\[...\]`：独立公式
//! - `$...$`、`\(...\)`：行内公式
//! - `\$`：普通美元符号

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static MATH_DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\\$|\$\$(.+?)\$\$|\\\[(.+?)\\\]|\\\((.+?)\\\)|\$([^$\n]+?)\$")
        .expect("valid regex")
});

/// 文本片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text { text: String },
    Math { tex: String, display: bool },
}

/// 切分文本中的公式
pub fn parse(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut last = 0;

    for caps in MATH_DELIMITERS.captures_iter(input) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        text.push_str(&input[last..whole.start()]);
        last = whole.end();

        if whole.as_str() == "\\$" {
            text.push('$');
            continue;
        }

        let (tex, display) = if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            (m.as_str(), true)
        } else if let Some(m) = caps.get(3).or_else(|| caps.get(4)) {
            (m.as_str(), false)
        } else {
            continue;
        };

        if !text.is_empty() {
            segments.push(Segment::Text {
                text: std::mem::take(&mut text),
            });
        }
        segments.push(Segment::Math {
            tex: tex.trim().to_string(),
            display,
        });
    }

    text.push_str(&input[last..]);
    if !text.is_empty() {
        segments.push(Segment::Text { text });
    }
    segments
}

/// 终端显示用的纯文本（公式统一写成 `$..$` / `$$..$$`）
pub fn to_plain(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Text { text } => text.clone(),
            Segment::Math { tex, display: true } => format!("$${}$$", tex),
            Segment::Math { tex, display: false } => format!("${}$", tex),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Segment {
        Segment::Text {
            text: s.to_string(),
        }
    }

    fn math(tex: &str, display: bool) -> Segment {
        Segment::Math {
            tex: tex.to_string(),
            display,
        }
    }

    #[test]
    fn test_inline_and_display_math() {
        let segments = parse("Find $x$ if $$x^2 = 4$$ holds.");
        assert_eq!(
            segments,
            vec![
                text("Find "),
                math("x", false),
                text(" if "),
                math("x^2 = 4", true),
                text(" holds."),
            ]
        );
    }

    #[test]
    fn test_bracket_delimiters_match_dollar_forms() {
        assert_eq!(parse(r"\(a+b\)"), parse("$a+b$"));
        assert_eq!(parse(r"\[\frac{1}{2}\]"), parse(r"$$\frac{1}{2}$$"));
    }

    #[test]
    fn test_escaped_dollar_is_text() {
        assert_eq!(parse(r"Costs \$5 and $y$"), vec![text("Costs $5 and "), math("y", false)]);
    }

    #[test]
    fn test_unclosed_dollar_stays_text() {
        assert_eq!(parse("price $5"), vec![text("price $5")]);
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_plain_rendering() {
        let segments = parse(r"Area \(\pi r^2\) of circle");
        assert_eq!(to_plain(&segments), r"Area $\pi r^2$ of circle");
    }
}
