//! Cleanup of text extracted from summary PDFs before it is shown to users.
//!
//! Normalization is an ordered list of [`Rule`]s. Each rule is a pure
//! `&str -> String` transform and can be exercised on its own; [`normalize`]
//! runs them all in order. The composition is idempotent.

use std::sync::LazyLock;

use regex::Regex;

/// Marker substituted for letters that symbol fonts leave behind for bullets.
pub const ARTIFACT_MARKER: &str = "➤";
pub const CANONICAL_BULLET: char = '•';

const BULLET_GLYPHS: &[char] = &[
    '■', '▪', '◦', '·', '●', '▫', '⦿', '⚫', '⚬', '◆', '◘', '‣', '∙',
];

// Wingdings-style fonts extract bullets as a lone letter at line start.
static GLYPH_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[nlquv](?:[ \t]+|[ \t]*\n[ \t]*)").unwrap());

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n)+").unwrap());

pub struct Rule {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

pub const RULES: &[Rule] = &[
    Rule {
        name: "line-endings",
        apply: unify_line_endings,
    },
    Rule {
        name: "glyph-artifacts",
        apply: replace_glyph_artifacts,
    },
    Rule {
        name: "blank-lines",
        apply: collapse_blank_lines,
    },
    Rule {
        name: "bullet-glyphs",
        apply: canonicalize_bullets,
    },
    Rule {
        name: "trim",
        apply: trim,
    },
];

pub fn normalize(raw: &str) -> String {
    RULES
        .iter()
        .fold(raw.to_string(), |text, rule| (rule.apply)(&text))
}

pub fn unify_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

pub fn replace_glyph_artifacts(text: &str) -> String {
    GLYPH_ARTIFACT
        .replace_all(text, format!("{ARTIFACT_MARKER} ").as_str())
        .into_owned()
}

pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_LINES.replace_all(text, "\n\n").into_owned()
}

pub fn canonicalize_bullets(text: &str) -> String {
    text.chars()
        .map(|ch| {
            if BULLET_GLYPHS.contains(&ch) {
                CANONICAL_BULLET
            } else {
                ch
            }
        })
        .collect()
}

pub fn trim(text: &str) -> String {
    text.trim().to_string()
}
