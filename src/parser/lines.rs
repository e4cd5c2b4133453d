use std::sync::LazyLock;

use regex::Regex;

/// Category of one raw line. Variants are listed in match precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Blank,
    Excluded,
    Separator,
    UiChrome,
    NumberedMarker,
    TimedMarker,
    Content,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineClassification<'a> {
    pub kind: LineKind,
    /// Trimmed source line.
    pub raw: &'a str,
    /// Noise-stripped text used for accumulation.
    pub text: String,
}

/// A vocabulary entry. Phrases match case-insensitively on word boundaries,
/// patterns are raw regexes.
enum Matcher {
    Phrase(&'static str),
    Pattern(&'static str),
}

impl Matcher {
    fn compile(&self) -> Regex {
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let src = match self {
            Matcher::Phrase(p) => {
                let mut s = String::from("(?i)");
                if p.starts_with(is_word) {
                    s.push_str(r"\b");
                }
                s.push_str(&regex::escape(p));
                if p.ends_with(is_word) {
                    s.push_str(r"\b");
                }
                s
            }
            Matcher::Pattern(p) => (*p).to_string(),
        };
        Regex::new(&src).unwrap()
    }
}

use Matcher::{Pattern, Phrase};

const MONTH_DAY: &str = r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\.? \d{1,2}\b";

// `Content` is the fallthrough and has no entry.
const VOCABULARY: &[(LineKind, &[Matcher])] = &[
    (LineKind::Blank, &[Pattern(r"^$")]),
    (
        LineKind::Excluded,
        &[
            Phrase("replying to"),
            Phrase("in reply to"),
            Phrase("reply to this tweet"),
            Phrase("show this reply"),
            Phrase("this tweet is unavailable"),
            Phrase("this post is unavailable"),
            Phrase("this account is private"),
        ],
    ),
    (
        LineKind::Separator,
        &[
            Phrase("show this thread"),
            Pattern(r"^[·•]+$"),
            Phrase("quote tweet"),
            Phrase("show replies"),
            Phrase("retweet"),
            Phrase("retweets"),
            Phrase("repost"),
            Phrase("reposts"),
            Phrase("like"),
            Phrase("likes"),
            Pattern(r"-{3,}|_{3,}"),
        ],
    ),
    (
        LineKind::UiChrome,
        &[
            Phrase("home"),
            Phrase("explore"),
            Phrase("notifications"),
            Phrase("messages"),
            Phrase("bookmarks"),
            Phrase("twitter"),
            Phrase("x.com"),
            Phrase("what's happening"),
            Phrase("what\u{2019}s happening"),
            Phrase("trending"),
            Phrase("follow"),
            Phrase("followers"),
            Phrase("following"),
            Phrase("profile"),
            Phrase("search twitter"),
            Phrase("log in"),
            Phrase("sign up"),
            Phrase("conversation"),
        ],
    ),
    (LineKind::NumberedMarker, &[Pattern(r"^\d+[/.)\s]")]),
    (
        LineKind::TimedMarker,
        &[
            Pattern(r"\b\d{1,2}[hms]\b"),
            Pattern(r"\b\d{1,2}:\d{2}\b"),
            Pattern(MONTH_DAY),
        ],
    ),
];

static RULES: LazyLock<Vec<(LineKind, Vec<Regex>)>> = LazyLock::new(|| {
    VOCABULARY
        .iter()
        .map(|(kind, matchers)| (*kind, matchers.iter().map(Matcher::compile).collect()))
        .collect()
});

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:#{1,6}|[*+>-])\s+").unwrap());
pub(crate) static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\](?:\([^)]*\))?").unwrap());
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,2}[hms]\b").unwrap());
static CLOCK_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b\d{1,2}:\d{2}\s*[ap]m\b").unwrap());
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!(r"{}(?:, \d{{4}})?", MONTH_DAY)).unwrap());
static GLYPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[·•]\s*").unwrap());

pub(crate) static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|[^\w])@(\w+)").unwrap());
static BARE_HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

const MENTION_SCAN_LINES: usize = 15;
const BARE_HANDLE_SCAN_LINES: usize = 20;

/// Kind of a single line, first vocabulary hit wins.
pub fn line_kind(line: &str) -> LineKind {
    let trimmed = line.trim();
    RULES
        .iter()
        .find(|(_, regexes)| regexes.iter().any(|re| re.is_match(trimmed)))
        .map(|(kind, _)| *kind)
        .unwrap_or(LineKind::Content)
}

/// Whether the line hits the interface-chrome vocabulary, regardless of
/// what else it matches.
pub fn is_chrome(line: &str) -> bool {
    let trimmed = line.trim();
    RULES
        .iter()
        .filter(|(kind, _)| *kind == LineKind::UiChrome)
        .any(|(_, regexes)| regexes.iter().any(|re| re.is_match(trimmed)))
}

pub fn classify_line(line: &str) -> LineClassification<'_> {
    let raw = line.trim();
    LineClassification {
        kind: line_kind(raw),
        raw,
        text: clean_line(raw),
    }
}

pub fn classify_lines(markdown: &str) -> Vec<LineClassification<'_>> {
    markdown.lines().map(classify_line).collect()
}

/// Strip markdown and rendering noise from one line.
pub fn clean_line(line: &str) -> String {
    let collapsed = collapse_whitespace(line);
    let s = BULLET_RE.replace(&collapsed, "");
    let s = IMAGE_RE.replace_all(&s, "");
    let s = LINK_RE.replace_all(&s, "");
    let s = RELATIVE_TIME_RE.replace_all(&s, "");
    let s = CLOCK_TIME_RE.replace_all(&s, "");
    let s = DATE_RE.replace_all(&s, "");
    let s = GLYPH_RE.replace_all(&s, " ");
    collapse_whitespace(&s)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Guess the thread author from the top of the document.
///
/// Prefers the first `@handle` in the opening lines, ignoring reply markers
/// (those name the reply target). Falls back to a bare handle-like token on
/// its own line.
pub fn detect_author(markdown: &str) -> Option<String> {
    let lines: Vec<&str> = markdown.lines().collect();

    let mention = lines
        .iter()
        .take(MENTION_SCAN_LINES)
        .filter(|l| line_kind(l) != LineKind::Excluded)
        .find_map(|l| MENTION_RE.captures(l).map(|c| c[1].to_string()));
    if mention.is_some() {
        return mention;
    }

    lines
        .iter()
        .take(BARE_HANDLE_SCAN_LINES)
        .map(|l| l.trim())
        .find(|l| l.len() > 3 && BARE_HANDLE_RE.is_match(l) && line_kind(l) == LineKind::Content)
        .map(str::to_string)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank() {
        assert_eq!(line_kind("   \t "), LineKind::Blank);
        assert_eq!(line_kind(""), LineKind::Blank);
    }

    #[test]
    fn excluded_markers() {
        assert_eq!(line_kind("Replying to @bob"), LineKind::Excluded);
        assert_eq!(line_kind("This account is private."), LineKind::Excluded);
        assert_eq!(line_kind("This Tweet is unavailable"), LineKind::Excluded);
    }

    #[test]
    fn separators() {
        assert_eq!(line_kind("Show this thread"), LineKind::Separator);
        assert_eq!(line_kind("·"), LineKind::Separator);
        assert_eq!(line_kind("---"), LineKind::Separator);
        assert_eq!(line_kind("_____"), LineKind::Separator);
        assert_eq!(line_kind("Quote Tweet"), LineKind::Separator);
        assert_eq!(line_kind("1,204 Likes"), LineKind::Separator);
    }

    #[test]
    fn phrases_match_whole_words() {
        assert_eq!(line_kind("This is unlikely to matter much"), LineKind::Content);
        assert_eq!(line_kind("Homework is due on the weekend"), LineKind::Content);
    }

    #[test]
    fn chrome() {
        assert_eq!(line_kind("Home"), LineKind::UiChrome);
        assert_eq!(line_kind("Log in"), LineKind::UiChrome);
        assert_eq!(line_kind("What’s happening"), LineKind::UiChrome);
        assert_eq!(line_kind("Trending in Tech"), LineKind::UiChrome);
    }

    #[test]
    fn chrome_check_ignores_precedence() {
        assert_eq!(line_kind("Like and follow for more"), LineKind::Separator);
        assert!(is_chrome("Like and follow for more"));
        assert!(!is_chrome("Ownership rules in practice"));
    }

    #[test]
    fn numbered_markers() {
        assert_eq!(line_kind("2/ the second point"), LineKind::NumberedMarker);
        assert_eq!(line_kind("3) another one"), LineKind::NumberedMarker);
        assert_eq!(line_kind("4. listed"), LineKind::NumberedMarker);
    }

    #[test]
    fn timed_markers() {
        assert_eq!(line_kind("Jane Doe @jane 5h"), LineKind::TimedMarker);
        assert_eq!(line_kind("posted at 10:42 PM"), LineKind::TimedMarker);
        assert_eq!(line_kind("Posted Mar 14"), LineKind::TimedMarker);
    }

    #[test]
    fn precedence_exclusion_over_separator() {
        // contains both "replying to" and "---"
        assert_eq!(line_kind("--- Replying to @carol ---"), LineKind::Excluded);
        // contains both a separator word and a chrome word
        assert_eq!(line_kind("Retweet from home"), LineKind::Separator);
        // numbered line that also carries a time
        assert_eq!(line_kind("1/ started at 9:30 this morning"), LineKind::NumberedMarker);
    }

    #[test]
    fn plain_content() {
        assert_eq!(line_kind("Rust ownership makes aliasing explicit."), LineKind::Content);
    }

    #[test]
    fn cleaning() {
        assert_eq!(clean_line("-   Some   bullet text"), "Some bullet text");
        assert_eq!(clean_line("## A heading"), "A heading");
        assert_eq!(clean_line("see [the docs](https://example.com) now"), "see now");
        assert_eq!(clean_line("![img](https://pbs.example/x.png) caption"), "caption");
        assert_eq!(clean_line("Jane · 5h · great point here"), "Jane great point here");
        assert_eq!(clean_line("shipped at 10:42 PM today"), "shipped at today");
        assert_eq!(clean_line("Mar 14, 2024 launch notes"), "launch notes");
    }

    #[test]
    fn cleaning_keeps_negative_numbers() {
        assert_eq!(clean_line("-5 degrees outside"), "-5 degrees outside");
    }

    #[test]
    fn classification_carries_clean_text() {
        let c = classify_line("  * 1/ Thread about   Rust  ");
        assert_eq!(c.raw, "* 1/ Thread about   Rust");
        assert_eq!(c.text, "1/ Thread about Rust");
        assert_eq!(c.kind, LineKind::Content);
    }

    #[test]
    fn author_from_mention() {
        let md = "Conversation\nAlice Smith\n@alice_dev\nFirst post text";
        assert_eq!(detect_author(md).as_deref(), Some("alice_dev"));
    }

    #[test]
    fn author_ignores_reply_target() {
        let md = "Replying to @bob\nI disagree with this.";
        assert_eq!(detect_author(md), None);
    }

    #[test]
    fn author_ignores_email_addresses() {
        let md = "contact me at someone@example.com for details";
        assert_eq!(detect_author(md), None);
    }

    #[test]
    fn author_from_bare_handle() {
        let md = "Home\nExplore\nrustacean42\nA long post about lifetimes";
        assert_eq!(detect_author(md).as_deref(), Some("rustacean42"));
    }

    #[test]
    fn bare_handle_skips_chrome_and_short_tokens() {
        let md = "Home\nabc\nTwitter\nsome words here";
        assert_eq!(detect_author(md), None);
    }

    #[test]
    fn mention_outside_scan_window_ignored() {
        let mut md = "plain text line\n".repeat(MENTION_SCAN_LINES);
        md.push_str("@late_author");
        assert_eq!(detect_author(&md), None);
    }
}
