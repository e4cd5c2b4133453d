use std::sync::LazyLock;

use regex::Regex;

use super::events::Rejection;
use super::lines::MENTION_RE;
use super::thread::Post;

/// Joined text of this length or shorter is dropped.
const MIN_POST_CHARS: usize = 15;

static NOISE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\s*\d+\s*$",
        r"^\s*[·•.]+\s*$",
        r"^\s*@\w+\s*$",
        r"(?i)^\s*(?:reply|retweet|repost|like|share)\s*$",
        r"(?i)^\s*\d+[hms]\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const REPLY_PHRASES: &[&str] = &[
    "replying to",
    "in reply to",
    "reply to this",
    "responding to",
    "this is in response to",
];

static CONVERSATIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:@\w+|(?:thanks for|thank you for|you['’]re right|i agree|good point|exactly)\b|(?:yes|no)\s*[,!.])",
    )
    .unwrap()
});

/// Turn an accumulated line buffer into a post, or say why it was dropped.
pub fn finalize(lines: &[String], author: Option<&str>, index: usize) -> Result<Post, Rejection> {
    let text = lines.join(" ").trim().to_string();

    if text.chars().count() <= MIN_POST_CHARS {
        return Err(Rejection::TooShort);
    }
    if is_pure_noise(&text) {
        return Err(Rejection::PureNoise);
    }
    if is_reply(&text, author) {
        return Err(Rejection::Reply);
    }

    let label = if index > 0 {
        format!("Post {}", index + 1)
    } else {
        String::new()
    };
    Ok(Post::new(text, author, label))
}

pub fn is_pure_noise(text: &str) -> bool {
    NOISE_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Whether `text` reads as a reply to someone other than the thread author.
///
/// Deliberately aggressive: any mention of another handle counts, even one
/// crediting a collaborator inside the author's own thread.
pub fn is_reply(text: &str, author: Option<&str>) -> bool {
    let lower = text.to_lowercase();

    if REPLY_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }

    let author = author.map(str::to_lowercase);
    let mentions_other = MENTION_RE
        .captures_iter(text)
        .any(|c| author.as_deref() != Some(c[1].to_lowercase().as_str()));
    if mentions_other {
        return true;
    }

    CONVERSATIONAL_RE.is_match(lower.trim_start())
}

// ── Tests ──
