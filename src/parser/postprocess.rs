use std::sync::LazyLock;

use regex::Regex;

use super::events::{Event, Observer};
use super::lines::{clean_line, collapse_whitespace, is_chrome};
use super::thread::Post;

pub const SPLIT_ABOVE_CHARS: usize = 800;
pub const SPLIT_CHUNK_CHARS: usize = 400;
pub const MERGE_BELOW_CHARS: usize = 50;
pub const FALLBACK_CHUNK_CHARS: usize = 500;
pub const EMERGENCY_CHARS: usize = 1000;
/// Fallback ignores cleaned lines of this length or shorter.
const FALLBACK_MIN_LINE_CHARS: usize = 10;

static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+\s+").unwrap());

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split posts that are too long, then fold short posts into their successor.
pub fn post_process(posts: Vec<Post>, observer: &mut dyn Observer) -> Vec<Post> {
    let split = split_long_posts(posts, observer);
    merge_short_posts(split, observer)
}

pub fn split_long_posts(posts: Vec<Post>, observer: &mut dyn Observer) -> Vec<Post> {
    let mut out = Vec::with_capacity(posts.len());
    for post in posts {
        if post.char_len() <= SPLIT_ABOVE_CHARS {
            out.push(post);
            continue;
        }
        let chunks = pack_sentences(&post.text, SPLIT_CHUNK_CHARS);
        observer.on_event(Event::PostSplit {
            label: post.sequence_label.clone(),
            parts: chunks.len(),
        });
        for (i, chunk) in chunks.into_iter().enumerate() {
            let label = if post.sequence_label.is_empty() {
                format!("Part {}", i + 1)
            } else {
                format!("{} (part {})", post.sequence_label, i + 1)
            };
            out.push(Post {
                text: chunk,
                author: post.author.clone(),
                sequence_label: label,
            });
        }
    }
    out
}

/// Fold every post under [`MERGE_BELOW_CHARS`] into the following post of the
/// same author. Each pass absorbs at most one successor per post; passes
/// repeat until nothing changes. A merge that would push the result past
/// [`SPLIT_ABOVE_CHARS`] is skipped.
pub fn merge_short_posts(mut posts: Vec<Post>, observer: &mut dyn Observer) -> Vec<Post> {
    loop {
        let (next, merged) = merge_pass(posts, observer);
        posts = next;
        if !merged {
            return posts;
        }
    }
}

fn merge_pass(posts: Vec<Post>, observer: &mut dyn Observer) -> (Vec<Post>, bool) {
    let mut out = Vec::with_capacity(posts.len());
    let mut merged = false;
    let mut iter = posts.into_iter().peekable();

    while let Some(mut current) = iter.next() {
        let len = current.char_len();
        if len < MERGE_BELOW_CHARS {
            let absorbed = iter.next_if(|next| {
                next.author == current.author && len + 1 + next.char_len() <= SPLIT_ABOVE_CHARS
            });
            if let Some(next) = absorbed {
                current.text.push(' ');
                current.text.push_str(&next.text);
                observer.on_event(Event::PostsMerged {
                    label: current.sequence_label.clone(),
                });
                merged = true;
            }
        }
        out.push(current);
    }
    (out, merged)
}

/// Sentence-chunk the whole document, ignoring chrome and tiny lines.
pub fn sentence_fallback(markdown: &str, author: Option<&str>) -> Vec<Post> {
    let content: Vec<String> = markdown
        .lines()
        .filter(|l| !is_chrome(l))
        .map(clean_line)
        .filter(|l| char_len(l) > FALLBACK_MIN_LINE_CHARS)
        .collect();
    if content.is_empty() {
        return Vec::new();
    }

    pack_sentences(&content.join(" "), FALLBACK_CHUNK_CHARS)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| Post::new(chunk, author, format!("Post {}", i + 1)))
        .collect()
}

/// Single post holding the start of the collapsed raw text.
pub fn emergency_fallback(markdown: &str, author: Option<&str>, min_chars: usize) -> Option<Post> {
    let collapsed = collapse_whitespace(markdown);
    if char_len(&collapsed) < min_chars {
        return None;
    }
    let text: String = collapsed.chars().take(EMERGENCY_CHARS).collect();
    Some(Post::new(text.trim_end(), author, "Post 1"))
}

/// Sentences of `text`, each keeping its closing punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        let end = m.start() + m.as_str().trim_end().len();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Greedily pack sentences into chunks of at most `max_chars` characters.
///
/// A sentence longer than `max_chars` is broken at word boundaries, and a
/// single word longer than that is cut by characters.
pub fn pack_sentences(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for piece in bound_pieces(sentence, max_chars) {
            let needed = if current.is_empty() {
                char_len(&piece)
            } else {
                char_len(&current) + 1 + char_len(&piece)
            };
            if needed <= max_chars {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&piece);
            } else {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current = piece;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn bound_pieces(sentence: &str, max_chars: usize) -> Vec<String> {
    if char_len(sentence) <= max_chars {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        let words: Vec<String> = if char_len(word) > max_chars {
            let chars: Vec<char> = word.chars().collect();
            chars.chunks(max_chars).map(|c| c.iter().collect()).collect()
        } else {
            vec![word.to_string()]
        };
        for w in words {
            if !current.is_empty() && char_len(&current) + 1 + char_len(&w) > max_chars {
                pieces.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&w);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

// ── Tests ──
