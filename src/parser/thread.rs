use serde::ser::{Serialize, Serializer};

pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// One reconstructed post of the thread author.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Post {
    pub text: String,
    pub author: String,
    pub sequence_label: String,
}

impl Post {
    pub fn new(text: impl Into<String>, author: Option<&str>, sequence_label: impl Into<String>) -> Self {
        Post {
            text: text.into(),
            author: author.unwrap_or(UNKNOWN_AUTHOR).to_string(),
            sequence_label: sequence_label.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Ordered posts of one thread plus the values derived from them.
///
/// `total_count`, `full_text` and `author` are computed from `posts` on every
/// call, so they can never drift from the post list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadResult {
    pub thread_id: Option<String>,
    posts: Vec<Post>,
}

impl ThreadResult {
    pub fn new(thread_id: Option<String>, posts: Vec<Post>) -> Self {
        ThreadResult { thread_id, posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn total_count(&self) -> usize {
        self.posts.len()
    }

    pub fn full_text(&self) -> String {
        self.posts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn author(&self) -> &str {
        self.posts
            .first()
            .map(|p| p.author.as_str())
            .unwrap_or(UNKNOWN_AUTHOR)
    }
}

#[derive(serde::Serialize)]
struct ThreadView<'a> {
    thread_id: Option<&'a str>,
    posts: &'a [Post],
    total_count: usize,
    full_text: String,
    author: &'a str,
}

impl Serialize for ThreadResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ThreadView {
            thread_id: self.thread_id.as_deref(),
            posts: &self.posts,
            total_count: self.total_count(),
            full_text: self.full_text(),
            author: self.author(),
        }
        .serialize(serializer)
    }
}
