use super::events::{Event, Observer};
use super::filter;
use super::lines::{LineClassification, LineKind};
use super::thread::Post;

/// Lines whose cleaned text is this short or shorter are not accumulated.
const MIN_LINE_CHARS: usize = 5;

#[derive(Debug, Default)]
pub struct Segmentation {
    pub posts: Vec<Post>,
    /// Non-empty buffers handed to the finalizer, accepted or not.
    pub candidates: usize,
    /// Structural lines (separator, chrome, exclusion, numbered or flushing
    /// timed marker) seen. Zero means the document was never cut.
    pub boundaries: usize,
}

struct Accumulator<'a> {
    author: Option<&'a str>,
    buffer: Vec<String>,
    posts_emitted: usize,
    posts: Vec<Post>,
}

impl Accumulator<'_> {
    fn push(&mut self, line: &LineClassification<'_>) {
        if line.text.chars().count() > MIN_LINE_CHARS {
            self.buffer.push(line.text.clone());
        }
    }

    fn flush(&mut self, observer: &mut dyn Observer) {
        if self.buffer.is_empty() {
            return;
        }
        let index = self.posts_emitted;
        self.posts_emitted += 1;
        match filter::finalize(&self.buffer, self.author, index) {
            Ok(post) => {
                observer.on_event(Event::PostAccepted { index });
                self.posts.push(post);
            }
            Err(reason) => observer.on_event(Event::PostRejected { index, reason }),
        }
        self.buffer.clear();
    }
}

/// Walk classified lines and cut them into candidate posts.
pub fn segment_posts(
    lines: &[LineClassification<'_>],
    author: Option<&str>,
    observer: &mut dyn Observer,
) -> Segmentation {
    let mut acc = Accumulator {
        author,
        buffer: Vec::new(),
        posts_emitted: 0,
        posts: Vec::new(),
    };

    let mut boundaries = 0;
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        observer.on_event(Event::Classified { line: i, kind: line.kind });

        match line.kind {
            LineKind::Blank => {}
            LineKind::Excluded => {
                boundaries += 1;
                acc.flush(observer);
                let resume = skip_reply_block(lines, i, author);
                observer.on_event(Event::ExclusionSkipped { from: i, to: resume });
                // the resume line itself is processed on the next iteration
                i = resume;
                continue;
            }
            LineKind::Separator | LineKind::UiChrome => {
                boundaries += 1;
                acc.flush(observer);
            }
            LineKind::NumberedMarker => {
                boundaries += 1;
                acc.flush(observer);
                acc.push(line);
            }
            LineKind::TimedMarker => {
                if acc.buffer.len() > 1 {
                    boundaries += 1;
                    acc.flush(observer);
                }
                acc.push(line);
            }
            LineKind::Content => acc.push(line),
        }
        i += 1;
    }
    acc.flush(observer);

    Segmentation {
        boundaries,
        candidates: acc.posts_emitted,
        posts: acc.posts,
    }
}

/// Index of the first line after `start` where the author's thread resumes,
/// or `lines.len()` when it never does.
fn skip_reply_block(lines: &[LineClassification<'_>], start: usize, author: Option<&str>) -> usize {
    let mut j = start + 1;
    while j < lines.len() && !resumes_thread(&lines[j], author) {
        j += 1;
    }
    j
}

fn resumes_thread(line: &LineClassification<'_>, author: Option<&str>) -> bool {
    match line.kind {
        LineKind::Separator | LineKind::NumberedMarker => true,
        _ => author.is_some_and(|a| {
            line.raw.starts_with('@') && line.raw.to_lowercase().contains(&a.to_lowercase())
        }),
    }
}

// ── Tests ──
