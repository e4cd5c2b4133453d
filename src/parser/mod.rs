pub mod events;
pub mod filter;
pub mod lines;
pub mod postprocess;
pub mod segments;
pub mod thread;

use std::sync::LazyLock;

use regex::Regex;

use crate::db::ScrapedThread;
use crate::error::ExtractError;
use events::{Event, FallbackTier, Observer, TracingObserver};
use thread::ThreadResult;

/// Documents with fewer non-whitespace characters are rejected outright.
pub const MIN_CONTENT_CHARS: usize = 50;

static THREAD_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/status(?:es)?/(\d+)").unwrap());

/// Numeric status id from a thread URL, passed through untouched.
pub fn thread_id_from_url(url: &str) -> Option<String> {
    THREAD_ID_RE.captures(url).map(|c| c[1].to_string())
}

/// Four-stage pipeline: lines → candidate posts → filtered posts → repaired posts,
/// with sentence-chunk and single-blob fallbacks when the structured pass
/// finds nothing or finds no boundary at all.
pub fn process_document(
    markdown: &str,
    url: &str,
    observer: &mut dyn Observer,
) -> Result<ThreadResult, ExtractError> {
    let content_chars = markdown.chars().filter(|c| !c.is_whitespace()).count();
    if content_chars < MIN_CONTENT_CHARS {
        return Err(ExtractError::InputTooShort {
            chars: content_chars,
            min: MIN_CONTENT_CHARS,
        });
    }

    let author = lines::detect_author(markdown);
    match &author {
        Some(handle) => observer.on_event(Event::AuthorDetected { handle: handle.clone() }),
        None => observer.on_event(Event::Recovered(ExtractError::NoAuthorDetected)),
    }
    let author = author.as_deref();

    let classified = lines::classify_lines(markdown);
    let segmentation = segments::segment_posts(&classified, author, observer);

    let mut posts = segmentation.posts;
    if posts.is_empty() {
        observer.on_event(Event::Recovered(ExtractError::EmptyAfterFiltering {
            candidates: segmentation.candidates,
        }));
        observer.on_event(Event::FallbackEntered(FallbackTier::SentenceChunks));
        posts = postprocess::sentence_fallback(markdown, author);
    } else if segmentation.boundaries == 0 {
        // nothing ever cut the document, so it is one undelimited block of prose
        let chunks = postprocess::sentence_fallback(markdown, author);
        if !chunks.is_empty() {
            observer.on_event(Event::FallbackEntered(FallbackTier::SentenceChunks));
            posts = chunks;
        }
    }

    let mut posts = postprocess::post_process(posts, observer);

    if posts.is_empty() {
        observer.on_event(Event::FallbackEntered(FallbackTier::Emergency));
        posts.extend(postprocess::emergency_fallback(markdown, author, MIN_CONTENT_CHARS));
    }
    if posts.is_empty() {
        return Err(ExtractError::InputTooShort {
            chars: content_chars,
            min: MIN_CONTENT_CHARS,
        });
    }

    Ok(ThreadResult::new(thread_id_from_url(url), posts))
}

/// Run the engine over one stored page, logging diagnostics through `tracing`.
pub fn process_page(page: &ScrapedThread) -> Result<ThreadResult, ExtractError> {
    process_document(&page.markdown, &page.url, &mut TracingObserver)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::events::Rejection;
    use crate::parser::postprocess::{FALLBACK_CHUNK_CHARS, MERGE_BELOW_CHARS, SPLIT_ABOVE_CHARS};

    const SCENARIO: &str = "Replying to @bob\nI disagree with this.\n---\nHere is my real point about X.\n---\nAnd a second point about Y.";

    fn run(md: &str) -> Result<ThreadResult, ExtractError> {
        process_document(md, "https://x.com/someone/status/1234567890", &mut Vec::<Event>::new())
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.md", name)).unwrap()
    }

    fn assert_invariants(md: &str, t: &ThreadResult) {
        let non_blank = md.chars().filter(|c| !c.is_whitespace()).count();
        if non_blank >= MIN_CONTENT_CHARS {
            assert!(t.total_count() > 0);
        }
        let joined: Vec<&str> = t.posts().iter().map(|p| p.text.as_str()).collect();
        assert_eq!(t.full_text(), joined.join(" "));
        assert_eq!(t.total_count(), t.posts().len());
        for p in t.posts() {
            assert!(!p.text.trim().is_empty());
            assert!(p.char_len() <= SPLIT_ABOVE_CHARS, "oversized post: {}", p.char_len());
        }
        for pair in t.posts().windows(2) {
            let both_short = pair[0].char_len() < MERGE_BELOW_CHARS && pair[1].char_len() < MERGE_BELOW_CHARS;
            assert!(!(both_short && pair[0].author == pair[1].author));
        }
    }

    #[test]
    fn thread_id_extraction() {
        assert_eq!(
            thread_id_from_url("https://x.com/skyeepl/status/1939941174606799254").as_deref(),
            Some("1939941174606799254")
        );
        assert_eq!(thread_id_from_url("https://twitter.com/user"), None);
    }

    #[test]
    fn empty_input_is_too_short() {
        assert!(matches!(run(""), Err(ExtractError::InputTooShort { chars: 0, .. })));
        assert!(matches!(run("   \n\n  "), Err(ExtractError::InputTooShort { .. })));
    }

    #[test]
    fn short_input_is_too_short() {
        assert!(matches!(run("A tiny post."), Err(ExtractError::InputTooShort { .. })));
    }

    #[test]
    fn short_page_fails_with_input_too_short() {
        let page = ScrapedThread {
            page_id: 7,
            url: "https://x.com/ada/status/42".into(),
            markdown: "Home\nA tiny post.".into(),
        };
        let err = process_page(&page).unwrap_err();
        assert_eq!(err, ExtractError::InputTooShort { chars: 14, min: MIN_CONTENT_CHARS });
        assert!(err.to_string().starts_with("input too short: 14"));
    }

    #[test]
    fn reply_scenario_segments_into_two_posts() {
        let classified = lines::classify_lines(SCENARIO);
        assert_eq!(lines::detect_author(SCENARIO), None);
        let seg = segments::segment_posts(&classified, None, &mut Vec::<Event>::new());
        let texts: Vec<&str> = seg.posts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Here is my real point about X.", "And a second point about Y."]);
    }

    #[test]
    fn reply_scenario_end_to_end() {
        let t = run(SCENARIO).unwrap();
        assert!(!t.full_text().contains("disagree"));
        assert_eq!(t.full_text(), "Here is my real point about X. And a second point about Y.");
        assert_eq!(t.author(), "Unknown");
        assert_eq!(t.thread_id.as_deref(), Some("1234567890"));
        assert_invariants(SCENARIO, &t);
    }

    #[test]
    fn missing_author_is_reported() {
        let mut events: Vec<Event> = Vec::new();
        process_document(SCENARIO, "", &mut events).unwrap();
        assert!(events.contains(&Event::Recovered(ExtractError::NoAuthorDetected)));
    }

    #[test]
    fn prose_without_separators_uses_sentence_fallback() {
        // one long run-on line gets rejected by the reply filter ("exactly"),
        // so the structured pass yields nothing
        let body = (0..12)
            .map(|i| format!("Point {} explains why ownership beats garbage collection for latency.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let md = format!("Exactly my view on memory.\n{}", body);
        let mut events: Vec<Event> = Vec::new();
        let t = process_document(&md, "", &mut events).unwrap();
        assert!(events.contains(&Event::FallbackEntered(FallbackTier::SentenceChunks)));
        assert!(events.iter().any(|e| matches!(e, Event::Recovered(ExtractError::EmptyAfterFiltering { .. }))));
        assert!(t.total_count() > 1);
        assert!(t.posts().iter().all(|p| p.char_len() <= FALLBACK_CHUNK_CHARS));
        assert_invariants(&md, &t);
    }

    fn plain_prose(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Point {} explains why ownership beats garbage collection for latency.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn plain_prose_under_split_threshold_is_chunked() {
        let md = plain_prose(8);
        let len = md.chars().count();
        assert!(len > FALLBACK_CHUNK_CHARS && len <= SPLIT_ABOVE_CHARS, "len {}", len);

        let mut events: Vec<Event> = Vec::new();
        let t = process_document(&md, "", &mut events).unwrap();
        assert!(events.contains(&Event::FallbackEntered(FallbackTier::SentenceChunks)));
        assert!(t.total_count() > 1);
        assert!(t.posts().iter().all(|p| p.char_len() <= FALLBACK_CHUNK_CHARS));
        assert_eq!(t.full_text(), md);
        assert_invariants(&md, &t);
    }

    #[test]
    fn plain_prose_is_chunked() {
        let md = plain_prose(12);
        let mut events: Vec<Event> = Vec::new();
        let t = process_document(&md, "", &mut events).unwrap();
        assert!(events.contains(&Event::FallbackEntered(FallbackTier::SentenceChunks)));
        assert!(t.total_count() > 1);
        assert!(t.posts().iter().all(|p| p.char_len() <= FALLBACK_CHUNK_CHARS));
        assert!(t.full_text().starts_with("Point 0 explains"));
        assert_invariants(&md, &t);
    }

    #[test]
    fn emergency_fallback_when_everything_is_filtered() {
        // every line is chrome, so neither tier finds content
        let md = "Home Home Home Home Home Home\nExplore Explore Explore Explore\nNotifications Notifications Notifications";
        let mut events: Vec<Event> = Vec::new();
        let t = process_document(md, "", &mut events).unwrap();
        assert!(events.contains(&Event::FallbackEntered(FallbackTier::Emergency)));
        assert_eq!(t.total_count(), 1);
        assert!(t.posts()[0].text.starts_with("Home Home"));
        assert_eq!(t.posts()[0].sequence_label, "Post 1");
    }

    #[test]
    fn idempotent() {
        let md = fixture("numbered_thread");
        assert_eq!(run(&md).unwrap(), run(&md).unwrap());
    }

    #[test]
    fn numbered_thread_fixture() {
        let md = fixture("numbered_thread");
        let t = run(&md).unwrap();
        assert_eq!(t.author(), "ferris_dev");
        assert!(t.total_count() >= 4, "got {:?}", t.posts());
        assert!(t.posts()[0].text.contains("1/"));
        assert!(t.full_text().contains("5/"));
        assert!(!t.full_text().contains("Log in"));
        assert!(!t.full_text().contains("Trending"));
        assert_invariants(&md, &t);
    }

    #[test]
    fn replies_fixture_drops_other_participants() {
        let md = fixture("thread_with_replies");
        let mut events: Vec<Event> = Vec::new();
        let t = process_document(&md, "https://twitter.com/ada/status/42", &mut events).unwrap();
        assert_eq!(t.author(), "ada");
        assert_eq!(t.thread_id.as_deref(), Some("42"));
        let full = t.full_text();
        assert!(full.contains("compile-time"));
        assert!(!full.contains("Totally wrong"));
        assert!(!full.contains("@grace"));
        assert!(!full.contains("Thanks for"));
        assert!(events.iter().any(|e| matches!(e, Event::PostRejected { reason: Rejection::Reply, .. })));
        assert_invariants(&md, &t);
    }

    #[test]
    fn long_post_fixture_is_split() {
        let md = fixture("long_post");
        let mut events: Vec<Event> = Vec::new();
        let t = process_document(&md, "", &mut events).unwrap();
        assert!(events.iter().any(|e| matches!(e, Event::PostSplit { .. })));
        assert!(t.posts().iter().any(|p| p.sequence_label.contains("art 2")));
        assert_invariants(&md, &t);
    }

    #[test]
    fn events_cover_classification() {
        let mut events: Vec<Event> = Vec::new();
        process_document(SCENARIO, "", &mut events).unwrap();
        let classified = events.iter().filter(|e| matches!(e, Event::Classified { .. })).count();
        // line 1 is skipped by the reply block
        assert_eq!(classified, SCENARIO.lines().count() - 1);
    }
}
