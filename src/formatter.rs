/// Message formatting for republished posts and launch announcements
///
/// Lengths are counted in chars, which is how the platform counts the
/// 280 budget for the text we produce. Cuts land on char boundaries but
/// may split words.

use crate::launches::LaunchRecord;
use crate::twitter::CandidateItem;

/// Maximum length of a published post
pub const POST_BUDGET: usize = 280;

/// First-pass excerpt length
pub const EXCERPT_LIMIT: usize = 200;

const ELLIPSIS: &str = "...";

/// `": "` + `"..."` + `" "` around the excerpt in a truncated message
const FRAME_OVERHEAD: usize = 6;

/// Permalink of a post on x.com
pub fn permalink(author: &str, id: &str) -> String {
    format!("https://x.com/{}/status/{}", author, id)
}

/// Build `"<label>: <excerpt> <url>"` for a candidate item
///
/// `fallback_author` is used for the permalink when the feed did not
/// expand the author handle.
pub fn format_post(item: &CandidateItem, label: &str, fallback_author: &str) -> String {
    let author = item.author.as_deref().unwrap_or(fallback_author);
    let url = permalink(author, &item.id);
    compose(label, &item.text, &url)
}

/// Compose a message from label, body text and url within [`POST_BUDGET`]
pub fn compose(label: &str, text: &str, url: &str) -> String {
    let excerpt = if char_len(text) > EXCERPT_LIMIT {
        format!("{}{}", take_chars(text, EXCERPT_LIMIT), ELLIPSIS)
    } else {
        text.to_string()
    };

    let mut message = format!("{}: {} {}", label, excerpt, url);

    if char_len(&message) > POST_BUDGET {
        let room = POST_BUDGET.saturating_sub(char_len(url) + char_len(label) + FRAME_OVERHEAD);
        message = format!("{}: {}{} {}", label, take_chars(text, room), ELLIPSIS, url);
    }

    // label and url alone can blow the budget
    if char_len(&message) > POST_BUDGET {
        message = take_chars(&message, POST_BUDGET).to_string();
    }

    message
}

/// Human-readable announcement for an upcoming launch
pub fn format_launch_announcement(launch: &LaunchRecord) -> String {
    let message = format!(
        "Upcoming SpaceX launch: {} on {} UTC",
        launch.name,
        launch.date_utc.format("%B %d, %Y at %H:%M")
    );
    take_chars(&message, POST_BUDGET).to_string()
}

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Prefix of `s` holding at most `n` chars
pub fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
