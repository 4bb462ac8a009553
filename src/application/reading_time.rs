//! Reading-time estimate derived from a post's content blocks.

use crate::domain::posts::ContentBlock;

pub const WORDS_PER_MINUTE: u32 = 200;

/// Whitespace-delimited tokens across every heading and body span.
pub fn word_count(content: &[ContentBlock]) -> u32 {
    content.iter().fold(0u32, |total, block| {
        let body = block
            .body
            .iter()
            .fold(0u32, |acc, span| acc.saturating_add(count_words(&span.text)));
        total
            .saturating_add(count_words(&block.heading))
            .saturating_add(body)
    })
}

/// Minutes to read `content`, rounded up. Empty content reads in zero minutes.
pub fn estimate(content: &[ContentBlock]) -> u32 {
    word_count(content).div_ceil(WORDS_PER_MINUTE)
}

fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}
