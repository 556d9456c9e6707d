//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Longest description shown on a complaint card.
const EXCERPT_CHARS: usize = 280;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Shortens long complaint descriptions for the list view.
///
/// Usage in templates: `{{ complaint.description|excerpt }}`
#[askama::filter_fn]
pub fn excerpt(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(excerpt_of(&value.to_string(), EXCERPT_CHARS))
}

/// First `max` characters of `text`, cut at a word boundary when one is near.
fn excerpt_of(text: &str, max: usize) -> String {
    let text = text.trim();
    let Some((cut, _)) = text.char_indices().nth(max) else {
        return text.to_string();
    };
    let (head, _) = text.split_at(cut);
    let head = head
        .rfind(char::is_whitespace)
        .filter(|&space| space >= cut / 2)
        .map_or(head, |space| head.split_at(space).0);
    format!("{}…", head.trim_end())
}
