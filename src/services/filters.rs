//! Candidate filters: deduplication, already-seen exclusion and short-form
//! exclusion. Only [`filter_short_form`] touches the network.

use std::collections::{HashMap, HashSet};

use crate::{
    error::AppResult,
    models::Video,
    services::{
        fanout::per_chunk,
        providers::{CatalogSource, MAX_BATCH_SIZE},
    },
};

/// Keeps the first occurrence of every video id, preserving order
pub fn dedup(videos: Vec<Video>) -> Vec<Video> {
    let mut seen = HashSet::new();
    videos
        .into_iter()
        .filter(|video| seen.insert(video.id.clone()))
        .collect()
}

/// Removes videos whose id is in `shown`, preserving order
pub fn filter_seen(videos: Vec<Video>, shown: &HashSet<String>) -> Vec<Video> {
    videos
        .into_iter()
        .filter(|video| !shown.contains(&video.id))
        .collect()
}

/// Keeps videos whose duration is known and at least `threshold_secs`.
///
/// A duration already on the video wins over `resolved`. Videos with no
/// duration from either are dropped: unknown may be short-form.
pub fn retain_long_form(
    videos: Vec<Video>,
    resolved: &HashMap<String, u64>,
    threshold_secs: u64,
) -> Vec<Video> {
    videos
        .into_iter()
        .filter_map(|mut video| {
            let seconds = video
                .duration_seconds
                .or_else(|| resolved.get(&video.id).copied())?;
            video.duration_seconds = Some(seconds);
            (seconds >= threshold_secs).then_some(video)
        })
        .collect()
}

/// Resolves missing durations in batches and drops short-form videos.
///
/// Batches are resolved concurrently; a failed batch leaves its videos
/// unresolved, and so excluded. Fails when the upstream rejected the viewer's
/// credentials, or when every batch failed and no video carried a duration of
/// its own.
pub async fn filter_short_form(
    catalog: &dyn CatalogSource,
    videos: Vec<Video>,
    threshold_secs: u64,
) -> AppResult<Vec<Video>> {
    let unresolved: Vec<String> = videos
        .iter()
        .filter(|video| video.duration_seconds.is_none())
        .map(|video| video.id.clone())
        .collect();
    let any_known = unresolved.len() < videos.len();

    let settled = per_chunk(&unresolved, MAX_BATCH_SIZE, "duration", |ids| {
        catalog.resolve_durations(ids)
    })
    .await?;
    let batches = if any_known {
        settled.succeeded
    } else {
        settled.into_required("duration")?
    };
    let resolved: HashMap<String, u64> = batches.into_iter().flatten().collect();

    let before = videos.len();
    let kept = retain_long_form(videos, &resolved, threshold_secs);

    tracing::debug!(
        candidates = before,
        kept = kept.len(),
        looked_up = unresolved.len(),
        "Short-form videos filtered"
    );

    Ok(kept)
}

/// Parses an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M` into seconds.
///
/// Only weeks and days are accepted before `T`; hours, minutes and whole
/// seconds after it. Returns `None` for anything else.
pub fn parse_iso8601_duration(text: &str) -> Option<u64> {
    let rest = text.strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => digits.push(c),
            'T' if !in_time && digits.is_empty() => in_time = true,
            unit => {
                let multiplier = match (in_time, unit) {
                    (false, 'W') => 604_800,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                let value: u64 = digits.parse().ok()?;
                total = total.checked_add(value.checked_mul(multiplier)?)?;
                digits.clear();
                saw_component = true;
            }
        }
    }

    if !digits.is_empty() || !saw_component {
        return None;
    }

    Some(total)
}
