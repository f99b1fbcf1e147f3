use std::collections::HashSet;

use crate::{
    config::CurationSettings,
    models::{Rejection, Video},
    services::oracle::{Oracle, Prompt},
};

const RANKING_TEMPERATURE: f32 = 0.7;
const RANKING_MAX_TOKENS: u32 = 500;

/// Picks exactly `target_count` ids out of a candidate pool with the help of
/// a ranking oracle. Never fails: anything unusable from the oracle falls
/// back to input order.
pub struct CurationSelector<'a> {
    oracle: &'a dyn Oracle,
    target_count: usize,
}

impl<'a> CurationSelector<'a> {
    pub fn new(oracle: &'a dyn Oracle, settings: &CurationSettings) -> Self {
        Self {
            oracle,
            target_count: settings.target_count,
        }
    }

    pub async fn select(
        &self,
        candidates: &[Video],
        criteria: &str,
        rejections: &[Rejection],
    ) -> Vec<String> {
        if candidates.len() <= self.target_count {
            return candidates.iter().map(|v| v.id.clone()).collect();
        }

        let prompt = Prompt {
            text: self.build_ranking_prompt(candidates, criteria, rejections),
            temperature: RANKING_TEMPERATURE,
            max_tokens: RANKING_MAX_TOKENS,
        };

        let ranked = match self.oracle.complete(&prompt).await {
            Ok(text) => match extract_id_list(&text) {
                Some(ids) => ids,
                None => {
                    tracing::warn!(response = %text, "Ranking oracle returned no id list, using input order");
                    return self.first_candidates(candidates);
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Ranking oracle failed, using input order");
                return self.first_candidates(candidates);
            }
        };

        self.complete_selection(candidates, ranked)
    }

    fn first_candidates(&self, candidates: &[Video]) -> Vec<String> {
        candidates
            .iter()
            .take(self.target_count)
            .map(|v| v.id.clone())
            .collect()
    }

    /// Keeps ranked ids that are real candidates (first occurrence only),
    /// pads with unused candidates in input order, then cuts to size.
    fn complete_selection(&self, candidates: &[Video], ranked: Vec<String>) -> Vec<String> {
        let candidate_ids: HashSet<&str> = candidates.iter().map(|v| v.id.as_str()).collect();
        let mut used: HashSet<String> = HashSet::new();

        let mut selected: Vec<String> = ranked
            .into_iter()
            .filter(|id| candidate_ids.contains(id.as_str()))
            .filter(|id| used.insert(id.clone()))
            .collect();

        let valid = selected.len();
        if valid < self.target_count {
            for video in candidates {
                if selected.len() >= self.target_count {
                    break;
                }
                if used.insert(video.id.clone()) {
                    selected.push(video.id.clone());
                }
            }
            tracing::debug!(valid, padded = selected.len() - valid, "Ranked selection padded");
        }

        selected.truncate(self.target_count);
        selected
    }

    fn build_ranking_prompt(
        &self,
        candidates: &[Video],
        criteria: &str,
        rejections: &[Rejection],
    ) -> String {
        let k = self.target_count;

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let description = if v.description.trim().is_empty() {
                    "(no description)"
                } else {
                    v.description.as_str()
                };
                format!(
                    "{}. [{}] \"{}\" by {} - {}",
                    i + 1,
                    v.id,
                    v.title,
                    v.channel_title,
                    description
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let rejection_context = if rejections.is_empty() {
            String::new()
        } else {
            let rendered = rejections
                .iter()
                .map(|r| match r.reason.as_deref() {
                    Some(reason) => format!("- \"{}\": {}", r.video_id, reason),
                    None => format!("- \"{}\"", r.video_id),
                })
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "\n\nThe user previously rejected these videos:\n{}\n\nAvoid similar content.",
                rendered
            )
        };

        format!(
            "You are a video curator. Pick exactly {k} videos from the candidates below that best match the user's preferences.\n\n\
             USER'S CURATION CRITERIA:\n{criteria}{rejection_context}\n\n\
             CANDIDATE VIDEOS:\n{listing}\n\n\
             Return ONLY a JSON array of exactly {k} video ids from the list, best match first, for example:\n\
             [\"videoId1\", \"videoId2\"]\n\n\
             If fewer than {k} candidates fit well, still return {k}. No other text."
        )
    }
}

/// Decodes the span from the first `[` to the last `]` of `text` as a JSON
/// array of strings. Any other shape is `None`.
pub fn extract_id_list(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
