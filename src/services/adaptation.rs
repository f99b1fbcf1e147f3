use crate::services::oracle::{Oracle, Prompt};

const REWRITE_TEMPERATURE: f32 = 0.5;
const REWRITE_MAX_TOKENS: u32 = 200;

/// Folds a rejection into the criteria text with the rewrite oracle.
///
/// Returns `current` unchanged when the oracle fails or answers with nothing.
pub async fn adapt(
    oracle: &dyn Oracle,
    current: &str,
    rejected_title: &str,
    reason: Option<&str>,
) -> String {
    let prompt = Prompt {
        text: build_rewrite_prompt(current, rejected_title, reason),
        temperature: REWRITE_TEMPERATURE,
        max_tokens: REWRITE_MAX_TOKENS,
    };

    match oracle.complete(&prompt).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::warn!("Rewrite oracle returned empty criteria, keeping current");
            current.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Criteria adaptation failed, keeping current");
            current.to_string()
        }
    }
}

fn build_rewrite_prompt(current: &str, rejected_title: &str, reason: Option<&str>) -> String {
    let feedback = match reason {
        Some(reason) => format!(" with reason: \"{}\"", reason),
        None => String::new(),
    };

    format!(
        "A user curates their video feed with these preferences:\n\"{current}\"\n\n\
         They just rejected a video titled \"{rejected_title}\"{feedback}.\n\n\
         Rewrite the preferences to take this feedback into account. Keep it concise \
         (2-3 sentences at most). Return ONLY the updated preferences text."
    )
}
