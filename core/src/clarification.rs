use crate::resolution::ClarificationCandidate;

pub const CLARIFICATION_QUESTION: &str = "Which routine are you referring to?";

/// Disambiguation prompt shown when feedback could match several routines.
pub fn render_clarification_prompt(candidates: &[ClarificationCandidate]) -> String {
    let mut prompt = String::from(CLARIFICATION_QUESTION);
    for (idx, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!("\n{}. {}", idx + 1, candidate.title));
    }
    prompt
}

/// Map a short reply to a clarification prompt back to a routine id.
///
/// Accepts a 1-based number ("2", "#2", "2.") or a phrase matching exactly
/// one offered title. Anything else is not a clear choice.
pub fn pick_clarification_choice<'a>(
    reply: &str,
    candidates: &'a [ClarificationCandidate],
) -> Option<&'a str> {
    let reply = reply.trim().to_lowercase();
    if reply.is_empty() {
        return None;
    }

    let numeric = reply
        .trim_start_matches('#')
        .trim_end_matches(['.', ')'])
        .trim();
    if let Ok(position) = numeric.parse::<usize>() {
        return position
            .checked_sub(1)
            .and_then(|idx| candidates.get(idx))
            .map(|candidate| candidate.id.as_str());
    }

    let mut matches = candidates.iter().filter(|candidate| {
        let title = candidate.title.to_lowercase();
        title.contains(&reply) || reply.contains(&title)
    });
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(only.id.as_str()),
        _ => None,
    }
}
