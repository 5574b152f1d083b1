//! Deterministic intent matching for confirmation and disambiguation
//! replies. These run before the reasoner so yes/no answers never cost
//! an LLM round trip.

/// How a spoken reply maps onto a pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmIntent {
    Confirm,
    Cancel,
    Unclear,
}

const CONFIRM_TOKENS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "confirm", "confirmed", "please", "proceed",
];
const CANCEL_TOKENS: &[&str] = &[
    "no", "nope", "nah", "cancel", "stop", "don't", "dont", "wait", "abort", "skip",
];

/// Classify a reply to "should I do X?". Cancel wins over confirm when
/// both appear ("no wait, yes" stays a cancel until re-asked).
pub fn classify_confirmation(input: &str) -> ConfirmIntent {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() {
        return ConfirmIntent::Unclear;
    }
    if lower.contains("never mind") || lower.contains("nevermind") {
        return ConfirmIntent::Cancel;
    }

    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.iter().any(|t| CANCEL_TOKENS.contains(t)) {
        return ConfirmIntent::Cancel;
    }
    if tokens.iter().any(|t| CONFIRM_TOKENS.contains(t))
        || lower.contains("go ahead")
        || lower.contains("do it")
    {
        return ConfirmIntent::Confirm;
    }
    ConfirmIntent::Unclear
}

/// One choice presented during disambiguation.
#[derive(Debug, Clone)]
pub struct DisambigOption {
    pub label: String,
    pub item_id: Option<String>,
}

/// Match a spoken reply against disambiguation options. Accepts an option
/// number ("the second one" is the reasoner's job; "2" and "option 2" land
/// here) or a substring of the label in either direction.
pub fn match_option(input: &str, options: &[DisambigOption]) -> Option<usize> {
    let lower = input.trim().to_lowercase();
    if lower.is_empty() || options.is_empty() {
        return None;
    }

    // Bare or embedded numeral: "2", "option 2", "number 2 please".
    for token in lower.split(|c: char| !c.is_alphanumeric()) {
        if let Ok(n) = token.parse::<usize>()
            && n >= 1
            && n <= options.len()
        {
            return Some(n - 1);
        }
    }

    // Substring match against the label, both directions.
    options.iter().position(|option| {
        let label = option.label.to_lowercase();
        label.contains(&lower) || lower.contains(&label)
    })
}
