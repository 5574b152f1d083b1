//! Spoken-response templates. Kept as pure functions so the reasoning
//! loop's control flow stays testable without an LLM.

use crate::tools::RiskLevel;

/// Ask the user to confirm a risky action.
pub fn confirmation_prompt(description: &str, risk: RiskLevel) -> String {
    match risk {
        RiskLevel::High => format!(
            "Just to be sure: {description}. Should I go ahead?"
        ),
        _ => format!("{description} — shall I do that?"),
    }
}

pub fn confirmation_ack(description: &str) -> String {
    format!("Done. {description}.")
}

pub fn cancellation_ack() -> String {
    "Okay, I won't do that. Where were we?".to_string()
}

/// The user's reply to a yes/no question was neither.
pub fn unclear_confirmation(description: &str) -> String {
    format!("Sorry, I still need a yes or no: {description}?")
}

/// Present disambiguation options as a numbered spoken list.
pub fn disambiguation_prompt(question: &str, labels: &[String]) -> String {
    let mut out = String::from(question);
    out.push(' ');
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{}: {}", i + 1, label));
    }
    out.push('?');
    out
}

/// The user's choice didn't match any option.
pub fn disambiguation_reprompt(labels: &[String]) -> String {
    let mut out = String::from("I didn't catch which one you meant. Your options are ");
    for (i, label) in labels.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{}: {}", i + 1, label));
    }
    out.push('.');
    out
}

/// A turn arrived while another turn is still running.
pub fn busy_response() -> String {
    "One moment, I'm still finishing that up.".to_string()
}

pub fn didnt_catch() -> String {
    "Sorry, I didn't catch that. Could you say it again?".to_string()
}
