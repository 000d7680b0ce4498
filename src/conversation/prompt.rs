//! Prompt and assistant message construction

use crate::generation::GenerationFailure;

/// Fixed assistant persona prepended to every prompt
pub const PERSONA: &str =
    "You are a friendly and helpful data science assistant. Your name is Gemini.";

/// First assistant message once the summary is loaded
pub const OPENING_GREETING: &str = "Hi there! I've successfully loaded and summarized your data. \
I'm your personal data assistant. To make things a bit more friendly, what should I call you?";

/// Assistant message when the startup summary fetch fails
pub const SUMMARY_UNAVAILABLE: &str =
    "Sorry, I couldn't load the data summary. Please go back and upload a file again.";

/// Assistant message when a question arrives before any summary exists
pub const SUMMARY_MISSING: &str = "I don't have a summary of your data yet, so I can't answer \
questions about it. Please upload a CSV file and restart the dashboard.";

/// Assistant message when suggestions are asked for before the name
pub const NAME_FIRST: &str =
    "Before I suggest anything, please tell me what I should call you.";

/// Assistant message when suggestion generation fails
pub const SUGGESTIONS_UNAVAILABLE: &str = "Sorry, I couldn't generate suggestions at the moment.";

/// Greeting fired by the name transition
#[must_use]
pub fn welcome(user_name: &str) -> String {
    format!("Great to meet you, {user_name}! How can I assist you with your data today?")
}

/// Prompt for a question about the dataset
#[must_use]
pub fn answer_prompt(user_name: &str, summary_json: &str, question: &str) -> String {
    format!(
        "{PERSONA} The user, named {user_name}, has uploaded a dataset with this summary: \
{summary_json}. The user's request is: \"{question}\". Please provide a concise, helpful, and \
easy-to-understand response. If you suggest code, use Python."
    )
}

/// Prompt asking for starter analyses
#[must_use]
pub fn suggestions_prompt(user_name: &str, summary_json: &str) -> String {
    format!(
        "{PERSONA} The user, named {user_name}, has just uploaded a dataset. The summary of this \
dataset is: {summary_json}. Based on this, provide a short, conversational list of 3-4 possible \
questions or tasks a data analyst might perform to begin exploring this data. Frame the \
suggestions as things the user can ask you to do, such as \"Can you show me the average of \
[column name]?\""
    )
}

/// Human-readable diagnostic for a failed generation turn
#[must_use]
pub fn failure_message(failure: &GenerationFailure) -> String {
    let hint = if failure.is_auth() {
        "The generation service rejected the request; \
         please ensure your API key is correctly configured."
    } else if failure.is_network() {
        "I couldn't reach the generation service; please check your network connection."
    } else {
        "The generation service returned something unexpected."
    };

    format!("Sorry, I'm having trouble answering right now. {hint} Error: {failure}")
}
