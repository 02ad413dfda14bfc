use crate::llm_client::ChatMessage;
use ontap_core::Action;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant living inside a command palette. \
You can explain passages, rephrase text in a specified tone, or answer questions succinctly. \
During regular conversation, ignore any URL context provided unless the user specifically asks \
about the current page or website.";

/// Words that make an answer request about the page the user is on
const URL_KEYWORDS: [&str; 8] = [
    "page",
    "website",
    "site",
    "url",
    "link",
    "this page",
    "current page",
    "webpage",
];

fn mentions_page(input: &str) -> bool {
    let input = input.to_lowercase();
    URL_KEYWORDS.iter().any(|keyword| input.contains(keyword))
}

/// Builds the system and user messages for one command.
pub fn build_messages(
    action: Action,
    input: &str,
    url: Option<&str>,
    tone: Option<&str>,
) -> Vec<ChatMessage> {
    let user = match action {
        Action::Explain => format!("Explain this text:\n\n{}", input),
        Action::Rephrase => {
            let tone = tone
                .map(|t| format!(" in a '{}' tone", t))
                .unwrap_or_default();
            format!("Rephrase this text{}:\n\n{}", tone, input)
        }
        Action::Answer => {
            let context = match url {
                Some(url) if mentions_page(input) => format!("\n\nContext URL: {}", url),
                _ => String::new(),
            };
            format!("Answer this question:{}\n\n{}", context, input)
        }
    };

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}
