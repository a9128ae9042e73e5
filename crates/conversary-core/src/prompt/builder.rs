//! Prompt builder for the response pipeline.
//!
//! Layout:
//! ```text
//! {system instruction}
//!
//! Previous conversation:        <- only when history is non-empty
//! User: {user_text}
//! AI: {ai_text}
//! ...
//!
//! {user template with the message substituted}
//! ```
//!
//! User text is substituted verbatim, both in the history block and in the
//! user template. Rendering is a pure function of its inputs.

use conversary_types::conversation::{Exchange, HISTORY_WINDOW_SIZE};

use super::template::PromptTemplates;

pub const HISTORY_HEADER: &str = "Previous conversation:";

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: PromptTemplates,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// Render the full prompt for `user_message`.
    ///
    /// `history` is ordered oldest to newest; only its last
    /// [`HISTORY_WINDOW_SIZE`] exchanges are rendered.
    pub fn render(&self, user_message: &str, history: &[Exchange]) -> String {
        let recent = &history[history.len().saturating_sub(HISTORY_WINDOW_SIZE)..];

        let mut prompt = String::new();
        prompt.push_str(self.templates.system());
        prompt.push_str("\n\n");

        if !recent.is_empty() {
            prompt.push_str(HISTORY_HEADER);
            prompt.push('\n');
            let lines: Vec<String> = recent
                .iter()
                .map(|exchange| {
                    format!("User: {}\nAI: {}", exchange.user_text(), exchange.ai_text())
                })
                .collect();
            prompt.push_str(&lines.join("\n"));
            prompt.push_str("\n\n");
        }

        prompt.push_str(&self.templates.user_block(user_message));
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(
            PromptTemplates::compile("You are helpful.", "User: {{ user_message }}\nAI:").unwrap(),
        )
    }

    fn history(n: usize) -> Vec<Exchange> {
        (0..n)
            .map(|i| Exchange::new(format!("q{i}"), format!("a{i}")))
            .collect()
    }

    fn history_lines(prompt: &str) -> Vec<&str> {
        prompt
            .lines()
            .skip_while(|line| *line != HISTORY_HEADER)
            .skip(1)
            .take_while(|line| !line.is_empty())
            .collect()
    }

    #[test]
    fn test_short_history_renders_every_pair_in_order() {
        for n in 1..=HISTORY_WINDOW_SIZE {
            let prompt = builder().render("now", &history(n));
            let lines = history_lines(&prompt);
            assert_eq!(lines.len(), n * 2, "history of {n}");
            for (i, pair) in lines.chunks(2).enumerate() {
                assert_eq!(pair[0], format!("User: q{i}"));
                assert_eq!(pair[1], format!("AI: a{i}"));
            }
        }
    }

    #[test]
    fn test_long_history_keeps_most_recent_ten() {
        let prompt = builder().render("now", &history(14));
        let lines = history_lines(&prompt);
        assert_eq!(lines.len(), HISTORY_WINDOW_SIZE * 2);
        assert_eq!(lines[0], "User: q4");
        assert_eq!(lines[lines.len() - 1], "AI: a13");
        assert!(!prompt.contains("User: q3\n"));
    }

    #[test]
    fn test_empty_history_omits_header() {
        let prompt = builder().render("", &[]);
        assert!(!prompt.contains(HISTORY_HEADER));
        assert_eq!(prompt, "You are helpful.\n\nUser: \nAI:");
    }

    #[test]
    fn test_render_is_idempotent() {
        let builder = builder();
        let history = history(4);
        let first = builder.render("same input", &history);
        let second = builder.render("same input", &history);
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_remembers_name_scenario() {
        let history = vec![Exchange::new(
            "My name is Johnson",
            "Nice to meet you, Johnson.",
        )];
        let prompt = builder().render("What is my name?", &history);

        let expected_tail = "User: What is my name?\nAI:";
        assert!(prompt.ends_with(expected_tail));

        let earlier = prompt.find("User: My name is Johnson").unwrap();
        let user_block = prompt.rfind(expected_tail).unwrap();
        assert!(earlier < user_block);
        assert!(prompt.contains("\nAI: Nice to meet you, Johnson.\n"));
    }

    #[test]
    fn test_exact_layout_with_history() {
        let prompt = builder().render("and you?", &history(1));
        assert_eq!(
            prompt,
            "You are helpful.\n\nPrevious conversation:\nUser: q0\nAI: a0\n\nUser: and you?\nAI:"
        );
    }
}
