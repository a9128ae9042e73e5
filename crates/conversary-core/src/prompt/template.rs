//! Compiled prompt templates.
//!
//! The system instruction is used verbatim. The user template must contain
//! exactly one `{{ user_message }}` placeholder (whitespace inside the braces
//! is optional); it is split around that placeholder once, at startup, so
//! rendering never has to fail.

use conversary_types::error::PromptRenderError;

pub const USER_MESSAGE_PLACEHOLDER: &str = "{{ user_message }}";

pub const BUILTIN_SYSTEM: &str = include_str!("../../templates/system_prompt.txt");
pub const BUILTIN_USER: &str = include_str!("../../templates/user_prompt.txt");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    system: String,
    user_prefix: String,
    user_suffix: String,
}

impl PromptTemplates {
    /// Compile a system instruction and a user template.
    ///
    /// Both are trimmed of surrounding whitespace before use.
    pub fn compile(system: &str, user: &str) -> Result<Self, PromptRenderError> {
        let user = user.trim();
        let spans = placeholder_spans(user);

        let (start, end) = match spans.as_slice() {
            [] => {
                return Err(PromptRenderError::MissingPlaceholder {
                    template: "user",
                    placeholder: USER_MESSAGE_PLACEHOLDER,
                });
            }
            [span] => *span,
            many => {
                return Err(PromptRenderError::DuplicatePlaceholder {
                    template: "user",
                    placeholder: USER_MESSAGE_PLACEHOLDER,
                    count: many.len(),
                });
            }
        };

        Ok(Self {
            system: system.trim().to_string(),
            user_prefix: user[..start].to_string(),
            user_suffix: user[end..].to_string(),
        })
    }

    /// Templates shipped with the binary.
    pub fn builtin() -> Result<Self, PromptRenderError> {
        Self::compile(BUILTIN_SYSTEM, BUILTIN_USER)
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// The user template with `user_message` substituted verbatim.
    pub fn user_block(&self, user_message: &str) -> String {
        let mut block =
            String::with_capacity(self.user_prefix.len() + user_message.len() + self.user_suffix.len());
        block.push_str(&self.user_prefix);
        block.push_str(user_message);
        block.push_str(&self.user_suffix);
        block
    }
}

/// Byte ranges of every `{{ user_message }}` occurrence in `template`.
fn placeholder_spans(template: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(open) = template[cursor..].find("{{") {
        let open = cursor + open;
        let Some(close) = template[open + 2..].find("}}") else {
            break;
        };
        let close = open + 2 + close;

        if template[open + 2..close].trim() == "user_message" {
            spans.push((open, close + 2));
        }
        cursor = close + 2;
    }

    spans
}
