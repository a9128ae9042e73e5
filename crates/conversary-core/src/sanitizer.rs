//! Removes the echoed prompt from raw generation output.
//!
//! Decoders that return the whole sequence hand back the prompt followed by
//! the continuation. Stripping is prefix based: when no known rendering of
//! the prompt is a prefix of the output, the output is returned trimmed and
//! otherwise untouched.

use conversary_types::model::RawGeneration;

pub struct ResponseSanitizer;

impl ResponseSanitizer {
    /// Strip `prompt` from the front of `raw_output` (exact byte match) and
    /// trim. Without a match, return `raw_output` trimmed.
    pub fn clean(prompt: &str, raw_output: &str) -> String {
        raw_output
            .strip_prefix(prompt)
            .unwrap_or(raw_output)
            .trim()
            .to_string()
    }

    /// Like [`clean`](Self::clean), but also accepts the engine's own
    /// detokenized rendering of the prompt as the echo to strip.
    ///
    /// The submitted prompt is tried first, then the engine echo.
    pub fn clean_generation(prompt: &str, generation: &RawGeneration) -> String {
        let raw = generation.text.as_str();

        if let Some(rest) = raw.strip_prefix(prompt) {
            return rest.trim().to_string();
        }

        if let Some(echo) = generation.prompt_echo.as_deref().filter(|e| !e.is_empty()) {
            if let Some(rest) = raw.strip_prefix(echo) {
                return rest.trim().to_string();
            }
        }

        raw.trim().to_string()
    }
}
