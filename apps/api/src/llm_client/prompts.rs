// Cross-cutting prompt fragments shared by every LLM caller.
// Feature-specific prompts live next to the feature (e.g. valuation/prompts.rs).

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Joins a feature system prompt with the JSON-only fragment.
pub fn json_system(system: &str) -> String {
    format!("{system}\n\n{JSON_ONLY_SYSTEM}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_system_appends_fragment() {
        let system = json_system("You are an appraiser.");
        assert!(system.starts_with("You are an appraiser."));
        assert!(system.ends_with(JSON_ONLY_SYSTEM));
    }
}
