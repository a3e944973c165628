/// Extracts the JSON payload from a raw LLM reply.
///
/// Strips markdown heading lines (`### ...`), triple-backtick fences (with or
/// without a `json` tag), trims, then slices from the first `{` to the last
/// `}` to drop trailing commentary. Parsing is the caller's job; this only
/// returns a string. Idempotent on already-clean JSON.
pub fn clean_json_response(response: &str) -> String {
    let mut cleaned: String = response
        .lines()
        .filter(|line| !line.trim_start().starts_with("###"))
        .collect::<Vec<_>>()
        .join("\n");

    cleaned = cleaned.replace("```json", "").replace("```", "");
    let cleaned = cleaned.trim();

    match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start <= end => cleaned[start..=end].to_string(),
        _ => cleaned.to_string(),
    }
}
