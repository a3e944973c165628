use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::HashMap;

/// Rule-based per-character statistics, aggregated over every dialogue
/// bucket of every scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterStats {
    pub name: String,
    /// Number of spoken lines.
    pub dialogues: usize,
    /// Number of distinct scenes the character speaks in.
    pub stage_time: usize,
    pub lines: Vec<String>,
    pub scenes: Vec<usize>,
    pub first_appearance: usize,
}

/// Pseudo-characters produced by malformed source data.
const EXCLUDED_NAMES: [&str; 2] = ["direction", "type"];

/// Counts dialogue lines, stage time and appearances per character.
/// Output is sorted by dialogue count, descending.
pub fn analyze_character_stats(script: &Script) -> Vec<CharacterStats> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, CharacterStats> = HashMap::new();

    for (scene_idx, scene) in script.scenes.iter().enumerate() {
        let mut scene_characters: BTreeSet<&str> = BTreeSet::new();

        for (_, dialogues) in scene.content.dialogue_buckets() {
            for dialogue in dialogues {
                let name = dialogue.character.as_str();
                if name.is_empty() || EXCLUDED_NAMES.contains(&name) {
                    continue;
                }
                let stats = by_name.entry(name.to_string()).or_insert_with(|| {
                    order.push(name.to_string());
                    CharacterStats {
                        name: name.to_string(),
                        dialogues: 0,
                        stage_time: 0,
                        lines: Vec::new(),
                        scenes: Vec::new(),
                        first_appearance: scene_idx,
                    }
                });
                stats.dialogues += dialogue.lines.len();
                stats.lines.extend(dialogue.lines.iter().cloned());
                if stats.scenes.last() != Some(&scene_idx) {
                    stats.scenes.push(scene_idx);
                }
                scene_characters.insert(name);
            }
        }

        // One stage-time increment per scene, however many lines were spoken.
        for name in scene_characters {
            if let Some(stats) = by_name.get_mut(name) {
                stats.stage_time += 1;
            }
        }
    }

    let mut result: Vec<CharacterStats> = order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect();
    result.sort_by(|a, b| b.dialogues.cmp(&a.dialogues));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use serde_json::json;

    #[test]
    fn test_dialogue_and_stage_time_counts() {
        let script = parse_script(&json!({
            "characters": ["A", "B"],
            "scenes": [
                {
                    "scene_number": 1,
                    "dialogues": [
                        { "character": "A", "lines": ["one", "two"] },
                        { "character": "A", "lines": ["three"] }
                    ]
                },
                {
                    "scene_number": 2,
                    "dialogues": [ { "character": "A", "lines": ["four", "five"] } ],
                    "dialogues_post": [ { "character": "B", "lines": ["six"] } ]
                }
            ]
        }))
        .unwrap();

        let stats = analyze_character_stats(&script);
        let a = stats.iter().find(|s| s.name == "A").unwrap();
        let b = stats.iter().find(|s| s.name == "B").unwrap();

        assert_eq!(a.dialogues, 5);
        assert_eq!(a.stage_time, 2);
        assert_eq!(a.scenes, vec![0, 1]);
        assert_eq!(a.first_appearance, 0);
        assert_eq!(b.dialogues, 1);
        assert_eq!(b.stage_time, 1);
        assert_eq!(b.first_appearance, 1);
    }

    #[test]
    fn test_sorted_by_dialogue_count() {
        let script = parse_script(&json!({
            "scenes": [
                {
                    "dialogues": [
                        { "character": "minor", "lines": ["hi"] },
                        { "character": "lead", "lines": ["a", "b", "c"] }
                    ]
                }
            ]
        }))
        .unwrap();

        let stats = analyze_character_stats(&script);
        assert_eq!(stats[0].name, "lead");
        assert_eq!(stats[1].name, "minor");
    }

    #[test]
    fn test_excludes_pseudo_characters() {
        let script = parse_script(&json!({
            "scenes": [
                {
                    "dialogues": [
                        { "character": "direction", "lines": ["(불이 꺼진다)"] },
                        { "character": "type", "lines": ["junk"] },
                        { "character": "real", "lines": ["줄거리"] }
                    ]
                }
            ]
        }))
        .unwrap();

        let stats = analyze_character_stats(&script);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].name, "real");
    }

    #[test]
    fn test_counts_all_dialogue_buckets() {
        let script = parse_script(&json!({
            "scenes": [
                {
                    "dialogues": [ { "character": "A", "lines": ["1"] } ],
                    "dialogues_post": [ { "character": "A", "lines": ["2"] } ],
                    "dialogues_final": [ { "character": "A", "lines": ["3"] } ],
                    "dialogues_end": [ { "character": "A", "lines": ["4"] } ]
                }
            ]
        }))
        .unwrap();

        let stats = analyze_character_stats(&script);
        assert_eq!(stats[0].dialogues, 4);
        assert_eq!(stats[0].stage_time, 1);
    }
}
