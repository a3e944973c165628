use crate::script::{Direction, Script};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stage-direction keywords signalling an entrance.
const ENTRANCE_KEYWORDS: [&str; 5] = ["등장", "들어온다", "들어와", "나온다", "나와"];
/// Stage-direction keywords signalling an exit.
const EXIT_KEYWORDS: [&str; 4] = ["퇴장", "나간다", "사라진다", "떠난다"];

/// How many words before a keyword are searched for a character name.
const LOOKBEHIND_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Entrance,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Explicit,
    Implicit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    /// Bucket name for explicit triggers, "dialogue" for implicit ones.
    pub source: String,
    pub content: String,
}

/// An inferred entrance or exit, indexed by its position in the scene's
/// movement sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub line_number: usize,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub characters: Vec<String>,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMovements {
    pub scene_id: String,
    /// On-stage set derived from the first direction only.
    pub initial_characters: Vec<String>,
    pub movements: Vec<Movement>,
    /// On-stage set after all movements were applied.
    pub final_characters: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceInterval {
    pub scene_id: String,
    pub duration: Duration,
}

/// Coarse index-based duration marker, not wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Duration {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterTimeline {
    pub character: String,
    pub presence: Vec<PresenceInterval>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementAnalysis {
    pub scenes: Vec<SceneMovements>,
    pub character_timeline: Vec<CharacterTimeline>,
}

/// Derives entrances and exits for every scene and builds the cross-scene
/// presence timeline. Purely rule-based, recomputed per run.
pub fn analyze_character_movements(script: &Script) -> MovementAnalysis {
    let scenes: Vec<SceneMovements> = (0..script.scenes.len())
        .map(|idx| analyze_scene_movements(script, idx))
        .collect();

    let mut timeline: Vec<CharacterTimeline> = script
        .metadata
        .characters
        .iter()
        .map(|name| CharacterTimeline {
            character: name.clone(),
            presence: Vec::new(),
        })
        .collect();

    for scene in &scenes {
        for name in &scene.final_characters {
            let entry = match timeline.iter_mut().find(|t| &t.character == name) {
                Some(entry) => entry,
                None => {
                    // The LLM-free path can still surface speakers missing
                    // from the declared character list.
                    timeline.push(CharacterTimeline {
                        character: name.clone(),
                        presence: Vec::new(),
                    });
                    timeline.last_mut().unwrap()
                }
            };
            entry.presence.push(PresenceInterval {
                scene_id: scene.scene_id.clone(),
                duration: Duration {
                    start: "0".to_string(),
                    end: scene.movements.len().to_string(),
                },
            });
        }
    }

    MovementAnalysis {
        scenes,
        character_timeline: timeline,
    }
}

/// On-stage set state machine for one scene.
struct SceneState<'a> {
    known_characters: &'a [String],
    on_stage: HashSet<String>,
    /// Insertion order of the on-stage set, for stable output.
    stage_order: Vec<String>,
    movements: Vec<Movement>,
}

impl<'a> SceneState<'a> {
    fn new(known_characters: &'a [String]) -> Self {
        Self {
            known_characters,
            on_stage: HashSet::new(),
            stage_order: Vec::new(),
            movements: Vec::new(),
        }
    }

    fn add_to_stage(&mut self, name: &str) {
        if self.on_stage.insert(name.to_string()) {
            self.stage_order.push(name.to_string());
        }
    }

    fn remove_from_stage(&mut self, name: &str) {
        if self.on_stage.remove(name) {
            self.stage_order.retain(|n| n != name);
        }
    }

    fn record(&mut self, movement_type: MovementType, characters: Vec<String>, trigger: Trigger) {
        if characters.is_empty() {
            return;
        }
        for name in &characters {
            match movement_type {
                MovementType::Entrance => self.add_to_stage(name),
                MovementType::Exit => self.remove_from_stage(name),
            }
        }
        self.movements.push(Movement {
            line_number: self.movements.len(),
            movement_type,
            characters,
            trigger,
        });
    }

    fn scan_direction(&mut self, direction: &Direction, source: &str) {
        let content = direction.text().to_string();
        let entrances = extract_by_keywords(&content, &ENTRANCE_KEYWORDS, self.known_characters);
        let exits = extract_by_keywords(&content, &EXIT_KEYWORDS, self.known_characters);

        if !entrances.is_empty() {
            self.record(
                MovementType::Entrance,
                entrances,
                Trigger {
                    trigger_type: TriggerType::Explicit,
                    source: source.to_string(),
                    content: content.clone(),
                },
            );
        }
        if !exits.is_empty() {
            self.record(
                MovementType::Exit,
                exits,
                Trigger {
                    trigger_type: TriggerType::Explicit,
                    source: source.to_string(),
                    content,
                },
            );
        }
    }

    fn current_stage(&self) -> Vec<String> {
        self.stage_order.clone()
    }
}

fn analyze_scene_movements(script: &Script, scene_idx: usize) -> SceneMovements {
    let scene = &script.scenes[scene_idx];
    let known = &script.metadata.characters;
    let mut state = SceneState::new(known);

    // Characters named in the opening direction are assumed present.
    if let Some(first) = scene.content.directions.first() {
        for name in extract_characters(first.text(), known) {
            state.add_to_stage(&name);
        }
    }
    let initial_characters = state.current_stage();

    for (source, directions) in scene.content.direction_buckets() {
        for direction in directions {
            state.scan_direction(direction, source);
        }
    }

    for (_, dialogues) in scene.content.dialogue_buckets() {
        for dialogue in dialogues {
            // Pre-directions may carry the entrance cue for this speaker.
            for direction in &dialogue.pre_directions {
                state.scan_direction(direction, "dialogue_direction");
            }

            let speaker = &dialogue.character;
            if speaker.is_empty() || state.on_stage.contains(speaker) {
                continue;
            }
            let first_line = dialogue.lines.first().map(String::as_str).unwrap_or("");
            let content = format!("{}의 첫 대사: {}", speaker, first_line);
            state.record(
                MovementType::Entrance,
                vec![speaker.clone()],
                Trigger {
                    trigger_type: TriggerType::Implicit,
                    source: "dialogue".to_string(),
                    content,
                },
            );
        }
    }

    SceneMovements {
        scene_id: scene.scene_number.to_string(),
        initial_characters,
        final_characters: state.current_stage(),
        movements: state.movements,
    }
}

/// Known character names occurring as whitespace-separated tokens.
fn extract_characters(text: &str, known: &[String]) -> Vec<String> {
    let mut found = Vec::new();
    for word in text.split_whitespace() {
        if known.iter().any(|name| name == word) && !found.contains(&word.to_string()) {
            found.push(word.to_string());
        }
    }
    found
}

/// For every word containing one of `keywords`, searches up to
/// [`LOOKBEHIND_WORDS`] preceding words for known character names.
fn extract_by_keywords(text: &str, keywords: &[&str], known: &[String]) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut found: Vec<String> = Vec::new();

    for (idx, word) in words.iter().enumerate() {
        if !keywords.iter().any(|kw| word.contains(kw)) {
            continue;
        }
        let start = idx.saturating_sub(LOOKBEHIND_WORDS);
        for prev in &words[start..idx] {
            if known.iter().any(|name| name == prev) && !found.contains(&prev.to_string()) {
                found.push(prev.to_string());
            }
        }
        // "민수 등장" style: the name may be fused with a particle, so also
        // accept a keyword-bearing word whose preceding token is the name.
        if let Some(name) = known.iter().find(|name| word.starts_with(name.as_str())) {
            if !found.contains(name) {
                found.push(name.clone());
            }
        }
    }
    found
}
