use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Canonical in-memory script. Produced by [`parse_script`], never built by hand.
#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub metadata: Metadata,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub characters: Vec<String>,
    pub stage: Stage,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub id: usize,
    pub scene_number: i64,
    pub content: SceneContent,
    /// Total addressable lines across all eight buckets.
    pub total_lines: usize,
}

/// The eight ordered content buckets of a scene. Bucket order encodes the
/// temporal sequence within the scene: early, post, final, end.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneContent {
    pub directions: Vec<Direction>,
    pub dialogues: Vec<Dialogue>,
    pub directions_post: Vec<Direction>,
    pub dialogues_post: Vec<Dialogue>,
    pub directions_final: Vec<Direction>,
    pub dialogues_final: Vec<Dialogue>,
    pub directions_end: Vec<Direction>,
    pub dialogues_end: Vec<Dialogue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Direction {
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Direction {
    /// Primary text, falling back to the type label when content is absent.
    pub fn text(&self) -> &str {
        if self.content.is_empty() {
            self.kind.as_deref().unwrap_or("")
        } else {
            &self.content
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dialogue {
    pub character: String,
    pub lines: Vec<String>,
    pub pre_directions: Vec<Direction>,
}

impl Dialogue {
    /// Lines this dialogue occupies in the addressing scheme: one per
    /// pre-direction plus one per spoken line.
    pub fn line_count(&self) -> usize {
        self.pre_directions.len() + self.lines.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Directions,
    Dialogues,
    DirectionsPost,
    DialoguesPost,
    DirectionsFinal,
    DialoguesFinal,
    DirectionsEnd,
    DialoguesEnd,
}

impl Bucket {
    pub const ALL: [Bucket; 8] = [
        Bucket::Directions,
        Bucket::Dialogues,
        Bucket::DirectionsPost,
        Bucket::DialoguesPost,
        Bucket::DirectionsFinal,
        Bucket::DialoguesFinal,
        Bucket::DirectionsEnd,
        Bucket::DialoguesEnd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Bucket::Directions => "directions",
            Bucket::Dialogues => "dialogues",
            Bucket::DirectionsPost => "directions_post",
            Bucket::DialoguesPost => "dialogues_post",
            Bucket::DirectionsFinal => "directions_final",
            Bucket::DialoguesFinal => "dialogues_final",
            Bucket::DirectionsEnd => "directions_end",
            Bucket::DialoguesEnd => "dialogues_end",
        }
    }
}

/// A view into one bucket of a scene.
pub enum BucketRef<'a> {
    Directions(&'a [Direction]),
    Dialogues(&'a [Dialogue]),
}

impl<'a> BucketRef<'a> {
    pub fn line_count(&self) -> usize {
        match self {
            BucketRef::Directions(dirs) => dirs.len(),
            BucketRef::Dialogues(dias) => dias.iter().map(Dialogue::line_count).sum(),
        }
    }
}

impl SceneContent {
    pub fn bucket(&self, bucket: Bucket) -> BucketRef<'_> {
        match bucket {
            Bucket::Directions => BucketRef::Directions(&self.directions),
            Bucket::Dialogues => BucketRef::Dialogues(&self.dialogues),
            Bucket::DirectionsPost => BucketRef::Directions(&self.directions_post),
            Bucket::DialoguesPost => BucketRef::Dialogues(&self.dialogues_post),
            Bucket::DirectionsFinal => BucketRef::Directions(&self.directions_final),
            Bucket::DialoguesFinal => BucketRef::Dialogues(&self.dialogues_final),
            Bucket::DirectionsEnd => BucketRef::Directions(&self.directions_end),
            Bucket::DialoguesEnd => BucketRef::Dialogues(&self.dialogues_end),
        }
    }

    /// All buckets in canonical temporal order.
    pub fn buckets(&self) -> impl Iterator<Item = (Bucket, BucketRef<'_>)> {
        Bucket::ALL.into_iter().map(move |b| (b, self.bucket(b)))
    }

    /// Direction buckets only, in canonical order, paired with their names.
    pub fn direction_buckets(&self) -> impl Iterator<Item = (&'static str, &[Direction])> {
        self.buckets().filter_map(|(b, r)| match r {
            BucketRef::Directions(dirs) => Some((b.name(), dirs)),
            BucketRef::Dialogues(_) => None,
        })
    }

    /// Dialogue buckets only, in canonical order.
    pub fn dialogue_buckets(&self) -> impl Iterator<Item = (&'static str, &[Dialogue])> {
        self.buckets().filter_map(|(b, r)| match r {
            BucketRef::Dialogues(dias) => Some((b.name(), dias)),
            BucketRef::Directions(_) => None,
        })
    }

    pub fn total_lines(&self) -> usize {
        self.buckets().map(|(_, r)| r.line_count()).sum()
    }
}

// --- Raw ingestion ---
//
// Two schemas exist in the wild: the bucketed `scenes` shape and a legacy
// flat `script` array. Both normalize into the canonical Script here, at the
// boundary, so downstream code never branches on the source shape.

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScript {
    Bucketed(RawBucketedScript),
    Flat(RawFlatScript),
}

#[derive(Deserialize)]
struct RawBucketedScript {
    #[serde(default)]
    characters: Vec<String>,
    #[serde(default)]
    stage: Option<RawStage>,
    scenes: Vec<RawScene>,
}

#[derive(Deserialize)]
struct RawStage {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, Default)]
struct RawScene {
    #[serde(default)]
    scene_number: Option<i64>,
    #[serde(default)]
    directions: Vec<Direction>,
    #[serde(default)]
    dialogues: Vec<RawDialogue>,
    #[serde(default)]
    directions_post: Vec<Direction>,
    #[serde(default)]
    dialogues_post: Vec<RawDialogue>,
    #[serde(default)]
    directions_final: Vec<Direction>,
    #[serde(default)]
    dialogues_final: Vec<RawDialogue>,
    #[serde(default)]
    directions_end: Vec<Direction>,
    #[serde(default)]
    dialogues_end: Vec<RawDialogue>,
}

#[derive(Deserialize, Default)]
struct RawDialogue {
    #[serde(default)]
    character: String,
    #[serde(default)]
    lines: Vec<String>,
    /// Legacy single-line form.
    #[serde(default)]
    dialogue: Option<String>,
    #[serde(default)]
    pre_directions: Vec<Direction>,
}

impl RawDialogue {
    fn normalize(self) -> Dialogue {
        let lines = if self.lines.is_empty() {
            self.dialogue.into_iter().collect()
        } else {
            self.lines
        };
        Dialogue {
            character: self.character,
            lines,
            pre_directions: self.pre_directions,
        }
    }
}

#[derive(Deserialize)]
struct RawFlatScript {
    #[serde(default)]
    characters: Vec<String>,
    script: Vec<RawFlatItem>,
}

#[derive(Deserialize, Default)]
struct RawFlatItem {
    #[serde(default)]
    character: Option<String>,
    #[serde(default)]
    dialogue: Option<String>,
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Legacy flat scripts carry no scene boundaries. Items are grouped into
/// fixed-size pseudo-scenes so the rest of the pipeline can stay scene-based.
const FLAT_SCENE_GROUP: usize = 10;

/// Normalizes a raw script JSON value into the canonical [`Script`].
///
/// Missing optional fields default to empty; a top-level shape mismatch is
/// the only error path.
pub fn parse_script(raw: &serde_json::Value) -> Result<Script> {
    let raw: RawScript =
        serde_json::from_value(raw.clone()).context("unrecognized script schema")?;

    match raw {
        RawScript::Bucketed(script) => {
            let scenes = script
                .scenes
                .into_iter()
                .enumerate()
                .map(|(index, scene)| {
                    let content = SceneContent {
                        directions: scene.directions,
                        dialogues: normalize_dialogues(scene.dialogues),
                        directions_post: scene.directions_post,
                        dialogues_post: normalize_dialogues(scene.dialogues_post),
                        directions_final: scene.directions_final,
                        dialogues_final: normalize_dialogues(scene.dialogues_final),
                        directions_end: scene.directions_end,
                        dialogues_end: normalize_dialogues(scene.dialogues_end),
                    };
                    let total_lines = content.total_lines();
                    Scene {
                        id: index,
                        scene_number: scene.scene_number.unwrap_or(index as i64 + 1),
                        content,
                        total_lines,
                    }
                })
                .collect();

            Ok(Script {
                metadata: Metadata {
                    characters: script.characters,
                    stage: Stage {
                        description: script.stage.map(|s| s.description).unwrap_or_default(),
                    },
                },
                scenes,
            })
        }
        RawScript::Flat(script) => {
            let mut scenes: Vec<Scene> = Vec::new();
            for (index, group) in script.script.chunks(FLAT_SCENE_GROUP).enumerate() {
                let mut content = SceneContent::default();
                for item in group {
                    match item.character.as_deref() {
                        Some(character) if character != "direction" => {
                            let lines = if item.lines.is_empty() {
                                item.dialogue.clone().into_iter().collect()
                            } else {
                                item.lines.clone()
                            };
                            content.dialogues.push(Dialogue {
                                character: character.to_string(),
                                lines,
                                pre_directions: Vec::new(),
                            });
                        }
                        _ => {
                            let text = item
                                .content
                                .clone()
                                .or_else(|| item.dialogue.clone())
                                .unwrap_or_default();
                            content.directions.push(Direction {
                                content: text,
                                kind: None,
                            });
                        }
                    }
                }
                let total_lines = content.total_lines();
                scenes.push(Scene {
                    id: index,
                    scene_number: index as i64 + 1,
                    content,
                    total_lines,
                });
            }

            Ok(Script {
                metadata: Metadata {
                    characters: script.characters,
                    stage: Stage {
                        description: String::new(),
                    },
                },
                scenes,
            })
        }
    }
}

fn normalize_dialogues(raw: Vec<RawDialogue>) -> Vec<Dialogue> {
    raw.into_iter().map(RawDialogue::normalize).collect()
}

impl Script {
    /// 1-based line number of an item, counted across the whole script.
    ///
    /// All eight buckets of every preceding scene contribute their full
    /// extent; within the target bucket, a direction is addressed by its
    /// index and a dialogue by the line following its pre-directions
    /// (`line_idx` selects a specific spoken line).
    pub fn line_number(
        &self,
        scene_idx: usize,
        bucket: Bucket,
        item_idx: usize,
        line_idx: Option<usize>,
    ) -> usize {
        let mut current = 1usize;
        for scene in &self.scenes[..scene_idx.min(self.scenes.len())] {
            current += scene.total_lines;
        }
        let Some(scene) = self.scenes.get(scene_idx) else {
            return current;
        };

        for (b, r) in scene.content.buckets() {
            if b != bucket {
                current += r.line_count();
                continue;
            }
            match r {
                BucketRef::Directions(_) => return current + item_idx,
                BucketRef::Dialogues(dias) => {
                    for dialogue in dias.iter().take(item_idx) {
                        current += dialogue.line_count();
                    }
                    if let Some(dialogue) = dias.get(item_idx) {
                        current += dialogue.pre_directions.len();
                    }
                    return current + line_idx.unwrap_or(0);
                }
            }
        }
        current
    }
}

/// Korean section headers for the numbered prompt rendering of a scene.
fn bucket_header(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Directions => "# 초반 지시문",
        Bucket::Dialogues => "# 대사",
        Bucket::DirectionsPost => "# 후반 지시문",
        Bucket::DialoguesPost => "# 후반 대사",
        Bucket::DirectionsFinal => "# 최종 지시문",
        Bucket::DialoguesFinal => "# 최종 대사",
        Bucket::DirectionsEnd => "# 마지막 지시문",
        Bucket::DialoguesEnd => "# 마지막 대사",
    }
}

/// A scene rendered as numbered text for LLM prompts. Line numbers use the
/// same scheme as [`Script::line_number`] and `Scene::total_lines`, so unit
/// ranges the LLM reports map directly back onto the scene.
pub struct FormattedScene {
    pub text: String,
    pub total_lines: usize,
}

pub fn format_scene_content(scene: &Scene) -> FormattedScene {
    let mut out: Vec<String> = Vec::new();
    let mut line = 1usize;

    for (bucket, content) in scene.content.buckets() {
        match content {
            BucketRef::Directions(dirs) => {
                if dirs.is_empty() {
                    continue;
                }
                out.push(bucket_header(bucket).to_string());
                for dir in dirs {
                    out.push(format!("{}. ({})", line, dir.text()));
                    line += 1;
                }
            }
            BucketRef::Dialogues(dias) => {
                if dias.is_empty() {
                    continue;
                }
                out.push(bucket_header(bucket).to_string());
                for dialogue in dias {
                    for dir in &dialogue.pre_directions {
                        out.push(format!("{}. ({})", line, dir.text()));
                        line += 1;
                    }
                    for spoken in &dialogue.lines {
                        out.push(format!("{}. {}: {}", line, dialogue.character, spoken));
                        line += 1;
                    }
                }
            }
        }
    }

    FormattedScene {
        text: out.join("\n"),
        total_lines: line - 1,
    }
}
