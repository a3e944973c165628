use crate::chunk::split_text_into_chunks;
use crate::config::AnalysisConfig;
use crate::llm::{ChatOptions, LlmClient};
use crate::movement::{analyze_character_movements, PresenceInterval};
use crate::prompts;
use crate::sanitize::clean_json_response;
use crate::script::{format_scene_content, Scene, Script};
use crate::stats::{analyze_character_stats, CharacterStats};
use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Analysis result types ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneMetadata {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConnection {
    #[serde(default)]
    pub target_scene_id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// Scene-level analysis as returned by the LLM, before units are merged in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseSceneAnalysis {
    #[serde(default)]
    pub metadata: SceneMetadata,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub connections: Vec<SceneConnection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Entrance,
    Exit,
    Conversation,
    Action,
    Event,
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::Conversation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Setup,
    Rising,
    Climax,
    Falling,
}

impl Default for Significance {
    fn default() -> Self {
        Significance::Setup
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitCharacter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub emotion: String,
}

/// A dramaturgically coherent sub-segment of a scene, with its line range
/// clamped to the scene's real extent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    pub characters: Vec<UnitCharacter>,
    pub description: String,
    pub significance: Significance,
    pub dialogue_topics: Vec<String>,
    pub situation_change: String,
    pub mood: String,
}

/// Unit as the LLM reports it: line numbers may be strings, numbers, out of
/// range or missing entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUnit {
    #[serde(default)]
    id: String,
    #[serde(default)]
    start_line: Value,
    #[serde(default)]
    end_line: Value,
    #[serde(rename = "type", default)]
    unit_type: UnitType,
    #[serde(default)]
    characters: Vec<UnitCharacter>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    significance: Significance,
    #[serde(default)]
    dialogue_topics: Vec<String>,
    #[serde(default)]
    situation_change: String,
    #[serde(default)]
    mood: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawUnitAnalysis {
    #[serde(default)]
    units: Vec<RawUnit>,
}

/// Base analysis and unit decomposition merged into one record. The merge is
/// explicit field-by-field: base analysis owns everything except `units`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysis {
    pub metadata: SceneMetadata,
    pub summary: String,
    pub themes: Vec<String>,
    pub symbols: Vec<String>,
    pub connections: Vec<SceneConnection>,
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneAnalysisRecord {
    pub scene_id: usize,
    pub analysis: SceneAnalysis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlotStructure {
    #[serde(default)]
    pub main_plot: String,
    #[serde(default)]
    pub sub_plots: Vec<String>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub structure: PlotStages,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlotStages {
    #[serde(default)]
    pub exposition: String,
    #[serde(default)]
    pub development: String,
    #[serde(default)]
    pub climax: String,
    #[serde(default)]
    pub conclusion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotAnalysis {
    pub plot_structure: PlotStructure,
    pub scene_analyses: Vec<SceneAnalysisRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageArea {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    #[serde(default)]
    pub scene: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageElement {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub element_type: String,
    #[serde(default)]
    pub first_appearance: String,
    #[serde(default)]
    pub related_characters: Vec<String>,
    #[serde(default)]
    pub state_changes: Vec<StateChange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageAnalysis {
    #[serde(default)]
    pub main_background: String,
    #[serde(default)]
    pub areas: Vec<StageArea>,
}

/// Supplementary fixtures/props extraction. Failures never propagate; the
/// empty default stands in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsAnalysis {
    pub stage: StageAnalysis,
    pub fixtures: Vec<StageElement>,
    pub props: Vec<StageElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraitAnalysis {
    pub character: String,
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteCharacterAnalysis {
    #[serde(flatten)]
    pub stats: CharacterStats,
    pub movements: Vec<PresenceInterval>,
    pub traits: Option<String>,
}

// --- Analyzer ---

/// LLM-backed analyses over a parsed script. The client handle is injected
/// so tests can substitute a mock completion service.
pub struct Analyzer<'a> {
    llm: &'a dyn LlmClient,
    analysis: AnalysisConfig,
}

impl<'a> Analyzer<'a> {
    pub fn new(llm: &'a dyn LlmClient, analysis: &AnalysisConfig) -> Self {
        Self {
            llm,
            analysis: analysis.clone(),
        }
    }

    fn chat_opts(&self) -> ChatOptions {
        ChatOptions {
            temperature: self.analysis.temperature,
            max_tokens: self.analysis.max_tokens,
            json: false,
        }
    }

    /// Chunked scene-style analysis: the first chunk carries the full
    /// instructional prompt, later chunks a continuation directive. Chunks
    /// are strictly sequential since each one textually continues the last;
    /// raw outputs are concatenated with newlines and parsed downstream.
    pub async fn analyze_scene_text(&self, content: &str, prompt: &str) -> Result<String> {
        let chunks = split_text_into_chunks(content, self.analysis.chunk_size);
        let mut combined = String::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let chunk_prompt = if idx == 0 {
                prompt
            } else {
                prompts::CONTINUATION_PROMPT
            };
            let user = format!("{}\n\n{}", chunk_prompt, chunk);
            let response = self
                .llm
                .chat(prompts::SCENE_SYSTEM_MESSAGE, &user, self.chat_opts())
                .await?;
            if idx > 0 {
                combined.push('\n');
            }
            combined.push_str(&response);
        }
        Ok(combined)
    }

    /// Whole-document analysis with incremental merge: an explicit fold over
    /// chunks. The accumulator is the parsed JSON of the first chunk; every
    /// later chunk is analyzed against the serialized accumulator and its
    /// `fixtures`/`props`/`stage.areas` arrays are concatenated in. A chunk
    /// whose reply does not parse aborts the whole analysis.
    pub async fn analyze_text(&self, prompt: &str, content: &str) -> Result<Value> {
        let chunks = split_text_into_chunks(content, self.analysis.chunk_size);
        let Some(first) = chunks.first() else {
            anyhow::bail!("no content to analyze");
        };

        let user = format!("{}\n\n{}", prompt, first);
        let response = self
            .llm
            .chat(prompts::TEXT_SYSTEM_MESSAGE, &user, self.chat_opts())
            .await?;
        let mut accumulated: Value = serde_json::from_str(&clean_json_response(&response))
            .context("initial analysis chunk returned unparseable JSON")?;

        for chunk in &chunks[1..] {
            let user = format!(
                "이전 분석 결과를 기반으로 추가 내용을 분석하여 기존 결과를 보강해주세요.\n기존 분석 결과:\n{}\n\n추가 내용:\n{}",
                serde_json::to_string_pretty(&accumulated)?,
                chunk
            );
            let response = self
                .llm
                .chat(prompts::INCREMENTAL_SYSTEM_MESSAGE, &user, self.chat_opts())
                .await?;
            let incremental: Value = serde_json::from_str(&clean_json_response(&response))
                .context("incremental analysis chunk returned unparseable JSON")?;
            accumulated = merge_incremental(accumulated, incremental);
        }

        Ok(accumulated)
    }

    /// Scene base analysis + unit decomposition, merged into one record.
    /// Unit line ranges are clamped to the scene's extent; either call
    /// failing (transport or parse) fails the whole scene.
    pub async fn analyze_scene_details(&self, scene: &Scene) -> Result<SceneAnalysisRecord> {
        let formatted = format_scene_content(scene);

        let base_raw = self
            .analyze_scene_text(&formatted.text, prompts::SCENE_ANALYSIS_PROMPT)
            .await?;
        let unit_prompt = format!(
            "이 장면(Scene {})을 3-5개의 unit으로 분석해주세요.\n{}",
            scene.scene_number,
            prompts::UNIT_ANALYSIS_PROMPT
        );
        let units_raw = self.analyze_scene_text(&formatted.text, &unit_prompt).await?;

        let base: BaseSceneAnalysis = serde_json::from_str(&clean_json_response(&base_raw))
            .context("scene analysis returned unparseable JSON")?;
        let units: RawUnitAnalysis = serde_json::from_str(&clean_json_response(&units_raw))
            .context("unit analysis returned unparseable JSON")?;

        let units = units
            .units
            .into_iter()
            .map(|unit| clamp_unit(unit, formatted.total_lines))
            .collect();

        Ok(SceneAnalysisRecord {
            scene_id: scene.id,
            analysis: merge_scene_analysis(base, units),
        })
    }

    /// Whole-script plot structure plus per-scene analyses. Scene analyses
    /// run sequentially; any failure aborts the run.
    pub async fn analyze_plot(&self, script: &Script) -> Result<PlotAnalysis> {
        let script_text = serde_json::to_string(script)?;
        let plot_raw = self
            .analyze_scene_text(&script_text, prompts::PLOT_ANALYSIS_PROMPT)
            .await?;
        let plot_structure: PlotStructure = serde_json::from_str(&clean_json_response(&plot_raw))
            .context("plot analysis returned unparseable JSON")?;

        let mut scene_analyses = Vec::with_capacity(script.scenes.len());
        for scene in &script.scenes {
            scene_analyses.push(self.analyze_scene_details(scene).await?);
        }

        Ok(PlotAnalysis {
            plot_structure,
            scene_analyses,
        })
    }

    /// Fixtures/props/stage extraction. Supplementary: any failure is logged
    /// and replaced with the empty default.
    pub async fn analyze_settings(&self, script: &Script) -> SettingsAnalysis {
        match self.try_analyze_settings(script).await {
            Ok(settings) => settings,
            Err(err) => {
                warn!("settings analysis failed, using empty default: {:#}", err);
                SettingsAnalysis::default()
            }
        }
    }

    async fn try_analyze_settings(&self, script: &Script) -> Result<SettingsAnalysis> {
        let script_text = serde_json::to_string(script)?;
        let value = self
            .analyze_text(prompts::SETTINGS_ANALYSIS_PROMPT, &script_text)
            .await?;

        #[derive(Deserialize, Default)]
        struct RawSettings {
            #[serde(default)]
            stage: StageAnalysis,
            #[serde(default)]
            fixtures: Vec<StageElement>,
            #[serde(default)]
            props: Vec<StageElement>,
        }

        let raw: RawSettings =
            serde_json::from_value(value).context("settings analysis JSON missing fields")?;

        let label = |mut element: StageElement, kind: &str| {
            element.element_type = kind.to_string();
            element
        };

        Ok(SettingsAnalysis {
            stage: raw.stage,
            fixtures: raw.fixtures.into_iter().map(|e| label(e, "fixtures")).collect(),
            props: raw.props.into_iter().map(|e| label(e, "props")).collect(),
        })
    }

    /// LLM trait analysis for one character. Supplementary: returns `None`
    /// when the character never speaks or the call fails.
    pub async fn analyze_character_traits(
        &self,
        script: &Script,
        character: &str,
    ) -> Option<TraitAnalysis> {
        let mut dialogues: Vec<&str> = Vec::new();
        let mut scenes: Vec<usize> = Vec::new();

        for (scene_idx, scene) in script.scenes.iter().enumerate() {
            for (_, bucket) in scene.content.dialogue_buckets() {
                for dialogue in bucket {
                    if dialogue.character == character {
                        dialogues.extend(dialogue.lines.iter().map(String::as_str));
                        if scenes.last() != Some(&scene_idx) {
                            scenes.push(scene_idx);
                        }
                    }
                }
            }
        }

        if dialogues.is_empty() {
            warn!("no dialogues found for character: {}", character);
            return None;
        }

        let scene_list = scenes
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let samples = dialogues
            .iter()
            .take(5)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        let context = format!(
            "Character: {}\nTotal Dialogues: {}\nAppears in Scenes: {}\n\nSample Dialogues:\n{}",
            character,
            dialogues.len(),
            scene_list,
            samples
        );
        let user = format!("{}\n\nContext:\n{}", prompts::TRAIT_ANALYSIS_PROMPT, context);

        match self
            .llm
            .chat(prompts::TEXT_SYSTEM_MESSAGE, &user, self.chat_opts())
            .await
        {
            Ok(response) => Some(TraitAnalysis {
                character: character.to_string(),
                analysis: response.trim().to_string(),
            }),
            Err(err) => {
                warn!("character trait analysis failed for {}: {:#}", character, err);
                None
            }
        }
    }

    /// Rule-based stats and movement presence combined with the LLM trait
    /// analysis. `None` when the character never speaks.
    pub async fn complete_character_analysis(
        &self,
        script: &Script,
        character: &str,
    ) -> Option<CompleteCharacterAnalysis> {
        let stats = analyze_character_stats(script)
            .into_iter()
            .find(|s| s.name == character)?;

        let movements = analyze_character_movements(script)
            .character_timeline
            .into_iter()
            .find(|t| t.character == character)
            .map(|t| t.presence)
            .unwrap_or_default();

        let traits = self
            .analyze_character_traits(script, character)
            .await
            .map(|t| t.analysis);

        Some(CompleteCharacterAnalysis {
            stats,
            movements,
            traits,
        })
    }
}

/// Explicit merge of the two scene-level analyses: every field is assigned
/// from exactly one source, so same-named keys can never clobber silently.
fn merge_scene_analysis(base: BaseSceneAnalysis, units: Vec<Unit>) -> SceneAnalysis {
    SceneAnalysis {
        metadata: base.metadata,
        summary: base.summary,
        themes: base.themes,
        symbols: base.symbols,
        connections: base.connections,
        units,
    }
}

/// Clamps a raw unit's line range into `[1, total_lines]`, compensating for
/// hallucinated line numbers. Missing start defaults to 1, missing end to
/// the scene's last line.
fn clamp_unit(raw: RawUnit, total_lines: usize) -> Unit {
    let total = total_lines.max(1) as i64;
    let start = parse_line(&raw.start_line).unwrap_or(1).clamp(1, total);
    let end = parse_line(&raw.end_line).unwrap_or(total).clamp(start, total);

    Unit {
        id: raw.id,
        start_line: start as usize,
        end_line: end as usize,
        unit_type: raw.unit_type,
        characters: raw.characters,
        description: raw.description,
        significance: raw.significance,
        dialogue_topics: raw.dialogue_topics,
        situation_change: raw.situation_change,
        mood: raw.mood,
    }
}

/// Line numbers arrive as JSON numbers or digit strings.
fn parse_line(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Concatenates the array-valued analysis fields of `incremental` onto
/// `accumulated`. Everything else keeps the accumulated value.
fn merge_incremental(mut accumulated: Value, incremental: Value) -> Value {
    append_array(&mut accumulated, &incremental, &["fixtures"]);
    append_array(&mut accumulated, &incremental, &["props"]);
    append_array(&mut accumulated, &incremental, &["stage", "areas"]);
    accumulated
}

fn append_array(accumulated: &mut Value, incremental: &Value, path: &[&str]) {
    let mut source = incremental;
    for key in path {
        match source.get(key) {
            Some(next) => source = next,
            None => return,
        }
    }
    let Some(items) = source.as_array() else {
        return;
    };
    if items.is_empty() {
        return;
    }

    // Intermediate path keys are objects; only the final key holds the array.
    let (last, parents) = path.split_last().unwrap();
    let mut target = accumulated;
    for key in parents {
        if !target.is_object() {
            return;
        }
        target = target
            .as_object_mut()
            .unwrap()
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !target.is_object() {
        return;
    }
    let slot = target
        .as_object_mut()
        .unwrap()
        .entry(last.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if let Some(array) = slot.as_array_mut() {
        array.extend(items.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Routes canned replies by prompt content.
    #[derive(Debug)]
    struct RoutingLlm {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RoutingLlm {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl LlmClient for RoutingLlm {
        async fn chat(&self, _system: &str, user: &str, _opts: ChatOptions) -> Result<String> {
            self.calls.lock().unwrap().push(user.to_string());
            if self.fail {
                return Err(anyhow!("mock transport failure"));
            }

            if user.contains("unit으로 분석") {
                return Ok(r#"```json
{
  "units": [
    {
      "id": "unit1",
      "startLine": "-5",
      "endLine": 99999,
      "type": "conversation",
      "characters": [ { "name": "민수", "action": "인사", "emotion": "반가움" } ],
      "description": "재회",
      "significance": "setup",
      "dialogueTopics": ["재회"],
      "situationChange": "만남",
      "mood": "따뜻함"
    }
  ]
}
```"#
                    .to_string());
            }
            if user.contains("전체 연극 대본") {
                return Ok(r#"{"mainPlot": "재회와 화해", "subPlots": ["우정"], "themes": ["성장"], "structure": {"exposition": "소개", "development": "갈등", "climax": "절정", "conclusion": "해소"}}"#.to_string());
            }
            if user.contains("장면을 분석") {
                return Ok(r#"### 분석
{"metadata": {"type": "발단", "duration": "5", "location": "교실"}, "summary": "두 사람이 만난다", "themes": ["재회"], "symbols": [], "connections": []}"#
                    .to_string());
            }
            if user.contains("소품과 무대 설비") {
                return Ok(r#"{"stage": {"mainBackground": "교실", "areas": []}, "fixtures": [{"name": "책상", "firstAppearance": "1장"}], "props": [{"name": "편지", "firstAppearance": "1장"}]}"#.to_string());
            }
            Ok("plain analysis text".to_string())
        }
    }

    fn sample_script() -> Script {
        parse_script(&json!({
            "characters": ["민수", "영희"],
            "scenes": [
                {
                    "scene_number": 1,
                    "directions": [ { "content": "막이 오른다" } ],
                    "dialogues": [
                        { "character": "민수", "lines": ["안녕", "오랜만이야"] },
                        { "character": "영희", "lines": ["그래"] }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    fn config_with_chunk(chunk_size: usize) -> AnalysisConfig {
        AnalysisConfig {
            chunk_size,
            ..AnalysisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_scene_details_merges_and_clamps() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        let record = analyzer.analyze_scene_details(&script.scenes[0]).await.unwrap();
        assert_eq!(record.scene_id, 0);
        assert_eq!(record.analysis.summary, "두 사람이 만난다");
        assert_eq!(record.analysis.metadata.kind, "발단");
        assert_eq!(record.analysis.units.len(), 1);

        // Raw startLine "-5" and endLine 99999 clamp onto the 4-line scene.
        let unit = &record.analysis.units[0];
        assert_eq!(unit.start_line, 1);
        assert_eq!(unit.end_line, 4);
        assert_eq!(unit.unit_type, UnitType::Conversation);
        assert_eq!(unit.significance, Significance::Setup);
    }

    #[tokio::test]
    async fn test_scene_details_propagates_parse_failure() {
        #[derive(Debug)]
        struct GarbageLlm;

        #[async_trait]
        impl LlmClient for GarbageLlm {
            async fn chat(&self, _: &str, _: &str, _: ChatOptions) -> Result<String> {
                Ok("I would rather chat about the weather.".to_string())
            }
        }

        let llm = GarbageLlm;
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();
        let result = analyzer.analyze_scene_details(&script.scenes[0]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_chunked_analysis_uses_continuation_prompt() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &config_with_chunk(30));

        let text = "First sentence here. Second sentence here. Third sentence here.";
        analyzer.analyze_scene_text(text, "analyze this").await.unwrap();

        let calls = llm.calls.lock().unwrap();
        assert!(calls.len() > 1);
        assert!(calls[0].starts_with("analyze this"));
        for call in &calls[1..] {
            assert!(call.starts_with(prompts::CONTINUATION_PROMPT));
        }
    }

    #[tokio::test]
    async fn test_incremental_merge_concatenates_arrays() {
        #[derive(Debug)]
        struct SequencedLlm {
            responses: Mutex<Vec<String>>,
        }

        #[async_trait]
        impl LlmClient for SequencedLlm {
            async fn chat(&self, _: &str, _: &str, _: ChatOptions) -> Result<String> {
                Ok(self.responses.lock().unwrap().remove(0))
            }
        }

        let llm = SequencedLlm {
            responses: Mutex::new(vec![
                r#"{"fixtures": [{"name": "책상"}], "props": [], "stage": {"areas": [{"name": "중앙"}]}}"#.to_string(),
                r#"{"fixtures": [{"name": "의자"}], "props": [{"name": "편지"}], "stage": {"areas": []}}"#.to_string(),
            ]),
        };
        let analyzer = Analyzer::new(&llm, &config_with_chunk(45));

        let content = "First sentence here. Second sentence here after the first one.";
        let merged = analyzer.analyze_text("prompt", content).await.unwrap();

        assert_eq!(merged["fixtures"].as_array().unwrap().len(), 2);
        assert_eq!(merged["props"].as_array().unwrap().len(), 1);
        assert_eq!(merged["stage"]["areas"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_builds_missing_stage_object() {
        // First chunk omitted `stage` entirely; the later chunk's areas must
        // still land under a stage object, not vanish.
        let merged = merge_incremental(
            json!({"fixtures": [{"name": "책상"}], "props": []}),
            json!({"fixtures": [], "props": [], "stage": {"areas": [{"name": "중앙"}]}}),
        );
        assert!(merged["stage"].is_object());
        assert_eq!(merged["stage"]["areas"].as_array().unwrap().len(), 1);
        assert_eq!(merged["stage"]["areas"][0]["name"], "중앙");
        assert_eq!(merged["fixtures"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_merge_ignores_non_object_stage() {
        let merged = merge_incremental(
            json!({"fixtures": [], "stage": "교실"}),
            json!({"stage": {"areas": [{"name": "중앙"}]}}),
        );
        // A scalar stage in the accumulator is left untouched.
        assert_eq!(merged["stage"], "교실");
    }

    #[tokio::test]
    async fn test_plot_analysis_sequences_all_scenes() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        let plot = analyzer.analyze_plot(&script).await.unwrap();
        assert_eq!(plot.plot_structure.main_plot, "재회와 화해");
        assert_eq!(plot.plot_structure.structure.climax, "절정");
        assert_eq!(plot.scene_analyses.len(), 1);
    }

    #[tokio::test]
    async fn test_settings_analysis_labels_elements() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        let settings = analyzer.analyze_settings(&script).await;
        assert_eq!(settings.stage.main_background, "교실");
        assert_eq!(settings.fixtures[0].element_type, "fixtures");
        assert_eq!(settings.props[0].element_type, "props");
    }

    #[tokio::test]
    async fn test_settings_analysis_falls_back_on_failure() {
        let llm = RoutingLlm::failing();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        let settings = analyzer.analyze_settings(&script).await;
        assert!(settings.fixtures.is_empty());
        assert!(settings.props.is_empty());
        assert_eq!(settings.stage.main_background, "");
    }

    #[tokio::test]
    async fn test_trait_analysis_none_without_dialogue() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        assert!(analyzer.analyze_character_traits(&script, "유령").await.is_none());
        // No LLM call for a silent character.
        assert!(llm.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trait_analysis_none_on_transport_failure() {
        let llm = RoutingLlm::failing();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        assert!(analyzer.analyze_character_traits(&script, "민수").await.is_none());
    }

    #[tokio::test]
    async fn test_complete_character_analysis() {
        let llm = RoutingLlm::new();
        let analyzer = Analyzer::new(&llm, &AnalysisConfig::default());
        let script = sample_script();

        let complete = analyzer
            .complete_character_analysis(&script, "민수")
            .await
            .unwrap();
        assert_eq!(complete.stats.dialogues, 2);
        assert_eq!(complete.movements.len(), 1);
        assert_eq!(complete.traits.as_deref(), Some("plain analysis text"));

        assert!(analyzer.complete_character_analysis(&script, "유령").await.is_none());
    }

    #[test]
    fn test_clamp_unit_defaults() {
        let unit = clamp_unit(RawUnit::default(), 40);
        assert_eq!(unit.start_line, 1);
        assert_eq!(unit.end_line, 40);
    }

    #[test]
    fn test_clamp_unit_keeps_valid_range() {
        let raw = RawUnit {
            start_line: json!(3),
            end_line: json!("7"),
            ..RawUnit::default()
        };
        let unit = clamp_unit(raw, 40);
        assert_eq!(unit.start_line, 3);
        assert_eq!(unit.end_line, 7);
    }

    #[test]
    fn test_clamp_unit_orders_inverted_range() {
        let raw = RawUnit {
            start_line: json!(20),
            end_line: json!(5),
            ..RawUnit::default()
        };
        let unit = clamp_unit(raw, 40);
        assert!(unit.start_line <= unit.end_line);
    }
}
