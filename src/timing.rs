use crate::config::AnalysisConfig;
use crate::llm::{ChatOptions, LlmClient};
use crate::prompts;
use crate::script::{Scene, Script};
use log::warn;

/// Seconds per dialogue character (Unicode scalar value).
const BASE_CHAR_TIME: f64 = 0.2;
const COMMA_PAUSE: f64 = 0.3;
const PERIOD_PAUSE: f64 = 0.5;

/// Seconds per complexity level for a stage direction.
const BASE_DIRECTION_TIME: f64 = 3.0;
/// Seconds per complexity level for a scene transition.
const BASE_TRANSITION_TIME: f64 = 5.0;

const DEFAULT_DIRECTION_COMPLEXITY: u32 = 2;
const DEFAULT_TRANSITION_COMPLEXITY: u32 = 3;

/// Deterministic delivery time for one spoken line. Characters are counted
/// as Unicode scalar values, punctuation included.
pub fn calculate_dialogue_time(line: &str) -> f64 {
    let chars = line.chars().count() as f64;
    let commas = line.chars().filter(|c| *c == ',').count() as f64;
    let enders = line
        .chars()
        .filter(|c| matches!(c, '.' | '!' | '?'))
        .count() as f64;
    chars * BASE_CHAR_TIME + commas * COMMA_PAUSE + enders * PERIOD_PAUSE
}

/// Converts seconds to the user-facing `"M분 S초 예측"` form.
pub fn format_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor() as i64;
    let remaining = (seconds % 60.0).round() as i64;
    format!("{}분 {}초 예측", minutes, remaining)
}

/// Estimates performance time for scenes and whole scripts. Direction and
/// transition durations come from LLM complexity ratings; every rating call
/// tolerates failure by falling back to a fixed default, so one bad call
/// never aborts the estimate.
pub struct TimeEstimator<'a> {
    llm: &'a dyn LlmClient,
    rating_opts: ChatOptions,
}

impl<'a> TimeEstimator<'a> {
    pub fn new(llm: &'a dyn LlmClient, analysis: &AnalysisConfig) -> Self {
        Self {
            llm,
            rating_opts: ChatOptions {
                temperature: analysis.rating_temperature,
                max_tokens: analysis.rating_max_tokens,
                json: false,
            },
        }
    }

    async fn rate_complexity(&self, system: &str, user: &str, default: u32) -> u32 {
        match self.llm.chat(system, user, self.rating_opts).await {
            Ok(response) => parse_complexity(&response).unwrap_or(default),
            Err(err) => {
                warn!("complexity rating failed, using default {}: {:#}", default, err);
                default
            }
        }
    }

    /// Seconds needed to perform one stage direction.
    pub async fn direction_time(&self, direction: &str) -> f64 {
        let user = format!(
            "Stage direction: {}\nAnalyze the time needed for this action.",
            direction
        );
        let complexity = self
            .rate_complexity(
                prompts::DIRECTION_COMPLEXITY_SYSTEM,
                &user,
                DEFAULT_DIRECTION_COMPLEXITY,
            )
            .await;
        BASE_DIRECTION_TIME * complexity as f64
    }

    /// Seconds needed to change the stage between two scenes.
    pub async fn transition_time(&self, prev_setting: &str, next_setting: &str) -> f64 {
        let user = format!(
            "Previous scene setting: {}\nNext scene setting: {}\nAnalyze the complexity of this scene transition.",
            prev_setting, next_setting
        );
        let complexity = self
            .rate_complexity(
                prompts::TRANSITION_COMPLEXITY_SYSTEM,
                &user,
                DEFAULT_TRANSITION_COMPLEXITY,
            )
            .await;
        BASE_TRANSITION_TIME * complexity as f64
    }

    /// Total seconds for one scene: every spoken line across all dialogue
    /// buckets, every pre-direction and every scene-level direction.
    pub async fn scene_time(&self, scene: &Scene) -> f64 {
        let mut total = 0.0;

        for (_, dialogues) in scene.content.dialogue_buckets() {
            for dialogue in dialogues {
                for line in &dialogue.lines {
                    total += calculate_dialogue_time(line);
                }
                for direction in &dialogue.pre_directions {
                    total += self.direction_time(direction.text()).await;
                }
            }
        }

        for (_, directions) in scene.content.direction_buckets() {
            for direction in directions {
                total += self.direction_time(direction.text()).await;
            }
        }

        total.round()
    }

    /// Total seconds for the whole script, including the n-1 inter-scene
    /// transitions.
    pub async fn script_time(&self, script: &Script) -> f64 {
        let mut total = 0.0;
        for (idx, scene) in script.scenes.iter().enumerate() {
            total += self.scene_time(scene).await;
            if idx + 1 < script.scenes.len() {
                total += self
                    .transition_time(
                        &scene_setting(scene),
                        &scene_setting(&script.scenes[idx + 1]),
                    )
                    .await;
            }
        }
        total
    }
}

/// Scenes carry no dedicated setting field; the opening direction stands in.
fn scene_setting(scene: &Scene) -> String {
    scene
        .content
        .directions
        .first()
        .map(|d| d.text().to_string())
        .unwrap_or_else(|| "None".to_string())
}

/// First digit in the reply, accepted when it is a valid 1-5 rating.
fn parse_complexity(response: &str) -> Option<u32> {
    let digit = response.chars().find_map(|c| c.to_digit(10))?;
    (1..=5).contains(&digit).then_some(digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct FixedLlm {
        response: Option<String>,
        call_count: Arc<Mutex<usize>>,
    }

    impl FixedLlm {
        fn new(response: Option<&str>) -> Self {
            Self {
                response: response.map(str::to_string),
                call_count: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn chat(&self, _system: &str, _user: &str, _opts: ChatOptions) -> Result<String> {
            *self.call_count.lock().unwrap() += 1;
            match &self.response {
                Some(text) => Ok(text.clone()),
                None => Err(anyhow!("mock transport failure")),
            }
        }
    }

    fn estimator(llm: &FixedLlm) -> TimeEstimator<'_> {
        TimeEstimator::new(llm, &AnalysisConfig::default())
    }

    #[test]
    fn test_dialogue_time_formula() {
        // 9 Unicode scalar values, one comma, one question mark:
        // 9*0.2 + 0.3 + 0.5 = 2.6
        let time = calculate_dialogue_time("안녕, 잘 지내?");
        assert!((time - 2.6).abs() < 1e-9, "got {}", time);
    }

    #[test]
    fn test_dialogue_time_counts_scalars_not_bytes() {
        assert!((calculate_dialogue_time("가나다") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(185.0), "3분 5초 예측");
        assert_eq!(format_time(59.6), "0분 60초 예측");
    }

    #[test]
    fn test_parse_complexity() {
        assert_eq!(parse_complexity("4"), Some(4));
        assert_eq!(parse_complexity("Complexity: 3 (moderate)"), Some(3));
        assert_eq!(parse_complexity("very complex"), None);
        assert_eq!(parse_complexity("9"), None);
    }

    #[tokio::test]
    async fn test_direction_time_uses_rating() {
        let llm = FixedLlm::new(Some("4"));
        assert_eq!(estimator(&llm).direction_time("문을 연다").await, 12.0);
    }

    #[tokio::test]
    async fn test_direction_time_defaults_on_transport_failure() {
        let llm = FixedLlm::new(None);
        assert_eq!(estimator(&llm).direction_time("문을 연다").await, 6.0);
    }

    #[tokio::test]
    async fn test_direction_time_defaults_on_unparseable_rating() {
        let llm = FixedLlm::new(Some("quite involved"));
        assert_eq!(estimator(&llm).direction_time("문을 연다").await, 6.0);
    }

    #[tokio::test]
    async fn test_transition_time_defaults_to_fifteen_seconds() {
        let llm = FixedLlm::new(None);
        assert_eq!(estimator(&llm).transition_time("교실", "운동장").await, 15.0);
    }

    #[tokio::test]
    async fn test_script_time_sums_scenes_and_transitions() {
        use crate::script::parse_script;
        use serde_json::json;

        let script = parse_script(&json!({
            "characters": ["A"],
            "scenes": [
                {
                    "scene_number": 1,
                    "directions": [ { "content": "막이 오른다" } ],
                    "dialogues": [ { "character": "A", "lines": ["hello."] } ]
                },
                {
                    "scene_number": 2,
                    "dialogues": [ { "character": "A", "lines": ["bye."] } ]
                }
            ]
        }))
        .unwrap();

        // Every rating comes back 1: direction 3s, transition 5s.
        let llm = FixedLlm::new(Some("1"));
        let total = estimator(&llm).script_time(&script).await;

        // Scene 1: "hello." = 6*0.2 + 0.5 = 1.7, + direction 3.0 => round(4.7) = 5
        // Scene 2: "bye." = 4*0.2 + 0.5 = 1.3 => round(1.3) = 1
        // Transition: 5
        assert_eq!(total, 11.0);
        // One direction rating + one transition rating.
        assert_eq!(*llm.call_count.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scene_time_survives_individual_failures() {
        use crate::script::parse_script;
        use serde_json::json;

        let script = parse_script(&json!({
            "scenes": [
                {
                    "directions": [ { "content": "조명이 바뀐다" }, { "content": "비가 내린다" } ]
                }
            ]
        }))
        .unwrap();

        let llm = FixedLlm::new(None);
        // Both ratings fail, both fall back to 6s.
        assert_eq!(estimator(&llm).scene_time(&script.scenes[0]).await, 12.0);
    }
}
