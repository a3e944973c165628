use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_build")]
    pub build_folder: String,

    #[serde(default)]
    pub unattended: bool,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: String,
    pub openai: Option<OpenAiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Character budget per LLM request; oversized payloads are chunked.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for 1-5 complexity ratings; kept low for stable integers.
    #[serde(default = "default_rating_temperature")]
    pub rating_temperature: f32,

    #[serde(default = "default_rating_max_tokens")]
    pub rating_max_tokens: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            rating_temperature: default_rating_temperature(),
            rating_max_tokens: default_rating_max_tokens(),
        }
    }
}

fn default_input() -> String {
    "input".to_string()
}
fn default_output() -> String {
    "output".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_chunk_size() -> usize {
    16384
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    16000
}
fn default_rating_temperature() -> f32 {
    0.3
}
fn default_rating_max_tokens() -> u32 {
    100
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.build_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_on_minimal_yaml() {
        let config: Config = serde_yaml_ng::from_str(
            "llm:\n  provider: openai\n  openai:\n    api_key: sk-test\n    model: gpt-4o\n",
        )
        .unwrap();
        assert_eq!(config.input_folder, "input");
        assert_eq!(config.build_folder, "build");
        assert_eq!(config.analysis.chunk_size, 16384);
        assert_eq!(config.analysis.max_tokens, 16000);
        assert!(!config.unattended);
        assert_eq!(config.llm.provider, "openai");
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        let parsed: Config = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(parsed.analysis.chunk_size, config.analysis.chunk_size);
    }
}
