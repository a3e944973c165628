use crate::analyzer::{Analyzer, CompleteCharacterAnalysis, PlotAnalysis, SettingsAnalysis};
use crate::config::Config;
use crate::llm::LlmClient;
use crate::movement::{analyze_character_movements, MovementAnalysis};
use crate::script::parse_script;
use crate::stats::analyze_character_stats;
use crate::timing::{format_time, TimeEstimator};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct WorkflowState {
    pub completed_scripts: Vec<String>,
}

/// Everything the pipeline derives from one script, cached as a unit so a
/// re-run never repeats finished LLM work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub plot: PlotAnalysis,
    pub settings: SettingsAnalysis,
    pub movements: MovementAnalysis,
    pub characters: Vec<CompleteCharacterAnalysis>,
    pub estimated_seconds: f64,
    pub estimated_time: String,
}

pub struct WorkflowManager {
    config: Config,
    llm: Box<dyn LlmClient>,
    state: WorkflowState,
}

impl WorkflowManager {
    pub fn new(config: Config, llm: Box<dyn LlmClient>) -> Result<Self> {
        let state = Self::load_state(&config.build_folder)?;
        Ok(Self { config, llm, state })
    }

    fn load_state(build_dir: &str) -> Result<WorkflowState> {
        let path = Path::new(build_dir).join("state.json");
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(WorkflowState::default())
        }
    }

    fn save_state(&self) -> Result<()> {
        fs::create_dir_all(&self.config.build_folder)?;
        let path = Path::new(&self.config.build_folder).join("state.json");
        let content = serde_json::to_string_pretty(&self.state)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        let input_path = Path::new(&self.config.input_folder);
        let mut entries: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(input_path)
            .with_context(|| format!("Failed to read input folder {:?}", input_path))?
        {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                entries.push(path);
            }
        }
        entries.sort();

        if entries.is_empty() {
            println!("No script files found in {}", self.config.input_folder);
            return Ok(());
        }

        let progress = ProgressBar::new(entries.len() as u64);
        progress.set_style(ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"));

        for path in entries {
            let filename = path.file_name().unwrap().to_string_lossy().to_string();
            progress.set_message(filename.clone());

            if self.state.completed_scripts.contains(&filename) {
                info!("Skipping completed script: {}", filename);
                progress.inc(1);
                continue;
            }

            if !self.config.unattended {
                let proceed = inquire::Confirm::new(&format!("Analyze {}?", filename))
                    .with_default(true)
                    .prompt()?;
                if !proceed {
                    progress.inc(1);
                    continue;
                }
            }

            info!("Processing script: {}", filename);
            match self.process_script(&path, &filename).await {
                Ok(()) => {
                    self.state.completed_scripts.push(filename);
                    self.save_state()?;
                }
                // A failed script stays pending; the next run retries it.
                Err(err) => error!("Analysis of {} failed: {:#}", filename, err),
            }
            progress.inc(1);
        }

        progress.finish_with_message("done");
        println!("All scripts processed!");
        Ok(())
    }

    pub async fn process_script(&mut self, path: &Path, filename: &str) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script file {:?}", path))?;
        let raw: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("{} is not valid JSON", filename))?;
        let script = parse_script(&raw)?;

        let script_build_dir =
            Path::new(&self.config.build_folder).join(filename.replace('.', "_"));
        fs::create_dir_all(&script_build_dir)?;
        let analysis_path = script_build_dir.join("analysis.json");

        let analysis: ScriptAnalysis = if analysis_path.exists() {
            info!("Loading cached analysis from {:?}", analysis_path);
            let content = fs::read_to_string(&analysis_path)?;
            serde_json::from_str(&content)?
        } else {
            let analyzer = Analyzer::new(&*self.llm, &self.config.analysis);
            let estimator = TimeEstimator::new(&*self.llm, &self.config.analysis);

            info!("Analyzing plot and scenes...");
            let plot = analyzer.analyze_plot(&script).await?;

            info!("Analyzing stage settings...");
            let settings = analyzer.analyze_settings(&script).await;

            let movements = analyze_character_movements(&script);

            info!("Analyzing characters...");
            let mut characters = Vec::new();
            for stats in analyze_character_stats(&script) {
                if let Some(complete) = analyzer
                    .complete_character_analysis(&script, &stats.name)
                    .await
                {
                    characters.push(complete);
                }
            }

            info!("Estimating performance time...");
            let estimated_seconds = estimator.script_time(&script).await;

            let analysis = ScriptAnalysis {
                plot,
                settings,
                movements,
                characters,
                estimated_seconds,
                estimated_time: format_time(estimated_seconds),
            };

            fs::write(&analysis_path, serde_json::to_string_pretty(&analysis)?)?;
            analysis
        };

        self.write_report(filename, script.scenes.len(), &analysis)?;
        Ok(())
    }

    fn write_report(
        &self,
        filename: &str,
        scene_count: usize,
        analysis: &ScriptAnalysis,
    ) -> Result<()> {
        let stem = filename.replace('.', "_");
        let output_dir = Path::new(&self.config.output_folder).join(&stem);
        fs::create_dir_all(&output_dir)?;

        let analysis_out = output_dir.join("analysis.json");
        fs::write(&analysis_out, serde_json::to_string_pretty(analysis)?)?;

        let mut summary = String::new();
        summary.push_str(&format!("장면 수: {}\n", scene_count));
        summary.push_str(&format!("예상 공연 시간: {}\n", analysis.estimated_time));
        summary.push_str(&format!("주요 플롯: {}\n", analysis.plot.plot_structure.main_plot));
        summary.push_str("\n등장인물:\n");
        for character in &analysis.characters {
            summary.push_str(&format!(
                "  {}: 대사 {}회, 등장 장면 {}개\n",
                character.stats.name,
                character.stats.dialogues,
                character.stats.stage_time
            ));
        }
        fs::write(output_dir.join("summary.txt"), summary)?;

        info!("Report written to {:?}", output_dir);
        Ok(())
    }
}
