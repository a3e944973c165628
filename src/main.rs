use anyhow::Result;
use dramaturg::config::Config;
use dramaturg::llm;
use dramaturg::workflow::WorkflowManager;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let llm = llm::create_llm(&config)?;

    let mut manager = WorkflowManager::new(config, llm)?;
    manager.run().await?;

    Ok(())
}
