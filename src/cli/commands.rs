//! CLI command implementations.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::consensus::ConsensusCoordinator;
use crate::providers::{CredentialSource, EnvCredentials};
use crate::types::config::{Config, CONFIG_FILE};
use crate::types::requests::{ConsensusRequest, ProviderKind};
use crate::types::responses::ProviderResult;
use crate::{MagiError, MagiResult};

use super::QueryArgs;

/// Writes a default configuration file into `path`.
pub async fn init(path: Option<PathBuf>) -> MagiResult<()> {
    let target_dir = path.unwrap_or_else(|| PathBuf::from("."));

    if !target_dir.exists() {
        std::fs::create_dir_all(&target_dir)?;
        tracing::info!("Directory created: {}", target_dir.display());
    }

    let config_path = target_dir.join(CONFIG_FILE);

    if config_path.exists() {
        println!("Configuration already exists at: {}", config_path.display());
        println!("Use 'magi config' to modify.");
        return Ok(());
    }

    Config::default_config().save(&config_path)?;

    println!("MAGI initialized successfully!");
    println!("Configuration created at: {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Export API keys: OPENAI_API_KEY, GEMINI_API_KEY, XAI_API_KEY, ANTHROPIC_API_KEY");
    println!("  2. Check providers: magi status --ping");
    println!("  3. Ask something: magi consensus \"What is 2+2?\"");
    println!("  4. Add to an MCP client: magi serve");

    Ok(())
}

/// Starts the MCP server on stdio.
pub async fn serve(config: &Config) -> MagiResult<()> {
    use crate::mcp::McpServer;

    tracing::debug!(
        voter = %config.consensus.voter,
        judge = %config.judge.provider,
        quota = config.quota.enabled,
        "Configuration loaded"
    );
    tracing::info!("Starting MAGI MCP server on stdio");

    let mut server = McpServer::new(config)?;
    server.run().await
}

/// Prints provider configuration, optionally probing each provider.
pub async fn status(config: &Config, ping: bool, providers: &[String]) -> MagiResult<()> {
    let coordinator = ConsensusCoordinator::from_config(config)?;

    println!("Providers:\n");
    for status in coordinator.status() {
        let icon = match (status.enabled, status.configured) {
            (false, _) => "○",
            (true, true) => "✓",
            (true, false) => "✗",
        };
        let state = match (status.enabled, status.configured) {
            (false, _) => "disabled".to_string(),
            (true, true) => "ready".to_string(),
            (true, false) => format!("{} not set", status.provider.credential_env()),
        };
        println!(
            "  {} {:<10} {:<28} {}",
            icon,
            status.provider.name(),
            status.model.as_deref().unwrap_or("-"),
            state
        );
    }

    let judge = coordinator.judge();
    println!();
    println!("Judge: {} / {}", judge.provider(), judge.model());
    println!("Voter: {}", coordinator.voter().name());

    if ping {
        let targets = ProviderKind::parse_list(providers)?;
        let results = with_spinner("Pinging providers...", coordinator.ping(&targets)).await;

        println!();
        println!("Ping:\n");
        for result in &results {
            print_result_line(result);
        }
    }

    Ok(())
}

/// Runs a consensus request and prints the final answer.
pub async fn consensus(args: &QueryArgs, config: &Config) -> MagiResult<()> {
    let request = build_request(args)?;
    let coordinator = ConsensusCoordinator::from_config(config)?;

    let outcome = with_spinner("Consulting providers...", coordinator.run(&request)).await;

    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            if let Some(results) = e.results() {
                if args.json {
                    let body = serde_json::json!({
                        "error": e.to_string(),
                        "status": e.status_code(),
                        "results": results,
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                } else {
                    for result in results {
                        print_result_line(result);
                    }
                }
            }
            return Err(e);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", response.final_answer);
    println!();
    match &response.judge {
        Some(verdict) => println!(
            "Decided by: {} (index {}, {})",
            response.decided_by, verdict.index, verdict.reason
        ),
        None => println!("Decided by: {}", response.decided_by),
    }
    for result in &response.results {
        print_result_line(result);
    }

    Ok(())
}

/// Runs a compare request and prints every answer.
pub async fn compare(args: &QueryArgs, config: &Config) -> MagiResult<()> {
    let request = build_request(args)?;
    let coordinator = ConsensusCoordinator::from_config(config)?;

    let response = with_spinner("Consulting providers...", coordinator.compare(&request)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    for result in &response.results {
        let model = result.model.as_deref().unwrap_or("-");
        println!("━━ {} ({}) ━━", result.provider, model);
        match &result.error {
            Some(error) => println!("error: {}", error),
            None => println!("{}", result.output.trim()),
        }
        println!();
    }

    Ok(())
}

/// Edits the configuration interactively.
pub async fn config_cmd(config_path: &Path) -> MagiResult<()> {
    use super::interactive::{run_interactive_config, show_config_summary};

    if config_path.exists() {
        let config = Config::load(config_path)?;
        show_config_summary(&config);
    }

    run_interactive_config(config_path)
}

/// Reports configuration problems without calling any provider.
pub async fn doctor(config: &Config) -> MagiResult<()> {
    println!("Diagnosing MAGI configuration...\n");

    let (issues, warnings) = diagnose(config, &EnvCredentials);

    if issues.is_empty() && warnings.is_empty() {
        println!("✓ All good! MAGI is ready to use.");
        return Ok(());
    }

    if !warnings.is_empty() {
        println!("Warnings:");
        for warning in &warnings {
            println!("  ⚠ {}", warning);
        }
    }
    if !issues.is_empty() {
        println!("Problems:");
        for issue in &issues {
            println!("  ✗ {}", issue);
        }
    }

    Ok(())
}

/// Returns `(issues, warnings)` for a configuration.
pub fn diagnose(config: &Config, credentials: &dyn CredentialSource) -> (Vec<String>, Vec<String>) {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if let Err(e) = config.validate() {
        issues.push(e.to_string());
    }

    let credential_env = |kind: ProviderKind| {
        config
            .providers
            .get(kind)
            .api_key_env
            .clone()
            .unwrap_or_else(|| kind.credential_env().to_string())
    };

    let enabled = config.providers.enabled();
    let mut ready = 0;
    for &kind in &enabled {
        let env = credential_env(kind);
        if credentials.get(&env).is_some() {
            ready += 1;
        } else {
            warnings.push(format!("{} is enabled but {} is not set", kind, env));
        }
    }

    if !enabled.is_empty() && ready == 0 {
        issues.push("No enabled provider has a credential - every request will fail".to_string());
    } else if ready == 1 {
        warnings.push("Only one provider is ready - answers will never be cross-checked".to_string());
    }

    let judge_env = credential_env(config.judge.provider);
    if credentials.get(&judge_env).is_none() {
        warnings.push(format!(
            "Judge provider {} has no credential ({} not set) - ties will fail",
            config.judge.provider, judge_env
        ));
    }

    (issues, warnings)
}

/// Prints the version.
pub fn version() {
    println!("magi {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Multi-provider LLM consensus engine");
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Turns CLI arguments into a consensus request.
///
/// A prompt starting with `@` is read from that file.
pub fn build_request(args: &QueryArgs) -> MagiResult<ConsensusRequest> {
    let prompt = match args.prompt.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => args.prompt.clone(),
    };

    let mut models = HashMap::new();
    for pair in &args.models {
        let (provider, model) = pair.split_once('=').ok_or_else(|| {
            MagiError::invalid_request(format!("model override must be provider=model, got '{}'", pair))
        })?;
        models.insert(provider.trim().to_string(), model.trim().to_string());
    }

    Ok(ConsensusRequest {
        prompt: Some(prompt),
        system: args.system.clone(),
        providers: if args.providers.is_empty() {
            None
        } else {
            Some(args.providers.clone())
        },
        models,
        temperature: args.temperature,
        timeout_ms: args.timeout_ms,
        max_tokens: args.max_tokens,
    })
}

fn print_result_line(result: &ProviderResult) {
    let latency = result
        .latency_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());

    match &result.error {
        Some(error) => println!("  ✗ {:<10} {:>8}  {}", result.provider.name(), latency, error),
        None => {
            let first_line = result.output.lines().next().unwrap_or("").trim();
            println!("  ✓ {:<10} {:>8}  {}", result.provider.name(), latency, first_line);
        }
    }
}

/// Shows a spinner on stderr while `future` runs.
async fn with_spinner<F: Future>(message: &str, future: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let output = future.await;
    spinner.finish_and_clear();
    output
}
