//! Interactive configuration editor built on dialoguer.

use std::path::Path;

use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::types::config::{Config, DailyLimit, ProviderConfig, VoterStrategy};
use crate::types::requests::ProviderKind;
use crate::MagiResult;

/// Runs the configuration menu until the user saves or quits.
pub fn run_interactive_config(config_path: &Path) -> MagiResult<()> {
    let theme = ColorfulTheme::default();

    println!("\n🔧 MAGI Interactive Configuration\n");

    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        println!("Creating a new configuration...\n");
        Config::default_config()
    };

    loop {
        let options = vec![
            "General",
            "Providers (OpenAI, Gemini, xAI, Anthropic)",
            "Consensus",
            "Judge",
            "Quota",
            "Save and exit",
            "Exit without saving",
        ];

        let selection = Select::with_theme(&theme)
            .with_prompt("What do you want to configure?")
            .items(&options)
            .default(0)
            .interact()?;

        match selection {
            0 => configure_general(&theme, &mut config)?,
            1 => configure_providers(&theme, &mut config)?,
            2 => configure_consensus(&theme, &mut config)?,
            3 => configure_judge(&theme, &mut config)?,
            4 => configure_quota(&theme, &mut config)?,
            5 => {
                if let Err(e) = config.validate() {
                    println!("\n✗ {}\n", e);
                    continue;
                }
                config.save(config_path)?;
                println!("\n✓ Configuration saved to: {}\n", config_path.display());
                break;
            }
            6 => {
                if Confirm::with_theme(&theme)
                    .with_prompt("Really exit without saving?")
                    .default(false)
                    .interact()?
                {
                    println!("\nExiting without saving.\n");
                    break;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

fn configure_general(theme: &ColorfulTheme, config: &mut Config) -> MagiResult<()> {
    println!("\n📋 General\n");

    let log_levels = vec!["error", "warn", "info", "debug", "trace"];
    let current = log_levels
        .iter()
        .position(|&l| l == config.general.log_level)
        .unwrap_or(2);

    let level = Select::with_theme(theme)
        .with_prompt("Log level")
        .items(&log_levels)
        .default(current)
        .interact()?;
    config.general.log_level = log_levels[level].to_string();

    let log_formats = vec!["text", "json"];
    let current = log_formats
        .iter()
        .position(|&f| f == config.general.log_format)
        .unwrap_or(0);

    let format = Select::with_theme(theme)
        .with_prompt("Log format")
        .items(&log_formats)
        .default(current)
        .interact()?;
    config.general.log_format = log_formats[format].to_string();

    println!("\n✓ General settings updated.\n");
    Ok(())
}

fn configure_providers(theme: &ColorfulTheme, config: &mut Config) -> MagiResult<()> {
    println!("\n🤖 Providers\n");

    let mut items: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
    items.push("Back");

    loop {
        let selection = Select::with_theme(theme)
            .with_prompt("Which provider?")
            .items(&items)
            .default(0)
            .interact()?;

        match ProviderKind::ALL.get(selection) {
            Some(&kind) => configure_single_provider(theme, kind, config.providers.get_mut(kind))?,
            None => break,
        }
    }

    Ok(())
}

fn configure_single_provider(
    theme: &ColorfulTheme,
    kind: ProviderKind,
    provider: &mut ProviderConfig,
) -> MagiResult<()> {
    println!("\n⚙️  Configuring {}\n", kind.name());

    provider.enabled = Confirm::with_theme(theme)
        .with_prompt(format!("Query {} by default?", kind))
        .default(provider.enabled)
        .interact()?;

    let model: String = Input::with_theme(theme)
        .with_prompt("Default model")
        .default(provider.model.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    provider.model = non_empty(model);

    let base_url: String = Input::with_theme(theme)
        .with_prompt("Base URL (empty for the vendor default)")
        .default(provider.base_url.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    provider.base_url = non_empty(base_url);

    let api_key_env: String = Input::with_theme(theme)
        .with_prompt(format!("API key variable (empty for {})", kind.credential_env()))
        .default(provider.api_key_env.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;
    provider.api_key_env = non_empty(api_key_env);

    println!("\n✓ {} configured.\n", kind);
    Ok(())
}

fn configure_consensus(theme: &ColorfulTheme, config: &mut Config) -> MagiResult<()> {
    println!("\n🤝 Consensus\n");

    let temperature: f64 = Input::with_theme(theme)
        .with_prompt("Default temperature")
        .default(config.consensus.temperature)
        .interact_text()?;
    config.consensus.temperature = temperature.max(0.0);

    let timeout_ms: u64 = Input::with_theme(theme)
        .with_prompt("Per-provider timeout (ms)")
        .default(config.consensus.timeout_ms)
        .interact_text()?;
    config.consensus.timeout_ms = timeout_ms.max(1);

    let max_tokens: u32 = Input::with_theme(theme)
        .with_prompt("Max output tokens (0 for vendor default)")
        .default(config.consensus.max_tokens.unwrap_or(0))
        .interact_text()?;
    config.consensus.max_tokens = (max_tokens > 0).then_some(max_tokens);

    let voters = vec!["exact (normalized text match)", "cluster (keyword overlap)"];
    let current = match config.consensus.voter {
        VoterStrategy::Exact => 0,
        VoterStrategy::Cluster => 1,
    };
    let voter = Select::with_theme(theme)
        .with_prompt("Vote strategy")
        .items(&voters)
        .default(current)
        .interact()?;
    config.consensus.voter = if voter == 0 {
        VoterStrategy::Exact
    } else {
        VoterStrategy::Cluster
    };

    if config.consensus.voter == VoterStrategy::Cluster {
        let threshold: f64 = Input::with_theme(theme)
            .with_prompt("Cluster similarity threshold (0-1)")
            .default(config.consensus.cluster_threshold)
            .interact_text()?;
        config.consensus.cluster_threshold = threshold.clamp(0.01, 1.0);
    }

    println!("\n✓ Consensus configured.\n");
    Ok(())
}

fn configure_judge(theme: &ColorfulTheme, config: &mut Config) -> MagiResult<()> {
    println!("\n⚖️  Judge\n");

    let providers: Vec<&str> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
    let current = ProviderKind::ALL
        .iter()
        .position(|&k| k == config.judge.provider)
        .unwrap_or(0);

    let selection = Select::with_theme(theme)
        .with_prompt("Judge provider")
        .items(&providers)
        .default(current)
        .interact()?;
    config.judge.provider = ProviderKind::ALL[selection];

    let model: String = Input::with_theme(theme)
        .with_prompt("Judge model")
        .default(config.judge.model.clone())
        .interact_text()?;
    config.judge.model = model;

    let timeout_ms: u64 = Input::with_theme(theme)
        .with_prompt("Judge timeout (ms)")
        .default(config.judge.timeout_ms)
        .interact_text()?;
    config.judge.timeout_ms = timeout_ms.max(1);

    println!("\n✓ Judge configured.\n");
    Ok(())
}

fn configure_quota(theme: &ColorfulTheme, config: &mut Config) -> MagiResult<()> {
    println!("\n📊 Daily quota\n");

    config.quota.enabled = Confirm::with_theme(theme)
        .with_prompt("Enforce daily limits?")
        .default(config.quota.enabled)
        .interact()?;

    if !config.quota.enabled {
        println!("Quota disabled.\n");
        return Ok(());
    }

    for kind in ProviderKind::ALL {
        let current = config.quota.limits.get(kind);

        let requests: u64 = Input::with_theme(theme)
            .with_prompt(format!("{} requests per day (0 for unlimited)", kind))
            .default(current.map(|l| l.requests).unwrap_or(0))
            .interact_text()?;

        let limit = if requests == 0 {
            None
        } else {
            let tokens: u64 = Input::with_theme(theme)
                .with_prompt(format!("{} tokens per day", kind))
                .default(current.map(|l| l.tokens).unwrap_or(10_000))
                .interact_text()?;
            Some(DailyLimit::new(requests, tokens))
        };

        match kind {
            ProviderKind::OpenAi => config.quota.limits.openai = limit,
            ProviderKind::Gemini => config.quota.limits.gemini = limit,
            ProviderKind::Xai => config.quota.limits.xai = limit,
            ProviderKind::Anthropic => config.quota.limits.anthropic = limit,
        }
    }

    println!("\n✓ Quota configured.\n");
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Prints a summary table of the configuration.
pub fn show_config_summary(config: &Config) {
    println!("\n📊 Configuration Summary\n");
    println!("┌─────────────────────────────────────────────────┐");
    println!("│ General                                         │");
    println!("├─────────────────────────────────────────────────┤");
    println!("│ Log level: {:<36} │", config.general.log_level);
    println!("│ Log format: {:<35} │", config.general.log_format);
    println!("├─────────────────────────────────────────────────┤");
    println!("│ Providers                                       │");
    println!("├─────────────────────────────────────────────────┤");
    for kind in ProviderKind::ALL {
        let provider = config.providers.get(kind);
        println!(
            "│ {:<10} {} {:<34} │",
            kind.name(),
            if provider.enabled { "✓" } else { "✗" },
            provider.model.as_deref().unwrap_or("-")
        );
    }
    println!("├─────────────────────────────────────────────────┤");
    println!("│ Consensus                                       │");
    println!("├─────────────────────────────────────────────────┤");
    println!("│ Voter: {:<40} │", config.consensus.voter.to_string());
    println!("│ Temperature: {:<34} │", config.consensus.temperature);
    println!("│ Timeout: {:<36}ms │", config.consensus.timeout_ms);
    println!(
        "│ Judge: {:<40} │",
        format!("{} / {}", config.judge.provider, config.judge.model)
    );
    println!("├─────────────────────────────────────────────────┤");
    println!("│ Quota                                           │");
    println!("├─────────────────────────────────────────────────┤");
    println!(
        "│ Enforced: {:<37} │",
        if config.quota.enabled { "Yes" } else { "No" }
    );
    if config.quota.enabled {
        for kind in ProviderKind::ALL {
            let limit = config
                .quota
                .limits
                .get(kind)
                .map(|l| format!("{} req / {} tokens", l.requests, l.tokens))
                .unwrap_or_else(|| "unlimited".to_string());
            println!("│ {:<10} {:<36} │", kind.name(), limit);
        }
    }
    println!("└─────────────────────────────────────────────────┘");
    println!();
}
