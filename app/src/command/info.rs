use lexia_config::Config;
use lexia_tools::default_registry;

/// Strategy for displaying configuration information.
///
/// Prints the provider (key masked), agent defaults, streaming mode and
/// the registered tools.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;

        println!("=== lexia Configuration ===\n");

        println!("Provider:");
        println!("  OpenAI Key: {}", mask_secret(config.provider.api_key.as_deref()));
        println!("  Base URL: {}", config.provider.base_url);
        println!("  Timeout: {}s", config.provider.timeout_secs);
        println!();

        println!("Agent Defaults:");
        println!("  Model: {}", config.agent.model);
        println!("  Max Tokens: {}", config.agent.max_tokens);
        println!("  Temperature: {}", config.agent.temperature);
        if let Some(ref prompt) = config.agent.system_prompt {
            println!("  System Prompt: {}", truncate(prompt, 60));
        }
        if let Some(ref message) = config.agent.project_system_message {
            println!("  Project Message: {}", truncate(message, 60));
        }
        println!("  History Limit: {}", config.agent.history_limit);
        println!();

        println!("Streaming:");
        println!("  Mode: {}", config.streaming.mode);
        println!(
            "  Relay URL: {}",
            config.streaming.relay_url.as_deref().unwrap_or("(not set)")
        );
        println!(
            "  Relay Key: {}",
            mask_secret(config.streaming.relay_api_key.as_deref())
        );
        println!();

        println!("Attachments:");
        println!("  Max Size: {} bytes", config.attachments.max_bytes);
        println!("  Timeout: {}s", config.attachments.timeout_secs);
        println!();

        println!("Tools: {}", default_registry().list().join(", "));

        Ok(())
    }
}

fn mask_secret(secret: Option<&str>) -> String {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return "(not set)".to_string();
    };
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "***".to_string()
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
