use pp_domain::config::{Config, ConfigSeverity, WorkspaceMode};

const MASK: &str = "********";

/// Parse and validate the config, printing any issues and a short summary
/// of what would be started.
///
/// Returns `false` when errors are found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    let backend = match config.workspace.mode {
        WorkspaceMode::Rest => format!("rest ({})", config.workspace.base_url),
        WorkspaceMode::Memory => "memory (offline demo)".to_string(),
    };
    let mut roles: Vec<String> = config
        .llm
        .roles
        .iter()
        .map(|(role, rc)| format!("{role}={}", rc.model))
        .collect();
    roles.sort();

    if !issues.is_empty() {
        println!();
    }
    println!("workspace: {backend}");
    println!("providers: {}", config.llm.providers.len());
    println!(
        "roles:     {}",
        if roles.is_empty() { "(none)".to_string() } else { roles.join(", ") }
    );
    println!("listen:    {}:{}", config.server.host, config.server.port);

    if issues.is_empty() {
        println!("\nConfig OK ({config_path})");
    } else {
        println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");
    }
    error_count == 0
}

/// Render the resolved config (with all defaults filled in) as TOML.
/// Plaintext provider keys are masked.
pub fn render(config: &Config) -> anyhow::Result<String> {
    let mut redacted = config.clone();
    for provider in redacted.llm.providers.iter_mut() {
        if provider.auth.key.is_some() {
            provider.auth.key = Some(MASK.to_string());
        }
    }
    toml::to_string_pretty(&redacted).map_err(|e| anyhow::anyhow!("serializing config: {e}"))
}

pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_keys_are_masked() {
        let cfg: Config = toml::from_str(
            r#"
            [[llm.providers]]
            id = "openai"
            kind = "openai_compat"
            base_url = "https://api.openai.com/v1"
            auth = { key = "sk-live-123" }
        "#,
        )
        .unwrap();
        let out = render(&cfg).unwrap();
        assert!(!out.contains("sk-live-123"));
        assert!(out.contains(MASK));
    }

    #[test]
    fn defaults_validate() {
        assert!(validate(&Config::default(), "config.toml"));
    }
}
