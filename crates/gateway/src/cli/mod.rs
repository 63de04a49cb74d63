pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

/// PortalPilot: a natural-language assistant for your workspace.
#[derive(Debug, Parser)]
#[command(name = "portalpilot", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP service (default when no subcommand is given).
    Serve,
    /// Send a single message through the pipeline and print the reply.
    Run {
        /// The message to send.
        message: String,
        /// Caller's workspace session token (any non-empty value in memory mode).
        #[arg(long, env = "PP_TOKEN", default_value = "")]
        token: String,
        /// Feature to route to: analyze-projects or general-chat.
        #[arg(long, default_value = "analyze-projects")]
        feature: String,
        /// Optional attachment URL (PDF, DOCX, audio or image).
        #[arg(long)]
        attachment: Option<String>,
        /// MIME type of the attachment, when the URL does not make it obvious.
        #[arg(long)]
        attachment_type: Option<String>,
        /// Output the reply as JSON instead of plain text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML, secrets masked.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `PP_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the
/// path that was used. A missing file yields the built-in defaults.
///
/// [`Config`]: pp_domain::config::Config
pub fn load_config() -> anyhow::Result<(pp_domain::config::Config, String)> {
    let config_path = std::env::var("PP_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<pp_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(pp_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = load_config_from("/definitely/not/here.toml").unwrap();
        assert_eq!(cfg.server.port, pp_domain::config::Config::default().server.port);
    }

    #[test]
    fn parse_errors_name_the_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[server\nport = ").unwrap();
        let path = f.path().to_string_lossy().to_string();
        let err = load_config_from(&path).unwrap_err().to_string();
        assert!(err.starts_with(&format!("parsing {path}")), "{err}");
    }

    #[test]
    fn run_parses_flags() {
        let cli = Cli::try_parse_from([
            "portalpilot",
            "run",
            "list my projects",
            "--token",
            "u1",
            "--feature",
            "general-chat",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Run { message, token, feature, .. }) => {
                assert_eq!(message, "list my projects");
                assert_eq!(token, "u1");
                assert_eq!(feature, "general-chat");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn token_falls_back_to_the_environment() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        cmd.clone().debug_assert();
        let run = cmd.find_subcommand("run").unwrap();
        let token = run.get_arguments().find(|a| a.get_id() == "token").unwrap();
        assert_eq!(token.get_env(), Some(std::ffi::OsStr::new("PP_TOKEN")));
    }
}
