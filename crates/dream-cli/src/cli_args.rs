use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use dream_chat::DEFAULT_CHAT_API_BASE;
use dream_share::DEFAULT_SHARE_HOST;

fn parse_non_empty_host(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("host cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

fn parse_star_index(value: &str) -> Result<u8, String> {
    let parsed = value
        .parse::<u8>()
        .map_err(|error| format!("failed to parse star index: {error}"))?;
    if parsed > 4 {
        return Err("star index must be in range 0..=4".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "dream-widget",
    about = "Share-link and survey services for the Dream chat widget",
    version
)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides."
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve survey matching and share-link endpoints over HTTP.
    Serve(ServeArgs),
    /// Print the share link for a set of message indices.
    ShareUrl(ShareUrlArgs),
    /// Decode a share link into its dialog id and message indices.
    ParseShare(ParseShareArgs),
    /// Validate every survey config in a directory.
    CheckSurveys(CheckSurveysArgs),
    /// Send one message to the chat backend and print the reply.
    Say(SayArgs),
    /// Submit a dialog rating to the chat backend.
    RateDialog(RateDialogArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(
        long,
        env = "DREAM_GATEWAY_BIND",
        default_value = "127.0.0.1:8790",
        help = "Socket address the gateway listens on."
    )]
    pub bind: String,

    #[arg(
        long = "share-host",
        env = "DREAM_SHARE_HOST",
        default_value = DEFAULT_SHARE_HOST,
        value_parser = parse_non_empty_host,
        help = "Host (or full origin) that share links point at."
    )]
    pub share_host: String,

    #[arg(
        long = "survey-dir",
        env = "DREAM_SURVEY_DIR",
        help = "Directory of *.yml/*.yaml survey configs loaded at startup."
    )]
    pub survey_dir: Option<PathBuf>,

    #[arg(
        long = "strict-surveys",
        env = "DREAM_STRICT_SURVEYS",
        default_value_t = false,
        help = "Refuse to start when any survey config is invalid instead of skipping it."
    )]
    pub strict_surveys: bool,

    #[arg(
        long = "chat-api-base",
        env = "DREAM_CHAT_API_BASE",
        default_value = DEFAULT_CHAT_API_BASE,
        help = "Chat backend queried for shared dialog transcripts."
    )]
    pub chat_api_base: String,

    #[arg(long = "chat-timeout-ms", default_value_t = 30_000)]
    pub chat_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct ShareUrlArgs {
    #[arg(long = "dialog-id", help = "Opaque dialog identifier.")]
    pub dialog_id: String,

    #[arg(
        long,
        value_delimiter = ',',
        required = true,
        help = "Comma-separated message indices to share."
    )]
    pub indices: Vec<u32>,

    #[arg(
        long,
        env = "DREAM_SHARE_HOST",
        default_value = DEFAULT_SHARE_HOST,
        value_parser = parse_non_empty_host,
    )]
    pub host: String,
}

#[derive(Debug, Args)]
pub struct ParseShareArgs {
    /// Full share link, e.g. https://dream.deeppavlov.ai/shared?d=abc&m=0-2.5
    pub url: String,
}

#[derive(Debug, Args)]
pub struct CheckSurveysArgs {
    #[arg(long, env = "DREAM_SURVEY_DIR")]
    pub dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct ChatBackendArgs {
    #[arg(long = "api-base", env = "DREAM_CHAT_API_BASE", default_value = DEFAULT_CHAT_API_BASE)]
    pub api_base: String,

    #[arg(long = "user-id", env = "DREAM_USER_ID")]
    pub user_id: String,

    #[arg(long = "request-timeout-ms", default_value_t = 30_000)]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Args)]
pub struct SayArgs {
    #[command(flatten)]
    pub backend: ChatBackendArgs,

    pub message: String,
}

#[derive(Debug, Args)]
pub struct RateDialogArgs {
    #[command(flatten)]
    pub backend: ChatBackendArgs,

    #[arg(long = "dialog-id")]
    pub dialog_id: String,

    #[arg(
        long,
        value_parser = parse_star_index,
        help = "Zero-based star index as shown by the widget (0..=4)."
    )]
    pub stars: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_share_url_args_split_comma_separated_indices() {
        let cli = Cli::try_parse_from([
            "dream-widget",
            "share-url",
            "--dialog-id",
            "abc",
            "--indices",
            "0,1,2,5",
        ])
        .expect("parse cli");
        let Command::ShareUrl(args) = cli.command else {
            panic!("expected share-url command");
        };
        assert_eq!(args.dialog_id, "abc");
        assert_eq!(args.indices, vec![0, 1, 2, 5]);
        assert_eq!(args.host, DEFAULT_SHARE_HOST);
    }

    #[test]
    fn regression_share_url_args_require_indices() {
        let result = Cli::try_parse_from(["dream-widget", "share-url", "--dialog-id", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn regression_rate_dialog_rejects_star_index_out_of_range() {
        let result = Cli::try_parse_from([
            "dream-widget",
            "rate-dialog",
            "--user-id",
            "u",
            "--dialog-id",
            "d",
            "--stars",
            "5",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unit_serve_args_defaults() {
        let cli = Cli::try_parse_from(["dream-widget", "serve"]).expect("parse cli");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        assert_eq!(args.bind, "127.0.0.1:8790");
        assert!(args.survey_dir.is_none());
        assert!(!args.strict_surveys);
        assert_eq!(args.chat_api_base, DEFAULT_CHAT_API_BASE);
        assert_eq!(args.chat_timeout_ms, 30_000);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn unit_verbose_flag_counts_after_subcommand() {
        let cli = Cli::try_parse_from(["dream-widget", "check-surveys", "--dir", "surveys", "-vv"])
            .expect("parse cli");
        assert_eq!(cli.verbose, 2);
    }
}
