use anyhow::{Context, Result};
use dream_chat::{ChatBackend, ChatClientConfig, ChatRequest, DialogRating, DreamChatClient};
use dream_gateway::{run_gateway, GatewayConfig};
use dream_share::{build_share_url, parse_share_url, SharedMessageRef};
use dream_survey::{load_survey_catalog, SurveyCatalog, SurveyLoadOptions};

use crate::cli_args::{
    ChatBackendArgs, CheckSurveysArgs, Command, ParseShareArgs, RateDialogArgs, SayArgs,
    ServeArgs, ShareUrlArgs,
};

pub(crate) async fn run_command(command: Command) -> Result<()> {
    match command {
        Command::Serve(args) => run_gateway(gateway_config(args)).await,
        Command::ShareUrl(args) => {
            println!("{}", render_share_url(&args)?);
            Ok(())
        }
        Command::ParseShare(args) => {
            println!("{}", render_parsed_share(&args)?);
            Ok(())
        }
        Command::CheckSurveys(args) => {
            let catalog = check_surveys(&args)?;
            println!("{}", render_survey_summary(&catalog));
            Ok(())
        }
        Command::Say(args) => run_say(args).await,
        Command::RateDialog(args) => run_rate_dialog(args).await,
    }
}

fn gateway_config(args: ServeArgs) -> GatewayConfig {
    GatewayConfig {
        bind: args.bind,
        share_host: args.share_host,
        survey_dir: args.survey_dir,
        strict_surveys: args.strict_surveys,
        chat: ChatClientConfig {
            api_base: args.chat_api_base,
            request_timeout_ms: args.chat_timeout_ms,
        },
    }
}

fn render_share_url(args: &ShareUrlArgs) -> Result<String> {
    let messages: Vec<SharedMessageRef> = args
        .indices
        .iter()
        .copied()
        .map(SharedMessageRef::new)
        .collect();
    build_share_url(&args.dialog_id, &messages, &args.host)
        .with_context(|| format!("failed to build share url for dialog '{}'", args.dialog_id))
}

fn render_parsed_share(args: &ParseShareArgs) -> Result<String> {
    let dialog = parse_share_url(&args.url)
        .with_context(|| format!("failed to parse share url '{}'", args.url))?;
    serde_json::to_string_pretty(&dialog).context("failed to encode shared dialog")
}

fn check_surveys(args: &CheckSurveysArgs) -> Result<SurveyCatalog> {
    load_survey_catalog(&args.dir, SurveyLoadOptions { strict: true })
        .with_context(|| format!("invalid survey configs in '{}'", args.dir.display()))
}

fn render_survey_summary(catalog: &SurveyCatalog) -> String {
    let mut lines = vec![format!("surveys: {}", catalog.len())];
    lines.extend(catalog.surveys().iter().map(|survey| {
        format!(
            "{} with_probability={} options={}",
            survey.id,
            survey.trigger.with_probability,
            survey.options.len()
        )
    }));
    lines.join("\n")
}

fn chat_client(args: &ChatBackendArgs) -> Result<DreamChatClient> {
    DreamChatClient::new(ChatClientConfig {
        api_base: args.api_base.clone(),
        request_timeout_ms: args.request_timeout_ms,
    })
    .context("failed to construct chat client")
}

async fn run_say(args: SayArgs) -> Result<()> {
    let client = chat_client(&args.backend)?;
    let reply = client
        .send_message(&ChatRequest {
            user_id: args.backend.user_id.clone(),
            payload: args.message,
        })
        .await
        .context("chat backend request failed")?;
    println!("{}", reply.response);
    tracing::info!(
        dialog_id = %reply.dialog_id,
        utt_id = %reply.utt_id,
        active_skill = %reply.active_skill,
        "chat turn complete"
    );
    Ok(())
}

async fn run_rate_dialog(args: RateDialogArgs) -> Result<()> {
    let client = chat_client(&args.backend)?;
    let rating = DialogRating::from_star_index(
        args.backend.user_id.clone(),
        args.dialog_id.clone(),
        args.stars,
    )?;
    client
        .rate_dialog(&rating)
        .await
        .with_context(|| format!("failed to rate dialog '{}'", args.dialog_id))?;
    println!("rated dialog {} with {}", rating.dialog_id, rating.rating);
    Ok(())
}
