use anyhow::{Result, bail};
use clap::Args;
use futures::StreamExt;
use std::io::{self, Write};
use tracing::warn;

use crate::ai::{ConversationService, offline_reply};
use crate::companion::Companion;
use crate::concurrency::ProfileLock;
use crate::config::Config;
use crate::personality::{PersonalityType, SystemPromptParams, build_system_prompt};

#[derive(Args)]
pub struct AskArgs {
    /// Message to send
    pub message: String,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    pub format: String,

    /// Print the reply as it is generated (text only; skips memory)
    #[arg(long)]
    pub stream: bool,

    /// AI provider (overrides config)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model for the provider (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,
}

pub async fn run(args: AskArgs, mut config: Config, user_id: &str) -> Result<()> {
    super::apply_ai_overrides(&mut config, args.provider.as_deref(), args.model.as_deref())?;

    if args.stream {
        if args.format == "json" {
            bail!("--stream only supports text output");
        }
        return stream_reply(&args.message, config).await;
    }

    let lock = ProfileLock::for_user(&config.paths, user_id)?;
    let Some(_guard) = lock.try_acquire()? else {
        bail!("A chat session is open for '{}'; try again after it ends", user_id);
    };

    let mut companion = Companion::new(config, user_id);
    companion.initialize().await;
    let outcome = companion.respond(&args.message).await;
    companion.finish()?;

    match args.format.as_str() {
        "json" => {
            let output = serde_json::json!({
                "message": args.message,
                "response": outcome.reply,
                "sentiment": outcome.sentiment,
                "provider": outcome.provider,
                "model": outcome.model,
                "degraded": outcome.degraded,
                "preferences": outcome.preferences,
                "session_id": companion.session_id(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("{}", outcome.reply);
        }
    }

    Ok(())
}

async fn stream_reply(message: &str, config: Config) -> Result<()> {
    let personality: PersonalityType = config
        .companion
        .default_personality
        .parse()
        .unwrap_or_default();
    let system_prompt = build_system_prompt(SystemPromptParams::new(personality));

    let mut service = ConversationService::new(config.ai.clone(), config.providers.clone());
    service.initialize().await;

    let mut stdout = io::stdout();
    match service.generate_stream(message, &system_prompt).await {
        Ok(mut stream) => {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(text) => {
                        print!("{}", text);
                        stdout.flush()?;
                    }
                    Err(e) => {
                        warn!("Stream interrupted: {}", e);
                        break;
                    }
                }
            }
            println!();
        }
        Err(e) => {
            warn!("Streaming unavailable, using offline reply: {}", e);
            println!("{}", offline_reply(message));
        }
    }
    Ok(())
}
