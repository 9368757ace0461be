use anyhow::Result;
use clap::Args;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::commands::{Command, parse_command};
use crate::companion::Companion;
use crate::concurrency::ProfileLock;
use crate::config::{Config, validation_summary};
use crate::personality::{PersonalityEngine, PersonalityType};
use crate::ui::{Terminal, parse_confirmation, parse_menu_choice};

#[derive(Args, Default)]
pub struct ChatArgs {
    /// Personality to start with (caring, playful, intellectual, romantic)
    #[arg(short, long)]
    pub personality: Option<String>,

    /// AI provider (overrides config)
    #[arg(long)]
    pub provider: Option<String>,

    /// Model for the provider (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(args: ChatArgs, mut config: Config, user_id: &str) -> Result<()> {
    super::apply_ai_overrides(&mut config, args.provider.as_deref(), args.model.as_deref())?;
    let personality = args
        .personality
        .as_deref()
        .map(str::parse::<PersonalityType>)
        .transpose()?;

    let ui = Terminal::from_config(&config.ui);

    let lock = ProfileLock::for_user(&config.paths, user_id)?;
    let Some(_guard) = lock.try_acquire()? else {
        ui.error(&format!(
            "Another chat session is already open for '{}'. Close it first.",
            user_id
        ));
        return Ok(());
    };

    let name = config.companion.name.clone();
    let mut companion = Companion::new(config, user_id);
    if let Some(kind) = personality {
        companion.change_personality(kind);
    }

    ui.welcome(&name, &companion.personality())?;
    ui.info("Getting ready...");
    let report = companion.initialize().await;
    if report.ai_ready {
        ui.success(&format!(
            "AI ready: {} ({})",
            companion.current_provider(),
            companion.current_model()
        ));
    } else {
        ui.warning(&format!(
            "{} is not responding. Replies will be limited until it is back.",
            companion.current_provider()
        ));
    }
    if report.long_term_memory {
        ui.success("Long-term memory ready");
    } else {
        ui.info("Using session memory only");
    }
    if !report.any_ready() {
        ui.warning("Running in offline mode");
    }
    println!();

    let mut rl = DefaultEditor::new()?;

    if companion.needs_name()
        && let Some(answer) = prompt(&mut rl, "What should I call you? ")
        && let Some(user_name) = accept_name(&answer)
    {
        companion.set_user_name(user_name);
    }
    ui.companion_message(&name, &companion.greeting());

    loop {
        let input = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                if prompt(&mut rl, "Really quit? (y/n) ").is_none_or(|a| parse_confirmation(&a)) {
                    break;
                }
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                ui.error(&format!("Input error: {}", e));
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        if let Some(command) = parse_command(input) {
            companion.record_command(command.name());
            match handle_command(command, &mut companion, &ui, &mut rl).await {
                Flow::Quit => break,
                Flow::Continue => continue,
            }
        }

        let typing = ui.typing(&name);
        let outcome = companion.respond(input).await;
        typing.done().await;

        if outcome.degraded {
            ui.warning("No AI provider answered; this is an offline reply.");
        }
        ui.companion_message(&name, &outcome.reply);
    }

    ui.goodbye(&name, &companion.profile().name, companion.session_duration());
    if let Err(e) = companion.finish() {
        warn!("Failed to save profile: {:#}", e);
        ui.error(&format!("Could not save your profile: {:#}", e));
    }
    info!("Chat session closed");
    Ok(())
}

/// One line of input; `None` on Ctrl-C, Ctrl-D or a read error.
fn prompt(rl: &mut DefaultEditor, text: &str) -> Option<String> {
    rl.readline(text).ok().map(|s| s.trim().to_string())
}

/// A usable name: not blank and not an exit command.
fn accept_name(answer: &str) -> Option<&str> {
    let name = answer.trim();
    if name.is_empty() || matches!(parse_command(name), Some(Command::Quit)) {
        return None;
    }
    Some(name)
}

/// Clear the session memory if `answer` confirms it. Returns whether it did.
fn clear_session_on_confirm(companion: &mut Companion, answer: Option<&str>) -> bool {
    if !answer.is_some_and(parse_confirmation) {
        return false;
    }
    companion.clear_session_memory();
    true
}

/// Ask for a menu entry. `None` means cancelled or invalid (already reported).
fn choose(rl: &mut DefaultEditor, ui: &Terminal, len: usize) -> Option<usize> {
    let answer = prompt(rl, "Choice: ")?;
    match parse_menu_choice(&answer, len) {
        Some(Some(index)) => Some(index),
        Some(None) => {
            ui.info("Cancelled");
            None
        }
        None => {
            ui.error(&format!("Please enter a number between 0 and {}", len));
            None
        }
    }
}

async fn handle_command(
    command: Command,
    companion: &mut Companion,
    ui: &Terminal,
    rl: &mut DefaultEditor,
) -> Flow {
    match command {
        Command::Quit => return Flow::Quit,
        Command::Help => ui.help(),
        Command::Clear => {
            if let Err(e) = ui.clear() {
                ui.error(&format!("Could not clear the screen: {}", e));
            }
        }
        Command::Stats => {
            ui.memory_stats(&companion.memory_stats());
            ui.personality_stats(&companion.personality_stats());
            ui.system_info(companion.session_duration());
            ui.ai_stats(&companion.ai_stats());
            println!();
        }
        Command::Memory => {
            let stats = companion.memory_stats();
            ui.memory_stats(&stats);
            println!();
            if stats.session_memories > 0 {
                let answer = prompt(rl, "Clear this session's memory? (y/n) ");
                if clear_session_on_confirm(companion, answer.as_deref()) {
                    ui.success("Session memory cleared");
                }
            }
        }
        Command::Config => {
            ui.config_summary(
                companion.config(),
                companion.current_provider(),
                &companion.current_model(),
            );
            println!("{}\n", validation_summary(&companion.config().validate()));
        }
        Command::Personality => {
            let options = PersonalityEngine::available();
            ui.personality_menu(&options, &companion.personality());
            if let Some(index) = choose(rl, ui, options.len()) {
                let chosen = &options[index];
                companion.change_personality(chosen.kind);
                ui.success(&format!("Personality changed to {}", chosen.name));
                ui.companion_message(&companion.config().companion.name, &companion.greeting());
            }
        }
        Command::Provider => {
            let providers = companion.available_providers();
            let items: Vec<String> = providers
                .iter()
                .map(|p| format!("{} - {}", p, p.description()))
                .collect();
            let current = providers
                .iter()
                .position(|p| *p == companion.current_provider());
            ui.menu("Choose an AI provider", &items, current);
            if let Some(index) = choose(rl, ui, providers.len()) {
                let kind = providers[index];
                match companion.switch_provider(kind.as_str()).await {
                    Ok(true) => ui.success(&format!(
                        "Switched to {} ({})",
                        kind,
                        companion.current_model()
                    )),
                    Ok(false) => ui.warning(&format!(
                        "Switched to {}, but it is not responding",
                        kind
                    )),
                    Err(e) => ui.error(&format!("{:#}", e)),
                }
            }
        }
        Command::Model => {
            let models = companion.available_models().await;
            let current_model = companion.current_model();
            let current = models.iter().position(|m| *m == current_model);
            ui.menu(
                &format!("Choose a {} model", companion.current_provider()),
                &models,
                current,
            );
            if let Some(index) = choose(rl, ui, models.len()) {
                match companion.switch_model(&models[index]).await {
                    Ok(true) => ui.success(&format!("Model changed to {}", models[index])),
                    Ok(false) => ui.warning(&format!(
                        "Model changed to {}, but the provider is not responding",
                        models[index]
                    )),
                    Err(e) => ui.error(&format!("{:#}", e)),
                }
            }
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{Completion, ConversationService, MockLLMProvider, ProviderKind};
    use crate::config::ProfileConfig;
    use crate::memory::MemoryManager;
    use crate::profile::ProfileStore;
    use tempfile::TempDir;

    fn companion(temp: &TempDir) -> Companion {
        let mut config = Config::default();
        config.ai.max_retries = 0;
        let mut mock = MockLLMProvider::new();
        mock.expect_kind().return_const(ProviderKind::Ollama);
        mock.expect_complete().returning(|_| {
            Ok(Completion {
                content: "반가워요!".to_string(),
                tokens_used: None,
                provider: ProviderKind::Ollama,
                model: "gemma3:1b".to_string(),
            })
        });
        let ai = ConversationService::with_chain(
            config.ai.clone(),
            config.providers.clone(),
            vec![Box::new(mock)],
        );
        let memory = MemoryManager::with_store(&config.memory, "alice", None, None);
        let store = ProfileStore::new(temp.path().join("alice.json"), &ProfileConfig::default());
        Companion::with_parts(config, ai, memory, store)
    }

    #[test]
    fn exit_words_are_not_names() {
        assert_eq!(accept_name("  민지 "), Some("민지"));
        assert_eq!(accept_name("   "), None);
        for word in ["quit", "EXIT", "종료", "나가기", "/quit"] {
            assert_eq!(accept_name(word), None, "{}", word);
        }
    }

    #[tokio::test]
    async fn session_memory_clears_only_when_confirmed() {
        let temp = TempDir::new().unwrap();
        let mut companion = companion(&temp);
        companion.respond("안녕").await;
        assert_eq!(companion.memory_stats().session_memories, 1);

        assert!(!clear_session_on_confirm(&mut companion, None));
        assert!(!clear_session_on_confirm(&mut companion, Some("n")));
        assert_eq!(companion.memory_stats().session_memories, 1);

        assert!(clear_session_on_confirm(&mut companion, Some("네")));
        assert_eq!(companion.memory_stats().session_memories, 0);
    }
}
