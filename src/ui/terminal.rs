use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, Stylize},
    terminal::{self, Clear, ClearType},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::{Duration, Instant};

use super::{format_duration, theme_color};
use crate::ai::{ConversationStats, ProviderKind};
use crate::commands::format_help_text;
use crate::config::{Config, UiConfig};
use crate::memory::MemoryStats;
use crate::personality::{PersonalityInfo, PersonalityStats};

pub struct Terminal {
    color: Color,
    typing: bool,
    animation: Duration,
    clear_on_start: bool,
}

/// Spinner shown while the companion is "typing".
pub struct Typing {
    bar: Option<ProgressBar>,
    started: Instant,
    min: Duration,
}

impl Typing {
    /// Stop the spinner, keeping it up for at least the configured time.
    pub async fn done(self) {
        let Some(bar) = self.bar else {
            return;
        };
        let remaining = self.min.saturating_sub(self.started.elapsed());
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        bar.finish_and_clear();
    }
}

/// Negative, NaN and out-of-range lengths fall back to one second.
fn animation_length(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::from_secs(1))
}

impl Terminal {
    pub fn from_config(ui: &UiConfig) -> Self {
        Self {
            color: theme_color(&ui.theme),
            typing: ui.show_typing_animation,
            animation: animation_length(ui.animation_duration),
            clear_on_start: ui.clear_screen_on_start,
        }
    }

    pub fn clear(&self) -> Result<()> {
        execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
        Ok(())
    }

    pub fn welcome(&self, companion_name: &str, personality: &PersonalityInfo) -> Result<()> {
        if self.clear_on_start {
            self.clear()?;
        }
        let rule = "─".repeat(48);
        println!("{}", rule.as_str().with(self.color));
        println!(
            "  {} {}",
            "💕".with(self.color),
            format!("{} v{}", companion_name, env!("CARGO_PKG_VERSION"))
                .with(self.color)
                .bold()
        );
        println!(
            "  Personality: {} ({})",
            personality.name.bold(),
            personality.description
        );
        println!("  Type {} for commands, {} to exit", "help".bold(), "quit".bold());
        println!("{}\n", rule.as_str().with(self.color));
        Ok(())
    }

    pub fn help(&self) {
        println!("\n{}\n", format_help_text());
    }

    pub fn companion_message(&self, name: &str, text: &str) {
        println!(
            "\n{} {}\n",
            format!("{}:", name).with(self.color).bold(),
            text
        );
    }

    pub fn typing(&self, name: &str) -> Typing {
        let bar = self.typing.then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.dim} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.set_message(format!("{} is typing...", name));
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });
        Typing {
            bar,
            started: Instant::now(),
            min: self.animation,
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("❌ {}", message.red());
    }

    pub fn success(&self, message: &str) {
        println!("✅ {}", message.green());
    }

    pub fn warning(&self, message: &str) {
        println!("⚠️  {}", message.yellow());
    }

    pub fn info(&self, message: &str) {
        println!("ℹ️  {}", message.cyan());
    }

    /// Numbered menu; entry 0 cancels. `current` is marked.
    pub fn menu(&self, title: &str, items: &[String], current: Option<usize>) {
        println!("\n{}", title.with(self.color).bold());
        for (i, item) in items.iter().enumerate() {
            let marker = if Some(i) == current { " ←" } else { "" };
            println!("  {}. {}{}", i + 1, item, marker.dark_grey());
        }
        println!("  0. {}", "Cancel".dark_grey());
    }

    pub fn personality_menu(&self, options: &[PersonalityInfo], current: &PersonalityInfo) {
        let items: Vec<String> = options
            .iter()
            .map(|p| format!("{} - {}", p.name, p.description))
            .collect();
        let current = options.iter().position(|p| p.kind == current.kind);
        self.menu("Choose a personality", &items, current);
    }

    fn table(&self, title: &str, rows: &[(&str, String)]) {
        println!("\n{}", title.with(self.color).bold());
        let width = rows.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        for (key, value) in rows {
            let pad = width - key.chars().count();
            println!("  {}{}  {}", key.dark_grey(), " ".repeat(pad), value);
        }
    }

    pub fn memory_stats(&self, stats: &MemoryStats) {
        self.table(
            "Memory",
            &[
                ("User", stats.user_id.clone()),
                ("Total memories", stats.total_memories.to_string()),
                ("Session memories", stats.session_memories.to_string()),
                (
                    "Long-term memory",
                    if stats.long_term_enabled { "active" } else { "off" }.to_string(),
                ),
                ("Store size", format!("{} KB", stats.store_size_kb)),
                (
                    "Last updated",
                    stats.last_updated.format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
            ],
        );
    }

    pub fn personality_stats(&self, stats: &PersonalityStats) {
        self.table(
            "Personality",
            &[
                ("Current", format!("{} ({})", stats.name, stats.current)),
                ("Mood", format!("{:.1}/1.0", stats.mood)),
                ("Interactions", stats.interaction_count.to_string()),
                ("Recent context", stats.context_size.to_string()),
            ],
        );
    }

    pub fn system_info(&self, session: Duration) {
        let size = terminal::size()
            .map(|(cols, rows)| format!("{}x{}", cols, rows))
            .unwrap_or_else(|_| "unknown".to_string());
        self.table(
            "System",
            &[
                (
                    "Platform",
                    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
                ),
                ("Terminal", size),
                ("Session time", format_duration(session)),
            ],
        );
    }

    pub fn ai_stats(&self, stats: &ConversationStats) {
        let last = stats
            .last_conversation
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        self.table(
            "AI",
            &[
                ("Provider", stats.provider.clone()),
                ("Model", stats.model.clone()),
                (
                    "Status",
                    if stats.initialized { "ready" } else { "offline" }.to_string(),
                ),
                ("Conversations", stats.total_conversations.to_string()),
                ("Tokens used", stats.total_tokens_used.to_string()),
                ("Last reply", last),
            ],
        );
    }

    /// `provider` and `model` are the live ones, which may differ from the
    /// file after an in-chat switch.
    pub fn config_summary(&self, config: &Config, provider: ProviderKind, model: &str) {
        self.table(
            "Configuration",
            &[
                ("Companion", config.companion.name.clone()),
                ("Provider", format!("{} ({})", provider, model)),
                ("Temperature", format!("{:.1}", config.ai.temperature)),
                ("Max tokens", config.ai.max_tokens.to_string()),
                ("Fallbacks", config.ai.fallback_providers.join(", ")),
                (
                    "Long-term memory",
                    config.memory.long_term_enabled.to_string(),
                ),
                ("Embeddings", config.memory.embedding_provider.clone()),
                ("Theme", config.ui.theme.clone()),
            ],
        );
        println!();
    }

    pub fn goodbye(&self, companion_name: &str, user_name: &str, session: Duration) {
        let who = if user_name.trim().is_empty() {
            String::new()
        } else {
            format!("{}님, ", user_name)
        };
        println!(
            "\n{} {}",
            format!("{}:", companion_name).with(self.color).bold(),
            format!("{}오늘 대화 즐거웠어요. 또 만나요! 👋", who)
        );
        println!(
            "{}",
            format!("Session time: {}", format_duration(session)).dark_grey()
        );
    }
}
