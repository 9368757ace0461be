//! In-chat commands, accepted bare (`help`) or slashed (`/help`), with
//! Korean aliases.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Quit,
    Help,
    Personality,
    Stats,
    Clear,
    Memory,
    Config,
    Provider,
    Model,
}

/// A chat command definition.
pub struct ChatCommand {
    pub command: Command,
    pub name: &'static str,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
}

impl ChatCommand {
    /// Format as a help line, e.g. "  help, 도움말        - Show this help"
    fn help_line(&self) -> String {
        let mut names = self.name.to_string();
        for alias in self.aliases {
            names.push_str(&format!(", {}", alias));
        }
        format!("  {:<28}- {}", names, self.description)
    }

    fn matches(&self, word: &str) -> bool {
        self.name == word || self.aliases.contains(&word)
    }
}

pub const COMMANDS: &[ChatCommand] = &[
    ChatCommand {
        command: Command::Help,
        name: "help",
        description: "Show available commands",
        aliases: &["도움말"],
    },
    ChatCommand {
        command: Command::Personality,
        name: "personality",
        description: "Change the companion's personality",
        aliases: &["성격"],
    },
    ChatCommand {
        command: Command::Stats,
        name: "stats",
        description: "Show memory, personality and AI statistics",
        aliases: &["통계"],
    },
    ChatCommand {
        command: Command::Memory,
        name: "memory",
        description: "Show memory status",
        aliases: &["기억"],
    },
    ChatCommand {
        command: Command::Provider,
        name: "provider",
        description: "Switch AI provider",
        aliases: &["ai"],
    },
    ChatCommand {
        command: Command::Model,
        name: "model",
        description: "Switch model of the current provider",
        aliases: &["모델"],
    },
    ChatCommand {
        command: Command::Config,
        name: "config",
        description: "Show current configuration",
        aliases: &["설정"],
    },
    ChatCommand {
        command: Command::Clear,
        name: "clear",
        description: "Clear the screen",
        aliases: &["클리어"],
    },
    ChatCommand {
        command: Command::Quit,
        name: "quit",
        description: "End the conversation",
        aliases: &["exit", "종료", "나가기"],
    },
];

impl Command {
    pub fn name(&self) -> &'static str {
        COMMANDS
            .iter()
            .find(|c| c.command == *self)
            .map_or("unknown", |c| c.name)
    }
}

/// Recognize a whole input line as a command. Anything else is chat.
pub fn parse_command(input: &str) -> Option<Command> {
    let trimmed = input.trim();
    let word = trimmed.strip_prefix('/').unwrap_or(trimmed).to_lowercase();
    if word.is_empty() || word.contains(char::is_whitespace) {
        return None;
    }
    COMMANDS.iter().find(|c| c.matches(&word)).map(|c| c.command)
}

pub fn format_help_text() -> String {
    let mut lines = vec!["Commands (with or without a leading /):".to_string()];
    for cmd in COMMANDS {
        lines.push(cmd.help_line());
    }
    lines.join("\n")
}
