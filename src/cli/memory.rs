use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::{self, BufRead, Write};
use tracing::warn;

use crate::config::Config;
use crate::memory::{MemoryManager, create_embedder};
use crate::ui::parse_confirmation;

#[derive(Args)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Search memory
    Search {
        /// Search query
        query: String,

        /// Maximum number of results (default: memory.search_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show memory statistics
    Stats,

    /// List recent long-term memories
    Recent {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Delete all long-term memories of the user
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run(args: MemoryArgs, config: Config, user_id: &str) -> Result<()> {
    let embedder = match create_embedder(&config.memory, &config.providers.openai) {
        Ok(embedder) => embedder,
        Err(e) => {
            warn!("Embeddings disabled: {:#}", e);
            None
        }
    };
    let mut memory = MemoryManager::initialize(
        &config.memory,
        &config.paths.memory_db(user_id),
        user_id,
        embedder,
    );

    match args.command {
        MemoryCommands::Search { query, limit } => {
            let limit = limit.unwrap_or(config.memory.search_limit);
            search_memory(&memory, &query, limit).await
        }
        MemoryCommands::Stats => show_stats(&memory),
        MemoryCommands::Recent { count } => show_recent(&memory, count),
        MemoryCommands::Clear { yes } => clear_memory(&mut memory, yes),
    }
}

async fn search_memory(memory: &MemoryManager, query: &str, limit: usize) -> Result<()> {
    let result = memory.search_memories(query, limit).await;

    if result.entries.is_empty() {
        println!("No results found for '{}'", query);
        return Ok(());
    }

    println!(
        "Found {} results for '{}' ({} memory, {:?}):\n",
        result.total_count, query, result.source, result.search_time
    );

    for (i, entry) in result.entries.iter().enumerate() {
        println!(
            "{}. [{}] {}",
            i + 1,
            entry.memory_type,
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(score) = entry.score {
            println!("   Score: {:.3}", score);
        }

        // Show preview (first 200 chars)
        let preview: String = entry.content.chars().take(200).collect();
        let preview = preview.replace('\n', " / ");
        println!(
            "   {}{}\n",
            preview,
            if entry.content.chars().count() > 200 {
                "..."
            } else {
                ""
            }
        );
    }

    Ok(())
}

fn show_stats(memory: &MemoryManager) -> Result<()> {
    let stats = memory.stats();

    println!("Memory Statistics");
    println!("-----------------");
    println!("User: {}", stats.user_id);
    println!(
        "Long-term memory: {}",
        if stats.long_term_enabled {
            "active"
        } else {
            "off"
        }
    );
    println!("Total memories: {}", stats.total_memories);
    println!("Store size: {} KB", stats.store_size_kb);
    println!(
        "Last updated: {}",
        stats.last_updated.format("%Y-%m-%d %H:%M:%S")
    );

    let preferences = memory.user_preferences();
    if !preferences.is_empty() {
        println!("\nPreferences:");
        for pref in preferences {
            println!("  {}", pref.content);
        }
    }

    Ok(())
}

fn show_recent(memory: &MemoryManager, count: usize) -> Result<()> {
    let entries = memory.recent_long_term(count)?;

    if entries.is_empty() {
        println!("No long-term memories found");
        return Ok(());
    }

    println!("Recent memories:\n");

    for entry in entries {
        println!(
            "[{}] {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S"),
            entry.memory_type
        );
        println!("  {}\n", entry.content.replace('\n', "\n  "));
    }

    Ok(())
}

fn clear_memory(memory: &mut MemoryManager, yes: bool) -> Result<()> {
    if !memory.long_term_active() {
        println!("Long-term memory is not enabled");
        return Ok(());
    }

    if !yes {
        print!(
            "Delete all long-term memories of '{}'? (y/n) ",
            memory.user_id()
        );
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        if !parse_confirmation(&answer) {
            println!("Cancelled");
            return Ok(());
        }
    }

    let removed = memory.clear_long_term()?;
    println!("Removed {} memories", removed);
    Ok(())
}
