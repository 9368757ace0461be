use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use std::io::{self, BufRead, Write};

use crate::concurrency::ProfileLock;
use crate::config::Config;
use crate::personality::{PersonalityInfo, PersonalityType};
use crate::profile::{ProfileStore, UserProfile};
use crate::ui::{format_duration, parse_confirmation};

#[derive(Args)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub command: ProfileCommands,
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Show the user's profile
    Show {
        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Replace the profile with a fresh one (the old file is backed up)
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run(args: ProfileArgs, config: Config, user_id: &str) -> Result<()> {
    let store = ProfileStore::for_user(&config.paths, user_id, &config.profile);
    let default_personality: PersonalityType = config
        .companion
        .default_personality
        .parse()
        .unwrap_or_default();

    match args.command {
        ProfileCommands::Show { format } => {
            let Some(profile) = store.load()? else {
                println!("No profile yet for '{}'", user_id);
                return Ok(());
            };
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&profile)?),
                _ => print_profile(&profile, &store),
            }
            Ok(())
        }
        ProfileCommands::Reset { yes } => {
            let lock = ProfileLock::for_user(&config.paths, user_id)?;
            let Some(_guard) = lock.try_acquire()? else {
                bail!("A chat session is open for '{}'; close it first", user_id);
            };
            if !store.exists() {
                println!("No profile to reset for '{}'", user_id);
                return Ok(());
            }

            if !yes {
                print!("Reset the profile of '{}'? (y/n) ", user_id);
                io::stdout().flush()?;
                let mut answer = String::new();
                io::stdin().lock().read_line(&mut answer)?;
                if !parse_confirmation(&answer) {
                    println!("Cancelled");
                    return Ok(());
                }
            }

            store.save(&UserProfile::new(user_id, default_personality))?;
            println!("Profile reset: {}", store.path().display());
            Ok(())
        }
    }
}

fn print_profile(profile: &UserProfile, store: &ProfileStore) {
    let stats = &profile.stats;
    let name = if profile.has_name() {
        profile.name.as_str()
    } else {
        "(not set)"
    };

    println!("Profile: {}", profile.user_id);
    println!("-----------------");
    println!("Name: {}", name);
    println!(
        "Personality: {}",
        PersonalityInfo::of(profile.preferred_personality).name
    );
    println!("Conversations: {}", stats.total_conversations);
    println!(
        "Time together: {}",
        format_duration(std::time::Duration::from_secs_f64(
            stats.total_session_time.max(0.0)
        ))
    );
    if let Some(favorite) = stats.favorite_personality {
        println!("Favorite personality: {}", PersonalityInfo::of(favorite).name);
    }
    if !stats.most_used_commands.is_empty() {
        println!("Most used commands: {}", stats.most_used_commands.join(", "));
    }
    println!(
        "Last active: {}",
        stats.last_active.format("%Y-%m-%d %H:%M:%S")
    );
    println!("Created: {}", profile.created_at.format("%Y-%m-%d"));

    let preferences = profile.preference_pairs();
    if !preferences.is_empty() {
        println!("\nPreferences:");
        for (category, value) in preferences {
            println!("  {}: {}", category, value);
        }
    }

    match store.backups() {
        Ok(backups) if !backups.is_empty() => println!("\nBackups: {}", backups.len()),
        _ => {}
    }
    println!("\nFile: {}", store.path().display());
}
