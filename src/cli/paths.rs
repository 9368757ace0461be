//! CLI subcommand: `companion paths`
//!
//! Prints all resolved XDG-compliant paths for debugging and scripting.

use anyhow::Result;

use crate::paths::Paths;

pub fn run(user_id: &str) -> Result<()> {
    let paths = Paths::resolve()?;

    println!("Companion Paths (XDG Base Directory)");
    println!("====================================");
    println!();
    println!("Config:     {}", paths.config_dir.display());
    println!("  config.toml:    {}", paths.config_file().display());
    println!();
    println!("Data:       {}", paths.data_dir.display());
    println!("  profile:        {}", paths.profile_file(user_id).display());
    println!("  memory store:   {}", paths.memory_db(user_id).display());
    println!();
    println!("State:      {}", paths.state_dir.display());
    println!("  logs:           {}", paths.logs_dir().display());
    println!();
    match paths.runtime_dir {
        Some(ref dir) => println!("Runtime:    {}", dir.display()),
        None => println!("Runtime:    (not available)"),
    }
    println!("  profile lock:   {}", paths.profile_lock(user_id).display());

    Ok(())
}
