//! Platform settings commands

use anyhow::Result;
use roam_core::db::{setting_keys, Database};

pub fn cmd_settings_list(db: &Database) -> Result<()> {
    let stored = db.list_settings()?;

    println!();
    println!("⚙️  Settings");
    println!("   ─────────────────────────────────────────────────────────────");

    for key in setting_keys::ALL {
        match stored.iter().find(|(k, _)| k == key) {
            Some((_, value)) => println!("   {:<24} {}", key, value),
            None => println!("   {:<24} (default)", key),
        }
    }

    // Keys the pipeline does not read, kept for other tools
    for (key, value) in stored
        .iter()
        .filter(|(k, _)| !setting_keys::ALL.contains(&k.as_str()))
    {
        println!("   {:<24} {}", key, value);
    }

    Ok(())
}

pub fn cmd_settings_get(db: &Database, key: &str) -> Result<()> {
    match db.get_setting(key)? {
        Some(value) => println!("{}", value),
        None => println!("{} is not set", key),
    }
    Ok(())
}

pub fn cmd_settings_set(db: &Database, key: &str, value: &str) -> Result<()> {
    if !setting_keys::ALL.contains(&key) {
        tracing::warn!(key, "Setting is not read by the pipeline");
    }
    db.set_setting(key, value)?;
    println!("✅ {} = {}", key, value.trim());
    Ok(())
}

pub fn cmd_settings_unset(db: &Database, key: &str) -> Result<()> {
    if db.delete_setting(key)? {
        println!("✅ Removed {}", key);
    } else {
        println!("{} was not set", key);
    }
    Ok(())
}
