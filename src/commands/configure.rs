use anyhow::Result;
use std::path::Path;

use memmer::config::{default_config_path, ConfigKey, Settings};

pub fn run(command: super::ConfigCommand, mut settings: Settings, path: Option<&Path>) -> Result<()> {
    match command {
        super::ConfigCommand::Show => {
            let file = match path {
                Some(p) => p.display().to_string(),
                None => default_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "<none>".to_string()),
            };
            println!("Configuration file: {}", file);

            for key in ConfigKey::ALL {
                let value = settings.get(key).unwrap_or_default();
                println!("  {:<24} = {}", key.name(), value);
            }
        }
        super::ConfigCommand::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            settings.set(key, &value)?;
            let saved = settings.save(path)?;

            println!("Set {} in '{}'", key.name(), saved.display());
        }
    }

    Ok(())
}
