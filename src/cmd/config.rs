//! Configuration view and validation commands: `floop config`.

use anyhow::Result;

use floop::floop_config::{FloopConfig, FloopToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &FloopConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Floop Configuration");
            println!("===================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No floop.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();

            print_toml(&config.toml);

            println!("Effective values (with env/CLI overrides):");
            println!("  storage_path = \"{}\"", config.storage_path().display());
            println!("  route_prefix = \"{}\"", config.route_prefix());
            println!("  claude_cmd = \"{}\"", config.claude_cmd());
            println!();

            if !config_path.exists() {
                println!("Run 'floop config init' to create a floop.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No floop.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("floop.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            FloopToml::default().save(&config_path)?;

            println!("Created floop.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [storage] path");
            println!("  - [server] host, port, route_prefix, cors");
            println!("  - [watch] interval, timeout, tools, model");
            println!();
        }
    }

    Ok(())
}

fn print_toml(toml: &FloopToml) {
    println!("[storage]");
    println!("  path = \"{}\"", toml.storage.path);
    println!();

    println!("[server]");
    println!("  host = \"{}\"", toml.server.host);
    println!("  port = {}", toml.server.port);
    println!("  route_prefix = \"{}\"", toml.server.route_prefix);
    println!("  cors = {}", toml.server.cors);
    println!();

    println!("[submission]");
    println!("  default_type = \"{}\"", toml.submission.default_type);
    println!("  screenshot_max_size = {}", toml.submission.screenshot_max_size);
    println!("  max_message_length = {}", toml.submission.max_message_length);
    println!();

    println!("[watch]");
    println!("  interval = {}", toml.watch.interval);
    println!("  timeout = {}", toml.watch.timeout);
    println!("  retries = {}", toml.watch.retries);
    println!("  tools = \"{}\"", toml.watch.tools);
    if let Some(model) = &toml.watch.model {
        println!("  model = \"{}\"", model);
    }
    if let Some(cmd) = &toml.watch.claude_cmd {
        println!("  claude_cmd = \"{}\"", cmd);
    }
    println!();
}
