mod client;
mod hook;
mod logging;

use anyhow::{Context, Result};
use aoa_core::{Config, ProjectHome, resolve_project_path};
use clap::{Parser, Subcommand};
use client::ApiClient;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "aoa")]
#[command(about = "Developer-activity observatory: intent capture and file prediction")]
struct Cli {
  /// Project directory (default: current directory, resolved to the git root)
  #[arg(long, global = true)]
  project: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create the project home document with a fresh project id
  Init,
  /// Run the daemon for this project
  Daemon {
    /// Log to the console instead of the project log file
    #[arg(long)]
    foreground: bool,
    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
  },
  /// Hook clients invoked by the agent (read the event payload from stdin)
  Hook {
    #[command(subcommand)]
    event: HookEvent,
  },
  /// Show store statistics
  Stats {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Show recent intent records
  Recent {
    #[arg(short, long, default_value = "10")]
    limit: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Rank files for a keyword set
  Predict {
    /// Comma- or space-separated keywords
    keywords: Vec<String>,
    #[arg(short, long, default_value = "3")]
    limit: usize,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
}

#[derive(Subcommand)]
enum HookEvent {
  /// PostToolUse: capture one tool call
  Tool,
  /// UserPromptSubmit: print predicted files as context
  Prompt,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
  let project_root = resolve_project_path(&cli.project.clone().unwrap_or(cwd));
  let config = Config::load_for_project(&project_root);

  match cli.command {
    Commands::Init => {
      logging::init_cli_logging();
      let home = ProjectHome::load_or_init(&project_root).context("failed to write the project home document")?;
      println!("Project {} ({})", home.name, home.project_id);
      println!("Home: {}", ProjectHome::home_path(&project_root).display());
      Ok(())
    }

    Commands::Daemon { foreground, port } => {
      let _guard = logging::init_daemon_logging(&project_root, foreground);

      let mut config = config;
      if let Some(port) = port {
        config.server.port = port;
      }

      // Configuration-load failures are the only non-zero exits
      let daemon = daemon::Daemon::new(project_root, config)?;
      daemon.run().await?;
      Ok(())
    }

    Commands::Hook { event } => {
      logging::init_hook_logging();
      // Hook clients never signal failure to the agent
      match event {
        HookEvent::Tool => hook::tool_event(&config, &project_root).await,
        HookEvent::Prompt => hook::prompt_event(&config, &project_root).await,
      }
      Ok(())
    }

    Commands::Stats { json } => {
      logging::init_cli_logging();
      let client = ApiClient::new(config.base_url(), Duration::from_secs(2));
      let response = client
        .get_json("/intent/recent?limit=1")
        .await
        .context("daemon not reachable (is `aoa daemon` running?)")?;

      let stats = &response["stats"];
      if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
      } else {
        println!("Records: {}", stats["total_records"]);
        println!("Unique files: {}", stats["unique_files"]);
        println!("Unique tags: {}", stats["unique_tags"]);
        if let Some(top) = stats["top_files"].as_array() {
          println!("Top files:");
          for entry in top {
            println!("  {} ({})", entry[0].as_str().unwrap_or("?"), entry[1]);
          }
        }
        if let Some(top) = stats["top_tags"].as_array() {
          println!("Top tags:");
          for entry in top {
            println!("  {} ({})", entry[0].as_str().unwrap_or("?"), entry[1]);
          }
        }
      }
      Ok(())
    }

    Commands::Recent { limit, json } => {
      logging::init_cli_logging();
      let client = ApiClient::new(config.base_url(), Duration::from_secs(2));
      let response = client
        .get_json(&format!("/intent/recent?limit={}", limit))
        .await
        .context("daemon not reachable (is `aoa daemon` running?)")?;

      if json {
        println!("{}", serde_json::to_string_pretty(&response["records"])?);
      } else {
        for record in response["records"].as_array().into_iter().flatten() {
          let tool = record["tool"].as_str().unwrap_or("?");
          let files: Vec<&str> = record["files"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|f| f.as_str())
            .collect();
          let tags: Vec<&str> = record["tags"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|t| t.as_str())
            .collect();
          println!("{:10} {} {}", tool, files.join(", "), tags.join(" "));
        }
      }
      Ok(())
    }

    Commands::Predict { keywords, limit, json } => {
      logging::init_cli_logging();
      let joined = keywords.join(",");
      let client = ApiClient::new(config.base_url(), Duration::from_secs(2));
      let response = client
        .get_json(&format!("/predict?keywords={}&limit={}", joined, limit))
        .await
        .context("daemon not reachable (is `aoa daemon` running?)")?;

      if json {
        println!("{}", serde_json::to_string_pretty(&response["files"])?);
      } else {
        let files = response["files"].as_array().cloned().unwrap_or_default();
        if files.is_empty() {
          println!("No predictions (not enough history yet)");
        }
        for file in files {
          println!(
            "{} ({:.2})",
            file["path"].as_str().unwrap_or("?"),
            file["confidence"].as_f64().unwrap_or(0.0)
          );
        }
      }
      Ok(())
    }
  }
}
