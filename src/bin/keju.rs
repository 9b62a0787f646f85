use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use keju_agent::coach::{CareerPathPrompt, ProfileUpdate};
use keju_agent::{CareerAssistant, CoachUi, ProfileData, Settings};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Prints UI effects and keeps the profile in sync with summary edits.
struct TerminalUi {
    profile: Mutex<ProfileData>,
}

impl TerminalUi {
    fn profile(&self) -> ProfileData {
        self.profile
            .lock()
            .map(|profile| profile.clone())
            .unwrap_or_default()
    }
}

impl CoachUi for TerminalUi {
    fn navigate(&self, path: &str, state: Value) {
        println!("[navigate] {path} {state}");
    }

    fn update_profile(&self, update: ProfileUpdate) {
        if let Some(summary) = &update.summary {
            println!("[profile] summary updated: {summary}");
        }
        if let Ok(mut profile) = self.profile.lock() {
            profile.apply(update);
        }
    }

    fn prompt_career_path(&self, prompt: CareerPathPrompt) {
        println!(
            "[career path] {} -> {} (replaces existing: {})",
            prompt.current_role, prompt.target_role, prompt.is_replacing
        );
    }
}

#[derive(Parser, Debug)]
#[command(name = "keju", version, about = "Terminal career coach powered by Gemini")]
struct Cli {
    /// TOML settings file; environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON profile to start the session with.
    #[arg(long)]
    profile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(args.config.as_deref())?;
    let profile = match &args.profile {
        Some(path) => serde_json::from_str::<ProfileData>(&fs::read_to_string(path)?)?,
        None => ProfileData::default(),
    };

    let coach = settings.career_coach()?;
    let ui = Arc::new(TerminalUi {
        profile: Mutex::new(profile.clone()),
    });
    let mut assistant = CareerAssistant::new(coach.clone(), ui.clone(), &profile, &[])?;

    tracing::info!(model = %settings.pro_model, "keju_session_started");
    println!("Career coach ready. Commands: /fetch <url>, /reset, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                assistant.reset();
                println!("Session cleared.");
                continue;
            }
            _ => {}
        }

        if let Some(url) = line.strip_prefix("/fetch ") {
            match coach.fetch_job_description(url).await {
                Ok(text) => println!("{text}\n"),
                Err(err) => eprintln!("error: {err}"),
            }
            continue;
        }

        let current = ui.profile();
        let reply = assistant
            .send_with_steps(line, &current, |step| println!("... {step}"))
            .await;
        match reply {
            Ok(text) => println!("\n{text}\n"),
            Err(err) => eprintln!("error: {err}"),
        }
    }

    Ok(())
}
