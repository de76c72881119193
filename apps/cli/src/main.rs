use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use rollcoach_core::{
    ApiCredentials, BeltLevel, Coach, CoachConfig, CoachError, FfmpegTranscoder, GeminiClient,
    Profile, ReportMode, Session, YtDlpFetcher, format_report_readable, provider::API_KEY_ENV,
};

use crate::{
    interrupt::Interrupt,
    progress::{SpinnerProgress, create_spinner},
};

mod interrupt;
mod progress;

type AppCoach = Coach<GeminiClient, FfmpegTranscoder, YtDlpFetcher>;

/// CLI wrapper for BeltLevel (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliBelt {
    #[default]
    White,
    Blue,
    Purple,
    Brown,
    Black,
}

impl From<CliBelt> for BeltLevel {
    fn from(cli: CliBelt) -> Self {
        match cli {
            CliBelt::White => BeltLevel::White,
            CliBelt::Blue => BeltLevel::Blue,
            CliBelt::Purple => BeltLevel::Purple,
            CliBelt::Brown => BeltLevel::Brown,
            CliBelt::Black => BeltLevel::Black,
        }
    }
}

#[derive(Parser)]
#[command(name = "rollcoach")]
#[command(about = "Send a sparring video to Gemini for a coaching report, then ask follow-ups")]
struct Cli {
    /// Gemini API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Your belt level
    #[arg(short, long, default_value = "white")]
    belt: CliBelt,

    /// Favorite guards or moves (e.g., "De La Riva, Berimbolo")
    #[arg(short, long, default_value = "")]
    moves: String,

    /// What the coach should focus on
    #[arg(short, long, default_value = "")]
    concerns: String,

    /// How to spot you in the video (e.g., "blue gi, black belt")
    #[arg(short, long, default_value = "")]
    identity: String,

    /// Report language
    #[arg(short, long, default_value = "English")]
    lang: String,

    /// Gemini model id
    #[arg(long, default_value = rollcoach_core::config::DEFAULT_MODEL)]
    model: String,

    /// Ask for timestamped captions and burn them into the video
    #[arg(long)]
    captions: bool,

    /// Seconds to wait for Gemini to process the upload
    #[arg(long, default_value_t = 300)]
    timeout: u64,

    /// Local video to load on start
    #[arg(short, long, conflicts_with = "url")]
    file: Option<PathBuf>,

    /// Video URL to fetch on start
    #[arg(short, long)]
    url: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,
}

const ONBOARDING: &str = "\
How to use rollcoach

  1. Set your Gemini API key: export GEMINI_API_KEY=... (or pass --api-key)
  2. Load a sparring video: --file <path> or --url <video url>
  3. Customize your profile (optional): --belt, --moves, --concerns, --identity
  4. Type /analyze to receive a personalized coaching report, then ask follow-ups
";

const HELP: &str = "\
  /load <path>   load a local video (replaces the current one)
  /fetch <url>   download a video (replaces the current one)
  /analyze       analyze the loaded video
  /report        show the last report again
  /clear         remove the video, its upload and the conversation
  /help          show this help
  /quit          clean up and exit
  anything else  ask the coach about the analyzed video";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Load(String),
    Fetch(String),
    Analyze,
    Report,
    Clear,
    Help,
    Quit,
    Ask(String),
    Unknown(String),
    Empty,
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Ask(line.to_string());
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (line, String::new()),
    };
    match name {
        "/load" | "/file" => Command::Load(arg),
        "/fetch" | "/url" => Command::Fetch(arg),
        "/analyze" => Command::Analyze,
        "/report" => Command::Report,
        "/clear" | "/remove" => Command::Clear,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn print_error(err: &CoachError) {
    eprintln!("{} {}", style("Error:").red().bold(), err.user_message());
    eprintln!("  {}", style(err).dim());
    if let Some(raw) = err.raw_response() {
        eprintln!("{}", style("Raw response:").dim());
        eprintln!("{}", raw);
    }
}

fn print_report(session: &Session) {
    let Some(report) = session.report() else {
        println!("{}", style("No report yet. Load a video and run /analyze.").dim());
        return;
    };
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", format_report_readable(report));
    if let Some(video) = session.captioned_video() {
        println!(
            "{} {}",
            style("Captioned video:").dim(),
            style(video.display()).cyan()
        );
    }
    println!("{}", style("─".repeat(60)).dim());
}

async fn load(coach: &AppCoach, session: &mut Session, path: &str) {
    if path.is_empty() {
        println!("Usage: /load <path>");
        return;
    }
    match coach.load_file(session, &PathBuf::from(path)).await {
        Ok(video) => println!(
            "{} Loaded {}",
            style("✓").green().bold(),
            style(video.display()).dim()
        ),
        Err(e) => print_error(&e),
    }
}

async fn fetch(coach: &AppCoach, session: &mut Session, url: &str) {
    if url.is_empty() {
        println!("Usage: /fetch <url>");
        return;
    }
    let spinner = create_spinner("Downloading video...");
    match coach.fetch_url(session, url).await {
        Ok(video) => spinner.finish_with_message(format!(
            "{} Downloaded: {}",
            style("✓").green().bold(),
            style(video.display()).dim()
        )),
        Err(e) => {
            spinner.finish_and_clear();
            print_error(&e);
        }
    }
}

async fn analyze(coach: &AppCoach, session: &mut Session) {
    let progress = SpinnerProgress::new();
    match coach.analyze_with_progress(session, &progress).await {
        Ok(_) => {
            progress.finish();
            print_report(session);
        }
        Err(e) => {
            progress.fail();
            print_error(&e);
        }
    }
}

async fn ask(coach: &AppCoach, session: &mut Session, message: &str) {
    let spinner = create_spinner("Thinking...");
    match coach.ask(session, message).await {
        Ok(reply) => {
            spinner.finish_and_clear();
            println!("{} {}\n", style("coach:").cyan().bold(), reply);
        }
        Err(e) => {
            spinner.finish_and_clear();
            print_error(&e);
        }
    }
}

async fn repl(coach: &AppCoach, session: &mut Session, interrupt: &mut Interrupt) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while !interrupt.is_set() {
        stdout
            .write_all(format!("{} ", style("›").cyan().bold()).as_bytes())
            .await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupt.wait() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Load(path) => interrupt.finish(load(coach, session, &path)).await,
            Command::Fetch(url) => interrupt.finish(fetch(coach, session, &url)).await,
            Command::Analyze => interrupt.finish(analyze(coach, session)).await,
            Command::Report => print_report(session),
            Command::Clear => {
                coach.clear(session).await;
                println!("{} Video and conversation cleared", style("✓").green().bold());
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(()),
            Command::Ask(message) => interrupt.finish(ask(coach, session, &message)).await,
            Command::Unknown(name) => println!(
                "Unknown command {}. Type {} for the list.",
                style(name).yellow(),
                style("/help").cyan()
            ),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);
    let mut interrupt = Interrupt::install().await;

    // Validate API key early
    let credentials = match cli.api_key.as_deref().map(ApiCredentials::new) {
        Some(Ok(credentials)) => credentials,
        Some(Err(e)) => {
            eprintln!("{} {}\n", style("Error:").red().bold(), e);
            eprintln!("{}", ONBOARDING);
            std::process::exit(1);
        }
        None => {
            eprintln!(
                "{} {} is not set\n",
                style("Error:").red().bold(),
                API_KEY_ENV
            );
            eprintln!("{}", ONBOARDING);
            std::process::exit(1);
        }
    };

    let config = CoachConfig {
        model: cli.model,
        processing_timeout: Duration::from_secs(cli.timeout),
        report_mode: if cli.captions {
            ReportMode::Captioned
        } else {
            ReportMode::Plain
        },
        ..CoachConfig::default()
    };
    let transcoder = FfmpegTranscoder::new(config.compression.clone());
    let coach = Coach::new(
        GeminiClient::new(credentials),
        transcoder,
        YtDlpFetcher::default(),
        config,
    )?;

    let mut session = coach.new_session(Profile {
        belt: cli.belt.into(),
        favorite_moves: cli.moves,
        concerns: cli.concerns,
        identity: cli.identity,
        language: cli.lang,
    });
    tracing::info!(session_id = %session.id(), model = %coach.config().model, "session started");

    println!(
        "\n{}  {}\n",
        style("rollcoach").cyan().bold(),
        style("Sparring Video Coach").dim()
    );
    println!(
        "{} {} belt, report in {}",
        style("Profile:").dim(),
        session.profile.belt,
        session.profile.language
    );
    println!("{}\n", style("Type /help for commands.").dim());

    if let Some(path) = &cli.file {
        let path = path.to_string_lossy();
        interrupt.finish(load(&coach, &mut session, &path)).await;
    } else if let Some(url) = &cli.url {
        interrupt.finish(fetch(&coach, &mut session, url)).await;
    }

    let result = repl(&coach, &mut session, &mut interrupt).await;

    // Async cleanup cannot run from Drop, so every exit path after the
    // Ctrl-C listener is installed comes through here
    coach.clear(&mut session).await;
    result
}
