use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use serde_json::json;
use shared::domain::{LogEntry, TemplateId};
use synthesis_core::{
    load_settings, ConfirmPrompt, DemoAuthProvider, DurableStatePersistence, ForgeCore,
    ForgeEvent, KeyChord, MemoryStatePersistence, RouterOutcome, SimulatedProjectBackend,
    StatePersistence,
};
use tokio::{
    io::{stdin, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    sync::{broadcast, Mutex},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const KEY_HELP: &str = "\
Key bindings:
  ctrl+enter / cmd+enter      forge the project (ignored while a run is active)
  esc                         close open overlays
  ctrl+shift+r / cmd+shift+r  reset the project configuration
  shift+?                     show this help";

#[derive(Parser, Debug)]
#[command(name = "forge", about = "Project synthesis console")]
struct Args {
    /// sqlite url or file path for persisted state
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// keep state in memory only
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current configuration and session
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change one configuration field
    Set {
        #[command(subcommand)]
        field: SetField,
    },
    /// Restore the default configuration
    Reset {
        /// skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Run the generation pipeline once
    Generate(GenerateArgs),
    Login,
    Logout,
    /// Dispatch key chords such as `ctrl+enter` or `shift+?`
    Keys {
        #[arg(required = true)]
        chords: Vec<String>,
    },
    /// Read commands from stdin until EOF or `exit`
    Shell,
}

#[derive(Subcommand, Debug)]
enum SetField {
    Name { value: String },
    Dest { value: String },
    Template { value: String },
    Git {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    Container {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    Ci {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
    DryRun {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct GenerateArgs {
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    template: Option<String>,
    #[arg(long)]
    no_git: bool,
    #[arg(long)]
    container: bool,
    #[arg(long)]
    ci: bool,
}

/// Parser for one line typed into `forge shell`.
#[derive(Parser, Debug)]
#[command(name = "forge shell", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

type StdinLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

struct StdinConfirm {
    lines: StdinLines,
}

#[async_trait]
impl ConfirmPrompt for StdinConfirm {
    async fn confirm(&self, message: &str) -> bool {
        let mut out = tokio::io::stdout();
        let _ = out.write_all(format!("{message} [y/N] ").as_bytes()).await;
        let _ = out.flush().await;

        match self.lines.lock().await.next_line().await {
            Ok(Some(answer)) => matches!(answer.trim(), "y" | "Y" | "yes" | "YES"),
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.database_url {
        settings.database_url = synthesis_core::settings::normalize_database_url(&url);
    }

    let persistence: Arc<dyn StatePersistence> = if args.ephemeral {
        Arc::new(MemoryStatePersistence::new())
    } else {
        DurableStatePersistence::initialize(&settings.database_url, settings.storage_key.clone())
            .await?
    };
    let lines: StdinLines = Arc::new(Mutex::new(BufReader::new(stdin()).lines()));

    let core = ForgeCore::bootstrap(
        &settings,
        persistence,
        Arc::new(DemoAuthProvider::new(Duration::from_millis(
            settings.login_delay_ms,
        ))),
        Arc::new(SimulatedProjectBackend::new(Duration::from_millis(
            settings.backend_step_delay_ms,
        ))),
        Arc::new(StdinConfirm {
            lines: lines.clone(),
        }),
    )
    .await
    .context("failed to start forge")?;
    info!(database = %settings.database_url, ephemeral = args.ephemeral, "forge started");

    if let Command::Shell = args.command {
        return run_shell(&core, lines).await;
    }

    let result = execute(&core, args.command).await;
    for entry in core.logs.entries() {
        print_entry(&entry);
    }
    result
}

async fn run_shell(core: &ForgeCore, lines: StdinLines) -> Result<()> {
    let mut rx = core.subscribe();
    for entry in core.logs.entries() {
        print_entry(&entry);
    }
    println!("Type a command (`generate`, `keys ctrl+enter`, ...) or `exit`.");

    loop {
        let line = lines.lock().await.next_line().await?;
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        match ShellLine::try_parse_from(line.split_whitespace()) {
            Ok(ShellLine {
                command: Command::Shell,
            }) => println!("already in a shell"),
            Ok(parsed) => {
                if let Err(err) = execute(core, parsed.command).await {
                    println!("error: {err:#}");
                }
            }
            Err(err) => println!("{err}"),
        }
        drain_events(&mut rx);
    }

    Ok(())
}

fn drain_events(rx: &mut broadcast::Receiver<ForgeEvent>) {
    loop {
        match rx.try_recv() {
            Ok(ForgeEvent::LogAppended(entry)) => print_entry(&entry),
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn print_entry(entry: &LogEntry) {
    println!("{:<5} {entry}", entry.severity.label());
}

async fn execute(core: &ForgeCore, command: Command) -> Result<()> {
    match command {
        Command::Show { json } => show(core, json)?,
        Command::Set { field } => set_field(core, field).await,
        Command::Reset { yes: true } => {
            core.config.reset().await;
            println!("configuration reset");
        }
        Command::Reset { yes: false } => {
            let chord: KeyChord = "ctrl+shift+r".parse()?;
            report_outcome(core.router.dispatch(&chord).await);
        }
        Command::Generate(generate) => {
            if let Some(template) = &generate.template {
                core.config.set_template_id_str(template).await;
            }
            if generate.no_git {
                core.config.set_git_enabled(false).await;
            }
            if generate.container {
                core.config.set_container_enabled(true).await;
            }
            if generate.ci {
                core.config.set_ci_enabled(true).await;
            }
            if generate.dry_run {
                core.config.set_dry_run(true).await;
            }
            let report = core.orchestrator.run().await?;
            info!(run_id = %report.run_id, "generation finished");
        }
        Command::Login => {
            if !core.auth.begin_login().await {
                return Err(anyhow!("login failed"));
            }
        }
        Command::Logout => {
            core.auth.logout().await;
            println!("signed out");
        }
        Command::Keys { chords } => {
            for raw in chords {
                let chord: KeyChord = raw
                    .parse()
                    .with_context(|| format!("invalid key chord '{raw}'"))?;
                report_outcome(core.router.dispatch(&chord).await);
            }
        }
        Command::Shell => {}
    }
    Ok(())
}

async fn set_field(core: &ForgeCore, field: SetField) {
    match field {
        SetField::Name { value } => core.config.set_project_name(value).await,
        SetField::Dest { value } => core.config.set_destination_path(value).await,
        SetField::Template { value } => {
            let selected = core.config.set_template_id_str(&value).await;
            if TemplateId::parse(&value).is_none() {
                println!("unknown template '{value}', using {selected}");
            }
        }
        SetField::Git { enabled } => core.config.set_git_enabled(enabled).await,
        SetField::Container { enabled } => core.config.set_container_enabled(enabled).await,
        SetField::Ci { enabled } => core.config.set_ci_enabled(enabled).await,
        SetField::DryRun { enabled } => core.config.set_dry_run(enabled).await,
    }
}

fn show(core: &ForgeCore, as_json: bool) -> Result<()> {
    let config = core.config.snapshot();
    let user = core.auth.current_user();
    let status = core.orchestrator.status();

    if as_json {
        let summary = json!({
            "configuration": config,
            "user": user,
            "run_status": status,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("project      {}", config.project_name);
    println!("destination  {}", config.destination_path);
    println!("template     {}", config.template_id);
    let features: Vec<_> = config
        .feature_flags
        .enabled()
        .map(|feature| feature.as_str())
        .collect();
    println!("features     {}", features.join(", "));
    println!("dry run      {}", config.dry_run);
    match user {
        Some(user) => println!("signed in    {} ({})", user.handle, user.profile_ref),
        None => println!("signed in    no"),
    }
    println!("status       {status:?}");
    Ok(())
}

fn report_outcome(outcome: RouterOutcome) {
    match outcome {
        RouterOutcome::Submitted { .. } => {}
        RouterOutcome::SkippedBusy => println!("a generation run is already in progress"),
        RouterOutcome::OverlaysClosed => println!("overlays closed"),
        RouterOutcome::ResetApplied => println!("configuration reset"),
        RouterOutcome::ResetDeclined => println!("reset cancelled"),
        RouterOutcome::HelpRequested => println!("{KEY_HELP}"),
        RouterOutcome::Unbound => println!("no action bound to that chord"),
    }
}
