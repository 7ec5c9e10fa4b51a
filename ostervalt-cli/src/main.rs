mod reports;
mod simulation;
mod store;
mod util;

use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ostervalt_economy::{
    ActionOrchestrator, Actor, CharacterId, CharacterStatus, EngineError, GuildConfig, GuildId,
    StaticGuildConfigs, SystemClock, UserId,
};

use reports::{Outcome, ReportFormat, write_outcome};
use simulation::SimulationConfig;
use store::JsonFileStore;
use util::parse_role_ids;

const DEFAULT_GUILD_CONFIG: &str = include_str!("../assets/guild.json");
/// 2024-01-01T00:00:00Z; simulations start here so seeds replay exactly.
const SIMULATION_EPOCH: i64 = 1_704_067_200;
/// Exit status for rule rejections (cooldown, permission, unknown character).
const ENGINE_REJECTION: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "ostervalt", version)]
#[command(about = "Work, crime and progression for Ostervalt characters, from the command line")]
struct Args {
    /// Character state file (created on first write)
    #[arg(long, global = true, default_value = "ostervalt-state.json")]
    state: PathBuf,

    /// Guild configuration JSON; legacy key/value blobs are migrated on load
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Acting user id
    #[arg(long, global = true, default_value_t = 0)]
    user: u64,

    /// Act with guild administrator rights
    #[arg(long, global = true)]
    admin: bool,

    /// Role ids held by the acting user (comma-separated)
    #[arg(long, global = true, default_value = "")]
    roles: String,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Optional path to write the report output instead of stdout
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// RNG seed; random when omitted
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a character owned by the acting user
    Create {
        name: String,
        #[arg(long, default_value_t = 1)]
        guild: u64,
    },
    /// List every stored character
    List,
    /// Work for the reward of the character's tier
    Work { id: u64 },
    /// Attempt a crime
    Crime { id: u64 },
    /// Award one step of progress
    Up { id: u64 },
    /// Show balance, marks and cooldowns
    Show { id: u64 },
    /// Credit or debit a character (admin only)
    Adjust {
        id: u64,
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Set a character's balance to an absolute, non-negative amount (admin only)
    SetBalance {
        id: u64,
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Retire a character for good (admin only)
    Retire { id: u64 },
    /// Run a seeded economy simulation in memory
    Simulate {
        #[arg(long, default_value_t = 3)]
        characters: u32,
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, default_value_t = 1)]
        awards_per_day: u32,
    },
    /// Convert a guild configuration to the current schema and print it
    Migrate { input: PathBuf },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    match execute(&args).await {
        Ok(outcome) => {
            let mut output_target = OutputTarget::new(args.output.clone())?;
            write_outcome(output_target.writer(), args.report, &outcome)?;
            output_target.flush_inner()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.downcast_ref::<EngineError>().is_some() => {
            eprintln!("{} {err:#}", "❌".red());
            Ok(ExitCode::from(ENGINE_REJECTION))
        }
        Err(err) => Err(err),
    }
}

async fn execute(args: &Args) -> Result<Outcome> {
    match &args.command {
        Command::Simulate {
            characters,
            days,
            awards_per_day,
        } => {
            let config = load_guild_config(args.config.as_deref())?;
            let seed = args.seed.unwrap_or_else(rand::random);
            let sim = SimulationConfig::new(seed)
                .with_characters(*characters)
                .with_days(*days)
                .with_awards_per_day(*awards_per_day);
            let start = DateTime::<Utc>::from_timestamp(SIMULATION_EPOCH, 0)
                .context("invalid simulation epoch")?;
            let report = simulation::run(config, sim, start).await?;
            Ok(Outcome::Simulation { report })
        }
        Command::Migrate { input } => {
            let text = std::fs::read_to_string(input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let (config, report) = GuildConfig::from_json_with_report(&text)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            Ok(Outcome::Migrated {
                config: Box::new(config),
                report,
            })
        }
        command => {
            let config = load_guild_config(args.config.as_deref())?;
            let actor = build_actor(args)?;
            let store = JsonFileStore::open(&args.state)
                .await
                .with_context(|| format!("failed to open {}", args.state.display()))?;
            let engine = ActionOrchestrator::new(
                store,
                StaticGuildConfigs::new(config),
                SystemClock,
                args.seed.unwrap_or_else(rand::random),
            );
            run_character_command(command, &engine, &actor).await
        }
    }
}

type CliEngine = ActionOrchestrator<JsonFileStore, StaticGuildConfigs, SystemClock>;

async fn run_character_command(
    command: &Command,
    engine: &CliEngine,
    actor: &Actor,
) -> Result<Outcome> {
    let outcome = match *command {
        Command::Create { ref name, guild } => {
            let character = engine
                .characters()
                .create(name, actor.user_id, GuildId(guild))
                .await?;
            log::info!(
                "created character {} in {}",
                character.id,
                engine.characters().path().display()
            );
            Outcome::Created { character }
        }
        Command::List => Outcome::Listed {
            characters: engine.characters().list().await,
        },
        Command::Work { id } => Outcome::Work {
            result: engine.perform_work(CharacterId(id)).await?,
        },
        Command::Crime { id } => Outcome::Crime {
            result: engine.perform_crime(CharacterId(id)).await?,
        },
        Command::Up { id } => Outcome::Progress {
            result: engine.award_progress(actor, CharacterId(id)).await?,
        },
        Command::Show { id } => {
            let id = CharacterId(id);
            let balance = engine.balance_of(actor, id).await?;
            let progress = engine.progress_of(actor, id).await?;
            let cooldowns = if balance.status == CharacterStatus::Active {
                Some(engine.cooldowns(id).await?)
            } else {
                None
            };
            Outcome::Show {
                balance,
                progress,
                cooldowns,
            }
        }
        Command::Adjust { id, amount } => Outcome::Adjusted {
            character_id: CharacterId(id),
            new_balance: engine.adjust_balance(actor, CharacterId(id), amount).await?,
        },
        Command::SetBalance { id, amount } => Outcome::Adjusted {
            character_id: CharacterId(id),
            new_balance: engine.set_balance(actor, CharacterId(id), amount).await?,
        },
        Command::Retire { id } => {
            engine.retire(actor, CharacterId(id)).await?;
            Outcome::Retired {
                character_id: CharacterId(id),
            }
        }
        Command::Simulate { .. } | Command::Migrate { .. } => {
            anyhow::bail!("command does not operate on stored characters")
        }
    };
    Ok(outcome)
}

fn load_guild_config(path: Option<&Path>) -> Result<GuildConfig> {
    let (config, report) = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GuildConfig::from_json_with_report(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => GuildConfig::from_json_with_report(DEFAULT_GUILD_CONFIG)
            .context("bundled guild configuration is invalid")?,
    };
    if !report.is_clean() {
        log::warn!(
            "guild configuration migrated from schema {} with {} defaulted and {} skipped keys",
            report.from_version,
            report.defaulted.len(),
            report.skipped.len()
        );
    }
    Ok(config)
}

fn build_actor(args: &Args) -> Result<Actor> {
    let actor = if args.admin {
        Actor::admin(UserId(args.user))
    } else {
        Actor::user(UserId(args.user))
    };
    Ok(actor.with_roles(parse_role_ids(&args.roles)?))
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}
