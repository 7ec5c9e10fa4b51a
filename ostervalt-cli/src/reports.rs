use std::io::Write;

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use ostervalt_economy::{
    BalanceView, Character, CharacterId, CooldownStatus, CrimeResult, GuildConfig,
    MigrationReport, ProgressResult, ProgressView, WorkResult,
};
use serde::Serialize;

use crate::simulation::SimulationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

/// Everything a single command can print.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Created {
        character: Character,
    },
    Listed {
        characters: Vec<Character>,
    },
    Work {
        result: WorkResult,
    },
    Crime {
        result: CrimeResult,
    },
    Progress {
        result: ProgressResult,
    },
    Show {
        balance: BalanceView,
        progress: ProgressView,
        cooldowns: Option<CooldownStatus>,
    },
    Adjusted {
        character_id: CharacterId,
        new_balance: i64,
    },
    Retired {
        character_id: CharacterId,
    },
    Migrated {
        config: Box<GuildConfig>,
        report: MigrationReport,
    },
    Simulation {
        report: SimulationReport,
    },
}

pub fn write_outcome(out: &mut dyn Write, format: ReportFormat, outcome: &Outcome) -> Result<()> {
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, outcome)?;
            writeln!(out)?;
            Ok(())
        }
        ReportFormat::Markdown => write_markdown(out, outcome),
        ReportFormat::Console => write_console(out, outcome),
    }
}

fn write_console(out: &mut dyn Write, outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Created { character } => {
            writeln!(
                out,
                "{} {} (#{})",
                "✨ Created".bright_green().bold(),
                character.name.bold(),
                character.id
            )?;
        }
        Outcome::Listed { characters } => {
            if characters.is_empty() {
                writeln!(out, "No characters yet.")?;
            }
            for c in characters {
                let status = if c.is_active() {
                    "active".green()
                } else {
                    "retired".dimmed()
                };
                writeln!(
                    out,
                    "#{:<4} {:20} level {:>2}  {:>8} coins  {status}",
                    c.id,
                    c.name,
                    c.level(),
                    c.money
                )?;
            }
        }
        Outcome::Work { result } => {
            writeln!(out, "{}", "⚒️  Work".bright_cyan().bold())?;
            writeln!(out, "{}", result.message)?;
            if let Some(reason) = result.degraded {
                writeln!(out, "{} {reason}", "⚠️  Configuration:".yellow())?;
            }
        }
        Outcome::Crime { result } => {
            let header = if result.success {
                "🗝️  Crime succeeded".bright_green().bold()
            } else {
                "🚨 Crime failed".bright_red().bold()
            };
            writeln!(out, "{header}")?;
            writeln!(out, "{}", result.message)?;
        }
        Outcome::Progress { result } => {
            writeln!(
                out,
                "{} +{} units, now {}",
                "📈 Progress".bright_cyan().bold(),
                result.units_added,
                result.formatted
            )?;
            if result.leveled_up {
                writeln!(
                    out,
                    "{} {} → {}",
                    "🎉 Level up!".bright_yellow().bold(),
                    result.previous_level,
                    result.new_level
                )?;
            }
        }
        Outcome::Show {
            balance,
            progress,
            cooldowns,
        } => {
            writeln!(out, "{} (#{})", balance.name.bold(), balance.character_id)?;
            writeln!(out, "   Balance: {} coins", balance.balance)?;
            writeln!(out, "   Level:   {} ({})", progress.level, progress.formatted)?;
            match cooldowns {
                Some(status) => {
                    writeln!(out, "   Work:    {}", cooldown_text(status.work.remaining_seconds))?;
                    writeln!(out, "   Crime:   {}", cooldown_text(status.crime.remaining_seconds))?;
                }
                None => writeln!(out, "   Status:  {}", "retired".dimmed())?,
            }
        }
        Outcome::Adjusted {
            character_id,
            new_balance,
        } => {
            writeln!(out, "Balance of #{character_id} is now {new_balance} coins")?;
        }
        Outcome::Retired { character_id } => {
            writeln!(out, "Character #{character_id} has retired")?;
        }
        Outcome::Migrated { config, report } => {
            writeln!(
                out,
                "{} schema {} → {}",
                "🔧 Migrated".bright_cyan().bold(),
                report.from_version,
                config.schema_version
            )?;
            for key in &report.defaulted {
                writeln!(out, "   {} {key}", "defaulted".yellow())?;
            }
            for entry in &report.skipped {
                writeln!(out, "   {} {entry}", "skipped".red())?;
            }
            writeln!(out, "{}", config.to_json_pretty()?)?;
        }
        Outcome::Simulation { report } => write_simulation_console(out, report)?,
    }
    Ok(())
}

fn cooldown_text(remaining_seconds: u64) -> String {
    if remaining_seconds == 0 {
        "ready".green().to_string()
    } else {
        format!("ready in {remaining_seconds}s").yellow().to_string()
    }
}

fn write_simulation_console(out: &mut dyn Write, report: &SimulationReport) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "📊 Economy Simulation".bright_cyan().bold())?;
    writeln!(out, "{}", "=====================".cyan())?;
    writeln!(
        out,
        "Seed: {}  Days: {}  Characters: {}",
        report.seed,
        report.days,
        report.rows.len()
    )?;
    if let Some(rate) = report.crime_success_rate() {
        writeln!(out, "Crime success rate: {:.1}%", rate * 100.0)?;
    }
    writeln!(out, "Total coins in circulation: {}", report.total_balance)?;
    writeln!(out)?;
    for row in &report.rows {
        writeln!(out, "{} {}", format!("#{}", row.character_id).dimmed(), row.name.bold())?;
        writeln!(out, "   Level {} ({})", row.level, row.marks)?;
        writeln!(
            out,
            "   Work: {} shifts, {} coins",
            row.works,
            row.work_income.to_string().green()
        )?;
        let net = if row.crime_net < 0 {
            row.crime_net.to_string().red()
        } else {
            row.crime_net.to_string().green()
        };
        writeln!(
            out,
            "   Crime: {}/{} succeeded, net {net}",
            row.crime_successes, row.crimes
        )?;
        if row.degraded_works > 0 {
            writeln!(
                out,
                "   {} {} shifts paid nothing",
                "⚠️".yellow(),
                row.degraded_works
            )?;
        }
        writeln!(out, "   Balance: {}", row.balance)?;
    }
    Ok(())
}

fn write_markdown(out: &mut dyn Write, outcome: &Outcome) -> Result<()> {
    match outcome {
        Outcome::Simulation { report } => {
            writeln!(out, "# Ostervalt Economy Simulation\n")?;
            writeln!(out, "- Seed: `{}`", report.seed)?;
            writeln!(out, "- Days: {}", report.days)?;
            writeln!(out, "- Total balance: {}\n", report.total_balance)?;
            writeln!(
                out,
                "| Character | Level | Marks | Works | Crimes | Successes | Crime net | Balance |"
            )?;
            writeln!(
                out,
                "|-----------|-------|-------|-------|--------|-----------|-----------|---------|"
            )?;
            for row in &report.rows {
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} | {} | {} |",
                    row.name,
                    row.level,
                    row.marks,
                    row.works,
                    row.crimes,
                    row.crime_successes,
                    row.crime_net,
                    row.balance
                )?;
            }
        }
        Outcome::Listed { characters } => {
            writeln!(out, "| Id | Name | Level | Balance | Active |")?;
            writeln!(out, "|----|------|-------|---------|--------|")?;
            for c in characters {
                writeln!(
                    out,
                    "| {} | {} | {} | {} | {} |",
                    c.id,
                    c.name,
                    c.level(),
                    c.money,
                    if c.is_active() { "yes" } else { "no" }
                )?;
            }
        }
        Outcome::Work { result } => {
            writeln!(out, "**Work** (#{}): {}", result.character_id, result.message)?;
        }
        Outcome::Crime { result } => {
            writeln!(out, "**Crime** (#{}): {}", result.character_id, result.message)?;
        }
        other => {
            writeln!(out, "```json")?;
            serde_json::to_writer_pretty(&mut *out, other)?;
            writeln!(out, "\n```")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::SimulationRow;

    fn sample_report() -> SimulationReport {
        SimulationReport {
            seed: 42,
            days: 1,
            hours: 24,
            rows: vec![SimulationRow {
                character_id: CharacterId(1),
                name: "Villager 1".to_string(),
                level: 2,
                marks: "1 Marks".to_string(),
                balance: 500,
                works: 24,
                work_income: 2_400,
                crimes: 24,
                crime_successes: 10,
                crime_net: -1_900,
                degraded_works: 0,
            }],
            total_balance: 500,
        }
    }

    #[test]
    fn markdown_simulation_has_table() {
        let mut buf = Vec::new();
        let outcome = Outcome::Simulation {
            report: sample_report(),
        };
        write_outcome(&mut buf, ReportFormat::Markdown, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("# Ostervalt Economy Simulation"));
        assert!(text.contains("| Villager 1 | 2 | 1 Marks | 24 | 24 | 10 | -1900 | 500 |"));
    }

    #[test]
    fn json_outcome_is_tagged() {
        let mut buf = Vec::new();
        let outcome = Outcome::Retired {
            character_id: CharacterId(7),
        };
        write_outcome(&mut buf, ReportFormat::Json, &outcome).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["kind"], "retired");
        assert_eq!(value["character_id"], 7);
    }

    #[test]
    fn console_migration_prints_converted_config() {
        let (config, report) =
            GuildConfig::from_json_with_report(r#"{"probabilidade_crime": 35}"#).unwrap();
        let outcome = Outcome::Migrated {
            config: Box::new(config),
            report,
        };
        let mut buf = Vec::new();
        write_outcome(&mut buf, ReportFormat::Console, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("intervalo_trabalhar"));
        assert!(text.contains("\"success_probability\": 35"));
        assert!(text.contains("\"schema_version\": 2"));
    }

    #[test]
    fn console_simulation_mentions_seed() {
        let mut buf = Vec::new();
        let outcome = Outcome::Simulation {
            report: sample_report(),
        };
        write_outcome(&mut buf, ReportFormat::Console, &outcome).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Seed: 42"));
        assert!(text.contains("Villager 1"));
    }
}
