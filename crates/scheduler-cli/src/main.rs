//! scheduler - demo CLI for the scheduling core
//!
//! Loads a project file, runs it once through the coordinator, and prints
//! the computed schedule and critical path. There is no Gantt/Excel
//! rendering, resource leveling, or benchmarking here: those are out of
//! scope for this core.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scheduler_core::{Calendar, Task, TradePartner};
use scheduler_coordinator::SchedulingCoordinator;
use scheduler_events::SchedulerConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "scheduler")]
#[command(author, version, about = "Scheduling core demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a project JSON file, schedule it, and print the result
    Run {
        /// Project file path (tasks/calendar/tradePartners JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// SQLite event log file backing this run (created if missing)
        #[arg(short, long, default_value = "scheduler.db")]
        db: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write a small example project file
    Init {
        /// Output file path
        #[arg(value_name = "FILE", default_value = "project.json")]
        file: PathBuf,
    },
}

/// The on-disk shape of a project file: the same fields as a `Snapshot`
/// minus the event-log bookkeeping (`lastEventId`, `timestamp`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile {
    tasks: Vec<Task>,
    calendar: Calendar,
    #[serde(default)]
    trade_partners: Vec<TradePartner>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { file, db, format } => cmd_run(&file, &db, &format).await,
        Commands::Init { file } => cmd_init(&file),
    }
}

async fn cmd_run(file: &std::path::Path, db: &std::path::Path, format: &str) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    let project: ProjectFile = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse '{}' as a project file", file.display()))?;

    let coordinator = SchedulingCoordinator::open(db, SchedulerConfig::default())
        .with_context(|| format!("Failed to open event log at '{}'", db.display()))?;
    coordinator
        .initialize()
        .await
        .context("Failed to recover coordinator state")?;
    coordinator
        .load_project(project.tasks, project.calendar, project.trade_partners)
        .await
        .context("Failed to load project")?;
    coordinator.flush().await.context("Failed to flush event log")?;

    let read_model = coordinator.current();

    match format {
        "json" => {
            let summary = serde_json::json!({
                "stats": &read_model.stats,
                "tasks": read_model.tasks.iter().map(|t| {
                    let schedule = read_model.schedules.get(&t.id);
                    serde_json::json!({
                        "id": t.id,
                        "name": t.name,
                        "start": schedule.map(|s| s.start),
                        "end": schedule.map(|s| s.end),
                        "totalFloat": schedule.map(|s| s.total_float),
                        "isCritical": schedule.map(|s| s.is_critical).unwrap_or(false),
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => println!("{}", format_text(&read_model)),
    }

    Ok(())
}

fn format_text(read_model: &scheduler_coordinator::ReadModel) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Tasks: {}  Critical: {}  Diverged: {}\n\n",
        read_model.stats.task_count, read_model.stats.critical_count, read_model.stats.diverged
    ));

    let width = 32;
    output.push_str(&format!(
        "{:<width$} {:<12} {:<12} {:>8} {}\n",
        "Task",
        "Start",
        "Finish",
        "Float",
        "Critical",
        width = width
    ));
    output.push_str(&format!("{}\n", "-".repeat(width + 40)));

    let mut tasks: Vec<&Task> = read_model.tasks.iter().filter(|t| t.is_schedulable()).collect();
    tasks.sort_by_key(|t| read_model.schedules.get(&t.id).map(|s| s.start));

    let mut critical_path = Vec::new();
    for task in tasks {
        let Some(schedule) = read_model.schedules.get(&task.id) else {
            continue;
        };
        let critical = if schedule.is_critical {
            critical_path.push(task.name.clone());
            "*"
        } else {
            ""
        };
        output.push_str(&format!(
            "{:<width$} {:<12} {:<12} {:>7}d {}\n",
            truncate(&task.name, width),
            schedule.start.format("%Y-%m-%d"),
            schedule.end.format("%Y-%m-%d"),
            schedule.total_float,
            critical,
            width = width
        ));
    }

    if !critical_path.is_empty() {
        output.push_str("\nCritical Path: ");
        output.push_str(&critical_path.join(" -> "));
        output.push('\n');
    }

    output
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Write a small working example project so `scheduler run` has something
/// to load on the first try.
fn cmd_init(file: &std::path::Path) -> Result<()> {
    let calendar = Calendar::default();
    let design = Task::new("task-0", "a0").name("Design");
    let build = Task::new("task-1", "a1")
        .name("Build")
        .duration(5)
        .depends_on(scheduler_core::Dependency::new(
            "task-0",
            scheduler_core::LinkType::FinishToStart,
            0,
        ));
    let project = ProjectFile {
        tasks: vec![design.duration(3), build],
        calendar,
        trade_partners: vec![],
    };

    let json = serde_json::to_string_pretty(&project)?;
    std::fs::write(file, json)
        .with_context(|| format!("Failed to write '{}'", file.display()))?;
    println!("Wrote example project to '{}'", file.display());
    Ok(())
}
