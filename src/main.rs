//! # Brick Harness CLI (`brick`)
//!
//! The `brick` binary is the command-line front end for Brick Harness. It
//! initializes the database, adds sets from the catalog snapshot, allocates
//! newly available parts, and edits or lists sets.
//!
//! ## Usage
//!
//! ```bash
//! brick --config ./config/brick.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brick init` | Create the SQLite database and run schema migrations |
//! | `brick add-set <SET>` | Add a set and its parts from the catalog |
//! | `brick allocate` | Distribute available parts to the sets that need them |
//! | `brick priority <SET> <N>` | Move a set to a new priority |
//! | `brick complete <SET>` | Mark a set complete by hand (or `--undo`) |
//! | `brick normalize` | Renumber priorities densely |
//! | `brick sets` | List sets |
//! | `brick parts <SET>` | List a set's parts |
//! | `brick stats` | Collection summary |
//!
//! ## Examples
//!
//! ```bash
//! # Add a set at the front of the queue
//! brick add-set 10696-1 --priority 1
//!
//! # Ten red 2x4 bricks arrived; give them to whoever needs them first
//! brick allocate --part 3001 --color 4 --quantity 10
//!
//! # Same, by element id, straight to one set
//! brick allocate --element 300121 --quantity 2 --set 10696-1
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brick_harness::allocate::allocate;
use brick_harness::catalog::{Catalog, SnapshotCatalog};
use brick_harness::completion::set_soft_completed;
use brick_harness::config::{self, Config};
use brick_harness::db;
use brick_harness::ingest::{ingest_set, IngestOutcome, IngestSession, PartDecision, PendingDecision};
use brick_harness::migrate;
use brick_harness::models::PartRef;
use brick_harness::priority::{normalize, set_priority};
use brick_harness::queries::{self, Direction, SetPartOrder};
use brick_harness::stats::{self, format_percent};

/// Brick Harness CLI: track building-block sets and decide which set gets
/// newly available parts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "brick",
    about = "Brick Harness — track sets and loose parts, and allocate parts by priority",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/brick.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the sets, parts and set_parts
    /// tables. Safe to run more than once.
    Init,

    /// Add a set and its parts from the catalog snapshot.
    ///
    /// Parts without a known element variant are resolved against the
    /// catalog; when that is ambiguous you are asked to pick a candidate,
    /// skip the part, or cancel.
    AddSet {
        /// Set number, e.g. `10696` or `10696-1`.
        set: String,

        /// Priority to insert the set at. Appends to the end when omitted.
        #[arg(long)]
        priority: Option<i64>,

        /// Take the first candidate (or skip when there is none) instead of prompting.
        #[arg(long)]
        accept_default: bool,
    },

    /// Allocate newly available parts.
    ///
    /// Without `--set`, sets are served in priority order until the
    /// quantity runs out. With `--set`, only that set receives parts and any
    /// excess is discarded.
    Allocate {
        /// Part number (requires `--color`).
        #[arg(long, requires = "color", required_unless_present = "element")]
        part: Option<String>,

        /// Color id for `--part`.
        #[arg(long)]
        color: Option<String>,

        /// Element id, instead of `--part`/`--color`.
        #[arg(long, conflicts_with_all = ["part", "color"])]
        element: Option<String>,

        /// Quantity available. Defaults to `allocation.default_quantity`.
        #[arg(long, allow_negative_numbers = true)]
        quantity: Option<i64>,

        /// Allocate only to this set.
        #[arg(long)]
        set: Option<String>,
    },

    /// Move a set to a new priority (1 is served first).
    Priority {
        set: String,
        #[arg(allow_negative_numbers = true)]
        priority: i64,
    },

    /// Mark a set complete by hand so it stops receiving parts.
    Complete {
        set: String,

        /// Clear the mark and recompute the real completion.
        #[arg(long)]
        undo: bool,
    },

    /// Renumber set priorities to 1..N without gaps.
    Normalize,

    /// List sets, most complete first.
    Sets {
        /// Only sets whose number or name contains this text.
        #[arg(long)]
        search: Option<String>,
    },

    /// List the parts of a set.
    Parts {
        set: String,

        #[arg(long, value_enum, default_value = "none")]
        sort: PartSort,

        /// Only parts of this color.
        #[arg(long)]
        color: Option<i64>,
    },

    /// Show a summary of the collection.
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum PartSort {
    None,
    PartAsc,
    PartDesc,
    RemainingAsc,
    RemainingDesc,
    PercentAsc,
    PercentDesc,
    Color,
}

impl PartSort {
    fn order(self, color: Option<i64>) -> SetPartOrder {
        if color.is_some() {
            return SetPartOrder::Color(color);
        }
        match self {
            PartSort::None => SetPartOrder::Unsorted,
            PartSort::PartAsc => SetPartOrder::PartNum(Direction::Asc),
            PartSort::PartDesc => SetPartOrder::PartNum(Direction::Desc),
            PartSort::RemainingAsc => SetPartOrder::Remaining(Direction::Asc),
            PartSort::RemainingDesc => SetPartOrder::Remaining(Direction::Desc),
            PartSort::PercentAsc => SetPartOrder::Percent(Direction::Asc),
            PartSort::PercentDesc => SetPartOrder::Percent(Direction::Desc),
            PartSort::Color => SetPartOrder::Color(None),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brick_harness=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::AddSet {
            set,
            priority,
            accept_default,
        } => {
            run_add_set(&cfg, &set, priority, accept_default).await?;
        }
        Commands::Allocate {
            part,
            color,
            element,
            quantity,
            set,
        } => {
            let part_ref = match (element, part, color) {
                (Some(element), _, _) => PartRef::element(&element)?,
                (None, Some(part), Some(color)) => PartRef::parse_key(&part, &color)?,
                _ => return Err(anyhow!("either --element or --part with --color is required")),
            };
            let quantity = quantity.unwrap_or(cfg.allocation.default_quantity);
            run_allocate(&cfg, &part_ref, quantity, set.as_deref()).await?;
        }
        Commands::Priority { set, priority } => {
            let pool = db::connect(&cfg).await?;
            let record = set_priority(&pool, &set, priority).await?;
            println!("{} {} now at priority {}", record.id, record.name, record.priority);
            pool.close().await;
        }
        Commands::Complete { set, undo } => {
            let pool = db::connect(&cfg).await?;
            let record = set_soft_completed(&pool, &set, !undo).await?;
            if record.soft_completed {
                println!("{} {} marked complete", record.id, record.name);
            } else {
                println!(
                    "{} {} unmarked ({} complete)",
                    record.id,
                    record.name,
                    percent(record.completion)
                );
            }
            pool.close().await;
        }
        Commands::Normalize => {
            let pool = db::connect(&cfg).await?;
            let next = normalize(&pool, None).await?;
            println!("priorities normalized");
            println!("  next priority: {}", next);
            pool.close().await;
        }
        Commands::Sets { search } => {
            run_list_sets(&cfg, search.as_deref()).await?;
        }
        Commands::Parts { set, sort, color } => {
            run_list_parts(&cfg, &set, sort.order(color)).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}

async fn run_add_set(
    cfg: &Config,
    set_number: &str,
    priority: Option<i64>,
    accept_default: bool,
) -> Result<()> {
    let snapshot = cfg
        .catalog
        .snapshot
        .as_ref()
        .ok_or_else(|| anyhow!("catalog.snapshot must be configured to add sets"))?;
    let catalog = SnapshotCatalog::load(snapshot)?;
    let pool = db::connect(cfg).await?;

    let mut session = IngestSession::new(set_number, priority);
    loop {
        match ingest_set(&pool, &catalog, &mut session).await? {
            IngestOutcome::Ingested(set) => {
                println!("add-set {}", set.id);
                println!("  name: {}", set.name);
                println!("  priority: {}", set.priority);
                let skipped = session
                    .decisions()
                    .values()
                    .filter(|d| **d == PartDecision::Skip)
                    .count();
                println!("  skipped parts: {}", skipped);
                println!("ok");
                break;
            }
            IngestOutcome::NeedsDecision(pending) => {
                let decision = if accept_default {
                    Some(match pending.default_choice() {
                        Some(element_id) => PartDecision::Element(element_id.to_string()),
                        None => PartDecision::Skip,
                    })
                } else {
                    prompt_decision(&pending, &catalog)?
                };

                match decision {
                    Some(decision) => session.decide(pending.key(), decision),
                    None => {
                        println!("add-set {} cancelled; nothing was saved", set_number);
                        break;
                    }
                }
            }
        }
    }

    pool.close().await;
    Ok(())
}

/// Ask the user to settle one part. `None` means cancel.
fn prompt_decision(pending: &PendingDecision, catalog: &dyn Catalog) -> Result<Option<PartDecision>> {
    let color = catalog
        .color_name(pending.part.color_id)
        .unwrap_or_else(|| format!("color {}", pending.part.color_id));

    println!();
    println!(
        "Set {} ({}): part {} \"{}\" in {} needs an element",
        pending.set.set_num, pending.set.year, pending.part.part_num, pending.part.name, color
    );
    if pending.candidates.is_empty() {
        println!("  no elements found for this part");
    }
    for (i, element_id) in pending.candidates.iter().enumerate() {
        let note = if pending.is_timely(element_id) {
            " (available during set year)"
        } else {
            ""
        };
        println!("  {}) {}{}", i + 1, element_id, note);
    }
    println!("  s) skip this part");
    println!("  q) cancel");

    let stdin = std::io::stdin();
    let interactive = atty::is(atty::Stream::Stdin);
    loop {
        if interactive {
            print!("choice [{}]: ", if pending.candidates.is_empty() { "s" } else { "1" });
            std::io::stdout().flush()?;
        }

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(None);
        }

        match line.trim() {
            "" => {
                return Ok(Some(match pending.default_choice() {
                    Some(element_id) => PartDecision::Element(element_id.to_string()),
                    None => PartDecision::Skip,
                }))
            }
            "s" | "S" => return Ok(Some(PartDecision::Skip)),
            "q" | "Q" => return Ok(None),
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 && n <= pending.candidates.len() => {
                    return Ok(Some(PartDecision::Element(pending.candidates[n - 1].clone())))
                }
                _ => println!("  not a valid choice: {}", other),
            },
        }
    }
}

async fn run_allocate(cfg: &Config, part: &PartRef, quantity: i64, set: Option<&str>) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let allocations = allocate(&pool, part, quantity, set).await;
    pool.close().await;
    let allocations = allocations?;

    let total: i64 = allocations.iter().map(|a| a.allocated).sum();
    println!("allocate");
    for a in &allocations {
        println!("  {} {}: +{}", a.set_id, a.set_name, a.allocated);
        if a.became_complete {
            println!("    {} is now complete", a.set_id);
        } else if a.became_started {
            println!("    {} has its first parts", a.set_id);
        }
    }
    println!("  allocated: {} of {}", total, quantity);
    println!("ok");
    Ok(())
}

async fn run_list_sets(cfg: &Config, search: Option<&str>) -> Result<()> {
    let pool = db::connect(cfg).await?;
    let sets = queries::list_sets(&pool, search).await?;
    pool.close().await;

    if sets.is_empty() {
        println!("No sets.");
        return Ok(());
    }

    println!("{:>4}  {:<12} {:<40} {:>7}", "PRIO", "SET", "NAME", "DONE");
    for s in &sets {
        let done = if s.soft_completed {
            "marked".to_string()
        } else {
            percent(s.completion)
        };
        println!("{:>4}  {:<12} {:<40} {:>7}", s.priority, s.id, s.name, done);
    }
    Ok(())
}

async fn run_list_parts(cfg: &Config, set_id: &str, order: SetPartOrder) -> Result<()> {
    let catalog = match &cfg.catalog.snapshot {
        Some(path) => Some(SnapshotCatalog::load(path)?),
        None => None,
    };

    let pool = db::connect(cfg).await?;
    let set = queries::get_set(&pool, set_id).await?;
    let rows = queries::set_parts(&pool, set_id, order).await?;
    let colors = queries::set_colors(&pool, set_id).await?;
    pool.close().await;

    let color_label = |color_id: i64| {
        catalog
            .as_ref()
            .and_then(|c| c.color_name(color_id))
            .unwrap_or_else(|| color_id.to_string())
    };

    let set = set.ok_or_else(|| anyhow!("set {} not found", set_id))?;
    println!("{} {} ({})", set.id, set.name, percent(set.display_completion()));
    let listed: Vec<String> = colors
        .iter()
        .map(|&color_id| format!("{} ({})", color_label(color_id), color_id))
        .collect();
    println!("  colors: {}", listed.join(", "));

    for row in &rows {
        let color = color_label(row.color_id);
        println!(
            "  {:<10} {:<16} {:<36} {:>4}/{:<4} {:>5}",
            row.part_num,
            color,
            row.name,
            row.quantity_allocated,
            row.quantity_needed,
            format_percent(row.quantity_allocated, row.quantity_needed)
        );
    }
    Ok(())
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}
