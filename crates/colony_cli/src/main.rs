use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colony_ai::{persist, AiConfig, AiController, TurnReport};
use colony_core::{Event, FactionId, GameContent, GameState};
use colony_world::{
    apply_ai_overrides, build_state, load_ai_config, load_content, load_scenario,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::{fmt, EnvFilter};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "colony_cli", about = "Colonization AI runner")]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every AI faction for a fixed number of turns.
    Run {
        #[arg(long)]
        turns: u64,
        /// Build the world from this scenario file. Mutually exclusive with --state.
        #[arg(long, conflicts_with = "state_file")]
        scenario: Option<PathBuf>,
        /// Resume from a saved GameState JSON file. Mutually exclusive with --scenario.
        #[arg(long = "state", conflicts_with = "scenario")]
        state_file: Option<PathBuf>,
        /// Overrides the scenario's seed.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./content")]
        content_dir: String,
        /// Directory of AI registries: loaded at start when present, written at the end.
        #[arg(long)]
        ai_dir: Option<PathBuf>,
        /// Write the final GameState here.
        #[arg(long)]
        save_state: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        print_every: u64,
    },
    /// Load content and a scenario and report problems without running.
    Check {
        #[arg(long)]
        scenario: PathBuf,
        #[arg(long, default_value = "./content")]
        content_dir: String,
    },
}

struct RunArgs {
    turns: u64,
    scenario: Option<PathBuf>,
    state_file: Option<PathBuf>,
    seed: Option<u64>,
    content_dir: String,
    ai_dir: Option<PathBuf>,
    save_state: Option<PathBuf>,
    print_every: u64,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    fmt().with_env_filter(filter).with_target(false).init();
}

/// Builds the starting world and AI settings, returning the seed in use.
fn initial_world(
    args: &RunArgs,
    content: &GameContent,
    base: &AiConfig,
) -> Result<(GameState, AiConfig, u64)> {
    if let Some(path) = &args.state_file {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading state file: {}", path.display()))?;
        let state: GameState = serde_json::from_str(&json)
            .with_context(|| format!("parsing state file: {}", path.display()))?;
        let seed = args.seed.unwrap_or(state.meta.seed);
        return Ok((state, base.clone(), seed));
    }
    let Some(path) = &args.scenario else {
        bail!("either --scenario or --state is required");
    };
    let scenario = load_scenario(path)?;
    let seed = args
        .seed
        .or(scenario.seed)
        .unwrap_or_else(rand::random);
    let config = apply_ai_overrides(base, &scenario.ai_overrides)
        .with_context(|| format!("ai overrides in {}", path.display()))?;
    let state = build_state(content, &scenario, seed)?;
    Ok((state, config, seed))
}

fn registry_path(dir: &Path, faction: FactionId) -> PathBuf {
    dir.join(format!("ai_{}.json", faction.0))
}

fn load_registries(dir: &Path, controller: &mut AiController, world: &GameState) -> Result<()> {
    for faction in world.factions.values().filter(|f| f.ai && !f.dead) {
        let path = registry_path(dir, faction.id);
        if !path.exists() {
            continue;
        }
        let record = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut state = persist::load(&record, faction.id)
            .with_context(|| format!("loading {}", path.display()))?;
        persist::restore(&mut state, world);
        tracing::info!(faction = %faction.id, units = state.units.len(), "ai registry restored");
        controller.insert_state(state);
    }
    Ok(())
}

fn save_registries(dir: &Path, controller: &AiController) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for state in controller.states() {
        let path = registry_path(dir, state.faction);
        let record = persist::save(state)
            .with_context(|| format!("encoding ai registry for {}", state.faction))?;
        std::fs::write(&path, record).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Totals {
    missions_granted: u64,
    transport_allocations: u64,
    colonies_founded: u64,
    combats: u64,
}

impl Totals {
    fn add(&mut self, reports: &[TurnReport]) {
        for report in reports {
            self.missions_granted += u64::from(report.missions_granted);
            self.transport_allocations += u64::from(report.transport_allocations);
            for envelope in &report.events {
                match envelope.event {
                    Event::ColonyFounded { .. } => self.colonies_founded += 1,
                    Event::CombatResolved { .. } => self.combats += 1,
                    _ => {}
                }
            }
        }
    }
}

fn run(args: &RunArgs) -> Result<()> {
    let content = load_content(&args.content_dir)?;
    let base = load_ai_config(&args.content_dir, &content)?;
    let (mut state, config, seed) = initial_world(args, &content, &base)?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut controller = AiController::new(config);
    if let Some(dir) = &args.ai_dir {
        load_registries(dir, &mut controller, &state)?;
    }

    println!(
        "Starting run: turns={} seed={seed} factions={} content_version={}",
        args.turns,
        state.factions.len(),
        content.content_version,
    );
    println!("{}", "-".repeat(80));

    let print_every = args.print_every.max(1);
    let mut totals = Totals::default();
    for _ in 0..args.turns {
        let reports = controller.run_turn(&mut state, &content, &mut rng);
        totals.add(&reports);
        colony_core::advance_turn(&mut state, &content);
        if state.meta.turn % print_every == 0 {
            print_status(&state);
        }
    }

    println!("{}", "-".repeat(80));
    println!("Done. Final state at turn {}:", state.meta.turn);
    print_status(&state);
    print_summary(&state, &totals)?;

    if let Some(dir) = &args.ai_dir {
        save_registries(dir, &controller)?;
        println!("AI registries written to {}", dir.display());
    }
    if let Some(path) = &args.save_state {
        let json = serde_json::to_string_pretty(&state).context("encoding final state")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

fn print_status(state: &GameState) {
    for faction in state.factions.values().filter(|f| !f.dead) {
        println!(
            "[turn={:03}]  {:<10} gold={:6}  colonies={:2}  units={:3}",
            state.meta.turn,
            faction.name,
            faction.gold,
            state.colonies_of(faction.id).count(),
            state.faction_units(faction.id).count(),
        );
    }
}

fn print_summary(state: &GameState, totals: &Totals) -> Result<()> {
    let factions: Vec<serde_json::Value> = state
        .factions
        .values()
        .map(|f| {
            serde_json::json!({
                "faction": f.id.0,
                "name": f.name,
                "dead": f.dead,
                "gold": f.gold,
                "colonies": state.colonies_of(f.id).count(),
                "units": state.faction_units(f.id).count(),
            })
        })
        .collect();
    let summary = serde_json::json!({
        "turn": state.meta.turn,
        "missions_granted": totals.missions_granted,
        "transport_allocations": totals.transport_allocations,
        "colonies_founded": totals.colonies_founded,
        "combats": totals.combats,
        "factions": factions,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("encoding summary")?
    );
    Ok(())
}

fn check(scenario: &Path, content_dir: &str) -> Result<()> {
    let content = load_content(content_dir)?;
    let base = load_ai_config(content_dir, &content)?;
    let parsed = load_scenario(scenario)?;
    apply_ai_overrides(&base, &parsed.ai_overrides)?;
    let state = build_state(&content, &parsed, parsed.seed.unwrap_or(0))?;
    println!(
        "{} ok: {}x{} map, {} factions, {} settlements, {} units",
        parsed.name,
        state.map.width,
        state.map.height,
        state.factions.len(),
        state.settlements.len(),
        state.live_units().count(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Run {
            turns,
            scenario,
            state_file,
            seed,
            content_dir,
            ai_dir,
            save_state,
            print_every,
        } => run(&RunArgs {
            turns,
            scenario,
            state_file,
            seed,
            content_dir,
            ai_dir,
            save_state,
            print_every,
        }),
        Commands::Check {
            scenario,
            content_dir,
        } => check(&scenario, &content_dir),
    }
}
