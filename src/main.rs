use std::io::Cursor;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use fostering_engine::config::AppConfig;
use fostering_engine::error::AppError;
use fostering_engine::telemetry;
use fostering_engine::workflows::placement::{
    ActorId, ChildId, CompatibilityScore, CostAllocator, EngineError, EntityStore, InMemoryStore,
    LogNotifier, MatchingService, PlacementService, StageId,
};
use fostering_engine::workflows::roster::RosterImporter;

const SAMPLE_CHILDREN: &str = "\
id,name,birth_date,gender,status,has_special_needs,health_conditions,medications,educational_needs,siblings
child-100,Rafael Lima,2015-03-01,male,awaiting,,,,,child-101
child-101,Ana Lima,2017-08-20,female,awaiting,true,asthma,inhaler,speech therapy,child-100
child-102,Bruno Costa,2009-11-12,male,awaiting,,,,,
";

const SAMPLE_FAMILIES: &str = "\
id,primary_contact,city,state,members,age_min,age_max,gender_preference,special_needs_accepted,max_children,status
family-200,Marta Alves,Santa Clara,SP,mother:38:4200|father:41:3600,5,15,any,true,2,available
family-201,Paulo Souza,Ribeira,SP,father:45:5100,8,12,male,false,1,available
family-202,Irene Duarte,Campinas,SP,mother:52:6800|grandmother:74:1900|child:12:0,3,17,any,true,3,available
";

#[derive(Parser, Debug)]
#[command(
    name = "Placement Lifecycle Engine",
    about = "Score, match, and run foster-care placements from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk a bundled roster through scoring, matching, placement, and closure (default command)
    Demo(DemoArgs),
    /// Rank candidate families for one child from CSV roster exports
    Rank(RankArgs),
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Override the scoring date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct RankArgs {
    /// Path to the children.csv export
    #[arg(long)]
    children: PathBuf,
    /// Path to the families.csv export
    #[arg(long)]
    families: PathBuf,
    /// Child to rank candidate families for
    #[arg(long)]
    child_id: String,
    /// Keep only the strongest N candidates
    #[arg(long, default_value_t = 5)]
    limit: usize,
    /// Override the scoring date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("application error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Demo(args) => run_demo(args, &config),
        Command::Rank(args) => run_rank(args),
    }
}

fn run_demo(args: DemoArgs, config: &AppConfig) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let coordinator = ActorId("coordinator-demo".to_string());

    println!("Placement lifecycle demo (scoring date {today})");

    let roster =
        RosterImporter::from_readers(Cursor::new(SAMPLE_CHILDREN), Cursor::new(SAMPLE_FAMILIES))?;
    let store = Arc::new(InMemoryStore::new());
    roster.seed(store.as_ref()).map_err(EngineError::from)?;
    println!(
        "Seeded {} children and {} families from the bundled roster",
        roster.children.len(),
        roster.families.len()
    );

    let notifier = Arc::new(LogNotifier);
    let allocator = Arc::new(CostAllocator::new(config.costs));
    let matching = MatchingService::new(store.clone(), notifier.clone());
    let placements = PlacementService::new(store.clone(), notifier, allocator.clone());

    let child_id = ChildId("child-100".to_string());
    let child = store.child(&child_id).map_err(EngineError::from)?;
    println!(
        "\nCandidate ranking for {} ({})",
        child_id, child.entity.personal.name
    );
    let candidates = matching.rank_candidate_families(&child_id, 3, today)?;
    render_candidates(&candidates);

    let Some(best) = candidates.first() else {
        println!("No available families to rank");
        return Ok(());
    };

    println!("\nMatching review");
    let proposal = matching.propose_matching(&child_id, &best.family, &coordinator, today)?;
    println!(
        "- Proposed matching {} with score {} ({})",
        proposal.entity.id,
        best.overall,
        best.recommendation.label()
    );
    let approved = matching.approve_matching(&proposal.entity.id, &coordinator)?;
    println!("- Approved by {coordinator}");

    println!("\nPlacement");
    let placement = placements.create_placement(&approved.entity.id, &coordinator)?;
    let placement_id = placement.entity.id.clone();
    println!(
        "- Created placement {} starting {} | monthly allocation {}",
        placement_id, placement.entity.start_date, placement.entity.budget.monthly_allocation
    );
    println!(
        "- Programme budget: {} allocated / {} available",
        allocator.allocated(),
        allocator.available()
    );

    println!("\nApproximation process");
    let placement = placements.complete_stage(
        &placement_id,
        &StageId("initial_contact".to_string()),
        Some("first supervised visit went well"),
        &coordinator,
    )?;
    for stage in &placement.entity.process.stages {
        let mark = if stage.completed { "x" } else { " " };
        println!("- [{mark}] {} ({})", stage.name, stage.id);
    }
    let checkpoint = placement.entity.start_date + Duration::days(45);
    let progress = placement.entity.process.progress(checkpoint);
    println!(
        "- Day {}: {}% complete vs {}% expected -> {}",
        progress.days_elapsed,
        progress.actual_progress,
        progress.expected_progress,
        if progress.is_on_track {
            "on track"
        } else {
            "behind schedule"
        }
    );

    println!("\nMonthly payment");
    let placement =
        placements.record_payment(&placement_id, Some("first monthly stipend"), &coordinator)?;
    println!(
        "- Posted {} | total spent {}",
        placement.entity.budget.monthly_allocation, placement.entity.budget.total_cost
    );

    println!("\nClosure");
    let placement =
        placements.end_placement(&placement_id, "reunified with extended family", &coordinator)?;
    println!(
        "- Placement {} -> {}",
        placement_id,
        placement.entity.status.label()
    );
    let family = store.family(&best.family).map_err(EngineError::from)?;
    println!(
        "- Family {} back to {} with {} past placement(s) on record",
        best.family,
        family.entity.status.label(),
        family.entity.history.len()
    );
    println!(
        "- Programme budget: {} allocated / {} available",
        allocator.allocated(),
        allocator.available()
    );

    println!("\nCompatibility payload");
    match serde_json::to_string_pretty(best) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("payload unavailable: {err}"),
    }

    Ok(())
}

fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let RankArgs {
        children,
        families,
        child_id,
        limit,
        today,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let roster = RosterImporter::from_paths(&children, &families)?;
    let store = Arc::new(InMemoryStore::new());
    roster.seed(store.as_ref()).map_err(EngineError::from)?;

    let matching = MatchingService::new(store.clone(), Arc::new(LogNotifier));

    let child_id = ChildId(child_id);
    let child = store.child(&child_id).map_err(EngineError::from)?;
    println!(
        "Candidate families for {} ({}), scored {}",
        child_id, child.entity.personal.name, today
    );
    let candidates = matching.rank_candidate_families(&child_id, limit, today)?;
    render_candidates(&candidates);

    if let Some(best) = candidates.first() {
        println!("\nTop candidate payload");
        match serde_json::to_string_pretty(best) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn render_candidates(candidates: &[CompatibilityScore]) {
    if candidates.is_empty() {
        println!("- No available families");
        return;
    }

    for score in candidates {
        println!(
            "- {}: {} ({}) | age {} | needs {} | household {} | experience {} | availability {}",
            score.family,
            score.overall,
            score.recommendation.label(),
            score.factors.age_range,
            score.factors.special_needs,
            score.factors.family_size,
            score.factors.experience,
            score.factors.availability
        );
        for note in &score.notes {
            println!("    note: {note}");
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
