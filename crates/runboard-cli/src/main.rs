//! runboard CLI: inspect saved workspace snapshots from the terminal.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use runboard_core::progress::ordered_by_dependencies;
use runboard_core::storage;
use runboard_core::table::{paginate_runs, select_filter, PageRequest, Pagination, RunSort, TableQuery};
use runboard_core::tree::format_megabytes;
use runboard_core::{
    build_path_tree, Direction, LayoutConfig, LayoutGraph, PathTreeNode, Poller, RunProgress,
    RunStepInfo, StepFlow, StepStatus, FETCH_INTERVAL,
};

#[derive(Parser)]
#[command(
    name = "runboard",
    about = "runboard: artifact trees, step graphs and run tables for workspace snapshots",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a step's artifacts as a file tree
    Tree {
        /// Artifact map saved as JSON (path -> bytes)
        artifacts: PathBuf,
    },
    /// Show a run's status and its steps in dependency order
    Steps {
        /// Run snapshot saved as JSON
        run: PathBuf,
        /// Only show steps with this status
        #[arg(long, short)]
        status: Option<StepStatus>,
    },
    /// Lay out a run's step graph
    Layout {
        /// Run snapshot saved as JSON
        run: PathBuf,
        /// Direction in which ranks advance
        #[arg(long, short, value_enum, default_value_t = DirectionArg::Lr)]
        direction: DirectionArg,
        /// Expand a step (repeatable)
        #[arg(long, short)]
        expand: Vec<String>,
        /// Layout settings (YAML); defaults apply when absent
        #[arg(long, short)]
        config: Option<PathBuf>,
        /// Output format
        #[arg(long, short, value_enum, default_value_t = FormatArg::Table)]
        format: FormatArg,
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// List runs one page at a time
    Runs {
        /// Runs list saved as JSON
        runs: PathBuf,
        /// Page to show, starting at 1
        #[arg(long, short, default_value_t = 1)]
        page: usize,
        /// Rows per page
        #[arg(long, default_value_t = 10)]
        page_size: usize,
        /// Column to sort by
        #[arg(long, short, value_enum, default_value_t = SortArg::StartDate)]
        sort: SortArg,
        /// Sort ascending instead of newest/last first
        #[arg(long)]
        ascending: bool,
        /// Only show runs whose name contains this text
        #[arg(long, short = 'm')]
        r#match: Option<String>,
    },
    /// Poll a run snapshot and print its progress whenever it changes
    Watch {
        /// Run snapshot saved as JSON
        run: PathBuf,
        /// Seconds between reads
        #[arg(long, short, default_value_t = FETCH_INTERVAL.as_secs())]
        interval: u64,
        /// Exit after this many updates
        #[arg(long, short = 'n')]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    /// Left to right
    Lr,
    /// Top to bottom
    Tb,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Lr => Direction::LeftToRight,
            DirectionArg::Tb => Direction::TopToBottom,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    #[value(name = "start_date")]
    StartDate,
}

impl From<SortArg> for RunSort {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => RunSort::Name,
            SortArg::StartDate => RunSort::StartDate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tree { artifacts } => {
            cmd_tree(artifacts)?;
        }
        Commands::Steps { run, status } => {
            cmd_steps(run, status)?;
        }
        Commands::Layout { run, direction, expand, config, format, output } => {
            cmd_layout(run, direction.into(), expand, config, format, output)?;
        }
        Commands::Runs { runs, page, page_size, sort, ascending, r#match } => {
            let request = PageRequest {
                current_page: page,
                page_size,
                sort_by: sort.into(),
                sort_descending: !ascending,
                match_text: r#match,
                status: None,
            };
            cmd_runs(runs, request)?;
        }
        Commands::Watch { run, interval, count } => {
            cmd_watch(run, Duration::from_secs(interval), count).await?;
        }
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn cmd_tree(path: PathBuf) -> Result<()> {
    let artifacts = storage::load_artifacts(&path)?;
    let roots = build_path_tree(&artifacts);

    if roots.is_empty() {
        println!("No artifacts in '{}'", path.display());
        return Ok(());
    }

    let mut lines = Vec::new();
    for root in &roots {
        lines.push(tree_label(root));
        render_children(root, "", &mut lines);
    }
    println!("{}", lines.join("\n"));

    let total: u64 = roots.iter().map(PathTreeNode::total_size).sum();
    println!();
    println!("{} artifact(s), {}", artifacts.len(), format_megabytes(total));
    Ok(())
}

fn cmd_steps(path: PathBuf, status: Option<StepStatus>) -> Result<()> {
    let run = storage::load_run(&path)?;
    let progress = RunProgress::of_run(&run);

    println!("Run: {}", run.name);
    println!("Status: {}", progress.status);
    if !progress.step_status.is_empty() {
        println!("Steps: {}", progress.step_status);
    }
    if let Some(started) = run.started {
        println!("Started: {}", started.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(ended) = progress.ended {
        println!("Ended: {}", ended.format("%Y-%m-%d %H:%M:%S"));
    }
    println!();

    let ordered = ordered_by_dependencies(&run.run_step_infos, |s| &s.info);

    let mut query = TableQuery::new();
    if let Some(status) = status {
        query.set_filter(
            "status",
            select_filter(|s: &&RunStepInfo| Some(s.info.status.as_str()), status.as_str()),
        );
    }
    let rows = query.apply(&ordered);

    if rows.is_empty() {
        println!("No steps to show");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["#", "Step", "Id", "Status", "Duration", "Depends on"]);

    for step in rows {
        let duration = match (step.info.started, step.info.ended) {
            (Some(start), Some(end)) => format_duration((end - start).num_seconds() as f64),
            (Some(_), None) => "running".to_string(),
            _ => "-".to_string(),
        };
        let deps = if step.info.dependencies.is_empty() {
            "-".to_string()
        } else {
            step.info.dependencies.join(", ")
        };
        table.add_row([
            step.order.to_string().as_str(),
            &step.name,
            &step.info.id,
            step.info.status.as_str(),
            &duration,
            &deps,
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn cmd_layout(
    path: PathBuf,
    direction: Direction,
    expand: Vec<String>,
    config: Option<PathBuf>,
    format: FormatArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let run = storage::load_run(&path)?;
    let config = match config {
        Some(config_path) => LayoutConfig::load(&config_path)?,
        None => LayoutConfig::default(),
    };

    let mut flow = StepFlow::from_run_steps(&run.run_step_infos, direction, config);
    for id in &expand {
        if !flow.toggle_expanded(id) {
            anyhow::bail!("Unknown step: {}", id);
        }
    }
    let graph = flow.graph();

    let content = match format {
        FormatArg::Json => serde_json::to_string_pretty(graph)?,
        FormatArg::Table => render_layout(graph),
    };

    match output {
        Some(out) => {
            std::fs::write(&out, &content)?;
            info!(nodes = graph.nodes.len(), edges = graph.edges.len(), "Layout written");
            println!("Wrote layout of {} step(s) to {}", graph.nodes.len(), out.display());
        }
        None => println!("{}", content),
    }

    Ok(())
}

fn cmd_runs(path: PathBuf, request: PageRequest<RunSort>) -> Result<()> {
    let runs = storage::load_runs(&path)?;
    let pagination = Pagination::new(request.page_size)?;
    let page = paginate_runs(&runs, &request)?;

    if page.total_items == 0 {
        println!("No runs found in '{}'", path.display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Run", "Started"]);
    for run in &page.data {
        let started = run
            .started
            .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row([run.name.as_str(), &started]);
    }

    println!("{}", table);
    if !pagination.hide_on_single_page(page.total_items) {
        println!(
            "Page {} of {} ({} runs)",
            request.current_page,
            pagination.page_count(page.total_items),
            page.total_items
        );
    }
    Ok(())
}

async fn cmd_watch(path: PathBuf, interval: Duration, count: Option<usize>) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Run snapshot not found: {}", path.display());
    }

    let source = path.clone();
    let poller = Poller::spawn(interval, move || {
        let source = source.clone();
        async move { storage::load_run(&source).map_err(|e| e.to_string()) }
    });
    let mut updates = poller.subscribe();
    let mut last: Option<RunProgress> = None;
    let mut shown = 0;

    println!("Watching {} (every {}s, Ctrl+C to stop)", path.display(), interval.as_secs());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }

        let snapshot = updates.borrow_and_update().clone();
        match snapshot {
            Some(Ok(run)) => {
                let progress = RunProgress::of_run(&run);
                if last.as_ref() != Some(&progress) {
                    println!(
                        "[{}] {}: {} ({})",
                        chrono::Utc::now().format("%H:%M:%S"),
                        run.name,
                        progress.status,
                        if progress.step_status.is_empty() { "no steps" } else { progress.step_status.as_str() },
                    );
                    last = Some(progress);
                    shown += 1;
                }
            }
            Some(Err(e)) => warn!(error = %e, "Failed to read run snapshot"),
            None => continue,
        }

        if count.is_some_and(|n| shown >= n) {
            break;
        }
    }

    poller.stop().await;
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn tree_label(node: &PathTreeNode) -> String {
    match node.size {
        Some(size) if node.children.is_empty() => format!("{}  {}", node.name, format_megabytes(size)),
        Some(size) => format!("{}/  {}", node.name, format_megabytes(size)),
        None => format!("{}/", node.name),
    }
}

fn render_children(node: &PathTreeNode, prefix: &str, lines: &mut Vec<String>) {
    let count = node.children.len();
    for (i, child) in node.children.values().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        lines.push(format!("{}{}{}", prefix, branch, tree_label(child)));
        let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
        render_children(child, &nested, lines);
    }
}

fn render_layout(graph: &LayoutGraph) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Step", "Rank", "Order", "X", "Y", "Width", "Height", "Status"]);
    for node in graph.nodes.values() {
        table.add_row([
            node.step.id.clone(),
            node.rank.to_string(),
            node.order.to_string(),
            format!("{:.0}", node.position.x),
            format!("{:.0}", node.position.y),
            format!("{:.0}", node.width),
            format!("{:.0}", node.height),
            node.step.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }

    let (width, height) = graph.extent();
    let mut out = format!("{}\n", table);
    out += &format!("Extent: {:.0} x {:.0}\n", width, height);
    if !graph.edges.is_empty() {
        out += "Edges:\n";
        for edge in &graph.edges {
            let marker = if edge.is_resolved() { "" } else { "  (unknown step)" };
            out += &format!("  {} -> {}{}\n", edge.source, edge.target, marker);
        }
    }
    out.trim_end().to_string()
}

fn format_duration(secs: f64) -> String {
    let secs = secs as u64;
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}h {}m", h, m)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}
