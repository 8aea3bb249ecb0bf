//! mlviz - headless lesson runner
//!
//! Runs any lesson on a cancelable tokio timer, the same way the browser
//! widget auto-advances it, and prints a frame per tick.
//!
//! Examples:
//!   mlviz list
//!   mlviz params label_propagation
//!   mlviz run kmeans -p k=4 --seed 7 --svg kmeans.svg
//!   mlviz run roc --json --delay-ms 20
//!   mlviz sitemap --base https://example.org
//!
//! Configuration: `config.json` in the OS config directory
//! (e.g. ~/.config/mlviz/ on Linux), overridden by flags.

use std::process::ExitCode;
use std::time::Duration;

use mlviz::chapters;
use mlviz::driver::Simulation;
use mlviz::lessons::{new_driver, LessonKind};
use mlviz::params::parse_assignment;
use mlviz::prng::Prng;
use mlviz::schedule::Runner;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod args;
mod config;
mod error;
mod paths;
mod session;
mod ticker;

use args::{parse_args, Command, RunOptions, USAGE};
use config::CliConfig;
use error::CliError;
use paths::AppPaths;
use session::{run_session, FrameSink};
use ticker::TokioScheduler;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match real_main().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}\n\n{USAGE}");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn real_main() -> Result<(), CliError> {
    let cli = parse_args(std::env::args().skip(1))?;

    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => AppPaths::new()?.config_file(),
    };
    let config = CliConfig::load(&config_path)?;

    match cli.command {
        Command::Help => println!("{USAGE}"),
        Command::List => {
            for k in LessonKind::all() {
                println!("{:<20} {}", k.label(), k.display_name());
            }
        }
        Command::Chapters => {
            for c in chapters::chapters() {
                let lessons: Vec<&str> = c.lessons.iter().map(|k| k.label()).collect();
                println!("{:>2}. {:<28} {}", c.index, c.title, lessons.join(", "));
            }
        }
        Command::Params { lesson } => {
            println!("{}: {}\n", lesson.display_name(), lesson.description());
            for line in param_lines(lesson) {
                println!("{line}");
            }
        }
        Command::Sitemap { base_url } => {
            let base = base_url.unwrap_or_else(|| config.base_url.clone());
            print!("{}", chapters::sitemap_xml(&base));
        }
        Command::Paths => {
            let paths = AppPaths::new()?;
            println!("config dir:  {}", paths.config_dir().display());
            println!("config file: {}", config_path.display());
        }
        Command::Run(opts) => run(opts, &config).await?,
    }
    Ok(())
}

async fn run(opts: RunOptions, config: &CliConfig) -> Result<(), CliError> {
    let kind = opts.lesson;
    let rng = match opts.seed.or(config.seed) {
        Some(seed) => Prng::new(seed),
        None => Prng::from_clock(),
    };
    let delay = Duration::from_millis(
        opts.delay_ms
            .or(config.delay_ms)
            .unwrap_or(u64::from(kind.default_tick_ms())),
    );

    let (scheduler, mut ticks) = TokioScheduler::new();
    let mut runner = Runner::new(new_driver(kind, rng), scheduler, delay);

    for (key, value) in config.lesson_params(kind.label()) {
        if let Err(e) = runner.set_param(key, value) {
            warn!("config: {e}");
        }
    }
    for assignment in &opts.params {
        let (key, value) = parse_assignment(assignment)?;
        let stored = runner.set_param(key, value)?;
        if stored != value {
            info!(key, requested = value, stored, "parameter clamped");
        }
    }

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler; run until the lesson halts.
            std::future::pending::<()>().await;
        }
    };
    let report = if opts.json {
        let mut sink = FrameSink::Json(std::io::stdout().lock());
        run_session(&mut runner, &mut ticks, &mut sink, shutdown).await?
    } else {
        let mut sink: FrameSink<std::io::Stdout> = FrameSink::Log;
        run_session(&mut runner, &mut ticks, &mut sink, shutdown).await?
    };
    info!(
        ticks = report.ticks,
        stale = report.stale,
        halt = ?report.halt,
        interrupted = report.interrupted,
        iteration = runner.driver().sim().iteration(),
        "session finished"
    );

    if let Some(path) = opts.svg {
        let svg = runner
            .driver()
            .scene(config.svg_width, config.svg_height)
            .to_svg();
        std::fs::write(&path, svg).map_err(|source| CliError::Write {
            path: path.clone(),
            source,
        })?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

/// One line per parameter, the shared iteration cap included.
fn param_lines(lesson: LessonKind) -> Vec<String> {
    lesson
        .default_params()
        .specs()
        .iter()
        .map(|s| {
            format!(
                "  {:<18} {:>8} in [{}, {}] step {}  {}",
                s.key,
                format!("{:.*}", s.decimals(), s.default),
                s.min,
                s.max,
                s.step,
                s.description
            )
        })
        .collect()
}
