//! Evolves crawling creatures.
//!
//! Usage: `crawl [config] [evolution_dir]`, defaulting to
//! `crawl.ron` and `evolution/`.
//!
//! A default configuration is written if none exists yet.
//! Every generation is checkpointed to `evolution_dir`, and an
//! interrupted run picks up from the latest saved generation
//! when started again. Ctrl-C abandons the generation being
//! simulated and exits once workers have cleaned up.
//! `RUST_LOG` controls verbosity.
use evosim::{
    load_ron, save_ron, Evolution, EvolutionConfig, RonDirectory, SimulationId, StopSignal,
};
use evosim_body::{BodyConfig, CreatureFactory};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use std::env;
use std::error::Error;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread::{self, JoinHandle};

const DEFAULT_CONFIG: &str = "crawl.ron";
const DEFAULT_EVOLUTION_DIR: &str = "evolution";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct CrawlConfig {
    evolution: EvolutionConfig,
    body: BodyConfig,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let mut args = env::args().skip(1);
    let config_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_CONFIG.into()));
    let evolution_dir =
        PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_EVOLUTION_DIR.into()));

    match crawl(config_path, evolution_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn crawl(config_path: PathBuf, evolution_dir: PathBuf) -> Result<(), Box<dyn Error>> {
    let config: CrawlConfig = if config_path.exists() {
        load_ron(&config_path)?
    } else {
        let config = CrawlConfig::default();
        save_ron(&config_path, &config)?;
        info!(path = %config_path.display(), "wrote default configuration");
        config
    };

    let factory = CreatureFactory::new(config.body, config.evolution.simulation.timestep())?;
    let mut store = RonDirectory::new(evolution_dir)?;
    let mut evolution = Evolution::resume_from(
        config.evolution,
        factory.gene_space(),
        &store,
        |id: SimulationId| factory.build(id),
    )?;
    info!(
        generation = evolution.generation(),
        target = evolution.config().generations,
        dir = %store.root().display(),
        "starting evolution"
    );

    let stop = StopSignal::new();
    raise_on_interrupt(stop.clone(), tokio::signal::ctrl_c())?;
    let summary = evolution.run(&stop, Some(&mut store))?;
    if summary.interrupted {
        warn!(
            completed = summary.completed,
            resume_from = evolution.generation(),
            "evolution interrupted"
        );
    }
    match &summary.champion {
        Some(champion) => info!(
            completed = summary.completed,
            interrupted = summary.interrupted,
            champion = %champion,
            "evolution finished"
        ),
        None => info!(completed = summary.completed, "nothing left to simulate"),
    }
    if let Some(log) = evolution.logger().last() {
        println!("{}", log);
    }
    Ok(())
}

/// Raises `stop` once `interrupt` resolves, from a background
/// thread driving its own single-threaded runtime.
fn raise_on_interrupt<F>(stop: StopSignal, interrupt: F) -> io::Result<JoinHandle<()>>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || match runtime.block_on(interrupt) {
            Ok(()) => {
                warn!("interrupt received, abandoning the current generation");
                stop.raise();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupts"),
        })
}
