use std::path::PathBuf;

use anyhow::Context;
use clap::ArgAction;
use clap::Parser;
use log::info;
use log::LevelFilter;
use protostar::ics;
use protostar::io::build_format;
use protostar::parameters::SimulationParameters;
use protostar::simulation::local::run_distributed;
use protostar::simulation::Simulation;
use simplelog::ColorChoice;
use simplelog::Config;
use simplelog::TermLogger;
use simplelog::TerminalMode;

#[derive(Parser)]
#[clap(name = "protostar", about = "SPH + N-body engine for self-gravitating gas")]
struct Options {
    /// YAML parameter file describing the run.
    parameter_file: PathBuf,
    /// Read initial conditions from a snapshot file instead of sampling
    /// a lattice.
    #[clap(long)]
    input: Option<PathBuf>,
    /// Lattice resolution per axis for sampled initial conditions.
    #[clap(long, default_value_t = 16)]
    lattice: usize,
    /// Number of domain decomposition workers (power of two).
    #[clap(long, default_value_t = 1)]
    num_workers: usize,
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let options = Options::parse();
    let level = match options.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )?;

    let parameters = SimulationParameters::from_file(&options.parameter_file)?;
    let particles = match &options.input {
        Some(path) => {
            let format = build_format(parameters.output.format);
            let data = format
                .read(path)
                .with_context(|| format!("reading initial conditions from {path:?}"))?;
            info!("read {} particles at t = {}", data.len(), data.time);
            data.to_particles()
        }
        None => {
            let particles = ics::lattice(&parameters.box_size, options.lattice, 1.0, 1.0);
            info!("sampled {} lattice particles", particles.len());
            particles
        }
    };

    if options.num_workers <= 1 {
        let mut simulation = Simulation::new_single_worker(parameters, particles, vec![])?;
        simulation.run()?;
    } else {
        let failures: Vec<_> = run_distributed(
            parameters,
            options.num_workers,
            move |rank| {
                if rank == 0 {
                    (particles.clone(), vec![])
                } else {
                    (vec![], vec![])
                }
            },
            |simulation| simulation.run().err(),
        )
        .into_iter()
        .flatten()
        .collect();
        if let Some(error) = failures.into_iter().next() {
            return Err(error.into());
        }
    }
    info!("run finished");
    Ok(())
}
