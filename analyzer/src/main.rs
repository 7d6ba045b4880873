use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::aggregate::analyze_all_states;
use crate::config::AnalysisConfig;
use crate::error::PocketError;
use crate::finder::{ExistingOutputs, FpocketRunner, PocketFinder};
use crate::helper_functions::project_root;
use crate::ligand::{DeclineChooser, LigandChooser, ScriptedChooser, StdinChooser};
use crate::lookup::{LigandLookup, OfflineLookup, RcsbLookup};
use crate::pipeline::{analyze_state, Collaborators};
use crate::render::LoggingRenderer;
use crate::structure::pdb::read_pdb;

mod aggregate;
mod classifier;
mod colors;
mod config;
mod contacts;
mod error;
mod finder;
mod geometry;
mod helper_functions;
mod ligand;
mod lookup;
mod models;
mod pipeline;
mod reconcile;
mod render;
mod report;
mod structure;
mod table;

const CONFIG_FILE: &str = "pocket_config.json";

fn build_finder(config: &AnalysisConfig) -> anyhow::Result<Box<dyn PocketFinder>> {
    if !config.run_pocket_finder || config.analysis_dir.is_some() {
        return Ok(Box::new(ExistingOutputs));
    }
    let runner = match &config.fpocket_path {
        Some(path) => FpocketRunner::new(path, config.overwrite),
        None => FpocketRunner::discover(config.overwrite)?,
    };
    Ok(Box::new(runner))
}

fn build_lookup(config: &AnalysisConfig) -> anyhow::Result<Box<dyn LigandLookup>> {
    if config.fetch_ligand_reference {
        Ok(Box::new(RcsbLookup::new().context("building the ligand reference client")?))
    } else {
        Ok(Box::new(OfflineLookup::default()))
    }
}

fn build_chooser(config: &AnalysisConfig) -> Box<dyn LigandChooser> {
    if !config.ligand_choices.is_empty() {
        Box::new(ScriptedChooser::new(config.ligand_choices.clone()))
    } else if config.interactive {
        Box::new(StdinChooser)
    } else {
        Box::new(DeclineChooser)
    }
}

fn run(config: &AnalysisConfig) -> anyhow::Result<()> {
    let input = read_pdb(&config.pdb, "pdb")?;
    let finder = build_finder(config)?;
    let lookup = build_lookup(config)?;
    let mut chooser = build_chooser(config);
    let mut renderer = LoggingRenderer::default();
    let mut collab = Collaborators {
        finder: finder.as_ref(),
        lookup: lookup.as_ref(),
        chooser: chooser.as_mut(),
        renderer: &mut renderer,
    };

    match config.state {
        Some(0) => {
            let result = analyze_all_states(config, &input, &mut collab)?;
            info!("Wrote {}", result.csv.display());
        }
        state => {
            let result = analyze_state(config, &input, state, &mut collab)?;
            info!("Wrote {} and {}", result.csv.display(), result.real_sphere.display());
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting the RNA pocket analysis");

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| project_root().join(CONFIG_FILE));
    let config = AnalysisConfig::load(&config_path)
        .with_context(|| format!("Unable to load run configuration {}", config_path.display()))?;

    if let Err(e) = run(&config) {
        error!("Analysis of {} failed: {:#}", config.pdb.display(), e);
        if e.downcast_ref::<PocketError>().is_some_and(PocketError::is_configuration) {
            error!("Fix the option named above in {} and re-run.", config_path.display());
        }
        return Err(e);
    }
    info!("Analysis of {} complete", config.pdb.display());
    Ok(())
}
