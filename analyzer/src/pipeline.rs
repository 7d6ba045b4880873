//! One structure, one state: pocket finder outputs in, characteristics table and colours out.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::classifier::{PocketClassifier, PocketTyping};
use crate::colors::{sequence_length, ColorAssignment};
use crate::config::AnalysisConfig;
use crate::contacts::{read_contact_export, ContactExport};
use crate::error::PocketResult;
use crate::finder::{FpocketOutputs, PocketFinder};
use crate::ligand::{LigandChooser, LigandResolver};
use crate::lookup::LigandLookup;
use crate::reconcile::{dbref_offset, merge_lockstep, write_real_sphere, NucleotideIndexer};
use crate::render::{RenderContext, RenderSession};
use crate::report::read_report;
use crate::structure::pdb::read_pdb;
use crate::structure::Structure;
use crate::table::PocketTable;

/// External collaborators of a run, owned by the caller.
pub struct Collaborators<'c> {
    pub finder: &'c dyn PocketFinder,
    pub lookup: &'c dyn LigandLookup,
    pub chooser: &'c mut dyn LigandChooser,
    pub renderer: &'c mut dyn RenderContext,
}

#[derive(Debug, Clone)]
pub struct StateResult {
    pub table: PocketTable,
    pub colors: ColorAssignment,
    /// Absent when the chains cannot be mapped onto a secondary structure.
    pub indexer: Option<NucleotideIndexer>,
    pub analysis_dir: PathBuf,
    pub csv: PathBuf,
    pub real_sphere: PathBuf,
}

fn locate_outputs(
    config: &AnalysisConfig,
    chains: &[String],
    state: Option<u32>,
    finder: &dyn PocketFinder,
) -> PocketResult<FpocketOutputs> {
    match &config.analysis_dir {
        Some(dir) => FpocketOutputs::locate(dir),
        None => finder.find(&config.pdb, chains, state, &config.detection, &config.output_root()),
    }
}

/// Analyze one state of `input` (the structure named by `config.pdb`).
pub fn analyze_state(
    config: &AnalysisConfig,
    input: &Structure,
    state: Option<u32>,
    collab: &mut Collaborators<'_>,
) -> PocketResult<StateResult> {
    let chains = config.resolve_chains(input)?;
    let name = config.run_name(state);
    let outputs = locate_outputs(config, &chains, state, collab.finder)?;
    let analysis_dir = outputs.dir.clone();
    info!("Analyzing {} (state {:?}) from {}", name, state, analysis_dir.display());

    let real_sphere = analysis_dir.join(format!("{name}_out_real_sphere.pdb"));
    let merged = if config.lockstep_merge {
        merge_lockstep(&outputs.pdb_out, &outputs.pqr_out, &real_sphere)?;
        read_pdb(&real_sphere, "real_sphere")?
    } else {
        write_real_sphere(&outputs.pdb_out, &outputs.pqr_out, &real_sphere)?
    };

    let records = read_report(&outputs.info_txt, &config.detection, &config.pdb_code(), state)?;
    let exports: Vec<ContactExport> = outputs
        .pocket_exports
        .iter()
        .map(read_contact_export)
        .collect::<PocketResult<_>>()?;

    let model = input.model(state);
    let spheres = merged.spheres();
    let typing = match config.known_nucleotides() {
        Some(known) => PocketTyping::KnownNucleotides(known),
        None if spheres.is_empty() => {
            info!("No pockets in {}; ligand typing skipped", outputs.pdb_out.display());
            PocketTyping::None
        }
        None => {
            let ligand_chain = config.ligand_chain.clone().unwrap_or_else(|| chains[0].clone());
            let mut resolver = LigandResolver::new(collab.lookup, &mut *collab.chooser);
            let source_name = input.source.display().to_string();
            match resolver.resolve(&model, &config.ligand_request(), &ligand_chain, &source_name)? {
                Some(ligand) => PocketTyping::Ligand(ligand),
                None => PocketTyping::None,
            }
        }
    };

    let classifier = PocketClassifier::new(config.classifier_settings());
    let table = classifier.classify(records, &spheres, &exports, &chains, &typing, collab.lookup);

    let csv = analysis_dir.join(format!("{name}_out_pocket_characteristics.csv"));
    table.write_csv(&csv)?;

    let polymer = model.select(|a| !a.is_sphere() && !a.is_hetero()).chains(&chains);
    let offset = config
        .offset
        .or_else(|| dbref_offset(input, &chains[0]))
        .unwrap_or(0);
    debug!("nucleotide offset {}", offset);
    let indexer = match NucleotideIndexer::new(&polymer, &chains, offset) {
        Ok(indexer) => Some(indexer),
        Err(e) => {
            warn!("Skipping 2D figure: {}", e);
            None
        }
    };
    let seq_len = sequence_length(polymer.residue_count(), config.nsd_length);
    let colors = ColorAssignment::assign(&table.records, seq_len, indexer.as_ref(), indexer.is_some());

    render_state(collab.renderer, &table, &colors, &real_sphere, &analysis_dir, &name)?;

    Ok(StateResult {
        table,
        colors,
        indexer,
        analysis_dir,
        csv,
        real_sphere,
    })
}

/// One scene per pocket, then the overview figure; each scene is cleared before the next.
fn render_state(
    renderer: &mut dyn RenderContext,
    table: &PocketTable,
    colors: &ColorAssignment,
    real_sphere: &Path,
    analysis_dir: &Path,
    name: &str,
) -> PocketResult<()> {
    for (id, color) in &colors.pocket_colors {
        let mut session = RenderSession::open(renderer);
        session.load_structure(real_sphere, &format!("pocket_{id}"))?;
        session.show_pockets(&BTreeMap::from([(*id, *color)]))?;
    }

    if table.is_empty() {
        return Ok(());
    }
    let mut session = RenderSession::open(renderer);
    session.load_structure(real_sphere, name)?;
    session.show_pockets(&colors.pocket_colors)?;
    session.save_figure(&analysis_dir.join(format!("{name}_3D.png")))?;
    Ok(())
}
