//! Picks the heteroatom group that pockets are compared against.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use tracing::{info, warn};

use crate::error::{PocketError, PocketResult};
use crate::lookup::{LigandDescriptor, LigandLookup};
use crate::structure::AtomView;

const NO_LIGAND: &[&str] = &["n", "no", "none"];
const MAX_PROMPTS: usize = 5;

fn is_no_ligand(text: &str) -> bool {
    NO_LIGAND.contains(&text.trim().to_ascii_lowercase().as_str())
}

fn valid_code_length(code: &str) -> bool {
    (2..=3).contains(&code.chars().count())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LigandRequest {
    /// The caller asked for no ligand.
    None,
    /// A residue code to select in the ligand chain.
    Explicit(String),
    /// Detect the ligand from the heteroatoms of the ligand chain.
    Auto,
}

impl LigandRequest {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => LigandRequest::Auto,
            Some(v) if is_no_ligand(v) => LigandRequest::None,
            Some(v) if valid_code_length(v) => LigandRequest::Explicit(v.to_string()),
            Some(v) => {
                warn!("Ligand code '{}' is not 2-3 characters long; detecting the ligand instead", v);
                LigandRequest::Auto
            }
        }
    }
}

/// Resolution strategy for several plausible ligands when no reference data settles it.
pub trait LigandChooser {
    /// Answer with a residue code, or a "none" response. `None` means no answer is available.
    fn choose(&mut self, candidates: &[String]) -> Option<String>;
}

/// Asks on the terminal.
#[derive(Debug, Default)]
pub struct StdinChooser;

impl LigandChooser for StdinChooser {
    fn choose(&mut self, candidates: &[String]) -> Option<String> {
        print!(
            "Detected heteroatoms: {:?}.\n\nInput the target ligand ID (case-sensitive; \"none\" for no ligand): ",
            candidates
        );
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

/// Never picks; used for unattended runs.
#[derive(Debug, Default)]
pub struct DeclineChooser;

impl LigandChooser for DeclineChooser {
    fn choose(&mut self, _candidates: &[String]) -> Option<String> {
        None
    }
}

/// Replays prepared answers in order.
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    answers: VecDeque<String>,
}

impl ScriptedChooser {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl LigandChooser for ScriptedChooser {
    fn choose(&mut self, _candidates: &[String]) -> Option<String> {
        self.answers.pop_front()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedLigand<'a> {
    pub code: String,
    pub atoms: AtomView<'a>,
    /// Reference data, when it was already fetched during disambiguation.
    pub descriptor: Option<LigandDescriptor>,
}

/// Ligand resolution against one model of the complex structure.
pub struct LigandResolver<'r> {
    pub lookup: &'r dyn LigandLookup,
    pub chooser: &'r mut dyn LigandChooser,
}

impl<'r> LigandResolver<'r> {
    pub fn new(lookup: &'r dyn LigandLookup, chooser: &'r mut dyn LigandChooser) -> Self {
        Self { lookup, chooser }
    }

    pub fn resolve<'a>(
        &mut self,
        atoms: &AtomView<'a>,
        request: &LigandRequest,
        chain: &str,
        source_name: &str,
    ) -> PocketResult<Option<ResolvedLigand<'a>>> {
        match request {
            LigandRequest::None => Ok(None),
            LigandRequest::Explicit(code) => {
                let selected = atoms.chain(chain).res_name(code);
                if selected.is_empty() {
                    return Err(PocketError::config(
                        format!("Chain {chain} of {source_name} does not contain a ligand named: {code}"),
                        "Please provide a valid ligand chain (ligand_chain) and ligand residue name (ligand).",
                    ));
                }
                info!("Using {} as ligand for analysis.", code);
                Ok(Some(ResolvedLigand {
                    code: code.clone(),
                    atoms: selected,
                    descriptor: None,
                }))
            }
            LigandRequest::Auto => self.detect(atoms, chain),
        }
    }

    fn detect<'a>(&mut self, atoms: &AtomView<'a>, chain: &str) -> PocketResult<Option<ResolvedLigand<'a>>> {
        let hetero = atoms
            .chain(chain)
            .select(|a| a.is_hetero() && !a.is_sphere() && !a.is_ion() && !a.is_water());
        let names = hetero.unique_res_names();

        match names.as_slice() {
            [] => {
                info!("No ligand detected.");
                Ok(None)
            }
            [only] if valid_code_length(only) => {
                info!("Using {} as ligand for analysis.", only);
                Ok(Some(ResolvedLigand {
                    code: only.clone(),
                    atoms: hetero.res_name(only),
                    descriptor: None,
                }))
            }
            [_] => {
                info!("No ligand detected.");
                Ok(None)
            }
            _ => {
                if let Some(best) = self.best_by_reference(&names) {
                    info!(
                        "Using {} as ligand for analysis (highest QED among {:?}).",
                        best.code, names
                    );
                    let atoms = hetero.res_name(&best.code);
                    return Ok(Some(ResolvedLigand {
                        code: best.code.clone(),
                        atoms,
                        descriptor: Some(best),
                    }));
                }
                Ok(self.ask(&hetero, &names))
            }
        }
    }

    /// Highest-QED candidate that is not a small fragment.
    fn best_by_reference(&self, names: &[String]) -> Option<LigandDescriptor> {
        names
            .iter()
            .filter_map(|code| self.lookup.describe(code))
            .filter(|d| !d.is_fragment() && d.qed.is_some_and(f64::is_finite))
            .max_by(|a, b| a.qed.unwrap_or(0.0).total_cmp(&b.qed.unwrap_or(0.0)))
    }

    fn ask<'a>(&mut self, hetero: &AtomView<'a>, names: &[String]) -> Option<ResolvedLigand<'a>> {
        for _ in 0..MAX_PROMPTS {
            let answer = self.chooser.choose(names)?;
            if is_no_ligand(&answer) {
                return None;
            }
            if names.contains(&answer) {
                info!("Using {} as ligand for analysis.", answer);
                return Some(ResolvedLigand {
                    atoms: hetero.res_name(&answer),
                    code: answer,
                    descriptor: None,
                });
            }
            warn!("{} is not a valid ligand ID. Input \"None\" to proceed without a ligand.", answer);
        }
        warn!("No valid ligand chosen after {} attempts; continuing without a ligand", MAX_PROMPTS);
        None
    }
}
