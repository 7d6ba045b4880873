use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::ClassifierSettings;
use crate::error::{PocketError, PocketResult};
use crate::helper_functions::file_stem;
use crate::ligand::LigandRequest;
use crate::models::DetectionParameters;
use crate::structure::Structure;

/// Run configuration, read from a JSON file. Every field but `pdb` has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Input RNA (or RNA-ligand complex) structure.
    pub pdb: PathBuf,
    /// Pocket finder thresholds (`-m -M -i -D -A -p`).
    pub detection: DetectionParameters,
    pub quality_filter: f64,
    /// RNA chain id(s), comma separated.
    pub chain: String,
    /// Ligand residue code, or `none` to skip ligand typing.
    pub ligand: Option<String>,
    pub ligand_chain: Option<String>,
    /// Nucleotides of a known binding site; mutually exclusive with `ligand`.
    pub known_nt: Option<Vec<i64>>,
    /// Structure numbering minus secondary-structure numbering. Read from DBREF when unset.
    pub offset: Option<i64>,
    /// Model to analyze; `0` analyzes every model.
    pub state: Option<u32>,
    pub contact_distance: f64,
    pub output_dir: Option<PathBuf>,
    /// Output file prefix; defaults to the structure's file stem.
    pub name: Option<String>,
    /// Sequence length of the secondary structure drawing, when one exists.
    pub nsd_length: Option<usize>,
    /// An existing `<name>_out` directory to analyze directly.
    pub analysis_dir: Option<PathBuf>,
    /// Merge radii positionally instead of by sphere identity; inputs must be line-aligned.
    pub lockstep_merge: bool,
    pub run_pocket_finder: bool,
    pub fpocket_path: Option<PathBuf>,
    pub overwrite: bool,
    pub fetch_ligand_reference: bool,
    /// Ask on the terminal when several ligands are plausible.
    pub interactive: bool,
    /// Pre-supplied answers used instead of the terminal prompt.
    pub ligand_choices: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pdb: PathBuf::new(),
            detection: DetectionParameters::default(),
            quality_filter: 0.0,
            chain: "A".to_string(),
            ligand: None,
            ligand_chain: None,
            known_nt: None,
            offset: None,
            state: None,
            contact_distance: 3.0,
            output_dir: None,
            name: None,
            nsd_length: None,
            analysis_dir: None,
            lockstep_merge: false,
            run_pocket_finder: true,
            fpocket_path: None,
            overwrite: false,
            fetch_ligand_reference: true,
            interactive: true,
            ligand_choices: Vec::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn load(path: impl AsRef<Path>) -> PocketResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|_| {
            PocketError::missing("configuration", path, "Pass the path to a JSON run configuration as the first argument.")
        })?;
        let config: AnalysisConfig = serde_json::from_reader(file)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> PocketResult<()> {
        if self.pdb.as_os_str().is_empty() {
            return Err(PocketError::config("No input structure given", "Set pdb to the path of a .pdb file."));
        }
        if self.ligand.is_some() && self.known_nt.is_some() {
            return Err(PocketError::config(
                "ligand and known_nt are mutually exclusive",
                "Type pockets either by a ligand (ligand) or by known binding-site nucleotides (known_nt), not both.",
            ));
        }
        if self.chains().is_empty() {
            return Err(PocketError::config(
                format!("No chain id in '{}'", self.chain),
                "Set chain to one or two comma-separated RNA chain ids, e.g. \"A\" or \"A,B\".",
            ));
        }
        if !self.quality_filter.is_finite() {
            return Err(PocketError::config(
                format!("quality_filter must be a finite number (got {})", self.quality_filter),
                "Set quality_filter to the minimum pocket score, e.g. 0.0.",
            ));
        }
        if !(self.contact_distance.is_finite() && self.contact_distance > 0.0) {
            return Err(PocketError::config(
                format!("contact_distance must be positive (got {})", self.contact_distance),
                "Set contact_distance in Å, e.g. 3.0.",
            ));
        }
        if self.analysis_dir.is_some() && self.state == Some(0) {
            return Err(PocketError::config(
                "analysis_dir names a single output directory but state 0 asks for every model",
                "Drop analysis_dir, or pick one model with state.",
            ));
        }
        Ok(())
    }

    /// Configured chain ids in order.
    pub fn chains(&self) -> Vec<String> {
        self.chain
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Configured chains present in `structure`; otherwise its first RNA chain.
    pub fn resolve_chains(&self, structure: &Structure) -> PocketResult<Vec<String>> {
        let present = structure.chains();
        let wanted = self.chains();
        let missing: Vec<&String> = wanted.iter().filter(|c| !present.contains(c)).collect();
        if missing.is_empty() {
            return Ok(wanted);
        }
        match structure.first_rna_chain() {
            Some(chain) => {
                warn!(
                    "Chain(s) {:?} not found in {}; using RNA chain {} instead (set with chain)",
                    missing,
                    structure.source.display(),
                    chain
                );
                Ok(vec![chain])
            }
            None => Err(PocketError::config(
                format!("{} has no chain {:?} and no RNA chain", structure.source.display(), missing),
                "Provide a valid RNA chain id with the chain option.",
            )),
        }
    }

    pub fn ligand_request(&self) -> LigandRequest {
        LigandRequest::parse(self.ligand.as_deref())
    }

    pub fn known_nucleotides(&self) -> Option<BTreeSet<i64>> {
        self.known_nt.as_ref().map(|nts| nts.iter().copied().collect())
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            quality_filter: self.quality_filter,
            contact_distance: self.contact_distance,
            ..ClassifierSettings::default()
        }
    }

    /// Parent directory for pocket finder outputs.
    pub fn output_root(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => {
                let parent = self.pdb.parent().unwrap_or_else(|| Path::new(""));
                parent.join(self.detection.default_output_dir())
            }
        }
    }

    /// Output file prefix for one state: `<name>` or `<name>_state<N>`.
    pub fn run_name(&self, state: Option<u32>) -> String {
        let base = self.name.clone().unwrap_or_else(|| file_stem(&self.pdb));
        match state {
            Some(s) => format!("{base}_state{s}"),
            None => base,
        }
    }

    /// First four characters of the structure's file name.
    pub fn pdb_code(&self) -> String {
        let name = self
            .pdb
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.chars().take(4).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::pdb::parse_pdb_str;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"pdb": "data/1abc.pdb", "chain": "A, B", "detection": {"min_spheres": 35}}"#).unwrap();
        assert_eq!(config.chains(), vec!["A", "B"]);
        assert_eq!(config.detection.min_spheres, 35);
        assert_eq!(config.detection.max_radius, 5.7);
        assert_eq!(config.contact_distance, 3.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.pdb_code(), "1abc");
        assert_eq!(config.run_name(Some(2)), "1abc_state2");
        assert_eq!(
            config.output_root(),
            PathBuf::from("data/rna_pockets_out-m_3.0-M_5.7-i_35-D_1.65-A_3-p_0.0")
        );
    }

    #[test]
    fn ligand_and_known_nt_are_exclusive() {
        let config = AnalysisConfig {
            pdb: "1abc.pdb".into(),
            ligand: Some("RBF".into()),
            known_nt: Some(vec![1, 2, 3]),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("known_nt"));
    }

    #[test]
    fn empty_chain_and_bad_filter_rejected() {
        let base = AnalysisConfig {
            pdb: "1abc.pdb".into(),
            ..Default::default()
        };
        let no_chain = AnalysisConfig { chain: " , ".into(), ..base.clone() };
        assert!(no_chain.validate().is_err());
        let nan = AnalysisConfig { quality_filter: f64::NAN, ..base.clone() };
        assert!(nan.validate().is_err());
        assert!(AnalysisConfig::default().validate().is_err());
    }

    #[test]
    fn absent_chain_falls_back_to_rna_chain() {
        let text = "\
ATOM      1  P     G B   1      10.000  10.000  10.000  1.00  0.00           P
";
        let structure = parse_pdb_str(text, "1abc.pdb").unwrap();
        let config = AnalysisConfig {
            pdb: "1abc.pdb".into(),
            ..Default::default()
        };
        assert_eq!(config.resolve_chains(&structure).unwrap(), vec!["B"]);
    }

    #[test]
    fn load_reads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pocket_config.json");
        std::fs::write(&path, r#"{"pdb": "2xyz.pdb", "ligand": "none", "state": 0}"#).unwrap();
        let config = AnalysisConfig::load(&path).unwrap();
        assert_eq!(config.ligand_request(), LigandRequest::None);
        assert_eq!(config.state, Some(0));
        assert!(AnalysisConfig::load(dir.path().join("absent.json")).is_err());
    }
}
