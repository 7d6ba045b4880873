//! Locating (and optionally producing) the pocket finder's output directory.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info};

use crate::error::{PocketError, PocketResult};
use crate::helper_functions::{file_stem, natural_key, python_float};
use crate::models::DetectionParameters;
use crate::structure::pdb::{read_pdb, write_pdb};
use crate::structure::{PdbLine, RecordKind, Structure};

const FPOCKET: &str = "fpocket";

/// The files of one `<prefix>_out/` directory.
#[derive(Debug, Clone, PartialEq)]
pub struct FpocketOutputs {
    pub dir: PathBuf,
    pub prefix: String,
    pub pdb_out: PathBuf,
    pub pqr_out: PathBuf,
    pub info_txt: PathBuf,
    /// `pockets/pocket<N>_atm.pdb`, in pocket order.
    pub pocket_exports: Vec<PathBuf>,
}

/// `<prefix>_out`, or `<prefix>_state<N>_out` for one state of a multi-model input.
pub fn output_dir_name(prefix: &str, state: Option<u32>) -> String {
    match state {
        Some(s) => format!("{prefix}_state{s}_out"),
        None => format!("{prefix}_out"),
    }
}

fn find_by_suffix(dir: &Path, preferred: &Path, suffix: &str) -> Option<PathBuf> {
    if preferred.is_file() {
        return Some(preferred.to_path_buf());
    }
    let mut hits: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.to_string_lossy().ends_with(suffix))
        .collect();
    if hits.len() == 1 {
        hits.pop()
    } else {
        None
    }
}

impl FpocketOutputs {
    pub fn locate(dir: impl AsRef<Path>) -> PocketResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PocketError::missing(
                "pocket finder output directory",
                dir,
                "Run the pocket finder first (run_pocket_finder) or point analysis_dir at an existing <name>_out directory.",
            ));
        }
        let dir_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = dir_name.strip_suffix("_out").unwrap_or(&dir_name).to_string();

        let required = |suffix: &str, kind: &str| {
            find_by_suffix(dir, &dir.join(format!("{prefix}{suffix}")), suffix).ok_or_else(|| {
                PocketError::missing(
                    kind,
                    dir.join(format!("{prefix}{suffix}")),
                    "The pocket finder output directory is incomplete; re-run the pocket finder.",
                )
            })
        };
        let pdb_out = required("_out.pdb", "pdb_out")?;
        let pqr_out = required("_pockets.pqr", "pqr_out")?;
        let info_txt = required("_info.txt", "info_txt")?;

        let pockets_dir = dir.join("pockets");
        let mut pocket_exports: Vec<PathBuf> = match fs::read_dir(&pockets_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("pocket") && n.ends_with("_atm.pdb"))
                })
                .collect(),
            Err(_) => {
                debug!("{} has no pockets/ directory", dir.display());
                Vec::new()
            }
        };
        pocket_exports.sort_by_key(|p| natural_key(&p.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()));

        debug!(
            "located pocket finder outputs in {} ({} pocket exports)",
            dir.display(),
            pocket_exports.len()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix,
            pdb_out,
            pqr_out,
            info_txt,
            pocket_exports,
        })
    }
}

/// Source of pocket finder outputs for one structure and state.
pub trait PocketFinder {
    fn find(
        &self,
        pdb: &Path,
        chains: &[String],
        state: Option<u32>,
        params: &DetectionParameters,
        dest: &Path,
    ) -> PocketResult<FpocketOutputs>;
}

/// Outputs from an earlier run, under `dest`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExistingOutputs;

impl PocketFinder for ExistingOutputs {
    fn find(
        &self,
        pdb: &Path,
        _chains: &[String],
        state: Option<u32>,
        _params: &DetectionParameters,
        dest: &Path,
    ) -> PocketResult<FpocketOutputs> {
        let stem = file_stem(pdb);
        let candidates = [
            dest.join(output_dir_name(&format!("{stem}_clean"), state)),
            dest.join(output_dir_name(&stem, state)),
        ];
        match candidates.iter().find(|c| c.is_dir()) {
            Some(dir) => FpocketOutputs::locate(dir),
            None => Err(PocketError::missing(
                "pocket finder output directory",
                &candidates[1],
                "Enable run_pocket_finder or set output_dir to the directory holding earlier results.",
            )),
        }
    }
}

/// Runs the external `fpocket` binary on a cleaned copy of the structure.
#[derive(Debug, Clone)]
pub struct FpocketRunner {
    pub binary: PathBuf,
    pub overwrite: bool,
}

impl FpocketRunner {
    pub fn new(binary: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            binary: binary.into(),
            overwrite,
        }
    }

    /// Find `fpocket` on `PATH`.
    pub fn discover(overwrite: bool) -> PocketResult<Self> {
        let binary = which::which(FPOCKET).map_err(|e| {
            PocketError::tool(FPOCKET, format!("not found on PATH ({e}); set fpocket_path"))
        })?;
        debug!("using {}", binary.display());
        Ok(Self::new(binary, overwrite))
    }

    fn command(&self, pdb_name: &str, chains: &[String], state: Option<u32>, params: &DetectionParameters) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-f").arg(pdb_name).arg("-k").arg(chains.join(","));
        if let Some(s) = state {
            cmd.arg("-l").arg(s.to_string());
        }
        cmd.arg("-m")
            .arg(python_float(params.min_radius))
            .arg("-M")
            .arg(python_float(params.max_radius))
            .arg("-i")
            .arg(params.min_spheres.to_string())
            .arg("-D")
            .arg(python_float(params.clustering_distance))
            .arg("-A")
            .arg(params.polar_atoms.to_string())
            .arg("-p")
            .arg(python_float(params.apolar_ratio));
        cmd
    }

    fn clear_destination(&self, target: &Path) -> PocketResult<()> {
        if !target.exists() {
            return Ok(());
        }
        if !self.overwrite {
            return Err(PocketError::config(
                format!("A directory already exists with this name: {}", target.display()),
                "Enable overwrite, or change the output directory name with the name option.",
            ));
        }
        info!("Overwriting {}", target.display());
        fs::remove_dir_all(target)?;
        Ok(())
    }
}

impl PocketFinder for FpocketRunner {
    fn find(
        &self,
        pdb: &Path,
        chains: &[String],
        state: Option<u32>,
        params: &DetectionParameters,
        dest: &Path,
    ) -> PocketResult<FpocketOutputs> {
        let clean_prefix = format!("{}_clean", file_stem(pdb));
        let target = dest.join(output_dir_name(&clean_prefix, state));
        self.clear_destination(&target)?;
        fs::create_dir_all(dest)?;

        let clean_name = format!("{clean_prefix}.pdb");
        let clean_path = dest.join(&clean_name);
        if !clean_path.is_file() {
            let structure = read_pdb(pdb, "pdb")?;
            write_pdb(&clean_structure(&structure), &clean_path)?;
            debug!("wrote {}", clean_path.display());
        }

        info!("***** POCKET HUNTING {} *****", &clean_prefix[..clean_prefix.len().min(4)]);
        let mut cmd = self.command(&clean_name, chains, state, params);
        cmd.current_dir(dest);
        debug!("About to spawn: {:?}", cmd);
        let output = cmd
            .output()
            .map_err(|e| PocketError::tool(FPOCKET, format!("could not start {}: {e}", self.binary.display())))?;
        if !output.status.success() {
            error!("fpocket failed. Stderr:\n{}", String::from_utf8_lossy(&output.stderr));
            return Err(PocketError::tool(FPOCKET, format!("exited with status {:?}", output.status)));
        }
        debug!("fpocket stdout:\n{}", String::from_utf8_lossy(&output.stdout));

        let produced = dest.join(output_dir_name(&clean_prefix, None));
        if produced != target {
            fs::rename(&produced, &target)?;
            if let Some(s) = state {
                tag_state(&target, &clean_prefix, s)?;
            }
        }
        FpocketOutputs::locate(&target)
    }
}

/// Rename `<prefix><rest>` files in `dir` to `<prefix>_state<N><rest>`.
fn tag_state(dir: &Path, prefix: &str, state: u32) -> PocketResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let renamed = dir.join(format!("{prefix}_state{state}{rest}"));
        if !renamed.exists() {
            fs::rename(&path, &renamed)?;
        }
    }
    Ok(())
}

/// RNA-only copy of a structure: ligands, water, ions and protein residues removed, every
/// remaining record written as ATOM.
pub fn clean_structure(structure: &Structure) -> Structure {
    let residue = |a: &crate::structure::Atom| (a.model, a.chain.clone(), a.res_seq, a.i_code, a.res_name.clone());

    let mut protein = HashSet::new();
    let mut nucleic = HashSet::new();
    for atom in structure.atoms() {
        if atom.name == "CA" && atom.record == RecordKind::Atom {
            protein.insert(residue(atom));
        }
        if atom.name == "C4'" || atom.name == "C4*" {
            nucleic.insert(residue(atom));
        }
    }

    let mut removed = 0usize;
    let mut lines = Vec::with_capacity(structure.lines().len());
    for line in structure.lines() {
        match line {
            PdbLine::Atom(atom) => {
                let key = residue(atom);
                let polymer = !atom.is_hetero() || atom.is_nucleotide() || nucleic.contains(&key);
                if !polymer || protein.contains(&key) {
                    removed += 1;
                    continue;
                }
                let mut atom = atom.clone();
                if atom.record == RecordKind::Hetatm {
                    atom.record = RecordKind::Atom;
                    atom.raw.replace_range(0..6.min(atom.raw.len()), "ATOM  ");
                }
                lines.push(PdbLine::Atom(atom));
            }
            PdbLine::Other(text) if text.starts_with("CONECT") => {}
            PdbLine::Other(text) => lines.push(PdbLine::Other(text.clone())),
        }
    }
    debug!("cleaning {} removed {} atoms", structure.source.display(), removed);
    Structure::new(structure.source.clone(), structure.header.clone(), lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::pdb::parse_pdb_str;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    fn fake_output(root: &Path, name: &str, pockets: &[u32]) -> PathBuf {
        let dir = root.join(format!("{name}_out"));
        fs::create_dir_all(dir.join("pockets")).unwrap();
        touch(&dir.join(format!("{name}_out.pdb")));
        touch(&dir.join(format!("{name}_pockets.pqr")));
        touch(&dir.join(format!("{name}_info.txt")));
        for n in pockets {
            touch(&dir.join("pockets").join(format!("pocket{n}_atm.pdb")));
            touch(&dir.join("pockets").join(format!("pocket{n}_vert.pqr")));
        }
        dir
    }

    #[test]
    fn locate_orders_pocket_exports_numerically() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = fake_output(tmp.path(), "1abc_clean", &[10, 2, 1]);
        let out = FpocketOutputs::locate(&dir).unwrap();
        assert_eq!(out.prefix, "1abc_clean");
        assert!(out.info_txt.ends_with("1abc_clean_info.txt"));
        let names: Vec<String> = out
            .pocket_exports
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["pocket1_atm.pdb", "pocket2_atm.pdb", "pocket10_atm.pdb"]);
    }

    #[test]
    fn missing_report_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = fake_output(tmp.path(), "1abc", &[1]);
        fs::remove_file(dir.join("1abc_info.txt")).unwrap();
        let err = FpocketOutputs::locate(&dir).unwrap_err();
        assert!(matches!(err, PocketError::MissingFile { .. }));
        assert!(err.to_string().contains("1abc_info.txt"));
    }

    #[test]
    fn existing_outputs_per_state() {
        let tmp = tempfile::tempdir().unwrap();
        fake_output(tmp.path(), "2xyz_clean_state2", &[1]);
        let found = ExistingOutputs
            .find(
                Path::new("structures/2xyz.pdb"),
                &["A".to_string()],
                Some(2),
                &DetectionParameters::default(),
                tmp.path(),
            )
            .unwrap();
        assert_eq!(found.prefix, "2xyz_clean_state2");
        assert!(ExistingOutputs
            .find(Path::new("2xyz.pdb"), &[], Some(3), &DetectionParameters::default(), tmp.path())
            .is_err());
    }

    #[test]
    fn runner_refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        fake_output(tmp.path(), "1abc_clean", &[]);
        let runner = FpocketRunner::new("/nonexistent/fpocket", false);
        let err = runner
            .find(Path::new("1abc.pdb"), &["A".to_string()], None, &DetectionParameters::default(), tmp.path())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn command_carries_thresholds() {
        let runner = FpocketRunner::new("fpocket", true);
        let cmd = runner.command("1abc_clean.pdb", &["A".to_string(), "B".to_string()], Some(3), &DetectionParameters::default());
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec!["-f", "1abc_clean.pdb", "-k", "A,B", "-l", "3", "-m", "3.0", "-M", "5.7", "-i", "42", "-D", "1.65", "-A", "3", "-p", "0.0"]
        );
    }

    #[test]
    fn cleaning_keeps_rna_only() {
        let text = "\
ATOM      1  P     G A   1      10.000  10.000  10.000  1.00  0.00           P
ATOM      2  C4'   G A   1      11.000  10.000  10.000  1.00  0.00           C
HETATM    3  P   PSU A   2      12.000  10.000  10.000  1.00  0.00           P
HETATM    4  C4' PSU A   2      13.000  10.000  10.000  1.00  0.00           C
ATOM      5  CA  ALA B   1      14.000  10.000  10.000  1.00  0.00           C
ATOM      6  N   ALA B   1      15.000  10.000  10.000  1.00  0.00           N
HETATM    7  C1  RBF A 101      16.000  10.000  10.000  1.00  0.00           C
HETATM    8 MG    MG A 102      17.000  10.000  10.000  1.00  0.00          MG
HETATM    9  O   HOH A 201      18.000  10.000  10.000  1.00  0.00           O
CONECT    7    8
END
";
        let structure = parse_pdb_str(text, "1abc.pdb").unwrap();
        let clean = clean_structure(&structure);
        let serials: Vec<i64> = clean.atoms().map(|a| a.serial).collect();
        assert_eq!(serials, vec![1, 2, 3, 4]);
        assert!(clean.atoms().all(|a| a.record == RecordKind::Atom && a.raw.starts_with("ATOM  ")));
        assert!(!clean.lines().iter().any(|l| matches!(l, PdbLine::Other(t) if t.starts_with("CONECT"))));
    }
}
