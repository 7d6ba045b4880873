//! Radius annotation of the pocket finder's structure output and nucleotide index offsets.
//!
//! The structure output (`*_out.pdb`) knows residue identity but not sphere radii; the
//! point-charge output (`*_pockets.pqr`) knows radii. Radii are written into the
//! temperature-factor columns of the structure so one file carries both.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{PocketError, PocketResult};
use crate::geometry::Point;
use crate::structure::pdb::{column, read_pdb, with_b_factor, write_pdb};
use crate::structure::pqr::{read_pqr, PqrAtom};
use crate::structure::{AtomView, Structure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSummary {
    pub matched: usize,
    pub unmatched: usize,
}

type SphereKey = (i64, [i64; 3]);

fn sphere_key(res_seq: i64, coords: &Point) -> SphereKey {
    let milli = |v: f64| (v * 1000.0).round() as i64;
    (res_seq, [milli(coords[0]), milli(coords[1]), milli(coords[2])])
}

/// Copy each PQR radius onto the a-sphere with the same pocket number and coordinates.
pub fn merge_radii(structure: &mut Structure, spheres: &[PqrAtom]) -> MergeSummary {
    let mut radii: HashMap<SphereKey, f64> = HashMap::with_capacity(spheres.len());
    for sphere in spheres {
        radii.entry(sphere_key(sphere.res_seq, &sphere.coords)).or_insert(sphere.radius);
    }

    let mut summary = MergeSummary::default();
    for atom in structure.atoms_mut().filter(|a| a.is_sphere()) {
        match radii.get(&sphere_key(atom.res_seq, &atom.coords)) {
            Some(&radius) => {
                atom.raw = with_b_factor(atom, radius);
                atom.b_factor = radius;
                summary.matched += 1;
            }
            None => summary.unmatched += 1,
        }
    }
    summary
}

/// Build `<dest>` (the real-sphere structure) from the pocket finder's structure and PQR outputs.
pub fn write_real_sphere(pdb_out: &Path, pqr_out: &Path, dest: &Path) -> PocketResult<Structure> {
    let mut structure = read_pdb(pdb_out, "pdb_out")?;
    let spheres = read_pqr(pqr_out)?;

    let summary = merge_radii(&mut structure, &spheres);
    if summary.unmatched > 0 {
        warn!(
            "{} of {} a-spheres in {} have no matching record in {}; their radius column is unchanged",
            summary.unmatched,
            summary.matched + summary.unmatched,
            pdb_out.display(),
            pqr_out.display()
        );
    }
    write_pdb(&structure, dest)?;
    info!("Wrote radius-annotated structure {} ({} spheres)", dest.display(), summary.matched);
    Ok(structure)
}

/// Positional merge for inputs already in the same order: each apolar sphere line of the
/// structure consumes the next PQR atom record. Records of any other type are copied through.
/// Returns the number of lines written.
pub fn merge_lockstep(pdb_path: &Path, pqr_path: &Path, dest: &Path) -> PocketResult<usize> {
    let pdb_text = fs::read_to_string(pdb_path)
        .map_err(|_| PocketError::missing("pdb_out", pdb_path, "Check the pocket finder output directory."))?;
    let pqr_text = fs::read_to_string(pqr_path)
        .map_err(|_| PocketError::missing("pqr_out", pqr_path, "Check the pocket finder output directory."))?;

    let mut pqr_atoms = pqr_text
        .lines()
        .filter(|l| l.starts_with("ATOM") || l.starts_with("HETATM"));

    let mut out = BufWriter::new(File::create(dest)?);
    let mut written = 0;
    for (idx, pdb_line) in pdb_text.lines().enumerate() {
        let is_apolar_sphere = pdb_line.starts_with("HETATM") && pdb_line.contains("APOL");
        let line = if !is_apolar_sphere {
            column(pdb_line, 0, 80).to_string()
        } else {
            let pqr_line = pqr_atoms.next().unwrap_or("");
            if column(pdb_line, 24, 55) != column(pqr_line, 24, 55) {
                return Err(PocketError::malformed(
                    pdb_path,
                    format!(
                        "line {} is out of step with PQR input {} (PQR record: '{}')",
                        idx + 1,
                        pqr_path.display(),
                        pqr_line.trim_end()
                    ),
                ));
            }
            format!(
                "{}{}{}",
                column(pdb_line, 0, 60),
                column(pqr_line, 65, 71),
                column(pdb_line, 66, 80)
            )
        };
        writeln!(out, "{line}")?;
        written += 1;
    }
    out.flush()?;
    debug!("lockstep merge wrote {} lines to {}", written, dest.display());
    Ok(written)
}

/// Offset recorded by the structure's DBREF for `chain`: first reference residue minus one.
pub fn dbref_offset(structure: &Structure, chain: &str) -> Option<i64> {
    structure.dbref(chain).map(|d| d.seq_begin - 1)
}

/// Maps structure residue numbers to 0-based secondary-structure positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NucleotideIndexer {
    pub offset: i64,
    /// First residue number of the second chain and the gap offset past it.
    pub second_chain: Option<(i64, i64)>,
}

impl NucleotideIndexer {
    pub fn single(offset: i64) -> Self {
        Self { offset, second_chain: None }
    }

    /// Derive offsets for one or two chains. More than two chains cannot be indexed.
    pub fn new(polymer: &AtomView<'_>, chains: &[String], offset: i64) -> PocketResult<Self> {
        match chains {
            [_] => Ok(Self::single(offset)),
            [first, second] => {
                let last_first = polymer.chain(first).res_seqs().last().copied().ok_or_else(|| {
                    PocketError::config(
                        format!("Chain {first} has no residues to derive a nucleotide offset from"),
                        "Provide valid RNA chain ids with the chain option.",
                    )
                })?;
                let start_second = polymer.chain(second).res_seqs().first().copied().ok_or_else(|| {
                    PocketError::config(
                        format!("Chain {second} has no residues to derive a nucleotide offset from"),
                        "Provide valid RNA chain ids with the chain option.",
                    )
                })?;
                let offset2 = start_second - last_first - 1;
                debug!("two-chain offsets: offset {}, offset2 {} (chain {} starts at {})", offset, offset2, second, start_second);
                Ok(Self {
                    offset,
                    second_chain: Some((start_second, offset2)),
                })
            }
            _ => Err(PocketError::config(
                format!(
                    "2D figures can only be made from RNA structures composed of at most 2 chains (got {})",
                    chains.len()
                ),
                "Limit the chain option to one or two chain ids.",
            )),
        }
    }

    pub fn index(&self, nt: i64) -> i64 {
        match self.second_chain {
            Some((start, offset2)) if nt >= start => nt - 1 - self.offset - offset2,
            _ => nt - 1 - self.offset,
        }
    }
}
