//! Atom sets read from positional molecular-structure files.
//!
//! A [`Structure`] owns every line of the file it was read from; the polymer and
//! a-sphere views borrow from it and cannot outlive it.

pub mod pdb;
pub mod pqr;

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::geometry::Point;

/// Residue name fpocket gives to a-sphere marker atoms.
pub const SPHERE_RESNAME: &str = "STP";

const WATER: &[&str] = &["HOH", "WAT", "H2O", "DOD", "D2O", "TIP", "TIP3", "SOL"];

const IONS: &[&str] = &[
    "AL", "BA", "CA", "CD", "CL", "CO", "CS", "CU", "CU1", "CUA", "HG", "IN", "IOD", "K", "MG",
    "MN", "MN3", "NA", "PB", "PT", "RB", "TB", "TL", "WO4", "YB", "ZN", "FE", "FE2", "NI", "SR",
    "BR", "F", "LI", "AG", "AU", "NH4", "SO4", "PO4",
];

const NUCLEOTIDES: &[&str] = &[
    "A", "C", "G", "U", "T", "DA", "DC", "DG", "DT", "DU", "ADE", "CYT", "GUA", "URA", "RA", "RC",
    "RG", "RU", "PSU", "5MC", "1MA", "2MG", "M2G", "OMC", "OMG", "H2U", "7MG", "GTP", "5BU",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Atom,
    Hetatm,
}

/// One ATOM/HETATM record. `raw` keeps the source line so rewrites only touch changed columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub record: RecordKind,
    pub serial: i64,
    pub name: String,
    pub alt_loc: Option<char>,
    pub res_name: String,
    pub chain: String,
    pub res_seq: i64,
    pub i_code: Option<char>,
    pub coords: Point,
    pub occupancy: f64,
    pub b_factor: f64,
    pub element: String,
    /// MODEL index the record appeared under, if the file is multi-model.
    pub model: Option<u32>,
    pub raw: String,
}

impl Atom {
    pub fn is_sphere(&self) -> bool {
        self.res_name == SPHERE_RESNAME
    }

    pub fn is_hetero(&self) -> bool {
        self.record == RecordKind::Hetatm
    }

    pub fn is_water(&self) -> bool {
        WATER.contains(&self.res_name.as_str())
    }

    pub fn is_ion(&self) -> bool {
        IONS.contains(&self.res_name.as_str())
    }

    pub fn is_nucleotide(&self) -> bool {
        NUCLEOTIDES.contains(&self.res_name.as_str())
    }

    /// Element symbol from columns 77-78, else from the leading letters of the atom name.
    pub fn element_symbol(&self) -> String {
        if !self.element.is_empty() {
            return self.element.clone();
        }
        let letters: String = self
            .name
            .trim()
            .chars()
            .skip_while(|c| c.is_ascii_digit())
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match letters.len() {
            0 => String::new(),
            1 => letters,
            _ => {
                let two = letters[..2].to_ascii_uppercase();
                if atomic_mass(&two).is_some() && !matches!(two.as_str(), "CA" | "CB" | "CG" | "CD" | "NE" | "OG") {
                    two
                } else {
                    letters[..1].to_ascii_uppercase()
                }
            }
        }
    }

    /// Weight used in inertia tensors: 1 for a-spheres, atomic mass otherwise.
    pub fn inertia_mass(&self) -> f64 {
        if self.is_sphere() {
            return 1.0;
        }
        let symbol = self.element_symbol();
        atomic_mass(&symbol).unwrap_or_else(|| {
            log::debug!("unknown element '{}' for atom {}; weighting as carbon", symbol, self.serial);
            12.011
        })
    }
}

/// Standard atomic weights for elements found in nucleic-acid complexes.
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    let mass = match symbol.to_ascii_uppercase().as_str() {
        "H" => 1.008,
        "D" => 2.014,
        "B" => 10.81,
        "C" => 12.011,
        "N" => 14.007,
        "O" => 15.999,
        "F" => 18.998,
        "NA" => 22.990,
        "MG" => 24.305,
        "AL" => 26.982,
        "SI" => 28.085,
        "P" => 30.974,
        "S" => 32.06,
        "CL" => 35.45,
        "K" => 39.098,
        "CA" => 40.078,
        "MN" => 54.938,
        "FE" => 55.845,
        "CO" => 58.933,
        "NI" => 58.693,
        "CU" => 63.546,
        "ZN" => 65.38,
        "SE" => 78.971,
        "BR" => 79.904,
        "SR" => 87.62,
        "CD" => 112.41,
        "I" => 126.904,
        "CS" => 132.905,
        "BA" => 137.327,
        "PT" => 195.084,
        "HG" => 200.592,
        "PB" => 207.2,
        _ => return None,
    };
    Some(mass)
}

/// A DBREF cross-reference: the structure's numbering of the reference sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbRef {
    pub chain: String,
    pub seq_begin: i64,
    pub seq_end: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub id_code: Option<String>,
    pub dbrefs: Vec<DbRef>,
    /// Raw NUMMDL value; unparsable values are kept so callers can report them.
    pub num_models: Option<String>,
    /// Count of MODEL records.
    pub model_records: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PdbLine {
    Atom(Atom),
    Other(String),
}

#[derive(Debug, Clone)]
pub struct Structure {
    pub source: PathBuf,
    pub header: Header,
    lines: Vec<PdbLine>,
}

impl Structure {
    pub fn new(source: PathBuf, header: Header, lines: Vec<PdbLine>) -> Self {
        Self { source, header, lines }
    }

    pub fn lines(&self) -> &[PdbLine] {
        &self.lines
    }

    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.lines.iter().filter_map(|l| match l {
            PdbLine::Atom(a) => Some(a),
            PdbLine::Other(_) => None,
        })
    }

    pub fn atoms_mut(&mut self) -> impl Iterator<Item = &mut Atom> {
        self.lines.iter_mut().filter_map(|l| match l {
            PdbLine::Atom(a) => Some(a),
            PdbLine::Other(_) => None,
        })
    }

    pub fn atom_count(&self) -> usize {
        self.atoms().count()
    }

    pub fn all(&self) -> AtomView<'_> {
        AtomView::new(self.atoms().collect())
    }

    /// a-sphere (pocket marker) atoms.
    pub fn spheres(&self) -> AtomView<'_> {
        AtomView::new(self.atoms().filter(|a| a.is_sphere()).collect())
    }

    /// Everything except a-spheres.
    pub fn polymer(&self) -> AtomView<'_> {
        AtomView::new(self.atoms().filter(|a| !a.is_sphere()).collect())
    }

    /// Atoms of one model; single-model files return every atom for state 1 or `None`.
    pub fn model(&self, state: Option<u32>) -> AtomView<'_> {
        match state {
            Some(s) if self.atoms().any(|a| a.model.is_some()) => {
                AtomView::new(self.atoms().filter(|a| a.model == Some(s)).collect())
            }
            _ => {
                let first = self.atoms().find_map(|a| a.model);
                AtomView::new(self.atoms().filter(|a| a.model == first).collect())
            }
        }
    }

    /// Model count from NUMMDL, else from MODEL records. `Err` carries the reason.
    pub fn model_count(&self) -> Result<u32, String> {
        if let Some(raw) = &self.header.num_models {
            return match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(format!("NUMMDL record '{}' is not a positive model count", raw.trim())),
            };
        }
        if self.header.model_records > 0 {
            return Ok(self.header.model_records);
        }
        Err("the header does not contain state information (no NUMMDL or MODEL records)".to_string())
    }

    pub fn chains(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for atom in self.atoms() {
            if !seen.contains(&atom.chain) {
                seen.push(atom.chain.clone());
            }
        }
        seen
    }

    /// First chain holding nucleotide residues.
    pub fn first_rna_chain(&self) -> Option<String> {
        self.atoms()
            .find(|a| a.is_nucleotide() && !a.is_sphere())
            .map(|a| a.chain.clone())
    }

    pub fn dbref(&self, chain: &str) -> Option<&DbRef> {
        self.header.dbrefs.iter().find(|d| d.chain == chain)
    }
}

/// A borrowed selection of atoms from one [`Structure`].
#[derive(Debug, Clone)]
pub struct AtomView<'a> {
    atoms: Vec<&'a Atom>,
}

impl<'a> AtomView<'a> {
    pub fn new(atoms: Vec<&'a Atom>) -> Self {
        Self { atoms }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Atom> + '_ {
        self.atoms.iter().copied()
    }

    pub fn select(&self, pred: impl Fn(&Atom) -> bool) -> AtomView<'a> {
        AtomView::new(self.atoms.iter().copied().filter(|a| pred(a)).collect())
    }

    pub fn chain(&self, chain: &str) -> AtomView<'a> {
        self.select(|a| a.chain == chain)
    }

    pub fn chains(&self, chains: &[String]) -> AtomView<'a> {
        self.select(|a| chains.iter().any(|c| *c == a.chain))
    }

    pub fn res_name(&self, name: &str) -> AtomView<'a> {
        self.select(|a| a.res_name == name)
    }

    pub fn coords(&self) -> Vec<Point> {
        self.atoms.iter().map(|a| a.coords).collect()
    }

    /// (position, inertia weight) pairs for the geometry kernel.
    pub fn weighted(&self) -> Vec<(Point, f64)> {
        self.atoms.iter().map(|a| (a.coords, a.inertia_mass())).collect()
    }

    /// Residue numbers in file order (duplicates kept).
    pub fn res_seqs(&self) -> Vec<i64> {
        self.atoms.iter().map(|a| a.res_seq).collect()
    }

    /// Sorted distinct residue numbers.
    pub fn unique_res_seqs(&self) -> Vec<i64> {
        self.atoms.iter().map(|a| a.res_seq).collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// Sorted distinct residue names.
    pub fn unique_res_names(&self) -> Vec<String> {
        self.atoms
            .iter()
            .map(|a| a.res_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of residues, counting each (chain, number, insertion) once.
    pub fn residue_count(&self) -> usize {
        self.atoms
            .iter()
            .map(|a| (a.chain.clone(), a.res_seq, a.i_code))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Views grouped by residue number, ascending.
    pub fn by_residue(&self) -> Vec<(i64, AtomView<'a>)> {
        let mut groups: Vec<(i64, AtomView<'a>)> = Vec::new();
        for num in self.unique_res_seqs() {
            groups.push((num, self.select(|a| a.res_seq == num)));
        }
        groups
    }
}
