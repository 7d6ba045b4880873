use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::error::{PocketError, PocketResult};
use crate::structure::pdb::parse_pdb_str;
use crate::structure::Structure;

/// A `pockets/pocket<N>_atm.pdb` export: the atoms lining one pocket plus its header summary.
#[derive(Debug, Clone)]
pub struct ContactExport {
    pub path: PathBuf,
    /// Index from the `Information about the pocket N:` header line.
    pub pocket_index: Option<u32>,
    /// `N - Label : value` header lines keyed by label.
    pub properties: BTreeMap<String, f64>,
    pub structure: Structure,
}

impl ContactExport {
    /// Sorted distinct residue numbers of lining atoms in any of `chains`.
    pub fn contact_nucleotides(&self, chains: &[String]) -> Vec<i64> {
        self.structure.polymer().chains(chains).unique_res_seqs()
    }

    /// Pocket this export belongs to: the header index, else the number in `pocket<N>_atm.pdb`.
    pub fn pocket_id(&self) -> Option<u32> {
        self.pocket_index.or_else(|| pocket_number(&self.path))
    }
}

/// `N` from a `pocket<N>_atm.pdb` file name.
pub fn pocket_number(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let digits = name.strip_prefix("pocket")?.split('_').next()?;
    digits.parse().ok()
}

pub fn parse_contact_export(text: &str, path: impl AsRef<Path>) -> PocketResult<ContactExport> {
    let path = path.as_ref();
    let index_re = Regex::new(r"(?m)(\w+\s\w+\s*)(\d+):\s*$")?;
    let property_re = Regex::new(r"(?m)(\w+\s\w+\s*-\s*)(.+):\s*([\d.-]+)\s*$")?;

    let pocket_index = index_re
        .captures(text)
        .and_then(|caps| caps[2].parse::<u32>().ok());

    let mut properties = BTreeMap::new();
    for caps in property_re.captures_iter(text) {
        if let Ok(value) = caps[3].parse::<f64>() {
            properties.insert(caps[2].trim().to_string(), value);
        }
    }

    let structure = parse_pdb_str(text, path)?;
    debug!(
        "{}: pocket {:?}, {} header properties, {} lining atoms",
        path.display(),
        pocket_index,
        properties.len(),
        structure.atom_count()
    );
    Ok(ContactExport {
        path: path.to_path_buf(),
        pocket_index,
        properties,
        structure,
    })
}

pub fn read_contact_export(path: impl AsRef<Path>) -> PocketResult<ContactExport> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|_| {
        PocketError::missing("pocket_atm", path, "Each pocket needs its pockets/pocket<N>_atm.pdb export.")
    })?;
    parse_contact_export(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POCKET1: &str = "\
HEADER
HEADER This is a pdb format file writen by the programm fpocket.
HEADER It represents the atoms contacted by the voronoi vertices of the pocket.
HEADER
HEADER Information about the pocket     1:
HEADER 0  - Pocket Score                      : 0.4630
HEADER 1  - Drug Score                        : 0.0010
HEADER 2  - Number of alpha spheres           :    63
ATOM      1  P     G A  12      10.000  10.000  10.000  1.00  0.00           P
ATOM      2  C4'   G A  12      11.000  10.000  10.000  1.00  0.00           C
ATOM      3  N1    A A   5      12.000  10.000  10.000  1.00  0.00           N
ATOM      4  N3    U B  40      13.000  10.000  10.000  1.00  0.00           N
";

    #[test]
    fn header_index_and_properties() {
        let export = parse_contact_export(POCKET1, "pocket1_atm.pdb").unwrap();
        assert_eq!(export.pocket_index, Some(1));
        assert_eq!(export.properties.get("Pocket Score"), Some(&0.463));
        assert_eq!(export.properties.get("Number of alpha spheres"), Some(&63.0));
    }

    #[test]
    fn contacts_filtered_by_chain() {
        let export = parse_contact_export(POCKET1, "pocket1_atm.pdb").unwrap();
        assert_eq!(export.contact_nucleotides(&["A".to_string()]), vec![5, 12]);
        assert_eq!(
            export.contact_nucleotides(&["A".to_string(), "B".to_string()]),
            vec![5, 12, 40]
        );
        assert!(export.contact_nucleotides(&["C".to_string()]).is_empty());
    }

    #[test]
    fn pocket_number_from_file_name() {
        assert_eq!(pocket_number(Path::new("out/pockets/pocket12_atm.pdb")), Some(12));
        assert_eq!(pocket_number(Path::new("pocket_atm.pdb")), None);
        let export = parse_contact_export("ATOM      1  P     G A  12      10.000  10.000  10.000  1.00  0.00           P\n", "pockets/pocket7_atm.pdb").unwrap();
        assert_eq!(export.pocket_id(), Some(7));
    }
}
