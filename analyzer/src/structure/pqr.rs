use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{PocketError, PocketResult};
use crate::geometry::Point;

/// One a-sphere from the pocket finder's point-charge file.
#[derive(Debug, Clone, PartialEq)]
pub struct PqrAtom {
    pub serial: i64,
    pub name: String,
    pub res_name: String,
    pub chain: Option<String>,
    pub res_seq: i64,
    pub coords: Point,
    pub charge: f64,
    pub radius: f64,
}

fn number<T: std::str::FromStr>(token: &str, field: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("invalid {field} '{token}'"))
}

/// Whitespace-separated record: 10 fields without a chain id, 11 with one.
pub fn parse_pqr_line(line: &str) -> Result<PqrAtom, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let (chain, rest) = match tokens.len() {
        10 => (None, &tokens[4..]),
        11 => (Some(tokens[4].to_string()), &tokens[5..]),
        n => return Err(format!("expected 10 or 11 fields, found {n}")),
    };
    Ok(PqrAtom {
        serial: number(tokens[1], "serial")?,
        name: tokens[2].to_string(),
        res_name: tokens[3].to_string(),
        chain,
        res_seq: number(rest[0], "residue number")?,
        coords: [
            number(rest[1], "x coordinate")?,
            number(rest[2], "y coordinate")?,
            number(rest[3], "z coordinate")?,
        ],
        charge: number(rest[4], "charge")?,
        radius: number(rest[5], "radius")?,
    })
}

/// Atom records of a PQR text. A file without any (no pockets found) yields no spheres.
pub fn parse_pqr_str(text: &str) -> Result<Vec<PqrAtom>, String> {
    let mut atoms = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.starts_with("ATOM") || line.starts_with("HETATM") {
            let atom = parse_pqr_line(line).map_err(|e| format!("line {}: {e}", idx + 1))?;
            atoms.push(atom);
        }
    }
    Ok(atoms)
}

/// Insert a space before every '-' that is glued to the preceding field.
/// Exponent signs (`1e-5`) are left alone.
pub fn separate_negative_fields(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 20);
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if ch == '-' {
            if let Some(p) = prev {
                if !p.is_whitespace() && p != 'e' && p != 'E' {
                    out.push(' ');
                }
            }
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

/// Read a PQR file, repairing it in place once if the first parse fails.
pub fn read_pqr(path: impl AsRef<Path>) -> PocketResult<Vec<PqrAtom>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|_| {
        PocketError::missing("pqr_out", path, "Check that the pocket finder wrote its pockets.pqr output.")
    })?;

    let first_error = match parse_pqr_str(&text) {
        Ok(atoms) => return Ok(atoms),
        Err(e) => e,
    };

    warn!("Failed to parse PQR file {} ({}). Modifying PQR file and retrying...", path.display(), first_error);
    let repaired = separate_negative_fields(&text);
    fs::write(path, &repaired)?;

    match parse_pqr_str(&repaired) {
        Ok(atoms) => {
            info!("Successfully corrected PQR file {}", path.display());
            Ok(atoms)
        }
        Err(e) => Err(PocketError::malformed(path, format!("PQR file is not formatted correctly: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "\
HEADER
HEADER This is a pqr format file writen by the programm fpocket.
ATOM      1    C STP     1     -10.186  10.917 -13.402    0.00     3.53
ATOM      2    O STP     1     -11.000   9.100 -12.000    0.00     3.10
ATOM      3    C STP     2      -1.000   2.000   3.000    0.00     4.00
TER
END
";

    #[test]
    fn parses_ten_field_records() {
        let atoms = parse_pqr_str(CLEAN).unwrap();
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].coords, [-10.186, 10.917, -13.402]);
        assert_eq!(atoms[0].radius, 3.53);
        assert_eq!(atoms[2].res_seq, 2);
        assert!(atoms[0].chain.is_none());
    }

    #[test]
    fn chain_column_is_optional() {
        let atom = parse_pqr_line("ATOM      1    C STP B   1     -10.186  10.917 -13.402    0.00     3.53").unwrap();
        assert_eq!(atom.chain.as_deref(), Some("B"));
        assert_eq!(atom.res_seq, 1);
    }

    #[test]
    fn glued_negatives_are_repaired_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_pockets.pqr");
        fs::write(
            &path,
            "ATOM      1    C STP     1    -100.186-110.917-113.402    0.00     3.53\n",
        )
        .unwrap();
        let atoms = read_pqr(&path).unwrap();
        assert_eq!(atoms[0].coords, [-100.186, -110.917, -113.402]);
        // the repaired text is written back
        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("-100.186 -110.917 -113.402"));
    }

    #[test]
    fn unrepairable_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pqr");
        fs::write(&path, "ATOM 1 C STP 1 a b c 0.0 3.0\n").unwrap();
        let err = read_pqr(&path).unwrap_err();
        assert!(matches!(err, PocketError::MalformedInput { .. }));
    }

    #[test]
    fn header_only_file_has_no_spheres() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty_pockets.pqr");
        let text = "HEADER\nHEADER This is a pqr format file writen by the programm fpocket.\nTER\nEND\n";
        fs::write(&path, text).unwrap();
        assert!(read_pqr(&path).unwrap().is_empty());
        // nothing to repair, so the file is left as written
        assert_eq!(fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn exponent_signs_untouched() {
        assert_eq!(separate_negative_fields("1.0e-3 2.0-4.0"), "1.0e-3 2.0 -4.0");
    }
}
