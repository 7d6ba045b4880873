use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{Atom, DbRef, Header, PdbLine, RecordKind, Structure};
use crate::error::{PocketError, PocketResult};

/// Byte range of a fixed-column field, clamped to the line length.
pub(crate) fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

fn optional_char(line: &str, idx: usize) -> Option<char> {
    column(line, idx, idx + 1).chars().next().filter(|c| !c.is_whitespace())
}

fn parse_f64(line: &str, start: usize, end: usize, field: &str) -> Result<f64, String> {
    let raw = column(line, start, end).trim();
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {field} '{raw}' in columns {}-{}", start + 1, end))
}

/// Parse one ATOM/HETATM record.
pub fn parse_atom_line(line: &str, model: Option<u32>) -> Result<Atom, String> {
    let record = match column(line, 0, 6) {
        "ATOM  " | "ATOM" => RecordKind::Atom,
        "HETATM" => RecordKind::Hetatm,
        other => return Err(format!("not an atom record: '{other}'")),
    };
    let serial_raw = column(line, 6, 11).trim();
    let serial = serial_raw
        .parse::<i64>()
        .map_err(|_| format!("invalid serial '{serial_raw}'"))?;
    let res_seq_raw = column(line, 22, 26).trim();
    let res_seq = res_seq_raw
        .parse::<i64>()
        .map_err(|_| format!("invalid residue number '{res_seq_raw}'"))?;

    let coords = [
        parse_f64(line, 30, 38, "x coordinate")?,
        parse_f64(line, 38, 46, "y coordinate")?,
        parse_f64(line, 46, 54, "z coordinate")?,
    ];
    let occupancy = parse_f64(line, 54, 60, "occupancy").unwrap_or(1.0);
    let b_factor = parse_f64(line, 60, 66, "temperature factor").unwrap_or(0.0);

    Ok(Atom {
        record,
        serial,
        name: column(line, 12, 16).trim().to_string(),
        alt_loc: optional_char(line, 16),
        res_name: column(line, 17, 20).trim().to_string(),
        chain: column(line, 21, 22).trim().to_string(),
        res_seq,
        i_code: optional_char(line, 26),
        coords,
        occupancy,
        b_factor,
        element: column(line, 76, 78).trim().to_string(),
        model,
        raw: line.to_string(),
    })
}

fn parse_dbref(line: &str) -> Option<DbRef> {
    let chain = column(line, 12, 13).trim().to_string();
    let seq_begin = column(line, 14, 18).trim().parse().ok()?;
    let seq_end = column(line, 20, 24).trim().parse().unwrap_or(seq_begin);
    Some(DbRef { chain, seq_begin, seq_end })
}

/// Parse positional structure text. `source` is only used for diagnostics.
pub fn parse_pdb_str(text: &str, source: impl AsRef<Path>) -> PocketResult<Structure> {
    let source = source.as_ref();
    let mut header = Header::default();
    let mut lines = Vec::new();
    let mut model: Option<u32> = None;

    for (idx, line) in text.lines().enumerate() {
        let record = column(line, 0, 6);
        match record {
            "ATOM  " | "ATOM" | "HETATM" => {
                let atom = parse_atom_line(line, model)
                    .map_err(|e| PocketError::malformed(source, format!("line {}: {e}", idx + 1)))?;
                lines.push(PdbLine::Atom(atom));
                continue;
            }
            "HEADER" => {
                let code = column(line, 62, 66).trim();
                if !code.is_empty() {
                    header.id_code = Some(code.to_string());
                }
            }
            "DBREF " | "DBREF" => {
                if let Some(dbref) = parse_dbref(line) {
                    header.dbrefs.push(dbref);
                }
            }
            "NUMMDL" => header.num_models = Some(column(line, 6, line.len()).trim().to_string()),
            "MODEL " | "MODEL" => {
                header.model_records += 1;
                model = Some(
                    column(line, 10, 14)
                        .trim()
                        .parse()
                        .unwrap_or(header.model_records),
                );
            }
            "ENDMDL" => model = None,
            _ => {}
        }
        lines.push(PdbLine::Other(line.to_string()));
    }

    debug!(
        "parsed {} ({} atom records, {} MODEL records)",
        source.display(),
        lines.iter().filter(|l| matches!(l, PdbLine::Atom(_))).count(),
        header.model_records
    );
    Ok(Structure::new(source.to_path_buf(), header, lines))
}

pub fn read_pdb(path: impl AsRef<Path>, kind: &str) -> PocketResult<Structure> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|_| {
        PocketError::missing(kind, path, "Check the path and that the pocket finder ran to completion.")
    })?;
    parse_pdb_str(&text, path)
}

/// The atom's record line with the temperature-factor columns holding `value`.
pub fn with_b_factor(atom: &Atom, value: f64) -> String {
    let mut line = atom.raw.clone();
    if line.len() < 66 {
        line = format!("{line:<66}");
    }
    let field = format!("{value:6.2}");
    line.replace_range(60..66, &field[field.len().saturating_sub(6)..]);
    line
}

/// Write every line back out; atom lines are taken from their (possibly patched) raw text.
pub fn write_pdb(structure: &Structure, path: impl AsRef<Path>) -> PocketResult<()> {
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);
    for line in structure.lines() {
        match line {
            PdbLine::Atom(atom) => writeln!(out, "{}", atom.raw)?,
            PdbLine::Other(text) => writeln!(out, "{text}")?,
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
HEADER    RNA                                     01-JAN-20   1ABC
DBREF  1ABC A   15    44  PDB    1ABC     1ABC            15     44
ATOM      1  P     G A  15      -1.234  22.500 -13.001  1.00 30.00           P
ATOM      2  C1'   G A  15       0.500   1.500   2.500  1.00 30.00           C
HETATM    3    C STP C   1      10.000  11.000  12.000  0.00  0.00          Ve
END
";

    #[test]
    fn reads_fixed_columns() {
        let s = parse_pdb_str(SAMPLE, "1abc.pdb").unwrap();
        assert_eq!(s.header.id_code.as_deref(), Some("1ABC"));
        assert_eq!(s.dbref("A").map(|d| d.seq_begin), Some(15));
        let atoms: Vec<&Atom> = s.atoms().collect();
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms[0].coords, [-1.234, 22.5, -13.001]);
        assert_eq!(atoms[1].name, "C1'");
        assert_eq!(atoms[2].res_name, "STP");
        assert!(atoms[2].is_sphere());
        assert_eq!(s.spheres().len(), 1);
        assert_eq!(s.polymer().len(), 2);
    }

    #[test]
    fn malformed_coordinates_name_the_line() {
        let bad = "ATOM      1  P     G A  15      -1.2x4  22.500 -13.001  1.00 30.00           P\n";
        let err = parse_pdb_str(bad, "bad.pdb").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("bad.pdb") && text.contains("line 1"));
    }

    #[test]
    fn b_factor_patch_keeps_other_columns() {
        let s = parse_pdb_str(SAMPLE, "1abc.pdb").unwrap();
        let sphere = s.spheres().iter().next().unwrap().clone();
        let patched = with_b_factor(&sphere, 3.456);
        assert_eq!(&patched[60..66], "  3.46");
        assert_eq!(&patched[..60], &sphere.raw[..60]);
        assert_eq!(&patched[66..], &sphere.raw[66..]);
    }

    #[test]
    fn write_then_read_keeps_atoms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copy.pdb");
        let s = parse_pdb_str(SAMPLE, "1abc.pdb").unwrap();
        write_pdb(&s, &path).unwrap();
        let back = read_pdb(&path, "pdb").unwrap();
        assert_eq!(back.atom_count(), s.atom_count());
        assert_eq!(back.all().res_seqs(), s.all().res_seqs());
        assert!(read_pdb(dir.path().join("nope.pdb"), "pdb_out").is_err());
    }
}
