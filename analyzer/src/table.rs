use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::PocketResult;
use crate::helper_functions::round_significant;
use crate::models::PocketRecord;

const SIG_FIGS: i32 = 2;

/// Pocket characteristics for one or more (structure, state) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PocketTable {
    pub records: Vec<PocketRecord>,
    /// a-spheres were present, so contact and shape columns exist.
    pub has_geometry: bool,
    /// Ligand typing ran, so overlap and ligand columns exist.
    pub has_ligand: bool,
}

fn rounded(values: impl Iterator<Item = Option<f64>>) -> Vec<Option<f64>> {
    values.map(|v| v.map(|x| round_significant(x, SIG_FIGS))).collect()
}

/// `[1, 2, 3]`
fn format_nucleotides(nts: &[i64]) -> String {
    let inner: Vec<String> = nts.iter().map(|n| n.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

impl PocketTable {
    /// Row-wise concatenation; columns are the union of the inputs' columns.
    pub fn concat(tables: Vec<PocketTable>) -> PocketTable {
        let mut out = PocketTable::default();
        for table in tables {
            out.has_geometry |= table.has_geometry;
            out.has_ligand |= table.has_ligand;
            out.records.extend(table.records);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn known_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_known()).count()
    }

    /// Distinct state tags in row order.
    pub fn states(&self) -> Vec<Option<u32>> {
        let mut seen = Vec::new();
        for rec in &self.records {
            if !seen.contains(&rec.state) {
                seen.push(rec.state);
            }
        }
        seen
    }

    fn f64_column(&self, df: &mut DataFrame, name: &str, get: impl Fn(&PocketRecord) -> Option<f64>) -> PolarsResult<()> {
        let values = rounded(self.records.iter().map(get));
        df.with_column(Series::new(PlSmallStr::from(name), values))?;
        Ok(())
    }

    fn str_column(&self, df: &mut DataFrame, name: &str, get: impl Fn(&PocketRecord) -> Option<String>) -> PolarsResult<()> {
        let values: Vec<Option<String>> = self.records.iter().map(get).collect();
        df.with_column(Series::new(PlSmallStr::from(name), values))?;
        Ok(())
    }

    /// Export form: leading row index, floats at two significant figures.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let recs = &self.records;
        let mut df = DataFrame::default();

        let index: Vec<u32> = (0..recs.len() as u32).collect();
        df.with_column(Series::new(PlSmallStr::from("index"), index))?;
        self.str_column(&mut df, "Parameters", |r| Some(r.parameters.clone()))?;
        self.str_column(&mut df, "PDB", |r| Some(r.pdb.clone()))?;
        let states: Vec<Option<u32>> = recs.iter().map(|r| r.state).collect();
        df.with_column(Series::new(PlSmallStr::from("State"), states))?;
        let pockets: Vec<u32> = recs.iter().map(|r| r.pocket_id).collect();
        df.with_column(Series::new(PlSmallStr::from("Pocket"), pockets))?;
        self.str_column(&mut df, "Type", |r| Some(r.pocket_type.to_string()))?;
        self.str_column(&mut df, "Filter", |r| Some(r.filter_status.to_string()))?;
        self.f64_column(&mut df, "Score", |r| r.score)?;
        self.f64_column(&mut df, "Drug score", |r| r.druggability_score)?;
        let spheres: Vec<Option<u32>> = recs.iter().map(|r| r.alpha_sphere_count).collect();
        df.with_column(Series::new(PlSmallStr::from("a-sphere"), spheres))?;
        self.f64_column(&mut df, "SASA", |r| r.total_sasa)?;
        self.f64_column(&mut df, "Volume", |r| r.volume)?;
        self.f64_column(&mut df, "Hydrophobic density", |r| r.hydrophobic_density)?;
        self.f64_column(&mut df, "Apolar a-sphere proportion", |r| r.apolar_sphere_proportion)?;
        self.f64_column(&mut df, "Hydrophobicity score", |r| r.hydrophobicity_score)?;
        self.f64_column(&mut df, "Polarity score", |r| r.polarity_score)?;

        if self.has_geometry {
            self.str_column(&mut df, "PocketNT", |r| Some(format_nucleotides(&r.contact_nucleotides)))?;
            self.f64_column(&mut df, "Pocket npr1", |r| r.shape.map(|s| s.npr1))?;
            self.f64_column(&mut df, "Pocket npr2", |r| r.shape.map(|s| s.npr2))?;
            self.str_column(&mut df, "Pocket geometry", |r| r.shape_class().map(|c| c.to_string()))?;
        }

        if self.has_ligand {
            self.str_column(&mut df, "Ligand", |r| r.ligand.as_ref().map(|l| l.ligand_id.clone()))?;
            self.f64_column(&mut df, "Pocket overlap", |r| r.ligand.as_ref().map(|l| l.pocket_overlap))?;
            self.f64_column(&mut df, "Ligand overlap", |r| r.ligand.as_ref().map(|l| l.ligand_overlap))?;
            self.f64_column(&mut df, "Center distance", |r| r.ligand.as_ref().map(|l| l.center_distance))?;
            let ligand_shape = |r: &PocketRecord| r.ligand_summary.as_ref().and_then(|s| s.shape);
            self.f64_column(&mut df, "NPR1", |r| ligand_shape(r).map(|s| s.npr1))?;
            self.f64_column(&mut df, "NPR2", |r| ligand_shape(r).map(|s| s.npr2))?;
            self.str_column(&mut df, "Geometry", |r| r.ligand_shape_class().map(|c| c.to_string()))?;
            self.f64_column(&mut df, "QED score", |r| r.ligand_summary.as_ref().and_then(|s| s.qed))?;
        }

        Ok(df)
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> PocketResult<()> {
        let path = path.as_ref();
        let mut df = self.to_dataframe()?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(&mut df)?;
        info!("Wrote {} pocket rows to {}", df.height(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectionParameters, FilterStatus, LigandOverlap, LigandSummary, PocketType, ShapeRatios};
    use polars::df;

    fn record(id: u32, state: Option<u32>) -> PocketRecord {
        let mut rec = PocketRecord::new(id, &DetectionParameters::default(), "1abc", state);
        rec.score = Some(0.3449);
        rec.volume = Some(1234.5);
        rec.alpha_sphere_count = Some(63);
        rec
    }

    #[test]
    fn base_columns_only_without_spheres() {
        let table = PocketTable {
            records: vec![record(1, None)],
            has_geometry: false,
            has_ligand: false,
        };
        let df = table.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names[0], "index");
        assert_eq!(names.last().map(String::as_str), Some("Polarity score"));
        assert!(df.column("PocketNT").is_err());
        assert_eq!(df.column("Score").unwrap().f64().unwrap().get(0), Some(0.34));
        assert_eq!(df.column("Volume").unwrap().f64().unwrap().get(0), Some(1200.0));
    }

    #[test]
    fn geometry_and_ligand_columns_in_order() {
        let mut rec = record(1, Some(2));
        rec.contact_nucleotides = vec![3, 4, 12];
        rec.shape = Some(ShapeRatios { npr1: 0.25, npr2: 0.25 });
        rec.pocket_type = PocketType::Known;
        rec.filter_status = FilterStatus::Pass;
        rec.ligand = Some(LigandOverlap {
            ligand_id: "RBF".into(),
            pocket_overlap: 0.5,
            ligand_overlap: 0.75,
            center_distance: 1.234,
        });
        rec.ligand_summary = Some(LigandSummary { shape: None, qed: Some(0.456) });
        let table = PocketTable {
            records: vec![rec],
            has_geometry: true,
            has_ligand: true,
        };
        let df = table.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        let tail: Vec<&str> = names[16..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "PocketNT", "Pocket npr1", "Pocket npr2", "Pocket geometry", "Ligand", "Pocket overlap",
                "Ligand overlap", "Center distance", "NPR1", "NPR2", "Geometry", "QED score"
            ]
        );
        assert_eq!(df.column("PocketNT").unwrap().str().unwrap().get(0), Some("[3, 4, 12]"));
        assert_eq!(df.column("Pocket geometry").unwrap().str().unwrap().get(0), Some("Disc-like"));
        assert_eq!(df.column("Type").unwrap().str().unwrap().get(0), Some("Known"));
        assert_eq!(df.column("QED score").unwrap().f64().unwrap().get(0), Some(0.46));
        assert_eq!(df.column("Geometry").unwrap().str().unwrap().get(0), None);
    }

    #[test]
    fn concat_keeps_state_tags_and_column_union() {
        let a = PocketTable {
            records: vec![record(1, Some(1)), record(2, Some(1))],
            has_geometry: true,
            has_ligand: false,
        };
        let b = PocketTable {
            records: vec![record(1, Some(2))],
            has_geometry: false,
            has_ligand: false,
        };
        let all = PocketTable::concat(vec![a, b]);
        assert_eq!(all.len(), 3);
        assert!(all.has_geometry);
        assert_eq!(all.states(), vec![Some(1), Some(2)]);

        let df = all.to_dataframe().unwrap();
        let expected = df![
            "Pocket" => &[1u32, 2, 1],
            "State" => &[1u32, 1, 2]
        ]
        .unwrap();
        assert!(df.select(["Pocket", "State"]).unwrap().equals(&expected));
    }

    #[test]
    fn csv_has_header_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x_out_pocket_characteristics.csv");
        let table = PocketTable {
            records: vec![record(1, None), record(2, None)],
            has_geometry: false,
            has_ligand: false,
        };
        table.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("index,Parameters,PDB,State,Pocket,Type,Filter,Score"));
        assert!(lines.next().unwrap().starts_with("0,-m 3.0 -M 5.7 -i 42 -D 1.65 -A 3 -p 0.0,1abc,,1,Novel,Fail,0.34"));
    }
}
