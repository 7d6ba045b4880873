//! Reader for the pocket finder's `*_info.txt` report.
//!
//! The report is a sequence of `Pocket N :` blocks holding `Label : value` lines. Labels are
//! matched exactly; anything unrecognised is ignored, and a label missing from a block leaves the
//! corresponding field unset.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{PocketError, PocketResult};
use crate::models::{DetectionParameters, PocketRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportField {
    Score,
    DruggabilityScore,
    AlphaSpheres,
    TotalSasa,
    Volume,
    HydrophobicDensity,
    ApolarProportion,
    Hydrophobicity,
    Polarity,
}

impl ReportField {
    const ALL: [ReportField; 9] = [
        ReportField::Score,
        ReportField::DruggabilityScore,
        ReportField::AlphaSpheres,
        ReportField::TotalSasa,
        ReportField::Volume,
        ReportField::HydrophobicDensity,
        ReportField::ApolarProportion,
        ReportField::Hydrophobicity,
        ReportField::Polarity,
    ];

    fn from_label(label: &str) -> Option<Self> {
        let field = match label {
            "Score" => ReportField::Score,
            "Druggability Score" => ReportField::DruggabilityScore,
            "Number of Alpha Spheres" => ReportField::AlphaSpheres,
            "Total SASA" => ReportField::TotalSasa,
            "Volume" => ReportField::Volume,
            "Mean local hydrophobic density" => ReportField::HydrophobicDensity,
            "Apolar alpha sphere proportion" => ReportField::ApolarProportion,
            "Hydrophobicity score" => ReportField::Hydrophobicity,
            "Polarity score" => ReportField::Polarity,
            _ => return None,
        };
        Some(field)
    }

    fn label(self) -> &'static str {
        match self {
            ReportField::Score => "Score",
            ReportField::DruggabilityScore => "Druggability Score",
            ReportField::AlphaSpheres => "Number of Alpha Spheres",
            ReportField::TotalSasa => "Total SASA",
            ReportField::Volume => "Volume",
            ReportField::HydrophobicDensity => "Mean local hydrophobic density",
            ReportField::ApolarProportion => "Apolar alpha sphere proportion",
            ReportField::Hydrophobicity => "Hydrophobicity score",
            ReportField::Polarity => "Polarity score",
        }
    }

    fn is_set(self, rec: &PocketRecord) -> bool {
        match self {
            ReportField::Score => rec.score.is_some(),
            ReportField::DruggabilityScore => rec.druggability_score.is_some(),
            ReportField::AlphaSpheres => rec.alpha_sphere_count.is_some(),
            ReportField::TotalSasa => rec.total_sasa.is_some(),
            ReportField::Volume => rec.volume.is_some(),
            ReportField::HydrophobicDensity => rec.hydrophobic_density.is_some(),
            ReportField::ApolarProportion => rec.apolar_sphere_proportion.is_some(),
            ReportField::Hydrophobicity => rec.hydrophobicity_score.is_some(),
            ReportField::Polarity => rec.polarity_score.is_some(),
        }
    }

    /// Store `raw` in the record. Returns false if the value does not parse.
    fn assign(self, rec: &mut PocketRecord, raw: &str) -> bool {
        if self == ReportField::AlphaSpheres {
            return match raw.parse::<u32>() {
                Ok(n) => {
                    rec.alpha_sphere_count = Some(n);
                    true
                }
                Err(_) => false,
            };
        }
        let Ok(value) = raw.parse::<f64>() else {
            return false;
        };
        let slot = match self {
            ReportField::Score => &mut rec.score,
            ReportField::DruggabilityScore => &mut rec.druggability_score,
            ReportField::TotalSasa => &mut rec.total_sasa,
            ReportField::Volume => &mut rec.volume,
            ReportField::HydrophobicDensity => &mut rec.hydrophobic_density,
            ReportField::ApolarProportion => &mut rec.apolar_sphere_proportion,
            ReportField::Hydrophobicity => &mut rec.hydrophobicity_score,
            ReportField::Polarity => &mut rec.polarity_score,
            ReportField::AlphaSpheres => return false,
        };
        *slot = Some(value);
        true
    }

    /// Copy this field from `from` into `into` when `into` has it unset.
    fn fill(self, into: &mut PocketRecord, from: &PocketRecord) {
        match self {
            ReportField::Score => into.score = into.score.or(from.score),
            ReportField::DruggabilityScore => into.druggability_score = into.druggability_score.or(from.druggability_score),
            ReportField::AlphaSpheres => into.alpha_sphere_count = into.alpha_sphere_count.or(from.alpha_sphere_count),
            ReportField::TotalSasa => into.total_sasa = into.total_sasa.or(from.total_sasa),
            ReportField::Volume => into.volume = into.volume.or(from.volume),
            ReportField::HydrophobicDensity => into.hydrophobic_density = into.hydrophobic_density.or(from.hydrophobic_density),
            ReportField::ApolarProportion => {
                into.apolar_sphere_proportion = into.apolar_sphere_proportion.or(from.apolar_sphere_proportion)
            }
            ReportField::Hydrophobicity => into.hydrophobicity_score = into.hydrophobicity_score.or(from.hydrophobicity_score),
            ReportField::Polarity => into.polarity_score = into.polarity_score.or(from.polarity_score),
        }
    }
}

/// Parse report text into one record per pocket block, ascending by pocket id.
pub fn parse_report(
    text: &str,
    params: &DetectionParameters,
    pdb: &str,
    state: Option<u32>,
) -> PocketResult<Vec<PocketRecord>> {
    let header_re = Regex::new(r"^\s*Pocket\s+(\d+)\s*:")?;
    let field_re = Regex::new(r"^\s*([^:]+?)\s*:\s*(\S+)")?;

    let mut records: Vec<PocketRecord> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = header_re.captures(line) {
            match caps[1].parse::<u32>() {
                Ok(id) => records.push(PocketRecord::new(id, params, pdb, state)),
                Err(_) => warn!("Skipping pocket header with an unreadable index: '{}'", line.trim()),
            }
            continue;
        }
        let Some(current) = records.last_mut() else {
            continue;
        };
        let Some(caps) = field_re.captures(line) else {
            continue;
        };
        if let Some(field) = ReportField::from_label(&caps[1]) {
            if !field.assign(current, &caps[2]) {
                warn!(
                    "Pocket {}: could not read '{}' value '{}'",
                    current.pocket_id,
                    field.label(),
                    &caps[2]
                );
            }
        }
    }

    Ok(rectangularize(records))
}

/// Order by pocket id, fold duplicate blocks into one record, report unset fields.
fn rectangularize(records: Vec<PocketRecord>) -> Vec<PocketRecord> {
    let mut by_id: BTreeMap<u32, PocketRecord> = BTreeMap::new();
    for rec in records {
        match by_id.get_mut(&rec.pocket_id) {
            Some(existing) => {
                debug!("Pocket {} reported twice; merging blocks", rec.pocket_id);
                for field in ReportField::ALL {
                    field.fill(existing, &rec);
                }
            }
            None => {
                by_id.insert(rec.pocket_id, rec);
            }
        }
    }

    let records: Vec<PocketRecord> = by_id.into_values().collect();
    for rec in &records {
        let missing: Vec<&str> = ReportField::ALL
            .iter()
            .filter(|f| !f.is_set(rec))
            .map(|f| f.label())
            .collect();
        if !missing.is_empty() {
            debug!("Pocket {} has no value for: {}", rec.pocket_id, missing.join(", "));
        }
    }
    records
}

/// Read and parse an `*_info.txt` file.
pub fn read_report(
    path: impl AsRef<Path>,
    params: &DetectionParameters,
    pdb: &str,
    state: Option<u32>,
) -> PocketResult<Vec<PocketRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|_| {
        PocketError::missing("info_txt", path, "Re-run the pocket finder or point the analysis at its output directory.")
    })?;
    let records = parse_report(&text, params, pdb, state)?;
    info!("{} pockets reported in {}", records.len(), path.display());
    Ok(records)
}
