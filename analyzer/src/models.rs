use std::fmt;

use serde::{Deserialize, Serialize};

use crate::helper_functions::python_float;

/// Pocket quality filter outcome. Every pocket starts as `Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterStatus {
    Pass,
    #[default]
    Fail,
}

impl fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterStatus::Pass => "Pass",
            FilterStatus::Fail => "Fail",
        };
        write!(f, "{s}")
    }
}

/// Known pockets overlap a reference ligand or a caller-supplied nucleotide set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PocketType {
    Known,
    #[default]
    Novel,
}

impl fmt::Display for PocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PocketType::Known => "Known",
            PocketType::Novel => "Novel",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeClass {
    RodLike,
    DiscLike,
    SphereLike,
    Balanced,
}

impl fmt::Display for ShapeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShapeClass::RodLike => "Rod-like",
            ShapeClass::DiscLike => "Disc-like",
            ShapeClass::SphereLike => "Sphere-like",
            ShapeClass::Balanced => "Balanced",
        };
        write!(f, "{s}")
    }
}

/// Normalized principal-moment ratios: npr1 = I1/I3, npr2 = I2/I3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeRatios {
    pub npr1: f64,
    pub npr2: f64,
}

impl ShapeRatios {
    /// Ratios from ascending principal moments. I3 == 0 yields NaN ratios.
    pub fn from_moments(moments: [f64; 3]) -> Self {
        let [i1, i2, i3] = moments;
        if i3 == 0.0 {
            return ShapeRatios {
                npr1: f64::NAN,
                npr2: f64::NAN,
            };
        }
        ShapeRatios {
            npr1: (i1 / i3).clamp(0.0, 1.0),
            npr2: (i2 / i3).clamp(0.0, 1.0),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.npr1.is_finite() && self.npr2.is_finite()
    }

    /// First match wins: Rod-like, Sphere-like, Disc-like, else Balanced.
    pub fn classify(&self) -> ShapeClass {
        let (npr1, npr2) = (self.npr1, self.npr2);
        if npr1 - npr2 + 0.5 < 0.0 {
            ShapeClass::RodLike
        } else if -npr1 - npr2 + 1.5 < 0.0 {
            ShapeClass::SphereLike
        } else if npr2 - 0.75 < 0.0 {
            ShapeClass::DiscLike
        } else {
            ShapeClass::Balanced
        }
    }
}

/// Pocket-finder thresholds recorded on every row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParameters {
    /// Minimum a-sphere radius (Å).
    pub min_radius: f64,
    /// Maximum a-sphere radius (Å).
    pub max_radius: f64,
    /// Minimum number of a-spheres per pocket.
    pub min_spheres: u32,
    /// a-sphere clustering distance (Å).
    pub clustering_distance: f64,
    /// Electronegative atoms required for a polar a-sphere.
    pub polar_atoms: u32,
    /// Maximum ratio of apolar a-spheres in a pocket.
    pub apolar_ratio: f64,
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            min_radius: 3.0,
            max_radius: 5.7,
            min_spheres: 42,
            clustering_distance: 1.65,
            polar_atoms: 3,
            apolar_ratio: 0.0,
        }
    }
}

impl DetectionParameters {
    /// The flag string the pocket finder was invoked with, e.g. `-m 3.0 -M 5.7 -i 42 -D 1.65 -A 3 -p 0.0`.
    pub fn flag_string(&self) -> String {
        format!(
            "-m {} -M {} -i {} -D {} -A {} -p {}",
            python_float(self.min_radius),
            python_float(self.max_radius),
            self.min_spheres,
            python_float(self.clustering_distance),
            self.polar_atoms,
            python_float(self.apolar_ratio),
        )
    }

    /// Directory name used when no output directory is configured.
    pub fn default_output_dir(&self) -> String {
        format!(
            "rna_pockets_out-m_{}-M_{}-i_{}-D_{}-A_{}-p_{}",
            python_float(self.min_radius),
            python_float(self.max_radius),
            self.min_spheres,
            python_float(self.clustering_distance),
            self.polar_atoms,
            python_float(self.apolar_ratio),
        )
    }
}

/// Overlap of one pocket with the resolved ligand.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandOverlap {
    pub ligand_id: String,
    /// Fraction of the pocket's a-spheres within the contact distance of the ligand.
    pub pocket_overlap: f64,
    /// Fraction of ligand atoms within the contact distance of the pocket.
    pub ligand_overlap: f64,
    /// Minimum distance from the pocket's geometric center to any ligand atom.
    pub center_distance: f64,
}

/// Ligand-level properties, replicated on every Known row.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandSummary {
    pub shape: Option<ShapeRatios>,
    pub qed: Option<f64>,
}

/// One detected pocket candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct PocketRecord {
    pub parameters: String,
    pub pdb: String,
    pub state: Option<u32>,
    pub pocket_id: u32,
    pub pocket_type: PocketType,
    pub filter_status: FilterStatus,
    pub score: Option<f64>,
    pub druggability_score: Option<f64>,
    pub alpha_sphere_count: Option<u32>,
    pub total_sasa: Option<f64>,
    pub volume: Option<f64>,
    pub hydrophobic_density: Option<f64>,
    pub apolar_sphere_proportion: Option<f64>,
    pub hydrophobicity_score: Option<f64>,
    pub polarity_score: Option<f64>,
    pub contact_nucleotides: Vec<i64>,
    pub shape: Option<ShapeRatios>,
    pub ligand: Option<LigandOverlap>,
    pub ligand_summary: Option<LigandSummary>,
}

impl PocketRecord {
    pub fn new(pocket_id: u32, parameters: &DetectionParameters, pdb: &str, state: Option<u32>) -> Self {
        Self {
            parameters: parameters.flag_string(),
            pdb: pdb.to_string(),
            state,
            pocket_id,
            pocket_type: PocketType::default(),
            filter_status: FilterStatus::default(),
            score: None,
            druggability_score: None,
            alpha_sphere_count: None,
            total_sasa: None,
            volume: None,
            hydrophobic_density: None,
            apolar_sphere_proportion: None,
            hydrophobicity_score: None,
            polarity_score: None,
            contact_nucleotides: Vec::new(),
            shape: None,
            ligand: None,
            ligand_summary: None,
        }
    }

    pub fn shape_class(&self) -> Option<ShapeClass> {
        self.shape.filter(ShapeRatios::is_finite).map(|s| s.classify())
    }

    pub fn ligand_shape_class(&self) -> Option<ShapeClass> {
        self.ligand_summary
            .as_ref()
            .and_then(|s| s.shape)
            .filter(ShapeRatios::is_finite)
            .map(|s| s.classify())
    }

    pub fn is_known(&self) -> bool {
        self.pocket_type == PocketType::Known
    }

    pub fn passes(&self) -> bool {
        self.filter_status == FilterStatus::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disc_like_from_moments_1_1_4() {
        let ratios = ShapeRatios::from_moments([1.0, 1.0, 4.0]);
        assert_eq!(ratios.npr1, 0.25);
        assert_eq!(ratios.npr2, 0.25);
        assert_eq!(ratios.classify(), ShapeClass::DiscLike);
    }

    #[test]
    fn rod_boundary_is_strict() {
        // npr1 - npr2 + 0.5 == 0 must not be Rod-like
        let ratios = ShapeRatios { npr1: 0.25, npr2: 0.75 };
        assert_eq!(ratios.classify(), ShapeClass::Balanced);
        let ratios = ShapeRatios { npr1: 0.2, npr2: 0.75 };
        assert_eq!(ratios.classify(), ShapeClass::RodLike);
    }

    #[test]
    fn sphere_and_balanced() {
        assert_eq!(ShapeRatios { npr1: 1.0, npr2: 1.0 }.classify(), ShapeClass::SphereLike);
        assert_eq!(ShapeRatios { npr1: 0.75, npr2: 0.75 }.classify(), ShapeClass::Balanced);
    }

    #[test]
    fn coincident_moments_signal_nan() {
        let ratios = ShapeRatios::from_moments([0.0, 0.0, 0.0]);
        assert!(!ratios.is_finite());
        assert_eq!(ratios.classify(), ShapeClass::Balanced);
    }

    #[test]
    fn flag_string_matches_pocket_finder_defaults() {
        let params = DetectionParameters::default();
        assert_eq!(params.flag_string(), "-m 3.0 -M 5.7 -i 42 -D 1.65 -A 3 -p 0.0");
        assert_eq!(params.default_output_dir(), "rna_pockets_out-m_3.0-M_5.7-i_42-D_1.65-A_3-p_0.0");
    }

    #[test]
    fn new_record_defaults_to_novel_fail() {
        let rec = PocketRecord::new(1, &DetectionParameters::default(), "1abc", Some(2));
        assert_eq!(rec.pocket_type, PocketType::Novel);
        assert_eq!(rec.filter_status, FilterStatus::Fail);
        assert_eq!(rec.state, Some(2));
        assert!(rec.shape_class().is_none());
    }
}
