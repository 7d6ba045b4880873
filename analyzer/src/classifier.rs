//! Turns parsed pocket records into the classified characteristics table.
//!
//! Stages run in a fixed order over the records of one state:
//! geometry and contacts, the quality filter, then known/novel typing.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::contacts::ContactExport;
use crate::geometry::{center, count_within, min_distance, shape_ratios};
use crate::ligand::ResolvedLigand;
use crate::lookup::LigandLookup;
use crate::models::{FilterStatus, LigandOverlap, LigandSummary, PocketRecord, PocketType, ShapeRatios};
use crate::structure::AtomView;
use crate::table::PocketTable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierSettings {
    /// Pockets pass when their score is strictly above this.
    pub quality_filter: f64,
    /// Å between a sphere and a ligand atom to count as contact (inclusive).
    pub contact_distance: f64,
    pub min_pocket_overlap: f64,
    pub min_ligand_overlap: f64,
    pub max_center_distance: f64,
    /// Known-nucleotide mode: contacts required in the known set.
    pub min_known_contacts: usize,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            quality_filter: 0.0,
            contact_distance: 3.0,
            min_pocket_overlap: 0.33,
            min_ligand_overlap: 0.33,
            max_center_distance: 4.0,
            min_known_contacts: 3,
        }
    }
}

/// How pockets are labelled Known.
#[derive(Debug, Clone)]
pub enum PocketTyping<'a> {
    None,
    KnownNucleotides(BTreeSet<i64>),
    Ligand(ResolvedLigand<'a>),
}

pub struct PocketClassifier {
    pub settings: ClassifierSettings,
}

impl PocketClassifier {
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }

    /// Classify one state's pockets. `spheres` is the a-sphere view of the merged structure,
    /// `exports` the per-pocket contact files and `chains` the RNA chains contacts count for.
    pub fn classify(
        &self,
        mut records: Vec<PocketRecord>,
        spheres: &AtomView<'_>,
        exports: &[ContactExport],
        chains: &[String],
        typing: &PocketTyping<'_>,
        lookup: &dyn LigandLookup,
    ) -> PocketTable {
        let has_geometry = !spheres.is_empty();
        let mut has_ligand = false;

        if has_geometry {
            let groups: HashMap<i64, AtomView<'_>> = spheres.by_residue().into_iter().collect();
            self.add_geometry(&mut records, &groups, exports, chains);
            self.apply_filter(&mut records);

            match typing {
                PocketTyping::None => {}
                PocketTyping::KnownNucleotides(known) => self.type_by_nucleotides(&mut records, known),
                PocketTyping::Ligand(ligand) => {
                    has_ligand = true;
                    self.type_by_ligand(&mut records, &groups, ligand, lookup);
                }
            }
        } else {
            info!("No a-spheres found; geometry and ligand columns are omitted");
            self.apply_filter(&mut records);
        }

        info!("Number of pockets detected: {}", records.len());
        if has_ligand || matches!(typing, PocketTyping::KnownNucleotides(_)) {
            info!("Number of known pockets: {}", records.iter().filter(|r| r.is_known()).count());
        }

        PocketTable {
            records,
            has_geometry,
            has_ligand,
        }
    }

    fn add_geometry(
        &self,
        records: &mut [PocketRecord],
        groups: &HashMap<i64, AtomView<'_>>,
        exports: &[ContactExport],
        chains: &[String],
    ) {
        let mut by_pocket: HashMap<u32, &ContactExport> = HashMap::new();
        for (idx, export) in exports.iter().enumerate() {
            let id = export.pocket_id().unwrap_or(idx as u32 + 1);
            by_pocket.entry(id).or_insert(export);
        }

        for rec in records.iter_mut() {
            match by_pocket.get(&rec.pocket_id) {
                Some(export) => rec.contact_nucleotides = export.contact_nucleotides(chains),
                None => warn!("Pocket {}: no pocket{}_atm.pdb contact export found", rec.pocket_id, rec.pocket_id),
            }

            let Some(group) = groups.get(&i64::from(rec.pocket_id)) else {
                debug!("Pocket {}: no a-spheres in the merged structure", rec.pocket_id);
                continue;
            };
            if rec.contact_nucleotides.is_empty() {
                warn!(
                    "Pocket {} has {} a-spheres but no contact nucleotides in chain(s) {}",
                    rec.pocket_id,
                    group.len(),
                    chains.join(",")
                );
            }

            let unit_mass: Vec<_> = group.coords().into_iter().map(|p| (p, 1.0)).collect();
            rec.shape = shape_ratios(&unit_mass).filter(ShapeRatios::is_finite);
            if rec.shape.is_none() {
                debug!("Pocket {}: degenerate a-sphere set, shape left undetermined", rec.pocket_id);
            }
        }
    }

    fn apply_filter(&self, records: &mut [PocketRecord]) {
        for rec in records.iter_mut() {
            rec.filter_status = match rec.score {
                Some(score) if score > self.settings.quality_filter => FilterStatus::Pass,
                _ => FilterStatus::Fail,
            };
        }
    }

    fn type_by_nucleotides(&self, records: &mut [PocketRecord], known: &BTreeSet<i64>) {
        for rec in records.iter_mut() {
            let hits = rec.contact_nucleotides.iter().filter(|nt| known.contains(nt)).count();
            if hits >= self.settings.min_known_contacts {
                rec.pocket_type = PocketType::Known;
            }
        }
    }

    /// Overlap of one pocket's spheres with the ligand.
    pub fn overlap(&self, pocket: &AtomView<'_>, ligand: &ResolvedLigand<'_>) -> Option<LigandOverlap> {
        let sphere_coords = pocket.coords();
        let ligand_coords = ligand.atoms.coords();
        if sphere_coords.is_empty() || ligand_coords.is_empty() {
            return None;
        }
        let d = self.settings.contact_distance;
        let pocket_overlap = count_within(&sphere_coords, &ligand_coords, d) as f64 / sphere_coords.len() as f64;
        let ligand_overlap = count_within(&ligand_coords, &sphere_coords, d) as f64 / ligand_coords.len() as f64;
        let center_distance = center(&sphere_coords).and_then(|c| min_distance(&c, &ligand_coords))?;
        Some(LigandOverlap {
            ligand_id: ligand.code.clone(),
            pocket_overlap,
            ligand_overlap,
            center_distance,
        })
    }

    /// Known iff both overlaps reach their minimum and the center is close enough (all inclusive).
    pub fn is_known(&self, overlap: &LigandOverlap) -> bool {
        overlap.pocket_overlap >= self.settings.min_pocket_overlap
            && overlap.ligand_overlap >= self.settings.min_ligand_overlap
            && overlap.center_distance <= self.settings.max_center_distance
    }

    fn type_by_ligand(
        &self,
        records: &mut [PocketRecord],
        groups: &HashMap<i64, AtomView<'_>>,
        ligand: &ResolvedLigand<'_>,
        lookup: &dyn LigandLookup,
    ) {
        for rec in records.iter_mut() {
            let Some(group) = groups.get(&i64::from(rec.pocket_id)) else {
                continue;
            };
            rec.ligand = self.overlap(group, ligand);
            if rec.ligand.as_ref().is_some_and(|o| self.is_known(o)) {
                rec.pocket_type = PocketType::Known;
            }
        }

        if !records.iter().any(PocketRecord::is_known) {
            return;
        }

        let shape = shape_ratios(&ligand.atoms.weighted()).filter(ShapeRatios::is_finite);
        let qed = match &ligand.descriptor {
            Some(descriptor) => descriptor.qed,
            None => lookup.describe(&ligand.code).and_then(|d| d.qed),
        };
        if qed.is_none() {
            warn!("Not able to calculate QED score for {}", ligand.code);
        }
        let summary = LigandSummary { shape, qed };
        for rec in records.iter_mut().filter(|r| r.is_known()) {
            rec.ligand_summary = Some(summary.clone());
        }
    }
}
