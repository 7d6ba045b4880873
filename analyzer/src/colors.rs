//! Pocket and nucleotide colours handed to the figure renderers.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use tracing::{debug, warn};

use crate::models::{PocketRecord, PocketType};
use crate::reconcile::NucleotideIndexer;

pub type Rgba = [f64; 4];

pub const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

const LUT_SIZE: usize = 256;

/// A reversed cubehelix colour map sampled on a 256-entry table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubehelix {
    pub start: f64,
    pub rot: f64,
    pub gamma: f64,
    pub hue: f64,
    pub light: f64,
    pub dark: f64,
}

impl Cubehelix {
    pub const KNOWN: Cubehelix = Cubehelix {
        start: 1.1,
        rot: 0.1,
        gamma: 0.6,
        hue: 3.0,
        light: 0.65,
        dark: 0.35,
    };

    pub const NOVEL: Cubehelix = Cubehelix {
        start: 0.09,
        rot: 2.55,
        gamma: 0.85,
        hue: 1.25,
        light: 0.45,
        dark: 0.25,
    };

    fn channel(&self, x: f64, p0: f64, p1: f64) -> f64 {
        let xg = x.powf(self.gamma);
        let a = self.hue * xg * (1.0 - xg) / 2.0;
        let phi = 2.0 * PI * (self.start / 3.0 + self.rot * x);
        xg + a * (p0 * phi.cos() + p1 * phi.sin())
    }

    /// Underlying helix, quantized to the table like a segmented colour map.
    fn helix(&self, x: f64) -> Rgba {
        let j = lut_index(x);
        let xs = j as f64 / (LUT_SIZE - 1) as f64;
        [
            self.channel(xs, -0.14861, 1.78277).clamp(0.0, 1.0),
            self.channel(xs, -0.29227, -0.90649).clamp(0.0, 1.0),
            self.channel(xs, 1.97294, 0.0).clamp(0.0, 1.0),
            1.0,
        ]
    }

    /// Colour at `v` in [0, 1]; 0 is the light end.
    pub fn at(&self, v: f64) -> Rgba {
        let i = lut_index(v);
        let step = (LUT_SIZE - 1 - i) as f64 / (LUT_SIZE - 1) as f64;
        let x = self.light + (self.dark - self.light) * step;
        self.helix(x)
    }
}

fn lut_index(v: f64) -> usize {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    ((v * LUT_SIZE as f64) as usize).min(LUT_SIZE - 1)
}

/// Sites (0-based secondary-structure positions) lining one pocket and its colour.
#[derive(Debug, Clone, PartialEq)]
pub struct NucleotideGroup {
    pub pocket_id: u32,
    pub sites: Vec<i64>,
    pub color: Rgba,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorAssignment {
    pub pocket_colors: BTreeMap<u32, Rgba>,
    /// One entry per sequence position; white where no pocket claims the nucleotide.
    pub nucleotide_colors: Vec<Rgba>,
    pub groups: Vec<NucleotideGroup>,
}

/// Sequence length for colouring: the secondary-structure length when known, else the structure's.
pub fn sequence_length(structure_len: usize, secondary_len: Option<usize>) -> usize {
    match secondary_len {
        Some(n) if n != structure_len => {
            warn!(
                "The PDB sequence length ({}) is different than the secondary structure sequence length ({}). Make sure these files are correct.",
                structure_len, n
            );
            n
        }
        Some(n) => n,
        None => structure_len,
    }
}

impl ColorAssignment {
    /// Colour passing pockets by rank within their type. Nucleotides are painted only when
    /// `paint_sequence` is set and an indexer is available; a nucleotide keeps the colour of the
    /// first pocket that touched it unless a Known pocket claims it first among Known pockets.
    pub fn assign(
        records: &[PocketRecord],
        sequence_len: usize,
        indexer: Option<&NucleotideIndexer>,
        paint_sequence: bool,
    ) -> ColorAssignment {
        let passing: Vec<&PocketRecord> = records.iter().filter(|r| r.passes()).collect();
        let known_len = passing.iter().filter(|r| r.pocket_type == PocketType::Known).count();
        let novel_len = passing.len() - known_len;

        let mut out = ColorAssignment {
            nucleotide_colors: vec![WHITE; sequence_len],
            ..Default::default()
        };
        let mut known_count = 0usize;
        let mut novel_count = 0usize;
        let mut colored: Vec<i64> = Vec::new();
        let mut known_colored: Vec<i64> = Vec::new();

        for rec in passing {
            let (map, count, len) = match rec.pocket_type {
                PocketType::Known => (Cubehelix::KNOWN, &mut known_count, known_len),
                PocketType::Novel => (Cubehelix::NOVEL, &mut novel_count, novel_len),
            };
            let span = len.saturating_sub(1);
            let color = if span == 0 {
                map.at(0.0)
            } else {
                map.at(*count as f64 / span as f64)
            };
            *count += 1;
            out.pocket_colors.insert(rec.pocket_id, color);

            let mut sites = Vec::new();
            if let Some(indexer) = indexer {
                for &nt in &rec.contact_nucleotides {
                    let idx = indexer.index(nt);
                    sites.push(idx);

                    if paint_sequence {
                        let claim = (!colored.contains(&nt) && !known_colored.contains(&nt))
                            || (rec.is_known() && !known_colored.contains(&nt));
                        if claim {
                            match usize::try_from(idx).ok().filter(|&i| i < sequence_len) {
                                Some(i) => out.nucleotide_colors[i] = color,
                                None => debug!("nucleotide {} maps outside the sequence (index {})", nt, idx),
                            }
                        }
                    }
                    colored.push(nt);
                    if rec.is_known() {
                        known_colored.push(nt);
                    }
                }
            }
            out.groups.push(NucleotideGroup {
                pocket_id: rec.pocket_id,
                sites,
                color,
            });
        }
        out
    }
}
