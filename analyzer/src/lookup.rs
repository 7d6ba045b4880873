//! Ligand reference lookup: molecular weight, carbon count and drug-likeness for a residue code.
//!
//! Lookups are best-effort. A failed request is logged and the caller gets `None`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PocketError, PocketResult};

const RCSB_CHEMCOMP: &str = "https://data.rcsb.org/rest/v1/core/chemcomp/";
const CHEMBL_MOLECULE: &str = "https://www.ebi.ac.uk/chembl/api/data/molecule/";

/// Reference properties of one chemical component.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandDescriptor {
    pub code: String,
    pub formula_weight: Option<f64>,
    pub carbon_count: Option<u32>,
    pub qed: Option<f64>,
}

impl LigandDescriptor {
    /// Small fragments (mass < 100 or at most 3 carbons) are not drug-like ligands.
    /// Unknown mass or carbon count does not exclude a candidate.
    pub fn is_fragment(&self) -> bool {
        self.formula_weight.is_some_and(|w| w < 100.0) || self.carbon_count.is_some_and(|c| c <= 3)
    }
}

pub trait LigandLookup {
    fn describe(&self, code: &str) -> Option<LigandDescriptor>;
}

/// Lookup against a fixed table; the empty default never answers.
#[derive(Debug, Clone, Default)]
pub struct OfflineLookup {
    known: HashMap<String, LigandDescriptor>,
}

impl OfflineLookup {
    pub fn with(mut self, descriptor: LigandDescriptor) -> Self {
        self.known.insert(descriptor.code.clone(), descriptor);
        self
    }
}

impl LigandLookup for OfflineLookup {
    fn describe(&self, code: &str) -> Option<LigandDescriptor> {
        self.known.get(code).cloned()
    }
}

#[derive(Debug, Deserialize)]
struct ChemComp {
    chem_comp: ChemCompCore,
    #[serde(default)]
    rcsb_chem_comp_related: Vec<RelatedResource>,
}

#[derive(Debug, Deserialize)]
struct ChemCompCore {
    formula: Option<String>,
    formula_weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RelatedResource {
    resource_name: String,
    resource_accession_code: String,
}

/// RCSB chemical-component dictionary, with QED from the linked ChEMBL molecule.
pub struct RcsbLookup {
    client: Client,
}

impl RcsbLookup {
    pub fn new() -> PocketResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("rna-pocket-analyzer/0.1"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self { client })
    }

    fn get_json(&self, url: &str) -> PocketResult<Value> {
        debug!("GET {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(PocketError::malformed(url, format!("request failed with status {status}")));
        }
        Ok(response.json()?)
    }

    fn fetch(&self, code: &str) -> PocketResult<LigandDescriptor> {
        let body = self.get_json(&format!("{RCSB_CHEMCOMP}{code}"))?;
        let comp: ChemComp = serde_json::from_value(body)?;

        let chembl = comp
            .rcsb_chem_comp_related
            .iter()
            .find(|r| r.resource_name.eq_ignore_ascii_case("ChEMBL"))
            .map(|r| r.resource_accession_code.clone());

        let qed = match chembl {
            Some(id) => {
                let molecule = self.get_json(&format!("{CHEMBL_MOLECULE}{id}.json"))?;
                qed_from_molecule(&molecule)
            }
            None => {
                debug!("{} has no ChEMBL cross-reference; QED unavailable", code);
                None
            }
        };

        Ok(LigandDescriptor {
            code: code.to_string(),
            formula_weight: comp.chem_comp.formula_weight,
            carbon_count: comp.chem_comp.formula.as_deref().map(carbon_count),
            qed,
        })
    }
}

impl LigandLookup for RcsbLookup {
    fn describe(&self, code: &str) -> Option<LigandDescriptor> {
        match self.fetch(code) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!("Not able to retrieve reference data for ligand {}: {}", code, e);
                None
            }
        }
    }
}

/// `molecule_properties.qed_weighted`, which ChEMBL serves as a string or a number.
fn qed_from_molecule(molecule: &Value) -> Option<f64> {
    let raw = molecule.get("molecule_properties")?.get("qed_weighted")?;
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Carbon atoms in a formula such as `C10 H12 N5 O6 P`.
pub fn carbon_count(formula: &str) -> u32 {
    formula
        .split_whitespace()
        .filter_map(|token| {
            let symbol: String = token.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
            if symbol != "C" {
                return None;
            }
            let digits = &token[symbol.len()..];
            Some(if digits.is_empty() { 1 } else { digits.parse().unwrap_or(0) })
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carbons_from_formula() {
        assert_eq!(carbon_count("C10 H12 N5 O6 P"), 10);
        assert_eq!(carbon_count("C H4 O"), 1);
        assert_eq!(carbon_count("Ca Cl2"), 0);
        assert_eq!(carbon_count(""), 0);
    }

    #[test]
    fn fragment_thresholds() {
        let d = |w: Option<f64>, c: Option<u32>| LigandDescriptor {
            code: "X".into(),
            formula_weight: w,
            carbon_count: c,
            qed: None,
        };
        assert!(d(Some(60.0), Some(2)).is_fragment());
        assert!(d(Some(250.0), Some(3)).is_fragment());
        assert!(!d(Some(250.0), Some(4)).is_fragment());
        assert!(!d(None, None).is_fragment());
    }

    #[test]
    fn qed_as_string_or_number() {
        let s: Value = serde_json::json!({"molecule_properties": {"qed_weighted": "0.45"}});
        let n: Value = serde_json::json!({"molecule_properties": {"qed_weighted": 0.61}});
        let missing: Value = serde_json::json!({"molecule_properties": null});
        assert_eq!(qed_from_molecule(&s), Some(0.45));
        assert_eq!(qed_from_molecule(&n), Some(0.61));
        assert_eq!(qed_from_molecule(&missing), None);
    }

    #[test]
    fn chemcomp_document_decodes() {
        let body = serde_json::json!({
            "chem_comp": {"id": "GTP", "formula": "C10 H16 N5 O14 P3", "formula_weight": 523.18},
            "rcsb_chem_comp_related": [
                {"resource_name": "ChEMBL", "resource_accession_code": "CHEMBL1233147"}
            ]
        });
        let comp: ChemComp = serde_json::from_value(body).unwrap();
        assert_eq!(comp.chem_comp.formula_weight, Some(523.18));
        assert_eq!(comp.rcsb_chem_comp_related[0].resource_accession_code, "CHEMBL1233147");
    }

    #[test]
    fn offline_table_answers_known_codes() {
        let lookup = OfflineLookup::default().with(LigandDescriptor {
            code: "RBF".into(),
            formula_weight: Some(376.4),
            carbon_count: Some(17),
            qed: Some(0.4),
        });
        assert_eq!(lookup.describe("RBF").and_then(|d| d.qed), Some(0.4));
        assert!(lookup.describe("ZZZ").is_none());
    }
}
