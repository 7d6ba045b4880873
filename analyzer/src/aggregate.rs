//! Every model of a multi-model structure, analyzed one after another.

use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

use crate::config::AnalysisConfig;
use crate::error::{PocketError, PocketResult};
use crate::pipeline::{analyze_state, Collaborators, StateResult};
use crate::structure::Structure;
use crate::table::PocketTable;

#[derive(Debug, Clone)]
pub struct AggregateResult {
    /// Rows of every state, in state order, each tagged with its state.
    pub table: PocketTable,
    pub states: Vec<StateResult>,
    pub csv: PathBuf,
}

/// Run the single-state pipeline for models `1..=N` and concatenate their tables.
/// A failing state aborts the whole run.
pub fn analyze_all_states(
    config: &AnalysisConfig,
    input: &Structure,
    collab: &mut Collaborators<'_>,
) -> PocketResult<AggregateResult> {
    let model_count = input
        .model_count()
        .map_err(|reason| PocketError::state_discovery(&input.source, reason))?;
    info!("Multistate analysis of {} models in {}", model_count, input.source.display());

    let mut states = Vec::with_capacity(model_count as usize);
    for state in 1..=model_count {
        let result = analyze_state(config, input, Some(state), collab).map_err(|e| {
            error!("State {} of {} failed: {}", state, input.source.display(), e);
            e
        })?;
        states.push(result);
    }

    let table = PocketTable::concat(states.iter().map(|s| s.table.clone()).collect());
    let out_dir = config.output_root();
    fs::create_dir_all(&out_dir)?;
    let csv = out_dir.join(format!("{}_all_states_pocket_characteristics.csv", config.run_name(None)));
    table.write_csv(&csv)?;
    info!(
        "{} pockets across {} states ({} known)",
        table.len(),
        model_count,
        table.known_count()
    );

    Ok(AggregateResult { table, states, csv })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::ExistingOutputs;
    use crate::ligand::DeclineChooser;
    use crate::lookup::OfflineLookup;
    use crate::pipeline::tests::{write_outputs, RNA};
    use crate::render::{LoggingRenderer, RenderCall};
    use crate::structure::pdb::read_pdb;

    fn multi_model(n: u32) -> String {
        let mut text = format!("NUMMDL    {n}\n");
        for m in 1..=n {
            text.push_str(&format!("MODEL     {m:>4}\n"));
            text.push_str(RNA);
            text.push_str("ENDMDL\n");
        }
        text.push_str("END\n");
        text
    }

    #[test]
    fn three_states_keep_their_own_pocket_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("2xyz.pdb");
        fs::write(&input_path, multi_model(3)).unwrap();
        for s in 1..=3 {
            write_outputs(tmp.path(), &format!("2xyz_clean_state{s}"));
        }
        let config = AnalysisConfig {
            pdb: input_path.clone(),
            state: Some(0),
            ligand: Some("none".into()),
            output_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let input = read_pdb(&input_path, "pdb").unwrap();
        let lookup = OfflineLookup::default();
        let mut chooser = DeclineChooser;
        let mut renderer = LoggingRenderer::default();
        let mut collab = Collaborators {
            finder: &ExistingOutputs,
            lookup: &lookup,
            chooser: &mut chooser,
            renderer: &mut renderer,
        };

        let result = analyze_all_states(&config, &input, &mut collab).unwrap();
        assert_eq!(result.table.states(), vec![Some(1), Some(2), Some(3)]);
        assert_eq!(result.table.len(), 6);
        let ids: Vec<u32> = result.table.records.iter().map(|r| r.pocket_id).collect();
        assert_eq!(ids, vec![1, 2, 1, 2, 1, 2]);
        assert!(result.csv.ends_with("2xyz_all_states_pocket_characteristics.csv"));
        assert!(result.states[1].csv.ends_with("2xyz_state2_out_pocket_characteristics.csv"));

        let text = fs::read_to_string(&result.csv).unwrap();
        assert_eq!(text.lines().count(), 7);
        let resets = renderer.calls.iter().filter(|c| **c == RenderCall::Reset).count();
        let loads = renderer.calls.iter().filter(|c| matches!(c, RenderCall::Load(_))).count();
        assert_eq!(resets, loads);
    }

    #[test]
    fn missing_model_count_stops_before_any_state() {
        let tmp = tempfile::tempdir().unwrap();
        let input_path = tmp.path().join("1abc.pdb");
        fs::write(&input_path, RNA).unwrap();
        let config = AnalysisConfig {
            pdb: input_path.clone(),
            state: Some(0),
            output_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let input = read_pdb(&input_path, "pdb").unwrap();
        let lookup = OfflineLookup::default();
        let mut chooser = DeclineChooser;
        let mut renderer = LoggingRenderer::default();
        let mut collab = Collaborators {
            finder: &ExistingOutputs,
            lookup: &lookup,
            chooser: &mut chooser,
            renderer: &mut renderer,
        };

        let err = analyze_all_states(&config, &input, &mut collab).unwrap_err();
        assert!(matches!(err, PocketError::StateDiscovery { .. }));
        assert!(err.to_string().contains("1abc.pdb"));
        assert!(renderer.calls.is_empty());
    }
}
