// Per-tool progress projection
//
// The backend only reports the one tool that is currently running. The
// state of every other selected tool is inferred from its rank in the
// selection order. This is a heuristic; replace it if the service starts
// reporting per-tool state.

use crate::models::{ToolId, ToolRuntimeStatus, ToolState};

/// Project per-tool state from the single "current tool" signal.
///
/// Tools ranked before the current one are complete, the current one is
/// running, the rest are idle. Returns `None` when the signal is absent or
/// names a tool outside the selection, in which case the caller keeps its
/// previous projection.
pub fn project_tool_states(
    selected: &[ToolId],
    current_tool: Option<&str>,
) -> Option<Vec<ToolRuntimeStatus>> {
    let current = current_tool?;
    let current_rank = selected.iter().position(|tool| tool.matches(current))?;

    Some(
        selected
            .iter()
            .enumerate()
            .map(|(rank, tool_id)| ToolRuntimeStatus {
                tool_id: tool_id.clone(),
                state: match rank.cmp(&current_rank) {
                    std::cmp::Ordering::Less => ToolState::Complete,
                    std::cmp::Ordering::Equal => ToolState::Running,
                    std::cmp::Ordering::Greater => ToolState::Idle,
                },
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tools(ids: &[&str]) -> Vec<ToolId> {
        ids.iter().map(|id| ToolId::from(*id)).collect()
    }

    fn states(projection: &[ToolRuntimeStatus]) -> Vec<ToolState> {
        projection.iter().map(|s| s.state).collect()
    }

    #[test]
    fn ranks_before_current_are_complete() {
        let selected = tools(&["Nmap", "OpenVAS", "Nikto", "Nuclei"]);
        let projection = project_tool_states(&selected, Some("Nikto")).expect("known tool");
        assert_eq!(
            states(&projection),
            [
                ToolState::Complete,
                ToolState::Complete,
                ToolState::Running,
                ToolState::Idle
            ]
        );
    }

    #[test]
    fn current_tool_match_ignores_case() {
        let selected = tools(&["Nmap", "Nuclei"]);
        let projection = project_tool_states(&selected, Some("nuclei")).expect("known tool");
        assert_eq!(states(&projection), [ToolState::Complete, ToolState::Running]);
    }

    #[test]
    fn missing_or_unknown_signal_keeps_previous_state() {
        let selected = tools(&["Nmap", "Nuclei"]);
        assert!(project_tool_states(&selected, None).is_none());
        assert!(project_tool_states(&selected, Some("Nessus")).is_none());
    }

    #[test]
    fn projection_covers_exactly_the_selection() {
        let selected = tools(&["Nessus", "Nmap"]);
        let projection = project_tool_states(&selected, Some("Nessus")).expect("known tool");
        let ids: Vec<&ToolId> = projection.iter().map(|s| &s.tool_id).collect();
        assert_eq!(ids, selected.iter().collect::<Vec<_>>());
    }
}
