//! Branch name derivation.

/// Derive the working branch name for a team/leader pair.
///
/// Both names are uppercased, every character outside `[A-Z0-9 ]` is
/// stripped, spaces become underscores, and the parts are joined as
/// `{TEAM}_{LEADER}_AI_Fix`. The derivation is deterministic, so the same
/// pair always maps to the same branch.
#[must_use]
pub fn derive_branch_name(team_name: &str, leader_name: &str) -> String {
    format!(
        "{}_{}_AI_Fix",
        sanitize_name(team_name),
        sanitize_name(leader_name)
    )
}

fn sanitize_name(name: &str) -> String {
    name.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == ' ')
        .collect::<String>()
        .replace(' ', "_")
}
