use std::collections::BTreeSet;

use sitemaster_core::{MatchLink, RecordId};

use crate::error::EngineError;

/// Ids that survive a comparison as masters.
///
/// `(scope − (children ∪ link masters)) ∪ link masters`. Self links are
/// ignored. A link naming an id outside `scope` is an error.
pub fn resolve_masters(
    label: &str,
    scope: &BTreeSet<RecordId>,
    links: &[MatchLink],
) -> Result<BTreeSet<RecordId>, EngineError> {
    let mut children = BTreeSet::new();
    let mut link_masters = BTreeSet::new();

    for link in links.iter().filter(|l| !l.is_self()) {
        for id in [link.child_id, link.master_id] {
            if !scope.contains(&id) {
                return Err(EngineError::UnknownRecord {
                    scope: label.to_string(),
                    id,
                });
            }
        }
        children.insert(link.child_id);
        link_masters.insert(link.master_id);
    }

    let mut masters: BTreeSet<RecordId> = scope
        .iter()
        .filter(|id| !children.contains(id) && !link_masters.contains(id))
        .copied()
        .collect();
    masters.extend(link_masters);
    Ok(masters)
}
