//! Name resolution and presentation order for scoped registrations.
//!
//! Both store adapters load candidate rows and defer to these functions so
//! that precedence is decided in exactly one place.

use super::{OrgId, ServerName, ServerRegistration};
use std::cmp::Ordering;

/// Picks the registration a caller from `org_id` reaches under `name`.
///
/// An entry owned by the caller wins over any global entry, whatever the
/// owned entry's own `is_global` flag. Otherwise the global entry with that
/// name is returned.
#[must_use]
pub fn resolve_candidate(
    candidates: impl IntoIterator<Item = ServerRegistration>,
    name: &ServerName,
    org_id: Option<OrgId>,
) -> Option<ServerRegistration> {
    let mut global_match = None;
    for candidate in candidates {
        if candidate.name() != name {
            continue;
        }
        if candidate.scope().is_owned_by(org_id) {
            return Some(candidate);
        }
        if candidate.is_global() && global_match.is_none() {
            global_match = Some(candidate);
        }
    }
    global_match
}

/// Orders visible registrations by name, then caller-owned first, then id.
pub fn sort_for_presentation(registrations: &mut [ServerRegistration], org_id: Option<OrgId>) {
    registrations.sort_by(|left, right| presentation_order(left, right, org_id));
}

fn presentation_order(
    left: &ServerRegistration,
    right: &ServerRegistration,
    org_id: Option<OrgId>,
) -> Ordering {
    left.name()
        .cmp(right.name())
        .then_with(|| {
            let left_owned = left.scope().is_owned_by(org_id);
            let right_owned = right.scope().is_owned_by(org_id);
            right_owned.cmp(&left_owned)
        })
        .then_with(|| left.id().cmp(&right.id()))
}
