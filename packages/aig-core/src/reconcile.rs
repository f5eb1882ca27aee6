//! Sub-element reconciliation (component E).
//!
//! One generic algorithm drives alias, resource, and edge list updates alike,
//! so the three kinds can't drift out of sync with each other. Given the
//! vertex's current list and the caller's desired update list:
//!
//! - an id present in the update list but absent (or already tombstoned)
//!   from the current list is appended as a brand-new, freshly-created
//!   element;
//! - an id present in both, still live, whose content differs from the
//!   update is updated in place (`updated` bumped to `now`);
//! - an id present in both, still live, whose content is unchanged is left
//!   untouched — no spurious `updated` bump, no patch noise;
//! - a live id absent from the update list is soft-deleted in place
//!   (`deleted` set to `now`); it is never removed from the list.
//!
//! Tombstones are retained forever: they remain in the returned list,
//! unions ordered by each lookup contributing to `final positions` — existing
//! entries keep their slot, new ones are appended at the end. This keeps the
//! vertex's `aliasIndex` stable for entries nobody touched.
use crate::model::SubElement;

/// Reconcile `current` against a desired `updates` list, returning the new
/// list (same element count or larger; never smaller, since tombstones stay).
pub fn reconcile<T: SubElement>(current: &[T], updates: &[T::Update], now: i64) -> Vec<T> {
    let mut result: Vec<T> = current.to_vec();
    let mut matched_update_ids: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for update in updates {
        let update_id = T::update_id(update);
        matched_update_ids.insert(update_id);

        let existing = result.iter_mut().find(|e| e.id() == update_id && e.deleted().is_none());
        match existing {
            Some(element) => {
                if element.content_differs(update) {
                    element.apply_update(update, now);
                }
            }
            None => {
                // Either this id has never been seen, or only tombstoned
                // copies of it exist — either way, a fresh element is
                // appended rather than resurrecting the old one.
                result.push(T::new_from(update, now));
            }
        }
    }

    for element in result.iter_mut() {
        if element.deleted().is_none() && !matched_update_ids.contains(element.id()) {
            element.mark_deleted(now);
        }
    }

    result
}
