//! Diff Engine (component B).
//!
//! Computes a minimal, ordered RFC 6902 patch sequence transforming a prior
//! vertex snapshot into an updated one. Traversal order is deterministic
//! (object keys sorted, array indices in order), so two diffs over equal
//! inputs always emit an identical patch sequence — this is what keeps the
//! hash chain (component C) reproducible.
//!
//! Array handling operates at the finest stable granularity: elements are
//! compared positionally and diffed recursively (so a single changed field
//! inside an array element emits one `replace`/`add` at that field's path,
//! not a whole-array replace); new trailing elements are emitted as
//! `add` at `<path>/-`; elements removed from the tail are emitted as
//! `remove`, highest index first, so earlier removals don't shift the
//! indices of ops already queued.

use crate::patch::{append_pointer, PatchOp};
use serde_json::Value;

/// Diff `prior` against `updated`, returning the patch sequence that
/// transforms `prior` into `updated`.
///
/// Returns an empty vector when the two snapshots are identical.
pub fn diff(prior: &Value, updated: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at("", prior, updated, &mut ops);
    ops
}

fn diff_at(path: &str, prior: &Value, updated: &Value, ops: &mut Vec<PatchOp>) {
    if prior == updated {
        return;
    }
    match (prior, updated) {
        (Value::Object(prior_map), Value::Object(updated_map)) => {
            let mut keys: std::collections::BTreeSet<&String> = std::collections::BTreeSet::new();
            keys.extend(prior_map.keys());
            keys.extend(updated_map.keys());
            for key in keys {
                let child_path = append_pointer(path, key);
                match (prior_map.get(key), updated_map.get(key)) {
                    (Some(p), Some(u)) => diff_at(&child_path, p, u, ops),
                    (Some(_), None) => ops.push(PatchOp::Remove { path: child_path }),
                    (None, Some(u)) => ops.push(PatchOp::Add {
                        path: child_path,
                        value: u.clone(),
                    }),
                    (None, None) => unreachable!("key came from one of the two maps"),
                }
            }
        }
        (Value::Array(prior_items), Value::Array(updated_items)) => {
            let common = prior_items.len().min(updated_items.len());
            for i in 0..common {
                let child_path = append_pointer(path, &i.to_string());
                diff_at(&child_path, &prior_items[i], &updated_items[i], ops);
            }
            // New trailing elements: append in order.
            for item in &updated_items[common..] {
                ops.push(PatchOp::Add {
                    path: append_pointer(path, "-"),
                    value: item.clone(),
                });
            }
            // Elements dropped from the tail: remove highest index first so
            // earlier removals in this batch don't invalidate later paths.
            for i in (common..prior_items.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: append_pointer(path, &i.to_string()),
                });
            }
        }
        _ => {
            // Type mismatch or differing scalar: whole-value replace. The
            // root is always an object in practice (a vertex snapshot), so
            // this only fires for leaves and array elements.
            ops.push(PatchOp::Replace {
                path: path.to_string(),
                value: updated.clone(),
            });
        }
    }
}

/// Apply `patches` to `prior`, producing the resulting value.
///
/// Used by tests (and available to callers) to confirm that replaying a
/// changeset's patches against the prior snapshot reproduces the updated
/// snapshot.
pub fn apply(prior: &Value, patches: &[PatchOp]) -> Value {
    let mut current = prior.clone();
    for op in patches {
        apply_one(&mut current, op);
    }
    current
}

fn apply_one(root: &mut Value, op: &PatchOp) {
    match op {
        PatchOp::Add { path, value } => set_at(root, path, Some(value.clone()), true),
        PatchOp::Replace { path, value } => set_at(root, path, Some(value.clone()), false),
        PatchOp::Remove { path } => set_at(root, path, None, false),
    }
}

fn set_at(root: &mut Value, pointer: &str, value: Option<Value>, is_add: bool) {
    let segments: Vec<String> = pointer
        .trim_start_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(unescape_segment)
        .collect();
    set_recursive(root, &segments, value, is_add);
}

fn unescape_segment(seg: &str) -> String {
    seg.replace("~1", "/").replace("~0", "~")
}

fn set_recursive(current: &mut Value, segments: &[String], value: Option<Value>, is_add: bool) {
    if segments.is_empty() {
        return;
    }
    let (head, rest) = (&segments[0], &segments[1..]);
    if rest.is_empty() {
        match current {
            Value::Object(map) => match value {
                Some(v) => {
                    map.insert(head.clone(), v);
                }
                None => {
                    map.remove(head);
                }
            },
            Value::Array(items) => {
                if head == "-" {
                    if let Some(v) = value {
                        items.push(v);
                    }
                } else if let Ok(idx) = head.parse::<usize>() {
                    match value {
                        Some(v) if is_add => items.insert(idx.min(items.len()), v),
                        Some(v) => {
                            if idx < items.len() {
                                items[idx] = v;
                            }
                        }
                        None => {
                            if idx < items.len() {
                                items.remove(idx);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        return;
    }
    match current {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(head) {
                set_recursive(child, rest, value, is_add);
            }
        }
        Value::Array(items) => {
            if let Ok(idx) = head.parse::<usize>() {
                if let Some(child) = items.get_mut(idx) {
                    set_recursive(child, rest, value, is_add);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── 1. identical snapshots produce no ops ───────────────────────────

    #[test]
    fn no_change_is_empty() {
        let v = json!({"a": 1, "b": [1, 2, 3]});
        assert!(diff(&v, &v).is_empty());
    }

    // ── 2. scalar replace ────────────────────────────────────────────────

    #[test]
    fn scalar_replace() {
        let prior = json!({"updated": 1});
        let updated = json!({"updated": 2});
        let ops = diff(&prior, &updated);
        assert_eq!(ops, vec![PatchOp::Replace { path: "/updated".into(), value: json!(2) }]);
    }

    // ── 3. new key is an add, not a replace ─────────────────────────────

    #[test]
    fn new_key_is_add() {
        let prior = json!({});
        let updated = json!({"metadata": {"x": 1}});
        let ops = diff(&prior, &updated);
        assert_eq!(
            ops,
            vec![PatchOp::Add { path: "/metadata".into(), value: json!({"x": 1}) }]
        );
    }

    // ── 4. removed key is a remove ──────────────────────────────────────

    #[test]
    fn removed_key_is_remove() {
        let prior = json!({"metadataSchema": "x"});
        let updated = json!({});
        let ops = diff(&prior, &updated);
        assert_eq!(ops, vec![PatchOp::Remove { path: "/metadataSchema".into() }]);
    }

    // ── 5. nested scalar change emits one fine-grained op ───────────────

    #[test]
    fn nested_scalar_change_is_fine_grained() {
        let prior = json!({"metadata": {"object": {"content": "old"}}});
        let updated = json!({"metadata": {"object": {"content": "new"}}});
        let ops = diff(&prior, &updated);
        assert_eq!(
            ops,
            vec![PatchOp::Replace {
                path: "/metadata/object/content".into(),
                value: json!("new"),
            }]
        );
    }

    // ── 6. alias swap: tombstone in place + append new ──────────────────

    #[test]
    fn alias_swap_matches_spec_scenario_shape() {
        let prior = json!({
            "aliases": [
                {"id": "foo123", "created": 1},
                {"id": "bar456", "created": 1},
            ]
        });
        let updated = json!({
            "aliases": [
                {"id": "foo123", "created": 1, "deleted": 2},
                {"id": "bar456", "created": 1},
                {"id": "foo321", "created": 2},
            ]
        });
        let ops = diff(&prior, &updated);
        assert_eq!(
            ops,
            vec![
                PatchOp::Add { path: "/aliases/0/deleted".into(), value: json!(2) },
                PatchOp::Add {
                    path: "/aliases/-".into(),
                    value: json!({"id": "foo321", "created": 2}),
                },
            ]
        );
    }

    // ── 7. array shrink removes from the tail, highest index first ─────

    #[test]
    fn array_shrink_removes_from_tail() {
        let prior = json!({"xs": [1, 2, 3]});
        let updated = json!({"xs": [1]});
        let ops = diff(&prior, &updated);
        assert_eq!(
            ops,
            vec![
                PatchOp::Remove { path: "/xs/2".into() },
                PatchOp::Remove { path: "/xs/1".into() },
            ]
        );
    }

    // ── 8. apply() replays patches back to the updated snapshot ────────

    #[test]
    fn apply_replays_diff_to_updated_state() {
        let prior = json!({
            "created": 1,
            "updated": 1,
            "aliases": [{"id": "foo123", "created": 1}],
        });
        let updated = json!({
            "created": 1,
            "updated": 2,
            "aliases": [
                {"id": "foo123", "created": 1, "deleted": 2},
                {"id": "foo321", "created": 2},
            ],
        });
        let ops = diff(&prior, &updated);
        let replayed = apply(&prior, &ops);
        assert_eq!(replayed, updated);
    }

    // ── 9. determinism: repeated diffs over equal inputs match byte-for-byte ──

    #[test]
    fn diff_is_deterministic() {
        let prior = json!({"b": 1, "a": {"y": 1, "x": 2}});
        let updated = json!({"b": 2, "a": {"y": 1, "x": 3}});
        let first = diff(&prior, &updated);
        let second = diff(&prior, &updated);
        assert_eq!(first, second);
    }
}
