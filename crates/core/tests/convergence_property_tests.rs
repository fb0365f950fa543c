//! Property-based integration tests for cache convergence.
//!
//! These tests drive a window's reconciler with random event sequences and
//! check it against a plain map holding the last operation per entity.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use winsync_core::cache::CacheReconciler;
use winsync_core::events::ChangeEvent;
use winsync_core::http_requests::HttpRequest;
use winsync_core::models::DeletedModelRef;
use winsync_core::{AnyModel, Model, ModelKind, WindowId};

// =============================================================================
// Generators
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Upsert {
        id: String,
        workspace_id: String,
        name: String,
        origin: Option<String>,
    },
    Delete {
        id: String,
    },
}

/// Ids are drawn from a small pool so sequences revisit the same entities.
fn arb_id() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|n| format!("rq_{}", n))
}

fn arb_origin() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("main_0".to_string())),
        Just(Some("main_1".to_string())),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (arb_id(), (0u8..3), "[a-z]{1,8}", arb_origin()).prop_map(
            |(id, ws, name, origin)| Op::Upsert {
                id,
                workspace_id: format!("wk_{}", ws),
                name,
                origin,
            }
        ),
        1 => arb_id().prop_map(|id| Op::Delete { id }),
    ]
}

fn to_event(op: &Op) -> ChangeEvent {
    match op {
        Op::Upsert {
            id,
            workspace_id,
            name,
            origin,
        } => ChangeEvent::upsert(AnyModel::HttpRequest(HttpRequest {
            id: id.clone(),
            workspace_id: workspace_id.clone(),
            name: name.clone(),
            updated_by: origin.clone(),
            ..Default::default()
        })),
        Op::Delete { id } => ChangeEvent::delete(DeletedModelRef::new(ModelKind::HttpRequest, id)),
    }
}

/// Last operation per id, applied to an ordinary map.
fn expected_state(ops: &[Op]) -> BTreeMap<String, (String, String)> {
    let mut state = BTreeMap::new();
    for op in ops {
        match op {
            Op::Upsert {
                id,
                workspace_id,
                name,
                ..
            } => {
                state.insert(id.clone(), (workspace_id.clone(), name.clone()));
            }
            Op::Delete { id } => {
                state.remove(id);
            }
        }
    }
    state
}

fn cached_state(reconciler: &CacheReconciler) -> BTreeMap<String, (String, String)> {
    reconciler
        .read_all_as::<HttpRequest>()
        .into_iter()
        .map(|r| (r.id, (r.workspace_id, r.name)))
        .collect()
}

fn reconciler() -> CacheReconciler {
    CacheReconciler::new(WindowId::new("main_0"))
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    /// After any sequence, the cache holds exactly the last upsert of every
    /// entity whose last operation was not a delete.
    #[test]
    fn prop_cache_converges_to_last_operation(ops in prop::collection::vec(arb_op(), 0..60)) {
        let reconciler = reconciler();
        for op in &ops {
            reconciler.apply_event(to_event(op));
        }

        prop_assert_eq!(cached_state(&reconciler), expected_state(&ops));
    }

    /// Applying every delete a second time changes nothing.
    #[test]
    fn prop_deletes_are_idempotent(ops in prop::collection::vec(arb_op(), 0..60)) {
        let reconciler = reconciler();
        for op in &ops {
            reconciler.apply_event(to_event(op));
            if let Op::Delete { .. } = op {
                reconciler.apply_event(to_event(op));
            }
        }

        prop_assert_eq!(cached_state(&reconciler), expected_state(&ops));
    }

    /// Group reads agree with filtering every cached request by workspace,
    /// including after requests move between workspaces.
    #[test]
    fn prop_group_index_matches_values(ops in prop::collection::vec(arb_op(), 0..60)) {
        let reconciler = reconciler();
        for op in &ops {
            reconciler.apply_event(to_event(op));
        }

        let all = reconciler.read_all(ModelKind::HttpRequest);
        let workspaces: HashSet<String> = (0..3).map(|n| format!("wk_{}", n)).collect();
        for workspace_id in &workspaces {
            let mut grouped: Vec<String> = reconciler
                .read_group(ModelKind::HttpRequest, workspace_id)
                .iter()
                .map(|m| m.id().to_string())
                .collect();
            grouped.sort();

            let mut filtered: Vec<String> = all
                .iter()
                .filter(|m| m.group_key() == Some(workspace_id.as_str()))
                .map(|m| m.id().to_string())
                .collect();
            filtered.sort();

            prop_assert_eq!(grouped, filtered);
        }
    }

    /// Replaying the same sequence in two windows yields identical caches.
    #[test]
    fn prop_windows_agree_on_same_stream(ops in prop::collection::vec(arb_op(), 0..60)) {
        let first = CacheReconciler::new(WindowId::new("main_0"));
        let second = CacheReconciler::new(WindowId::new("main_1"));
        for op in &ops {
            first.apply_event(to_event(op));
            second.apply_event(to_event(op));
        }

        prop_assert_eq!(cached_state(&first), cached_state(&second));
    }
}
