//! Update planning.
//!
//! Pure graph work over the caller's inverse dependency map: nothing here
//! touches a factory. Two checks decide whether the commit may start:
//!
//! 1. Every unit reachable from the edit is ordered topologically. A cycle
//!    anywhere in that subgraph makes a safe order impossible.
//! 2. Every path from the edit must pass through a boundary known without
//!    running anything (an explicit accept or a recorded signature) before
//!    it reaches a root.

use rustc_hash::FxHashSet;
use thiserror::Error;

use super::{FullReloadReason, InverseDependencyMap};
use crate::unit::UnitId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(super) enum PlanError {
    #[error("dependency cycle through {}", .0.first().map(ToString::to_string).unwrap_or_default())]
    Cycle(Vec<UnitId>),

    #[error("{unit} reaches root {root} without a boundary")]
    NoRootBoundary { unit: UnitId, root: UnitId },
}

impl From<PlanError> for FullReloadReason {
    fn from(error: PlanError) -> Self {
        match error {
            PlanError::Cycle(chain) => Self::DependencyCycle { chain },
            PlanError::NoRootBoundary { unit, root } => Self::NoRootBoundary { unit, root },
        }
    }
}

/// Order the units reachable from `start`, dependencies first, and check
/// that the update is bounded.
pub(super) fn plan_update(
    start: &UnitId,
    inverse: &InverseDependencyMap,
    is_boundary: impl Fn(&UnitId) -> bool,
) -> Result<Vec<UnitId>, PlanError> {
    let order = topological_order(start, inverse)?;
    check_boundaries(start, inverse, is_boundary)?;
    Ok(order)
}

/// Reverse postorder of an iterative depth-first walk along dependents.
fn topological_order(
    start: &UnitId,
    inverse: &InverseDependencyMap,
) -> Result<Vec<UnitId>, PlanError> {
    let mut finished = Vec::new();
    let mut visited = FxHashSet::default();
    let mut on_path = FxHashSet::default();
    // (unit, index of the next dependent to visit)
    let mut path: Vec<(UnitId, usize)> = Vec::new();

    visited.insert(start.clone());
    on_path.insert(start.clone());
    path.push((start.clone(), 0));

    loop {
        let Some((unit, next)) = path.last_mut() else {
            break;
        };
        let dependent = inverse.dependents(unit).get(*next).cloned();
        *next += 1;

        let Some(dependent) = dependent else {
            if let Some((done, _)) = path.pop() {
                on_path.remove(&done);
                finished.push(done);
            }
            continue;
        };

        if on_path.contains(&dependent) {
            let from = path
                .iter()
                .position(|(unit, _)| *unit == dependent)
                .unwrap_or_default();
            let mut chain: Vec<UnitId> =
                path[from..].iter().map(|(unit, _)| unit.clone()).collect();
            chain.push(dependent);
            return Err(PlanError::Cycle(chain));
        }

        if visited.insert(dependent.clone()) {
            on_path.insert(dependent.clone());
            path.push((dependent, 0));
        }
    }

    finished.reverse();
    Ok(finished)
}

/// Walk dependents from `start`, stopping at boundaries.
fn check_boundaries(
    start: &UnitId,
    inverse: &InverseDependencyMap,
    is_boundary: impl Fn(&UnitId) -> bool,
) -> Result<(), PlanError> {
    let mut seen = FxHashSet::default();
    let mut stack = vec![start.clone()];
    seen.insert(start.clone());

    while let Some(unit) = stack.pop() {
        if is_boundary(&unit) {
            continue;
        }
        let dependents = inverse.dependents(&unit);
        if dependents.is_empty() {
            return Err(PlanError::NoRootBoundary {
                unit: start.clone(),
                root: unit,
            });
        }
        for dependent in dependents {
            if seen.insert(dependent.clone()) {
                stack.push(dependent.clone());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(u32, &[u32])]) -> InverseDependencyMap {
        edges
            .iter()
            .map(|&(id, dependents)| (id, dependents.iter().copied()))
            .collect()
    }

    fn ids(raw: &[u32]) -> Vec<UnitId> {
        raw.iter().copied().map(UnitId::from).collect()
    }

    fn position(order: &[UnitId], id: u32) -> usize {
        order
            .iter()
            .position(|unit| *unit == UnitId::from(id))
            .unwrap()
    }

    #[test]
    fn test_order_puts_dependencies_first() {
        // 0 <- 1 <- 3, 0 <- 2 <- 3
        let inverse = graph(&[(0, &[1, 2]), (1, &[3]), (2, &[3])]);

        let order = plan_update(&UnitId::from(0), &inverse, |_| true).unwrap();

        assert_eq!(order.len(), 4);
        assert_eq!(order[0], UnitId::from(0));
        assert!(position(&order, 1) < position(&order, 3));
        assert!(position(&order, 2) < position(&order, 3));
    }

    #[test]
    fn test_cycle_is_rejected_with_chain() {
        let inverse = graph(&[(0, &[1]), (1, &[2]), (2, &[1])]);

        let err = plan_update(&UnitId::from(0), &inverse, |_| true).unwrap_err();
        assert_eq!(err, PlanError::Cycle(ids(&[1, 2, 1])));
    }

    #[test]
    fn test_cycle_past_a_boundary_is_still_rejected() {
        let inverse = graph(&[(0, &[1]), (1, &[2]), (2, &[1])]);

        let boundary = UnitId::from(1);
        let err = plan_update(&UnitId::from(0), &inverse, |unit| *unit == boundary).unwrap_err();
        assert!(matches!(err, PlanError::Cycle(_)));
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let inverse = graph(&[(0, &[0])]);

        let err = plan_update(&UnitId::from(0), &inverse, |_| true).unwrap_err();
        assert_eq!(err, PlanError::Cycle(ids(&[0, 0])));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let inverse = graph(&[(0, &[1, 2]), (1, &[3]), (2, &[3]), (3, &[])]);

        assert!(plan_update(&UnitId::from(0), &inverse, |_| true).is_ok());
    }

    #[test]
    fn test_unbounded_path_is_rejected() {
        // 2 accepts, but 0 also reaches root 3 through 1
        let inverse = graph(&[(0, &[1, 2]), (1, &[3]), (2, &[3])]);

        let boundary = UnitId::from(2);
        let err = plan_update(&UnitId::from(0), &inverse, |unit| *unit == boundary).unwrap_err();
        assert_eq!(
            err,
            PlanError::NoRootBoundary {
                unit: UnitId::from(0),
                root: UnitId::from(3),
            }
        );
    }

    #[test]
    fn test_edited_root_without_boundary() {
        let inverse = InverseDependencyMap::new();

        let err = plan_update(&UnitId::from(5), &inverse, |_| false).unwrap_err();
        assert!(matches!(
            err,
            PlanError::NoRootBoundary { ref root, .. } if *root == UnitId::from(5)
        ));
    }

    #[test]
    fn test_plan_error_into_reason() {
        let reason = FullReloadReason::from(PlanError::Cycle(ids(&[1, 2, 1])));
        assert_eq!(reason.to_string(), "dependency cycle: 1 -> 2 -> 1");
    }
}
