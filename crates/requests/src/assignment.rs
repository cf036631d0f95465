//! Buyer assignment of line items.
//!
//! A request's items are split across one or more buyers; the request may
//! only leave the assignment stage once every item is covered by exactly one
//! active assignment.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use procureflow_core::{AggregateId, DomainError, DomainResult, RecordStatus, UserId};

use crate::item::{ItemOrigin, LineItem};

/// Assignment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub AggregateId);

impl AssignmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Which items an assignment covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentScope {
    /// All current items of the request.
    Full,
    /// An explicit set of line numbers.
    Partial(BTreeSet<u32>),
}

/// Links a request to exactly one buyer for a given scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub buyer_id: UserId,
    pub scope: AssignmentScope,
    pub record_status: RecordStatus,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.record_status.is_active()
    }

    /// Line numbers this assignment covers, given the request's items.
    pub fn covered_lines(&self, items: &[LineItem]) -> BTreeSet<u32> {
        match &self.scope {
            AssignmentScope::Full => items.iter().map(|i| i.line_no).collect(),
            AssignmentScope::Partial(lines) => lines.clone(),
        }
    }
}

/// Coverage report for a request's assignment set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub complete: bool,
    /// Line numbers not covered by any active assignment, ascending.
    pub unassigned_line_nos: Vec<u32>,
}

/// Validate a prospective assignment against the current set.
///
/// - FULL requires that nothing else is actively assigned.
/// - PARTIAL requires a non-empty set of known line numbers, none of which is
///   already covered by another active assignment.
pub fn validate_new_assignment(
    items: &[LineItem],
    existing: &[Assignment],
    scope: &AssignmentScope,
) -> DomainResult<()> {
    let active: Vec<&Assignment> = existing.iter().filter(|a| a.is_active()).collect();

    match scope {
        AssignmentScope::Full => {
            if !active.is_empty() {
                return Err(DomainError::invariant(
                    "full-scope assignment requires no other active assignment",
                ));
            }
            Ok(())
        }
        AssignmentScope::Partial(lines) => {
            if lines.is_empty() {
                return Err(DomainError::validation(
                    "partial assignment requires at least one line item",
                ));
            }

            let known: BTreeSet<u32> = items.iter().map(|i| i.line_no).collect();
            if let Some(unknown) = lines.iter().find(|l| !known.contains(l)) {
                return Err(DomainError::validation(format!(
                    "line item {unknown} does not belong to the request"
                )));
            }

            let mut covered = BTreeSet::new();
            for a in &active {
                covered.extend(a.covered_lines(items));
            }
            if let Some(taken) = lines.iter().find(|l| covered.contains(l)) {
                return Err(DomainError::invariant(format!(
                    "line item {taken} is already assigned to another buyer"
                )));
            }
            Ok(())
        }
    }
}

/// Compute which items are covered by the active assignment set.
///
/// Overlapping active assignments cannot be produced through
/// `validate_new_assignment`; encountering one means a collaborator wrote
/// state directly and is treated as fatal.
pub fn coverage(items: &[LineItem], assignments: &[Assignment]) -> DomainResult<Coverage> {
    let mut covered: BTreeSet<u32> = BTreeSet::new();
    for a in assignments.iter().filter(|a| a.is_active()) {
        for line in a.covered_lines(items) {
            if !covered.insert(line) {
                return Err(DomainError::data_integrity(format!(
                    "line item {line} is covered by two active assignments"
                )));
            }
        }
    }

    let unassigned_line_nos: Vec<u32> = items
        .iter()
        .map(|i| i.line_no)
        .filter(|l| !covered.contains(l))
        .collect();

    Ok(Coverage {
        complete: unassigned_line_nos.is_empty(),
        unassigned_line_nos,
    })
}

/// Fail with the uncovered line numbers unless assignment is complete.
pub fn ensure_complete(items: &[LineItem], assignments: &[Assignment]) -> DomainResult<()> {
    let report = coverage(items, assignments)?;
    if !report.complete {
        return Err(DomainError::IncompleteAssignment(report.unassigned_line_nos));
    }
    Ok(())
}

/// A planned assignment; client conveniences below reduce to these, which in
/// turn reduce to repeated `AssignBuyer` commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPlan {
    pub buyer_id: UserId,
    pub scope: AssignmentScope,
}

/// Quick assignment: everything to one buyer.
pub fn plan_bulk(buyer_id: UserId) -> Vec<AssignmentPlan> {
    vec![AssignmentPlan {
        buyer_id,
        scope: AssignmentScope::Full,
    }]
}

/// Quick assignment: split by item origin (domestic vs overseas buyers).
///
/// Items of an origin with no items produce no plan entry.
pub fn plan_split_by_origin(
    items: &[LineItem],
    domestic_buyer: UserId,
    overseas_buyer: UserId,
) -> Vec<AssignmentPlan> {
    let domestic: BTreeSet<u32> = items
        .iter()
        .filter(|i| i.origin == ItemOrigin::Domestic)
        .map(|i| i.line_no)
        .collect();
    let overseas: BTreeSet<u32> = items
        .iter()
        .filter(|i| i.origin == ItemOrigin::Overseas)
        .map(|i| i.line_no)
        .collect();

    let mut plans = Vec::new();
    if !domestic.is_empty() {
        plans.push(AssignmentPlan {
            buyer_id: domestic_buyer,
            scope: AssignmentScope::Partial(domestic),
        });
    }
    if !overseas.is_empty() {
        plans.push(AssignmentPlan {
            buyer_id: overseas_buyer,
            scope: AssignmentScope::Partial(overseas),
        });
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use procureflow_core::Money;
    use proptest::prelude::*;

    fn item(line_no: u32, origin: ItemOrigin) -> LineItem {
        LineItem {
            line_no,
            description: format!("item {line_no}"),
            quantity: 1,
            unit_price: Money::vnd(1_000),
            manufacturer: None,
            origin,
        }
    }

    fn items3() -> Vec<LineItem> {
        vec![
            item(1, ItemOrigin::Domestic),
            item(2, ItemOrigin::Domestic),
            item(3, ItemOrigin::Overseas),
        ]
    }

    fn assignment(scope: AssignmentScope) -> Assignment {
        Assignment {
            id: AssignmentId::new(AggregateId::new()),
            buyer_id: UserId::new(),
            scope,
            record_status: RecordStatus::Active,
        }
    }

    #[test]
    fn full_assignment_covers_everything() {
        let items = items3();
        let assignments = vec![assignment(AssignmentScope::Full)];

        let report = coverage(&items, &assignments).unwrap();
        assert!(report.complete);
        assert!(report.unassigned_line_nos.is_empty());
    }

    #[test]
    fn partial_assignment_reports_the_uncovered_lines() {
        let items = items3();
        let assignments = vec![assignment(AssignmentScope::Partial(BTreeSet::from([1, 2])))];

        let report = coverage(&items, &assignments).unwrap();
        assert!(!report.complete);
        assert_eq!(report.unassigned_line_nos, vec![3]);
    }

    #[test]
    fn revoked_assignments_do_not_count() {
        let items = items3();
        let mut a = assignment(AssignmentScope::Full);
        a.record_status = RecordStatus::Deleted;

        let report = coverage(&items, &[a]).unwrap();
        assert!(!report.complete);
        assert_eq!(report.unassigned_line_nos, vec![1, 2, 3]);
    }

    #[test]
    fn double_assignment_is_rejected_at_assign_time() {
        let items = items3();
        let existing = vec![assignment(AssignmentScope::Partial(BTreeSet::from([1, 2])))];

        let err = validate_new_assignment(
            &items,
            &existing,
            &AssignmentScope::Partial(BTreeSet::from([2, 3])),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn unknown_line_is_rejected() {
        let items = items3();
        let err = validate_new_assignment(
            &items,
            &[],
            &AssignmentScope::Partial(BTreeSet::from([7])),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_partial_scope_is_rejected() {
        let err = validate_new_assignment(
            &items3(),
            &[],
            &AssignmentScope::Partial(BTreeSet::new()),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_after_partial_is_rejected() {
        let items = items3();
        let existing = vec![assignment(AssignmentScope::Partial(BTreeSet::from([1])))];
        let err = validate_new_assignment(&items, &existing, &AssignmentScope::Full).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn overlap_in_stored_state_is_a_data_integrity_violation() {
        let items = items3();
        let assignments = vec![
            assignment(AssignmentScope::Partial(BTreeSet::from([1, 2]))),
            assignment(AssignmentScope::Partial(BTreeSet::from([2, 3]))),
        ];
        let err = coverage(&items, &assignments).unwrap_err();
        assert!(matches!(err, DomainError::DataIntegrity(_)));
    }

    #[test]
    fn bulk_plan_is_a_single_full_assignment() {
        let items = items3();
        let buyer = UserId::new();

        let plans = plan_bulk(buyer);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].scope, AssignmentScope::Full);

        validate_new_assignment(&items, &[], &plans[0].scope).unwrap();
        let assignments = vec![Assignment {
            id: AssignmentId::new(AggregateId::new()),
            buyer_id: plans[0].buyer_id,
            scope: plans[0].scope.clone(),
            record_status: RecordStatus::Active,
        }];
        assert!(coverage(&items, &assignments).unwrap().complete);
    }

    #[test]
    fn split_by_origin_partitions_the_items() {
        let items = items3();
        let domestic = UserId::new();
        let overseas = UserId::new();

        let plans = plan_split_by_origin(&items, domestic, overseas);
        assert_eq!(plans.len(), 2);
        assert_eq!(
            plans[0].scope,
            AssignmentScope::Partial(BTreeSet::from([1, 2]))
        );
        assert_eq!(plans[1].scope, AssignmentScope::Partial(BTreeSet::from([3])));

        // The plans reduce to repeated assigns that end up complete.
        let mut assignments = Vec::new();
        for plan in plans {
            validate_new_assignment(&items, &assignments, &plan.scope).unwrap();
            assignments.push(Assignment {
                id: AssignmentId::new(AggregateId::new()),
                buyer_id: plan.buyer_id,
                scope: plan.scope,
                record_status: RecordStatus::Active,
            });
        }
        assert!(coverage(&items, &assignments).unwrap().complete);
    }

    proptest! {
        /// Property: coverage is complete iff every line number appears in
        /// exactly one active assignment.
        #[test]
        fn complete_iff_every_line_covered_once(
            n_items in 1u32..12,
            mask in prop::collection::vec(any::<bool>(), 12),
        ) {
            let items: Vec<LineItem> =
                (1..=n_items).map(|l| item(l, ItemOrigin::Domestic)).collect();

            // Assign a subset of lines, one single-line assignment each.
            let assigned: BTreeSet<u32> = (1..=n_items)
                .filter(|l| mask[(*l as usize - 1) % mask.len()])
                .collect();
            let assignments: Vec<Assignment> = assigned
                .iter()
                .map(|l| assignment(AssignmentScope::Partial(BTreeSet::from([*l]))))
                .collect();

            let report = coverage(&items, &assignments).unwrap();
            prop_assert_eq!(report.complete, assigned.len() == n_items as usize);

            let expected_missing: Vec<u32> =
                (1..=n_items).filter(|l| !assigned.contains(l)).collect();
            prop_assert_eq!(report.unassigned_line_nos, expected_missing);
        }
    }
}
