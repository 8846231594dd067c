//! Loan lifecycle scenarios against in-memory collaborators

use std::time::Duration;

use rust_decimal::Decimal;
use tokio_test::{assert_err, assert_ok};

use elidune_circulation::{
    config::LoanPolicyConfig,
    models::{FineType, LoanStatus, ReturnCondition},
    AppError, ErrorKind, LoanError,
};

use crate::common::*;

#[tokio::test]
async fn test_checkout_sets_due_date_and_reserves_copy() {
    let lib = Library::new();

    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    assert_eq!(loan.member_id, M1);
    assert_eq!(loan.staff_id, LIBRARIAN);
    assert_eq!(loan.checkout_date, day(0));
    assert_eq!(loan.due_date, day(14));
    assert_eq!(loan.renewal_count, 0);
    assert!(lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_concurrent_checkouts_of_one_copy() {
    let lib = Library::new();

    let (first, second) = tokio::join!(
        lib.service.checkout(LIBRARIAN, C1, M1),
        lib.service.checkout(ADMIN, C1, M2),
    );

    let results = [first, second];
    let won = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::Conflict))
        .count();
    assert_eq!(won, 1);
    assert_eq!(conflicts, 1);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let lib = Library::new();

    let err = assert_err!(lib.service.checkout(M1, C1, M1).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = assert_err!(lib.service.checkout(LIBRARIAN, C1, BLOCKED).await);
    assert!(matches!(err, AppError::Loan(LoanError::MemberIneligible { .. })));

    let err = assert_err!(lib.service.checkout(LIBRARIAN, REFERENCE_ONLY, M1).await);
    assert!(matches!(err, AppError::Loan(LoanError::CopyUnavailable(REFERENCE_ONLY))));

    let err = assert_err!(lib.service.checkout(LIBRARIAN, 999, M1).await);
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = assert_err!(lib.service.checkout(LIBRARIAN, C1, 404).await);
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(!lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_member_loan_limit() {
    let lib = Library::with_policy(LoanPolicyConfig {
        max_active_loans: 1,
        ..LoanPolicyConfig::default()
    });

    assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    let err = assert_err!(lib.service.checkout(LIBRARIAN, C2, M1).await);

    assert!(matches!(
        err,
        AppError::Loan(LoanError::LoanLimitReached { current: 1, max: 1 })
    ));
    assert!(!lib.copies.copy(C2).on_loan);
}

#[tokio::test]
async fn test_concurrent_checkouts_respect_member_limit() {
    let lib = Library::with_policy(LoanPolicyConfig {
        max_active_loans: 1,
        ..LoanPolicyConfig::default()
    });

    let (first, second) = tokio::join!(
        lib.service.checkout(LIBRARIAN, C1, M1),
        lib.service.checkout(ADMIN, C2, M1),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(AppError::Loan(LoanError::LoanLimitReached { current: 1, max: 1 }))
    )));
    assert_eq!(lib.loans.open_for_member(M1), 1);
    assert_eq!(
        [C1, C2].iter().filter(|&&c| lib.copies.copy(c).on_loan).count(),
        1
    );
}

#[tokio::test]
async fn test_checkout_retry_after_slow_reservation() {
    let lib = Library::with_policy(LoanPolicyConfig {
        dependency_timeout_ms: 50,
        ..LoanPolicyConfig::default()
    });
    lib.copies.set_reserve_delay(Some(Duration::from_millis(300)));

    let err = assert_err!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    assert!(err.is_retryable());
    assert!(lib.copies.copy(C1).on_loan);
    assert_eq!(lib.loans.open_for_member(M1), 0);

    lib.copies.set_reserve_delay(None);
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    assert_eq!(loan.copy_id, C1);
    assert_eq!(lib.loans.open_for_member(M1), 1);
    assert!(lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_copy_left_flagged_by_failed_release_can_be_lent_again() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    lib.copies.set_release_offline(true);

    let outcome = assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Good).await);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("could not be released"));
    assert!(lib.copies.copy(C1).on_loan);

    lib.copies.set_release_offline(false);
    let next = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M2).await);
    assert_eq!(next.member_id, M2);
    assert!(lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_double_return_keeps_first_return_date() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    lib.at(3);
    assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Good).await);
    lib.at(4);
    let err = assert_err!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Good).await);

    assert!(matches!(err, AppError::Loan(LoanError::AlreadyReturned(_))));
    assert_eq!(lib.loans.stored(loan.id).return_date, Some(day(3)));
}

#[tokio::test]
async fn test_concurrent_returns_commit_once() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    lib.at(2);

    let (first, second) = tokio::join!(
        lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Damaged),
        lib.service.return_loan(ADMIN, loan.id, ReturnCondition::Damaged),
    );

    assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
    let err = match (first, second) {
        (Ok(_), Err(e)) | (Err(e), Ok(_)) => e,
        _ => panic!("exactly one return should win"),
    };
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(lib.ledger.fines().len(), 1);
    assert!(!lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_late_good_return_requests_overdue_calculation_only() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    lib.at(20);
    let outcome = assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Good).await);

    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert!(!outcome.loan.is_overdue);
    assert!(outcome.overdue_calculation_requested);
    assert!(outcome.fines.is_empty());
    assert!(outcome.warnings.is_empty());
    assert_eq!(lib.ledger.overdue_requests(), vec![loan.id]);
    assert!(lib.ledger.fines().is_empty());
}

#[tokio::test]
async fn test_damaged_return_on_time() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    lib.at(5);
    let outcome = assert_ok!(
        lib.service
            .return_loan(LIBRARIAN, loan.id, ReturnCondition::Damaged)
            .await
    );

    assert_eq!(outcome.fines.len(), 1);
    let fine = &outcome.fines[0];
    assert_eq!(fine.fine_type, FineType::Damaged);
    assert_eq!(fine.amount, Decimal::new(1000, 2));
    assert_eq!(fine.member_id, M1);
    assert_eq!(fine.description, "Damaged book: Dune");
    assert!(!outcome.overdue_calculation_requested);
    assert!(!lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_lost_return_charges_lost_fine_only() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C2, M1).await);

    lib.at(7);
    let outcome = assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Lost).await);

    let fines = lib.ledger.fines();
    assert_eq!(fines.len(), 1);
    assert_eq!(fines[0].fine_type, FineType::Lost);
    assert_eq!(fines[0].amount, Decimal::new(3000, 2));
    assert_eq!(outcome.fines, fines);
    assert_eq!(outcome.loan.return_condition, Some(ReturnCondition::Lost));
}

#[tokio::test]
async fn test_other_member_cannot_view_or_renew() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    let err = assert_err!(lib.service.get_loan(M2, loan.id).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = assert_err!(lib.service.renew(M2, loan.id, None).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = assert_err!(lib.service.return_loan(M1, loan.id, ReturnCondition::Good).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    assert_eq!(lib.loans.stored(loan.id).due_date, day(14));
    let view = assert_ok!(lib.service.get_loan(M1, loan.id).await);
    assert_eq!(view.status, LoanStatus::Active);
}

#[tokio::test]
async fn test_renewal_extends_from_later_of_due_date_and_now() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    lib.at(10);
    let renewed = assert_ok!(lib.service.renew(M1, loan.id, None).await);
    assert_eq!(renewed.due_date, day(28));
    assert_eq!(renewed.renewal_count, 1);
    assert_eq!(renewed.last_renewed_at, Some(day(10)));

    let err = assert_err!(lib.service.renew(LIBRARIAN, loan.id, Some(day(20))).await);
    assert_eq!(err.kind(), ErrorKind::Validation);

    let requested = day(40);
    let renewed = assert_ok!(lib.service.renew(LIBRARIAN, loan.id, Some(requested)).await);
    assert_eq!(renewed.due_date, requested);
    assert_eq!(renewed.renewal_count, 2);
}

#[tokio::test]
async fn test_renewal_limit() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    assert_ok!(lib.service.renew(M1, loan.id, None).await);
    assert_ok!(lib.service.renew(M1, loan.id, None).await);
    let err = assert_err!(lib.service.renew(M1, loan.id, None).await);

    assert!(matches!(
        err,
        AppError::Loan(LoanError::RenewalLimitExceeded { count: 2, max: 2 })
    ));
    assert_eq!(lib.loans.stored(loan.id).renewal_count, 2);
}

#[tokio::test]
async fn test_overdue_renewal_depends_on_grace_window() {
    let strict = Library::new();
    let loan = assert_ok!(strict.service.checkout(LIBRARIAN, C1, M1).await);
    strict.at(16);
    let err = assert_err!(strict.service.renew(M1, loan.id, None).await);
    assert!(matches!(
        err,
        AppError::Loan(LoanError::NotActive {
            status: LoanStatus::Overdue,
            ..
        })
    ));

    let lenient = Library::with_policy(LoanPolicyConfig {
        renewal_grace_days: 3,
        ..LoanPolicyConfig::default()
    });
    let loan = assert_ok!(lenient.service.checkout(LIBRARIAN, C1, M1).await);
    lenient.at(16);
    let renewed = assert_ok!(lenient.service.renew(M1, loan.id, None).await);
    assert_eq!(renewed.due_date, day(30));
}

#[tokio::test]
async fn test_renewal_after_return_is_rejected() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Good).await);

    let err = assert_err!(lib.service.renew(M1, loan.id, None).await);

    assert!(matches!(
        err,
        AppError::Loan(LoanError::NotActive {
            status: LoanStatus::Returned,
            ..
        })
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_declared_lost_loan_can_still_be_returned() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);

    let lost = assert_ok!(lib.service.declare_lost(LIBRARIAN, loan.id).await);
    assert!(lost.declared_lost);
    let view = assert_ok!(lib.service.get_loan(M1, loan.id).await);
    assert_eq!(view.status, LoanStatus::Lost);

    let err = assert_err!(lib.service.declare_lost(LIBRARIAN, loan.id).await);
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = assert_err!(lib.service.renew(M1, loan.id, None).await);
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let outcome = assert_ok!(lib.service.return_loan(LIBRARIAN, loan.id, ReturnCondition::Lost).await);
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
    assert!(!lib.copies.copy(C1).on_loan);
}

#[tokio::test]
async fn test_ledger_outage_does_not_undo_return() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    lib.ledger.set_offline(true);

    lib.at(20);
    let outcome = assert_ok!(
        lib.service
            .return_loan(LIBRARIAN, loan.id, ReturnCondition::Damaged)
            .await
    );

    assert_eq!(outcome.warnings.len(), 2);
    assert!(outcome.fines.is_empty());
    assert_eq!(lib.loans.stored(loan.id).return_date, Some(day(20)));
    assert!(!lib.copies.copy(C1).on_loan);

    lib.ledger.set_offline(false);
    let report = assert_ok!(lib.service.reassess_fines(LIBRARIAN, loan.id).await);
    assert!(report.warnings.is_empty());
    assert_eq!(report.fines.len(), 1);
    assert!(report.overdue_calculation_requested);
}

#[tokio::test]
async fn test_slow_ledger_times_out_into_warning() {
    let lib = Library::with_policy(LoanPolicyConfig {
        dependency_timeout_ms: 50,
        ..LoanPolicyConfig::default()
    });
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    lib.ledger.set_delay(Some(Duration::from_millis(500)));

    let outcome = assert_ok!(
        lib.service
            .return_loan(LIBRARIAN, loan.id, ReturnCondition::Damaged)
            .await
    );

    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("did not respond"));
    assert_eq!(outcome.loan.status, LoanStatus::Returned);
}

#[tokio::test]
async fn test_reassessing_returned_loan_is_idempotent() {
    let lib = Library::new();
    let loan = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    assert_ok!(
        lib.service
            .return_loan(LIBRARIAN, loan.id, ReturnCondition::Damaged)
            .await
    );

    let first = assert_ok!(lib.service.reassess_fines(LIBRARIAN, loan.id).await);
    let second = assert_ok!(lib.service.reassess_fines(ADMIN, loan.id).await);

    assert_eq!(first.fines, second.fines);
    assert_eq!(lib.ledger.fines().len(), 1);

    let err = assert_err!(lib.service.reassess_fines(M1, loan.id).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn test_history_and_overdue_listing() {
    let lib = Library::new();
    let first = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M1).await);
    lib.at(5);
    assert_ok!(lib.service.return_loan(LIBRARIAN, first.id, ReturnCondition::Good).await);
    lib.at(6);
    let second = assert_ok!(lib.service.checkout(LIBRARIAN, C2, M1).await);
    let other = assert_ok!(lib.service.checkout(LIBRARIAN, C1, M2).await);

    let history = assert_ok!(lib.service.member_history(M1, M1).await);
    let ids: Vec<i32> = history.iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let err = assert_err!(lib.service.member_history(M2, M1).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    lib.at(21);
    let overdue = assert_ok!(lib.service.list_overdue(LIBRARIAN).await);
    let ids: Vec<i32> = overdue.iter().map(|l| l.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&second.id) && ids.contains(&other.id));
    assert!(overdue.iter().all(|l| l.status == LoanStatus::Overdue));

    let err = assert_err!(lib.service.list_overdue(M1).await);
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
