//! Prepaid balance and ledger behaviour through the engine.

mod common;

use contentflow::model::{ImageQuality, JobStatus, LedgerEntryType, StepKind};
use contentflow::EngineError;

use common::{ConfigBuilder, ContextBuilder, TestHarness, AGENCY, TEXT_STEPS};

#[test]
fn test_ledger_sums_to_balance_after_mixed_activity() {
    let h = TestHarness::funded(200);
    let meter = h.engine.meter();

    let result = h
        .engine
        .execute_content_workflow(ContextBuilder::new().build(), TEXT_STEPS)
        .unwrap();
    h.engine
        .regenerate_workflow_step(&result.job_id, StepKind::CopyDesign, "shorter")
        .unwrap();
    meter
        .credit(AGENCY, 5, LedgerEntryType::Refund, "goodwill", Some(&result.job_id))
        .unwrap();
    meter
        .credit(AGENCY, -3, LedgerEntryType::Adjustment, "correction", None)
        .unwrap();

    let ledger = h.ledger(AGENCY);
    let sum: i64 = ledger.iter().map(|e| e.amount).sum();
    assert_eq!(sum, h.balance(AGENCY));
    assert_eq!(h.balance(AGENCY), 200 - 10 - 15 - 15 + 5 - 3);

    // balance_after is a running total
    let mut running = 0;
    for entry in &ledger {
        running += entry.amount;
        assert_eq!(entry.balance_after, running);
    }
}

#[test]
fn test_usage_entries_point_at_versions() {
    let h = TestHarness::funded(100);
    let result = h
        .engine
        .execute_content_workflow(ContextBuilder::new().build(), TEXT_STEPS)
        .unwrap();

    let usage = h.usage_entries(AGENCY);
    assert_eq!(usage.len(), 2);
    for (entry, step) in usage.iter().zip(TEXT_STEPS) {
        let version = result.step(*step).unwrap().version.as_ref().unwrap();
        assert_eq!(entry.reference.as_deref(), Some(version.id.as_str()));
        assert!(entry.amount < 0);
        let metadata = entry.metadata.as_ref().unwrap();
        assert_eq!(metadata["job_id"], result.job_id.as_str());
        assert_eq!(metadata["step"], step.as_str());
        assert_eq!(-entry.amount, version.metadata.billed_cost);
    }
}

#[test]
fn test_configured_prices_are_charged() {
    let config = ConfigBuilder::new()
        .step_price(StepKind::Idea, 3)
        .step_price(StepKind::CopyDesign, 4)
        .image_tier(ImageQuality::Standard, 7)
        .build();
    let h = TestHarness::with_config(config);
    h.fund(AGENCY, 100);

    let context = ContextBuilder::new()
        .images(3, ImageQuality::Standard)
        .build();
    let steps = [StepKind::Idea, StepKind::CopyDesign, StepKind::BaseImage];
    let result = h.engine.execute_content_workflow(context, &steps).unwrap();

    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.total_cost, 3 + 4 + 7 * 3);
    assert_eq!(h.balance(AGENCY), 100 - 28);
}

#[test]
fn test_exact_balance_is_enough() {
    let h = TestHarness::funded(25);
    let result = h
        .engine
        .execute_content_workflow(ContextBuilder::new().build(), TEXT_STEPS)
        .unwrap();
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(h.balance(AGENCY), 0);

    // nothing left for a regeneration
    let err = h
        .engine
        .regenerate_workflow_step(&result.job_id, StepKind::Idea, "again")
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientBalance { .. }));
    assert_eq!(h.history(&result.job_id, StepKind::Idea).len(), 1);
    assert_eq!(h.balance(AGENCY), 0);
}

#[test]
fn test_balances_are_per_agency() {
    let h = TestHarness::funded(100);
    h.fund("agency-2", 10);

    let context = ContextBuilder::new().agency("agency-2").build();
    let result = h.engine.execute_content_workflow(context, TEXT_STEPS).unwrap();

    // IDEA fits, COPY_DESIGN does not
    assert_eq!(result.status, JobStatus::Failed);
    assert_eq!(h.balance("agency-2"), 0);
    assert_eq!(h.balance(AGENCY), 100);
    assert!(h.usage_entries(AGENCY).is_empty());
}

#[test]
fn test_credit_rejects_invalid_entries() {
    let h = TestHarness::new();
    let meter = h.engine.meter();

    let cases = [
        (LedgerEntryType::Usage, 10),
        (LedgerEntryType::Purchase, 0),
        (LedgerEntryType::Refund, -5),
        (LedgerEntryType::Adjustment, 0),
    ];
    for (entry_type, amount) in cases {
        let result = meter.credit(AGENCY, amount, entry_type, "bad", None);
        assert!(result.is_err(), "{} {}", entry_type, amount);
    }
    assert!(h.ledger(AGENCY).is_empty());
}
