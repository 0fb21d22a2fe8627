//! Version history behaviour across real workflow runs.

mod common;

use contentflow::model::{StepKind, VersionStatus};
use contentflow::versioning::FieldChange;
use contentflow::EngineError;

use common::{ContextBuilder, TestHarness, TEXT_STEPS};

/// Runs IDEA once and regenerates it `extra` times. Returns the job id.
fn job_with_idea_versions(h: &TestHarness, extra: usize) -> String {
    let result = h
        .engine
        .execute_content_workflow(ContextBuilder::new().build(), TEXT_STEPS)
        .unwrap();
    for i in 0..extra {
        h.engine
            .regenerate_workflow_step(&result.job_id, StepKind::Idea, &format!("attempt {}", i))
            .unwrap();
    }
    result.job_id
}

#[test]
fn test_version_numbers_are_gapless_with_one_active() {
    let h = TestHarness::funded(1_000);
    let job_id = job_with_idea_versions(&h, 3);

    let history = h.history(&job_id, StepKind::Idea);
    let numbers: Vec<i64> = history.versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![4, 3, 2, 1]);
    assert_eq!(history.versions.iter().filter(|v| v.is_active()).count(), 1);
    assert_eq!(history.current_version.unwrap().version, 4);
}

#[test]
fn test_activate_archives_the_others_and_is_idempotent() {
    let h = TestHarness::funded(1_000);
    let job_id = job_with_idea_versions(&h, 2);
    let versions = h.engine.versions();

    let oldest = h.history(&job_id, StepKind::Idea).versions[2].clone();
    assert_eq!(oldest.version, 1);

    versions.activate_version(&oldest.id).unwrap();
    let before = h.history(&job_id, StepKind::Idea);
    versions.activate_version(&oldest.id).unwrap();
    let after = h.history(&job_id, StepKind::Idea);

    for history in [&before, &after] {
        for version in &history.versions {
            let expected = if version.id == oldest.id {
                VersionStatus::Active
            } else {
                VersionStatus::Archived
            };
            assert_eq!(version.status, expected, "v{}", version.version);
        }
    }
    assert_eq!(after.current_version.unwrap().id, oldest.id);

    // the other steps are untouched
    assert!(h.history(&job_id, StepKind::CopyDesign).versions[0].is_active());
}

#[test]
fn test_delete_rules() {
    let h = TestHarness::funded(1_000);
    let job_id = job_with_idea_versions(&h, 1);
    let versions = h.engine.versions();
    let history = h.history(&job_id, StepKind::Idea);
    let (active, archived) = (&history.versions[0], &history.versions[1]);

    let err = versions.delete_version(&active.id).unwrap_err();
    assert!(matches!(err, EngineError::OperationNotAllowed(_)));

    let deleted = versions.delete_version(&archived.id).unwrap();
    assert_eq!(deleted.status, VersionStatus::Deleted);
    assert_eq!(h.history(&job_id, StepKind::Idea).len(), 1);
    assert_eq!(h.full_history(&job_id, StepKind::Idea).len(), 2);

    // deleted versions stay out of rotation
    let err = versions.activate_version(&archived.id).unwrap_err();
    assert!(matches!(err, EngineError::OperationNotAllowed(_)));
}

#[test]
fn test_compare_versions() {
    let h = TestHarness::funded(1_000);
    let job_id = job_with_idea_versions(&h, 1);
    let versions = h.engine.versions();
    let idea = h.history(&job_id, StepKind::Idea);
    let copy = h.history(&job_id, StepKind::CopyDesign);

    let same = versions
        .compare_versions(&idea.versions[0].id, &idea.versions[0].id)
        .unwrap();
    assert_eq!(same.similarity, 1.0);
    assert!(same.changes.is_empty());

    let diff = versions
        .compare_versions(&idea.versions[1].id, &idea.versions[0].id)
        .unwrap();
    assert_eq!(diff.changes.len(), 1);
    assert!(matches!(&diff.changes[0], FieldChange::Modified { field, .. } if field == "title"));
    assert!(diff.similarity > 0.9 && diff.similarity < 1.0);

    let err = versions
        .compare_versions(&idea.versions[0].id, &copy.versions[0].id)
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_list_job_versions_skips_deleted() {
    let h = TestHarness::funded(1_000);
    let job_id = job_with_idea_versions(&h, 1);
    let versions = h.engine.versions();
    assert_eq!(versions.list_job_versions(&job_id).unwrap().len(), 3);

    let archived = h.history(&job_id, StepKind::Idea).versions[1].id.clone();
    versions.delete_version(&archived).unwrap();
    assert_eq!(versions.list_job_versions(&job_id).unwrap().len(), 2);
}
