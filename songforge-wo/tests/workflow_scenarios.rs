//! End-to-end orchestrator scenarios against a scripted fake sidecar

mod helpers;

use helpers::{generated, ok, request, unresolved, AttemptScript, FakeSidecar, Harness, Review};
use songforge_common::events::{CandidatePosition, SongforgeEvent, Verdict};
use songforge_wo::models::{CandidateStage, GenerationStatus, WorkflowErrorKind};
use songforge_wo::services::{ArtifactName, MAX_ATTEMPTS};
use tokio_util::sync::CancellationToken;

fn all_reroll(a: &str, b: &str) -> AttemptScript {
    generated(ok(a, Review::ReRoll), ok(b, Review::ReRoll))
}

#[tokio::test]
async fn test_happy_path_keeps_continue_and_deletes_reroll() {
    let h = Harness::scripted(vec![generated(
        ok("song-1", Review::Continue),
        ok("song-2", Review::ReRoll),
    )]);

    let result = h
        .orchestrator
        .run(&request("The Lord Is My Shepherd"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.total_attempts, 1);
    assert_eq!(result.kept_count, 1);
    assert_eq!(result.re_rolled_count, 1);
    assert_eq!(result.preserved_count, 0);
    assert!(result.error.is_none());
    assert_eq!(result.message, "Workflow succeeded cleanly");

    // Candidate 2 deleted locally and remotely
    assert_eq!(h.sidecar.deleted(), vec!["song-2".to_string()]);
    assert!(h.pending_files().is_empty());

    let finals = h.final_files();
    assert_eq!(finals.len(), 1);
    assert_eq!(result.final_artifacts.len(), 1);
    let name = ArtifactName::parse(&finals[0]).unwrap();
    assert_eq!(name.slug, "the-lord-is-my-shepherd");
    assert_eq!(name.song_id, "song-1");
    assert_eq!(name.extension, "mp3");

    let second = &result.attempts[0].candidates[1];
    assert_eq!(second.stage, CandidateStage::Deleted);
    let deletion = second.deletion.as_ref().unwrap();
    assert!(deletion.local_deleted && deletion.remote_deleted);
}

#[tokio::test]
async fn test_full_retry_cycle_preserves_last_attempt() {
    let h = Harness::scripted(vec![
        all_reroll("a1", "a2"),
        all_reroll("b1", "b2"),
        all_reroll("c1", "c2"),
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.total_attempts, 3);
    assert_eq!(result.kept_count, 0);
    assert_eq!(result.re_rolled_count, 6);
    assert_eq!(result.preserved_count, 2);
    assert!(result.error.is_none());
    assert!(result.message.starts_with("Exhausted 3 attempts"));

    // Attempts 1 and 2 deleted, attempt 3 untouched
    assert_eq!(h.sidecar.deleted(), vec!["a1", "a2", "b1", "b2"]);
    let finals = h.final_files();
    assert_eq!(finals.len(), 2);
    assert!(finals.iter().any(|f| f.contains("_c1_")));
    assert!(finals.iter().any(|f| f.contains("_c2_")));
    assert!(h.pending_files().is_empty());

    assert!(result.attempts[2]
        .candidates
        .iter()
        .all(|c| c.stage == CandidateStage::PreservedFailSafe && c.deletion.is_none()));
}

#[tokio::test]
async fn test_download_failure_with_continue() {
    let h = Harness::scripted(vec![generated(
        helpers::Download::Fail,
        ok("song-2", Review::Continue),
    )]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.total_attempts, 1);
    assert_eq!(result.kept_count, 1);
    assert_eq!(h.sidecar.downloads(), 2);
    assert_eq!(h.sidecar.reviews(), 1);
    assert!(h.sidecar.deleted().is_empty());

    let first = &result.attempts[0].candidates[0];
    assert_eq!(first.stage, CandidateStage::DownloadFailed);
    assert_eq!(first.effective_verdict(), Verdict::Error);
    assert!(first.deletion.is_none());
}

#[tokio::test]
async fn test_reroll_without_identifier_is_fatal() {
    let h = Harness::scripted(vec![
        generated(unresolved(Review::ReRoll), ok("song-2", Review::ReRoll)),
        all_reroll("never", "used"),
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.total_attempts, 1);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::MissingIdentifier));
    assert_eq!(h.sidecar.generations(), 1);

    // Nothing deleted; both candidates survive in final storage
    assert!(h.sidecar.deleted().is_empty());
    let finals = h.final_files();
    assert_eq!(finals.len(), 2);
    assert!(finals.iter().any(|f| f.contains("_unresolved-")));
}

#[tokio::test]
async fn test_reroll_without_identifier_in_success_branch_is_fatal() {
    let h = Harness::scripted(vec![generated(
        ok("song-1", Review::Continue),
        unresolved(Review::ReRoll),
    )]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::MissingIdentifier));
    assert!(h.sidecar.deleted().is_empty());
    assert_eq!(result.kept_count, 1);
    assert_eq!(result.preserved_count, 1);
    assert_eq!(h.final_files().len(), 2);
}

#[tokio::test]
async fn test_generation_failure_then_success() {
    let h = Harness::scripted(vec![
        AttemptScript::GenerationFails,
        generated(ok("s1", Review::Continue), ok("s2", Review::Continue)),
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.total_attempts, 2);
    assert_eq!(result.kept_count, 2);
    assert_eq!(result.message, "Workflow succeeded after 2 attempts");
    assert!(matches!(
        result.attempts[0].generation,
        GenerationStatus::Failed(_)
    ));
    // Candidates only exist for successful generations
    assert_eq!(result.candidates_created(), 2);
}

#[tokio::test]
async fn test_generation_failure_on_every_attempt() {
    let h = Harness::scripted(vec![
        AttemptScript::GenerationFails,
        AttemptScript::GenerationFails,
        AttemptScript::GenerationFails,
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.total_attempts, 3);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::GenerationFailure));
    assert_eq!(h.sidecar.downloads(), 0);
    assert!(h.final_files().is_empty());
}

#[tokio::test]
async fn test_attempts_never_exceed_maximum() {
    let script = (0..5).map(|i| all_reroll(&format!("x{i}"), &format!("y{i}"))).collect();
    let h = Harness::scripted(script);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert_eq!(result.total_attempts, MAX_ATTEMPTS);
    assert_eq!(h.sidecar.generations(), MAX_ATTEMPTS);
}

#[tokio::test]
async fn test_retry_deletes_error_candidates_best_effort() {
    let h = Harness::scripted(vec![
        generated(ok("a1", Review::ReRoll), unresolved(Review::Fail)),
        generated(ok("b1", Review::Continue), ok("b2", Review::ReRoll)),
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.total_attempts, 2);
    assert_eq!(result.re_rolled_count, 2);
    // Unresolved error candidate removed locally only
    assert_eq!(h.sidecar.deleted(), vec!["a1", "b2"]);

    let errored = &result.attempts[0].candidates[1];
    assert_eq!(errored.stage, CandidateStage::Deleted);
    assert!(errored.failure.is_some());
    let deletion = errored.deletion.as_ref().unwrap();
    assert!(deletion.local_deleted);
    assert!(!deletion.remote_attempted);

    assert_eq!(h.final_files().len(), 1);
    assert!(h.pending_files().is_empty());
}

#[tokio::test]
async fn test_review_failure_preserved_when_attempt_succeeds() {
    let h = Harness::scripted(vec![generated(
        ok("s1", Review::Continue),
        ok("s2", Review::Fail),
    )]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.kept_count, 1);
    assert_eq!(result.preserved_count, 1);
    assert!(h.sidecar.deleted().is_empty());
    assert_eq!(h.final_files().len(), 2);
}

#[tokio::test]
async fn test_both_downloads_fail_then_retry() {
    let h = Harness::scripted(vec![
        generated(helpers::Download::Fail, helpers::Download::Fail),
        generated(ok("s1", Review::Continue), ok("s2", Review::ReRoll)),
    ]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.total_attempts, 2);
    assert_eq!(h.sidecar.reviews(), 2);
    // Only the attempt-2 re-roll is deleted
    assert_eq!(h.sidecar.deleted(), vec!["s2"]);
}

#[tokio::test]
async fn test_remote_delete_failure_is_called_once_and_not_fatal() {
    let h = Harness::new(FakeSidecar::with_failing_remote(vec![generated(
        ok("s1", Review::Continue),
        ok("s2", Review::ReRoll),
    )]));

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(h.sidecar.deleted(), vec!["s2"]);
    assert!(h.pending_files().is_empty());

    let deletion = result.attempts[0].candidates[1].deletion.as_ref().unwrap();
    assert!(deletion.local_deleted);
    assert!(!deletion.remote_deleted);
    assert!(deletion.is_successful());
    assert_eq!(deletion.errors.len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let h = Harness::scripted(vec![all_reroll("a", "b")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = h.orchestrator.run(&request("Psalm 23"), &cancel).await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::Cancelled));
    assert_eq!(result.total_attempts, 0);
    assert_eq!(h.sidecar.generations(), 0);
}

#[tokio::test]
async fn test_stop_during_attempt_finishes_deciding_then_stops() {
    let h = Harness::scripted(vec![all_reroll("a1", "a2"), all_reroll("b1", "b2")]);
    let cancel = CancellationToken::new();
    h.sidecar.cancel_on_generate(cancel.clone());

    let result = h.orchestrator.run(&request("Psalm 23"), &cancel).await;

    // The attempt in flight is decided normally, then no retry follows
    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::Cancelled));
    assert_eq!(result.total_attempts, 1);
    assert_eq!(h.sidecar.generations(), 1);
    assert_eq!(h.sidecar.reviews(), 2);
    assert_eq!(h.sidecar.deleted(), vec!["a1", "a2"]);
    assert_eq!(result.preserved_count, 0);
    assert!(h.final_files().is_empty());
    assert!(h.pending_files().is_empty());
}

#[tokio::test]
async fn test_stop_during_successful_attempt_does_not_change_outcome() {
    let h = Harness::scripted(vec![generated(
        ok("s1", Review::Continue),
        ok("s2", Review::ReRoll),
    )]);
    let cancel = CancellationToken::new();
    h.sidecar.cancel_on_generate(cancel.clone());

    let result = h.orchestrator.run(&request("Psalm 23"), &cancel).await;

    assert!(result.success);
    assert!(result.error.is_none());
    assert_eq!(result.kept_count, 1);
    assert_eq!(h.sidecar.deleted(), vec!["s2"]);
}

#[tokio::test]
async fn test_stop_after_failed_generation() {
    let h = Harness::scripted(vec![
        AttemptScript::GenerationFails,
        all_reroll("b1", "b2"),
    ]);
    let cancel = CancellationToken::new();
    h.sidecar.cancel_on_generate(cancel.clone());

    let result = h.orchestrator.run(&request("Psalm 23"), &cancel).await;

    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::Cancelled));
    assert_eq!(result.total_attempts, 1);
    assert_eq!(h.sidecar.generations(), 1);
}

#[tokio::test]
async fn test_events_trace_the_run() {
    let h = Harness::scripted(vec![generated(
        ok("s1", Review::Continue),
        ok("s2", Review::ReRoll),
    )]);
    let mut rx = h.event_bus.subscribe();

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;
    let events = helpers::drain(&mut rx);

    assert!(events.iter().all(|e| e.workflow_id() == result.workflow_id));
    assert_eq!(events.first().unwrap().event_type(), "WorkflowStarted");
    assert_eq!(events.last().unwrap().event_type(), "WorkflowCompleted");

    let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
    assert_eq!(types.iter().filter(|t| **t == "CandidateDownloaded").count(), 2);
    assert_eq!(types.iter().filter(|t| **t == "CandidateReviewed").count(), 2);

    assert!(events.iter().any(|e| matches!(
        e,
        SongforgeEvent::CandidateDeleted {
            position: CandidatePosition::Second,
            local_deleted: true,
            remote_deleted: true,
            ..
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        SongforgeEvent::CandidateFinalized {
            position: CandidatePosition::First,
            fail_safe: false,
            ..
        }
    )));
}

#[tokio::test]
async fn test_final_listing_newest_first_across_runs() {
    let h = Harness::scripted(vec![
        generated(ok("first", Review::Continue), helpers::Download::Fail),
        generated(ok("second", Review::Continue), helpers::Download::Fail),
    ]);

    for _ in 0..2 {
        let result = h
            .orchestrator
            .run(&request("Psalm 23"), &CancellationToken::new())
            .await;
        assert!(result.success);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let listed: Vec<String> = h
        .store
        .list_final("psalm-23")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name.song_id)
        .collect();
    assert_eq!(listed, vec!["second", "first"]);
}

#[tokio::test]
async fn test_same_identifier_on_both_positions_keeps_both_files() {
    let h = Harness::scripted(vec![generated(
        ok("dup", Review::Continue),
        ok("dup", Review::Continue),
    )]);

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(result.kept_count, 2);
    assert_eq!(result.final_artifacts.len(), 2);
    assert_ne!(result.final_artifacts[0], result.final_artifacts[1]);
    assert!(result.attempts[0]
        .candidates
        .iter()
        .all(|c| c.stage == CandidateStage::Kept));

    let finals = h.final_files();
    assert_eq!(finals.len(), 2);
    assert!(finals.iter().all(|f| f.starts_with("psalm-23_dup_")));
    assert!(h.pending_files().is_empty());
}

#[tokio::test]
async fn test_failed_move_to_final_fails_the_run() {
    let h = Harness::scripted(vec![generated(
        ok("s1", Review::Continue),
        helpers::Download::Fail,
    )]);
    // Replace final/ with a plain file so every move into it fails
    let final_dir = h.store.final_dir().to_path_buf();
    std::fs::remove_dir(&final_dir).unwrap();
    std::fs::write(&final_dir, b"not a directory").unwrap();

    let result = h
        .orchestrator
        .run(&request("Psalm 23"), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.error_kind(), Some(WorkflowErrorKind::ArtifactFailure));
    assert_eq!(result.kept_count, 0);
    assert!(result.final_artifacts.is_empty());
    assert_eq!(h.pending_files().len(), 1);

    let first = &result.attempts[0].candidates[0];
    assert_eq!(first.stage, CandidateStage::Reviewed);
    assert_eq!(first.effective_verdict(), Verdict::Continue);
    assert!(first.failure.is_some());
}
