#[cfg(test)]
mod tests {
    use crate::utils::{Harness, session, text};
    use engine_core::state::{StateStore, get_json, keys};
    use engine_processing::records::RecordStore;
    use engine_runtime::queue::{HandleOutcome, HealthcheckOutcome, config::QueueConfig};
    use model::{
        events::{ProcessCompleted, QueueEntryDeleted},
        schema::RecordSchema,
        session::DuplicateMode,
    };
    use tracing_test::traced_test;

    fn one_row_per_pass() -> QueueConfig {
        QueueConfig {
            time_limit_secs: 0,
            ..QueueConfig::default()
        }
    }

    // Scenario: A queued run of five rows drained in one pass.
    // Expected Outcome:
    // - Progress reaches the expected length.
    // - The queue is empty and the run completes.
    #[traced_test]
    #[tokio::test]
    async fn queued_run_completes() {
        let h = Harness::new(RecordSchema::default());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);
        let (_sub, mut done) = h.events.channel::<ProcessCompleted>(4).await;

        h.load(&s, &[&["a"], &["b"], &["c"], &["d"], &["e"]]).await;
        let tally = h.tally().await;
        assert_eq!(tally.length, Some(5));
        assert_eq!(tally.progress, 0);

        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Completed);

        let event = done.recv().await.unwrap();
        assert!(!event.aborted);
        assert_eq!(event.rows_imported, 5);
        assert_eq!(h.records.count().await.unwrap(), 5);
        assert_eq!(h.queue.status().await.unwrap().batches, 0);
        assert_eq!(
            h.queue.report().await.unwrap(),
            "5 new records added. 5 of 5 records imported."
        );
    }

    // Scenario: The time limit forces a yield after every row.
    // Expected Outcome:
    // - The batch keeps its id while its content fingerprint moves.
    // - Each healthcheck sees progress and resumes instead of aborting.
    #[traced_test]
    #[tokio::test]
    async fn batch_id_is_stable_while_rows_are_consumed() {
        let h = Harness::with_config(RecordSchema::default(), one_row_per_pass());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);

        let batch_id = h.load(&s, &[&["a"], &["b"], &["c"]]).await.unwrap();
        let before = h.queue.next_batch().await.unwrap().unwrap();
        assert_eq!(before.id, batch_id);
        assert_eq!(before.fingerprint(), batch_id);

        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Yielded);
        let after = h.queue.next_batch().await.unwrap().unwrap();
        assert_eq!(after.id, batch_id);
        assert_eq!(after.len(), 2);
        assert_ne!(after.fingerprint(), batch_id);

        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Resumed
        );
        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Yielded);
        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Resumed
        );
        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Completed);
        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Cleared
        );
        assert!(!h.queue.is_scheduled().await.unwrap());
        assert_eq!(h.records.count().await.unwrap(), 3);
    }

    // Scenario: Rows are queued but no worker ever runs; two healthchecks fire.
    // Expected Outcome:
    // - The first tick records the fingerprint and resumes.
    // - The second tick sees no progress and aborts the run with one error.
    // - Every batch is removed and listeners hear about each removal.
    #[traced_test]
    #[tokio::test]
    async fn stalled_queue_is_aborted() {
        let h = Harness::new(RecordSchema::default());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);
        let (_deleted_sub, mut deleted) = h.events.channel::<QueueEntryDeleted>(4).await;
        let (_done_sub, mut done) = h.events.channel::<ProcessCompleted>(4).await;

        let batch_id = h.load(&s, &[&["a"], &["b"]]).await.unwrap();

        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Resumed
        );
        let token: Option<String> = get_json(h.state.as_ref(), keys::CHECK_TOKEN).await.unwrap();
        assert_eq!(token.as_deref(), Some(batch_id.as_str()));

        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Aborted
        );

        assert_eq!(deleted.recv().await.unwrap().batch_id, batch_id);
        assert!(done.recv().await.unwrap().aborted);

        let status = h.queue.status().await.unwrap();
        assert_eq!(status.batches, 0);
        assert_eq!(status.tally.error, 1);
        assert!(!status.scheduled);
        assert!(h.state.get(keys::CHECK_TOKEN).await.unwrap().is_none());

        assert_eq!(
            h.queue.report().await.unwrap(),
            "1 record could not be imported. 0 of 2 records imported. \
             Import terminated: processing stalled at row 1."
        );
        assert!(logs_contain("No progress since the last healthcheck"));
    }

    // Scenario: The same rows are imported twice; the first run's healthcheck
    // left its check token behind.
    // Expected Outcome: The second run's first healthcheck resumes instead of
    // mistaking the old token for a stall.
    #[traced_test]
    #[tokio::test]
    async fn reimporting_same_rows_starts_a_fresh_stall_check() {
        let h = Harness::new(RecordSchema::default());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);

        let first = h.load(&s, &[&["a"], &["b"]]).await.unwrap();
        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Resumed
        );

        let second = h.load(&s, &[&["a"], &["b"]]).await.unwrap();
        assert_eq!(first, second);
        assert!(h.state.get(keys::CHECK_TOKEN).await.unwrap().is_none());
        assert_eq!(
            h.queue.healthcheck().await.unwrap(),
            HealthcheckOutcome::Resumed
        );
        assert_eq!(h.queue.status().await.unwrap().rows, 2);
        assert!(!logs_contain("No progress since the last healthcheck"));
    }

    // Scenario: Rows span several batches and each pass handles one row.
    // Expected Outcome:
    // - Finishing a batch counts as progress for the next healthcheck.
    // - Rows are imported in their original order.
    #[traced_test]
    #[tokio::test]
    async fn progress_is_seen_across_batch_boundaries() {
        let h = Harness::with_config(
            RecordSchema::default(),
            QueueConfig {
                batch_size: 1,
                ..one_row_per_pass()
            },
        );
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);
        h.load(&s, &[&["a"], &["b"], &["c"]]).await.unwrap();
        assert_eq!(h.queue.status().await.unwrap().batches, 3);

        for _ in 0..2 {
            assert_eq!(
                h.queue.healthcheck().await.unwrap(),
                HealthcheckOutcome::Resumed
            );
            assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Yielded);
        }
        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Completed);

        for (id, title) in [(1, "a"), (2, "b"), (3, "c")] {
            let record = h.record(id).await.unwrap();
            assert_eq!(record.get("title"), Some(&text(title)));
        }
    }

    // Scenario: A worker holds the process lock when the healthcheck fires.
    // Expected Outcome: The healthcheck and a second worker both back off.
    #[traced_test]
    #[tokio::test]
    async fn active_worker_blocks_healthcheck_and_handle() {
        let h = Harness::new(RecordSchema::default());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);
        h.load(&s, &[&["a"]]).await;

        h.state
            .set(keys::PROCESS_LOCK, b"\"held\"".to_vec(), None)
            .await
            .unwrap();

        assert_eq!(h.queue.healthcheck().await.unwrap(), HealthcheckOutcome::NoOp);
        assert_eq!(h.queue.handle().await.unwrap(), HandleOutcome::Busy);
        assert_eq!(h.queue.status().await.unwrap().rows, 1);
    }

    // Scenario: A second save finds a batch left behind by an earlier run.
    // Expected Outcome: Only the new batch remains queued.
    #[traced_test]
    #[tokio::test]
    async fn saving_replaces_orphaned_batches() {
        let h = Harness::new(RecordSchema::default());
        let s = session(&["title"], DuplicateMode::Add, "title").with_background(true);

        let first = h.load(&s, &[&["a"]]).await.unwrap();
        let second = h.load(&s, &[&["b"], &["c"]]).await.unwrap();
        assert_ne!(first, second);

        let status = h.queue.status().await.unwrap();
        assert_eq!(status.batches, 1);
        assert_eq!(status.rows, 2);
        assert_eq!(status.tally.length, Some(2));
    }
}
