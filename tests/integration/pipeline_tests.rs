/*!
 * Integration tests for jobs running through the pipeline.
 *
 * Every test drives a mock model through the real scheduler, accelerator
 * gate and job service.
 */

use std::time::Duration;

use slidelingo::document::{Extractor, Package};
use slidelingo::jobs::{JobState, OutputHandle};
use slidelingo::providers::mock::MockModel;
use slidelingo::translation::SchedulerConfig;

use crate::common::{long_deck, three_slide_deck, DeckBuilder, TestHarness, TestSlide};

fn texts_of(bytes: &[u8]) -> Vec<String> {
    Extractor::default()
        .extract(bytes)
        .unwrap()
        .units
        .iter()
        .map(|u| u.source_text().to_string())
        .collect()
}

#[tokio::test]
async fn test_three_slide_deck_should_send_only_non_empty_runs() {
    let harness = TestHarness::new(MockModel::working(), 1000, 10);
    let id = harness.service.submit("results.pptx", three_slide_deck(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.counts.total, 5);
    assert_eq!(status.counts.sent, 3);
    assert_eq!(status.counts.translated, 5);
    assert_eq!(status.failed_units, 0);
    assert_eq!(status.output, Some(OutputHandle::Memory));
    assert_eq!(harness.model.items_received(), 3);
    assert_eq!(harness.model.calls(), 1);

    let output = harness.service.take_output(id).unwrap().unwrap();
    assert_eq!(
        texts_of(&output),
        vec!["[fr] Quarterly results", "", "[fr] Revenue grew", "", "[fr] Thank you"]
    );
    assert_eq!(harness.service.take_output(id).unwrap(), None);
    assert_eq!(harness.service.status(id).unwrap().output, None);
}

#[tokio::test]
async fn test_batches_should_respect_unit_budget() {
    let harness = TestHarness::new(MockModel::working(), 10_000, 3);
    // 4 slides x (5 runs + 1 note) = 24 pending units
    let id = harness.service.submit("long.pptx", long_deck(4, 5), "de").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(status.counts.sent, 24);
    assert_eq!(harness.model.calls(), 8);
    assert_eq!(harness.model.items_received(), 24);

    let stats = harness.service.pipeline().scheduler().stats();
    assert_eq!(stats.batches_run, 8);
    assert_eq!(stats.units_sent, 24);
}

#[tokio::test]
async fn test_batches_should_respect_char_budget() {
    // Every run is 14 characters ("Slide 0 line 0"), notes are 17
    let harness = TestHarness::new(MockModel::working(), 30, 100);
    let id = harness.service.submit("long.pptx", long_deck(1, 4), "de").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    // [line 0, line 1] [line 2, line 3] [notes]
    assert_eq!(harness.model.calls(), 3);
}

#[tokio::test]
async fn test_failing_model_should_complete_with_errors_and_keep_source_text() {
    let input = three_slide_deck();
    let harness = TestHarness::new(MockModel::failing(), 1000, 10);
    let id = harness.service.submit("results.pptx", input.clone(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 3);
    assert!(status.error.is_none());

    let output = harness.service.take_output(id).unwrap().unwrap();
    let identity = Package::from_bytes(&input).unwrap().to_bytes().unwrap();
    assert_eq!(output, identity);
}

#[tokio::test]
async fn test_failed_batch_should_not_affect_other_batches() {
    let harness = TestHarness::new(MockModel::fail_when_contains("Revenue"), 1000, 1);
    let id = harness.service.submit("results.pptx", three_slide_deck(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 1);
    assert_eq!(harness.model.calls(), 3);

    let output = harness.service.take_output(id).unwrap().unwrap();
    assert_eq!(
        texts_of(&output),
        vec!["[fr] Quarterly results", "", "Revenue grew", "", "[fr] Thank you"]
    );
}

#[tokio::test]
async fn test_empty_model_output_should_fail_units() {
    let harness = TestHarness::new(MockModel::empty(), 1000, 10);
    let id = harness.service.submit("results.pptx", three_slide_deck(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 3);
}

#[tokio::test]
async fn test_batch_timeout_should_fail_only_that_batch() {
    let config = SchedulerConfig {
        batch_timeout: Duration::from_millis(50),
        queue_capacity: 8,
    };
    let harness = TestHarness::with_config(MockModel::slow(Duration::from_millis(500)), 1000, 10, config);
    let id = harness.service.submit("results.pptx", three_slide_deck(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 3);
    assert_eq!(harness.service.pipeline().scheduler().stats().batches_failed, 1);
}

#[tokio::test]
async fn test_plain_text_input_should_fail_without_output() {
    let harness = TestHarness::new(MockModel::working(), 1000, 10);
    let id = harness.service.submit("notes.txt", b"Agenda: budget".to_vec(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert!(status.output.is_none());
    assert!(status.error.unwrap().starts_with("Extraction failed"));
    assert_eq!(harness.model.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_jobs_should_share_one_accelerator() {
    let model = MockModel::working().with_delay(Duration::from_millis(10));
    let harness = TestHarness::new(model, 1000, 2);

    let ids: Vec<_> = (0..4)
        .map(|i| {
            harness
                .service
                .submit(&format!("deck{}.pptx", i), long_deck(2, 3), "es")
                .unwrap()
        })
        .collect();

    for id in ids {
        let status = harness.service.wait(id).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
    }

    // 4 jobs x 8 units in batches of 2
    assert_eq!(harness.model.calls(), 16);
    assert_eq!(harness.gate.peak_in_flight(), 1);
    assert_eq!(harness.model.peak_concurrent_calls(), 1);
    assert_eq!(harness.gate.in_flight(), 0);
}

#[tokio::test]
async fn test_cancel_should_stop_at_batch_boundary_without_output() {
    let model = MockModel::working().with_delay(Duration::from_millis(30));
    let harness = TestHarness::new(model, 1000, 1);
    let id = harness.service.submit("long.pptx", long_deck(5, 4), "it").unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(harness.service.cancel(id).unwrap());

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::Failed);
    assert_eq!(status.error.as_deref(), Some("Job was cancelled"));
    assert!(status.output.is_none());
    assert!(harness.service.record(id).unwrap().cancelled);
    assert!(harness.model.calls() < 25);

    // Already terminal
    assert!(!harness.service.cancel(id).unwrap());
}

#[tokio::test]
async fn test_unavailable_accelerator_should_fail_every_batch_but_still_write_output() {
    let harness = TestHarness::new(MockModel::working(), 1000, 1);
    harness.gate.mark_unavailable("device lost");

    let input = DeckBuilder::new()
        .slide(TestSlide::text(&[&["One", "Two"]]))
        .slide(TestSlide::text(&[&["Three"]]))
        .build();
    let id = harness.service.submit("deck.pptx", input.clone(), "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 3);
    assert_eq!(harness.model.calls(), 0);

    let output = harness.service.take_output(id).unwrap().unwrap();
    assert_eq!(texts_of(&output), vec!["One", "Two", "Three"]);
}

#[tokio::test]
async fn test_device_lost_mid_job_should_keep_finished_batches() {
    let harness = TestHarness::new(MockModel::disconnect_after(2), 1000, 1);
    let input = DeckBuilder::new()
        .slide(TestSlide::text(&[&["One", "Two"]]))
        .slide(TestSlide::text(&[&["Three", "Four"]]))
        .build();
    let id = harness.service.submit("deck.pptx", input, "fr").unwrap();

    let status = harness.service.wait(id).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 2);
    assert_eq!(harness.model.calls(), 3);
    assert!(!harness.gate.is_available());

    let output = harness.service.take_output(id).unwrap().unwrap();
    assert_eq!(texts_of(&output), vec!["[fr] One", "[fr] Two", "Three", "Four"]);

    // A job submitted afterwards never reaches the model
    let late = harness.service.submit("late.pptx", three_slide_deck(), "fr").unwrap();
    let status = harness.service.wait(late).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(harness.model.calls(), 3);
}

#[tokio::test]
async fn test_panicking_model_should_not_stop_other_jobs() {
    let harness = TestHarness::new(MockModel::panic_on_call(1), 1000, 10);
    let first = harness.service.submit("first.pptx", three_slide_deck(), "fr").unwrap();
    let status = harness.service.wait(first).await.unwrap();
    assert_eq!(status.state, JobState::CompletedWithErrors);
    assert_eq!(status.failed_units, 3);

    let second = harness.service.submit("second.pptx", three_slide_deck(), "fr").unwrap();
    let status = harness.service.wait(second).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(harness.model.calls(), 2);
}

#[tokio::test]
async fn test_job_state_should_move_forward_only() {
    let harness = TestHarness::new(MockModel::working(), 1000, 10);
    let id = harness.service.submit("results.pptx", three_slide_deck(), "fr").unwrap();

    let mut seen = Vec::new();
    let mut state_rx = harness.service.store().subscribe(id).unwrap();
    loop {
        let state = *state_rx.borrow_and_update();
        if seen.last() != Some(&state) {
            seen.push(state);
        }
        if state.is_terminal() {
            break;
        }
        state_rx.changed().await.unwrap();
    }

    // The watch channel may coalesce states, so only the order is checked
    let order = [
        JobState::Created,
        JobState::Extracting,
        JobState::Translating,
        JobState::Reinserting,
        JobState::Completed,
    ];
    let ranks: Vec<usize> = seen
        .iter()
        .map(|state| order.iter().position(|s| s == state).unwrap())
        .collect();
    assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", seen);
    assert_eq!(seen.last(), Some(&JobState::Completed));
    assert_eq!(harness.service.record(id).unwrap().state, JobState::Completed);
}
