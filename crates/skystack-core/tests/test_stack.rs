mod common;

use approx::assert_relative_eq;

use skystack_core::error::StackError;
use skystack_core::frame::{FrameEntry, FrameSet, Offset};
use skystack_core::io::offsets::{FileOffsetStore, MemoryOffsetStore, OffsetStore};
use skystack_core::pipeline::{StackStage, StopFlag};
use skystack_core::stack::{resolve_inputs, stack, stack_reported, SigmaClipParams};

use common::{frame_from_rows, uniform_frame, MemoryFrameStore, StopAtPass};

fn frame_set(names: &[&str], reference: usize) -> FrameSet {
    let entries = names.iter().map(|n| FrameEntry::new(*n, true)).collect();
    FrameSet::new(entries, reference).unwrap()
}

fn offsets(records: &[(&str, i32, i32)]) -> MemoryOffsetStore {
    let store = MemoryOffsetStore::new();
    for &(name, dx, dy) in records {
        store
            .save(std::path::Path::new(name), Offset::new(dx, dy))
            .unwrap();
    }
    store
}

fn no_clip() -> SigmaClipParams {
    SigmaClipParams {
        iterations: 0,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Input resolution
// ---------------------------------------------------------------------------

#[test]
fn test_resolve_inputs_reference_first() {
    let set = frame_set(&["a", "b", "c"], 1);
    let offs = offsets(&[("a", 2, 0), ("c", 0, -3)]);
    let (inputs, failures) = resolve_inputs(&set, &offs);

    assert_eq!(failures, 0);
    let paths: Vec<_> = inputs.iter().map(|i| i.path.to_str().unwrap()).collect();
    assert_eq!(paths, ["b", "a", "c"]);
    assert!(inputs[0].is_reference());
    assert_eq!(inputs[0].offset, Offset::ZERO);
    assert_eq!(inputs[1].offset, Offset::new(2, 0));
    assert_eq!(inputs[2].offset, Offset::new(0, -3));
}

#[test]
fn test_resolve_inputs_skips_excluded_and_defaults_missing_offsets() {
    let entries = vec![
        FrameEntry::new("ref", false),
        FrameEntry::new("out", false),
        FrameEntry::new("unaligned", true),
    ];
    let set = FrameSet::new(entries, 0).unwrap();
    let (inputs, failures) = resolve_inputs(&set, &MemoryOffsetStore::new());

    assert_eq!(failures, 0);
    // the reference is always used, whatever its flag says
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[1].path.to_str(), Some("unaligned"));
    assert_eq!(inputs[1].offset, Offset::ZERO);
}

#[test]
fn test_resolve_inputs_drops_unreadable_records() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.tif");
    let bad = dir.path().join("bad.tif");
    let store = FileOffsetStore::default();
    store.save(&good, Offset::new(1, 1)).unwrap();
    std::fs::write(store.record_path(&bad), "one two\n").unwrap();

    let set = FrameSet::new(
        vec![
            FrameEntry::new(dir.path().join("ref.tif"), true),
            FrameEntry::new(&good, true),
            FrameEntry::new(&bad, true),
        ],
        0,
    )
    .unwrap();
    let (inputs, failures) = resolve_inputs(&set, &store);
    assert_eq!(failures, 1);
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[1].offset, Offset::new(1, 1));
}

#[test]
fn test_frame_set_validation() {
    assert!(matches!(
        FrameSet::new(Vec::new(), 0),
        Err(StackError::EmptyFrameSet)
    ));
    assert!(matches!(
        FrameSet::new(vec![FrameEntry::new("a", true)], 1),
        Err(StackError::ReferenceOutOfRange { index: 1, total: 1 })
    ));
}

// ---------------------------------------------------------------------------
// Stacking runs
// ---------------------------------------------------------------------------

#[test]
fn test_single_frame_stack_is_identity() {
    let frame = frame_from_rows(&[&[1.0, 2.0], &[3.0, 65535.0]]);
    let store = MemoryFrameStore::new().with_frame("only", frame.clone());
    let outcome = stack(
        &frame_set(&["only"], 0),
        &SigmaClipParams::default(),
        &MemoryOffsetStore::new(),
        &store,
    )
    .unwrap();

    assert_eq!(outcome.image.data, frame.data);
    assert_eq!(outcome.summary.frames_stacked, 1);
    assert_eq!(outcome.summary.passes_run, 0);
    assert!(!outcome.summary.stopped_early);
    assert_eq!(outcome.summary.median_contributions, None);
}

#[test]
fn test_stack_applies_offsets() {
    let store = MemoryFrameStore::new()
        .with_frame("ref", uniform_frame(2, 3, 10.0))
        .with_frame("shifted", uniform_frame(2, 3, 30.0));
    let outcome = stack(
        &frame_set(&["ref", "shifted"], 0),
        &no_clip(),
        &offsets(&[("shifted", 1, 0)]),
        &store,
    )
    .unwrap();

    for c in 0..3 {
        for y in 0..2 {
            assert_relative_eq!(outcome.image.data[[c, y, 0]], 10.0);
            assert_relative_eq!(outcome.image.data[[c, y, 1]], 20.0);
            assert_relative_eq!(outcome.image.data[[c, y, 2]], 20.0);
        }
    }
}

#[test]
fn test_excluded_frame_never_loaded() {
    let store = MemoryFrameStore::new()
        .with_frame("ref", uniform_frame(2, 2, 100.0))
        .with_frame("aligned", uniform_frame(2, 2, 200.0))
        .with_frame("rejected", uniform_frame(2, 2, 9000.0));
    let set = FrameSet::new(
        vec![
            FrameEntry::new("ref", true),
            FrameEntry::new("aligned", true),
            FrameEntry::new("rejected", false),
        ],
        0,
    )
    .unwrap();

    let outcome = stack(&set, &SigmaClipParams::default(), &offsets(&[("aligned", 0, 0)]), &store).unwrap();
    assert_eq!(store.load_count("rejected"), 0);
    assert_eq!(outcome.summary.frames_stacked, 2);
    assert!(outcome.image.data.iter().all(|v| (*v - 150.0).abs() < 1e-3));
}

#[test]
fn test_unaligned_frame_uses_zero_offset() {
    let store = MemoryFrameStore::new()
        .with_frame("ref", uniform_frame(2, 2, 100.0))
        .with_frame("never_aligned", uniform_frame(2, 2, 300.0));
    let outcome = stack(
        &frame_set(&["ref", "never_aligned"], 0),
        &no_clip(),
        &MemoryOffsetStore::new(),
        &store,
    )
    .unwrap();
    assert_eq!(outcome.summary.frames_stacked, 2);
    assert_eq!(outcome.summary.frames_skipped, 0);
    assert!(outcome.image.data.iter().all(|v| (*v - 200.0).abs() < 1e-3));
}

#[test]
fn test_bad_light_frames_are_skipped() {
    let store = MemoryFrameStore::new()
        .with_frame("ref", uniform_frame(2, 2, 100.0))
        .with_frame("wrong_size", uniform_frame(3, 2, 500.0))
        .with_frame("good", uniform_frame(2, 2, 300.0));
    // "missing" has no data at all
    let outcome = stack(
        &frame_set(&["ref", "wrong_size", "missing", "good"], 0),
        &no_clip(),
        &MemoryOffsetStore::new(),
        &store,
    )
    .unwrap();

    assert_eq!(outcome.summary.frames_stacked, 2);
    assert_eq!(outcome.summary.frames_skipped, 2);
    assert!(outcome.image.data.iter().all(|v| (*v - 200.0).abs() < 1e-3));
}

#[test]
fn test_reference_load_failure_is_fatal() {
    let store = MemoryFrameStore::new().with_frame("light", uniform_frame(2, 2, 1.0));
    let err = stack(
        &frame_set(&["absent", "light"], 0),
        &SigmaClipParams::default(),
        &MemoryOffsetStore::new(),
        &store,
    )
    .unwrap_err();

    match err {
        StackError::ReferenceLoad { path, .. } => assert_eq!(path.to_str(), Some("absent")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_summary_after_clipping() {
    let mut store = MemoryFrameStore::new();
    let mut names = Vec::new();
    for i in 0..5 {
        let name = format!("f{i}");
        store = store.with_frame(&name, uniform_frame(2, 2, 100.0));
        names.push(name);
    }
    store = store.with_frame("hot", frame_from_rows(&[&[1000.0, 100.0], &[100.0, 100.0]]));
    names.push("hot".into());
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let params = SigmaClipParams {
        iterations: 2,
        sigma_tenths: [20; 3],
        ..Default::default()
    };
    let outcome = stack(&frame_set(&names, 0), &params, &MemoryOffsetStore::new(), &store).unwrap();
    let summary = &outcome.summary;

    assert_eq!(summary.frames_stacked, 6);
    assert_eq!(summary.passes_requested, 2);
    assert_eq!(summary.passes_run, 2);
    assert_eq!(summary.passes.len(), 2);
    assert_eq!(summary.passes[0].rejected, [1, 1, 1]);
    // second pass compares against a zero-sigma neighbourhood and drops it again
    assert_eq!(summary.rejected, [1, 1, 1]);
    assert_eq!(summary.empty_cells, 0);
    // 9 cells with 6 contributions, 3 with 5
    assert_eq!(summary.median_contributions, Some(6.0));
    assert_relative_eq!(outcome.image.data[[0, 0, 0]], 100.0);
}

#[test]
fn test_everything_rejected_leaves_nan_cells() {
    let store = MemoryFrameStore::new()
        .with_frame("a", frame_from_rows(&[&[0.0, 50.0]]))
        .with_frame("b", frame_from_rows(&[&[10.0, 50.0]]));
    let params = SigmaClipParams {
        iterations: 1,
        sigma_tenths: [5; 3],
        ..Default::default()
    };
    let outcome = stack(&frame_set(&["a", "b"], 0), &params, &MemoryOffsetStore::new(), &store).unwrap();

    assert_eq!(outcome.summary.empty_cells, 3);
    for c in 0..3 {
        assert!(outcome.image.data[[c, 0, 0]].is_nan());
        assert_relative_eq!(outcome.image.data[[c, 0, 1]], 50.0);
    }
}

#[test]
fn test_stop_requested_before_clipping() {
    let store = MemoryFrameStore::new()
        .with_frame("a", uniform_frame(1, 2, 10.0))
        .with_frame("b", uniform_frame(1, 2, 30.0));
    let stop = StopFlag::new();
    stop.request();
    let outcome = stack_reported(
        &frame_set(&["a", "b"], 0),
        &SigmaClipParams::default(),
        &MemoryOffsetStore::new(),
        &store,
        &skystack_core::pipeline::NoOpReporter,
        &stop,
    )
    .unwrap();

    assert_eq!(outcome.summary.passes_run, 0);
    assert!(outcome.summary.stopped_early);
    assert_eq!(outcome.summary.median_contributions, None);
    assert!(outcome.image.data.iter().all(|v| (*v - 20.0).abs() < 1e-4));
}

#[test]
fn test_stop_during_clipping_keeps_completed_pass() {
    let store = MemoryFrameStore::new()
        .with_frame("a", uniform_frame(1, 2, 10.0))
        .with_frame("b", uniform_frame(1, 2, 12.0))
        .with_frame("c", uniform_frame(1, 2, 14.0));
    let params = SigmaClipParams {
        iterations: 3,
        ..Default::default()
    };
    let stop = StopFlag::new();
    let reporter = StopAtPass::new(1, stop.clone());
    let outcome = stack_reported(
        &frame_set(&["a", "b", "c"], 0),
        &params,
        &MemoryOffsetStore::new(),
        &store,
        &reporter,
        &stop,
    )
    .unwrap();

    assert_eq!(outcome.summary.passes_run, 1);
    assert!(outcome.summary.stopped_early);
    assert_eq!(outcome.summary.median_contributions, Some(3.0));

    let stages = reporter.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            StackStage::Loading,
            StackStage::Accumulating,
            StackStage::Clipping { pass: 1, of: 3 },
            StackStage::Normalizing,
        ]
    );
}
