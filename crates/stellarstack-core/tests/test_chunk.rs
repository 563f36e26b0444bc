use stellarstack_core::chunk::plan_chunks;
use stellarstack_core::error::StackError;

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

#[test]
fn test_chunks_cover_height_exactly() {
    let plan = plan_chunks(100, 10, 4, 1000).unwrap();
    assert!(plan.rows_per_chunk >= 1);
    let mut expected_start = 0;
    for chunk in &plan.chunks {
        assert_eq!(chunk.start, expected_start);
        assert!(chunk.end > chunk.start);
        expected_start = chunk.end;
    }
    assert_eq!(expected_start, 100);
}

#[test]
fn test_last_chunk_may_be_short() {
    // 4 frames x 10 wide x 4 bytes x 1.5 safety = 240 bytes per row;
    // 1000-byte budget fits 4 rows, so 100 rows split into 25 chunks.
    let plan = plan_chunks(100, 10, 4, 1000).unwrap();
    assert_eq!(plan.rows_per_chunk, 4);
    assert_eq!(plan.chunk_count(), 25);

    let plan = plan_chunks(10, 10, 4, 1000).unwrap();
    assert_eq!(plan.chunks.last().unwrap().clone(), 8..10);
}

#[test]
fn test_large_budget_gives_single_chunk() {
    let plan = plan_chunks(100, 10, 4, usize::MAX / 4).unwrap();
    assert_eq!(plan.rows_per_chunk, 100);
    assert_eq!(plan.chunk_count(), 1);
}

#[test]
fn test_single_row_budget() {
    let plan = plan_chunks(16, 10, 4, 250).unwrap();
    assert_eq!(plan.rows_per_chunk, 1);
    assert_eq!(plan.chunk_count(), 16);
}

// ---------------------------------------------------------------------------
// Determinism and failures
// ---------------------------------------------------------------------------

#[test]
fn test_plan_is_deterministic() {
    let a = plan_chunks(4321, 987, 37, 123_456_789).unwrap();
    let b = plan_chunks(4321, 987, 37, 123_456_789).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_budget_too_small_for_one_row_is_fatal() {
    let result = plan_chunks(100, 1000, 500, 1024);
    match result {
        Err(StackError::InsufficientMemory { required, budget }) => {
            assert!(required > budget);
            assert_eq!(budget, 1024);
        }
        other => panic!("expected InsufficientMemory, got {other:?}"),
    }
}

#[test]
fn test_zero_frames_is_an_error() {
    assert!(matches!(
        plan_chunks(100, 100, 0, 1 << 20),
        Err(StackError::EmptySequence)
    ));
}

#[test]
fn test_zero_sized_image_is_an_error() {
    assert!(matches!(
        plan_chunks(0, 100, 4, 1 << 20),
        Err(StackError::Configuration(_))
    ));
}
