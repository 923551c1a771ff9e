// Integration tests: whole runs of each exercise against crafted payloads

use std::io::{empty, Cursor};

use overflow_lab::exercise::config::{BoundsPolicy, FormatPolicy};
use overflow_lab::exercise::constants::{MAGIC, MAX_BUFFER_CAPACITY, STACK_TOP};
use overflow_lab::exercise::{
    Classification, Driver, Evaluation, ExerciseConfig, ExerciseError, Fault, Phase, RunReport,
    Termination,
};
use overflow_lab::memory::layout::MemoryLayout;
use overflow_lab::memory::ByteOrder;

fn run_arg(config: ExerciseConfig, arg: &[u8]) -> RunReport {
    Driver::new(config)
        .run(Some(arg), empty())
        .expect("run failed")
}

fn run_stdin(config: ExerciseConfig, input: &[u8]) -> RunReport {
    Driver::new(config)
        .run(None, Cursor::new(input.to_vec()))
        .expect("run failed")
}

fn filler(n: usize) -> Vec<u8> {
    vec![b'A'; n]
}

fn lines(report: &RunReport) -> Vec<String> {
    report.terminal.get_output()
}

// ---------------------------------------------------------------- hw1-level1

#[test]
fn test_level1_magic_succeeds() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"dcba");
    let report = run_arg(ExerciseConfig::hw1_level1(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Success { value: MAGIC }));
    assert_eq!(
        lines(&report),
        vec![
            "Welcome to CS487 hw1 Level1",
            "Congratulations, you've finished level 1:-) Well done!"
        ]
    );
    assert_eq!(report.termination, Termination::Exited(0));
}

#[test]
fn test_level1_wrong_value_is_echoed() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"AAAA");
    let report = run_arg(ExerciseConfig::hw1_level1(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Changed { value: 0x41414141 }));
    assert_eq!(report.classification(), Some(Classification::Incomplete));
    assert_eq!(lines(&report)[1], "Try again, you got 0x41414141");
    assert_eq!(report.exit_status(), 0);
}

#[test]
fn test_level1_partial_overwrite() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"dc");
    let report = run_arg(ExerciseConfig::hw1_level1(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Changed { value: 0x6364 }));
    assert_eq!(lines(&report)[1], "Try again, you got 0x00006364");
}

#[test]
fn test_level1_short_payload_leaves_sentinel() {
    for len in [0, 31, 32] {
        let report = run_arg(ExerciseConfig::hw1_level1(), &filler(len));
        assert_eq!(
            report.evaluation,
            Some(Evaluation::Incomplete { value: 0 }),
            "payload of {} bytes",
            len
        );
        assert_eq!(lines(&report)[1], "Try again, you got 0x00000000");
    }
}

#[test]
fn test_level1_missing_argument() {
    let err = Driver::new(ExerciseConfig::hw1_level1())
        .run(None, empty())
        .unwrap_err();
    assert!(matches!(err, ExerciseError::Usage { .. }));
    assert_ne!(err.exit_status(), 0);
}

#[test]
fn test_level1_smashing_return_address_crashes_on_return() {
    // 48 bytes reach the return slot; two more bytes corrupt its low half
    let report = run_arg(ExerciseConfig::hw1_level1(), &filler(50));

    assert_eq!(report.evaluation, Some(Evaluation::Changed { value: 0x41414141 }));
    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::Segfault {
            address: 0x7fff_f700_4141
        })
    );
    assert_eq!(report.exit_status(), 139);
}

#[test]
fn test_level1_writing_past_stack_top_faults_during_copy() {
    let report = run_arg(ExerciseConfig::hw1_level1(), &filler(56));

    assert_eq!(report.evaluation, None);
    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::Segfault { address: STACK_TOP })
    );
    // The banner is the only thing printed
    assert_eq!(lines(&report).len(), 1);
}

#[test]
fn test_level1_checked_copy_protects_sentinel() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"dcba");
    let config = ExerciseConfig::hw1_level1().with_bounds(BoundsPolicy::Checked);
    let report = run_arg(config, &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
    let buffer = report.layout.buffer().clone();
    let bytes = &report.image.bytes()[buffer.offset..buffer.end()];
    assert_eq!(&bytes[..31], &filler(31)[..]);
    assert_eq!(bytes[31], 0);
}

#[test]
fn test_level1_big_endian() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"abcd");
    let config = ExerciseConfig::hw1_level1().with_byte_order(ByteOrder::Big);
    let report = run_arg(config, &payload);

    assert!(report.evaluation.is_some_and(|e| e.is_success()));
}

#[test]
fn test_level1_custom_buffer_size() {
    let mut payload = filler(40);
    payload.extend_from_slice(b"dcba");
    let config = ExerciseConfig::hw1_level1().with_buffer_capacity(40);
    let report = run_arg(config, &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Success { value: MAGIC }));
}

#[test]
fn test_level1_huge_buffer_size_is_capped() {
    let config = ExerciseConfig::hw1_level1().with_buffer_capacity(usize::MAX);
    let report = run_arg(config, &filler(64));

    assert_eq!(report.layout.buffer().len, MAX_BUFFER_CAPACITY);
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
    assert_eq!(report.termination, Termination::Exited(0));
}

#[test]
fn test_same_payload_same_classification() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"dcba");
    let first = run_arg(ExerciseConfig::hw1_level1(), &payload);
    let second = run_arg(ExerciseConfig::hw1_level1(), &payload);

    assert_eq!(first.classification(), second.classification());
    assert_eq!(first.output(), second.output());
    assert_eq!(first.image, second.image);
}

// ---------------------------------------------------------------- hw1-level2

#[test]
fn test_level2_function_pointer_calls_complete_level() {
    let mut payload = filler(32);
    payload.extend_from_slice(&0x0040_1196u64.to_le_bytes());
    payload.push(b'\n');
    let report = run_stdin(ExerciseConfig::hw1_level2(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Jump { target: 0x401196 }));
    assert_eq!(
        lines(&report),
        vec![
            "Welcome to CS487 hw1 Level2",
            "calling function pointer @ 0x401196",
            "Congratulations, you've finished level 2:-) Well done!"
        ]
    );
    assert_eq!(report.termination, Termination::Exited(0));
    assert!(report.snapshots.iter().any(|s| s.phase == Phase::Transferred));
}

#[test]
fn test_level2_unmodified_pointer() {
    let report = run_stdin(ExerciseConfig::hw1_level2(), b"hello\n");

    assert_eq!(report.evaluation, Some(Evaluation::Unmodified));
    assert_eq!(
        lines(&report)[1],
        "function pointer remains unmodified :~( better luck next time!"
    );
    assert_eq!(report.termination, Termination::Exited(0));
}

#[test]
fn test_level2_boundary_terminator_keeps_null() {
    let mut payload = filler(32);
    payload.push(b'\n');
    let report = run_stdin(ExerciseConfig::hw1_level2(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Unmodified));
}

#[test]
fn test_level2_partial_overwrite_jumps_and_crashes() {
    let mut payload = filler(32);
    payload.extend_from_slice(b"BB\n");
    let report = run_stdin(ExerciseConfig::hw1_level2(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Jump { target: 0x4242 }));
    assert_eq!(lines(&report)[1], "calling function pointer @ 0x4242");
    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::Segfault { address: 0x4242 })
    );
}

#[test]
fn test_level2_jump_into_stack_is_not_executable() {
    let layout = MemoryLayout::new(&ExerciseConfig::hw1_level2());
    let mut payload = filler(32);
    payload.extend_from_slice(&layout.buffer_address().to_le_bytes());
    payload.push(b'\n');
    let report = run_stdin(ExerciseConfig::hw1_level2(), &payload);

    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::NonExecutable {
            address: layout.buffer_address()
        })
    );
}

#[test]
fn test_level2_checked_copy() {
    let mut payload = filler(32);
    payload.extend_from_slice(&0x0040_1196u64.to_le_bytes());
    payload.push(b'\n');
    let config = ExerciseConfig::hw1_level2().with_bounds(BoundsPolicy::Checked);
    let report = run_stdin(config, &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Unmodified));
}

// ---------------------------------------------------------------- hw1-level3

#[test]
fn test_level3_reports_resume_address() {
    let report = run_stdin(ExerciseConfig::hw1_level3(), b"hi\n");

    assert_eq!(
        report.evaluation,
        Some(Evaluation::Observed {
            resume_address: 0x401231
        })
    );
    assert_eq!(report.classification(), Some(Classification::Unjudged));
    assert_eq!(
        lines(&report),
        vec!["Welcome to CS487 hw1 Level3", "and will be returning to 0x401231"]
    );
    assert_eq!(report.termination, Termination::Exited(0));
}

#[test]
fn test_level3_return_into_complete_level() {
    let mut payload = filler(64);
    payload.extend_from_slice(&[0xa6, 0x11, 0x40]);
    payload.push(b'\n');
    let report = run_stdin(ExerciseConfig::hw1_level3(), &payload);

    assert_eq!(
        lines(&report),
        vec![
            "Welcome to CS487 hw1 Level3",
            "and will be returning to 0x4011a6",
            "Congratulations, you've finished level 3:-) Well done!"
        ]
    );
    assert_eq!(report.termination, Termination::Exited(0));
    assert!(report.snapshots.iter().any(|s| s.phase == Phase::Transferred));
}

#[test]
fn test_level3_garbage_return_crashes() {
    let mut payload = filler(64);
    payload.extend_from_slice(b"BBBB\n");
    let report = run_stdin(ExerciseConfig::hw1_level3(), &payload);

    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::Segfault {
            address: 0x4242_4242
        })
    );
}

// ---------------------------------------------------------------- hw2-level1

fn dest(report: &RunReport) -> &[u8] {
    let region = report.layout.buffer();
    &report.image.bytes()[region.offset..region.end()]
}

#[test]
fn test_hw2_plain_text_copied_verbatim() {
    let report = run_stdin(ExerciseConfig::hw2_level1(), b"hello\n");

    assert_eq!(&dest(&report)[..7], b"hello\n\0");
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
    assert_eq!(
        lines(&report)[1],
        "'changeme' has not yet been changed. Would you like to try again?"
    );
}

#[test]
fn test_hw2_width_overflows_into_changeme() {
    let report = run_stdin(ExerciseConfig::hw2_level1(), b"%64dA\n");

    assert_eq!(report.evaluation, Some(Evaluation::Success { value: 0x0a41 }));
    assert_eq!(
        lines(&report)[1],
        "Congratulations, the 'changeme' variable has been changed!"
    );
    assert_eq!(report.termination, Termination::Exited(0));
}

#[test]
fn test_hw2_percent_n_writes_outside_dest() {
    let layout = MemoryLayout::new(&ExerciseConfig::hw2_level1());
    assert_eq!(layout.sentinel_address(), 0x7fff_ffff_dfe8);

    let mut payload = b"AAAA%6$n".to_vec();
    payload.extend_from_slice(&layout.sentinel_address().to_le_bytes()[..6]);
    let report = run_stdin(ExerciseConfig::hw2_level1(), &payload);

    assert_eq!(report.evaluation, Some(Evaluation::Success { value: 4 }));
    assert_eq!(&dest(&report)[..4], b"AAAA");
}

#[test]
fn test_hw2_line_is_cut_at_fourteen_bytes() {
    let report = run_stdin(ExerciseConfig::hw2_level1(), b"0123456789abcdefghij\n");

    assert_eq!(&dest(&report)[..15], b"0123456789abcd\0");
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
}

#[test]
fn test_hw2_store_through_null_crashes() {
    // Argument 9 is read from dest, which is still zeroed
    let report = run_stdin(ExerciseConfig::hw2_level1(), b"%9$n\n");

    assert_eq!(report.evaluation, None);
    assert_eq!(
        report.termination,
        Termination::Crashed(Fault::Segfault { address: 0 })
    );
}

#[test]
fn test_hw2_snprintf_bounds_output_but_not_percent_n() {
    let config = ExerciseConfig::hw2_level1().with_bounds(BoundsPolicy::Checked);
    let report = run_stdin(config.clone(), b"%64dA\n");
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
    assert_eq!(dest(&report)[63], 0);

    let layout = MemoryLayout::new(&config);
    let mut payload = b"AAAA%6$n".to_vec();
    payload.extend_from_slice(&layout.sentinel_address().to_le_bytes()[..6]);
    let report = run_stdin(config, &payload);
    assert_eq!(report.evaluation, Some(Evaluation::Success { value: 4 }));
}

#[test]
fn test_hw2_trusted_format_copies_directives_literally() {
    let config = ExerciseConfig::hw2_level1().with_format(FormatPolicy::Trusted);
    let report = run_stdin(config, b"%64dA\n");

    assert_eq!(&dest(&report)[..7], b"%64dA\n\0");
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
}

#[test]
fn test_hw2_no_input() {
    let err = Driver::new(ExerciseConfig::hw2_level1())
        .run(None, empty())
        .unwrap_err();
    assert_eq!(err.to_string(), "Unable to get buffer");
    assert_eq!(err.exit_status(), 1);
}

#[test]
fn test_hw2_star_position_zero_is_copied_verbatim() {
    let report = run_stdin(ExerciseConfig::hw2_level1(), b"%*0$d\n");
    let layout = &report.layout;

    assert_eq!(
        report.image.read_c_string(layout.buffer_address()).unwrap(),
        b"%*0$d\n".to_vec()
    );
    assert_eq!(report.evaluation, Some(Evaluation::Incomplete { value: 0 }));
    assert_eq!(report.termination, Termination::Exited(0));
}
