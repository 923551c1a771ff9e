// Format engine tests through the public API

use overflow_lab::exercise::format::{
    render, snprintf_untrusted, sprintf_untrusted, Arg, CallSite,
};
use overflow_lab::exercise::{ExerciseConfig, Fault, FormatError};
use overflow_lab::memory::image::MemoryImage;
use overflow_lab::memory::layout::MemoryLayout;
use overflow_lab::memory::ByteOrder;

fn hw2() -> (MemoryLayout, MemoryImage, CallSite) {
    let layout = MemoryLayout::new(&ExerciseConfig::hw2_level1());
    let image = layout.instantiate();
    let site = CallSite {
        registers: [layout.line_address().unwrap_or(0), 0, 0, 0],
        stack_args: layout.base(),
        order: layout.byte_order(),
    };
    (layout, image, site)
}

#[test]
fn test_exercise_messages_render() {
    assert_eq!(
        render("Try again, you got 0x%08x\n", &[Arg::Uint(0x6364)]).unwrap(),
        "Try again, you got 0x00006364\n"
    );
    assert_eq!(
        render("calling function pointer @ %p\n", &[Arg::Ptr(0x401196)]).unwrap(),
        "calling function pointer @ 0x401196\n"
    );
    assert_eq!(
        render("and will be returning to %p\n", &[Arg::Ptr(0)]).unwrap(),
        "and will be returning to (nil)\n"
    );
}

#[test]
fn test_trusted_backend_never_stores() {
    assert_eq!(
        render("%hhn", &[Arg::Ptr(0x1000)]),
        Err(FormatError::Forbidden { directive: 'n' })
    );
}

#[test]
fn test_stack_words_leak_return_address() {
    let (layout, mut image, site) = hw2();
    // Words 5..=17 cover line, dest, changeme+pad, saved rbp, return address
    let dest = layout.buffer_address();
    sprintf_untrusted(&mut image, dest, b"%17$lx", site).unwrap();
    assert_eq!(image.read_c_string(dest).unwrap(), b"7ffff7c29d90".to_vec());
}

#[test]
fn test_short_store_widths() {
    let (layout, mut image, site) = hw2();
    let changeme = layout.sentinel_address();
    image
        .write(layout.base() + 8, &changeme.to_le_bytes())
        .unwrap();
    image
        .write_u32(changeme, 0xffff_ffff, ByteOrder::Little)
        .unwrap();

    sprintf_untrusted(&mut image, layout.buffer_address(), b"%44c%6$hhn", site).unwrap();
    // Only the low byte is replaced
    assert_eq!(
        image.read_u32(changeme, ByteOrder::Little).unwrap(),
        0xffff_ff2c
    );
}

#[test]
fn test_snprintf_zero_size_writes_nothing() {
    let (layout, mut image, site) = hw2();
    let before = image.clone();
    let count =
        snprintf_untrusted(&mut image, layout.buffer_address(), 0, b"hello", site).unwrap();
    assert_eq!(count, 5);
    assert!(before.diff(&image).is_empty());
}

#[test]
fn test_star_position_zero_is_not_an_argument() {
    let (layout, mut image, site) = hw2();
    let dest = layout.buffer_address();
    sprintf_untrusted(&mut image, dest, b"%*0$d|%.*0$x", site).unwrap();
    assert_eq!(image.read_c_string(dest).unwrap(), b"%*0$d|%.*0$x".to_vec());
    assert_eq!(render("%*0$d", &[Arg::Int(4), Arg::Int(7)]).unwrap(), "%*0$d");
}

#[test]
fn test_snprintf_output_count_stops_at_int_max() {
    let (layout, mut image, site) = hw2();
    let dest = layout.buffer_address();
    let count =
        snprintf_untrusted(&mut image, dest, 16, b"%2147483647d%2147483647d%n", site).unwrap();
    assert_eq!(count, i32::MAX as usize);
    assert_eq!(image.read_c_string(dest).unwrap(), vec![b' '; 15]);
    // Formatting stopped before the `%n`
    assert_eq!(image.read_u32(layout.sentinel_address(), ByteOrder::Little).unwrap(), 0);
}

#[test]
fn test_precision_zeros_respect_snprintf_bound() {
    let (layout, mut image, site) = hw2();
    let dest = layout.buffer_address();
    let count = snprintf_untrusted(&mut image, dest, 8, b"%.100000x", site).unwrap();
    assert_eq!(count, 100_000);
    assert_eq!(image.read_c_string(dest).unwrap(), b"0000000".to_vec());
}

#[test]
fn test_percent_s_through_wild_pointer_faults() {
    let (layout, mut image, mut site) = hw2();
    site.registers[0] = 0x4141_4141;
    let result = sprintf_untrusted(&mut image, layout.buffer_address(), b"%s", site);
    assert_eq!(result, Err(Fault::Segfault { address: 0x4141_4141 }));
}
