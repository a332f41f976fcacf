use crate::EventCapture;

/// Runs a test body with events captured, then checks that every block was freed
///
/// The body receives the [EventCapture] so that it can make its own assertions along the way.
/// If any control block is still allocated once the body has returned, the captured events are
/// printed and the test fails.
pub fn check_lifecycle(body: impl FnOnce(&EventCapture)) {
    let (capture, guard) = EventCapture::install();

    body(&capture);

    drop(guard);

    let live_blocks = capture.live_blocks();
    if live_blocks != 0 {
        println!("Events:\n-------\n\n{}\n-------\n", capture.captured_output());
        panic!("{live_blocks} control block(s) were still allocated at the end of the test");
    }

    assert_eq!(
        capture.values_constructed() + capture.values_adopted(),
        capture.values_destroyed() + capture.values_unwrapped(),
        "every managed value should have been destroyed or moved out"
    );
}
