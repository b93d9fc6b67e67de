use super::runtime::panic_message;

#[test]
fn panic_message_reads_str_payload() {
    let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
    assert_eq!(panic_message(payload.as_ref()), "boom");
}

#[test]
fn panic_message_reads_string_payload() {
    let payload = std::panic::catch_unwind(|| panic!("{} {}", "formatted", 42)).unwrap_err();
    assert_eq!(panic_message(payload.as_ref()), "formatted 42");
}

#[test]
fn panic_message_falls_back_for_other_payloads() {
    let payload = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
    assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
}
