#![no_main]
use libfuzzer_sys::fuzz_target;
use orion_host::permission::{matches, PermissionNode};

fuzz_target!(|data: &[u8]| {
    // Split into a granted node and a required node at the first NUL
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let (granted, required) = text.split_once('\0').unwrap_or((text, text));

    // Matching arbitrary text must never panic
    let allowed = matches(granted, required);

    if !granted.is_empty() && !required.is_empty() {
        assert!(matches("*", required));
        assert!(matches(granted, granted));
    }

    // Case never changes the outcome for ASCII input
    if granted.is_ascii() && required.is_ascii() {
        assert_eq!(allowed, matches(&granted.to_ascii_uppercase(), required));
    }

    // A parsed node agrees with the free function
    if let Ok(node) = granted.parse::<PermissionNode>() {
        assert_eq!(node.matches(required), matches(node.as_str(), required));
    }
});
