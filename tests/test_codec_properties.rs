// Property tests for the OSC 633 payload codec and its parsers
use par_term_shell_integration::codec::{
    decode, encode, parse_key_value_assignment, parse_mark_sequence, sanitize_cwd,
};
use par_term_shell_integration::{CursorTracker, ShellIntegrationConfig, ShellIntegrationRouter};
use proptest::prelude::*;

/// Strings biased towards the characters the codec has to escape
fn arb_payload() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => any::<char>(),
            2 => Just('\\'),
            2 => Just(';'),
            1 => Just('x'),
            1 => (0u8..=0x20).prop_map(char::from),
        ],
        0..48,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_decode_reverses_encode(s in arb_payload()) {
        prop_assert_eq!(decode(&encode(&s)), s);
    }

    #[test]
    fn prop_encoded_has_no_separators_or_controls(s in arb_payload()) {
        let encoded = encode(&s);
        prop_assert!(!encoded.contains(';'));
        prop_assert!(!encoded.chars().any(|c| c <= ' '));
    }

    #[test]
    fn prop_plain_text_is_unchanged(s in "[A-Za-z0-9_./=:-]{0,40}") {
        prop_assert_eq!(encode(&s), s.clone());
        prop_assert_eq!(decode(&s), s);
    }

    #[test]
    fn prop_decode_never_loses_plain_text(s in "[^\\\\]{0,40}") {
        prop_assert_eq!(decode(&s), s);
    }

    #[test]
    fn prop_key_value_splits_at_first_equals(
        key in "[A-Za-z]{1,16}",
        value in "[ -~]{0,32}",
    ) {
        let assignment = format!("{key}={value}");
        let kv = parse_key_value_assignment(&assignment);
        prop_assert_eq!(kv.key, key.as_str());
        prop_assert_eq!(kv.value, Some(value.as_str()));

        let bare = parse_key_value_assignment(&key);
        prop_assert_eq!(bare.key, key.as_str());
        prop_assert_eq!(bare.value, None);
    }

    #[test]
    fn prop_mark_id_and_hidden(id in "[a-z0-9-]{1,12}", hidden in any::<bool>()) {
        let mut args = vec![format!("Id={id}")];
        if hidden {
            args.push("Hidden".to_string());
        }
        let props = parse_mark_sequence(&args);
        prop_assert_eq!(props.id.as_deref(), Some(id.as_str()));
        prop_assert_eq!(props.hidden, hidden);
    }

    #[test]
    fn prop_drive_letter_uppercased(drive in "[a-z]", rest in "[A-Za-z0-9 _\\\\]{0,24}") {
        let cwd = format!("{drive}:\\{rest}");
        let expected = format!("{}:\\{rest}", drive.to_ascii_uppercase());
        prop_assert_eq!(sanitize_cwd(&cwd), expected.clone());
        prop_assert_eq!(sanitize_cwd(&format!("\"{cwd}\"")), expected);
    }

    #[test]
    fn prop_command_line_survives_routing(line in arb_payload()) {
        let config = ShellIntegrationConfig::default().with_nonce("n");
        let mut router = ShellIntegrationRouter::new(config, None);
        router.activate(Box::new(CursorTracker::new(80, 24)));

        prop_assert!(router.handle_osc(633, "B"));
        let payload = format!("E;{};n", encode(&line));
        prop_assert!(router.handle_osc(633, &payload));
        let detection = router.capabilities().command_detection().unwrap();
        prop_assert_eq!(detection.current_command().command.as_deref(), Some(line.as_str()));
        prop_assert!(detection.current_command().is_trusted);
    }
}
