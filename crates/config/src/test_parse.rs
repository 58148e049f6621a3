#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::*;

    #[test]
    fn empty_settings_take_defaults() {
        let s = load_settings_from_str("()", None).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn settings_fields_parse() {
        let ron = r#"(
            enable_chord_timer: false,
            chord_timeout_ms: 750,
            chord_escape: Some("cmd+."),
            commit_on_timeout: true,
        )"#;
        let s = load_settings_from_str(ron, None).unwrap();
        let p = s.policy().unwrap();
        assert!(!p.chord_timer);
        assert!(p.dynamic_registration);
        assert_eq!(p.timeout, Duration::from_millis(750));
        assert!(p.is_escape(&keycode::Chord::parse("cmd+.").unwrap()));
        assert!(p.commit_on_timeout);
    }

    #[test]
    fn unknown_settings_field_fails() {
        // misspelled chord_timeout_ms
        let res = load_settings_from_str("(chord_timout_ms: 10)", None);
        assert!(matches!(res, Err(Error::Parse { .. })));
    }

    #[test]
    fn bad_escape_is_reported_at_load() {
        let res = load_settings_from_str(r#"(chord_escape: Some("cmd+"))"#, None);
        assert!(matches!(res, Err(Error::Key { .. })));
    }

    #[test]
    fn mapping_document_parses() {
        let ron = r#"(
            global: [
                (keys: ["cmd+k"], action: named("palette")),
                (keys: ["ctrl+x", "ctrl+s"], action: send(["cmd+s"]), desc: "save"),
            ],
            apps: [
                (name: "Terminal", id: Some(7), bindings: [
                    (keys: ["g", "g"], action: named("top")),
                ]),
                (name: "Safari"),
            ],
        )"#;
        let cfg = load_mapping_from_str(ron, None).unwrap();
        assert_eq!(cfg.global.len(), 2);
        assert_eq!(cfg.global[1].desc, "save");
        assert_eq!(cfg.global[1].action, ActionSpec::Send(vec!["cmd+s".into()]));
        let (reg, errs) = AppRegistry::build(&cfg);
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(reg.id_for_app("Terminal"), Some(AppId(7)));
        assert!(reg.is_app_registered("Safari"));
        assert!(reg.hot_keys_for_app("Safari").is_empty());
        assert_eq!(reg.hot_keys_for_app("Terminal")[0].sequence.len(), 2);
    }

    #[test]
    fn parse_errors_carry_location() {
        let ron = "(\n  global: [\n    (keys: [\"a\"], action: bogus(1)),\n  ],\n)";
        let err = load_mapping_from_str(ron, None).unwrap_err();
        match &err {
            Error::Parse { line, excerpt, .. } => {
                assert_eq!(*line, 3);
                assert!(excerpt.contains('^'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.pretty().starts_with("Config parse error at line 3"));
    }
}
