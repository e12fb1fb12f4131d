// Integration tests for the shell integration router
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use par_term_shell_integration::{
    CursorTracker, ShellIntegrationConfig, ShellIntegrationError, ShellIntegrationEvent,
    ShellIntegrationObserver, ShellIntegrationParser, ShellIntegrationRouter,
    ShellIntegrationStatus, TelemetryEvent, TelemetrySink,
};
use par_term_shell_integration::session::SerializedCommand;
use par_term_shell_integration::SerializedCommandDetection;

#[derive(Default)]
struct Sink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl TelemetrySink for Sink {
    fn public_log(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Default)]
struct CommandRecorder {
    commands: Mutex<Vec<ShellIntegrationEvent>>,
    environment: Mutex<Vec<ShellIntegrationEvent>>,
}

impl ShellIntegrationObserver for CommandRecorder {
    fn on_command_event(&self, event: &ShellIntegrationEvent) {
        self.commands.lock().push(event.clone());
    }

    fn on_environment_event(&self, event: &ShellIntegrationEvent) {
        self.environment.lock().push(event.clone());
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn activated(config: ShellIntegrationConfig, sink: Option<Arc<Sink>>) -> ShellIntegrationRouter {
    init_tracing();
    let sink = sink.map(|s| s as Arc<dyn TelemetrySink>);
    let mut router = ShellIntegrationRouter::new(config, sink);
    router.activate(Box::new(CursorTracker::new(80, 24)));
    router
}

fn cwd_changes(events: &[ShellIntegrationEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ShellIntegrationEvent::CwdChanged(change) => Some(change.new_cwd.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_vscode_session_end_to_end() {
    let sink = Arc::new(Sink::default());
    let mut router = activated(ShellIntegrationConfig::default(), Some(sink.clone()));
    let recorder = Arc::new(CommandRecorder::default());
    router.add_observer(recorder.clone());

    for payload in ["A", "B", "P;Cwd=/repo", "C", "D;0"] {
        assert!(router.handle_osc(633, payload), "633;{payload}");
    }

    assert_eq!(router.status(), ShellIntegrationStatus::VSCode);
    assert_eq!(
        *sink.events.lock(),
        vec![TelemetryEvent::ActivationSucceeded]
    );
    assert_eq!(cwd_changes(&recorder.environment.lock()), vec!["/repo"]);

    let names: Vec<_> = recorder.commands.lock().iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "prompt_start",
            "command_start",
            "command_executed",
            "command_finished"
        ]
    );
    match recorder.commands.lock().last() {
        Some(ShellIntegrationEvent::CommandFinished(command)) => {
            assert_eq!(command.exit_code, Some(0));
            assert_eq!(command.cwd.as_deref(), Some("/repo"));
        }
        other => panic!("expected a finished command, got {other:?}"),
    };
}

#[test]
fn test_prompt_start_then_finish_is_one_command() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    assert!(router.handle_osc(633, "A"));
    assert!(router.handle_osc(633, "D;0"));

    let events = router.poll_events();
    let starts = events.iter().filter(|e| e.name() == "prompt_start").count();
    let finishes = events
        .iter()
        .filter(|e| e.name() == "command_finished")
        .count();
    assert_eq!(starts, 1);
    // Without a command start marker nothing is recorded as finished
    assert_eq!(finishes, 0);
    let detection = router.capabilities().command_detection().unwrap();
    assert!(detection.commands().is_empty());
}

#[test]
fn test_status_never_downgrades() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    assert_eq!(router.status(), ShellIntegrationStatus::Off);

    let script = [
        (133, "A"),
        (633, "A"),
        (133, "B"),
        (133, "nonsense"),
        (7, "file:///tmp/"),
        (1337, "SetMark"),
    ];
    let mut previous = router.status();
    for (ps, payload) in script {
        router.handle_osc(ps, payload);
        assert!(router.status() >= previous);
        previous = router.status();
    }
    assert_eq!(router.status(), ShellIntegrationStatus::VSCode);
}

#[test]
fn test_osc7_updates_cwd_and_rejects_other_schemes() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    assert!(router.handle_osc(7, "file:///home/user/project"));
    assert_eq!(
        router.capabilities().cwd_detection().and_then(|c| c.cwd()),
        Some("/home/user/project")
    );
    assert!(!router.handle_osc(7, "ssh://host/home/user"));
    assert_eq!(cwd_changes(&router.poll_events()), vec!["/home/user/project"]);
}

#[test]
fn test_finalterm_shell_falls_back_to_low_confidence() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    for payload in ["A", "B", "C", "D;2"] {
        assert!(router.handle_osc(133, payload));
    }
    assert_eq!(router.status(), ShellIntegrationStatus::FinalTerm);

    let detection = router.capabilities().command_detection().unwrap();
    let command = &detection.commands()[0];
    assert_eq!(command.exit_code, Some(2));
    assert_eq!(command.command, "");
    assert_eq!(
        command.command_line_confidence,
        par_term_shell_integration::CommandLineConfidence::Low
    );
}

#[test]
fn test_snapshot_restores_history_and_cwd() {
    let mut source = activated(ShellIntegrationConfig::default(), None);
    for payload in ["A", "P;Cwd=/a/b", "B", "E;make", "C", "D;0", "A", "B"] {
        source.handle_osc(633, payload);
    }
    let json = source.serialize_json().unwrap();

    let mut restored = activated(ShellIntegrationConfig::default(), None);
    restored.deserialize_json(&json).unwrap();

    let detection = restored.capabilities().command_detection().unwrap();
    assert_eq!(detection.commands().len(), 1);
    assert_eq!(detection.commands()[0].command, "make");
    assert_eq!(detection.commands()[0].cwd.as_deref(), Some("/a/b"));
    assert_eq!(detection.cwd(), Some("/a/b"));
    assert!(detection.current_command().command_start_line.is_some());
    assert_eq!(
        restored.capabilities().cwd_detection().and_then(|c| c.cwd()),
        Some("/a/b")
    );
    assert_eq!(cwd_changes(&restored.poll_events()), vec!["/a/b"]);
}

#[test]
fn test_deserialize_current_command_cwd_updates_once() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    router.poll_events();
    let snapshot = SerializedCommandDetection {
        commands: vec![SerializedCommand {
            start_line: Some(0),
            start_x: Some(2),
            cwd: Some("/a/b".into()),
            ..SerializedCommand::default()
        }],
        ..SerializedCommandDetection::default()
    };
    router.deserialize(&snapshot).unwrap();

    assert_eq!(cwd_changes(&router.poll_events()), vec!["/a/b"]);
    assert_eq!(
        router
            .capabilities()
            .command_detection()
            .and_then(|c| c.cwd()),
        Some("/a/b")
    );
}

#[test]
fn test_deserialize_requires_activation() {
    let mut router = ShellIntegrationRouter::new(ShellIntegrationConfig::default(), None);
    let err = router.deserialize_json("{}").unwrap_err();
    assert!(matches!(err, ShellIntegrationError::NotActivated(_)));

    let mut router = activated(ShellIntegrationConfig::default(), None);
    let err = router.deserialize_json("[1, 2").unwrap_err();
    assert!(matches!(err, ShellIntegrationError::SerializationError(_)));
}

#[test]
fn test_serialize_without_commands_is_neutral() {
    let router = activated(ShellIntegrationConfig::default(), None);
    assert_eq!(
        router.serialize_json().unwrap(),
        r#"{"isWindowsPty":false,"hasRichCommandDetection":false,"commands":[]}"#
    );
}

#[test]
fn test_task_terminal_blanks_stored_commands() {
    let mut router = activated(ShellIntegrationConfig::default(), None);
    for payload in ["A", "P;Task=build", "B", "E;cargo build", "C", "D;0"] {
        router.handle_osc(633, payload);
    }
    let snapshot = router.serialize();
    assert_eq!(snapshot.commands.len(), 1);
    assert_eq!(snapshot.commands[0].command, "");
    assert_eq!(snapshot.commands[0].exit_code, Some(0));
}

#[test]
fn test_byte_stream_session() {
    let config = ShellIntegrationConfig::default().with_nonce("n0nce");
    let router = activated(config, None);
    let mut parser = ShellIntegrationParser::new(router);

    parser.feed(b"\x1b]633;A\x07\x1b]633;P;Cwd=/srv\x07");
    parser.feed(b"user@host:/srv$ \x1b]633;B\x07");
    parser.feed(b"\x1b]633;E;git\\x20status;n0nce\x07\r\n\x1b]633;C\x07");
    parser.feed(b"On branch main\r\n\x1b]633;D;0\x07");
    parser.feed(b"\x1b]1337;SetUserVar=foo=YmFy\x07");

    let router = parser.router();
    let detection = router.capabilities().command_detection().unwrap();
    let command = &detection.commands()[0];
    assert_eq!(command.command, "git status");
    assert!(command.is_trusted);
    assert_eq!(command.start_x, Some(16));
    assert_eq!(command.executed_line, Some(1));
    assert_eq!(command.end_line, Some(2));
    assert_eq!(command.cwd.as_deref(), Some("/srv"));

    let unhandled = parser.take_unhandled();
    assert_eq!(unhandled.len(), 1);
    assert_eq!(unhandled[0].command, "1337");
}

#[test]
fn test_config_file_drives_router() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "nonce: from-file").unwrap();
    writeln!(file, "max_command_history: 2").unwrap();
    let config = ShellIntegrationConfig::from_file(file.path()).unwrap();

    let mut router = activated(config, None);
    for i in 0..4 {
        router.handle_osc(633, "A");
        router.handle_osc(633, "B");
        router.handle_osc(633, &format!("E;cmd{i};from-file"));
        router.handle_osc(633, "D;0");
    }
    let detection = router.capabilities().command_detection().unwrap();
    let lines: Vec<_> = detection
        .commands()
        .iter()
        .map(|c| c.command.as_str())
        .collect();
    assert_eq!(lines, vec!["cmd2", "cmd3"]);
    assert!(detection.commands().iter().all(|c| c.is_trusted));
}

#[test]
fn test_disabled_telemetry_reports_nothing() {
    let sink = Arc::new(Sink::default());
    let config = ShellIntegrationConfig {
        disable_telemetry: true,
        ..ShellIntegrationConfig::default()
    };
    let mut router = activated(config, Some(sink.clone()));
    assert!(!router.is_watchdog_armed());
    assert!(router.handle_osc(633, "A"));
    assert!(sink.events.lock().is_empty());
}
