//! End-to-end tests of the engine driver against a scripted engine.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::mpsc;
use uci_driver::{
    AnalysisRegistry, AnalysisState, AnalysisTarget, DriverConfig, DriverError, DriverEvent,
    EngineDriver, EnginePreferences, PreferenceOutcome, UciDirection,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// The engine side of an attached driver.
struct FakeEngine {
    input: Lines<BufReader<DuplexStream>>,
    output: DuplexStream,
}

impl FakeEngine {
    /// Next line the driver wrote.
    async fn read_line(&mut self) -> String {
        tokio::time::timeout(TIMEOUT, self.input.next_line())
            .await
            .expect("timed out waiting for driver output")
            .expect("failed to read driver output")
            .expect("driver closed its output")
    }

    async fn expect(&mut self, expected: &str) {
        assert_eq!(self.read_line().await, expected);
    }

    async fn say(&mut self, text: &str) {
        self.output.write_all(text.as_bytes()).await.unwrap();
        self.output.flush().await.unwrap();
    }
}

/// Attach a driver to a fake engine, leaving the events untaken.
async fn attach_engine(config: DriverConfig) -> (EngineDriver, FakeEngine) {
    let (driver_reader, engine_output) = tokio::io::duplex(4096);
    let (engine_input, driver_writer) = tokio::io::duplex(4096);

    let driver = EngineDriver::attach(driver_reader, driver_writer, config)
        .await
        .expect("failed to attach driver");
    let mut engine = FakeEngine {
        input: BufReader::new(engine_input).lines(),
        output: engine_output,
    };
    engine.expect("uci").await;
    (driver, engine)
}

async fn attach(config: DriverConfig) -> (EngineDriver, mpsc::Receiver<DriverEvent>, FakeEngine) {
    let (mut driver, engine) = attach_engine(config).await;
    let events = driver.take_events().expect("events already taken");
    (driver, events, engine)
}

async fn next_event(events: &mut mpsc::Receiver<DriverEvent>) -> DriverEvent {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn wait_for_count(registry: &AnalysisRegistry, expected: i64) {
    tokio::time::timeout(TIMEOUT, async {
        while registry.current() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("registry never reached the expected count");
}

fn target(text: &str) -> AnalysisTarget {
    AnalysisTarget::new(text).unwrap()
}

#[tokio::test]
async fn test_handshake_reports_name_and_options_once() {
    let registry = AnalysisRegistry::new();
    let (driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(registry)).await;

    engine
        .say(
            "id name Fake 1.0\n\
             id author Somebody\n\
             option name Hash type spin default 16 min 1 max 1024\n\
             option name Ponder type check default false\n\
             uciok\n",
        )
        .await;

    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::EngineName {
            name: "Fake 1.0".to_string()
        }
    );
    match next_event(&mut events).await {
        DriverEvent::OptionsReady { options } => {
            assert_eq!(options.len(), 1);
            assert_eq!(options[0].name, "Hash");
            assert_eq!(options[0].min, Some(1));
            assert_eq!(options[0].max, Some(1024));
        }
        other => panic!("expected options, got {:?}", other),
    }

    // A second uciok must not deliver the options again.
    engine.say("uciok\nid name Marker\n").await;
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::EngineName {
            name: "Marker".to_string()
        }
    );

    let status = driver.status().await.unwrap();
    assert_eq!(status.engine_name.as_deref(), Some("Marker"));
    assert_eq!(status.options.map(|o| o.len()), Some(1));
}

#[tokio::test]
async fn test_lines_split_across_writes() {
    let (_driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(AnalysisRegistry::new())).await;

    engine.say("id na").await;
    engine.say("me Split").await;
    engine.say("ter\r\n").await;

    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::EngineName {
            name: "Splitter".to_string()
        }
    );
}

#[tokio::test]
async fn test_start_and_stop_analysis() {
    let registry = AnalysisRegistry::new();
    let (driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(registry.clone())).await;

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;
    assert_eq!(registry.current(), 1);

    // Already analyzing: nothing is sent.
    driver.set_analyzing(true).await.unwrap();

    driver.set_analyzing(false).await.unwrap();
    engine.expect("stop").await;
    assert_eq!(registry.current(), 1);

    let status = driver.status().await.unwrap();
    assert_eq!(status.state, AnalysisState::Idle);
    assert!(status.cycle_pending);

    engine.say("bestmove e2e4 ponder e7e5\n").await;
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::CycleComplete {
            best_move: Some("e2e4".to_string()),
            ponder: Some("e7e5".to_string()),
        }
    );
    assert_eq!(registry.current(), 0);
}

#[tokio::test]
async fn test_target_swap_waits_for_bestmove() {
    let registry = AnalysisRegistry::new();
    let (driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(registry.clone())).await;

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;

    driver
        .set_target(target("startpos moves e2e4"))
        .await
        .unwrap();
    engine.expect("stop").await;

    // Swapping again while stopping only replaces the parked target.
    driver
        .set_target(target("startpos moves d2d4"))
        .await
        .unwrap();
    let status = driver.status().await.unwrap();
    assert_eq!(status.state, AnalysisState::Analyzing);
    assert_eq!(registry.current(), 1);

    engine.say("bestmove e2e4\n").await;
    assert!(matches!(
        next_event(&mut events).await,
        DriverEvent::CycleComplete { .. }
    ));
    engine.expect("position startpos moves d2d4").await;
    engine.expect("go infinite").await;
    assert_eq!(registry.current(), 1);

    // Search output is now resolved against the new target: black to move.
    engine
        .say("info depth 12 score cp 30 multipv 1 pv g8f6 c2c4\n")
        .await;
    match next_event(&mut events).await {
        DriverEvent::NewLine(line) => {
            assert_eq!(line.depth, 12);
            assert_eq!(line.first_move(), Some("g8f6"));
            assert_eq!(line.format_moves(), "1... g8f6 2. c2c4");
        }
        other => panic!("expected a line, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undrained_events_do_not_block_commands() {
    let registry = AnalysisRegistry::new();
    let mut config = DriverConfig::default().with_registry(registry.clone());
    config.event_capacity = 8;
    // Nobody ever takes the events.
    let (driver, mut engine) = attach_engine(config).await;

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;

    // Far more than fits in the channel or the pipe buffer.
    let flood: String = (1..=400)
        .map(|depth| format!("info depth {} score cp 10 multipv 1 pv e2e4 e7e5\n", depth))
        .collect();
    tokio::time::timeout(TIMEOUT, engine.say(&flood))
        .await
        .expect("driver stopped reading engine output");

    tokio::time::timeout(TIMEOUT, driver.set_analyzing(false))
        .await
        .expect("stop request never completed")
        .unwrap();
    engine.expect("stop").await;

    engine.say("bestmove e2e4\n").await;
    wait_for_count(&registry, 0).await;
    let status = driver.status().await.unwrap();
    assert_eq!(status.state, AnalysisState::Idle);
    assert!(!status.cycle_pending);
}

#[tokio::test]
async fn test_event_stream() {
    use tokio_stream::StreamExt;

    let (mut driver, mut engine) =
        attach_engine(DriverConfig::default().with_registry(AnalysisRegistry::new())).await;
    let mut stream = driver.event_stream().expect("events already taken");
    assert!(driver.take_events().is_none());

    engine.say("id name Streamed\nuciok\n").await;

    let first = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(
        first,
        Some(DriverEvent::EngineName {
            name: "Streamed".to_string()
        })
    );
    let second = tokio::time::timeout(TIMEOUT, stream.next()).await.unwrap();
    assert_eq!(second, Some(DriverEvent::OptionsReady { options: vec![] }));

    // The stream ends once the driver is gone.
    driver.shutdown().await.unwrap();
    let rest: Vec<DriverEvent> = tokio::time::timeout(TIMEOUT, stream.collect())
        .await
        .unwrap();
    assert!(rest
        .iter()
        .all(|event| matches!(event, DriverEvent::EngineExited)));
}

#[tokio::test]
async fn test_current_move_event() {
    let (_driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(AnalysisRegistry::new())).await;

    engine
        .say("info depth 20 currmove e2e4 currmovenumber 1\n")
        .await;
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::CurrentMove {
            mv: "e2e4".to_string(),
            number: 1,
            depth: 20,
        }
    );
}

#[tokio::test]
async fn test_analyzing_without_target_is_rejected() {
    let registry = AnalysisRegistry::new();
    let (driver, _events, _engine) =
        attach(DriverConfig::default().with_registry(registry.clone())).await;

    let result = driver.set_analyzing(true).await;
    assert!(matches!(result, Err(DriverError::NoTarget)));
    assert_eq!(registry.current(), 0);
}

#[tokio::test]
async fn test_preferences_refused_while_analyzing() {
    let (driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(AnalysisRegistry::new())).await;

    engine
        .say("option name Threads type spin default 1 min 1 max 8\nuciok\n")
        .await;
    assert!(matches!(
        next_event(&mut events).await,
        DriverEvent::OptionsReady { .. }
    ));

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;

    let preferences = EnginePreferences {
        threads: Some(64),
        ..Default::default()
    };
    let outcome = driver.apply_preferences(preferences.clone()).await.unwrap();
    assert_eq!(outcome, PreferenceOutcome::Refused);

    driver.set_analyzing(false).await.unwrap();
    engine.expect("stop").await;
    engine.say("bestmove e2e4\n").await;
    assert!(matches!(
        next_event(&mut events).await,
        DriverEvent::CycleComplete { .. }
    ));

    let outcome = driver.apply_preferences(preferences).await.unwrap();
    assert_eq!(outcome, PreferenceOutcome::Applied(1));
    engine.expect("setoption name Threads value 8").await;
}

#[tokio::test]
async fn test_raw_echo() {
    let (_driver, mut events, mut engine) = attach(
        DriverConfig::default()
            .with_registry(AnalysisRegistry::new())
            .with_echo_raw(true),
    )
    .await;

    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::Raw {
            direction: UciDirection::ToEngine,
            line: "uci".to_string(),
        }
    );

    engine.say("uciok\n").await;
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::Raw {
            direction: UciDirection::FromEngine,
            line: "uciok".to_string(),
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::OptionsReady { options: vec![] }
    );
}

#[tokio::test]
async fn test_dropping_driver_balances_registry() {
    let registry = AnalysisRegistry::new();
    let (driver, _events, mut engine) =
        attach(DriverConfig::default().with_registry(registry.clone())).await;

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;
    assert_eq!(registry.current(), 1);

    drop(driver);
    wait_for_count(&registry, 0).await;
}

#[tokio::test]
async fn test_engine_exit_is_reported() {
    let registry = AnalysisRegistry::new();
    let (driver, mut events, mut engine) =
        attach(DriverConfig::default().with_registry(registry.clone())).await;

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    engine.expect("position startpos").await;
    engine.expect("go infinite").await;

    // Unterminated output is dropped when the engine goes away.
    engine.say("id name Trunc").await;
    drop(engine);

    assert_eq!(next_event(&mut events).await, DriverEvent::EngineExited);
    assert_eq!(registry.current(), 0);

    tokio::time::timeout(TIMEOUT, async {
        while driver.status().await.is_ok() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("driver kept running after the engine exited");
    assert!(matches!(
        driver.set_target(target("startpos")).await,
        Err(DriverError::Closed)
    ));
}

#[tokio::test]
async fn test_independent_drivers_share_registry() {
    let registry = AnalysisRegistry::new();
    let config = DriverConfig::default().with_registry(registry.clone());
    let (first, _first_events, mut first_engine) = attach(config.clone()).await;
    let (second, _second_events, mut second_engine) = attach(config).await;

    for (driver, engine) in [(&first, &mut first_engine), (&second, &mut second_engine)] {
        driver.set_target(target("startpos")).await.unwrap();
        driver.set_analyzing(true).await.unwrap();
        engine.expect("position startpos").await;
        engine.expect("go infinite").await;
    }
    assert_eq!(registry.current(), 2);

    drop(first);
    wait_for_count(&registry, 1).await;
    drop(second);
    wait_for_count(&registry, 0).await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_launch_shell_engine() {
    use uci_driver::LaunchConfig;

    let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name ShellFish"; echo "uciok" ;;
    quit) exit 0 ;;
  esac
done
"#;
    let launch = LaunchConfig::new("/bin/sh").with_args(["-c", script]);
    let config = DriverConfig::default().with_registry(AnalysisRegistry::new());

    let mut driver = EngineDriver::launch(&launch, config).await.unwrap();
    assert!(driver.pid().is_some());
    let mut events = driver.take_events().unwrap();

    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::EngineName {
            name: "ShellFish".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        DriverEvent::OptionsReady { options: vec![] }
    );

    driver.shutdown().await.unwrap();
}

/// Whether a process with `pid` still exists, zombies included.
#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    // SAFETY: signal 0 performs only the existence and permission checks.
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_while_analyzing_shell_engine() {
    use uci_driver::LaunchConfig;

    let script = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name ShellFish"; echo "uciok" ;;
    quit) exit 0 ;;
  esac
done
"#;
    let launch = LaunchConfig::new("/bin/sh").with_args(["-c", script]);
    let registry = AnalysisRegistry::new();
    let config = DriverConfig::default().with_registry(registry.clone());

    let driver = EngineDriver::launch(&launch, config).await.unwrap();
    let pid = driver.pid().expect("child has a pid");

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    assert_eq!(registry.current(), 1);

    tokio::time::timeout(TIMEOUT, driver.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    assert_eq!(registry.current(), 0);
    assert!(!process_exists(pid));
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_kills_engine_ignoring_quit() {
    use uci_driver::LaunchConfig;

    // Ignores SIGINT and `quit`, so only the kill gets rid of it.
    let script = r#"
trap '' INT
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
  esac
done
"#;
    let launch = LaunchConfig::new("/bin/sh").with_args(["-c", script]);
    let registry = AnalysisRegistry::new();
    let mut config = DriverConfig::default().with_registry(registry.clone());
    config.shutdown_grace = Duration::from_millis(200);

    let driver = EngineDriver::launch(&launch, config).await.unwrap();
    let pid = driver.pid().expect("child has a pid");

    driver.set_target(target("startpos")).await.unwrap();
    driver.set_analyzing(true).await.unwrap();
    assert_eq!(registry.current(), 1);

    tokio::time::timeout(TIMEOUT, driver.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
    assert_eq!(registry.current(), 0);
    assert!(!process_exists(pid));
}

#[tokio::test]
async fn test_launch_missing_binary_fails() {
    let launch = uci_driver::LaunchConfig::new("/nonexistent/engine-binary");
    let result = EngineDriver::launch(&launch, DriverConfig::default()).await;
    assert!(matches!(result, Err(DriverError::Process(_))));
}
