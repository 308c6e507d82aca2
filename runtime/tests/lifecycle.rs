mod common;

use std::time::{Duration, Instant};

use common::{read, wait_until, Harness, Options, WAIT};

const SLEEPER: &str = r#"
fn main() {
    Storage::write("/ready", "1");
    System::sleep(60000);
}
"#;

#[test]
fn device_is_created_stopped_and_starts_once() {
    let harness = Harness::new(SLEEPER);
    let device = harness.device();
    assert!(!device.is_running());
    assert_eq!(read(&device, "/ready"), None);

    device.start();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/ready").is_some()));
    assert!(device.is_running());

    device.stop();
    assert!(!device.is_running());
}

#[test]
fn stop_interrupts_sleep_promptly() {
    let harness = Harness::new(SLEEPER);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/ready").is_some()));

    let started = Instant::now();
    device.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!device.is_running());
}

#[test]
fn stop_interrupts_busy_loop() {
    let harness = Harness::new(
        r#"
        fn main() {
            Storage::write("/ready", "1");
            let x = 0;
            loop { x += 1; }
        }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/ready").is_some()));

    let started = Instant::now();
    device.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!device.is_running());
}

#[test]
fn stop_and_start_events_are_routed() {
    let harness = Harness::new(SLEEPER);
    let device = harness.device();
    let id = device.id().clone();

    assert_eq!(harness.router.start(Some(id.clone())), 1);
    assert!(wait_until(WAIT, || device.is_running()));

    assert_eq!(harness.router.stop(Some(id)), 1);
    assert!(!device.is_running());

    // Global start reaches every device.
    assert_eq!(harness.router.start(None), 1);
    assert!(wait_until(WAIT, || device.is_running()));
    harness.manager.shutdown();
    assert!(!device.is_running());
}

#[test]
fn global_stop_reaches_every_device() {
    let harness = Harness::new(SLEEPER);
    let a = harness.device();
    let b = harness.device();
    a.start();
    b.start();
    assert!(wait_until(WAIT, || read(&a, "/ready").is_some()
        && read(&b, "/ready").is_some()));

    assert_eq!(harness.router.stop(None), 2);
    assert!(!a.is_running());
    assert!(!b.is_running());

    // Stopping a stopped device does nothing.
    let started = Instant::now();
    a.stop();
    assert_eq!(harness.router.stop(Some(b.id().clone())), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!a.is_running() && !b.is_running());

    assert_eq!(harness.router.start(None), 2);
    assert!(wait_until(WAIT, || a.is_running() && b.is_running()));
    harness.manager.shutdown();
    assert!(!a.is_running() && !b.is_running());
}

#[test]
fn finished_script_ends_the_thread() {
    let harness = Harness::new(r#"fn main() { Storage::write("/done", "yes"); }"#);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    assert_eq!(read(&device, "/done").as_deref(), Some("yes"));

    // A finished device can be started again; its store survived.
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
}

const COUNT_AND_FAIL: &str = r#"
fn main() {
    let previous = Storage::read_text("/runs");
    let runs = if previous.success { parse_int(previous.data) } else { 0 };
    Storage::delete("/runs");
    Storage::write("/runs", `${runs + 1}`);
    throw "boom";
}
"#;

fn runs(device: &vdev_runtime::Device) -> i64 {
    read(device, "/runs")
        .and_then(|r| r.parse().ok())
        .unwrap_or(0)
}

#[test]
fn script_fault_ends_the_thread_without_reset() {
    let harness = Harness::new(COUNT_AND_FAIL);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running() && runs(&device) == 1));

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(runs(&device), 1);
}

#[test]
fn script_fault_restarts_with_reset() {
    let harness = Harness::with_options(
        COUNT_AND_FAIL,
        Options {
            reset_on_fault: true,
            ..Options::default()
        },
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || runs(&device) >= 3));
    device.stop();
    assert!(!device.is_running());
}

#[test]
fn host_reload_restarts_the_script() {
    let harness = Harness::new(
        r#"
        fn main() {
            let previous = Storage::read_text("/runs");
            let runs = if previous.success { parse_int(previous.data) } else { 0 };
            Storage::delete("/runs");
            Storage::write("/runs", `${runs + 1}`);
            System::sleep(60000);
        }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || runs(&device) == 1));

    device.reload().unwrap();
    assert!(wait_until(WAIT, || runs(&device) >= 2));
    assert!(device.is_running());
    device.stop();
}

#[test]
fn reload_picks_up_edited_scripts() {
    let harness = Harness::new(r#"fn main() { Storage::write("/version", "1"); }"#);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/version").is_some()));
    assert!(wait_until(WAIT, || !device.is_running()));

    harness.write_script("main.rhai", r#"fn main() { Storage::write("/edited", "2"); }"#);
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/edited").is_some()));
}

#[test]
fn start_runs_the_current_entry_module() {
    let harness = Harness::new(r#"fn main() { Storage::write("/v1", "1"); }"#);
    let device = harness.device();
    harness.write_script("main.rhai", r#"fn main() { Storage::write("/v2", "1"); }"#);

    device.start();
    assert!(wait_until(WAIT, || !device.is_running() && read(&device, "/v2").is_some()));
    assert_eq!(read(&device, "/v1"), None);
}

#[test]
fn events_queued_while_stopped_are_dropped_on_start() {
    let harness = Harness::new(
        r#"fn main() { Storage::write("/seen", `${Event::poll().len()}`); }"#,
    );
    let device = harness.device();
    assert_eq!(harness.router.tick(1), 1);
    assert_eq!(harness.router.tick(2), 1);

    device.start();
    assert!(wait_until(WAIT, || read(&device, "/seen").is_some()));
    assert_eq!(read(&device, "/seen").as_deref(), Some("0"));
}

#[test]
fn missing_entry_module_fails_creation() {
    let harness = Harness::new("fn main() {}");
    std::fs::remove_file(harness.package_dir().join("main.rhai")).unwrap();
    let err = harness
        .manager
        .create_device(common::FACTORY)
        .err()
        .unwrap();
    assert!(matches!(err, vdev_runtime::RuntimeError::EntryModule { .. }));
    assert!(harness.manager.devices().is_empty());
}

#[test]
fn missing_entry_function_is_a_fault() {
    let harness = Harness::new(r#"Storage::write("/top", "1"); fn other() {}"#);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
}
