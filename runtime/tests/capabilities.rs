mod common;

use collection_literals::collection;
use common::{persisted, read, wait_until, Harness, Options, WAIT};
use rhai::Dynamic;
use vdev_net::executor::mock::MockExecutor;
use vdev_net::{HttpResponse, NetworkPolicy, PolicyMode};
use vdev_runtime::{DeviceId, DrawCommand, FrameContext};
use vdev_storage::{PersistedStore, StoragePath};

#[test]
fn addressed_events_reach_only_their_device() {
    let harness = Harness::new(
        r#"
        fn main() {
            Storage::make_directory("/keys");
            Storage::write("/ready", "1");
            loop {
                for event in Event::poll() {
                    if event["type"] == "keyPressed" {
                        Storage::write(`/keys/${event.data[0]}`, "down");
                    }
                }
                System::sleep(5);
            }
        }
        "#,
    );
    let a = harness.device();
    let b = harness.device();
    a.start();
    b.start();
    assert!(wait_until(WAIT, || read(&a, "/ready").is_some()
        && read(&b, "/ready").is_some()));

    assert_eq!(harness.router.key_pressed(a.id().clone(), "A"), 1);
    assert_eq!(harness.router.key_pressed(DeviceId::parse("vdev/none"), "Z"), 0);
    assert_eq!(harness.router.tick(1), 2);

    assert!(wait_until(WAIT, || read(&a, "/keys/A").is_some()));
    assert_eq!(read(&b, "/keys/A"), None);
    harness.manager.shutdown();
}

#[test]
fn timers_run_when_the_script_polls() {
    let harness = Harness::new(
        r#"
        fn fired() { Storage::write("/timer", "fired"); }
        fn never() { Storage::write("/cancelled", "ran"); }

        fn main() {
            System::set_timeout(Fn("fired"), 10);
            let id = System::set_timeout(Fn("never"), 10);
            System::clear_timeout(id);
            loop {
                Event::poll();
                System::sleep(5);
            }
        }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/timer").is_some()));
    assert_eq!(read(&device, "/cancelled"), None);
    device.stop();
}

#[test]
fn host_pumps_tasks_left_by_a_finished_script() {
    let harness = Harness::new(
        r#"
        fn later(value) { Storage::write("/later", `${value}`); }
        fn main() { System::set_timeout(Fn("later").curry(7), 0); }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    assert_eq!(device.tasks().len(), 1);

    assert_eq!(device.process_tasks(), 1);
    assert_eq!(read(&device, "/later").as_deref(), Some("7"));
    assert_eq!(device.process_tasks(), 0);
}

#[test]
fn render_commands_flush_on_render_events() {
    let harness = Harness::new(
        r#"
        fn main() {
            Render::clear(0);
            Render::pixel(1, 2, 0xff0000);
            Render::rect(0, 0, Render::width(), 4, 0x00ff00);
            Render::text(3, 3, "hi", 0xffffff);
            Storage::write("/drawn", "1");
            System::sleep(60000);
        }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/drawn").is_some()));

    let frame = FrameContext {
        frame: 1,
        width: 256,
        height: 256,
    };
    assert_eq!(harness.router.render(frame), 1);
    device.stop();

    let frames = harness.frames.0.lock();
    assert_eq!(frames.len(), 1);
    let (id, frame) = &frames[0];
    assert_eq!(id, device.id());
    assert_eq!(frame.frame, 1);
    assert_eq!(
        frame.commands,
        vec![
            DrawCommand::Clear { color: 0 },
            DrawCommand::Pixel {
                x: 1,
                y: 2,
                color: 0xff0000
            },
            DrawCommand::Rect {
                x: 0,
                y: 0,
                width: 256,
                height: 4,
                color: 0x00ff00
            },
            DrawCommand::Text {
                x: 3,
                y: 3,
                text: "hi".into(),
                color: 0xffffff
            },
        ]
    );
}

#[test]
fn network_requests_follow_the_policy() {
    let http = MockExecutor::new()
        .with_response("http://api.test/data", HttpResponse::new(200, "payload"));
    let harness = Harness::with_options(
        r#"
        fn main() {
            let response = Network::request_http("http://api.test/data", "GET", #{ "X-Device": System::id() });
            Storage::write("/status", `${response.statusCode}`);
            Storage::write("/body", response.body);
            try {
                Network::request_http("http://evil.test/", "GET");
            } catch (err) {
                Storage::write("/blocked", "yes");
            }
            if !Network::is_allowed("http://evil.test/") {
                Storage::write("/checked", "yes");
            }
        }
        "#,
        Options {
            network: NetworkPolicy::new(PolicyMode::AllowSome, ["api.test"]),
            http: http.clone(),
            ..Options::default()
        },
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));

    assert_eq!(read(&device, "/status").as_deref(), Some("200"));
    assert_eq!(read(&device, "/body").as_deref(), Some("payload"));
    assert_eq!(read(&device, "/blocked").as_deref(), Some("yes"));
    assert_eq!(read(&device, "/checked").as_deref(), Some("yes"));

    let requests = http.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].headers["X-Device"], device.id().to_string());
}

#[test]
fn async_requests_deliver_to_their_callback() {
    let http = MockExecutor::new().with_default_response(HttpResponse::new(201, "made"));
    let harness = Harness::with_options(
        r#"
        fn on_response(response) {
            Storage::write("/async", `${response.statusCode}:${response.body}`);
        }
        fn on_error(response) {
            Storage::write("/async-error", `${response.contains("error")}`);
        }
        fn main() {
            Network::request_http_async("http://api.test/new", "POST", #{}, "body", Fn("on_response"));
            Network::request_http_async("http://evil.test/", "GET", #{}, (), Fn("on_error"));
            loop {
                Event::poll();
                System::sleep(5);
            }
        }
        "#,
        Options {
            network: NetworkPolicy::new(PolicyMode::BlockSome, ["evil.test"]),
            http: http.clone(),
            ..Options::default()
        },
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/async").is_some()
        && read(&device, "/async-error").is_some()));
    device.stop();

    assert_eq!(read(&device, "/async").as_deref(), Some("201:made"));
    assert_eq!(read(&device, "/async-error").as_deref(), Some("true"));
    let requests = http.recorded_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.as_deref(), Some(&b"body"[..]));
}

#[test]
fn modules_import_from_storage_relative_to_their_importer() {
    let harness = Harness::new(
        r#"
        import "/lib/util" as util;
        fn main() { Storage::write("/result", `${util::quadruple(5)}`); }
        "#,
    );
    let store = PersistedStore::new();
    let files: std::collections::HashMap<&str, &str> = collection! {
        "/lib/util.rhai" => r#"import "./math" as math; fn quadruple(x) { math::double(math::double(x)) }"#,
        "/lib/math.rhai" => "fn double(x) { x * 2 }",
        "/lib/consts.rhai" => "export const ANSWER = 42;",
    };
    let storage = persisted(&store);
    storage.make_directory(&StoragePath::parse("/lib")).unwrap();
    for (path, source) in &files {
        storage.write_text(&StoragePath::parse(path), source).unwrap();
    }

    let snapshot = vdev_runtime::DeviceSnapshot {
        device_id: DeviceId::parse("vdev/imports"),
        factory_id: common::FACTORY.to_string(),
        persisted_store: store.snapshot(),
    };
    let device = harness.manager.restore(snapshot).unwrap();
    assert!(wait_until(WAIT, || read(&device, "/result").is_some()));
    assert_eq!(read(&device, "/result").as_deref(), Some("20"));

    let exports = device.load_module("/lib/consts").unwrap().unwrap();
    assert_eq!(exports["ANSWER"].as_int().unwrap(), 42);
    assert!(matches!(
        device.load_module("/lib/missing"),
        Err(vdev_runtime::RuntimeError::ModuleNotFound(_))
    ));
}

#[test]
fn system_load_module_returns_exports() {
    let harness = Harness::new(
        r#"
        fn main() {
            let config = System::load_module("./settings");
            Storage::write("/name", config.NAME);
        }
        "#,
    );
    harness.write_script("settings.rhai", r#"export const NAME = "panel";"#);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/name").is_some()));
    assert_eq!(read(&device, "/name").as_deref(), Some("panel"));
}

#[test]
fn globals_left_by_a_run_are_visible_to_the_host() {
    let harness = Harness::new(
        r#"
        let greeting = "hello";
        fn main() {}
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    assert_eq!(
        device.get("greeting").unwrap().into_string().unwrap(),
        "hello"
    );

    assert!(device.set("name", Dynamic::from("vdev".to_string())));
    assert_eq!(device.get("name").unwrap().into_string().unwrap(), "vdev");
    assert!(device.get("missing").is_none());

    // A reload starts from an empty scope.
    device.reload().unwrap();
    assert!(device.get("greeting").is_none());
    assert!(device.get("name").is_none());
}

#[test]
fn storage_responses_reach_the_script() {
    let harness = Harness::new(
        r#"
        fn main() {
            let missing = Storage::read("/nope");
            Storage::write("/error", missing.error);
            let listing = Storage::list("/");
            Storage::write("/count", `${listing.data.len()}`);
            Storage::write("/exists", `${Storage::exists("/error")}`);
            let file = Storage::read("/error");
            let meta = file.data.metadata;
            Storage::write("/read", `${meta.name}:${meta.size}:${file.data.bytes.len()}`);
        }
        "#,
    );
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    assert_eq!(read(&device, "/error").as_deref(), Some("FileNotFound"));
    // main.rhai from the package layer plus /error.
    assert_eq!(read(&device, "/count").as_deref(), Some("2"));
    assert_eq!(read(&device, "/exists").as_deref(), Some("true"));
    assert_eq!(read(&device, "/read").as_deref(), Some("error:12:12"));
}
