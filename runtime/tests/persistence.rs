mod common;

use common::{read, wait_until, Harness, FACTORY, WAIT};
use vdev_runtime::{DeviceSnapshot, RuntimeError};
use vdev_storage::Node;

const BOOT: &str = r#"
fn main() {
    if Storage::exists("/boot") {
        Storage::write("/second", "1");
    } else {
        Storage::write("/boot", "1");
    }
}
"#;

#[test]
fn snapshot_round_trips_through_json() {
    let harness = Harness::new(BOOT);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));

    let snapshot = harness.manager.save(device.id()).unwrap();
    assert_eq!(&snapshot.device_id, device.id());
    assert_eq!(snapshot.factory_id, FACTORY);
    assert!(matches!(snapshot.persisted_store.get("boot"), Some(Node::File(_))));

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"device_id\""));
    assert_eq!(DeviceSnapshot::from_json(&json).unwrap(), snapshot);
}

#[test]
fn restore_creates_a_missing_device_and_resumes_it() {
    let first = Harness::new(BOOT);
    let device = first.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    let snapshot = first.manager.save(device.id()).unwrap();
    first.manager.destroy_device(device.id()).unwrap();
    assert!(first.manager.device(device.id()).is_none());
    assert_eq!(first.router.device_count(), 0);

    let second = Harness::new(BOOT);
    let restored = second.manager.restore(snapshot.clone()).unwrap();
    assert_eq!(restored.id(), device.id());
    assert_eq!(second.router.device_count(), 1);
    assert!(wait_until(WAIT, || read(&restored, "/second").is_some()));
}

#[test]
fn restore_replaces_the_store_of_a_live_device() {
    let harness = Harness::new(BOOT);
    let device = harness.device();
    device.start();
    assert!(wait_until(WAIT, || !device.is_running()));
    let before = harness.manager.save(device.id()).unwrap();

    // Second run sees /boot and writes /second.
    device.start();
    assert!(wait_until(WAIT, || read(&device, "/second").is_some()));

    let empty = DeviceSnapshot {
        persisted_store: Default::default(),
        ..before
    };
    let restored = harness.manager.restore(empty).unwrap();
    assert!(std::sync::Arc::ptr_eq(&restored, &device));
    assert!(wait_until(WAIT, || !device.is_running()));
    assert_eq!(read(&device, "/second"), None);
    assert_eq!(read(&device, "/boot").as_deref(), Some("1"));
}

#[test]
fn save_all_and_errors() {
    let harness = Harness::new(BOOT);
    let a = harness.device();
    let b = harness.device();
    assert_ne!(a.id(), b.id());
    assert_eq!(harness.manager.save_all().len(), 2);

    let unknown = vdev_runtime::DeviceId::parse("vdev/unknown");
    assert!(matches!(
        harness.manager.save(&unknown),
        Err(RuntimeError::DeviceNotFound(_))
    ));
    assert!(matches!(
        harness.manager.destroy_device(&unknown),
        Err(RuntimeError::DeviceNotFound(_))
    ));
    assert!(matches!(
        harness.manager.create_device("other").err(),
        Some(RuntimeError::UnknownFactory(_))
    ));
}

#[test]
fn fresh_ids_live_under_the_namespace() {
    let harness = Harness::new(BOOT);
    let device = harness.device();
    assert_eq!(device.id().components()[0], "vdev");
    assert_eq!(device.id().components().len(), 2);
}
