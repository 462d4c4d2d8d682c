use std::{collections::BTreeMap, thread, time::Duration};

use spincams::{
    Cameras, ImageQueue, PixelFormat, Result, System,
    config::{Config, SpincamsConfig},
    sdk::sim::{SimCamera, SimSystem},
};

fn collection(system: SimSystem, queue: &ImageQueue) -> Result<Cameras> {
    let mut cameras = Cameras::builder(System::new(system))
        .queue(queue.clone())
        .grab_timeout(Duration::from_millis(500))
        .build()?;
    assert!(cameras.initialise_cameras().is_ok());
    Ok(cameras)
}

#[test]
fn consumer_receives_every_frame_in_order() -> Result<()> {
    let queue = ImageQueue::bounded(4);
    let mut cameras = collection(SimSystem::with_cameras(2), &queue)?;

    let producer = thread::spawn(move || cameras.acquire_images(Some(10)));

    let mut per_camera: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for _ in 0..20 {
        let record = queue.pop()?;
        assert_eq!(record.image.pixel_format(), PixelFormat::RGB8);
        per_camera
            .entry(record.serial)
            .or_default()
            .push(record.frame_number);
    }

    let summary = producer.join().expect("producer panicked")?;
    assert_eq!(summary.rounds, 10);
    assert_eq!(summary.total_delivered(), 20);
    assert!(queue.is_empty());

    let expected: Vec<u64> = (0..10).collect();
    assert_eq!(per_camera.len(), 2);
    assert!(per_camera.values().all(|frames| *frames == expected));
    Ok(())
}

#[test]
fn stop_handle_ends_unbounded_acquisition() -> Result<()> {
    let queue = ImageQueue::unbounded();
    let system = SimSystem::new().with_camera(SimCamera::new("24132701").realtime(true));
    let mut cameras = collection(system, &queue)?;
    cameras.get_mut(0)?.set_frame_rate(100.0)?;

    let stop = cameras.stop_handle();
    let producer = thread::spawn(move || {
        let summary = cameras.acquire_images(None);
        let streaming = cameras.iter().any(spincams::Camera::is_streaming);
        (summary, streaming)
    });

    for _ in 0..3 {
        queue.pop()?;
    }
    stop.stop();

    let (summary, streaming) = producer.join().expect("producer panicked");
    let summary = summary?;
    assert!(summary.cancelled);
    assert!(summary.delivered_by("24132701") >= 3);
    assert!(!streaming);
    Ok(())
}

#[test]
fn configured_collection_applies_camera_settings() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(
        dir.path().join(SpincamsConfig::PATH),
        r#"
[acquisition]
num_images = 2
grab_timeout_ms = 250

[camera]
pixel_format = "RGB8"
exposure = { mode = "off", value = 2000.0 }

[cameras."24132702"]
exposure = { mode = "continuous" }
"#,
    )?;
    let config = SpincamsConfig::load(dir.path())?;

    let first = SimCamera::new("24132701").pixel_formats(&[PixelFormat::BayerRG8, PixelFormat::RGB8]);
    let second = SimCamera::new("24132702").pixel_formats(&[PixelFormat::BayerRG8, PixelFormat::RGB8]);
    let (first_monitor, second_monitor) = (first.monitor(), second.monitor());

    let queue = ImageQueue::unbounded();
    let builder = Cameras::builder(System::new(
        SimSystem::new().with_camera(first).with_camera(second),
    ))
    .queue(queue.clone());
    let mut cameras = config.acquisition.configure(builder).build()?;
    assert_eq!(cameras.grab_timeout(), Duration::from_millis(250));

    assert!(cameras.initialise_cameras().is_ok());
    assert!(config.apply(&mut cameras).is_ok());

    assert_eq!(first_monitor.float_value("ExposureTime"), Some(2000.0));
    assert_eq!(
        second_monitor.enum_value(spincams::sdk::NodeMap::Camera, "ExposureAuto").as_deref(),
        Some("Continuous")
    );
    assert_ne!(second_monitor.float_value("ExposureTime"), Some(2000.0));

    let summary = cameras.acquire_images(config.acquisition.num_images)?;
    assert_eq!(summary.total_delivered(), 4);
    assert_eq!(queue.len(), 4);
    Ok(())
}
