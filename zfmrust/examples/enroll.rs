//! Fingerprint capture and enroll example
//!
//! Registers a ready listener so the whole workflow reruns every time the
//! sensor becomes available, then captures the same finger twice, checks it
//! is not already enrolled, and stores the merged template.

use std::time::Duration;

use zfmrust::{BufferId, Response, Sensor, SensorConfig, Value};

const POLL: Duration = Duration::from_millis(200);

async fn enroll(sensor: Sensor) -> zfmrust::Result<()> {
    // Make sure the device answers before driving the workflow
    let recv = sensor.password_verify().await?;
    if !recv.succeeded() {
        eprintln!("Error when trying to communicate with the device: {}", recv.code());
        return Ok(());
    }
    sensor.backlight(false).await?;

    // Repeat until both fingerprints are detected correctly
    let mut tries = 0;
    let mut buffer = BufferId::Buffer1;
    loop {
        // Wait until the finger leaves the sensor, then presses again
        sensor.wait_finger(false, POLL, None).await?;
        sensor.wait_finger(true, POLL, None).await?;
        sensor.image_capture().await?;
        sensor.backlight(false).await?;

        // Convert the image
        let recv = sensor.image_convert(buffer).await?;
        if !recv.succeeded() {
            tries += 1;
            if tries >= 3 {
                eprintln!("Unable to get a good image of the fingerprint: {}", recv.code());
                return Ok(());
            }
            println!("Error when converting fingerprint image ({}). Try again!", recv.code());
            continue;
        }
        tries = 0;

        match buffer {
            BufferId::Buffer1 => {
                // Check that the finger is not registered yet
                if let Response::MatchResult { index, .. } = sensor.match_1_n(buffer).await? {
                    if index != -1 {
                        eprintln!("Finger already registered on index #{index}");
                        return Ok(());
                    }
                }
                buffer = BufferId::Buffer2;
            }
            BufferId::Buffer2 => {
                // Check that both captures match
                let recv = sensor.match_1_1().await?;
                if !recv.succeeded() {
                    tries += 1;
                    if tries >= 3 {
                        eprintln!("Fingers didn't match several times");
                        return Ok(());
                    }
                    println!("Fingers don't match. Try again!");
                    continue;
                }
                break;
            }
        }
    }

    // Generate the template
    let recv = sensor.template_create().await?;
    if !recv.succeeded() {
        eprintln!("Template creation failed: {}", recv.code());
        return Ok(());
    }

    // Store it on the first free slot
    match sensor.template_save(BufferId::Buffer1, None).await? {
        Response::WithValue {
            value: Value::Integer(index),
            ..
        } => println!("Fingerprint stored successfully on index #{index}"),
        recv => eprintln!("Template store failed: {}", recv.code()),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> zfmrust::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let port = std::env::var("SENSOR_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    // Perform the enrollment every time the sensor gets connected
    let sensor = Sensor::new(SensorConfig::new(port));
    let worker = sensor.clone();
    sensor.on_ready(move || {
        let sensor = worker.clone();
        Box::pin(async move {
            if let Err(e) = enroll(sensor.clone()).await {
                eprintln!("{e}");
            }
            // Stop the session gracefully once the workflow is done
            sensor.stop().await;
        })
    });

    sensor.join().await;
    Ok(())
}
