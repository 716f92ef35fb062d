//! Enrollment scenarios against a scripted device

mod support;

use std::time::Duration;

use bytes::Bytes;
use pretty_assertions::assert_eq;

use support::{ack_frame, data_frame, scripted_factory, Step, ADDRESS};
use zfmrust::{
    BaudRate, BufferId, Error, PacketSize, Response, SecurityLevel, Sensor, SensorConfig,
    StatusCode, SystemParameters, Value,
};

fn fast_config() -> SensorConfig {
    SensorConfig::new("scripted")
        .with_ack_timeout(Duration::from_millis(50))
        .with_reconnect_backoff(Duration::from_millis(20))
}

#[tokio::test]
async fn enrollment_happy_path() {
    let script = vec![
        Step::Reply(ack_frame(StatusCode::Success, &[])), // password verify
        Step::Reply(ack_frame(StatusCode::Success, &[])), // capture 1
        Step::Reply(ack_frame(StatusCode::Success, &[])), // convert into buffer 1
        Step::Reply(ack_frame(StatusCode::FingerNotFound, &[])), // 1:N search: unknown finger
        Step::Reply(ack_frame(StatusCode::Success, &[])), // capture 2
        Step::Reply(ack_frame(StatusCode::Success, &[])), // convert into buffer 2
        Step::Reply(ack_frame(StatusCode::Success, &[0x00, 0x7B])), // 1:1 match, score 123
        Step::Reply(ack_frame(StatusCode::Success, &[])), // template create
        Step::Reply(ack_frame(StatusCode::Success, &[])), // template save
    ];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    assert!(sensor.image_capture().await.unwrap().succeeded());
    assert!(
        sensor
            .image_convert(BufferId::Buffer1)
            .await
            .unwrap()
            .succeeded()
    );

    let found = sensor.match_1_n(BufferId::Buffer1).await.unwrap();
    assert_eq!(
        found,
        Response::MatchResult {
            succeeded: false,
            code: StatusCode::FingerNotFound,
            index: -1,
            score: 0,
        }
    );

    assert!(sensor.image_capture().await.unwrap().succeeded());
    assert!(
        sensor
            .image_convert(BufferId::Buffer2)
            .await
            .unwrap()
            .succeeded()
    );

    let matched = sensor.match_1_1().await.unwrap();
    assert_eq!(
        matched,
        Response::MatchResult {
            succeeded: true,
            code: StatusCode::Success,
            index: -1,
            score: 123,
        }
    );

    assert!(sensor.template_create().await.unwrap().succeeded());

    let saved = sensor
        .template_save(BufferId::Buffer1, Some(42))
        .await
        .unwrap();
    assert_eq!(
        saved,
        Response::WithValue {
            succeeded: true,
            code: StatusCode::Success,
            value: Value::Integer(42),
        }
    );

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn template_save_picks_first_free_slot() {
    // Index page 0: byte 0 fully occupied, byte 1 has bits 0..=2 set,
    // so the first free slot is 8 + 3 = 11
    let script = vec![
        Step::Reply(ack_frame(StatusCode::Success, &[])),
        Step::Reply(ack_frame(StatusCode::Success, &[0xFF, 0b0000_0111])),
        Step::Reply(ack_frame(StatusCode::Success, &[])),
    ];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let saved = sensor.template_save(BufferId::Buffer2, None).await.unwrap();
    assert_eq!(
        saved,
        Response::WithValue {
            succeeded: true,
            code: StatusCode::Success,
            value: Value::Integer(11),
        }
    );

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn parameters_get_decodes_block() {
    let params = SystemParameters {
        status: 0x0002,
        id: 0x0009,
        address: ADDRESS,
        capacity: 1000,
        packet_size: PacketSize::Size128,
        security: SecurityLevel::Level3,
        baud_rate: BaudRate::Baud57600,
    };
    let script = vec![
        Step::Reply(ack_frame(StatusCode::Success, &[])),
        Step::Reply(ack_frame(StatusCode::Success, &params.serialize())),
    ];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let response = sensor.parameters_get().await.unwrap();
    assert_eq!(
        response,
        Response::WithValue {
            succeeded: true,
            code: StatusCode::Success,
            value: Value::Parameters(params),
        }
    );

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn template_download_concatenates_chunks() {
    let script = vec![
        Step::Reply(ack_frame(StatusCode::Success, &[])),
        Step::ReplyMany(vec![
            ack_frame(StatusCode::Success, &[]),
            data_frame(false, &[1, 2, 3]),
            data_frame(true, &[4, 5]),
        ]),
    ];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let response = sensor.template_download(BufferId::Buffer1).await.unwrap();
    assert_eq!(
        response,
        Response::WithValue {
            succeeded: true,
            code: StatusCode::Success,
            value: Value::Bytes(Bytes::from(vec![1, 2, 3, 4, 5])),
        }
    );

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn truncated_download_is_transfer_incomplete() {
    // The stream never delivers its end-of-data chunk
    let script = vec![
        Step::Reply(ack_frame(StatusCode::Success, &[])),
        Step::ReplyMany(vec![
            ack_frame(StatusCode::Success, &[]),
            data_frame(false, &[1, 2, 3]),
        ]),
    ];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let err = sensor
        .template_download(BufferId::Buffer1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TransferIncomplete(_)));

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn notepad_page_validated_before_io() {
    let script = vec![Step::Reply(ack_frame(StatusCode::Success, &[]))];
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let err = sensor.notepad_get(16).await.unwrap_err();
    assert!(matches!(err, Error::InvalidNotepadPage(16)));

    let err = sensor.notepad_set(0, &[0u8; 40]).await.unwrap_err();
    assert!(matches!(err, Error::NotepadDataTooLong(40)));

    sensor.stop().await;
    sensor.join().await;
}

#[tokio::test]
async fn wait_finger_deadline_expires() {
    let mut script = vec![Step::Reply(ack_frame(StatusCode::Success, &[]))];
    for _ in 0..10 {
        script.push(Step::Reply(ack_frame(StatusCode::FingerNotInSensor, &[])));
    }
    let sensor = Sensor::with_transport(fast_config(), scripted_factory(vec![script]));
    sensor.wait_ready().await.unwrap();

    let err = sensor
        .wait_finger(
            true,
            Duration::from_millis(10),
            Some(Duration::from_millis(35)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DeadlineExpired));

    sensor.stop().await;
    sensor.join().await;
}
