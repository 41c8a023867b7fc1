//! Every appended byte reaches the reader exactly once, in order, whatever
//! the window size and however growth notices and reads interleave.

use gateway_core::body::{BodyEvent, ManualObserver, RequestBodyStream};
use gateway_core::config::BodyConfig;
use proptest::prelude::*;

mod common;

use common::{file_packet, RecordingManager, UploadFile};

#[derive(Debug, Clone)]
enum Step {
    Append(usize),
    Notify,
    Read(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1usize..300).prop_map(Step::Append),
        Just(Step::Notify),
        (1usize..200).prop_map(Step::Read),
    ]
}

/// Bytes at absolute offsets `from..from + len` of the upload.
fn upload_bytes(from: usize, len: usize) -> Vec<u8> {
    (from..from + len).map(|i| (i % 251) as u8).collect()
}

/// Process queued turns; returns `true` once the stream has finished.
fn pump(stream: &mut RequestBodyStream<RecordingManager>, window: usize) -> bool {
    let mut finished = false;
    while let Some(event) = stream.try_next_event() {
        match event {
            BodyEvent::ReadyRead => {}
            BodyEvent::Finished => finished = true,
            BodyEvent::Error(e) => panic!("unexpected body error: {e}"),
        }
    }
    assert!(stream.bytes_available() <= window);
    finished
}

/// Run `steps` against a file-backed stream, then finish the upload and
/// drain what is left. Returns (written, received).
fn drive(window: usize, steps: &[Step]) -> (Vec<u8>, Vec<u8>) {
    let upload = UploadFile::new();
    let observer = ManualObserver::new();
    let config = BodyConfig {
        buffer_size: window,
        ..Default::default()
    };

    let mut stream = RequestBodyStream::attach(
        RecordingManager::new(),
        file_packet("p", upload.path()),
        false,
        &config,
        &observer,
    )
    .unwrap();
    stream.activate();

    let mut written = Vec::new();
    let mut received = Vec::new();

    for step in steps {
        match *step {
            Step::Append(len) => {
                let chunk = upload_bytes(written.len(), len);
                upload.append(&chunk);
                written.extend_from_slice(&chunk);
            }
            Step::Notify => {
                observer.notify(upload.path());
            }
            Step::Read(max) => received.extend_from_slice(&stream.read(max)),
        }
        assert!(!pump(&mut stream, window), "finished before upload_done");
    }

    stream.upload_done();
    observer.notify(upload.path());

    let mut finished = false;
    for _ in 0..100_000 {
        if pump(&mut stream, window) {
            finished = true;
            break;
        }
        received.extend_from_slice(&stream.read_all());
        observer.notify(upload.path());
    }
    assert!(finished, "stream never finished");

    received.extend_from_slice(&stream.read_all());
    assert_eq!(stream.actual_content_length(), written.len() as u64);
    (written, received)
}

#[test]
fn fixed_windows_chunks_and_reads() {
    // (window, chunk, read)
    let cases = [
        (64, 64, 64),
        (64, 150, 37),
        (100, 30, 500),
        (1, 7, 3),
        (200_000, 1000, 10),
        (16, 1, 1),
    ];

    for (window, chunk, read) in cases {
        let mut steps = Vec::new();
        for _ in 0..10 {
            steps.extend([Step::Append(chunk), Step::Notify, Step::Read(read)]);
        }

        let (written, received) = drive(window, &steps);
        assert_eq!(received, written, "window={window} chunk={chunk} read={read}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn interleaved_growth_and_reads_lose_nothing(
        window in 8usize..=256,
        steps in prop::collection::vec(step(), 1..48),
    ) {
        let (written, received) = drive(window, &steps);
        prop_assert_eq!(received, written);
    }
}
