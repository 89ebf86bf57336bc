//! Live fragment streams: sentences are spoken while the stream is open.

use ldsvoice::config::Config;
use ldsvoice::engine::{EngineState, SpeechEngine};
use ldsvoice::entity::fragment_stream;
use ldsvoice::error::Result;
use ldsvoice::sink::{CollectorSink, OutputSink};
use ldsvoice::speech::Voice;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn test_config() -> Config {
    let mut config = Config::default();
    config.engine.poll_interval_ms = 20;
    config
}

/// Reports every render over a channel as it happens.
struct NotifyingSink {
    rendered: mpsc::Sender<String>,
}

impl OutputSink for NotifyingSink {
    fn render(&mut self, text: &str, _voice: &Voice) -> Result<()> {
        let _ = self.rendered.send(text.to_string());
        Ok(())
    }
}

#[test]
fn first_sentence_is_spoken_before_the_stream_ends() {
    let (rendered_tx, rendered_rx) = mpsc::channel();
    let engine = SpeechEngine::new(
        &test_config(),
        Box::new(NotifyingSink {
            rendered: rendered_tx,
        }),
    );

    let (fragment_tx, fragment_rx) = mpsc::channel::<String>();
    let speaker = {
        let engine = engine.clone();
        thread::spawn(move || engine.stream_speak(fragment_rx, Voice::default()))
    };

    fragment_tx.send("The first ".to_string()).unwrap();
    fragment_tx.send("sentence. ".to_string()).unwrap();
    fragment_tx.send("The second".to_string()).unwrap();

    // The stream is still open, yet the first sentence has been rendered.
    let first = rendered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first, "The first sentence.");
    assert_eq!(engine.state(), EngineState::Streaming);
    assert!(rendered_rx.try_recv().is_err());

    fragment_tx.send(" one!".to_string()).unwrap();
    drop(fragment_tx);

    assert_eq!(speaker.join().unwrap(), 2);
    assert_eq!(rendered_rx.recv().unwrap(), "The second one!");
    assert_eq!(engine.state(), EngineState::Silent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_stream_speaks_as_fragments_arrive() {
    let (rendered_tx, rendered_rx) = mpsc::channel();
    let engine = SpeechEngine::new(
        &test_config(),
        Box::new(NotifyingSink {
            rendered: rendered_tx,
        }),
    );

    let (fragment_tx, fragment_rx) = tokio::sync::mpsc::channel::<String>(8);
    let speaker = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .stream_speak_async(fragment_stream(fragment_rx), Voice::default())
                .await
        })
    };

    fragment_tx.send("Ready? ".to_string()).await.unwrap();
    fragment_tx.send("Set".to_string()).await.unwrap();

    let first = tokio::task::spawn_blocking(move || {
        let first = rendered_rx.recv_timeout(Duration::from_secs(5));
        (first, rendered_rx)
    })
    .await
    .unwrap();
    let (first, rendered_rx) = first;
    assert_eq!(first.unwrap(), "Ready?");

    fragment_tx.send(". Go\n".to_string()).await.unwrap();
    drop(fragment_tx);

    assert_eq!(speaker.await.unwrap(), 3);
    let rest: Vec<String> = rendered_rx.try_iter().collect();
    assert_eq!(rest, vec!["Set.", "Go"]);
}

#[test]
fn stream_callbacks_fire_per_sentence() {
    let collected = CollectorSink::new();
    let engine = SpeechEngine::new(&test_config(), Box::new(collected.handle()));

    let (speak_tx, speak_rx) = mpsc::channel();
    engine.on_speak(move |unit| {
        let _ = speak_tx.send(unit.text().to_string());
    });

    let spoken = engine.stream_speak(["One. Two", "! Three"], Voice::default());
    assert_eq!(spoken, 3);

    let announced: Vec<String> = speak_rx.try_iter().collect();
    assert_eq!(announced, vec!["One.", "Two!", "Three"]);
    assert_eq!(collected.texts(), announced);
}

#[test]
fn blank_stream_speaks_nothing() {
    let collected = CollectorSink::new();
    let engine = SpeechEngine::new(&test_config(), Box::new(collected.handle()));

    assert_eq!(engine.stream_speak(["  ", "\n", ""], Voice::default()), 0);
    assert!(collected.texts().is_empty());
    assert_eq!(engine.state(), EngineState::Silent);
}
