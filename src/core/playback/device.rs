//! Default output device playback (requires the `playback` feature).
//!
//! The rodio output stream is bound to the thread that opened it, so a
//! dedicated thread owns the stream and its sink and is driven over a
//! command channel.

use async_trait::async_trait;
use bytes::Bytes;
use rodio::{Decoder, OutputStreamBuilder, Sink};
use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::output::{AudioOutput, PlaybackError};

/// How often the device thread checks whether the current item has ended.
const END_POLL_INTERVAL: Duration = Duration::from_millis(20);

enum DeviceCommand {
    Play {
        audio: Bytes,
        done: oneshot::Sender<Result<(), PlaybackError>>,
    },
    Stop,
}

pub struct DeviceOutput {
    commands: std_mpsc::Sender<DeviceCommand>,
}

impl DeviceOutput {
    /// Open the default output device.
    pub fn open() -> Result<Self, PlaybackError> {
        let (commands, receiver) = std_mpsc::channel::<DeviceCommand>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), PlaybackError>>(1);

        std::thread::Builder::new()
            .name("audio-device".to_string())
            .spawn(move || run_device(receiver, ready_tx))
            .map_err(|e| PlaybackError::DeviceUnavailable(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| PlaybackError::DeviceUnavailable("device thread exited".into()))??;

        info!("Opened default audio output device");
        Ok(Self { commands })
    }
}

#[async_trait]
impl AudioOutput for DeviceOutput {
    async fn play(&mut self, audio: Bytes) -> Result<(), PlaybackError> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(DeviceCommand::Play { audio, done })
            .map_err(|_| PlaybackError::DeviceUnavailable("device thread exited".into()))?;
        finished
            .await
            .map_err(|_| PlaybackError::DeviceUnavailable("device thread exited".into()))?
    }

    async fn stop(&mut self) {
        let _ = self.commands.send(DeviceCommand::Stop);
    }

    fn name(&self) -> &'static str {
        "device"
    }
}

fn run_device(
    commands: std_mpsc::Receiver<DeviceCommand>,
    ready: std_mpsc::SyncSender<Result<(), PlaybackError>>,
) {
    let stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(PlaybackError::DeviceUnavailable(e.to_string())));
            return;
        }
    };
    let sink = Sink::connect_new(stream.mixer());
    let _ = ready.send(Ok(()));

    let mut current: Option<oneshot::Sender<Result<(), PlaybackError>>> = None;

    loop {
        let command = if current.is_some() {
            match commands.recv_timeout(END_POLL_INTERVAL) {
                Ok(command) => Some(command),
                Err(std_mpsc::RecvTimeoutError::Timeout) => None,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(DeviceCommand::Play { audio, done }) => {
                sink.stop();
                if let Some(previous) = current.take() {
                    let _ = previous.send(Ok(()));
                }
                match Decoder::new(Cursor::new(audio.to_vec())) {
                    Ok(source) => {
                        sink.append(source);
                        sink.play();
                        current = Some(done);
                    }
                    Err(e) => {
                        error!("Failed to decode audio for device playback: {}", e);
                        let _ = done.send(Err(PlaybackError::DecodeFailed(e.to_string())));
                    }
                }
            }
            Some(DeviceCommand::Stop) => {
                sink.stop();
                if let Some(previous) = current.take() {
                    let _ = previous.send(Ok(()));
                }
            }
            None => {}
        }

        if sink.empty()
            && let Some(done) = current.take()
        {
            let _ = done.send(Ok(()));
        }
    }

    debug!("Audio device thread stopped");
}
