use std::path::PathBuf;
use std::process::{Child, Command as ProcessCommand, Stdio};
use std::sync::mpsc;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};

use super::process::restore_default_signals;
use super::{TransportEvent, TransportEventKind};
use crate::paths::player_socket_path;

#[cfg(unix)]
use std::io::{BufRead, BufReader, Write};
#[cfg(unix)]
use std::net::Shutdown;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;
#[cfg(unix)]
use std::sync::{Arc, Mutex};
#[cfg(unix)]
use std::time::Duration;

const TIME_POS_OBSERVER: u64 = 1;
#[cfg(unix)]
const CONNECT_ATTEMPTS: u32 = 200;
#[cfg(unix)]
const CONNECT_INTERVAL: Duration = Duration::from_millis(50);

/// The media side of the player. Implementations report back through
/// [`TransportEvent`]s tagged with the generation passed to `load`.
pub(crate) trait MediaTransport {
    /// Opens `url` paused. With `start_seconds` the resource is positioned
    /// there as part of loading, so no seek races the network fetch.
    fn load(&mut self, generation: u64, url: &str, start_seconds: Option<f64>) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn stop(&mut self);
}

/// One mpv process and its IPC socket. The socket is attached by a
/// background thread; commands sent before that are queued.
#[cfg(unix)]
#[derive(Default)]
struct PlayerLink {
    child: Option<Child>,
    stream: Option<UnixStream>,
    queued: Vec<Value>,
    closed: bool,
}

#[cfg(unix)]
type SharedLink = Arc<Mutex<PlayerLink>>;

/// Drives an `mpv` process through its JSON IPC socket.
pub(crate) struct MpvTransport {
    bin: PathBuf,
    events: mpsc::Sender<TransportEvent>,
    interactive: bool,
    socket_path: Option<PathBuf>,
    #[cfg(unix)]
    link: Option<SharedLink>,
}

impl MpvTransport {
    /// `interactive` hands the terminal to mpv so its own key bindings work;
    /// the TUI keeps the terminal and runs mpv silently instead.
    pub(crate) fn new(
        bin: PathBuf,
        events: mpsc::Sender<TransportEvent>,
        interactive: bool,
    ) -> Self {
        Self {
            bin,
            events,
            interactive,
            socket_path: None,
            #[cfg(unix)]
            link: None,
        }
    }

    fn spawn(
        &self,
        socket_path: &PathBuf,
        url: &str,
        start_seconds: Option<f64>,
    ) -> Result<Child> {
        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.arg("--no-video")
            .arg("--pause")
            .arg("--idle=no")
            .arg(format!("--input-ipc-server={}", socket_path.display()));
        if let Some(start) = start_seconds {
            cmd.arg(format!("--start={start:.3}"));
        }
        if self.interactive {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        } else {
            cmd.arg("--no-terminal")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
        }
        cmd.arg("--").arg(url);
        restore_default_signals(&mut cmd);
        cmd.spawn()
            .with_context(|| format!("failed to launch {}", self.bin.display()))
    }

    #[cfg(unix)]
    fn send_command(&mut self, command: Value) -> Result<()> {
        let link = self
            .link
            .as_ref()
            .ok_or_else(|| anyhow!("player is not running"))?;
        let mut guard = link
            .lock()
            .map_err(|_| anyhow!("player link lock poisoned"))?;
        let link = &mut *guard;
        match link.stream.as_mut() {
            Some(stream) => write_command(stream, &command),
            None => {
                link.queued.push(command);
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    fn send_command(&mut self, _command: Value) -> Result<()> {
        Err(anyhow!("player control requires unix domain sockets"))
    }
}

impl MediaTransport for MpvTransport {
    /// Returns once mpv is spawned; the socket is attached off this thread.
    #[cfg(unix)]
    fn load(&mut self, generation: u64, url: &str, start_seconds: Option<f64>) -> Result<()> {
        self.stop();
        let socket_path = player_socket_path(generation);
        let _ = std::fs::remove_file(&socket_path);

        let child = self.spawn(&socket_path, url, start_seconds)?;
        let link = Arc::new(Mutex::new(PlayerLink {
            child: Some(child),
            ..PlayerLink::default()
        }));
        self.link = Some(Arc::clone(&link));
        self.socket_path = Some(socket_path.clone());

        let events = self.events.clone();
        std::thread::spawn(move || run_player_link(&socket_path, generation, &link, &events));
        Ok(())
    }

    #[cfg(not(unix))]
    fn load(&mut self, _generation: u64, _url: &str, _start_seconds: Option<f64>) -> Result<()> {
        let _ = (player_socket_path, Self::spawn);
        Err(anyhow!("player control requires unix domain sockets"))
    }

    fn play(&mut self) -> Result<()> {
        self.send_command(json!(["set_property", "pause", false]))
    }

    fn stop(&mut self) {
        #[cfg(unix)]
        {
            if let Some(link) = self.link.take() {
                let child = match link.lock() {
                    Ok(mut link) => {
                        link.closed = true;
                        link.queued.clear();
                        if let Some(mut stream) = link.stream.take() {
                            let _ = write_command(&mut stream, &json!(["quit"]));
                            let _ = stream.shutdown(Shutdown::Both);
                        }
                        link.child.take()
                    }
                    Err(_) => None,
                };
                if let Some(mut child) = child {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
        if let Some(path) = self.socket_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

impl Drop for MpvTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(unix)]
fn write_command(stream: &mut UnixStream, command: &Value) -> Result<()> {
    let mut line = json!({ "command": command }).to_string();
    line.push('\n');
    stream
        .write_all(line.as_bytes())
        .context("failed writing to player socket")
}

/// Connects to the player, forwards its events, and reports `Exited` once the
/// socket closes or never comes up.
#[cfg(unix)]
fn run_player_link(
    socket_path: &Path,
    generation: u64,
    link: &SharedLink,
    events: &mpsc::Sender<TransportEvent>,
) {
    match connect(socket_path, link) {
        Ok(Some(reader)) => forward_player_events(reader, generation, events),
        Ok(None) => {}
        Err(err) => log::warn!("{err:#}"),
    }
    let _ = events.send(TransportEvent {
        generation,
        kind: TransportEventKind::Exited,
    });
}

/// `Ok(None)` means the load was stopped before the socket came up.
#[cfg(unix)]
fn connect(socket_path: &Path, link: &SharedLink) -> Result<Option<UnixStream>> {
    for _ in 0..CONNECT_ATTEMPTS {
        if let Ok(stream) = UnixStream::connect(socket_path) {
            return attach(stream, link);
        }
        {
            let mut guard = link
                .lock()
                .map_err(|_| anyhow!("player link lock poisoned"))?;
            if guard.closed {
                return Ok(None);
            }
            if let Some(child) = guard.child.as_mut()
                && let Ok(Some(status)) = child.try_wait()
            {
                return Err(anyhow!("player exited early with {status}"));
            }
        }
        std::thread::sleep(CONNECT_INTERVAL);
    }
    Err(anyhow!(
        "timed out waiting for player socket {}",
        socket_path.display()
    ))
}

/// Subscribes to playback time and flushes commands queued while connecting.
#[cfg(unix)]
fn attach(mut stream: UnixStream, link: &SharedLink) -> Result<Option<UnixStream>> {
    let reader = stream
        .try_clone()
        .context("failed to clone player socket")?;
    let mut guard = link
        .lock()
        .map_err(|_| anyhow!("player link lock poisoned"))?;
    let link = &mut *guard;
    if link.closed {
        let _ = stream.shutdown(Shutdown::Both);
        return Ok(None);
    }
    write_command(
        &mut stream,
        &json!(["observe_property", TIME_POS_OBSERVER, "time-pos"]),
    )?;
    for command in link.queued.drain(..) {
        write_command(&mut stream, &command)?;
    }
    link.stream = Some(stream);
    Ok(Some(reader))
}

#[cfg(unix)]
fn forward_player_events(
    stream: UnixStream,
    generation: u64,
    events: &mpsc::Sender<TransportEvent>,
) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        let Some(kind) = parse_player_event(&line) else {
            continue;
        };
        if events.send(TransportEvent { generation, kind }).is_err() {
            return;
        }
    }
}

/// Maps one line of mpv IPC output to a transport event.
pub(crate) fn parse_player_event(line: &str) -> Option<TransportEventKind> {
    let value: Value = serde_json::from_str(line).ok()?;
    match value.get("event")?.as_str()? {
        "property-change" => {
            if value.get("id")?.as_u64()? != TIME_POS_OBSERVER {
                return None;
            }
            let offset = value.get("data")?.as_f64()?;
            Some(TransportEventKind::TimeUpdate(offset))
        }
        "playback-restart" => Some(TransportEventKind::Restarted),
        "end-file" => match value.get("reason").and_then(Value::as_str) {
            Some("eof") => Some(TransportEventKind::Ended),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    use super::{MediaTransport, MpvTransport};
    use crate::app::playback::{TransportEvent, TransportEventKind};

    #[test]
    fn load_returns_before_the_player_socket_exists() {
        let (tx, rx) = mpsc::channel();
        // `true` ignores the mpv flags and exits without opening a socket.
        let mut transport = MpvTransport::new(PathBuf::from("true"), tx, false);

        let started = Instant::now();
        transport
            .load(7, "https://audio.example/10-2-5.mp3", Some(42.5))
            .expect("spawn should succeed");
        transport.play().expect("play is queued until connected");
        assert!(started.elapsed() < Duration::from_millis(500));

        let event = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("exit should be reported");
        assert_eq!(
            event,
            TransportEvent {
                generation: 7,
                kind: TransportEventKind::Exited,
            }
        );
    }

    #[test]
    fn missing_binary_fails_the_load() {
        let (tx, _rx) = mpsc::channel();
        let mut transport =
            MpvTransport::new(PathBuf::from("/nonexistent/podtrack-player"), tx, false);

        let err = transport
            .load(1, "https://audio.example/10-2-5.mp3", None)
            .expect_err("spawn should fail");
        assert!(format!("{err:#}").contains("failed to launch"));
    }
}
