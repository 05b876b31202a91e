use std::io::{Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError, sync_channel};
use std::thread::JoinHandle;
use std::time::Duration;

/// Result of polling a [`RawVideoPipe`].
#[derive(Debug)]
pub(crate) enum PipeRecv {
    /// One complete raw frame.
    Frame(Vec<u8>),
    /// No frame ready yet.
    Empty,
    /// The child closed its stdout (exit, crash, or stop).
    Closed,
}

/// A child's stderr, read to the end on a helper thread.
struct StderrDrain(JoinHandle<std::io::Result<Vec<u8>>>);

impl StderrDrain {
    fn start(mut stderr: ChildStderr) -> Self {
        Self(std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        }))
    }

    /// Join the thread; returns the trimmed text, empty when reading failed.
    fn collect(self) -> String {
        match self.0.join() {
            Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
            _ => String::new(),
        }
    }
}

fn take_stderr(child: &mut Child) -> std::io::Result<StderrDrain> {
    child
        .stderr
        .take()
        .map(StderrDrain::start)
        .ok_or_else(|| std::io::Error::other("failed to open ffmpeg stderr"))
}

/// Child `ffmpeg` process writing fixed-size raw frames to stdout.
///
/// A reader thread splits stdout into frames and forwards them through a bounded channel, so a
/// slow consumer backpressures the decoder instead of buffering without limit. stderr is drained
/// on its own thread and returned by [`RawVideoPipe::stop`].
pub(crate) struct RawVideoPipe {
    child: Option<Child>,
    rx: Option<Receiver<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
    stderr: Option<StderrDrain>,
    label: String,
}

impl RawVideoPipe {
    pub(crate) fn spawn(
        mut cmd: Command,
        frame_len: usize,
        capacity: usize,
        label: impl Into<String>,
    ) -> std::io::Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open ffmpeg stdout"))?;
        let stderr = take_stderr(&mut child)?;

        let (tx, rx) = sync_channel::<Vec<u8>>(capacity.max(1));
        let reader = std::thread::spawn(move || {
            loop {
                let mut buf = vec![0u8; frame_len];
                if stdout.read_exact(&mut buf).is_err() {
                    break;
                }
                if tx.send(buf).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child: Some(child),
            rx: Some(rx),
            reader: Some(reader),
            stderr: Some(stderr),
            label: label.into(),
        })
    }

    /// Wait up to `timeout` for the next frame.
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> PipeRecv {
        let Some(rx) = self.rx.as_ref() else {
            return PipeRecv::Closed;
        };
        match rx.recv_timeout(timeout) {
            Ok(frame) => PipeRecv::Frame(frame),
            Err(RecvTimeoutError::Timeout) => PipeRecv::Empty,
            Err(RecvTimeoutError::Disconnected) => PipeRecv::Closed,
        }
    }

    /// Drain every queued frame and return the newest one.
    pub(crate) fn try_recv_latest(&self) -> PipeRecv {
        let Some(rx) = self.rx.as_ref() else {
            return PipeRecv::Closed;
        };
        let mut latest = None;
        loop {
            match rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return match latest {
                        Some(frame) => PipeRecv::Frame(frame),
                        None => PipeRecv::Closed,
                    };
                }
            }
        }
        match latest {
            Some(frame) => PipeRecv::Frame(frame),
            None => PipeRecv::Empty,
        }
    }

    /// `true` until [`RawVideoPipe::stop`] ran.
    pub(crate) fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Kill the child, join helper threads, and return collected stderr text.
    ///
    /// Idempotent: later calls return an empty string.
    pub(crate) fn stop(&mut self) -> String {
        let Some(mut child) = self.child.take() else {
            return String::new();
        };
        let _ = child.kill();
        let _ = child.wait();
        // Dropping the receiver unblocks a reader parked in `send`.
        self.rx = None;
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        let stderr = self.stderr.take().map(StderrDrain::collect).unwrap_or_default();
        tracing::debug!(label = %self.label, "ffmpeg pipe stopped");
        stderr
    }
}

impl Drop for RawVideoPipe {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How a [`RawVideoWriter`] child ended.
#[derive(Debug)]
pub(crate) struct PipeExit {
    pub(crate) status: ExitStatus,
    pub(crate) stderr: String,
}

/// Child `ffmpeg` process consuming raw frames on stdin.
///
/// The write side of [`RawVideoPipe`]: frames are written synchronously, so a slow encoder
/// backpressures the caller. Dropping an unfinished writer kills the child.
pub(crate) struct RawVideoWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: Option<StderrDrain>,
    frames: u64,
    label: String,
}

impl RawVideoWriter {
    pub(crate) fn spawn(mut cmd: Command, label: impl Into<String>) -> std::io::Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("failed to open ffmpeg stdin"))?;
        let stderr = take_stderr(&mut child)?;
        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stderr: Some(stderr),
            frames: 0,
            label: label.into(),
        })
    }

    pub(crate) fn write_frame(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        stdin.write_all(bytes)?;
        self.frames += 1;
        Ok(())
    }

    /// Frames written so far.
    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }

    /// Close stdin and wait for the child to exit on its own.
    ///
    /// Errors only when the child was already finished or cannot be waited on; a failing
    /// exit status is reported through [`PipeExit`].
    pub(crate) fn finish(&mut self) -> std::io::Result<PipeExit> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg writer already finished"))?;
        let status = child.wait()?;
        let stderr = self.stderr.take().map(StderrDrain::collect).unwrap_or_default();
        tracing::debug!(label = %self.label, frames = self.frames, %status, "ffmpeg writer finished");
        Ok(PipeExit { status, stderr })
    }
}

impl Drop for RawVideoWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/pipe.rs"]
mod tests;
