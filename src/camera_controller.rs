use image::{ImageFormat, RgbImage};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::CameraConfig;
use crate::error::CameraError;

/// Frames larger than this are treated as a corrupt stream.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
const STDERR_TAIL_BYTES: usize = 4096;
/// Frames waiting for the UI; newer frames are dropped while it is full.
const FRAME_QUEUE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    /// Rear camera, pointing away from the user.
    Environment,
    User,
}

/// What we ask the camera for when acquiring it.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub audio: bool,
}

impl StreamRequest {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            facing: CameraFacing::Environment,
            width: config.width,
            height: config.height,
            framerate: config.framerate,
            audio: false,
        }
    }
}

/// Something that can hand out exclusive camera streams.
pub trait CameraBackend: Send + Sync {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live camera stream.
pub trait CameraStream: Send {
    /// Newest frame since the previous call, if any. An error means the
    /// stream is gone and must be reopened.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError>;

    /// Release the device. Must be idempotent.
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}

/// Scoped ownership of an open stream; dropping it releases the camera.
pub struct CameraSession {
    stream: Box<dyn CameraStream>,
}

impl CameraSession {
    pub fn open(backend: &dyn CameraBackend, request: &StreamRequest) -> Result<Self, CameraError> {
        let stream = backend.open(request)?;
        log::info!("Camera session opened ({}x{})", request.width, request.height);
        Ok(Self { stream })
    }

    pub fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        self.stream.next_frame()
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_active()
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.stream.stop();
        log::info!("Camera session released");
    }
}

// ============================================================================
// PROCESS BACKEND (libcamera apps writing MJPEG to stdout)
// ============================================================================

/// Camera backend that runs `rpicam-vid` (or a compatible program) and reads
/// its MJPEG output.
pub struct ProcessCamera {
    program: String,
    rear_index: u32,
    front_index: u32,
}

impl ProcessCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            program: config.program.clone(),
            rear_index: config.rear_camera_index,
            front_index: config.front_camera_index,
        }
    }

    pub fn args(&self, request: &StreamRequest) -> Vec<String> {
        let index = match request.facing {
            CameraFacing::Environment => self.rear_index,
            CameraFacing::User => self.front_index,
        };

        vec![
            "--camera".to_string(),
            index.to_string(),
            "--timeout".to_string(),
            "0".to_string(),
            "--nopreview".to_string(),
            "--codec".to_string(),
            "mjpeg".to_string(),
            "--width".to_string(),
            request.width.to_string(),
            "--height".to_string(),
            request.height.to_string(),
            "--framerate".to_string(),
            request.framerate.to_string(),
            "--output".to_string(),
            "-".to_string(),
        ]
    }
}

impl CameraBackend for ProcessCamera {
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let args = self.args(request);
        log::info!("Camera command: {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => CameraError::NoDevice(format!("{} not found", self.program)),
                ErrorKind::PermissionDenied => CameraError::PermissionDenied(e.to_string()),
                _ => CameraError::Stream(e.to_string()),
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CameraError::Stream("camera pipes unavailable".to_string()));
            }
        };

        let (tx, rx) = bounded(FRAME_QUEUE);
        let stderr_reader = thread::spawn(move || read_stderr(stderr));
        let frame_reader = thread::spawn(move || read_frames(stdout, stderr_reader, tx));

        Ok(Box::new(ProcessStream {
            child: Some(child),
            reader: Some(frame_reader),
            frames: Some(rx),
        }))
    }
}

/// A complete JPEG, or the terminal error once the program has exited.
type FrameMessage = Result<Vec<u8>, CameraError>;

fn read_frames(mut stdout: impl Read, stderr_reader: JoinHandle<String>, tx: Sender<FrameMessage>) {
    let mut splitter = MjpegSplitter::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut delivered = 0usize;

    loop {
        match stdout.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Some(frame) = splitter.push(&chunk[..n]).pop() {
                    match tx.try_send(Ok(frame)) {
                        Ok(()) => delivered += 1,
                        // Consumer is behind, drop the frame
                        Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
        }
    }
    log::debug!("Camera stdout closed after {} frame(s)", delivered);

    // stdout can close before the program has finished writing stderr
    let stderr_tail = stderr_reader.join().unwrap_or_default();
    let _ = tx.send(Err(classify_exit(&stderr_tail, delivered == 0)));
}

fn read_stderr(mut stderr: impl Read) -> String {
    let mut tail = String::new();
    let mut chunk = [0u8; 1024];
    while let Ok(n) = stderr.read(&mut chunk) {
        if n == 0 {
            break;
        }
        tail.push_str(&String::from_utf8_lossy(&chunk[..n]));
        if tail.len() > STDERR_TAIL_BYTES {
            let mut cut = tail.len() - STDERR_TAIL_BYTES;
            while !tail.is_char_boundary(cut) {
                cut += 1;
            }
            tail.drain(..cut);
        }
    }
    tail
}

struct ProcessStream {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    frames: Option<Receiver<FrameMessage>>,
}

impl CameraStream for ProcessStream {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CameraError> {
        let Some(frames) = self.frames.as_ref() else {
            return Ok(None);
        };

        match frames.try_iter().last() {
            Some(Ok(jpeg)) => {
                let frame = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                    .map_err(|e| CameraError::Stream(format!("undecodable frame: {}", e)))?
                    .to_rgb8();
                Ok(Some(frame))
            }
            Some(Err(e)) => {
                self.stop();
                Err(e)
            }
            None => Ok(None),
        }
    }

    fn stop(&mut self) {
        // Receiver goes first so the reader never blocks on a full queue
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            log::info!("Camera process stopped");
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    fn is_active(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Map the camera program's stderr to an error kind.
pub fn classify_exit(stderr: &str, never_streamed: bool) -> CameraError {
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("camera process exited")
        .trim()
        .to_string();
    let lower = stderr.to_lowercase();

    if lower.contains("permission denied") || lower.contains("not permitted") {
        CameraError::PermissionDenied(detail)
    } else if never_streamed {
        CameraError::NoDevice(detail)
    } else {
        CameraError::Stream(detail)
    }
}

/// Splits a byte stream of concatenated JPEG images on SOI/EOI markers.
pub struct MjpegSplitter {
    buffer: Vec<u8>,
}

impl MjpegSplitter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed bytes, get back every frame completed by them (oldest first).
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buffer, 0, 0xD8) else {
                // Keep a trailing 0xFF, it may start the next SOI.
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let drop_to = self.buffer.len() - keep;
                self.buffer.drain(..drop_to);
                break;
            };
            if start > 0 {
                self.buffer.drain(..start);
            }

            match find_marker(&self.buffer, 2, 0xD9) {
                Some(end) => {
                    frames.push(self.buffer.drain(..end + 2).collect());
                }
                None => {
                    if self.buffer.len() > MAX_FRAME_BYTES {
                        log::warn!("Dropping oversized MJPEG frame ({} bytes)", self.buffer.len());
                        self.buffer.clear();
                    }
                    break;
                }
            }
        }

        frames
    }
}

fn find_marker(buffer: &[u8], from: usize, marker: u8) -> Option<usize> {
    if buffer.len() < 2 || from >= buffer.len() - 1 {
        return None;
    }
    buffer[from..]
        .windows(2)
        .position(|pair| pair[0] == 0xFF && pair[1] == marker)
        .map(|offset| from + offset)
}
