use image::RgbImage;
use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::capture::CaptureComponent;
use crate::error::MeasureError;
use crate::measurement::{MeasurementMode, MeasurementResult};
use crate::measurement_client::MeasurementClient;

pub const ANALYSIS_FAILED_MESSAGE: &str =
    "Could not process the image. Check your connection and try again.";

type Outcome = Result<MeasurementResult, MeasureError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Camera,
    Analyzing,
    Result,
    Error,
}

/// Top-level state machine: idle -> camera -> analyzing -> result | error.
///
/// Only this type mutates the phase, the selected mode, the last result and
/// the last error message. The measurement itself runs on the tokio runtime
/// and reports back through a channel drained by [`poll`](Self::poll).
pub struct AppController {
    phase: Phase,
    mode: MeasurementMode,
    result: Option<MeasurementResult>,
    error_message: Option<String>,
    capture: CaptureComponent,
    captured_frame: Option<RgbImage>,
    client: MeasurementClient,
    runtime: Handle,
    jpeg_quality: u8,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
}

impl AppController {
    pub fn new(capture: CaptureComponent, client: MeasurementClient, runtime: Handle, jpeg_quality: u8) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        Self {
            phase: Phase::Idle,
            mode: MeasurementMode::default(),
            result: None,
            error_message: None,
            capture,
            captured_frame: None,
            client,
            runtime,
            jpeg_quality,
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> MeasurementMode {
        self.mode
    }

    pub fn result(&self) -> Option<&MeasurementResult> {
        self.result.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// The still frame being analyzed, shown dimmed while waiting.
    pub fn captured_frame(&self) -> Option<&RgbImage> {
        self.captured_frame.as_ref()
    }

    pub fn capture_component(&self) -> &CaptureComponent {
        &self.capture
    }

    pub fn capture_component_mut(&mut self) -> &mut CaptureComponent {
        &mut self.capture
    }

    pub fn mode_selectable(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Choose the mode. From the camera screen this ends the cycle and goes
    /// back to idle; while analyzing or showing an outcome it is ignored.
    pub fn select_mode(&mut self, mode: MeasurementMode) {
        match self.phase {
            Phase::Idle => self.mode = mode,
            Phase::Camera => {
                self.capture.release();
                self.mode = mode;
                self.phase = Phase::Idle;
                info!("Mode changed to {}, camera released", mode);
            }
            Phase::Analyzing | Phase::Result | Phase::Error => {
                debug!("Ignoring mode change during {:?}", self.phase);
            }
        }
    }

    pub fn activate_camera(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        info!("Activating camera for {} measurement", self.mode);
        self.phase = Phase::Camera;
        self.capture.acquire();
    }

    pub fn retry_camera(&mut self) {
        if self.phase == Phase::Camera {
            self.capture.acquire();
        }
    }

    pub fn cancel(&mut self) {
        if self.phase == Phase::Camera {
            self.capture.release();
            self.phase = Phase::Idle;
            info!("Capture cancelled");
        }
    }

    /// Take the snapshot and start the one measurement request.
    ///
    /// Returns false (and does nothing) unless the camera screen is active
    /// with a frame available.
    pub fn capture(&mut self) -> bool {
        if self.phase != Phase::Camera {
            debug!("Capture ignored during {:?}", self.phase);
            return false;
        }

        let (image, frame) = match self.capture.capture(self.jpeg_quality) {
            Ok(captured) => captured,
            Err(e) => {
                log::warn!("Capture failed: {}", e);
                return false;
            }
        };

        self.captured_frame = Some(frame);
        self.error_message = None;
        self.phase = Phase::Analyzing;

        let client = self.client.clone();
        let mode = self.mode;
        let tx = self.outcome_tx.clone();
        self.runtime.spawn(async move {
            let outcome = client.analyze(image, mode).await;
            let _ = tx.send(outcome);
        });
        true
    }

    /// Apply a finished measurement, if one has arrived.
    pub fn poll(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.finish_analysis(outcome);
        }
    }

    #[cfg(test)]
    pub async fn wait_for_analysis(&mut self) {
        if self.phase == Phase::Analyzing {
            if let Some(outcome) = self.outcome_rx.recv().await {
                self.finish_analysis(outcome);
            }
        }
    }

    fn finish_analysis(&mut self, outcome: Outcome) {
        if self.phase != Phase::Analyzing {
            debug!("Discarding measurement outcome outside analyzing phase");
            return;
        }

        self.captured_frame = None;
        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.phase = Phase::Result;
            }
            Err(e) => {
                if e.is_configuration() {
                    error!("Measurement not possible, configuration problem: {}", e);
                } else {
                    error!("Measurement failed: {}", e);
                }
                self.result = None;
                self.error_message = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                self.phase = Phase::Error;
            }
        }
    }

    pub fn reset(&mut self) {
        if matches!(self.phase, Phase::Result | Phase::Error) {
            self.result = None;
            self.error_message = None;
            self.captured_frame = None;
            self.phase = Phase::Idle;
        }
    }
}
