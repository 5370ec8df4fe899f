use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::sync::Arc;

use crate::camera_controller::{CameraBackend, CameraSession, StreamRequest};
use crate::error::CameraError;
use crate::measurement::CapturedImage;

pub const CAMERA_ERROR_MESSAGE: &str = "Could not access the camera. Check the permissions.";

/// Owns the camera while the capture screen is active.
///
/// The session is dropped (and the device released) on every exit path:
/// [`release`](Self::release), a successful [`capture`](Self::capture), a
/// stream failure, or dropping the component.
pub struct CaptureComponent {
    backend: Arc<dyn CameraBackend>,
    request: StreamRequest,
    session: Option<CameraSession>,
    error: Option<CameraError>,
    frame: Option<RgbImage>,
}

impl CaptureComponent {
    pub fn new(backend: Arc<dyn CameraBackend>, request: StreamRequest) -> Self {
        Self {
            backend,
            request,
            session: None,
            error: None,
            frame: None,
        }
    }

    /// Open the camera. Failures are kept locally for the retry screen.
    pub fn acquire(&mut self) {
        self.release();

        match CameraSession::open(self.backend.as_ref(), &self.request) {
            Ok(session) => {
                self.session = Some(session);
                self.error = None;
            }
            Err(e) => {
                log::warn!("Camera acquisition failed: {}", e);
                self.error = Some(e);
            }
        }
    }

    pub fn release(&mut self) {
        self.session = None;
        self.frame = None;
    }

    /// Pull the newest frame from the stream. Returns true when the preview changed.
    pub fn poll_frame(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        match session.next_frame() {
            Ok(Some(frame)) => {
                log::debug!("Camera frame {}x{}", frame.width(), frame.height());
                self.frame = Some(frame);
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("Camera stream lost: {}", e);
                self.release();
                self.error = Some(e);
                true
            }
        }
    }

    /// Sample the current frame, encode it and release the camera.
    ///
    /// Returns the encoded image together with the raw frame for display.
    pub fn capture(&mut self, quality: u8) -> Result<(CapturedImage, RgbImage), CameraError> {
        self.poll_frame();
        let frame = self.frame.take().ok_or(CameraError::NoFrame)?;

        let bytes = match encode_jpeg(&frame, quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.frame = Some(frame);
                return Err(e);
            }
        };
        log::info!(
            "Captured {}x{} frame ({} bytes JPEG, quality {})",
            frame.width(),
            frame.height(),
            bytes.len(),
            quality
        );

        self.release();
        Ok((CapturedImage::jpeg(bytes, frame.width(), frame.height()), frame))
    }

    pub fn frame(&self) -> Option<&RgbImage> {
        self.frame.as_ref()
    }

    pub fn error(&self) -> Option<&CameraError> {
        self.error.as_ref()
    }

    /// True while the device is held.
    pub fn is_streaming(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.is_active())
    }
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CameraError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode(
        frame.as_raw(),
        frame.width(),
        frame.height(),
        image::ColorType::Rgb8,
    )?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_controller::tests::FakeCamera;
    use crate::config::Config;
    use std::sync::atomic::Ordering;

    fn component(camera: Arc<FakeCamera>) -> CaptureComponent {
        let request = StreamRequest::from_config(&Config::default().camera);
        CaptureComponent::new(camera, request)
    }

    #[test]
    fn test_acquire_and_release() {
        let camera = FakeCamera::working();
        let mut capture = component(camera.clone());

        capture.acquire();
        assert!(capture.is_streaming());
        assert!(capture.error().is_none());
        assert_eq!(camera.active(), 1);

        capture.release();
        assert!(!capture.is_streaming());
        assert_eq!(camera.active(), 0);
    }

    #[test]
    fn test_reacquire_never_holds_two_streams() {
        let camera = FakeCamera::working();
        let mut capture = component(camera.clone());

        capture.acquire();
        capture.acquire();
        assert_eq!(camera.active(), 1);
        assert_eq!(camera.opened.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_denied_camera_is_local_and_retryable() {
        let camera = FakeCamera::denied();
        let mut capture = component(camera.clone());

        capture.acquire();
        assert!(!capture.is_streaming());
        assert!(matches!(capture.error(), Some(CameraError::PermissionDenied(_))));

        camera.deny.store(false, Ordering::SeqCst);
        capture.acquire();
        assert!(capture.is_streaming());
        assert!(capture.error().is_none());
    }

    #[test]
    fn test_capture_encodes_and_releases() {
        let camera = FakeCamera::working();
        let mut capture = component(camera.clone());
        capture.acquire();

        let (image, frame) = capture.capture(80).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(&image.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!((image.width, image.height), (8, 6));
        assert_eq!(frame.dimensions(), (8, 6));

        assert!(!capture.is_streaming());
        assert_eq!(camera.active(), 0);
    }

    #[test]
    fn test_capture_without_frame_fails() {
        let mut capture = component(FakeCamera::working());
        assert!(matches!(capture.capture(80), Err(CameraError::NoFrame)));
    }

    #[test]
    fn test_drop_releases_camera() {
        let camera = FakeCamera::working();
        {
            let mut capture = component(camera.clone());
            capture.acquire();
            assert_eq!(camera.active(), 1);
        }
        assert_eq!(camera.active(), 0);
    }

    #[test]
    fn test_encoded_snapshot_decodes() {
        let frame = RgbImage::from_pixel(16, 9, image::Rgb([10, 200, 30]));
        let bytes = encode_jpeg(&frame, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 9));
    }
}
