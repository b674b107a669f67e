//! Frame decode loop.
//!
//! One [`FrameDecodeLoop::tick`] per display refresh: wait for the video to
//! buffer enough data, size the sampling surface to the video, copy the frame,
//! try to decode. Rescheduling is the caller's job; this module never loops on
//! its own.

use crate::error::{ScannerError, ScannerResult};
use crate::platform::{ReadyState, VideoSurface};

/// RGBA pixel buffer the current video frame is sampled into.
#[derive(Debug, Clone, Default)]
pub struct SampleSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SampleSurface {
    /// Create an empty surface. Sized on the first sampled frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// RGBA bytes, row-major, 4 bytes per pixel.
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resize to exactly `width` x `height`. Returns `true` if the size
    /// changed. Pixel contents are cleared on resize.
    pub fn resize_to(&mut self, width: u32, height: u32) -> bool {
        if self.width == width && self.height == height {
            return false;
        }
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(Self::byte_len(width, height), 0);
        true
    }

    /// Replace the pixel contents with `rgba`.
    ///
    /// # Errors
    ///
    /// Returns an error if `rgba` does not match the surface size.
    pub fn load_rgba(&mut self, rgba: &[u8]) -> ScannerResult<()> {
        let expected = Self::byte_len(self.width, self.height);
        if rgba.len() != expected {
            return Err(ScannerError::InvalidFrameData {
                expected,
                actual: rgba.len(),
            });
        }
        self.pixels.copy_from_slice(rgba);
        Ok(())
    }

    fn byte_len(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 4
    }
}

/// QR decoding over a raw RGBA buffer.
pub trait QrDecoder {
    /// Decode a payload from `rgba` (`width` x `height`, 4 bytes per pixel).
    fn decode(&self, rgba: &[u8], width: u32, height: u32) -> Option<String>;
}

/// [`QrDecoder`] backed by `rqrr`.
///
/// Tries normal polarity first, then inverted (light modules on a dark
/// background). This is fixed, not configurable per frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    fn decode_luma(luma: &[u8], width: usize, height: usize) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
            luma.get(y * width + x).copied().unwrap_or(0)
        });
        prepared
            .detect_grids()
            .into_iter()
            .find_map(|grid| grid.decode().ok().map(|(_meta, content)| content))
    }
}

impl QrDecoder for RqrrDecoder {
    fn decode(&self, rgba: &[u8], width: u32, height: u32) -> Option<String> {
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || rgba.len() < w * h * 4 {
            return None;
        }

        let mut luma = to_luma(rgba);
        if let Some(content) = Self::decode_luma(&luma, w, h) {
            return Some(content);
        }

        for value in &mut luma {
            *value = 255 - *value;
        }
        Self::decode_luma(&luma, w, h)
    }
}

/// ITU-R BT.601 luma from RGBA, alpha ignored.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_luma(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let (r, g, b) = (f32::from(px[0]), f32::from(px[1]), f32::from(px[2]));
            (0.299 * r + 0.587 * g + 0.114 * b) as u8
        })
        .collect()
}

/// Result of one decode tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Video not ready; nothing was sampled.
    NotReady,
    /// Frame sampled, no QR code found.
    NoCode,
    /// QR payload found.
    Decoded(String),
}

/// Per-frame sampler and decoder.
pub struct FrameDecodeLoop {
    surface: SampleSurface,
    decoder: Box<dyn QrDecoder>,
    frames_sampled: u64,
}

impl FrameDecodeLoop {
    /// Create a loop around a decoder.
    #[must_use]
    pub fn new(decoder: Box<dyn QrDecoder>) -> Self {
        Self {
            surface: SampleSurface::new(),
            decoder,
            frames_sampled: 0,
        }
    }

    /// Run one decode attempt against `video`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to sample the frame. The caller
    /// treats this like an empty frame and reschedules.
    pub fn tick<V: VideoSurface + ?Sized>(&mut self, video: &V) -> ScannerResult<FrameOutcome> {
        if video.ready_state() < ReadyState::HaveEnoughData {
            return Ok(FrameOutcome::NotReady);
        }
        let Some((width, height)) = video.video_size().filter(|(w, h)| *w > 0 && *h > 0) else {
            return Ok(FrameOutcome::NotReady);
        };

        if self.surface.resize_to(width, height) {
            tracing::debug!("Sampling surface sized to video: {width}x{height}");
        }

        video.sample_into(&mut self.surface)?;
        self.frames_sampled += 1;

        let decoded = self.decoder.decode(
            self.surface.pixels(),
            self.surface.width(),
            self.surface.height(),
        );
        Ok(decoded.map_or(FrameOutcome::NoCode, FrameOutcome::Decoded))
    }

    /// Frames sampled so far.
    #[must_use]
    pub const fn frames_sampled(&self) -> u64 {
        self.frames_sampled
    }

    /// Current sampling surface.
    #[must_use]
    pub const fn surface(&self) -> &SampleSurface {
        &self.surface
    }
}

impl std::fmt::Debug for FrameDecodeLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecodeLoop")
            .field("surface", &(self.surface.width, self.surface.height))
            .field("frames_sampled", &self.frames_sampled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use async_trait::async_trait;
    use qrcode::{Color, QrCode};

    use super::*;
    use crate::error::NativeError;

    /// RGBA rendering of `text` at `scale` px per module with a 4-module
    /// quiet zone. `inverted` draws light modules on a dark background.
    fn qr_frame(text: &str, scale: usize, inverted: bool) -> (Vec<u8>, u32) {
        const QUIET: usize = 4;
        let code = QrCode::new(text.as_bytes()).expect("encode");
        let modules = code.width();
        let colors = code.to_colors();
        let side = (modules + 2 * QUIET) * scale;

        let mut rgba = Vec::with_capacity(side * side * 4);
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / scale, y / scale);
                let inside = (QUIET..QUIET + modules).contains(&mx)
                    && (QUIET..QUIET + modules).contains(&my);
                let dark =
                    inside && colors[(my - QUIET) * modules + (mx - QUIET)] == Color::Dark;
                let value = if dark == inverted { 255 } else { 0 };
                rgba.extend_from_slice(&[value, value, value, 255]);
            }
        }
        (rgba, u32::try_from(side).expect("side fits u32"))
    }

    struct StubVideo {
        ready: Cell<ReadyState>,
        size: Cell<Option<(u32, u32)>>,
        fill: u8,
        fail: bool,
    }

    impl StubVideo {
        fn ready(width: u32, height: u32) -> Self {
            Self {
                ready: Cell::new(ReadyState::HaveEnoughData),
                size: Cell::new(Some((width, height))),
                fill: 0,
                fail: false,
            }
        }
    }

    #[async_trait(?Send)]
    impl VideoSurface for StubVideo {
        async fn start_playback(&self) -> Result<(), NativeError> {
            Ok(())
        }

        fn ready_state(&self) -> ReadyState {
            self.ready.get()
        }

        fn video_size(&self) -> Option<(u32, u32)> {
            self.size.get()
        }

        fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()> {
            if self.fail {
                return Err(ScannerError::Sampling("context lost".to_string()));
            }
            let data = vec![self.fill; surface.pixels().len()];
            surface.load_rgba(&data)
        }
    }

    /// Records the buffer sizes it was asked to decode.
    struct RecordingDecoder {
        seen: Rc<RefCell<Vec<(u32, u32)>>>,
        answer: Option<String>,
    }

    impl QrDecoder for RecordingDecoder {
        fn decode(&self, rgba: &[u8], width: u32, height: u32) -> Option<String> {
            assert_eq!(rgba.len(), (width * height * 4) as usize);
            self.seen.borrow_mut().push((width, height));
            self.answer.clone()
        }
    }

    fn recording(answer: Option<&str>) -> (FrameDecodeLoop, Rc<RefCell<Vec<(u32, u32)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let decoder = RecordingDecoder {
            seen: Rc::clone(&seen),
            answer: answer.map(str::to_string),
        };
        (FrameDecodeLoop::new(Box::new(decoder)), seen)
    }

    #[test]
    fn surface_resize_reports_changes() {
        let mut surface = SampleSurface::new();
        assert!(surface.resize_to(4, 4));
        assert!(!surface.resize_to(4, 4));
        assert_eq!(surface.pixels().len(), 64);
        assert!(surface.resize_to(2, 3));
        assert_eq!(surface.pixels().len(), 24);
    }

    #[test]
    fn load_rgba_validates_length() {
        let mut surface = SampleSurface::new();
        surface.resize_to(4, 4);
        match surface.load_rgba(&[0u8; 10]) {
            Err(ScannerError::InvalidFrameData { expected, actual }) => {
                assert_eq!(expected, 64);
                assert_eq!(actual, 10);
            }
            other => panic!("expected InvalidFrameData, got {other:?}"),
        }
    }

    #[test]
    fn not_ready_video_is_not_sampled() {
        let (mut decode_loop, seen) = recording(Some("MCH-0001"));
        let video = StubVideo::ready(8, 8);
        for level in [
            ReadyState::HaveNothing,
            ReadyState::HaveMetadata,
            ReadyState::HaveCurrentData,
            ReadyState::HaveFutureData,
        ] {
            video.ready.set(level);
            let outcome = decode_loop.tick(&video).expect("tick should succeed");
            assert_eq!(outcome, FrameOutcome::NotReady);
        }
        assert_eq!(decode_loop.frames_sampled(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn zero_sized_video_is_not_ready() {
        let (mut decode_loop, _) = recording(None);
        let video = StubVideo::ready(0, 480);
        assert_eq!(
            decode_loop.tick(&video).expect("tick should succeed"),
            FrameOutcome::NotReady
        );
    }

    #[test]
    fn surface_follows_video_dimensions() {
        let (mut decode_loop, seen) = recording(None);
        let video = StubVideo::ready(8, 6);

        assert_eq!(
            decode_loop.tick(&video).expect("tick should succeed"),
            FrameOutcome::NoCode
        );
        video.size.set(Some((12, 10)));
        decode_loop.tick(&video).expect("tick should succeed");

        assert_eq!(*seen.borrow(), vec![(8, 6), (12, 10)]);
        assert_eq!(decode_loop.surface().width(), 12);
        assert_eq!(decode_loop.frames_sampled(), 2);
    }

    #[test]
    fn decoded_payload_is_returned_verbatim() {
        let (mut decode_loop, _) = recording(Some("  MCH-0042 "));
        let video = StubVideo::ready(4, 4);
        assert_eq!(
            decode_loop.tick(&video).expect("tick should succeed"),
            FrameOutcome::Decoded("  MCH-0042 ".to_string())
        );
    }

    #[test]
    fn sampling_errors_propagate() {
        let (mut decode_loop, _) = recording(None);
        let video = StubVideo {
            fail: true,
            ..StubVideo::ready(4, 4)
        };
        assert!(decode_loop.tick(&video).is_err());
        assert_eq!(decode_loop.frames_sampled(), 0);
    }

    #[test]
    fn rqrr_finds_nothing_in_blank_frames() {
        let white = vec![255u8; 64 * 64 * 4];
        assert_eq!(RqrrDecoder.decode(&white, 64, 64), None);
        let black = vec![0u8; 64 * 64 * 4];
        assert_eq!(RqrrDecoder.decode(&black, 64, 64), None);
    }

    #[test]
    fn rqrr_decodes_dark_on_light() {
        let (rgba, side) = qr_frame("MCH-0042", 8, false);
        assert_eq!(
            RqrrDecoder.decode(&rgba, side, side),
            Some("MCH-0042".to_string())
        );
    }

    #[test]
    fn rqrr_decodes_light_on_dark() {
        let (rgba, side) = qr_frame("MCH-0042", 8, true);
        assert_eq!(
            RqrrDecoder.decode(&rgba, side, side),
            Some("MCH-0042".to_string())
        );
    }

    #[test]
    fn decode_loop_finds_code_in_sampled_frame() {
        struct QrVideo {
            rgba: Vec<u8>,
            side: u32,
        }

        #[async_trait(?Send)]
        impl VideoSurface for QrVideo {
            async fn start_playback(&self) -> Result<(), NativeError> {
                Ok(())
            }

            fn ready_state(&self) -> ReadyState {
                ReadyState::HaveEnoughData
            }

            fn video_size(&self) -> Option<(u32, u32)> {
                Some((self.side, self.side))
            }

            fn sample_into(&self, surface: &mut SampleSurface) -> ScannerResult<()> {
                surface.load_rgba(&self.rgba)
            }
        }

        let (rgba, side) = qr_frame("PUMP-7", 6, false);
        let video = QrVideo { rgba, side };
        let mut decode_loop = FrameDecodeLoop::new(Box::new(RqrrDecoder));

        assert_eq!(
            decode_loop.tick(&video).expect("tick should succeed"),
            FrameOutcome::Decoded("PUMP-7".to_string())
        );
        assert_eq!(decode_loop.frames_sampled(), 1);
    }

    #[test]
    fn rqrr_rejects_short_buffers() {
        assert_eq!(RqrrDecoder.decode(&[0u8; 12], 4, 4), None);
        assert_eq!(RqrrDecoder.decode(&[], 0, 0), None);
    }

    #[test]
    fn luma_weights() {
        assert_eq!(to_luma(&[255, 255, 255, 0]), vec![255]);
        assert_eq!(to_luma(&[0, 0, 0, 255]), vec![0]);
        assert_eq!(to_luma(&[255, 0, 0, 255]), vec![76]);
    }
}
