use std::time::Instant;

use crate::capture::domain::camera_candidate::CameraCandidate;
use crate::capture::domain::frame_source::{CameraUnavailable, CaptureError, FrameSource};
use crate::shared::frame::Frame;

/// Live camera capture via libavdevice (v4l2, AVFoundation, VfW).
///
/// Candidates are tried in order on `open`; the first device that yields a
/// decodable video stream wins. Frames are converted to RGB24.
pub struct FfmpegCamera {
    candidates: Vec<CameraCandidate>,
    device: Option<OpenDevice>,
    frame_index: usize,
}

struct OpenDevice {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

// Safety: FfmpegCamera is owned by the detector worker thread and never
// shared. The raw pointers inside ffmpeg types do not escape it.
unsafe impl Send for FfmpegCamera {}

impl FfmpegCamera {
    pub fn new(candidates: Vec<CameraCandidate>) -> Self {
        Self {
            candidates,
            device: None,
            frame_index: 0,
        }
    }
}

impl FrameSource for FfmpegCamera {
    fn open(&mut self) -> Result<(), CameraUnavailable> {
        let attempts: Vec<String> = self.candidates.iter().map(|c| c.label()).collect();

        if let Err(e) = ffmpeg_next::init() {
            return Err(CameraUnavailable {
                attempts,
                reason: format!("ffmpeg init failed: {e}"),
            });
        }
        ffmpeg_next::device::register_all();

        let mut last_error = String::from("no candidates configured");
        for candidate in &self.candidates {
            match open_device(candidate) {
                Ok(device) => {
                    log::info!(
                        "Opened camera {} ({}x{})",
                        candidate.label(),
                        device.width,
                        device.height
                    );
                    self.device = Some(device);
                    self.frame_index = 0;
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("Camera {} unavailable: {e}", candidate.label());
                    last_error = e.to_string();
                }
            }
        }

        Err(CameraUnavailable {
            attempts,
            reason: last_error,
        })
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let device = self.device.as_mut().ok_or(CaptureError::NotOpen)?;
        let frame = device.next_frame(self.frame_index)?;
        self.frame_index += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.device = None;
    }
}

fn open_device(candidate: &CameraCandidate) -> Result<OpenDevice, Box<dyn std::error::Error>> {
    let format_name = candidate.backend.format_name();
    // Demuxer names may carry aliases, e.g. "video4linux2,v4l2".
    let input_format = ffmpeg_next::device::input::video()
        .find(|f| f.name().split(',').any(|n| n == format_name))
        .ok_or_else(|| format!("ffmpeg built without {format_name} support"))?;

    let url = candidate.url();
    let ctx = ffmpeg_next::format::open_with(
        &url,
        &ffmpeg_next::format::format::Format::Input(input_format),
        ffmpeg_next::Dictionary::new(),
    )?;
    let ictx = match ctx {
        ffmpeg_next::format::context::Context::Input(ictx) => ictx,
        ffmpeg_next::format::context::Context::Output(_) => {
            return Err(format!("{url} opened as an output").into())
        }
    };

    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or("No video stream found")?;
    let stream_index = stream.index();
    let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
    let decoder = codec_ctx.decoder().video()?;

    let width = decoder.width();
    let height = decoder.height();
    if width == 0 || height == 0 {
        return Err(format!("{url} reported an empty frame size").into());
    }

    let scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;

    Ok(OpenDevice {
        ictx,
        decoder,
        scaler,
        stream_index,
        width,
        height,
    })
}

impl OpenDevice {
    /// Reads packets until the decoder produces one picture.
    fn next_frame(&mut self, index: usize) -> Result<Frame, CaptureError> {
        loop {
            if let Some(frame) = self.try_receive(index)? {
                return Ok(frame);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {}
                // A live device never runs out; EOF is a dropped read.
                Err(ffmpeg_next::Error::Eof) => {
                    return Err(CaptureError::Device("end of stream".into()))
                }
                Err(e) => return Err(CaptureError::Device(e.to_string())),
            }
            if packet.stream() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .map_err(|e| CaptureError::Device(e.to_string()))?;
        }
    }

    fn try_receive(&mut self, index: usize) -> Result<Option<Frame>, CaptureError> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }
        let captured_at = Instant::now();

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .map_err(|e| CaptureError::Device(e.to_string()))?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Some(Frame::captured(
            pixels,
            self.width,
            self.height,
            index,
            captured_at,
        )))
    }
}

/// Copies pixel data from an ffmpeg frame into a tightly packed RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }
    pixels
}
