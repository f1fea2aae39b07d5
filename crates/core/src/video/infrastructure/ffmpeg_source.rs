use crate::shared::frame::Frame;
use crate::video::domain::video_source::{CaptureError, SourceInfo, VideoSource};

/// Where and how to open a capture device.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegSourceConfig {
    /// Device name or URL, e.g. `/dev/video0`, `0` (avfoundation),
    /// `video=Integrated Camera` (dshow) or `rtsp://...`.
    pub url: String,
    /// Demuxer to force, e.g. `v4l2`, `avfoundation`, `dshow`.
    pub input_format: Option<String>,
    /// Requested capture size; frames are scaled to it if the device ignores it.
    pub frame_size: Option<(u32, u32)>,
    pub fps: Option<u32>,
    /// Flip frames left-to-right so the picture reads like a mirror.
    pub mirror: bool,
}

impl FfmpegSourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            input_format: None,
            frame_size: None,
            fps: None,
            mirror: true,
        }
    }

    fn device_options(&self) -> Vec<(&'static str, String)> {
        let mut options = Vec::new();
        if let Some((w, h)) = self.frame_size {
            options.push(("video_size", format!("{w}x{h}")));
        }
        if let Some(fps) = self.fps {
            options.push(("framerate", fps.to_string()));
        }
        options
    }
}

struct OpenStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushed: bool,
}

/// Camera or stream source decoded via ffmpeg-next (libavdevice +
/// libavformat + libavcodec). Each frame is converted to RGB24.
pub struct FfmpegSource {
    config: FfmpegSourceConfig,
    stream: Option<OpenStream>,
}

impl FfmpegSource {
    pub fn new(config: FfmpegSourceConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }

    fn open_input(&self) -> Result<ffmpeg_next::format::context::Input, CaptureError> {
        let mut options = ffmpeg_next::Dictionary::new();
        for (key, value) in self.config.device_options() {
            options.set(key, &value);
        }

        let open_err = |e: ffmpeg_next::Error| CaptureError::SourceOpen(format!("{}: {e}", self.config.url));

        match self.config.input_format.as_deref() {
            Some(name) => {
                let format = ffmpeg_next::device::input::video()
                    .find(|f| f.name() == name)
                    .ok_or_else(|| {
                        CaptureError::SourceOpen(format!("input format {name} is not available"))
                    })?;
                let ctx = ffmpeg_next::format::open_with(
                    &self.config.url,
                    &ffmpeg_next::format::Format::Input(format),
                    options,
                )
                .map_err(open_err)?;
                match ctx {
                    ffmpeg_next::format::context::Context::Input(input) => Ok(input),
                    ffmpeg_next::format::context::Context::Output(_) => Err(
                        CaptureError::SourceOpen(format!("{} opened as output", self.config.url)),
                    ),
                }
            }
            None => ffmpeg_next::format::input_with_dictionary(&self.config.url, options)
                .map_err(open_err),
        }
    }
}

impl VideoSource for FfmpegSource {
    fn open(&mut self) -> Result<SourceInfo, CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::SourceOpen(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let ictx = self.open_input()?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::SourceOpen("no video stream found".into()))?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CaptureError::SourceOpen(format!("decoder: {e}")))?;

        let (width, height) = self
            .config
            .frame_size
            .unwrap_or((decoder.width(), decoder.height()));

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CaptureError::SourceOpen(format!("scaler: {e}")))?;

        let description = match &self.config.input_format {
            Some(format) => format!("{} ({format})", self.config.url),
            None => self.config.url.clone(),
        };
        log::info!("Opened {description} at {width}x{height}, {fps:.1} fps");

        self.stream = Some(OpenStream {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushed: false,
        });

        Ok(SourceInfo {
            width,
            height,
            fps,
            description,
        })
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::Read("source not opened".into()))?;

        loop {
            if let Some(mut frame) = try_receive(stream)? {
                if self.config.mirror {
                    frame.mirror_horizontally();
                }
                return Ok(frame);
            }

            let OpenStream {
                ictx,
                decoder,
                stream_index,
                flushed,
                ..
            } = &mut *stream;
            let Some((packet_stream, packet)) = ictx.packets().next() else {
                if *flushed {
                    return Err(CaptureError::Read("end of stream".into()));
                }
                // Drain frames still buffered in the decoder.
                let _ = decoder.send_eof();
                *flushed = true;
                continue;
            };
            if packet_stream.index() != *stream_index {
                continue;
            }
            if let Err(e) = decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable packet: {e}");
            }
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            log::info!("Closed {}", self.config.url);
        }
    }
}

fn try_receive(stream: &mut OpenStream) -> Result<Option<Frame>, CaptureError> {
    let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
    if stream.decoder.receive_frame(&mut decoded).is_err() {
        return Ok(None);
    }
    let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
    stream
        .scaler
        .run(&decoded, &mut rgb_frame)
        .map_err(|e| CaptureError::Read(format!("scaler: {e}")))?;
    let pixels = extract_rgb_pixels(&rgb_frame, stream.width, stream.height);
    Ok(Some(Frame::new(pixels, stream.width, stream.height, 3, 0)))
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Encodes a short MPEG-4 clip whose left half is black and right half white.
    fn write_test_clip(path: &Path, frames: usize, width: u32, height: u32) {
        ffmpeg_next::init().unwrap();
        let mut octx = ffmpeg_next::format::output(path).unwrap();
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut ost = octx.add_stream(Some(codec)).unwrap();
        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, 30));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(30, 1)));
        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }
        let mut encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .unwrap();
        ost.set_parameters(&encoder);
        octx.write_header().unwrap();
        let time_base = octx.stream(0).unwrap().time_base();

        let mut scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .unwrap();

        let write_packets = |encoder: &mut ffmpeg_next::encoder::Video,
                                 octx: &mut ffmpeg_next::format::context::Output| {
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(0);
                encoded.rescale_ts(ffmpeg_next::Rational(1, 30), time_base);
                encoded.write_interleaved(octx).unwrap();
            }
        };

        for i in 0..frames {
            let mut rgb = ffmpeg_next::util::frame::video::Video::new(
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
            );
            let stride = rgb.stride(0);
            let data = rgb.data_mut(0);
            for row in 0..height as usize {
                for col in 0..width as usize {
                    let value = if col < width as usize / 2 { 0 } else { 255 };
                    let offset = row * stride + col * 3;
                    data[offset..offset + 3].fill(value);
                }
            }
            let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
            scaler.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));
            encoder.send_frame(&yuv).unwrap();
            write_packets(&mut encoder, &mut octx);
        }
        encoder.send_eof().unwrap();
        write_packets(&mut encoder, &mut octx);
        octx.write_trailer().unwrap();
    }

    fn clip_source(path: &Path, mirror: bool) -> FfmpegSource {
        let mut config = FfmpegSourceConfig::new(path.to_string_lossy());
        config.mirror = mirror;
        FfmpegSource::new(config)
    }

    #[test]
    fn test_device_options_from_config() {
        let mut config = FfmpegSourceConfig::new("/dev/video0");
        assert!(config.device_options().is_empty());

        config.frame_size = Some((1280, 720));
        config.fps = Some(30);
        assert_eq!(
            config.device_options(),
            vec![
                ("video_size", "1280x720".to_string()),
                ("framerate", "30".to_string())
            ]
        );
    }

    #[test]
    fn test_open_missing_device_fails() {
        let mut source = FfmpegSource::new(FfmpegSourceConfig::new("/nonexistent/video9"));
        assert!(matches!(source.open(), Err(CaptureError::SourceOpen(_))));
    }

    #[test]
    fn test_unknown_input_format_fails() {
        let mut config = FfmpegSourceConfig::new("/dev/video0");
        config.input_format = Some("no-such-demuxer".into());
        let mut source = FfmpegSource::new(config);
        assert!(matches!(source.open(), Err(CaptureError::SourceOpen(_))));
    }

    #[test]
    fn test_read_before_open_fails() {
        let mut source = FfmpegSource::new(FfmpegSourceConfig::new("/dev/video0"));
        assert!(matches!(source.read_frame(), Err(CaptureError::Read(_))));
    }

    #[test]
    fn test_reads_rgb_frames_until_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_clip(&path, 3, 64, 48);

        let mut source = clip_source(&path, false);
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height), (64, 48));

        let mut count = 0;
        while let Ok(frame) = source.read_frame() {
            assert_eq!(frame.channels(), 3);
            assert_eq!(frame.data().len(), 64 * 48 * 3);
            count += 1;
        }
        assert!(count >= 1);
        source.close();
        source.close();
    }

    #[test]
    fn test_mirror_puts_white_half_on_the_left() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_clip(&path, 2, 64, 48);

        let mut source = clip_source(&path, true);
        source.open().unwrap();
        let frame = source.read_frame().unwrap();
        let first_pixel = frame.data()[0];
        let last_pixel = frame.data()[(64 - 1) * 3];
        assert!(first_pixel > 200, "left edge should be white, got {first_pixel}");
        assert!(last_pixel < 50, "right edge should be black, got {last_pixel}");
    }

    #[test]
    fn test_requested_size_scales_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_clip(&path, 2, 64, 48);

        let mut config = FfmpegSourceConfig::new(path.to_string_lossy());
        config.frame_size = Some((32, 24));
        let mut source = FfmpegSource::new(config);
        let info = source.open().unwrap();
        assert_eq!((info.width, info.height), (32, 24));
        assert_eq!(source.read_frame().unwrap().data().len(), 32 * 24 * 3);
    }
}
