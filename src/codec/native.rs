//! In-process AV1 round-trip, no external tools.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | RGB → YCbCr 4:2:0 | [`Yuv420::from_rgb`](super::yuv::Yuv420::from_rgb) |
//! | Encode | `rav1e` (8-bit, full range, quantizer from CRF) |
//! | Container | `ivf` (in-memory `Vec<u8>`) |
//! | Decode | `rav1d` (pure Rust port of dav1d) |
//! | YCbCr → RGB | [`Yuv420::to_rgb`](super::yuv::Yuv420::to_rgb) |
//!
//! The encoder is flushed after the single frame so every buffered packet is
//! drained into the container before decoding starts.
//!
//! rav1e refuses frames under 16 px on either side. Smaller frames are
//! edge-replicated up to that size before encoding and the decoded frame is
//! cropped back to the source dimensions.

use super::backend::{BackendError, RoundTrip, RoundTripBackend};
use super::params::Crf;
use super::yuv::{Yuv420, chroma_dimensions};
use image::RgbImage;
use rav1e::prelude::*;
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

/// Fastest rav1e speed preset; quality is governed by the quantizer alone.
pub const DEFAULT_SPEED: u8 = 10;

/// Smallest width and height rav1e accepts.
const MIN_DIMENSION: u32 = 16;

const IVF_SIGNATURE: &[u8; 4] = b"DKIF";
const IVF_HEADER_LEN: usize = 32;

/// In-process backend: `rav1e` encode, `ivf` container, `rav1d` decode.
///
/// See the [module docs](self) for the crate-to-step mapping.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    speed: u8,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self {
            speed: DEFAULT_SPEED,
        }
    }

    pub fn with_speed(speed: u8) -> Self {
        Self { speed }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTripBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn round_trip(&self, frame: &RgbImage, crf: Crf) -> Result<RoundTrip, BackendError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "cannot encode an empty {width}x{height} frame"
            )));
        }

        let padded = pad_to_minimum(frame);
        let container = encode_ivf(&padded, crf, self.speed)?;
        debug!(
            width,
            height,
            padded = matches!(padded, Cow::Owned(_)),
            %crf,
            bytes = container.len(),
            "encoded single-frame AV1 stream"
        );

        Ok(match decode_first_frame(&container)? {
            Some(decoded) if decoded.dimensions() != (width, height) => RoundTrip::Decoded(
                image::imageops::crop_imm(&decoded, 0, 0, width, height).to_image(),
            ),
            Some(decoded) => RoundTrip::Decoded(decoded),
            None => RoundTrip::Empty,
        })
    }
}

/// Edge-replicate `frame` to at least [`MIN_DIMENSION`] on each side.
///
/// `frame` must not be empty.
fn pad_to_minimum(frame: &RgbImage) -> Cow<'_, RgbImage> {
    let (width, height) = frame.dimensions();
    if width >= MIN_DIMENSION && height >= MIN_DIMENSION {
        return Cow::Borrowed(frame);
    }
    let padded = RgbImage::from_fn(
        width.max(MIN_DIMENSION),
        height.max(MIN_DIMENSION),
        |x, y| *frame.get_pixel(x.min(width - 1), y.min(height - 1)),
    );
    Cow::Owned(padded)
}

/// Encode one RGB frame as an AV1 stream inside an in-memory IVF container.
pub(crate) fn encode_ivf(frame: &RgbImage, crf: Crf, speed: u8) -> Result<Vec<u8>, BackendError> {
    let (width, height) = frame.dimensions();
    let yuv = Yuv420::from_rgb(frame);

    let mut enc = EncoderConfig::with_speed_preset(speed);
    enc.width = width as usize;
    enc.height = height as usize;
    enc.bit_depth = 8;
    enc.chroma_sampling = ChromaSampling::Cs420;
    enc.pixel_range = PixelRange::Full;
    enc.quantizer = crf.to_av1_quantizer();
    enc.low_latency = true;

    let cfg = Config::new().with_encoder_config(enc).with_threads(1);
    let mut ctx: Context<u8> = cfg.new_context().map_err(|e| {
        BackendError::ProcessingFailed(format!("rav1e rejected {width}x{height} @ crf {crf}: {e}"))
    })?;

    let mut input = ctx.new_frame();
    let chroma_width = yuv.chroma_width() as usize;
    input.planes[0].copy_from_raw_u8(&yuv.y, width as usize, 1);
    input.planes[1].copy_from_raw_u8(&yuv.u, chroma_width, 1);
    input.planes[2].copy_from_raw_u8(&yuv.v, chroma_width, 1);

    ctx.send_frame(Some(Arc::new(input)))
        .map_err(|e| BackendError::ProcessingFailed(format!("rav1e send_frame failed: {e:?}")))?;
    ctx.flush();

    let mut container = Vec::new();
    ivf::write_ivf_header(&mut container, width as usize, height as usize, 1, 1);

    loop {
        match ctx.receive_packet() {
            Ok(packet) => {
                ivf::write_ivf_frame(&mut container, packet.input_frameno, &packet.data);
            }
            Err(EncoderStatus::Encoded) => {}
            Err(EncoderStatus::LimitReached) | Err(EncoderStatus::NeedMoreData) => break,
            Err(status) => {
                return Err(BackendError::ProcessingFailed(format!(
                    "rav1e receive_packet failed: {status:?}"
                )));
            }
        }
    }

    Ok(container)
}

/// Split an IVF container into its coded frames.
fn read_ivf_packets(container: &[u8]) -> Result<Vec<Vec<u8>>, BackendError> {
    if container.len() < IVF_HEADER_LEN || &container[..4] != IVF_SIGNATURE {
        return Err(BackendError::ProcessingFailed(
            "not an IVF container".to_string(),
        ));
    }
    let header_len = usize::from(u16::from_le_bytes([container[6], container[7]]));
    let mut cursor = Cursor::new(&container[header_len.max(IVF_HEADER_LEN).min(container.len())..]);

    let mut packets = Vec::new();
    loop {
        match ivf::read_packet(&mut cursor) {
            Ok(packet) => packets.push(packet.data.to_vec()),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(BackendError::Io(err)),
        }
    }
    Ok(packets)
}

/// Decode the first frame of an IVF/AV1 container with rav1d.
///
/// Returns `Ok(None)` when the container holds no frames or the decoder
/// yields no picture for any of them.
pub(crate) fn decode_first_frame(container: &[u8]) -> Result<Option<RgbImage>, BackendError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let packets = read_ivf_packets(container)?;
    if packets.is_empty() {
        return Ok(None);
    }

    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new_unchecked(settings.as_mut_ptr()))
    };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(BackendError::ProcessingFailed(format!(
            "rav1d open failed ({})",
            rc.0
        )));
    }

    let take_picture = || -> Option<Result<Yuv420, BackendError>> {
        let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
        let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
        if rc.0 != 0 {
            debug!(rc = rc.0, "rav1d has no picture ready");
            return None;
        }
        let planes = copy_planes(&pic);
        unsafe { rav1d::src::lib::dav1d_picture_unref(NonNull::new(&mut pic)) };
        Some(planes)
    };

    let decode = || -> Result<Option<RgbImage>, BackendError> {
        for packet in &packets {
            let mut data = Dav1dData::default();
            let buf_ptr =
                unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), packet.len()) };
            if buf_ptr.is_null() {
                return Err(BackendError::ProcessingFailed(
                    "rav1d data_create failed".into(),
                ));
            }
            unsafe { std::ptr::copy_nonoverlapping(packet.as_ptr(), buf_ptr, packet.len()) };

            let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
            if rc.0 != 0 {
                unsafe { rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data)) };
                // A full output queue also rejects input; drain it first.
                return match take_picture() {
                    Some(planes) => planes.map(|p| Some(p.to_rgb())),
                    None => Err(BackendError::ProcessingFailed(format!(
                        "rav1d send_data failed ({})",
                        rc.0
                    ))),
                };
            }

            if let Some(planes) = take_picture() {
                return planes.map(|p| Some(p.to_rgb()));
            }
        }
        take_picture().transpose().map(|p| p.map(|p| p.to_rgb()))
    };

    let result = decode();
    unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
    result
}

/// Copy the planes of an 8-bit 4:2:0 rav1d picture into owned buffers.
fn copy_planes(
    pic: &rav1d::include::dav1d::picture::Dav1dPicture,
) -> Result<Yuv420, BackendError> {
    use rav1d::include::dav1d::headers::DAV1D_PIXEL_LAYOUT_I420;

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    if bpc != 8 || pic.p.layout != DAV1D_PIXEL_LAYOUT_I420 {
        return Err(BackendError::ProcessingFailed(format!(
            "unexpected decoded picture: {bpc}-bit, layout {}",
            pic.p.layout
        )));
    }

    let plane_ptr = |i: usize| -> Result<*const u8, BackendError> {
        pic.data[i]
            .map(|p| p.as_ptr() as *const u8)
            .ok_or_else(|| BackendError::ProcessingFailed(format!("decoded plane {i} missing")))
    };
    let (cw, ch) = chroma_dimensions(width, height);

    let y = unsafe { read_plane(plane_ptr(0)?, pic.stride[0], width, height) };
    let u = unsafe { read_plane(plane_ptr(1)?, pic.stride[1], cw, ch) };
    let v = unsafe { read_plane(plane_ptr(2)?, pic.stride[1], cw, ch) };

    Yuv420::from_planes(width, height, y, u, v).ok_or_else(|| {
        BackendError::ProcessingFailed("decoded plane sizes do not match frame".into())
    })
}

/// Read `rows` rows of `width` bytes from a strided plane.
///
/// # Safety
/// `ptr` must point to a plane with at least `rows` rows of `stride` bytes.
unsafe fn read_plane(ptr: *const u8, stride: isize, width: u32, rows: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(width as usize * rows as usize);
    for row in 0..rows {
        let line =
            unsafe { std::slice::from_raw_parts(ptr.offset(row as isize * stride), width as usize) };
        out.extend_from_slice(line);
    }
    out
}
