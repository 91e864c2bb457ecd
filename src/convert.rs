use image::codecs::jpeg::JpegEncoder;
use rayon::prelude::*;
use thiserror::Error;
use yuv::{YuvBiPlanarImage, YuvConversionMode, YuvRange, YuvStandardMatrix, yuv_nv21_to_rgb};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::{
    frame::{CameraFrame, Plane},
    types::{Fidelity, RgbFrame},
};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("expected 2 or 3 planes, got {0}")]
    PlaneCount(usize),
    #[error("{plane} plane too small: got {got} bytes, need {need}")]
    Truncated {
        plane: &'static str,
        got: usize,
        need: usize,
    },
    #[error("NV21→RGB failed: {0}")]
    Yuv(String),
    #[error("JPEG encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("JPEG decode failed: {0}")]
    Decode(String),
    #[error("decoded {got_w}x{got_h}, expected {want_w}x{want_h}")]
    DimensionMismatch {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
}

/// Converts one captured frame into a decoded RGB raster of the same
/// dimensions.
///
/// The planes are repacked into a single NV21 buffer and pushed through the
/// same YUV → JPEG → raster round trip the still-capture path uses, so live
/// analysis and stills see identically processed pixels. `fidelity` picks the
/// JPEG quality for the round trip.
///
/// The source frame is never mutated, and its release stays the caller's
/// responsibility (it happens on drop regardless of the outcome here).
pub fn convert_frame(frame: &CameraFrame, fidelity: Fidelity) -> Result<RgbFrame, ConvertError> {
    let width = frame.width();
    let height = frame.height();
    let w = width as usize;
    let h = height as usize;
    let chroma_w = w.div_ceil(2);

    let nv21 = pack_nv21(frame)?;
    let y_size = w * h;

    let planar = YuvBiPlanarImage {
        y_plane: &nv21[..y_size],
        y_stride: width,
        uv_plane: &nv21[y_size..],
        uv_stride: (chroma_w * 2) as u32,
        width,
        height,
    };

    // JPEG chroma is BT.601 full range; anything else tints the output.
    let mut rgb = vec![0u8; w * h * 3];
    yuv_nv21_to_rgb(
        &planar,
        &mut rgb,
        (w * 3) as u32,
        YuvRange::Full,
        YuvStandardMatrix::Bt601,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| ConvertError::Yuv(format!("{err:?}")))?;

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, fidelity.jpeg_quality());
    encoder.encode(&rgb, width, height, image::ExtendedColorType::Rgb8)?;

    decode_jpeg(&jpeg, width, height)
}

/// Repacks the frame's planes into one NV21 buffer: full-resolution luma
/// followed by interleaved chroma with V leading each pair.
///
/// The sensor hands chroma over U-first, in either a single interleaved plane
/// or two planar ones. The encoder side expects V first, so the order is
/// swapped here; getting this backwards swaps red and blue in every output
/// pixel.
fn pack_nv21(frame: &CameraFrame) -> Result<Vec<u8>, ConvertError> {
    let w = frame.width() as usize;
    let h = frame.height() as usize;
    let chroma_w = w.div_ceil(2);
    let chroma_h = h.div_ceil(2);
    let y_size = w * h;
    let chroma_size = chroma_w * chroma_h;

    let mut nv21 = vec![0u8; y_size + chroma_size * 2];
    let (luma_out, chroma_out) = nv21.split_at_mut(y_size);

    match frame.planes() {
        [luma, interleaved] => {
            copy_rows(luma, w, h, luma_out, "luma")?;
            let mut uv = vec![0u8; chroma_size * 2];
            copy_rows(interleaved, chroma_w * 2, chroma_h, &mut uv, "chroma")?;
            chroma_out
                .par_chunks_exact_mut(2)
                .zip(uv.par_chunks_exact(2))
                .for_each(|(dst, src)| {
                    dst[0] = src[1];
                    dst[1] = src[0];
                });
        }
        [luma, u_plane, v_plane] => {
            copy_rows(luma, w, h, luma_out, "luma")?;
            let mut u = vec![0u8; chroma_size];
            let mut v = vec![0u8; chroma_size];
            copy_rows(u_plane, chroma_w, chroma_h, &mut u, "U")?;
            copy_rows(v_plane, chroma_w, chroma_h, &mut v, "V")?;
            chroma_out
                .par_chunks_exact_mut(2)
                .zip(v.par_iter().zip(u.par_iter()))
                .for_each(|(dst, (v, u))| {
                    dst[0] = *v;
                    dst[1] = *u;
                });
        }
        other => return Err(ConvertError::PlaneCount(other.len())),
    }

    Ok(nv21)
}

fn copy_rows(
    plane: &Plane,
    row_width: usize,
    rows: usize,
    dst: &mut [u8],
    name: &'static str,
) -> Result<(), ConvertError> {
    let stride = plane.row_stride.max(row_width);
    let need = stride * (rows - 1) + row_width;
    if plane.bytes.len() < need {
        return Err(ConvertError::Truncated {
            plane: name,
            got: plane.bytes.len(),
            need,
        });
    }

    for (dst_row, src_row) in dst
        .chunks_exact_mut(row_width)
        .zip(plane.bytes.chunks(stride))
    {
        dst_row.copy_from_slice(&src_row[..row_width]);
    }
    Ok(())
}

fn decode_jpeg(jpeg: &[u8], want_w: u32, want_h: u32) -> Result<RgbFrame, ConvertError> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(jpeg), options);
    let rgb = decoder
        .decode()
        .map_err(|err| ConvertError::Decode(format!("{err:?}")))?;

    if let Some(info) = decoder.info() {
        let (got_w, got_h) = (info.width as u32, info.height as u32);
        if got_w != want_w || got_h != want_h {
            return Err(ConvertError::DimensionMismatch {
                got_w,
                got_h,
                want_w,
                want_h,
            });
        }
    }

    Ok(RgbFrame {
        rgb,
        width: want_w,
        height: want_h,
    })
}
