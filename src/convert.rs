//! Multi-plane YUV buffer conversion.
//!
//! Sensor buffers arrive as up to three planes, each with its own row stride
//! and pixel stride, plus a crop rectangle. [`convert_frame`] copies the
//! cropped region out into one contiguous buffer in the requested
//! [`OutputLayout`]. The source is only borrowed.

use serde::{Deserialize, Serialize};

use crate::capabilities::Size;
use crate::traits::{CameraError, Result};

/// One plane of a raw sensor buffer.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    /// Plane bytes, starting at the plane's top-left sample.
    pub data: &'a [u8],
    /// Distance in bytes between the starts of consecutive rows.
    pub row_stride: usize,
    /// Distance in bytes between consecutive samples of one row.
    pub pixel_stride: usize,
}

impl<'a> PlaneView<'a> {
    /// New plane view.
    pub const fn new(data: &'a [u8], row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }
}

/// Region of the sensor image to keep, in luma coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CropRect {
    /// Left edge.
    pub left: usize,
    /// Top edge.
    pub top: usize,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl CropRect {
    /// Crop starting at the origin.
    pub const fn full(width: usize, height: usize) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
        }
    }

    /// Logical size of the cropped image.
    pub fn size(&self) -> Size {
        Size::new(
            u32::try_from(self.width).unwrap_or(u32::MAX),
            u32::try_from(self.height).unwrap_or(u32::MAX),
        )
    }
}

/// Pixel format of a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Three-plane YUV 4:2:0 with 2x2 chroma subsampling.
    Yuv420,
    /// Compressed JPEG in plane 0.
    Jpeg,
    /// Packed YUYV 4:2:2, exposed as three strided views of one buffer.
    Yuyv,
}

/// Layout of a converted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// NV21: full luma plane followed by interleaved V/U.
    SemiPlanarVu,
    /// I420: Y, then U, then V.
    Planar,
    /// Luma expanded to `[y, y, y, 0xFF]` per pixel.
    GrayscaleArgb,
    /// Plane 0 copied verbatim.
    Passthrough,
}

/// A borrowed raw buffer handed over by the hardware layer.
#[derive(Debug, Clone)]
pub struct RawBuffer<'a> {
    /// Planes in Y, U, V order.
    pub planes: Vec<PlaneView<'a>>,
    /// Region to keep.
    pub crop: CropRect,
    /// Source format.
    pub format: PixelFormat,
}

impl<'a> RawBuffer<'a> {
    /// Split a contiguous I420 buffer (Y, U, V back to back) into planes.
    ///
    /// Chroma rows are `luma_stride / 2` bytes long.
    pub fn from_contiguous_i420(
        data: &'a [u8],
        width: usize,
        height: usize,
        luma_stride: usize,
    ) -> Result<Self> {
        let chroma_stride = luma_stride / 2;
        let luma_len = luma_stride.saturating_mul(height);
        let chroma_len = chroma_stride.saturating_mul(height.div_ceil(2));

        let (luma, rest) = data.split_at_checked(luma_len).ok_or_else(|| {
            CameraError::MalformedBuffer(format!(
                "I420 buffer of {} bytes has no room for a {luma_len}-byte luma plane",
                data.len()
            ))
        })?;
        let (u, v) = rest.split_at_checked(chroma_len).ok_or_else(|| {
            CameraError::MalformedBuffer(format!(
                "I420 buffer of {} bytes has no room for chroma planes",
                data.len()
            ))
        })?;

        Ok(Self {
            planes: vec![
                PlaneView::new(luma, luma_stride, 1),
                PlaneView::new(u, chroma_stride, 1),
                PlaneView::new(v, chroma_stride, 1),
            ],
            crop: CropRect::full(width, height),
            format: PixelFormat::Yuv420,
        })
    }

    /// View a packed YUYV buffer as strided Y, U and V planes.
    ///
    /// Chroma planes skip every other row so the 4:2:2 source reads as 4:2:0.
    pub fn from_yuyv(data: &'a [u8], width: usize, height: usize, stride: usize) -> Self {
        let chroma = |offset: usize| data.get(offset..).unwrap_or_default();
        Self {
            planes: vec![
                PlaneView::new(data, stride, 2),
                PlaneView::new(chroma(1), stride.saturating_mul(2), 4),
                PlaneView::new(chroma(3), stride.saturating_mul(2), 4),
            ],
            crop: CropRect::full(width, height),
            format: PixelFormat::Yuyv,
        }
    }

    /// Single-plane buffer holding compressed data.
    pub fn jpeg(data: &'a [u8], width: usize, height: usize) -> Self {
        Self {
            planes: vec![PlaneView::new(data, data.len(), 1)],
            crop: CropRect::full(width, height),
            format: PixelFormat::Jpeg,
        }
    }

    /// Replace the crop rectangle.
    #[must_use]
    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }
}

/// Where one source plane lands in the output.
#[derive(Debug, Clone, Copy)]
struct PlaneTarget {
    index: usize,
    shift: u32,
    offset: usize,
    stride: usize,
}

/// Bounds-checked source geometry of one plane under one crop.
#[derive(Debug, Clone, Copy)]
struct PlaneSpan {
    start: usize,
    row_len: usize,
    rows: usize,
}

impl OutputLayout {
    const fn planes_needed(self) -> usize {
        match self {
            Self::SemiPlanarVu | Self::Planar => 3,
            Self::GrayscaleArgb | Self::Passthrough => 1,
        }
    }

    /// Only called once `expected_output_len` has accepted the crop, so the
    /// offsets below stay within the output length.
    fn targets(self, crop: &CropRect) -> Vec<PlaneTarget> {
        let luma = crop.width * crop.height;
        let chroma = (crop.width / 2) * (crop.height / 2);
        let target = |index, shift, offset, stride| PlaneTarget {
            index,
            shift,
            offset,
            stride,
        };
        match self {
            Self::SemiPlanarVu => vec![
                target(0, 0, 0, 1),
                target(1, 1, luma + 1, 2),
                target(2, 1, luma, 2),
            ],
            Self::Planar => vec![
                target(0, 0, 0, 1),
                target(1, 1, luma, 1),
                target(2, 1, luma + chroma, 1),
            ],
            Self::GrayscaleArgb => vec![target(0, 0, 0, 4)],
            Self::Passthrough => Vec::new(),
        }
    }
}

/// Output length in bytes for a layout and crop.
///
/// Passthrough has no fixed size and reports `None`, as does a crop whose
/// byte count does not fit in `usize`.
pub const fn expected_output_len(layout: OutputLayout, crop: &CropRect) -> Option<usize> {
    let Some(pixels) = crop.width.checked_mul(crop.height) else {
        return None;
    };
    match layout {
        OutputLayout::SemiPlanarVu | OutputLayout::Planar => match pixels.checked_mul(12) {
            Some(bits) => Some(bits / 8),
            None => None,
        },
        OutputLayout::GrayscaleArgb => pixels.checked_mul(4),
        OutputLayout::Passthrough => None,
    }
}

fn malformed(message: String) -> CameraError {
    CameraError::MalformedBuffer(message)
}

/// Copy the cropped region of `raw` into a new buffer in `layout`.
///
/// A buffer with fewer planes than the layout needs yields an empty output.
/// Every plane is checked against its strides and the crop before anything
/// is allocated; a plane that is too short, has a zero pixel stride, has
/// overlapping rows or whose geometry overflows is
/// [`CameraError::MalformedBuffer`].
pub fn convert_frame(raw: &RawBuffer<'_>, layout: OutputLayout) -> Result<Vec<u8>> {
    if raw.planes.len() < layout.planes_needed() {
        return Ok(Vec::new());
    }

    if layout == OutputLayout::Passthrough {
        return Ok(raw
            .planes
            .first()
            .map(|plane| plane.data.to_vec())
            .unwrap_or_default());
    }

    let crop = &raw.crop;
    let len = expected_output_len(layout, crop).ok_or_else(|| {
        malformed(format!(
            "crop {}x{} overflows the output size",
            crop.width, crop.height
        ))
    })?;

    let mut work = Vec::with_capacity(layout.planes_needed());
    for target in layout.targets(crop) {
        let Some(plane) = raw.planes.get(target.index) else {
            return Ok(Vec::new());
        };
        if let Some(span) = plane_span(plane, crop, target)? {
            work.push((plane, span, target));
        }
    }

    let mut out = vec![0u8; len];
    for (plane, span, target) in work {
        copy_plane(plane, span, target, &mut out)?;
    }

    if layout == OutputLayout::GrayscaleArgb {
        for pixel in out.chunks_exact_mut(4) {
            if let [y, g, b, alpha] = pixel {
                *g = *y;
                *b = *y;
                *alpha = 0xFF;
            }
        }
    }

    Ok(out)
}

/// Validate a plane's strides against the crop. `None` when the shifted
/// crop is empty and there is nothing to copy.
fn plane_span(
    plane: &PlaneView<'_>,
    crop: &CropRect,
    target: PlaneTarget,
) -> Result<Option<PlaneSpan>> {
    let width = crop.width >> target.shift;
    let rows = crop.height >> target.shift;
    if width == 0 || rows == 0 {
        return Ok(None);
    }

    let index = target.index;
    if plane.pixel_stride == 0 {
        return Err(malformed(format!("plane {index} has a zero pixel stride")));
    }
    let overflow = || malformed(format!("plane {index} geometry overflows"));

    let row_len = (width - 1)
        .checked_mul(plane.pixel_stride)
        .and_then(|span| span.checked_add(1))
        .ok_or_else(overflow)?;
    if rows > 1 && plane.row_stride < row_len {
        return Err(malformed(format!(
            "plane {index} row stride {} is shorter than its {row_len}-byte rows",
            plane.row_stride
        )));
    }

    let start = plane
        .row_stride
        .checked_mul(crop.top >> target.shift)
        .zip(plane.pixel_stride.checked_mul(crop.left >> target.shift))
        .and_then(|(top, left)| top.checked_add(left))
        .ok_or_else(overflow)?;
    let end = (rows - 1)
        .checked_mul(plane.row_stride)
        .and_then(|last_row| last_row.checked_add(start))
        .and_then(|last_row| last_row.checked_add(row_len))
        .ok_or_else(overflow)?;

    if end > plane.data.len() {
        return Err(malformed(format!(
            "plane {index} needs {end} bytes but holds {}",
            plane.data.len()
        )));
    }

    Ok(Some(PlaneSpan {
        start,
        row_len,
        rows,
    }))
}

fn copy_plane(
    plane: &PlaneView<'_>,
    span: PlaneSpan,
    target: PlaneTarget,
    out: &mut [u8],
) -> Result<()> {
    let bulk = plane.pixel_stride == 1 && target.stride == 1;
    let mut dst = target.offset;

    for row in 0..span.rows {
        let row_start = span.start + row * plane.row_stride;
        let src = plane
            .data
            .get(row_start..row_start + span.row_len)
            .ok_or_else(|| {
                malformed(format!(
                    "plane {} row at {row_start} runs past {} bytes",
                    target.index,
                    plane.data.len()
                ))
            })?;

        if bulk {
            let dst_row = out
                .get_mut(dst..dst + span.row_len)
                .ok_or_else(|| output_overflow(target))?;
            dst_row.copy_from_slice(src);
            dst += span.row_len;
        } else {
            for sample in src.iter().step_by(plane.pixel_stride) {
                let slot = out.get_mut(dst).ok_or_else(|| output_overflow(target))?;
                *slot = *sample;
                dst += target.stride;
            }
        }
    }

    Ok(())
}

fn output_overflow(target: PlaneTarget) -> CameraError {
    malformed(format!(
        "plane {} does not fit the output at offset {}",
        target.index, target.offset
    ))
}
