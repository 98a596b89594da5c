//! Full-range BT.601 conversion between interleaved RGB8 and planar YCbCr 4:2:0.
//!
//! Both directions use the JPEG/JFIF equations (no studio-swing offset), so a
//! neutral gray survives the trip exactly. Chroma planes are
//! `ceil(w/2) × ceil(h/2)`; each chroma sample is the mean of the (up to) four
//! luma positions it covers, so odd widths and heights work.

use image::{Rgb, RgbImage};

/// Chroma plane dimensions for a 4:2:0 frame of the given luma size.
pub fn chroma_dimensions(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(2), height.div_ceil(2))
}

/// Tightly packed 8-bit 4:2:0 planes (stride == plane width).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Yuv420 {
    pub width: u32,
    pub height: u32,
    pub y: Vec<u8>,
    pub u: Vec<u8>,
    pub v: Vec<u8>,
}

impl Yuv420 {
    /// Wrap existing planes, checking that their sizes match the frame.
    pub fn from_planes(
        width: u32,
        height: u32,
        y: Vec<u8>,
        u: Vec<u8>,
        v: Vec<u8>,
    ) -> Option<Self> {
        let (cw, ch) = chroma_dimensions(width, height);
        let luma_len = width as usize * height as usize;
        let chroma_len = cw as usize * ch as usize;
        if y.len() != luma_len || u.len() != chroma_len || v.len() != chroma_len {
            return None;
        }
        Some(Self {
            width,
            height,
            y,
            u,
            v,
        })
    }

    pub fn chroma_width(&self) -> u32 {
        chroma_dimensions(self.width, self.height).0
    }

    /// Convert full-range RGB to YCbCr, averaging chroma over 2×2 blocks.
    pub fn from_rgb(img: &RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let (cw, ch) = chroma_dimensions(width, height);
        let chroma_len = cw as usize * ch as usize;

        let mut y = Vec::with_capacity(width as usize * height as usize);
        let mut cb_sum = vec![0f32; chroma_len];
        let mut cr_sum = vec![0f32; chroma_len];
        let mut taps = vec![0u8; chroma_len];

        for row in 0..height {
            for col in 0..width {
                let Rgb([r, g, b]) = *img.get_pixel(col, row);
                let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));

                y.push(to_sample(0.299 * r + 0.587 * g + 0.114 * b));

                let ci = (row / 2 * cw + col / 2) as usize;
                cb_sum[ci] += 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
                cr_sum[ci] += 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
                taps[ci] += 1;
            }
        }

        let average = |sums: Vec<f32>| -> Vec<u8> {
            sums.into_iter()
                .zip(&taps)
                .map(|(sum, &n)| to_sample(sum / f32::from(n.max(1))))
                .collect()
        };

        Self {
            width,
            height,
            y,
            u: average(cb_sum),
            v: average(cr_sum),
        }
    }

    /// Convert back to interleaved full-range RGB8.
    pub fn to_rgb(&self) -> RgbImage {
        let cw = self.chroma_width();
        RgbImage::from_fn(self.width, self.height, |col, row| {
            let luma = f32::from(self.y[(row * self.width + col) as usize]);
            let ci = (row / 2 * cw + col / 2) as usize;
            let cb = f32::from(self.u[ci]) - 128.0;
            let cr = f32::from(self.v[ci]) - 128.0;

            Rgb([
                to_sample(luma + 1.402 * cr),
                to_sample(luma - 0.344136 * cb - 0.714136 * cr),
                to_sample(luma + 1.772 * cb),
            ])
        })
    }
}

#[inline]
fn to_sample(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
