use ndarray::{ArrayView3, ArrayViewMut3};

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; the monitoring layer
/// treats pixel data as opaque apart from cropping and resizing.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Solid-colour RGB frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3], index: usize) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, 3, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True for a non-empty 3-channel frame whose buffer matches its dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.channels == 3
            && self.data.len()
                == (self.width as usize) * (self.height as usize) * (self.channels as usize)
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixel rectangle `[x1, x2) × [y1, y2)` after clamping it to
    /// the frame. Returns `None` when the clamped rectangle is empty.
    pub fn crop(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Option<Frame> {
        let fw = self.width as i64;
        let fh = self.height as i64;
        let x1 = x1.clamp(0, fw) as usize;
        let y1 = y1.clamp(0, fh) as usize;
        let x2 = x2.clamp(0, fw) as usize;
        let y2 = y2.clamp(0, fh) as usize;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        let channels = self.channels as usize;
        let row_bytes = self.width as usize * channels;
        let crop_w = x2 - x1;
        let crop_h = y2 - y1;
        let mut data = Vec::with_capacity(crop_w * crop_h * channels);
        for row in y1..y2 {
            let start = row * row_bytes + x1 * channels;
            data.extend_from_slice(&self.data[start..start + crop_w * channels]);
        }

        Some(Frame::new(
            data,
            crop_w as u32,
            crop_h as u32,
            self.channels,
            self.index,
        ))
    }

    /// Nearest-neighbour resize to `width` × `height` (both clamped to ≥ 1).
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        let dst_w = width.max(1) as usize;
        let dst_h = height.max(1) as usize;
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let channels = self.channels as usize;

        let src = self.as_ndarray();
        let mut data = Vec::with_capacity(dst_w * dst_h * channels);
        for y in 0..dst_h {
            let src_y = (((y as f64 + 0.5) * src_h as f64 / dst_h as f64) as usize).min(src_h - 1);
            for x in 0..dst_w {
                let src_x =
                    (((x as f64 + 0.5) * src_w as f64 / dst_w as f64) as usize).min(src_w - 1);
                for c in 0..channels {
                    data.push(src[[src_y, src_x, c]]);
                }
            }
        }

        Frame::new(data, dst_w as u32, dst_h as u32, self.channels, self.index)
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
