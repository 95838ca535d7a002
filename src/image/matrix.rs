// src/image/matrix.rs

//! In-memory matrix handles.
//!
//! A [`Matrix`] is the unit of pixel data exchanged with upstream executors:
//! a 2D, row-major, multi-channel raster. Channels are stored behind `Arc`,
//! so cloning a matrix is cheap and shares the underlying pixels; every
//! mutating operation produces a new handle. Channel 0 is privileged as the
//! "label channel" by all label-related operations.

use std::sync::Arc;

use bitvec::prelude::*;

use crate::image::element::{ElementType, Sample};
use crate::utils::error::{MapError, Result};

/// Maximum number of pixels in any matrix handled by this library.
pub const MAX_PIXEL_COUNT: i64 = i32::MAX as i64;

/// Owned row-major sample storage of a single channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    I8(Vec<i8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    U32(Vec<u32>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Bit(BitVec),
}

macro_rules! each_numeric {
    ($samples:expr, |$v:ident| $body:expr, |$bits:ident| $bit_body:expr) => {
        match $samples {
            Samples::U8($v) => $body,
            Samples::I8($v) => $body,
            Samples::U16($v) => $body,
            Samples::I16($v) => $body,
            Samples::U32($v) => $body,
            Samples::I32($v) => $body,
            Samples::F32($v) => $body,
            Samples::F64($v) => $body,
            Samples::Bit($bits) => $bit_body,
        }
    };
}

impl Samples {
    /// Zero-initialised storage of the given element type and length.
    pub fn zeros(element: ElementType, len: usize) -> Samples {
        match element {
            ElementType::U8 => Samples::U8(vec![0; len]),
            ElementType::I8 => Samples::I8(vec![0; len]),
            ElementType::U16 => Samples::U16(vec![0; len]),
            ElementType::I16 => Samples::I16(vec![0; len]),
            ElementType::U32 => Samples::U32(vec![0; len]),
            ElementType::I32 => Samples::I32(vec![0; len]),
            ElementType::F32 => Samples::F32(vec![0.0; len]),
            ElementType::F64 => Samples::F64(vec![0.0; len]),
            ElementType::Bit => Samples::Bit(bitvec![0; len]),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Samples::U8(_) => ElementType::U8,
            Samples::I8(_) => ElementType::I8,
            Samples::U16(_) => ElementType::U16,
            Samples::I16(_) => ElementType::I16,
            Samples::U32(_) => ElementType::U32,
            Samples::I32(_) => ElementType::I32,
            Samples::F32(_) => ElementType::F32,
            Samples::F64(_) => ElementType::F64,
            Samples::Bit(_) => ElementType::Bit,
        }
    }

    pub fn len(&self) -> usize {
        each_numeric!(self, |v| v.len(), |bits| bits.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample as an integer; float samples are truncated, bits map to 0/1.
    pub fn get_i64(&self, index: usize) -> i64 {
        each_numeric!(self, |v| v[index].to_i64(), |bits| bits[index] as i64)
    }

    pub fn get_f64(&self, index: usize) -> f64 {
        each_numeric!(self, |v| v[index].to_f64(), |bits| bits[index] as u8 as f64)
    }

    pub fn is_zero(&self, index: usize) -> bool {
        each_numeric!(
            self,
            |v| v[index] == Default::default(),
            |bits| !bits[index]
        )
    }

    pub fn set_zero(&mut self, index: usize) {
        each_numeric!(
            self,
            |v| v[index] = Default::default(),
            |bits| bits.set(index, false)
        )
    }

    /// Copies a `count_x` x `count_y` block of rows from `src`. The element
    /// types must match; a mismatch here means the callers' validation has
    /// a hole, so it surfaces as `Internal`.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_rows_from(
        &mut self,
        dst_dim_x: usize,
        dst_x: usize,
        dst_y: usize,
        src: &Samples,
        src_dim_x: usize,
        src_x: usize,
        src_y: usize,
        count_x: usize,
        count_y: usize,
    ) -> Result<()> {
        macro_rules! copy_block {
            ($d:ident, $s:ident, $copy:ident) => {
                for row in 0..count_y {
                    let di = (dst_y + row) * dst_dim_x + dst_x;
                    let si = (src_y + row) * src_dim_x + src_x;
                    $d[di..di + count_x].$copy(&$s[si..si + count_x]);
                }
            };
        }
        match (self, src) {
            (Samples::U8(d), Samples::U8(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::I8(d), Samples::I8(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::U16(d), Samples::U16(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::I16(d), Samples::I16(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::U32(d), Samples::U32(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::I32(d), Samples::I32(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::F32(d), Samples::F32(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::F64(d), Samples::F64(s)) => copy_block!(d, s, copy_from_slice),
            (Samples::Bit(d), Samples::Bit(s)) => copy_block!(d, s, copy_from_bitslice),
            (d, s) => {
                return Err(MapError::Internal(format!(
                    "channel element type mismatch during copy: {:?} vs {:?}",
                    d.element_type(),
                    s.element_type()
                )));
            }
        }
        Ok(())
    }
}

/// One immutable channel of a matrix, shared by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    samples: Arc<Samples>,
}

impl ChannelData {
    pub fn new(samples: Samples) -> Self {
        ChannelData {
            samples: Arc::new(samples),
        }
    }

    pub fn zeros(element: ElementType, len: usize) -> Self {
        ChannelData::new(Samples::zeros(element, len))
    }

    pub fn from_i32(data: Vec<i32>) -> Self {
        ChannelData::new(Samples::I32(data))
    }

    pub fn element_type(&self) -> ElementType {
        self.samples.element_type()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn get_i64(&self, index: usize) -> i64 {
        self.samples.get_i64(index)
    }

    pub fn get_f64(&self, index: usize) -> f64 {
        self.samples.get_f64(index)
    }

    pub fn is_zero(&self, index: usize) -> bool {
        self.samples.is_zero(index)
    }

    /// Direct access to 32-bit integer storage, when the backing array is
    /// one. Unsigned storage is reinterpreted bitwise, so labels above
    /// `i32::MAX` show up negative and fail the entry checks downstream.
    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        match self.samples.as_ref() {
            Samples::I32(v) => Some(v.as_slice()),
            Samples::U32(v) => Some(bytemuck::cast_slice(v.as_slice())),
            _ => None,
        }
    }
}

/// A multi-channel, row-major 2D raster with 64-bit dimensions.
///
/// Invariants: `dim_x, dim_y >= 1`, `dim_x * dim_y <= 2^31 - 1`, at least
/// one channel, and every channel holds exactly `dim_x * dim_y` samples.
/// Channels may differ in element type; label operations consult channel 0
/// only.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    dim_x: i64,
    dim_y: i64,
    channels: Vec<ChannelData>,
}

impl Matrix {
    pub fn new(dim_x: i64, dim_y: i64, channels: Vec<ChannelData>) -> Result<Self> {
        if dim_x < 1 || dim_y < 1 {
            return Err(MapError::BadShape(format!(
                "matrix dimensions must be positive, got {}x{}",
                dim_x, dim_y
            )));
        }
        let count = dim_x
            .checked_mul(dim_y)
            .filter(|&c| c <= MAX_PIXEL_COUNT)
            .ok_or_else(|| {
                MapError::BadShape(format!(
                    "matrix {}x{} exceeds {} pixels",
                    dim_x, dim_y, MAX_PIXEL_COUNT
                ))
            })?;
        if channels.is_empty() {
            return Err(MapError::BadInput("matrix must have at least one channel".into()));
        }
        for (c, channel) in channels.iter().enumerate() {
            if channel.len() as i64 != count {
                return Err(MapError::BadShape(format!(
                    "channel {} holds {} samples, expected {}",
                    c,
                    channel.len(),
                    count
                )));
            }
        }
        Ok(Matrix {
            dim_x,
            dim_y,
            channels,
        })
    }

    /// The outbound factory contract: a fresh zero-initialised matrix where
    /// every channel has the same element type.
    pub fn zeros(element: ElementType, num_channels: usize, dim_x: i64, dim_y: i64) -> Result<Self> {
        if num_channels == 0 {
            return Err(MapError::BadInput("matrix must have at least one channel".into()));
        }
        if dim_x < 1 || dim_y < 1 {
            return Err(MapError::BadShape(format!(
                "matrix dimensions must be positive, got {}x{}",
                dim_x, dim_y
            )));
        }
        let count = dim_x
            .checked_mul(dim_y)
            .filter(|&c| c <= MAX_PIXEL_COUNT)
            .ok_or_else(|| {
                MapError::BadShape(format!(
                    "matrix {}x{} exceeds {} pixels",
                    dim_x, dim_y, MAX_PIXEL_COUNT
                ))
            })?;
        let channels = (0..num_channels)
            .map(|_| ChannelData::zeros(element, count as usize))
            .collect();
        Matrix::new(dim_x, dim_y, channels)
    }

    /// Convenience constructor for a single-channel `i32` label matrix.
    pub fn from_i32(dim_x: i64, dim_y: i64, data: Vec<i32>) -> Result<Self> {
        Matrix::new(dim_x, dim_y, vec![ChannelData::from_i32(data)])
    }

    pub fn dim_x(&self) -> i64 {
        self.dim_x
    }

    pub fn dim_y(&self) -> i64 {
        self.dim_y
    }

    pub fn dimensions(&self) -> (i64, i64) {
        (self.dim_x, self.dim_y)
    }

    pub fn pixel_count(&self) -> i64 {
        self.dim_x * self.dim_y
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[ChannelData] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Result<&ChannelData> {
        self.channels.get(index).ok_or_else(|| {
            MapError::BadInput(format!(
                "channel {} out of range, matrix has {}",
                index,
                self.channels.len()
            ))
        })
    }

    pub fn channel_types(&self) -> Vec<ElementType> {
        self.channels.iter().map(|c| c.element_type()).collect()
    }

    fn offset(&self, x: i64, y: i64) -> Result<usize> {
        if x < 0 || x >= self.dim_x || y < 0 || y >= self.dim_y {
            return Err(MapError::BadInput(format!(
                "pixel ({}, {}) outside {}x{} matrix",
                x, y, self.dim_x, self.dim_y
            )));
        }
        Ok((y * self.dim_x + x) as usize)
    }

    pub fn get_i64(&self, channel: usize, x: i64, y: i64) -> Result<i64> {
        let offset = self.offset(x, y)?;
        Ok(self.channel(channel)?.get_i64(offset))
    }

    pub fn get_f64(&self, channel: usize, x: i64, y: i64) -> Result<f64> {
        let offset = self.offset(x, y)?;
        Ok(self.channel(channel)?.get_f64(offset))
    }

    /// All channels zero at the pixel.
    pub fn is_zero_pixel(&self, x: i64, y: i64) -> Result<bool> {
        let offset = self.offset(x, y)?;
        Ok(self.channels.iter().all(|c| c.is_zero(offset)))
    }

    /// Extracts a `size_x` x `size_y` sub-matrix whose origin is at
    /// `(x0, y0)` in this matrix's coordinates; pixels outside the source
    /// are zero. When the request covers exactly the full extent the result
    /// shares storage with `self`.
    pub fn sub_matrix_zero_extended(
        &self,
        x0: i64,
        y0: i64,
        size_x: i64,
        size_y: i64,
    ) -> Result<Matrix> {
        if x0 == 0 && y0 == 0 && size_x == self.dim_x && size_y == self.dim_y {
            return Ok(self.clone());
        }
        if size_x < 1 || size_y < 1 {
            return Err(MapError::BadShape(format!(
                "sub-matrix sizes must be positive, got {}x{}",
                size_x, size_y
            )));
        }
        let count = size_x
            .checked_mul(size_y)
            .filter(|&c| c <= MAX_PIXEL_COUNT)
            .ok_or_else(|| {
                MapError::BadShape(format!(
                    "sub-matrix {}x{} exceeds {} pixels",
                    size_x, size_y, MAX_PIXEL_COUNT
                ))
            })?;
        // Overlap of the request with the source, in source coordinates.
        let src_x0 = x0.max(0);
        let src_y0 = y0.max(0);
        let src_x1 = (x0 + size_x).min(self.dim_x);
        let src_y1 = (y0 + size_y).min(self.dim_y);

        let mut channels = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let mut out = Samples::zeros(channel.element_type(), count as usize);
            if src_x0 < src_x1 && src_y0 < src_y1 {
                out.copy_rows_from(
                    size_x as usize,
                    (src_x0 - x0) as usize,
                    (src_y0 - y0) as usize,
                    channel.samples(),
                    self.dim_x as usize,
                    src_x0 as usize,
                    src_y0 as usize,
                    (src_x1 - src_x0) as usize,
                    (src_y1 - src_y0) as usize,
                )?;
            }
            channels.push(ChannelData::new(out));
        }
        Matrix::new(size_x, size_y, channels)
    }

    /// New handle with one channel replaced; all other channels stay shared.
    pub fn with_channel(&self, index: usize, data: ChannelData) -> Result<Matrix> {
        if index >= self.channels.len() {
            return Err(MapError::BadInput(format!(
                "channel {} out of range, matrix has {}",
                index,
                self.channels.len()
            )));
        }
        if data.len() as i64 != self.pixel_count() {
            return Err(MapError::BadShape(format!(
                "replacement channel holds {} samples, expected {}",
                data.len(),
                self.pixel_count()
            )));
        }
        let mut channels = self.channels.clone();
        channels[index] = data;
        Matrix::new(self.dim_x, self.dim_y, channels)
    }

    /// The "direct integer array" capability: a single channel backed by a
    /// 32-bit integer array. Gates the fused add-frame fast path.
    pub fn direct_i32(&self) -> Option<&[i32]> {
        if self.channels.len() != 1 {
            return None;
        }
        self.channels[0].as_i32_slice()
    }

    /// Channel 0 must be an 8/16/32-bit integer type to carry labels.
    pub fn ensure_label_channel(&self) -> Result<ElementType> {
        let element = self.channels[0].element_type();
        if !element.is_label_type() {
            return Err(MapError::BadInput(format!(
                "label channel must be an 8/16/32-bit integer type, got {:?}",
                element
            )));
        }
        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_factory() {
        let m = Matrix::zeros(ElementType::U16, 2, 4, 3).unwrap();
        assert_eq!(m.dimensions(), (4, 3));
        assert_eq!(m.num_channels(), 2);
        assert_eq!(m.get_i64(1, 3, 2).unwrap(), 0);
    }

    #[test]
    fn channel_length_checked() {
        let short = ChannelData::from_i32(vec![1, 2, 3]);
        assert!(Matrix::new(2, 2, vec![short]).is_err());
    }

    #[test]
    fn pixel_budget_enforced() {
        assert!(Matrix::zeros(ElementType::U8, 1, 1 << 16, 1 << 16).is_err());
    }

    #[test]
    fn sub_matrix_zero_extension() {
        let m = Matrix::from_i32(2, 2, vec![1, 2, 3, 4]).unwrap();
        let s = m.sub_matrix_zero_extended(-1, 0, 4, 2).unwrap();
        assert_eq!(s.get_i64(0, 0, 0).unwrap(), 0);
        assert_eq!(s.get_i64(0, 1, 0).unwrap(), 1);
        assert_eq!(s.get_i64(0, 2, 0).unwrap(), 2);
        assert_eq!(s.get_i64(0, 3, 0).unwrap(), 0);
        assert_eq!(s.get_i64(0, 1, 1).unwrap(), 3);
    }

    #[test]
    fn full_extent_sub_matrix_shares_storage() {
        let m = Matrix::from_i32(2, 2, vec![1, 2, 3, 4]).unwrap();
        let s = m.sub_matrix_zero_extended(0, 0, 2, 2).unwrap();
        assert_eq!(m, s);
    }

    #[test]
    fn direct_i32_capability() {
        let m = Matrix::from_i32(2, 1, vec![7, 8]).unwrap();
        assert_eq!(m.direct_i32(), Some(&[7, 8][..]));
        let u = Matrix::zeros(ElementType::U32, 1, 2, 1).unwrap();
        assert!(u.direct_i32().is_some());
        let two = Matrix::zeros(ElementType::I32, 2, 2, 1).unwrap();
        assert!(two.direct_i32().is_none());
        let f = Matrix::zeros(ElementType::F32, 1, 2, 1).unwrap();
        assert!(f.direct_i32().is_none());
    }

    #[test]
    fn bit_matrix_round_trip_copy() {
        let mut bits = bitvec![0; 6];
        bits.set(1, true);
        bits.set(4, true);
        let m = Matrix::new(3, 2, vec![ChannelData::new(Samples::Bit(bits))]).unwrap();
        let s = m.sub_matrix_zero_extended(1, 0, 3, 2).unwrap();
        assert_eq!(s.get_i64(0, 0, 0).unwrap(), 1);
        assert_eq!(s.get_i64(0, 2, 0).unwrap(), 0);
        assert_eq!(s.get_i64(0, 0, 1).unwrap(), 1);
    }
}
