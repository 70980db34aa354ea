//! Interleaved pixel buffers and the compute backends that operate on them.
//!
//! The compositor is written once against [`PixelBackend`]; [`CpuBackend`] runs each
//! operation on the calling thread and [`ParallelBackend`] fans rows out over a rayon pool.
//! Both share the per-row kernels in [`kernels`], so their output is bit-identical.

mod backend;
pub(crate) mod kernels;

pub use backend::{BackendKind, CpuBackend, ParallelBackend, PixelBackend, create_backend};

use rayon::prelude::*;

use crate::foundation::{
    error::{FramerError, FramerResult},
    geometry::Rect,
};

/// Row-major interleaved pixels, `channels` values per pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuf<T> {
    width: u32,
    height: u32,
    channels: usize,
    data: Vec<T>,
}

/// 8-bit pixels (BGR frames, single-channel masks).
pub type ByteBuf = PixelBuf<u8>;
/// Floating-point pixels in the `0.0..=255.0` range (or `0.0..=1.0` for masks).
pub type FloatBuf = PixelBuf<f32>;

impl<T: Copy + Default + Send + Sync> PixelBuf<T> {
    /// Zero-initialized buffer.
    pub fn new(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![T::default(); width as usize * height as usize * channels],
        }
    }

    /// Buffer with every pixel set to `pixel` (its length is the channel count).
    pub fn filled(width: u32, height: u32, pixel: &[T]) -> Self {
        Self {
            width,
            height,
            channels: pixel.len(),
            data: pixel.repeat(width as usize * height as usize),
        }
    }

    /// Wrap interleaved `data`; its length must be `width * height * channels`.
    pub fn from_raw(width: u32, height: u32, channels: usize, data: Vec<T>) -> FramerResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(channels))
            .ok_or_else(|| FramerError::validation("pixel buffer size overflow"))?;
        if data.len() != expected {
            return Err(FramerError::validation(format!(
                "pixel data has {} values, expected {width}x{height}x{channels} = {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<T> {
        self.data
    }

    /// Values per row. Never zero, so it is always a valid chunk size.
    pub(crate) fn stride(&self) -> usize {
        (self.width as usize * self.channels).max(1)
    }

    pub fn bounds(&self) -> Rect {
        Rect::canvas(self.width, self.height)
    }

    /// Channels of one pixel, `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[T]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * self.channels;
        self.data.get(start..start + self.channels)
    }

    /// Set every pixel to `pixel`. Fails if its length is not the channel count.
    pub fn fill(&mut self, pixel: &[T]) -> FramerResult<()> {
        if pixel.len() != self.channels {
            return Err(FramerError::validation(format!(
                "fill value has {} channels, buffer has {}",
                pixel.len(),
                self.channels
            )));
        }
        if self.channels == 0 {
            return Ok(());
        }
        for px in self.data.chunks_exact_mut(self.channels) {
            px.copy_from_slice(pixel);
        }
        Ok(())
    }

    pub fn fill_region(&mut self, rect: Rect, pixel: &[T]) -> FramerResult<()> {
        if pixel.len() != self.channels {
            return Err(FramerError::validation(format!(
                "fill value has {} channels, buffer has {}",
                pixel.len(),
                self.channels
            )));
        }
        let mut region = self.region_mut(rect)?;
        for row in region.rows_mut() {
            for px in row.chunks_exact_mut(pixel.len().max(1)) {
                px.copy_from_slice(pixel);
            }
        }
        Ok(())
    }

    /// Read-only view of `rect`. Fails if `rect` is not inside the buffer.
    pub fn region(&self, rect: Rect) -> FramerResult<Region<'_, T>> {
        self.check_rect(rect)?;
        Ok(Region { buf: self, rect })
    }

    pub fn region_mut(&mut self, rect: Rect) -> FramerResult<RegionMut<'_, T>> {
        self.check_rect(rect)?;
        Ok(RegionMut { buf: self, rect })
    }

    pub fn full_region(&self) -> Region<'_, T> {
        Region {
            rect: self.bounds(),
            buf: self,
        }
    }

    pub fn full_region_mut(&mut self) -> RegionMut<'_, T> {
        RegionMut {
            rect: self.bounds(),
            buf: self,
        }
    }

    fn check_rect(&self, rect: Rect) -> FramerResult<()> {
        if !self.bounds().contains(&rect) {
            return Err(FramerError::validation(format!(
                "region {rect:?} exceeds {}x{} buffer",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Read-only view of a rectangle inside a [`PixelBuf`].
#[derive(Clone, Copy, Debug)]
pub struct Region<'a, T> {
    buf: &'a PixelBuf<T>,
    rect: Rect,
}

impl<'a, T: Copy + Default + Send + Sync> Region<'a, T> {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn channels(&self) -> usize {
        self.buf.channels
    }

    fn span(&self) -> (usize, usize) {
        let c = self.buf.channels;
        (self.rect.x as usize * c, self.rect.right() as usize * c)
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [T]> + use<'a, T> {
        let (start, end) = self.span();
        let buf: &'a PixelBuf<T> = self.buf;
        buf.data
            .chunks_exact(buf.stride())
            .skip(self.rect.y as usize)
            .take(self.rect.height as usize)
            .map(move |row| &row[start..end])
    }

    pub(crate) fn par_rows(&self) -> impl IndexedParallelIterator<Item = &'a [T]> + use<'a, T> {
        let (start, end) = self.span();
        let buf: &'a PixelBuf<T> = self.buf;
        buf.data
            .par_chunks_exact(buf.stride())
            .skip(self.rect.y as usize)
            .take(self.rect.height as usize)
            .map(move |row| &row[start..end])
    }
}

/// Mutable view of a rectangle inside a [`PixelBuf`].
#[derive(Debug)]
pub struct RegionMut<'a, T> {
    buf: &'a mut PixelBuf<T>,
    rect: Rect,
}

impl<T: Copy + Default + Send + Sync> RegionMut<'_, T> {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn channels(&self) -> usize {
        self.buf.channels
    }

    fn span(&self) -> (usize, usize) {
        let c = self.buf.channels;
        (self.rect.x as usize * c, self.rect.right() as usize * c)
    }

    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [T]> {
        let (start, end) = self.span();
        let stride = self.buf.stride();
        self.buf
            .data
            .chunks_exact_mut(stride)
            .skip(self.rect.y as usize)
            .take(self.rect.height as usize)
            .map(move |row| &mut row[start..end])
    }

    pub(crate) fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = &mut [T]> {
        let (start, end) = self.span();
        let stride = self.buf.stride();
        self.buf
            .data
            .par_chunks_exact_mut(stride)
            .skip(self.rect.y as usize)
            .take(self.rect.height as usize)
            .map(move |row| &mut row[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_length() {
        assert!(ByteBuf::from_raw(2, 2, 3, vec![0; 12]).is_ok());
        assert!(
            ByteBuf::from_raw(2, 2, 3, vec![0; 11])
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn fill_rejects_a_pixel_with_the_wrong_channel_count() {
        let mut buf = ByteBuf::filled(2, 2, &[1, 2, 3]);
        assert!(buf.fill(&[7]).unwrap_err().is_validation());
        assert_eq!(buf.pixel(1, 1), Some(&[1u8, 2, 3][..]));

        buf.fill(&[4, 5, 6]).unwrap();
        assert_eq!(buf.pixel(0, 0), Some(&[4u8, 5, 6][..]));
        assert_eq!(buf.pixel(1, 1), Some(&[4u8, 5, 6][..]));
    }

    #[test]
    fn fill_region_touches_only_the_rect() {
        let mut buf = ByteBuf::filled(4, 3, &[1]);
        buf.fill_region(Rect::new(1, 1, 2, 1), &[9]).unwrap();
        assert_eq!(buf.as_slice(), &[1, 1, 1, 1, 1, 9, 9, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn region_rows_slice_the_sub_rectangle() {
        let data: Vec<u8> = (0..12).collect();
        let buf = ByteBuf::from_raw(3, 2, 2, data).unwrap();
        let region = buf.region(Rect::new(1, 0, 2, 2)).unwrap();
        let rows: Vec<&[u8]> = region.rows().collect();
        assert_eq!(rows, vec![&[2u8, 3, 4, 5][..], &[8, 9, 10, 11][..]]);
    }

    #[test]
    fn out_of_bounds_region_is_rejected() {
        let mut buf = FloatBuf::new(4, 4, 3);
        assert!(buf.region(Rect::new(3, 3, 2, 1)).is_err());
        assert!(buf.region_mut(Rect::new(0, 0, 4, 5)).is_err());
        assert!(buf.region(Rect::new(0, 0, 4, 4)).is_ok());
    }

    #[test]
    fn pixel_accessor_reads_interleaved_values() {
        let buf = ByteBuf::from_raw(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(buf.pixel(1, 0), Some(&[4u8, 5, 6][..]));
        assert_eq!(buf.pixel(2, 0), None);
    }
}
