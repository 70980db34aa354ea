//! Backends implementing the buffer operations.
//!
//! [`CpuBackend`] and [`ParallelBackend`] share their per-row kernels and their resize,
//! so they produce identical output and differ only in how rows are scheduled.

use image::{ImageBuffer, Luma, Pixel, Rgb, imageops};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    buffer::{ByteBuf, FloatBuf, Region, RegionMut, kernels},
    foundation::error::{FramerError, FramerResult},
};

/// The buffer operations the compositing pipeline is built from.
///
/// Every call is synchronous from the caller's point of view: when it returns, the
/// destination holds the result.
pub trait PixelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Triangle-filtered resample of `src` into `dst` (dimensions taken from `dst`).
    fn resize(&self, src: &ByteBuf, dst: &mut ByteBuf) -> FramerResult<()>;

    /// Widen `src` to floating point, writing it into `dst`.
    fn convert_to_float(&self, src: &ByteBuf, dst: RegionMut<'_, f32>) -> FramerResult<()>;

    /// Round and saturate `src` into `dst`.
    fn convert_to_bytes(&self, src: &FloatBuf, dst: &mut ByteBuf) -> FramerResult<()>;

    /// `dst = a * b`, elementwise.
    fn multiply(
        &self,
        a: Region<'_, f32>,
        b: &FloatBuf,
        dst: RegionMut<'_, f32>,
    ) -> FramerResult<()>;

    /// `dst += b`, elementwise.
    fn add_assign(&self, dst: RegionMut<'_, f32>, b: &FloatBuf) -> FramerResult<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Cpu,
    Parallel,
}

pub fn create_backend(kind: BackendKind) -> Box<dyn PixelBackend> {
    match kind {
        BackendKind::Cpu => Box::new(CpuBackend),
        BackendKind::Parallel => Box::new(ParallelBackend),
    }
}

/// Runs every operation on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

/// Splits every operation into rows processed on the rayon thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelBackend;

impl PixelBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn resize(&self, src: &ByteBuf, dst: &mut ByteBuf) -> FramerResult<()> {
        resize_with_imageops(src, dst)
    }

    fn convert_to_float(&self, src: &ByteBuf, mut dst: RegionMut<'_, f32>) -> FramerResult<()> {
        check_same_shape(src.dims(), src.channels(), &dst.rect(), dst.channels())?;
        for (d, s) in dst.rows_mut().zip(src.full_region().rows()) {
            kernels::convert_row_to_float(s, d);
        }
        Ok(())
    }

    fn convert_to_bytes(&self, src: &FloatBuf, dst: &mut ByteBuf) -> FramerResult<()> {
        check_same_shape(src.dims(), src.channels(), &dst.bounds(), dst.channels())?;
        kernels::convert_row_to_bytes(src.as_slice(), dst.as_mut_slice());
        Ok(())
    }

    fn multiply(
        &self,
        a: Region<'_, f32>,
        b: &FloatBuf,
        mut dst: RegionMut<'_, f32>,
    ) -> FramerResult<()> {
        check_same_shape(b.dims(), b.channels(), &a.rect(), a.channels())?;
        check_same_shape(b.dims(), b.channels(), &dst.rect(), dst.channels())?;
        for ((d, a), b) in dst.rows_mut().zip(a.rows()).zip(b.full_region().rows()) {
            kernels::multiply_row(a, b, d);
        }
        Ok(())
    }

    fn add_assign(&self, mut dst: RegionMut<'_, f32>, b: &FloatBuf) -> FramerResult<()> {
        check_same_shape(b.dims(), b.channels(), &dst.rect(), dst.channels())?;
        for (d, b) in dst.rows_mut().zip(b.full_region().rows()) {
            kernels::add_row(d, b);
        }
        Ok(())
    }
}

impl PixelBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    // Same path as `CpuBackend` so both backends stay bit-identical.
    fn resize(&self, src: &ByteBuf, dst: &mut ByteBuf) -> FramerResult<()> {
        resize_with_imageops(src, dst)
    }

    fn convert_to_float(&self, src: &ByteBuf, mut dst: RegionMut<'_, f32>) -> FramerResult<()> {
        check_same_shape(src.dims(), src.channels(), &dst.rect(), dst.channels())?;
        dst.par_rows_mut()
            .zip(src.full_region().par_rows())
            .for_each(|(d, s)| kernels::convert_row_to_float(s, d));
        Ok(())
    }

    fn convert_to_bytes(&self, src: &FloatBuf, dst: &mut ByteBuf) -> FramerResult<()> {
        check_same_shape(src.dims(), src.channels(), &dst.bounds(), dst.channels())?;
        let stride = dst.stride();
        dst.as_mut_slice()
            .par_chunks_exact_mut(stride)
            .zip(src.as_slice().par_chunks_exact(stride))
            .for_each(|(d, s)| kernels::convert_row_to_bytes(s, d));
        Ok(())
    }

    fn multiply(
        &self,
        a: Region<'_, f32>,
        b: &FloatBuf,
        mut dst: RegionMut<'_, f32>,
    ) -> FramerResult<()> {
        check_same_shape(b.dims(), b.channels(), &a.rect(), a.channels())?;
        check_same_shape(b.dims(), b.channels(), &dst.rect(), dst.channels())?;
        dst.par_rows_mut()
            .zip(a.par_rows())
            .zip(b.full_region().par_rows())
            .for_each(|((d, a), b)| kernels::multiply_row(a, b, d));
        Ok(())
    }

    fn add_assign(&self, mut dst: RegionMut<'_, f32>, b: &FloatBuf) -> FramerResult<()> {
        check_same_shape(b.dims(), b.channels(), &dst.rect(), dst.channels())?;
        dst.par_rows_mut()
            .zip(b.full_region().par_rows())
            .for_each(|(d, b)| kernels::add_row(d, b));
        Ok(())
    }
}

/// Resample through `image::imageops` with the triangle filter. Only gray and BGR
/// buffers occur in the pipeline; the filter is channel-order agnostic, so BGR data
/// travels as `Rgb`.
fn resize_with_imageops(src: &ByteBuf, dst: &mut ByteBuf) -> FramerResult<()> {
    if src.is_empty() || dst.is_empty() {
        return Err(FramerError::validation(format!(
            "cannot resize {}x{} into {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    if src.channels() != dst.channels() {
        return Err(FramerError::validation(format!(
            "resize channel mismatch: {} vs {}",
            src.channels(),
            dst.channels()
        )));
    }
    match src.channels() {
        1 => resize_pixels::<Luma<u8>>(src, dst),
        3 => resize_pixels::<Rgb<u8>>(src, dst),
        n => Err(FramerError::validation(format!(
            "resize supports 1 or 3 channels, got {n}"
        ))),
    }
}

fn resize_pixels<P>(src: &ByteBuf, dst: &mut ByteBuf) -> FramerResult<()>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let view = ImageBuffer::<P, &[u8]>::from_raw(src.width(), src.height(), src.as_slice())
        .ok_or_else(|| {
            FramerError::validation("resize source does not match its dimensions")
        })?;
    let out = imageops::resize(&view, dst.width(), dst.height(), imageops::FilterType::Triangle);
    dst.as_mut_slice().copy_from_slice(out.as_raw());
    Ok(())
}

fn check_same_shape(
    dims: (u32, u32),
    channels: usize,
    rect: &crate::foundation::geometry::Rect,
    rect_channels: usize,
) -> FramerResult<()> {
    if dims != (rect.width, rect.height) || channels != rect_channels {
        return Err(FramerError::validation(format!(
            "shape mismatch: {}x{}x{channels} vs {}x{}x{rect_channels}",
            dims.0, dims.1, rect.width, rect.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::geometry::Rect;

    fn gradient(width: u32, height: u32) -> ByteBuf {
        let data = (0..width * height * 3).map(|i| (i * 7 % 256) as u8).collect();
        ByteBuf::from_raw(width, height, 3, data).unwrap()
    }

    #[test]
    fn resize_to_same_size_is_a_copy() {
        let src = gradient(5, 4);
        let mut dst = ByteBuf::new(5, 4, 3);
        CpuBackend.resize(&src, &mut dst).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn resize_stretches_to_exact_destination_size() {
        let src = ByteBuf::filled(2, 2, &[255, 255, 255]);
        let mut dst = ByteBuf::new(7, 3, 3);
        CpuBackend.resize(&src, &mut dst).unwrap();
        assert_eq!(dst.dims(), (7, 3));
        assert!(dst.as_slice().iter().all(|&v| v == 255));
    }

    #[test]
    fn resize_downscale_averages_neighbours() {
        let src = ByteBuf::from_raw(2, 1, 1, vec![0, 200]).unwrap();
        let mut dst = ByteBuf::new(1, 1, 1);
        CpuBackend.resize(&src, &mut dst).unwrap();
        assert_eq!(dst.as_slice(), &[100]);
    }

    #[test]
    fn resize_rejects_unsupported_channel_counts() {
        let src = ByteBuf::new(2, 2, 4);
        let mut dst = ByteBuf::new(3, 3, 4);
        assert!(CpuBackend.resize(&src, &mut dst).unwrap_err().is_validation());
    }

    #[test]
    fn resize_rejects_channel_mismatch() {
        let src = ByteBuf::new(2, 2, 1);
        let mut dst = ByteBuf::new(2, 2, 3);
        assert!(CpuBackend.resize(&src, &mut dst).unwrap_err().is_validation());
    }

    #[test]
    fn parallel_matches_cpu_bit_for_bit() {
        let src = gradient(13, 9);
        let mut a = ByteBuf::new(21, 5, 3);
        let mut b = ByteBuf::new(21, 5, 3);
        CpuBackend.resize(&src, &mut a).unwrap();
        ParallelBackend.resize(&src, &mut b).unwrap();
        assert_eq!(a, b);

        let rect = Rect::new(2, 1, 21, 5);
        let mut fa = FloatBuf::filled(30, 10, &[1.0, 2.0, 3.0]);
        let mut fb = fa.clone();
        CpuBackend
            .convert_to_float(&a, fa.region_mut(rect).unwrap())
            .unwrap();
        ParallelBackend
            .convert_to_float(&b, fb.region_mut(rect).unwrap())
            .unwrap();
        assert_eq!(fa, fb);

        let weights = FloatBuf::filled(21, 5, &[0.5, 0.25, 1.0]);
        let mut oa = FloatBuf::new(30, 10, 3);
        let mut ob = FloatBuf::new(30, 10, 3);
        CpuBackend
            .multiply(fa.region(rect).unwrap(), &weights, oa.region_mut(rect).unwrap())
            .unwrap();
        ParallelBackend
            .multiply(fb.region(rect).unwrap(), &weights, ob.region_mut(rect).unwrap())
            .unwrap();
        CpuBackend
            .add_assign(oa.region_mut(rect).unwrap(), &weights)
            .unwrap();
        ParallelBackend
            .add_assign(ob.region_mut(rect).unwrap(), &weights)
            .unwrap();
        assert_eq!(oa, ob);

        let mut ba = ByteBuf::new(30, 10, 3);
        let mut bb = ByteBuf::new(30, 10, 3);
        CpuBackend.convert_to_bytes(&oa, &mut ba).unwrap();
        ParallelBackend.convert_to_bytes(&ob, &mut bb).unwrap();
        assert_eq!(ba, bb);
    }

    #[test]
    fn multiply_then_add_only_touches_the_region() {
        let acc = FloatBuf::filled(4, 4, &[10.0]);
        let rect = Rect::new(1, 1, 2, 2);
        let w = FloatBuf::filled(2, 2, &[0.5]);
        let mut out = FloatBuf::filled(4, 4, &[7.0]);
        CpuBackend
            .multiply(acc.region(rect).unwrap(), &w, out.region_mut(rect).unwrap())
            .unwrap();
        CpuBackend.add_assign(out.region_mut(rect).unwrap(), &w).unwrap();
        assert_eq!(out.pixel(0, 0), Some(&[7.0f32][..]));
        assert_eq!(out.pixel(1, 1), Some(&[5.5f32][..]));
        assert_eq!(out.pixel(2, 2), Some(&[5.5f32][..]));
        assert_eq!(out.pixel(3, 3), Some(&[7.0f32][..]));
    }

    #[test]
    fn create_backend_reports_its_kind() {
        assert_eq!(create_backend(BackendKind::Cpu).name(), "cpu");
        assert_eq!(create_backend(BackendKind::Parallel).name(), "parallel");
    }
}
