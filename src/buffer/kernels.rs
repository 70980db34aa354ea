//! Row kernels shared by every backend.

pub(crate) fn convert_row_to_float(src: &[u8], dst: &mut [f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = f32::from(*s);
    }
}

pub(crate) fn convert_row_to_bytes(src: &[f32], dst: &mut [u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = saturate_u8(*s);
    }
}

pub(crate) fn multiply_row(a: &[f32], b: &[f32], dst: &mut [f32]) {
    for ((d, a), b) in dst.iter_mut().zip(a).zip(b) {
        *d = a * b;
    }
}

pub(crate) fn add_row(dst: &mut [f32], b: &[f32]) {
    for (d, b) in dst.iter_mut().zip(b) {
        *d += b;
    }
}

/// Round half away from zero and clamp to `0..=255`. NaN maps to 0.
pub(crate) fn saturate_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturate_rounds_and_clamps() {
        assert_eq!(saturate_u8(-3.0), 0);
        assert_eq!(saturate_u8(254.5), 255);
        assert_eq!(saturate_u8(300.0), 255);
        assert_eq!(saturate_u8(127.49), 127);
        assert_eq!(saturate_u8(f32::NAN), 0);
    }
}
