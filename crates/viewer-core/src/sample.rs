//! Sample-size (level-of-detail) selection.
//!
//! The decoder is only ever asked for power-of-two downsample factors.
//! The selector picks the largest factor that still matches or exceeds
//! the on-screen pixel density, which bounds the full-resolution working
//! set to roughly one viewport's worth of pixels.

/// Compute the decode sample size for the given show size.
///
/// `r = max(image_w / show_w, image_h / show_h)` is how much the source
/// exceeds what is displayed; the result is the largest power of two
/// `<= r`, floored at 1. When the show size matches or exceeds the
/// source on the constraining axis the result is 1; upscaling is done
/// by stretching the decoded buffer at draw time, never by the decoder.
pub fn sample_size_for(image_w: u32, image_h: u32, show_w: f32, show_h: f32) -> u32 {
    if show_w <= 0.0 || show_h <= 0.0 {
        return 1;
    }

    let r = (image_w as f32 / show_w).max(image_h as f32 / show_h);
    if r < 2.0 {
        return 1;
    }

    largest_power_of_two_at_most(r as u32)
}

fn largest_power_of_two_at_most(n: u32) -> u32 {
    debug_assert!(n >= 1, "caller filters n == 0");
    1 << (31 - n.leading_zeros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_resolution_when_shown_at_or_above_source_size() {
        assert_eq!(sample_size_for(1000, 1000, 1000.0, 1000.0), 1);
        assert_eq!(sample_size_for(1000, 1000, 2000.0, 2000.0), 1);
    }

    #[test]
    fn power_of_two_floor_of_the_ratio() {
        // 8000 / 2000 = 4 on the constraining axis.
        assert_eq!(sample_size_for(4000, 8000, 1000.0, 2000.0), 4);
        // Ratio 2 after zooming in by 2x.
        assert_eq!(sample_size_for(4000, 8000, 2000.0, 4000.0), 2);
        // Non-power-of-two ratio floors down: 7 -> 4.
        assert_eq!(sample_size_for(7000, 100, 1000.0, 100.0), 4);
    }

    #[test]
    fn monotonically_increases_as_show_size_shrinks() {
        let mut last = 0;
        for show in [4000.0, 2000.0, 1000.0, 500.0, 250.0, 125.0] {
            let s = sample_size_for(4000, 4000, show, show);
            assert!(s >= last, "sample size decreased at show={show}");
            assert!(s.is_power_of_two());
            last = s;
        }
        assert_eq!(last, 32);
    }

    #[test]
    fn degenerate_show_size_defaults_to_one() {
        assert_eq!(sample_size_for(4000, 4000, 0.0, 100.0), 1);
    }
}
