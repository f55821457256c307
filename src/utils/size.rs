/// Highest slider position exposed by the UI.
pub const MAX_SLIDER_POSITION: u32 = 500;
/// Slider position used when a request does not carry one.
pub const DEFAULT_SLIDER_POSITION: u32 = 243;

const MAX_SIZE_KB: f64 = 102_400.0;

/// Maps a slider position in `0..=500` to a file-size ceiling in bytes.
///
/// The scale is logarithmic between 1 KB and 100 MB, with the normalized
/// position raised to 1.5 so the lower half of the slider stays fine-grained.
/// Positions above 500 are not clamped; far out-of-range positions saturate at `u64::MAX`.
pub fn log_slider_to_size(position: u32) -> u64 {
    let min_v = 1f64.ln();
    let max_v = MAX_SIZE_KB.ln();
    let normalized = f64::from(position) / f64::from(MAX_SLIDER_POSITION);
    let kilobytes = (min_v + (max_v - min_v) * normalized.powf(1.5)).exp().round();
    (kilobytes as u64).saturating_mul(1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_one_kilobyte() {
        assert_eq!(log_slider_to_size(0), 1024);
    }

    #[test]
    fn max_position_maps_to_upper_bound() {
        assert_eq!(log_slider_to_size(MAX_SLIDER_POSITION), 102_400 * 1024);
    }

    #[test]
    fn monotonic_over_slider_range() {
        let mut previous = 0;
        for position in 0..=MAX_SLIDER_POSITION {
            let size = log_slider_to_size(position);
            assert!(
                size >= previous,
                "size decreased at position {position}: {size} < {previous}"
            );
            assert_eq!(size % 1024, 0);
            previous = size;
        }
    }

    #[test]
    fn lower_half_is_biased_toward_small_sizes() {
        // A linear log scale would put the midpoint at ~320 KB.
        let midpoint = log_slider_to_size(MAX_SLIDER_POSITION / 2);
        assert!(midpoint < 320 * 1024);
        assert!(midpoint > 1024);
    }

    #[test]
    fn default_position_is_about_fifty_kilobytes() {
        let size = log_slider_to_size(DEFAULT_SLIDER_POSITION);
        assert!((40 * 1024..=60 * 1024).contains(&size), "got {size}");
    }

    #[test]
    fn out_of_range_positions_saturate() {
        assert!(log_slider_to_size(1_000) > log_slider_to_size(MAX_SLIDER_POSITION));
        assert_eq!(log_slider_to_size(5_000), u64::MAX);
        assert_eq!(log_slider_to_size(u32::MAX), u64::MAX);
    }
}
