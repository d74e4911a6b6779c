//! Crossfade mixing for track boundaries
//!
//! The pipeline blends the tail of the outgoing track with the head of the
//! incoming one under a smoothstep weight, one frame pair at a time.

/// Smoothstep interpolation for `t` in [0,1], clamped outside.
///
/// Formula: `t²(3 − 2t)`. Monotonic non-decreasing and symmetric about
/// (0.5, 0.5), so the outgoing and incoming weights always sum to one.
pub fn smoothstep(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }
    t * t * (3.0 - 2.0 * t)
}

/// Blend an outgoing frame with an incoming frame at the given progress
/// (0.0 = all outgoing, 1.0 = all incoming). Both slices must have the same
/// length. Mixed samples are clamped to the s16 range.
pub fn crossfade_frames(outgoing: &[i16], incoming: &[i16], progress: f64) -> Vec<i16> {
    debug_assert_eq!(outgoing.len(), incoming.len());

    let gain = smoothstep(progress);
    outgoing
        .iter()
        .zip(incoming.iter())
        .map(|(&out, &inc)| {
            let mixed = f64::from(out) * (1.0 - gain) + f64::from(inc) * gain;
            mixed.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_boundaries() {
        assert_eq!(smoothstep(-0.5), 0.0);
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(1.5), 1.0);
    }

    #[test]
    fn smoothstep_monotonic() {
        let mut prev = 0.0;
        for i in 1..=100 {
            let x = f64::from(i) / 100.0;
            let val = smoothstep(x);
            assert!(
                val >= prev,
                "smoothstep not monotonic: f({x}) = {val} < {prev}"
            );
            prev = val;
        }
    }

    #[test]
    fn smoothstep_symmetric_about_half() {
        // f(0.5 + d) + f(0.5 - d) = 1
        for d in [0.1, 0.2, 0.3, 0.4, 0.5] {
            let sum = smoothstep(0.5 + d) + smoothstep(0.5 - d);
            assert!((sum - 1.0).abs() < 1e-10, "symmetry broken at d={d}: {sum}");
        }
    }

    #[test]
    fn crossfade_all_outgoing_at_zero() {
        let out = [1000, -1000, 500, -500];
        let inc = [2000, -2000, 1500, -1500];
        assert_eq!(crossfade_frames(&out, &inc, 0.0), out);
    }

    #[test]
    fn crossfade_all_incoming_at_one() {
        let out = [1000, -1000, 500, -500];
        let inc = [2000, -2000, 1500, -1500];
        assert_eq!(crossfade_frames(&out, &inc, 1.0), inc);
    }

    #[test]
    fn crossfade_midpoint_averages() {
        let out = [1000, -1000];
        let inc = [3000, -3000];
        // smoothstep(0.5) = 0.5, so each sample is the plain average
        assert_eq!(crossfade_frames(&out, &inc, 0.5), [2000, -2000]);
    }

    #[test]
    fn crossfade_clamps_to_s16_range() {
        let out = [i16::MAX, i16::MIN];
        let inc = [i16::MAX, i16::MIN];
        let mixed = crossfade_frames(&out, &inc, 0.5);
        assert_eq!(mixed, [i16::MAX, i16::MIN]);

        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for &s in &crossfade_frames(&out, &inc, p) {
                assert!((i16::MIN..=i16::MAX).contains(&s));
            }
        }
    }
}
