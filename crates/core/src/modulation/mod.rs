//! Stateless numeric helpers shared by every effect.
//!
//! These functions know nothing about scenes or renderables so effect code can
//! lean on them without dragging rendering types into signal math.

/// Reduction applied by [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Avg,
    Max,
    Min,
}

/// Affine remap of `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// The result is undefined when `in_max == in_min`; callers guard that case.
pub fn modulate(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let fraction = (value - in_min) / (in_max - in_min);
    out_min + fraction * (out_max - out_min)
}

/// Splits a frequency frame into lower and upper halves by bin index.
///
/// The split point is `len / 2 - 1`: that exact midpoint index always lands in
/// the upper half, never in both, so summing band aggregates does not double
/// count it.
pub fn split_bands(frame: &[u8]) -> (&[u8], &[u8]) {
    let mid = (frame.len() / 2).saturating_sub(1);
    frame.split_at(mid)
}

/// Reduces a magnitude slice to one scalar.
///
/// An empty slice reduces to `0.0`. That input never occurs on the effect hot
/// path, but a zero keeps displacement math finite instead of feeding NaN into
/// vertex buffers.
pub fn aggregate(values: &[u8], op: AggregateOp) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    match op {
        AggregateOp::Avg => {
            let sum: u32 = values.iter().map(|v| u32::from(*v)).sum();
            sum as f32 / values.len() as f32
        }
        AggregateOp::Max => f32::from(*values.iter().max().expect("non-empty slice")),
        AggregateOp::Min => f32::from(*values.iter().min().expect("non-empty slice")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modulate_hits_anchor_points() {
        assert_eq!(modulate(0.0, 0.0, 1.0, 0.0, 10.0), 0.0);
        assert_eq!(modulate(1.0, 0.0, 1.0, 0.0, 10.0), 10.0);
        assert_eq!(modulate(0.5, 0.0, 1.0, 0.0, 10.0), 5.0);
    }

    #[test]
    fn modulate_supports_inverted_output_ranges() {
        assert_eq!(modulate(0.25, 0.0, 1.0, 10.0, 0.0), 7.5);
    }

    #[test]
    fn split_excludes_midpoint_from_lower_half() {
        for len in [2usize, 16, 64, 128, 256] {
            let frame: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let (lower, upper) = split_bands(&frame);

            let midpoint = len / 2 - 1;
            assert_eq!(lower.len(), midpoint);
            assert!(!lower.contains(&(midpoint as u8)));
            assert_eq!(upper[0], midpoint as u8);
            assert_eq!(lower.len() + upper.len(), len);
        }
    }

    #[test]
    fn split_handles_degenerate_frames() {
        let (lower, upper) = split_bands(&[]);
        assert!(lower.is_empty());
        assert!(upper.is_empty());

        let (lower, upper) = split_bands(&[7]);
        assert!(lower.is_empty());
        assert_eq!(upper, &[7]);
    }

    #[test]
    fn aggregates_reduce_as_expected() {
        let values = [10u8, 20, 60];
        assert_eq!(aggregate(&values, AggregateOp::Avg), 30.0);
        assert_eq!(aggregate(&values, AggregateOp::Max), 60.0);
        assert_eq!(aggregate(&values, AggregateOp::Min), 10.0);
    }

    #[test]
    fn empty_aggregate_is_zero() {
        assert_eq!(aggregate(&[], AggregateOp::Avg), 0.0);
        assert_eq!(aggregate(&[], AggregateOp::Max), 0.0);
    }
}
