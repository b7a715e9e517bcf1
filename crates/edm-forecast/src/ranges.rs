// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use edm_core::EdmError;

/// One or more inclusive row intervals, stored 0-based.
///
/// Ranges arrive 1-based from callers and are normalized here, once, at set
/// time. Each range is treated as an independent contiguous record: embedding
/// and horizon exclusions apply per range, so disjoint segments of
/// concatenated series do not bleed into each other.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RangeSet {
    ranges: Vec<(usize, usize)>,
}

impl RangeSet {
    /// Converts 1-based inclusive pairs to the internal 0-based form.
    pub fn from_one_based(pairs: &[(usize, usize)]) -> Result<Self, EdmError> {
        if pairs.is_empty() {
            return Err(EdmError::invalid_input("range set must be non-empty"));
        }
        let mut ranges = Vec::with_capacity(pairs.len());
        for &(first, last) in pairs {
            if first == 0 || last == 0 {
                return Err(EdmError::invalid_input(
                    "ranges are 1-based; row 0 is not addressable",
                ));
            }
            if first > last {
                return Err(EdmError::invalid_input(format!(
                    "range start must not exceed end; got ({first}, {last})"
                )));
            }
            ranges.push((first - 1, last - 1));
        }
        Ok(Self { ranges })
    }

    /// Internal 0-based inclusive ranges.
    pub fn as_zero_based(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    /// Marks rows usable for computation.
    ///
    /// Within each range, drops the leading `embed_span` rows (their lag
    /// vectors would read before the range) plus `max(-tp, 0)` more, and the
    /// trailing `max(tp, 0)` rows (their shifted target would read past the
    /// range). Everything is clipped to the block.
    pub fn usable_mask(&self, num_rows: usize, embed_span: usize, tp: i64) -> Vec<bool> {
        let lead = embed_span + usize::try_from(-tp).unwrap_or(0);
        let trail = usize::try_from(tp).unwrap_or(0);

        let mut mask = vec![false; num_rows];
        for &(first, last) in &self.ranges {
            let start = first.saturating_add(lead);
            let end = last.saturating_sub(trail).min(num_rows.saturating_sub(1));
            if last < trail {
                continue;
            }
            for flag in mask.iter_mut().take(end + 1).skip(start) {
                *flag = true;
            }
        }
        mask
    }

    /// Marks exactly the rows the caller asked for, clipped to the block.
    /// Used only for reporting which rows were requested.
    pub fn requested_mask(&self, num_rows: usize) -> Vec<bool> {
        let mut mask = vec![false; num_rows];
        for &(first, last) in &self.ranges {
            let end = last.min(num_rows.saturating_sub(1));
            for flag in mask.iter_mut().take(end + 1).skip(first) {
                *flag = true;
            }
        }
        mask
    }
}

/// Row indices flagged true, ascending.
pub fn rows_where(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(idx, &flag)| flag.then_some(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{rows_where, RangeSet};

    #[test]
    fn one_based_ranges_convert_to_zero_based() {
        let set = RangeSet::from_one_based(&[(1, 10)]).expect("range should build");
        assert_eq!(set.as_zero_based(), &[(0, 9)]);
    }

    #[test]
    fn rejects_zero_rows_and_inverted_ranges() {
        assert!(RangeSet::from_one_based(&[]).is_err());
        assert!(RangeSet::from_one_based(&[(0, 5)]).is_err());
        assert!(RangeSet::from_one_based(&[(5, 2)]).is_err());
    }

    #[test]
    fn usable_mask_drops_embedding_span_rows() {
        // E=3, tau=2 -> span 4: rows 0..=3 of the range are unusable.
        let set = RangeSet::from_one_based(&[(1, 10)]).expect("range should build");
        let mask = set.usable_mask(10, 4, 0);
        assert_eq!(rows_where(&mask), vec![4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn usable_mask_drops_shifted_target_rows() {
        let set = RangeSet::from_one_based(&[(1, 10)]).expect("range should build");

        let forward = set.usable_mask(10, 0, 2);
        assert_eq!(rows_where(&forward), vec![0, 1, 2, 3, 4, 5, 6, 7]);

        let backward = set.usable_mask(10, 0, -2);
        assert_eq!(rows_where(&backward), vec![2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn usable_mask_applies_per_range() {
        let set = RangeSet::from_one_based(&[(1, 5), (6, 10)]).expect("range should build");
        let mask = set.usable_mask(10, 1, 1);
        // Each segment loses its first (span) and last (tp) row.
        assert_eq!(rows_where(&mask), vec![1, 2, 3, 6, 7, 8]);
    }

    #[test]
    fn masks_clip_to_the_block() {
        let set = RangeSet::from_one_based(&[(8, 20)]).expect("range should build");
        let usable = set.usable_mask(10, 0, 0);
        assert_eq!(rows_where(&usable), vec![7, 8, 9]);
        let requested = set.requested_mask(10);
        assert_eq!(rows_where(&requested), vec![7, 8, 9]);
    }

    #[test]
    fn requested_mask_skips_horizon_exclusion() {
        let set = RangeSet::from_one_based(&[(1, 10)]).expect("range should build");
        let requested = set.requested_mask(10);
        assert_eq!(rows_where(&requested).len(), 10);
    }

    #[test]
    fn usable_mask_handles_range_shorter_than_exclusions() {
        let set = RangeSet::from_one_based(&[(1, 2)]).expect("range should build");
        let mask = set.usable_mask(10, 4, 0);
        assert!(rows_where(&mask).is_empty());
    }
}
