//! Timestamp rebasing from source time to output time

use crate::domain::errors::MappingError;
use crate::domain::model::Sample;

/// Output timeline state for one cut or merge.
///
/// Created fresh per operation and owned by the orchestrator. Each finished
/// segment advances `output_base_us` past everything already written.
#[derive(Debug, Clone)]
pub struct TimeMappingContext {
    output_base_us: i64,
    /// Last ordering timestamp written per output track
    last_written_us: Vec<Option<i64>>,
    /// Largest `(source time - anchor)` seen in the current segment
    segment_span_us: Option<i64>,
    segments_finished: usize,
}

impl TimeMappingContext {
    pub fn new(output_tracks: usize) -> Self {
        Self {
            output_base_us: 0,
            last_written_us: vec![None; output_tracks],
            segment_span_us: None,
            segments_finished: 0,
        }
    }

    pub fn output_base_us(&self) -> i64 {
        self.output_base_us
    }

    pub fn segments_finished(&self) -> usize {
        self.segments_finished
    }

    /// Close the current segment; the next one starts one sample after its last timestamp.
    ///
    /// A segment that wrote nothing leaves the base untouched.
    pub fn finish_segment(&mut self, one_sample_duration_us: i64) {
        if let Some(span) = self.segment_span_us.take() {
            self.output_base_us += span + one_sample_duration_us;
        }
        self.segments_finished += 1;
    }
}

/// Rebases the samples of one segment against its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTimeMapper {
    anchor_us: i64,
}

impl SampleTimeMapper {
    /// `anchor_us` is the source time that lands on the context's output base
    pub fn new(anchor_us: i64) -> Self {
        Self { anchor_us }
    }

    pub fn anchor_us(&self) -> i64 {
        self.anchor_us
    }

    /// `output_base + (sample_time - anchor)`
    pub fn map_timestamp(&self, sample_time_us: i64, context: &TimeMappingContext) -> i64 {
        context.output_base_us + (sample_time_us - self.anchor_us)
    }

    /// Rebase `sample` for output track `track`, enforcing non-decreasing order.
    ///
    /// Ordering is checked on the decode timestamp when the sample carries
    /// one and on the presentation timestamp otherwise, since reordered
    /// streams legitimately present out of order.
    pub fn map_sample(
        &self,
        track: usize,
        sample: &Sample,
        context: &mut TimeMappingContext,
    ) -> Result<Sample, MappingError> {
        let presentation_time_us = self.map_timestamp(sample.presentation_time_us, context);
        let decode_time_us = sample
            .decode_time_us
            .map(|dts| self.map_timestamp(dts, context));
        let ordering_us = decode_time_us.unwrap_or(presentation_time_us);

        if track >= context.last_written_us.len() {
            context.last_written_us.resize(track + 1, None);
        }
        if let Some(previous_us) = context.last_written_us[track] {
            if ordering_us < previous_us {
                return Err(MappingError::NonMonotonicSource {
                    track,
                    previous_us,
                    current_us: ordering_us,
                });
            }
        }
        context.last_written_us[track] = Some(ordering_us);

        let span = sample.presentation_time_us - self.anchor_us;
        context.segment_span_us = Some(context.segment_span_us.map_or(span, |s| s.max(span)));

        Ok(Sample {
            presentation_time_us,
            decode_time_us,
            ..sample.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pts_us: i64) -> Sample {
        Sample::new(0, pts_us, true, vec![0])
    }

    #[test]
    fn test_cut_rebases_to_anchor() {
        let mut ctx = TimeMappingContext::new(1);
        let mapper = SampleTimeMapper::new(2_000_000);
        let mapped = mapper.map_sample(0, &sample(2_040_000), &mut ctx).unwrap();
        assert_eq!(mapped.presentation_time_us, 40_000);
        assert_eq!(mapper.map_timestamp(2_000_000, &ctx), 0);
    }

    #[test]
    fn test_base_advances_by_span_plus_gap() {
        let mut ctx = TimeMappingContext::new(1);
        let first = SampleTimeMapper::new(0);
        for pts in [0, 40_000, 80_000] {
            first.map_sample(0, &sample(pts), &mut ctx).unwrap();
        }
        ctx.finish_segment(40_000);
        assert_eq!(ctx.output_base_us(), 120_000);

        let second = SampleTimeMapper::new(5_000_000);
        let mapped = second.map_sample(0, &sample(5_000_000), &mut ctx).unwrap();
        assert_eq!(mapped.presentation_time_us, 120_000);
    }

    #[test]
    fn test_empty_segment_keeps_base() {
        let mut ctx = TimeMappingContext::new(1);
        ctx.finish_segment(40_000);
        assert_eq!(ctx.output_base_us(), 0);
        assert_eq!(ctx.segments_finished(), 1);
    }

    #[test]
    fn test_decrease_is_rejected() {
        let mut ctx = TimeMappingContext::new(2);
        let mapper = SampleTimeMapper::new(0);
        mapper.map_sample(0, &sample(80_000), &mut ctx).unwrap();
        // Other tracks are tracked independently
        mapper.map_sample(1, &sample(10_000), &mut ctx).unwrap();
        let err = mapper.map_sample(0, &sample(40_000), &mut ctx).unwrap_err();
        assert_eq!(
            err,
            MappingError::NonMonotonicSource {
                track: 0,
                previous_us: 80_000,
                current_us: 40_000,
            }
        );
    }

    #[test]
    fn test_equal_timestamps_allowed() {
        let mut ctx = TimeMappingContext::new(1);
        let mapper = SampleTimeMapper::new(0);
        mapper.map_sample(0, &sample(40_000), &mut ctx).unwrap();
        assert!(mapper.map_sample(0, &sample(40_000), &mut ctx).is_ok());
    }

    #[test]
    fn test_reordered_presentation_checked_on_decode_time() {
        let mut ctx = TimeMappingContext::new(1);
        let mapper = SampleTimeMapper::new(0);
        // I P B in decode order: presentation goes 0, 80, 40
        for (pts, dts) in [(0, -40_000), (80_000, 0), (40_000, 40_000)] {
            let mut s = sample(pts);
            s.decode_time_us = Some(dts);
            mapper.map_sample(0, &s, &mut ctx).unwrap();
        }
        ctx.finish_segment(40_000);
        // Span follows the largest presentation time, not the last one
        assert_eq!(ctx.output_base_us(), 120_000);
    }
}
