/// SMPTE 12-1 timecode broken into its four fields, with the drop-frame
/// convention flag that the Picture Timing SEI's `cnt_dropped_flag` mirrors
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimecodeSample {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub drop_frame: bool,
}

impl TimecodeSample {
    pub fn midnight() -> Self {
        TimecodeSample {
            hours: 0,
            minutes: 0,
            seconds: 0,
            frames: 0,
            drop_frame: false,
        }
    }

    /// Derive a timecode from a running frame count at a given nominal frame
    /// rate, applying the SMPTE drop-frame correction for the NTSC rates
    /// (29.97/59.94) where the integer frame rate doesn't evenly divide an
    /// hour of wall-clock time.
    pub fn from_frame_count(frame_count: u64, fps_num: u32, fps_den: u32) -> Self {
        let nominal_fps = div_round(fps_num, fps_den);
        let drop_frame = is_drop_frame_rate(fps_num, fps_den);

        if !drop_frame {
            return TimecodeSample {
                drop_frame,
                ..from_non_drop(frame_count, nominal_fps)
            };
        }

        // Drop-frame: two frame numbers are skipped at the start of every
        // minute except minutes divisible by ten (SMPTE 12-1 §5.3.1).
        let drop_per_minute = if nominal_fps == 60 { 4 } else { 2 };
        let frames_per_10min = (nominal_fps as u64 * 600) - (drop_per_minute as u64 * 9);
        let frames_per_min = (nominal_fps as u64 * 60) - drop_per_minute as u64;

        let d = frame_count / frames_per_10min;
        let m = frame_count % frames_per_10min;

        let total_minutes = if m < nominal_fps as u64 {
            0
        } else {
            1 + (m - nominal_fps as u64) / frames_per_min
        };

        let adjusted = frame_count + drop_per_minute as u64 * (9 * d + total_minutes);

        TimecodeSample {
            drop_frame,
            ..from_non_drop(adjusted, nominal_fps)
        }
    }

    /// Derive a timecode directly from a presentation timestamp in
    /// nanoseconds, at a given nominal frame rate.
    pub fn from_pts_ns(pts_ns: i64, fps_num: u32, fps_den: u32) -> Self {
        if fps_num == 0 || fps_den == 0 {
            return Self::midnight();
        }
        let frame_count =
            ((pts_ns.max(0) as u128 * fps_num as u128) / (fps_den as u128 * 1_000_000_000)) as u64;
        Self::from_frame_count(frame_count, fps_num, fps_den)
    }
}

fn div_round(num: u32, den: u32) -> u32 {
    if den == 0 {
        0
    } else {
        (num + den / 2) / den
    }
}

fn is_drop_frame_rate(fps_num: u32, fps_den: u32) -> bool {
    matches!((fps_num, fps_den), (30000, 1001) | (60000, 1001))
}

fn from_non_drop(frame_count: u64, nominal_fps: u32) -> TimecodeSample {
    if nominal_fps == 0 {
        return TimecodeSample::midnight();
    }
    let fps = nominal_fps as u64;
    let frames = (frame_count % fps) as u8;
    let total_seconds = frame_count / fps;
    let seconds = (total_seconds % 60) as u8;
    let total_minutes = total_seconds / 60;
    let minutes = (total_minutes % 60) as u8;
    let hours = ((total_minutes / 60) % 24) as u8;
    TimecodeSample {
        hours,
        minutes,
        seconds,
        frames,
        drop_frame: false,
    }
}

/// Tracks inter-frame PTS deltas to estimate the stream's frame rate when no
/// caps-level frame rate is known. Clamped to a plausible camera/broadcast
/// range; falls back to 25fps when the stream hasn't produced enough samples
/// to estimate yet or the estimate is degenerate.
pub struct PtsFpsEstimator {
    last_pts_ns: Option<i64>,
    est_fps: f64,
}

const MIN_PLAUSIBLE_FPS: f64 = 12.0;
const MAX_PLAUSIBLE_FPS: f64 = 120.0;
const DEFAULT_FPS: f64 = 25.0;

impl PtsFpsEstimator {
    pub fn new() -> Self {
        PtsFpsEstimator {
            last_pts_ns: None,
            est_fps: DEFAULT_FPS,
        }
    }

    /// Feed the next access unit's PTS and return the current frame rate
    /// estimate as an (num, den) pair suitable for `timing_info`.
    pub fn observe(&mut self, pts_ns: i64) -> (u32, u32) {
        if let Some(last) = self.last_pts_ns {
            let delta_ns = pts_ns - last;
            if delta_ns > 0 {
                let instantaneous = 1_000_000_000.0 / delta_ns as f64;
                if instantaneous.is_finite() {
                    self.est_fps = instantaneous.clamp(MIN_PLAUSIBLE_FPS, MAX_PLAUSIBLE_FPS);
                }
            }
        }
        self.last_pts_ns = Some(pts_ns);
        (self.est_fps.round() as u32, 1)
    }
}

impl Default for PtsFpsEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_drop_frame_wraps_at_rate() {
        let tc = TimecodeSample::from_frame_count(25, 25, 1);
        assert_eq!(tc.seconds, 1);
        assert_eq!(tc.frames, 0);
        assert!(!tc.drop_frame);
    }

    #[test]
    fn non_drop_frame_rolls_minutes_and_hours() {
        let tc = TimecodeSample::from_frame_count(25 * 3661, 25, 1);
        assert_eq!(tc.hours, 1);
        assert_eq!(tc.minutes, 1);
        assert_eq!(tc.seconds, 1);
    }

    #[test]
    fn drop_frame_flag_set_for_ntsc_rates() {
        let tc = TimecodeSample::from_frame_count(0, 30000, 1001);
        assert!(tc.drop_frame);
        let tc = TimecodeSample::from_frame_count(0, 25, 1);
        assert!(!tc.drop_frame);
    }

    #[test]
    fn drop_frame_skips_first_two_counts_each_non_tenth_minute() {
        // At 29.97fps drop-frame, frame 1798 is the last frame of minute 0
        // (00:00:59;29), and the next frame should read 00:01:00;02 (frames
        // 0 and 1 of minute 1 are dropped).
        let last_of_minute_zero = TimecodeSample::from_frame_count(1799, 30000, 1001);
        assert_eq!(last_of_minute_zero.minutes, 0);
        assert_eq!(last_of_minute_zero.seconds, 59);
        assert_eq!(last_of_minute_zero.frames, 29);

        let first_of_minute_one = TimecodeSample::from_frame_count(1800, 30000, 1001);
        assert_eq!(first_of_minute_one.minutes, 1);
        assert_eq!(first_of_minute_one.seconds, 0);
        assert_eq!(first_of_minute_one.frames, 2);
    }

    #[test]
    fn fps_estimator_clamps_and_defaults() {
        let mut est = PtsFpsEstimator::new();
        let (num, den) = est.observe(0);
        assert_eq!((num, den), (25, 1));

        // 1ms between frames implies a 1000fps source; clamp to 120.
        let (num, _) = est.observe(1_000_000);
        assert_eq!(num, 120);
    }

    #[test]
    fn from_pts_ns_zero_is_midnight() {
        let tc = TimecodeSample::from_pts_ns(0, 25, 1);
        assert_eq!(tc, TimecodeSample::midnight());
    }
}
