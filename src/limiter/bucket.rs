use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

/// Admission allowance for one bucket: `max_rate` admissions per `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_rate: NonZeroU32,
    pub period: Duration,
}

impl Quota {
    pub fn new(max_rate: NonZeroU32, period: Duration) -> Self {
        Self { max_rate, period }
    }

    /// Builds a quota from raw values; `None` when `max_rate` is zero
    pub fn per_period(max_rate: u32, period: Duration) -> Option<Self> {
        NonZeroU32::new(max_rate).map(|rate| Self::new(rate, period))
    }

    pub fn per_second(max_rate: NonZeroU32) -> Self {
        Self::new(max_rate, Duration::from_secs(1))
    }
}

/// Tracks admissions for a single rate limiter key
///
/// The bucket enforces a sliding window: at any instant, no more than
/// `max_rate` admissions are recorded within the preceding `period`.
#[derive(Debug, Clone)]
pub struct AdmissionBucket {
    quota: Quota,

    /// Admission instants still inside the window, oldest first
    window: VecDeque<Instant>,

    /// Total admissions granted over the bucket's lifetime
    pub admitted: u64,
}

impl AdmissionBucket {
    pub fn new(quota: Quota) -> Self {
        Self {
            quota,
            window: VecDeque::with_capacity(quota.max_rate.get() as usize),
            admitted: 0,
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Calculates how long a caller must wait before it can be admitted
    ///
    /// Returns `None` if an admission is available at `now`.
    pub fn time_until_admit(&self, now: Instant) -> Option<Duration> {
        let live: Vec<&Instant> = self
            .window
            .iter()
            .filter(|admitted_at| !self.expired(**admitted_at, now))
            .collect();

        if live.len() < self.quota.max_rate.get() as usize {
            return None;
        }

        // The oldest live admission is the next one to leave the window
        let oldest = *live[live.len() - self.quota.max_rate.get() as usize];
        Some((oldest + self.quota.period).saturating_duration_since(now))
    }

    /// Admits a caller at `now` if the window has room
    ///
    /// On refusal, returns the time until the next slot opens.
    pub fn try_admit(&mut self, now: Instant) -> Result<(), Duration> {
        self.prune(now);

        if let Some(wait) = self.time_until_admit(now) {
            return Err(wait);
        }

        self.window.push_back(now);
        self.admitted += 1;
        Ok(())
    }

    /// Number of admissions currently counted against the window
    pub fn in_window(&self, now: Instant) -> usize {
        self.window
            .iter()
            .filter(|admitted_at| !self.expired(**admitted_at, now))
            .count()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if self.expired(*front, now) {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn expired(&self, admitted_at: Instant, now: Instant) -> bool {
        admitted_at + self.quota.period <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(rate: u32, millis: u64) -> Quota {
        Quota::per_period(rate, Duration::from_millis(millis)).unwrap()
    }

    #[test]
    fn test_zero_rate_is_not_a_quota() {
        assert!(Quota::per_period(0, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_new_bucket_admits_immediately() {
        let bucket = AdmissionBucket::new(quota(2, 1000));
        assert!(bucket.time_until_admit(Instant::now()).is_none());
        assert_eq!(bucket.admitted, 0);
    }

    #[test]
    fn test_admits_up_to_rate_within_window() {
        let mut bucket = AdmissionBucket::new(quota(2, 1000));
        let now = Instant::now();

        assert!(bucket.try_admit(now).is_ok());
        assert!(bucket.try_admit(now).is_ok());

        let wait = bucket.try_admit(now).unwrap_err();
        assert_eq!(wait, Duration::from_millis(1000));
        assert_eq!(bucket.admitted, 2);
        assert_eq!(bucket.in_window(now), 2);
    }

    #[test]
    fn test_wait_shrinks_as_time_passes() {
        let mut bucket = AdmissionBucket::new(quota(1, 1000));
        let now = Instant::now();
        bucket.try_admit(now).unwrap();

        let soon = now + Duration::from_millis(400);
        assert_eq!(
            bucket.time_until_admit(soon),
            Some(Duration::from_millis(600))
        );
    }

    #[test]
    fn test_slot_reopens_after_period() {
        let mut bucket = AdmissionBucket::new(quota(1, 1000));
        let now = Instant::now();
        bucket.try_admit(now).unwrap();

        let later = now + Duration::from_millis(1000);
        assert!(bucket.try_admit(later).is_ok());
        assert_eq!(bucket.in_window(later), 1);
        assert_eq!(bucket.admitted, 2);
    }

    #[test]
    fn test_sliding_window_uses_oldest_admission() {
        let mut bucket = AdmissionBucket::new(quota(2, 1000));
        let start = Instant::now();
        bucket.try_admit(start).unwrap();
        bucket
            .try_admit(start + Duration::from_millis(300))
            .unwrap();

        // First slot frees at 1000ms, second at 1300ms
        let at = start + Duration::from_millis(500);
        assert_eq!(bucket.time_until_admit(at), Some(Duration::from_millis(500)));

        bucket
            .try_admit(start + Duration::from_millis(1000))
            .unwrap();
        let at = start + Duration::from_millis(1100);
        assert_eq!(bucket.time_until_admit(at), Some(Duration::from_millis(200)));
    }
}
