//! Fixed-bucket logarithmic latency histogram.
//!
//! Samples (microseconds as `f64`) are aggregated into a fixed ascending
//! ladder of bucket bounds plus running min/max/count/sum/sum-of-squares,
//! so percentile, mean and standard-deviation summaries come out of O(1)
//! state per bucket with no raw values retained. Percentiles are estimated
//! by walking cumulative bucket counts and interpolating linearly inside
//! the bucket that crosses the target fraction.

use std::fmt;

/// Number of bucket bounds in [`BUCKET_LIMITS`].
pub const NUM_BUCKETS: usize = 154;

/// Maximum width of the proportional `#` bar in the rendered output.
const BAR_WIDTH: f64 = 20.0;

/// Ascending bucket upper bounds: 1..9 by ones, then a
/// 1/1.2/1.4/1.6/1.8/2/2.5/3/3.5/4/4.5/5/6/7/8/9 ladder per decade through
/// 9e9, with a final catch-all so no sample can fall off the table. A value
/// lands in the first bucket whose bound is >= the value.
#[rustfmt::skip]
pub const BUCKET_LIMITS: [f64; NUM_BUCKETS] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0,
    7.0, 8.0, 9.0, 10.0, 12.0, 14.0,
    16.0, 18.0, 20.0, 25.0, 30.0, 35.0,
    40.0, 45.0, 50.0, 60.0, 70.0, 80.0,
    90.0, 100.0, 120.0, 140.0, 160.0, 180.0,
    200.0, 250.0, 300.0, 350.0, 400.0, 450.0,
    500.0, 600.0, 700.0, 800.0, 900.0, 1000.0,
    1200.0, 1400.0, 1600.0, 1800.0, 2000.0, 2500.0,
    3000.0, 3500.0, 4000.0, 4500.0, 5000.0, 6000.0,
    7000.0, 8000.0, 9000.0, 10000.0, 12000.0, 14000.0,
    16000.0, 18000.0, 20000.0, 25000.0, 30000.0, 35000.0,
    40000.0, 45000.0, 50000.0, 60000.0, 70000.0, 80000.0,
    90000.0, 100000.0, 120000.0, 140000.0, 160000.0, 180000.0,
    200000.0, 250000.0, 300000.0, 350000.0, 400000.0, 450000.0,
    500000.0, 600000.0, 700000.0, 800000.0, 900000.0, 1000000.0,
    1200000.0, 1400000.0, 1600000.0, 1800000.0, 2000000.0, 2500000.0,
    3000000.0, 3500000.0, 4000000.0, 4500000.0, 5000000.0, 6000000.0,
    7000000.0, 8000000.0, 9000000.0, 10000000.0, 12000000.0, 14000000.0,
    16000000.0, 18000000.0, 20000000.0, 25000000.0, 30000000.0, 35000000.0,
    40000000.0, 45000000.0, 50000000.0, 60000000.0, 70000000.0, 80000000.0,
    90000000.0, 100000000.0, 120000000.0, 140000000.0, 160000000.0, 180000000.0,
    200000000.0, 250000000.0, 300000000.0, 350000000.0, 400000000.0, 450000000.0,
    500000000.0, 600000000.0, 700000000.0, 800000000.0, 900000000.0, 1000000000.0,
    1200000000.0, 1400000000.0, 1600000000.0, 1800000000.0, 2000000000.0, 2500000000.0,
    3000000000.0, 3500000000.0, 4000000000.0, 4500000000.0, 5000000000.0, 6000000000.0,
    7000000000.0, 8000000000.0, 9000000000.0, 1e200,
];

#[derive(Debug, Clone)]
pub struct Histogram {
    min: f64,
    max: f64,
    num: f64,
    sum: f64,
    sum_squares: f64,
    buckets: [f64; NUM_BUCKETS],
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    pub fn new() -> Self {
        let mut h = Self {
            min: 0.0,
            max: 0.0,
            num: 0.0,
            sum: 0.0,
            sum_squares: 0.0,
            buckets: [0.0; NUM_BUCKETS],
        };
        h.clear();
        h
    }

    /// Reset every scalar and bucket count. Called at each phase boundary.
    pub fn clear(&mut self) {
        self.min = BUCKET_LIMITS[NUM_BUCKETS - 1];
        self.max = 0.0;
        self.num = 0.0;
        self.sum = 0.0;
        self.sum_squares = 0.0;
        self.buckets = [0.0; NUM_BUCKETS];
    }

    /// Record one sample: bump the first bucket whose bound is >= `value`
    /// (the last bucket catches everything else) and fold the value into the
    /// running scalars.
    pub fn add(&mut self, value: f64) {
        let b = BUCKET_LIMITS
            .partition_point(|&limit| limit < value)
            .min(NUM_BUCKETS - 1);
        self.buckets[b] += 1.0;
        if self.min > value {
            self.min = value;
        }
        if self.max < value {
            self.max = value;
        }
        self.num += 1.0;
        self.sum += value;
        self.sum_squares += value * value;
    }

    /// Fold another histogram into this one, elementwise. Associative and
    /// commutative, so histograms from independent runs can be combined in
    /// any order.
    pub fn merge(&mut self, other: &Histogram) {
        if other.min < self.min {
            self.min = other.min;
        }
        if other.max > self.max {
            self.max = other.max;
        }
        self.num += other.num;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
        for (bucket, other_bucket) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *bucket += other_bucket;
        }
    }

    pub fn count(&self) -> u64 {
        self.num as u64
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Minimum observed value; 0 when the histogram is empty.
    pub fn min(&self) -> f64 {
        if self.num == 0.0 {
            0.0
        } else {
            self.min
        }
    }

    pub fn average(&self) -> f64 {
        if self.num == 0.0 {
            0.0
        } else {
            self.sum / self.num
        }
    }

    pub fn standard_deviation(&self) -> f64 {
        if self.num == 0.0 {
            return 0.0;
        }
        let mean = self.sum / self.num;
        (self.sum_squares / self.num - mean * mean).max(0.0).sqrt()
    }

    /// Estimate the value at percentile `p` (0..=100) by walking cumulative
    /// bucket counts and interpolating within the crossing bucket. The
    /// estimate is clamped to the observed [min, max]. Returns 0 when empty.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.num == 0.0 {
            return 0.0;
        }
        let threshold = self.num * (p / 100.0);
        let mut cumulative = 0.0;
        for (b, &bucket) in self.buckets.iter().enumerate() {
            cumulative += bucket;
            if cumulative >= threshold {
                let left_point = if b == 0 { 0.0 } else { BUCKET_LIMITS[b - 1] };
                let right_point = BUCKET_LIMITS[b];
                let left_sum = cumulative - bucket;
                let width = cumulative - left_sum;
                let pos = if width > 0.0 {
                    (threshold - left_sum) / width
                } else {
                    0.0
                };
                let r = left_point + (right_point - left_point) * pos;
                return r.clamp(self.min, self.max);
            }
        }
        self.max
    }

    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Count: {:.0}  Average: {:.4}  StdDev: {:.2}",
            self.num,
            self.average(),
            self.standard_deviation()
        )?;
        writeln!(
            f,
            "Min: {:.4}  Median: {:.4}  Max: {:.4}",
            self.min(),
            self.median(),
            self.max
        )?;
        writeln!(
            f,
            "Percentiles: P50: {:.2}  P75: {:.2}  P99: {:.2}  P99.9: {:.2}",
            self.percentile(50.0),
            self.percentile(75.0),
            self.percentile(99.0),
            self.percentile(99.9)
        )?;
        writeln!(f, "------------------------------------------------------")?;

        let mult = if self.num > 0.0 { 100.0 / self.num } else { 0.0 };
        let mut cumulative = 0.0;
        for (b, &bucket) in self.buckets.iter().enumerate() {
            if bucket <= 0.0 {
                continue;
            }
            cumulative += bucket;
            let left = if b == 0 { 0.0 } else { BUCKET_LIMITS[b - 1] };
            write!(
                f,
                "[ {:7.0}, {:7.0} ) {:7.0} {:7.3}% {:7.3}% ",
                left,
                BUCKET_LIMITS[b],
                bucket,
                mult * bucket,
                mult * cumulative
            )?;
            let marks = (BAR_WIDTH * (bucket / self.num)).round() as usize;
            writeln!(f, "{}", "#".repeat(marks))?;
        }
        Ok(())
    }
}
