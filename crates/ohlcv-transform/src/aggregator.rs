//! Timeframe aggregation.
//!
//! Every reduction uses the same OHLCV rule: open of the first bar, highest
//! high, lowest low, close of the last bar and summed volume. Reductions only
//! differ in how bars are grouped.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use ohlcv_core::{Bar, BarSeries, DataError, Timeframe};
use std::collections::BTreeMap;
use tracing::debug;

/// One grouping step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    /// Pass bars through untouched
    Identity,
    /// Clock-aligned buckets of N minutes, labelled by bucket start
    MinuteBuckets(u32),
    /// Buckets of N calendar days anchored at the first bar's date
    DayBuckets(u32),
    /// ISO weeks, labelled by the first bar in the week
    Week,
    /// Calendar months, labelled by the first bar in the month
    Month,
}

impl Reduction {
    /// Timeframe of the series this step produces from `input`.
    pub fn output_timeframe(&self, input: Timeframe) -> Timeframe {
        match self {
            Reduction::Identity => input,
            Reduction::MinuteBuckets(n) => Timeframe::Minutes(*n),
            Reduction::DayBuckets(n) => Timeframe::Days(*n),
            Reduction::Week => Timeframe::Week,
            Reduction::Month => Timeframe::Month,
        }
    }
}

/// Lookup table from (source, target) timeframes to reduction steps.
pub struct TransformTable;

impl TransformTable {
    /// Steps that turn a `from` series into a `to` series.
    pub fn plan(from: Timeframe, to: Timeframe) -> Result<Vec<Reduction>, DataError> {
        use Timeframe::{Days, Minutes, Month, Week};

        if from == to {
            return Ok(vec![Reduction::Identity]);
        }

        let plan = match (from, to) {
            (Minutes(a), Minutes(b)) if a > 0 && b > a && b % a == 0 => vec![Reduction::MinuteBuckets(b)],
            (Minutes(_), Days(1)) => vec![Reduction::DayBuckets(1)],
            (Minutes(_), Days(n)) => vec![Reduction::DayBuckets(1), Reduction::DayBuckets(n)],
            (Minutes(_), Week) => vec![Reduction::DayBuckets(1), Reduction::Week],
            (Minutes(_), Month) => vec![Reduction::DayBuckets(1), Reduction::Month],
            (Days(1), Days(n)) if n > 1 => vec![Reduction::DayBuckets(n)],
            (Days(1), Week) => vec![Reduction::Week],
            (Days(1), Month) => vec![Reduction::Month],
            _ => return Err(DataError::UnsupportedTransform { from, to }),
        };

        Ok(plan)
    }

    /// Check whether a pair has a defined reduction.
    pub fn supports(from: Timeframe, to: Timeframe) -> bool {
        Self::plan(from, to).is_ok()
    }

    /// All supported pairs over [`Timeframe::standard`].
    pub fn supported_pairs() -> Vec<(Timeframe, Timeframe)> {
        let standard = Timeframe::standard();
        standard
            .iter()
            .flat_map(|from| standard.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| Self::supports(*from, *to))
            .collect()
    }
}

/// Running OHLCV reduction of one group.
struct Accumulator {
    timestamp: NaiveDateTime,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Accumulator {
    fn start(timestamp: NaiveDateTime, bar: &Bar) -> Self {
        Self {
            timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }

    fn add(&mut self, bar: &Bar) {
        self.high = nan_max(self.high, bar.high);
        self.low = nan_min(self.low, bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
    }

    fn finish(self) -> Bar {
        Bar::new(
            self.timestamp,
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
        )
    }
}

#[inline]
fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

#[inline]
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

/// Group `bars` by `key` and reduce every group.
///
/// `key` returns the group key and the label a new group starts with.
fn reduce_by<K, F>(bars: &[Bar], key: F) -> Vec<Bar>
where
    K: Ord,
    F: Fn(&Bar) -> (K, NaiveDateTime),
{
    let mut groups: BTreeMap<K, Accumulator> = BTreeMap::new();

    for bar in bars {
        let (k, label) = key(bar);
        groups
            .entry(k)
            .and_modify(|acc| acc.add(bar))
            .or_insert_with(|| Accumulator::start(label, bar));
    }

    let mut out: Vec<Bar> = groups.into_values().map(Accumulator::finish).collect();
    out.sort_by_key(|b| b.timestamp);
    out
}

/// Converts bar series to coarser timeframes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregator;

impl Aggregator {
    /// Create a new aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Aggregate `series` from `from` to `to`.
    ///
    /// Equal timeframes return the series unchanged. Multi-step plans go
    /// through the intermediate daily series.
    pub fn aggregate(
        &self,
        series: BarSeries,
        from: Timeframe,
        to: Timeframe,
    ) -> Result<BarSeries, DataError> {
        if from == to {
            return Ok(series);
        }

        let plan = TransformTable::plan(from, to)?;
        debug!("Transforming {} from {} to {} via {:?}", series.symbol, from, to, plan);

        let mut current = series;
        let mut timeframe = from;
        for reduction in plan {
            timeframe = reduction.output_timeframe(timeframe);
            current = self.apply(current, reduction, timeframe);
        }

        debug!("Aggregated into {} bars", current.len());
        Ok(current)
    }

    /// Run a single reduction step.
    pub fn apply(&self, series: BarSeries, reduction: Reduction, output: Timeframe) -> BarSeries {
        let bars = match reduction {
            Reduction::Identity => return series,
            Reduction::MinuteBuckets(n) => Self::minute_buckets(series.bars(), n),
            Reduction::DayBuckets(n) => Self::day_buckets(series.bars(), n),
            Reduction::Week => reduce_by(series.bars(), |bar| {
                let week = bar.timestamp.iso_week();
                ((week.year(), week.week()), bar.timestamp)
            }),
            Reduction::Month => reduce_by(series.bars(), |bar| {
                ((bar.timestamp.year(), bar.timestamp.month()), bar.timestamp)
            }),
        };

        series.resampled(output, bars)
    }

    fn minute_buckets(bars: &[Bar], minutes: u32) -> Vec<Bar> {
        let Some(first) = bars.first() else {
            return Vec::new();
        };

        // Buckets are measured from midnight so boundaries land on the clock.
        let origin = midnight(first.date());
        let width = i64::from(minutes.max(1)) * 60;

        reduce_by(bars, |bar| {
            let offset = (bar.timestamp - origin).num_seconds();
            let index = offset.div_euclid(width);
            (index, origin + Duration::seconds(index * width))
        })
    }

    fn day_buckets(bars: &[Bar], days: u32) -> Vec<Bar> {
        let Some(first) = bars.first() else {
            return Vec::new();
        };

        let origin = first.date();
        let width = i64::from(days.max(1));

        reduce_by(bars, |bar| {
            let offset = (bar.date() - origin).num_days();
            let index = offset.div_euclid(width);
            (index, midnight(origin + Duration::days(index * width)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    fn daily(days: &[(NaiveDate, f64, f64, f64, f64, f64)]) -> BarSeries {
        BarSeries::new(
            Timeframe::DAY,
            days.iter()
                .map(|(d, o, h, l, c, v)| Bar::new(midnight(*d), *o, *h, *l, *c, *v))
                .collect(),
        )
    }

    fn week_of_2016_05_02() -> BarSeries {
        daily(&[
            (date(2016, 5, 2), 206.9, 208.2, 206.4, 207.9, 100.0),
            (date(2016, 5, 3), 206.5, 206.8, 205.3, 205.6, 120.0),
            (date(2016, 5, 4), 204.9, 205.8, 204.4, 205.0, 90.0),
            (date(2016, 5, 5), 205.6, 205.9, 204.5, 205.0, 80.0),
            (date(2016, 5, 6), 204.1, 205.8, 203.9, 205.7, 110.0),
        ])
    }

    #[test]
    fn test_weekly_volume_conservation() {
        let series = week_of_2016_05_02();
        let total: f64 = series.volumes().iter().sum();

        let weekly = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Week)
            .unwrap();

        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly.timeframe, Timeframe::Week);
        assert_eq!(weekly.get(0).unwrap().volume, total);
    }

    #[test]
    fn test_weekly_open_close_high_low() {
        let weekly = Aggregator::new()
            .aggregate(week_of_2016_05_02(), Timeframe::DAY, Timeframe::Week)
            .unwrap();
        let bar = weekly.get(0).unwrap();

        assert_eq!(bar.timestamp, at(2016, 5, 2, 0, 0));
        assert_eq!(bar.open, 206.9);
        assert_eq!(bar.close, 205.7);
        assert_eq!(bar.high, 208.2);
        assert_eq!(bar.low, 203.9);
    }

    #[test]
    fn test_week_label_is_first_bar_not_week_start() {
        // Tuesday start: Monday 2016-04-11 is absent.
        let series = daily(&[
            (date(2016, 4, 12), 1.0, 2.0, 0.5, 1.5, 10.0),
            (date(2016, 4, 13), 1.5, 3.0, 1.0, 2.5, 10.0),
            (date(2016, 4, 18), 2.5, 2.6, 2.0, 2.1, 10.0),
        ]);

        let weekly = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Week)
            .unwrap();

        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly.get(0).unwrap().timestamp, at(2016, 4, 12, 0, 0));
        assert_eq!(weekly.get(0).unwrap().close, 2.5);
        assert_eq!(weekly.get(1).unwrap().timestamp, at(2016, 4, 18, 0, 0));
    }

    #[test]
    fn test_iso_week_spanning_new_year() {
        // 2015-12-31 (Thu) and 2016-01-04 (Mon) are in different ISO weeks,
        // 2015-12-31 and 2016-01-01 share ISO week 53 of 2015.
        let series = daily(&[
            (date(2015, 12, 31), 1.0, 1.0, 1.0, 1.0, 1.0),
            (date(2016, 1, 1), 2.0, 2.0, 2.0, 2.0, 1.0),
            (date(2016, 1, 4), 3.0, 3.0, 3.0, 3.0, 1.0),
        ]);

        let weekly = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Week)
            .unwrap();

        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly.get(0).unwrap().volume, 2.0);
        assert_eq!(weekly.get(0).unwrap().close, 2.0);
    }

    #[test]
    fn test_monthly_grouping() {
        let series = daily(&[
            (date(2016, 1, 29), 1.0, 5.0, 1.0, 2.0, 1.0),
            (date(2016, 2, 1), 2.0, 3.0, 0.5, 2.5, 2.0),
            (date(2016, 2, 29), 2.5, 4.0, 2.0, 3.0, 3.0),
        ]);

        let monthly = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Month)
            .unwrap();

        assert_eq!(monthly.len(), 2);
        let feb = monthly.get(1).unwrap();
        assert_eq!(feb.timestamp, at(2016, 2, 1, 0, 0));
        assert_eq!(feb.open, 2.0);
        assert_eq!(feb.high, 4.0);
        assert_eq!(feb.low, 0.5);
        assert_eq!(feb.close, 3.0);
        assert_eq!(feb.volume, 5.0);
    }

    #[test]
    fn test_identity_for_every_standard_timeframe() {
        for tf in Timeframe::standard() {
            let series = week_of_2016_05_02().with_symbol("SPY");
            let out = Aggregator::new().aggregate(series.clone(), *tf, *tf).unwrap();
            assert_eq!(out, series, "identity failed for {}", tf);
        }
    }

    #[test]
    fn test_minute_buckets_align_to_clock() {
        let bars = [(9, 31), (9, 34), (9, 35), (9, 39), (9, 46)]
            .iter()
            .enumerate()
            .map(|(i, (h, m))| {
                let p = 100.0 + i as f64;
                Bar::new(at(2024, 3, 1, *h, *m), p, p + 1.0, p - 1.0, p + 0.5, 10.0)
            })
            .collect();
        let series = BarSeries::new(Timeframe::Minutes(1), bars);

        let five = Aggregator::new()
            .aggregate(series, Timeframe::Minutes(1), Timeframe::Minutes(5))
            .unwrap();

        let stamps: Vec<_> = five.iter().map(|b| b.timestamp).collect();
        assert_eq!(
            stamps,
            vec![at(2024, 3, 1, 9, 30), at(2024, 3, 1, 9, 35), at(2024, 3, 1, 9, 45)]
        );
        // Empty 9:40 bucket is dropped rather than filled.
        let first = five.get(0).unwrap();
        assert_eq!(first.open, 100.0);
        assert_eq!(first.close, 101.5);
        assert_eq!(first.volume, 20.0);
    }

    #[test]
    fn test_five_minute_to_hour() {
        let bars = (0..12)
            .map(|i| {
                let p = 170.0 + i as f64 * 0.1;
                Bar::new(at(2017, 12, 29, 9, 30) + Duration::minutes(5 * i), p, p + 0.2, p - 0.2, p, 1.0)
            })
            .collect();
        let series = BarSeries::new(Timeframe::Minutes(5), bars);

        let hourly = Aggregator::new()
            .aggregate(series, Timeframe::Minutes(5), Timeframe::Minutes(60))
            .unwrap();

        assert_eq!(hourly.len(), 2);
        assert_eq!(hourly.get(0).unwrap().timestamp, at(2017, 12, 29, 9, 0));
        assert_eq!(hourly.get(0).unwrap().volume, 6.0);
        assert_eq!(hourly.get(1).unwrap().timestamp, at(2017, 12, 29, 10, 0));
        assert_eq!(hourly.get(1).unwrap().volume, 6.0);
    }

    #[test]
    fn test_240_minute_buckets() {
        let bars = [8, 9, 12, 15, 16]
            .iter()
            .map(|h| Bar::new(at(2024, 3, 1, *h, 0), 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let series = BarSeries::new(Timeframe::Minutes(60), bars);

        let out = Aggregator::new()
            .aggregate(series, Timeframe::Minutes(60), Timeframe::Minutes(240))
            .unwrap();

        let stamps: Vec<_> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(
            stamps,
            vec![at(2024, 3, 1, 8, 0), at(2024, 3, 1, 12, 0), at(2024, 3, 1, 16, 0)]
        );
        assert_eq!(out.get(0).unwrap().volume, 2.0);
    }

    #[test]
    fn test_n_day_anchored_at_first_bar() {
        let series = daily(&[
            (date(2024, 1, 3), 1.0, 1.0, 1.0, 1.0, 1.0),
            (date(2024, 1, 4), 2.0, 2.0, 2.0, 2.0, 1.0),
            (date(2024, 1, 5), 3.0, 3.0, 3.0, 3.0, 1.0),
            (date(2024, 1, 9), 4.0, 4.0, 4.0, 4.0, 1.0),
        ]);

        let out = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Days(2))
            .unwrap();

        // Buckets: 3-4, 5-6, (7-8 empty), 9-10.
        let stamps: Vec<_> = out.iter().map(|b| b.timestamp).collect();
        assert_eq!(
            stamps,
            vec![at(2024, 1, 3, 0, 0), at(2024, 1, 5, 0, 0), at(2024, 1, 9, 0, 0)]
        );
        assert_eq!(out.timeframe, Timeframe::Days(2));
        assert_eq!(out.get(0).unwrap().close, 2.0);
    }

    #[test]
    fn test_intraday_to_week_goes_through_day() {
        let mut bars = Vec::new();
        for d in [14, 15, 16] {
            for (i, h) in [10, 11, 12].iter().enumerate() {
                let p = d as f64 + i as f64 / 10.0;
                bars.push(Bar::new(at(2020, 4, d, *h, 0), p, p + 1.0, p - 1.0, p, 1.0));
            }
        }
        let series = BarSeries::new(Timeframe::Minutes(5), bars);

        let weekly = Aggregator::new()
            .aggregate(series, Timeframe::Minutes(5), Timeframe::Week)
            .unwrap();

        assert_eq!(weekly.len(), 1);
        let bar = weekly.get(0).unwrap();
        assert_eq!(bar.timestamp, at(2020, 4, 14, 0, 0));
        assert_eq!(bar.open, 14.0);
        assert!((bar.close - 16.2).abs() < 1e-9);
        assert_eq!(bar.volume, 9.0);
    }

    #[test]
    fn test_nan_propagates_through_high_low() {
        let series = daily(&[
            (date(2016, 5, 2), 1.0, f64::NAN, 0.5, 1.0, 1.0),
            (date(2016, 5, 3), 1.0, 2.0, f64::NAN, 1.0, 1.0),
        ]);

        let weekly = Aggregator::new()
            .aggregate(series, Timeframe::DAY, Timeframe::Week)
            .unwrap();

        assert!(weekly.get(0).unwrap().high.is_nan());
        assert!(weekly.get(0).unwrap().low.is_nan());
    }

    #[test]
    fn test_unsupported_pairs() {
        let err = Aggregator::new()
            .aggregate(week_of_2016_05_02(), Timeframe::Week, Timeframe::Month)
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::UnsupportedTransform { from: Timeframe::Week, to: Timeframe::Month }
        ));

        assert!(!TransformTable::supports(Timeframe::DAY, Timeframe::Minutes(5)));
        assert!(!TransformTable::supports(Timeframe::Minutes(5), Timeframe::Minutes(7)));
        assert!(!TransformTable::supports(Timeframe::Days(2), Timeframe::Week));
    }

    #[test]
    fn test_zero_minute_source_is_unsupported() {
        let err = TransformTable::plan(Timeframe::Minutes(0), Timeframe::Minutes(5)).unwrap_err();
        assert!(matches!(err, DataError::UnsupportedTransform { .. }));
    }

    #[test]
    fn test_supported_pairs_enumeration() {
        let pairs = TransformTable::supported_pairs();

        for tf in Timeframe::standard() {
            assert!(pairs.contains(&(*tf, *tf)));
        }
        assert!(pairs.contains(&(Timeframe::Minutes(1), Timeframe::Minutes(5))));
        assert!(pairs.contains(&(Timeframe::Minutes(5), Timeframe::Minutes(60))));
        assert!(pairs.contains(&(Timeframe::DAY, Timeframe::Week)));
        assert!(pairs.contains(&(Timeframe::DAY, Timeframe::Month)));
        assert!(!pairs.contains(&(Timeframe::Minutes(15), Timeframe::Minutes(5))));
        assert!(!pairs.contains(&(Timeframe::Week, Timeframe::Month)));
        assert!(pairs.iter().all(|(f, t)| TransformTable::plan(*f, *t).is_ok()));
    }

    #[test]
    fn test_plan_shapes() {
        assert_eq!(
            TransformTable::plan(Timeframe::Minutes(5), Timeframe::Month).unwrap(),
            vec![Reduction::DayBuckets(1), Reduction::Month]
        );
        assert_eq!(
            TransformTable::plan(Timeframe::DAY, Timeframe::Days(3)).unwrap(),
            vec![Reduction::DayBuckets(3)]
        );
        assert_eq!(
            TransformTable::plan(Timeframe::Month, Timeframe::Month).unwrap(),
            vec![Reduction::Identity]
        );
    }
}
