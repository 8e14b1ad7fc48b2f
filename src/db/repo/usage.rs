//! Aggregations over stored readings for reporting consumers.

use chrono::{NaiveDateTime, NaiveTime};
use sqlx::Row;

use super::{parse_date_column, DailyUsage, Repository, UsageFilter, UsagePoint};

impl UsageFilter {
    /// Half-open timestamp bounds `[from 00:00, day after to 00:00)`.
    fn timestamp_bounds(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        let start = self.from.map(|d| d.and_time(NaiveTime::MIN));
        let end = self
            .to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(NaiveTime::MIN));
        (start, end)
    }
}

impl Repository {
    /// Sum readings across meters, grouped by interval timestamp.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn usage_by_timestamp(
        &self,
        filter: &UsageFilter,
    ) -> Result<Vec<UsagePoint>, sqlx::Error> {
        let (start, end) = filter.timestamp_bounds();
        let nmi = filter.nmi.map(|n| n.as_i64());

        let rows = sqlx::query(
            r#"
            SELECT r.timestamp AS timestamp, SUM(r.value) AS kwh
            FROM readings r
            JOIN interval_blocks b ON b.id = r.interval_block_id
            JOIN meter_blocks m ON m.id = b.meter_block_id
            WHERE (? IS NULL OR m.nmi = ?)
              AND (? IS NULL OR r.timestamp >= ?)
              AND (? IS NULL OR r.timestamp < ?)
            GROUP BY r.timestamp
            ORDER BY r.timestamp ASC
            "#,
        )
        .bind(nmi)
        .bind(nmi)
        .bind(start)
        .bind(start)
        .bind(end)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(UsagePoint {
                    timestamp: row.try_get("timestamp")?,
                    kwh: row.try_get("kwh")?,
                })
            })
            .collect()
    }

    /// Sum readings across meters, grouped by calendar date.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn daily_usage(&self, filter: &UsageFilter) -> Result<Vec<DailyUsage>, sqlx::Error> {
        let (start, end) = filter.timestamp_bounds();
        let nmi = filter.nmi.map(|n| n.as_i64());

        let rows = sqlx::query(
            r#"
            SELECT date(r.timestamp) AS day, SUM(r.value) AS kwh
            FROM readings r
            JOIN interval_blocks b ON b.id = r.interval_block_id
            JOIN meter_blocks m ON m.id = b.meter_block_id
            WHERE (? IS NULL OR m.nmi = ?)
              AND (? IS NULL OR r.timestamp >= ?)
              AND (? IS NULL OR r.timestamp < ?)
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(nmi)
        .bind(nmi)
        .bind(start)
        .bind(start)
        .bind(end)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let day: String = row.try_get("day")?;
                Ok(DailyUsage {
                    date: parse_date_column(&day)?,
                    kwh: row.try_get("kwh")?,
                })
            })
            .collect()
    }
}

/// Centred rolling mean over daily totals.
///
/// The window spans `window / 2` earlier days and `(window - 1) / 2` later
/// days. Days near either end average over whatever neighbours exist. Gaps
/// in the calendar are not filled, so the window counts stored days.
pub fn centred_rolling_mean(days: &[DailyUsage], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let earlier = window / 2;
    let later = (window - 1) / 2;

    (0..days.len())
        .map(|i| {
            let lo = i.saturating_sub(earlier);
            let hi = (i + later + 1).min(days.len());
            let slice = &days[lo..hi];
            slice.iter().map(|d| d.kwh).sum::<f64>() / slice.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{new_block, new_meter, setup_repo};
    use super::*;
    use crate::domain::{pair_readings, Nmi};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 8, d).unwrap()
    }

    async fn seeded_repo() -> (Repository, tempfile::TempDir) {
        let (repo, temp) = setup_repo().await;
        for (nmi, base) in [(1_i64, 1.0), (2, 10.0)] {
            let meter = repo
                .insert_meter_block_if_absent(&new_meter(nmi, 720))
                .await
                .unwrap()
                .into_inner();
            for day in [9, 10] {
                let block = new_block((2019, 8, day), (2019, 8, day + 1, 4));
                let readings =
                    pair_readings(block.interval_date, meter.interval_minutes, &[base, base * 2.0])
                        .unwrap();
                repo.insert_interval_block_if_absent(meter.id, &block, &readings)
                    .await
                    .unwrap();
            }
        }
        (repo, temp)
    }

    #[tokio::test]
    async fn test_usage_by_timestamp_sums_meters() {
        let (repo, _temp) = seeded_repo().await;
        let points = repo.usage_by_timestamp(&UsageFilter::default()).await.unwrap();

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].timestamp, date(9).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(points[0].kwh, 11.0);
        assert_eq!(points[1].timestamp, date(9).and_hms_opt(12, 0, 0).unwrap());
        assert_eq!(points[1].kwh, 22.0);
    }

    #[tokio::test]
    async fn test_usage_filters() {
        let (repo, _temp) = seeded_repo().await;

        let only_meter_two = UsageFilter {
            nmi: Some(Nmi::new(2)),
            ..Default::default()
        };
        let points = repo.usage_by_timestamp(&only_meter_two).await.unwrap();
        assert_eq!(points.iter().map(|p| p.kwh).sum::<f64>(), 60.0);

        let one_day = UsageFilter {
            nmi: None,
            from: Some(date(10)),
            to: Some(date(10)),
        };
        let points = repo.usage_by_timestamp(&one_day).await.unwrap();
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.timestamp.date() == date(10)));
    }

    #[tokio::test]
    async fn test_daily_usage() {
        let (repo, _temp) = seeded_repo().await;
        let days = repo.daily_usage(&UsageFilter::default()).await.unwrap();
        assert_eq!(
            days,
            vec![
                DailyUsage { date: date(9), kwh: 33.0 },
                DailyUsage { date: date(10), kwh: 33.0 },
            ]
        );
    }

    #[test]
    fn test_centred_rolling_mean() {
        let days: Vec<DailyUsage> = [1.0, 2.0, 3.0, 4.0, 5.0]
            .iter()
            .enumerate()
            .map(|(i, kwh)| DailyUsage { date: date(1 + i as u32), kwh: *kwh })
            .collect();

        assert_eq!(centred_rolling_mean(&days, 3), vec![1.5, 2.0, 3.0, 4.0, 4.5]);
        assert_eq!(centred_rolling_mean(&days, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(centred_rolling_mean(&[], 7).is_empty());
    }
}
