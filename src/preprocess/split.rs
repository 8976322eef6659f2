//! Temporal train/test partitioning.

use crate::core::TelemetryRecord;
use crate::error::{Result, TelemetryError};

/// Index at which a sequence of `n` rows is split.
///
/// `floor(n * (1 - test_fraction))`.
pub fn split_index(n: usize, test_fraction: f64) -> Result<usize> {
    if !(0.0..1.0).contains(&test_fraction) {
        return Err(TelemetryError::InvalidParameter(format!(
            "test_fraction must be in [0, 1), got {}",
            test_fraction
        )));
    }
    Ok(((n as f64) * (1.0 - test_fraction)).floor() as usize)
}

/// Split records chronologically into (train, test).
///
/// Records are stably sorted by timestamp first (missing last), so the
/// concatenation of both halves is the sorted input.
pub fn temporal_split<R>(mut records: Vec<R>, test_fraction: f64) -> Result<(Vec<R>, Vec<R>)>
where
    R: std::borrow::Borrow<TelemetryRecord>,
{
    let cut = split_index(records.len(), test_fraction)?;
    records.sort_by_key(|r| {
        let ts = r.borrow().timestamp;
        (ts.is_none(), ts)
    });
    let test = records.split_off(cut);
    Ok((records, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NetworkType;
    use chrono::{Duration, TimeZone, Utc};

    fn records(order: &[i64]) -> Vec<TelemetryRecord> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        order
            .iter()
            .map(|&h| {
                TelemetryRecord::new("A", Some(NetworkType::G5))
                    .with_timestamp(base + Duration::hours(h))
                    .with_latency(h as f64)
            })
            .collect()
    }

    #[test]
    fn split_is_chronological() {
        let (train, test) = temporal_split(records(&[3, 0, 4, 1, 2]), 0.2).unwrap();
        let train_l: Vec<_> = train.iter().map(|r| r.latency.unwrap()).collect();
        let test_l: Vec<_> = test.iter().map(|r| r.latency.unwrap()).collect();
        assert_eq!(train_l, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(test_l, vec![4.0]);
    }

    #[test]
    fn split_length_uses_floor() {
        for n in 0..25 {
            let (train, test) = temporal_split(records(&(0..n).collect::<Vec<_>>()), 0.3).unwrap();
            assert_eq!(train.len(), ((n as f64) * 0.7).floor() as usize);
            assert_eq!(train.len() + test.len(), n as usize);
        }
    }

    #[test]
    fn zero_fraction_keeps_everything_in_train() {
        let (train, test) = temporal_split(records(&[0, 1]), 0.0).unwrap();
        assert_eq!(train.len(), 2);
        assert!(test.is_empty());
    }

    #[test]
    fn invalid_fraction_is_rejected() {
        assert!(split_index(10, 1.0).is_err());
        assert!(split_index(10, -0.1).is_err());
        assert!(split_index(10, f64::NAN).is_err());
    }

    #[test]
    fn works_on_borrowed_records() {
        let owned = records(&[1, 0]);
        let refs: Vec<&TelemetryRecord> = owned.iter().collect();
        let (train, test) = temporal_split(refs, 0.5).unwrap();
        assert_eq!(train[0].latency, Some(0.0));
        assert_eq!(test[0].latency, Some(1.0));
    }
}
