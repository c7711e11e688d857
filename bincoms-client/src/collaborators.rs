//! Persistence and clock-drift collaborators

use async_trait::async_trait;
use bincoms_core::{BincomsError, BincomsResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Captured edge with its device time in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedRecord {
    pub counter: u32,
    pub time: f64,
    pub pin_state: u8,
}

/// Writes and reads back sequences of timed records
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn write(&self, path: &Path, records: &[TimedRecord]) -> BincomsResult<()>;

    async fn read(&self, path: &Path) -> BincomsResult<Vec<TimedRecord>>;
}

/// Record store keeping one JSON array per file
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordStore;

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn write(&self, path: &Path, records: &[TimedRecord]) -> BincomsResult<()> {
        let json = serde_json::to_vec(records).map_err(|e| BincomsError::Storage(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| BincomsError::Storage(format!("{}: {}", path.display(), e)))?;
        log::info!("Saved {} record(s) to {}", records.len(), path.display());
        Ok(())
    }

    async fn read(&self, path: &Path) -> BincomsResult<Vec<TimedRecord>> {
        let json = tokio::fs::read(path)
            .await
            .map_err(|e| BincomsError::Storage(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&json).map_err(|e| BincomsError::Storage(e.to_string()))
    }
}

/// Scale factor between two clocks and its one-sigma uncertainty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftEstimate {
    pub scale_factor: f64,
    pub uncertainty: f64,
}

/// Fits `device ≈ scale_factor · host + offset`
pub trait DriftFit {
    fn fit(&self, host: &[f64], device: &[f64]) -> BincomsResult<DriftEstimate>;
}

/// Ordinary least squares on both series shifted to start at zero
///
/// The uncertainty is the slope standard error with residual variance scaled
/// by `n - 2`, so at least three samples are needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearDriftFit;

impl DriftFit for LinearDriftFit {
    fn fit(&self, host: &[f64], device: &[f64]) -> BincomsResult<DriftEstimate> {
        let n = host.len();
        if n < 3 {
            return Err(BincomsError::InvalidData(format!(
                "Drift fit needs at least 3 samples, got {}",
                n
            )));
        }

        let x0 = host.iter().copied().fold(f64::INFINITY, f64::min);
        let y0 = device.iter().copied().fold(f64::INFINITY, f64::min);
        let x: Vec<f64> = host.iter().map(|v| v - x0).collect();
        let y: Vec<f64> = device.iter().map(|v| v - y0).collect();

        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;
        let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
        if sxx == 0.0 {
            return Err(BincomsError::InvalidData(
                "Host timestamps do not vary".to_string(),
            ));
        }
        let sxy: f64 = x
            .iter()
            .zip(&y)
            .map(|(a, b)| (a - mean_x) * (b - mean_y))
            .sum();

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        let residuals: f64 = x
            .iter()
            .zip(&y)
            .map(|(a, b)| (b - (slope * a + intercept)).powi(2))
            .sum();
        let variance = residuals / (n - 2) as f64;

        Ok(DriftEstimate {
            scale_factor: slope,
            uncertainty: (variance / sxx).sqrt(),
        })
    }
}

/// Check both series and hand them to `fit`
pub fn estimate_drift<F: DriftFit + ?Sized>(
    fit: &F,
    host: &[f64],
    device: &[f64],
) -> BincomsResult<DriftEstimate> {
    if host.is_empty() || device.is_empty() {
        return Err(BincomsError::InvalidData("Empty time series".to_string()));
    }
    if host.len() != device.len() {
        return Err(BincomsError::InvalidData(format!(
            "Time series differ in length: {} host vs {} device",
            host.len(),
            device.len()
        )));
    }
    fit.fit(host, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_drift() {
        let host: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let device: Vec<f64> = (0..10).map(|i| 5.0 + 1.0001 * i as f64).collect();

        let estimate = estimate_drift(&LinearDriftFit, &host, &device).unwrap();
        assert!((estimate.scale_factor - 1.0001).abs() < 1e-9);
        assert!(estimate.uncertainty < 1e-9);
    }

    #[test]
    fn test_noisy_drift_has_uncertainty() {
        let host: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let device = vec![0.0, 1.1, 1.9, 3.05, 4.0, 4.95];

        let estimate = estimate_drift(&LinearDriftFit, &host, &device).unwrap();
        assert!((estimate.scale_factor - 1.0).abs() < 0.05);
        assert!(estimate.uncertainty > 0.0);
    }

    #[test]
    fn test_series_are_validated() {
        assert!(estimate_drift(&LinearDriftFit, &[], &[]).is_err());
        assert!(estimate_drift(&LinearDriftFit, &[1.0, 2.0], &[1.0]).is_err());
        assert!(estimate_drift(&LinearDriftFit, &[1.0, 2.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_validation_happens_before_fit() {
        struct Unreachable;
        impl DriftFit for Unreachable {
            fn fit(&self, _: &[f64], _: &[f64]) -> BincomsResult<DriftEstimate> {
                panic!("fit called with invalid series");
            }
        }
        assert!(estimate_drift(&Unreachable, &[1.0], &[]).is_err());
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("bincoms-records-{}.json", std::process::id()));
        let records = vec![
            TimedRecord { counter: 500_000, time: 0.25, pin_state: 1 },
            TimedRecord { counter: 1_000_000, time: 0.5, pin_state: 0 },
        ];

        JsonRecordStore.write(&path, &records).await.unwrap();
        assert_eq!(JsonRecordStore.read(&path).await.unwrap(), records);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_json_store_missing_file() {
        let path = std::env::temp_dir().join("bincoms-records-does-not-exist.json");
        assert!(matches!(
            JsonRecordStore.read(&path).await,
            Err(BincomsError::Storage(_))
        ));
    }
}
