//! SQLite repository round trips

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;
use wdome_common::{OutageSnapshot, Provenance, Territory, WeatherAlert, WeatherObservation};
use wdome_ie::db::init_memory_pool;
use wdome_ie::models::RiskLevel;
use wdome_ie::repository::{
    CalibrationRepository, ImpactRepository, OutageRepository, SqliteRepository, WeatherRepository,
};
use wdome_ie::types::{CalibrationRecord, ForecastImpactPoint, ImpactAssessment};

async fn repo() -> SqliteRepository {
    SqliteRepository::new(init_memory_pool().await.unwrap())
}

fn calibration(zone_id: &str, at: chrono::DateTime<Utc>, ratio: f64) -> CalibrationRecord {
    CalibrationRecord {
        zone_id: zone_id.to_string(),
        computed_at: at,
        correction_ratio: ratio,
        wind_correlation: Some(0.82),
        temp_correlation: None,
        precip_correlation: None,
        snow_correlation: None,
        ice_correlation: None,
        actual_outage_avg: 40.0,
        actual_outage_max: 60,
        actual_outage_min: 20,
        predicted_outage_avg: 30.0,
        predicted_score_avg: 22.5,
        predicted_jobs_avg: 80.0,
        wind_avg_mph: Some(18.2),
        temp_avg_f: Some(29.0),
        precip_avg_in_hr: None,
        observation_count: 48,
        snapshot_count: 24,
        assessment_count: 12,
    }
}

#[tokio::test]
async fn test_observations_between_bounds() {
    let repo = repo().await;
    let t0 = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
    for h in 0..5 {
        let mut o = WeatherObservation::new("CONED-MAN", Provenance::Aggregated, t0 + Duration::hours(h));
        o.temperature_f = Some(20.0 + h as f64);
        o.condition_text = Some("Snow".to_string());
        repo.save_observation(&o).await.unwrap();
    }

    let window = repo
        .observations_between("CONED-MAN", t0 + Duration::hours(1), t0 + Duration::hours(4))
        .await
        .unwrap();
    let temps: Vec<f64> = window.iter().filter_map(|o| o.temperature_f).collect();
    assert_eq!(temps, vec![21.0, 22.0, 23.0]);
    assert_eq!(window[0].provenance, Provenance::Aggregated);
    assert_eq!(window[0].snow_depth_in, None);

    let latest = repo.latest_observation("CONED-MAN").await.unwrap().unwrap();
    assert_eq!(latest.observed_at, t0 + Duration::hours(4));
    assert!(repo.latest_observation("OR-ORA").await.unwrap().is_none());
}

#[tokio::test]
async fn test_forecast_and_alerts_replaced() {
    let repo = repo().await;
    let t0 = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
    let points: Vec<_> = (0..4)
        .map(|h| WeatherObservation::new("OR-BER", Provenance::Forecast, t0 + Duration::hours(h)))
        .collect();
    repo.replace_forecast("OR-BER", &points).await.unwrap();
    repo.replace_forecast("OR-BER", &points[..2]).await.unwrap();
    assert_eq!(repo.forecast("OR-BER").await.unwrap().len(), 2);

    let alerts = vec![
        WeatherAlert {
            alert_id: "old".to_string(),
            zone_id: "OR-BER".to_string(),
            event: "Winter Storm Warning".to_string(),
            severity: "Severe".to_string(),
            expires: Some(t0 - Duration::hours(1)),
            ..Default::default()
        },
        WeatherAlert {
            alert_id: "live".to_string(),
            zone_id: "OR-BER".to_string(),
            event: "Winter Storm Warning".to_string(),
            severity: "Severe".to_string(),
            description: Some("Total snow accumulations of 6 to 10 inches.".to_string()),
            expires: Some(t0 + Duration::hours(12)),
            ..Default::default()
        },
    ];
    repo.replace_alerts("OR-BER", &alerts).await.unwrap();
    let active = repo.active_alerts("OR-BER", t0).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].alert_id, "live");
    assert_eq!(active[0].description, alerts[1].description);
}

#[tokio::test]
async fn test_snapshots_since() {
    let repo = repo().await;
    let t0 = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
    for (i, count) in [3u32, 8, 13].iter().enumerate() {
        repo.save_snapshot(&OutageSnapshot {
            zone_id: "CONED-SI".to_string(),
            source: "coned".to_string(),
            snapshot_at: t0 + Duration::minutes(15 * i as i64),
            outage_count: *count,
            customers_affected: count * 50,
        })
        .await
        .unwrap();
    }

    let recent = repo.snapshots_since("CONED-SI", t0 + Duration::minutes(15)).await.unwrap();
    assert_eq!(recent.iter().map(|s| s.outage_count).collect::<Vec<_>>(), vec![8, 13]);
    assert_eq!(repo.latest_snapshot("CONED-SI").await.unwrap().unwrap().outage_count, 13);
}

#[tokio::test]
async fn test_assessments_and_forecast_impacts() {
    let repo = repo().await;
    let at = Utc.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap();
    let assessment = ImpactAssessment {
        assessment_id: Uuid::new_v4(),
        zone_id: "CONED-BKN".to_string(),
        territory: Territory::ConEd,
        assessed_at: at,
        forecast_hour: 0,
        overall_score: 31.2,
        overall_level: RiskLevel::Moderate,
        outage_score: 28.0,
        estimated_outages: 75,
        correction_ratio: 1.25,
        vegetation_score: 12.0,
        load_pct_capacity: 61.5,
        equipment_score: 18.0,
        melt_score: 22.0,
        jobs_mid: 117,
        snow_depth_in: 4.5,
        summary: "Brooklyn: Moderate overall risk.".to_string(),
    };
    repo.save_assessment(&assessment).await.unwrap();
    repo.save_assessment(&ImpactAssessment {
        assessment_id: Uuid::new_v4(),
        forecast_hour: 6,
        ..assessment.clone()
    })
    .await
    .unwrap();

    let current = repo
        .current_assessments_since("CONED-BKN", at - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(current, vec![assessment]);

    let point = ForecastImpactPoint {
        zone_id: "CONED-BKN".to_string(),
        forecast_for: at,
        forecast_hour: 0,
        overall_score: 31.2,
        overall_level: RiskLevel::Moderate,
        outage_score: 28.0,
        estimated_outages: 75,
        vegetation_score: 12.0,
        load_pct_capacity: 61.5,
        equipment_score: 18.0,
        melt_score: 22.0,
        snow_depth_in: 4.5,
        jobs_mid: 117,
    };
    let later = ForecastImpactPoint {
        forecast_for: at + Duration::hours(3),
        forecast_hour: 3,
        ..point.clone()
    };
    repo.replace_forecast_impacts("CONED-BKN", &[later.clone(), point.clone()])
        .await
        .unwrap();
    assert_eq!(repo.forecast_impacts("CONED-BKN").await.unwrap(), vec![point, later]);
}

#[tokio::test]
async fn test_latest_calibration_wins_and_is_clamped() {
    let repo = repo().await;
    let t0 = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();

    repo.save_calibration(&calibration("CONED-MAN", t0, 1.3)).await.unwrap();
    repo.save_calibration(&calibration("CONED-MAN", t0 + Duration::hours(12), 7.0))
        .await
        .unwrap();
    repo.save_calibration(&calibration("OR-ORA", t0, 0.05)).await.unwrap();

    let latest = repo.latest_calibration("CONED-MAN").await.unwrap().unwrap();
    assert_eq!(latest.computed_at, t0 + Duration::hours(12));
    assert_eq!(latest.correction_ratio, 3.0);
    assert_eq!(latest.wind_correlation, Some(0.82));

    let corrections = repo.latest_corrections().await.unwrap();
    assert_eq!(corrections.len(), 2);
    assert_eq!(corrections["CONED-MAN"], 3.0);
    assert_eq!(corrections["OR-ORA"], 0.3);
    assert!(repo.latest_calibration("OR-SUL").await.unwrap().is_none());
}
