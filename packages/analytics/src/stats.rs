//! Policy dashboard statistics.

use air_map_analytics_models::{
    AirQualitySummary, DashboardStats, SeverityCount, SourceBreakdown, StatusCount,
};
use air_map_database_models::{
    AirQualitySummaryRow, SeverityCountRow, SourceBreakdownRow, StatusCountRow,
};
use air_map_pollution_models::{AlertSeverity, PolicyStatus};
use chrono::{DateTime, Utc};

use crate::round_to;

/// Raw aggregates the dashboard is built from.
#[derive(Debug, Clone, Default)]
pub struct DashboardRows {
    /// PM2.5 summary.
    pub summary: AirQualitySummaryRow,
    /// Recommendations per status.
    pub statuses: Vec<StatusCountRow>,
    /// Active alerts per severity.
    pub severities: Vec<SeverityCountRow>,
    /// PM2.5 per source type.
    pub sources: Vec<SourceBreakdownRow>,
}

fn summarize(row: &AirQualitySummaryRow) -> AirQualitySummary {
    #[allow(clippy::cast_precision_loss)]
    let percent_above_threshold = if row.total_readings > 0 {
        round_to(
            row.readings_above_threshold as f64 / row.total_readings as f64 * 100.0,
            1,
        )
    } else {
        0.0
    };

    AirQualitySummary {
        total_readings: row.total_readings,
        avg_pm25: row.avg_pm25.map(|v| round_to(v, 1)),
        max_pm25: row.max_pm25,
        min_pm25: row.min_pm25,
        readings_above_threshold: row.readings_above_threshold,
        very_unhealthy_readings: row.very_unhealthy_readings,
        percent_above_threshold,
    }
}

/// Assembles dashboard statistics. Every policy status and alert severity
/// is listed, with zero counts where the database had none.
#[must_use]
pub fn build_dashboard(
    rows: &DashboardRows,
    window_hours: i64,
    now: DateTime<Utc>,
) -> DashboardStats {
    let recommendations = PolicyStatus::all()
        .iter()
        .map(|&status| {
            rows.statuses.iter().find(|r| r.status == status).map_or(
                StatusCount {
                    status,
                    count: 0,
                    avg_impact: None,
                },
                |r| StatusCount {
                    status,
                    count: r.count,
                    avg_impact: r.avg_impact.map(|v| round_to(v, 1)),
                },
            )
        })
        .collect();

    let active_alerts = AlertSeverity::all()
        .iter()
        .map(|&severity| SeverityCount {
            severity,
            count: rows
                .severities
                .iter()
                .find(|r| r.severity == severity)
                .map_or(0, |r| r.count),
        })
        .collect();

    let sources = rows
        .sources
        .iter()
        .map(|r| SourceBreakdown {
            source_type: r.source_type.clone(),
            count: r.count,
            avg_pm25: r.avg_pm25.map(|v| round_to(v, 1)),
        })
        .collect();

    DashboardStats {
        window_hours,
        air_quality: summarize(&rows.summary),
        recommendations,
        active_alerts,
        sources,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn empty_database_yields_zeroed_dashboard() {
        let stats = build_dashboard(&DashboardRows::default(), 24, Utc::now());
        assert_eq!(stats.air_quality.total_readings, 0);
        assert!(stats.air_quality.percent_above_threshold.abs() < f64::EPSILON);
        assert_eq!(stats.recommendations.len(), 4);
        assert!(stats.recommendations.iter().all(|s| s.count == 0));
        assert_eq!(stats.active_alerts.len(), 4);
        assert_eq!(stats.active_alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn counts_are_merged_and_rounded() {
        let rows = DashboardRows {
            summary: AirQualitySummaryRow {
                total_readings: 8,
                avg_pm25: Some(50.56),
                max_pm25: Some(89.5),
                min_pm25: Some(18.7),
                readings_above_threshold: 3,
                very_unhealthy_readings: 2,
            },
            statuses: vec![StatusCountRow {
                status: PolicyStatus::Approved,
                count: 2,
                avg_impact: Some(18.25),
            }],
            severities: vec![SeverityCountRow {
                severity: AlertSeverity::High,
                count: 5,
            }],
            sources: vec![SourceBreakdownRow {
                source_type: "mock".to_string(),
                count: 5,
                avg_pm25: Some(50.56),
            }],
        };

        let stats = build_dashboard(&rows, 24, Utc::now());
        assert_eq!(stats.air_quality.avg_pm25, Some(50.6));
        assert!((stats.air_quality.percent_above_threshold - 37.5).abs() < f64::EPSILON);

        let approved = stats
            .recommendations
            .iter()
            .find(|s| s.status == PolicyStatus::Approved)
            .unwrap();
        assert_eq!(approved.count, 2);
        assert_eq!(approved.avg_impact, Some(18.3));

        let high = stats
            .active_alerts
            .iter()
            .find(|s| s.severity == AlertSeverity::High)
            .unwrap();
        assert_eq!(high.count, 5);
        assert_eq!(stats.sources[0].avg_pm25, Some(50.6));
    }
}
