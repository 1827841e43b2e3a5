//! Engagement logs (sessions, module access) and aggregated period metrics.

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Map, json};
use time::{Date, Duration, OffsetDateTime, Time, Weekday};
use uuid::Uuid;

use crate::db::{Record, Row, TableSpec, tables};
use crate::errors::SeedError;
use crate::generators::sampling;
use crate::models::{EngagementEvent, MetricKind, MetricPeriod};

#[derive(Debug, Clone)]
pub struct EngagementLogRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event: EngagementEvent,
    pub target: Option<String>,
    pub metadata: serde_json::Value,
    pub logged_at: OffsetDateTime,
}

impl Record for EngagementLogRecord {
    const TABLE: &'static TableSpec = &tables::ENGAGEMENT_LOGS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.user_id.into(),
            self.event.as_str().into(),
            self.target.into(),
            self.metadata.into(),
            self.logged_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct EngagementMetricRecord {
    pub id: Uuid,
    pub financer_id: Uuid,
    pub metric: MetricKind,
    pub period: MetricPeriod,
    pub date_from: Date,
    pub date_to: Date,
    pub data: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl Record for EngagementMetricRecord {
    const TABLE: &'static TableSpec = &tables::ENGAGEMENT_METRICS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.financer_id.into(),
            self.metric.as_str().into(),
            self.period.as_str().into(),
            self.date_from.into(),
            self.date_to.into(),
            self.data.into(),
            self.created_at.into(),
        ]
    }
}

const WEEKDAY_HOURS: [(u8, u8); 4] = [(8, 10), (11, 13), (14, 17), (19, 21)];
const WEEKEND_HOURS: [(u8, u8); 3] = [(9, 11), (14, 16), (19, 21)];

/// Configuration for session generation.
#[derive(Debug, Clone)]
pub struct SessionGenConfig {
    /// Days of history, ending today.
    pub window_days: i64,
    pub max_weekday_sessions: u32,
    pub max_weekend_sessions: u32,
    /// Percentage of sessions that carry a session id.
    pub session_id_percent: u32,
    /// Percentage of sessions that open a module.
    pub module_access_percent: u32,
}

impl Default for SessionGenConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            max_weekday_sessions: 3,
            max_weekend_sessions: 2,
            session_id_percent: 95,
            module_access_percent: 60,
        }
    }
}

/// Generates login sessions for a user.
pub struct SessionGenerator {
    config: SessionGenConfig,
}

impl SessionGenerator {
    pub fn new() -> Self {
        Self {
            config: SessionGenConfig::default(),
        }
    }

    pub fn with_config(config: SessionGenConfig) -> Self {
        Self { config }
    }

    /// Generates every session event of a user over the configured window.
    ///
    /// Each session yields a `SessionStarted` and a `SessionFinished` log
    /// sharing the same session id, and sometimes a `ModuleAccessed` log
    /// in between.
    pub fn generate_for_user(
        &self,
        user_id: Uuid,
        financer_id: Uuid,
        module_keys: &[&'static str],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<EngagementLogRecord>, SeedError> {
        let mut logs = Vec::new();
        let today = now.date();

        for offset in (0..=self.config.window_days).rev() {
            let day = today - Duration::days(offset);
            let weekend = matches!(day.weekday(), Weekday::Saturday | Weekday::Sunday);
            let max = if weekend {
                self.config.max_weekend_sessions
            } else {
                self.config.max_weekday_sessions
            };

            for _ in 0..rng.gen_range(0..=max) {
                self.session(&mut logs, user_id, financer_id, module_keys, day, weekend, rng)?;
            }
        }

        Ok(logs)
    }

    #[allow(clippy::too_many_arguments)]
    fn session(
        &self,
        logs: &mut Vec<EngagementLogRecord>,
        user_id: Uuid,
        financer_id: Uuid,
        module_keys: &[&'static str],
        day: Date,
        weekend: bool,
        rng: &mut impl Rng,
    ) -> Result<(), SeedError> {
        let windows: &[(u8, u8)] = if weekend { &WEEKEND_HOURS } else { &WEEKDAY_HOURS };
        let &(from, to) = sampling::pick(windows, "hour windows", rng)?;
        let start_time = Time::from_hms(rng.gen_range(from..=to), rng.gen_range(0..60), rng.gen_range(0..60))
            .map_err(|e| SeedError::precondition(e.to_string()))?;
        let start = day.with_time(start_time).assume_utc();
        let end = start + session_duration(rng);

        let session_id = sampling::percent(self.config.session_id_percent, rng)
            .then(|| sampling::uuid(rng));

        let metadata = |extra: Option<(&str, serde_json::Value)>| {
            let mut map = Map::new();
            map.insert("financer_id".into(), json!(financer_id));
            if let Some(id) = session_id {
                map.insert("session_id".into(), json!(id));
            }
            if let Some((k, v)) = extra {
                map.insert(k.into(), v);
            }
            serde_json::Value::Object(map)
        };

        logs.push(EngagementLogRecord {
            id: sampling::uuid(rng),
            user_id,
            event: EngagementEvent::SessionStarted,
            target: None,
            metadata: metadata(None),
            logged_at: start,
        });

        if !module_keys.is_empty() && sampling::percent(self.config.module_access_percent, rng) {
            let module = *sampling::pick(module_keys, "modules", rng)?;
            let span = (end - start).whole_seconds().max(1);
            logs.push(EngagementLogRecord {
                id: sampling::uuid(rng),
                user_id,
                event: EngagementEvent::ModuleAccessed,
                target: Some(module.to_string()),
                metadata: metadata(Some(("module", json!(module)))),
                logged_at: start + Duration::seconds(rng.gen_range(0..span)),
            });
        }

        let duration_minutes = (end - start).whole_seconds() as f64 / 60.0;
        logs.push(EngagementLogRecord {
            id: sampling::uuid(rng),
            user_id,
            event: EngagementEvent::SessionFinished,
            target: None,
            metadata: metadata(Some((
                "duration_minutes",
                json!((duration_minutes * 100.0).round() / 100.0),
            ))),
            logged_at: end,
        });

        Ok(())
    }
}

impl Default for SessionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Session length mix: 3% under five minutes, 65% 5-20 minutes, 25% 20-60,
/// 5% one to two hours, 2% over eight hours.
pub fn session_duration(rng: &mut impl Rng) -> Duration {
    match rng.gen_range(1..=100) {
        1..=3 => Duration::seconds(rng.gen_range(1..=4) * 60 + rng.gen_range(0..60)),
        4..=68 => Duration::minutes(rng.gen_range(5..=20)),
        69..=93 => Duration::minutes(rng.gen_range(20..=60)),
        94..=98 => Duration::minutes(rng.gen_range(60..=120)),
        _ => Duration::minutes(rng.gen_range(481..=600)),
    }
}

/// Population figures a financer's metrics are derived from.
#[derive(Debug, Clone, Copy)]
pub struct Population {
    pub registered: u64,
    pub invited: u64,
}

/// Generates aggregated metrics for every period and metric kind.
pub struct MetricGenerator;

impl MetricGenerator {
    pub fn generate(
        financer_id: Uuid,
        population: Population,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Vec<EngagementMetricRecord> {
        let mut metrics = Vec::with_capacity(MetricPeriod::ALL.len() * MetricKind::ALL.len());

        for period in MetricPeriod::ALL {
            let (date_from, date_to) = period.date_range(now.date());
            let active_rate = 0.7 + f64::from(rng.gen_range(-10..=10_i32)) / 100.0;
            let active = (population.registered as f64 * active_rate) as u64;

            for metric in MetricKind::ALL {
                metrics.push(EngagementMetricRecord {
                    id: sampling::uuid(rng),
                    financer_id,
                    metric,
                    period,
                    date_from,
                    date_to,
                    data: metric_payload(metric, population, active, rng),
                    created_at: now,
                });
            }
        }

        metrics
    }
}

fn metric_payload(
    metric: MetricKind,
    population: Population,
    active: u64,
    rng: &mut impl Rng,
) -> serde_json::Value {
    match metric {
        MetricKind::ActiveBeneficiaries => json!({
            "total": active,
            "new": rng.gen_range(5..=50),
            "returning": active.saturating_sub(rng.gen_range(5..=50)),
            "growth_rate": f64::from(rng.gen_range(-5..=15_i32)) / 100.0,
        }),
        MetricKind::ActivationRate => {
            let rate = if population.invited == 0 {
                0.0
            } else {
                (population.registered as f64 / population.invited as f64 * 1000.0).round() / 10.0
            };
            json!({
                "rate": rate,
                "total_users": population.invited,
                "activated_users": population.registered,
            })
        }
        MetricKind::SessionTime => {
            let median: i64 = rng.gen_range(10..=25);
            json!({
                "median_minutes": median,
                "average_minutes": median + rng.gen_range(-2..=3),
                "total_sessions": active * rng.gen_range(20..=100),
            })
        }
        MetricKind::ModuleUsage => {
            let usage = [
                ("vouchers", rng.gen_range(30..=60)),
                ("hr_tools", rng.gen_range(20..=40)),
                ("internal_communication", rng.gen_range(40..=70)),
                ("benefits", rng.gen_range(15..=35)),
                ("surveys", rng.gen_range(10..=25)),
            ];
            let modules: Map<String, serde_json::Value> = usage
                .into_iter()
                .map(|(name, pct): (&str, u64)| {
                    let unique = active * pct / 100;
                    (
                        name.to_string(),
                        json!({
                            "unique_users": unique,
                            "total_uses": unique * rng.gen_range(10..=50),
                            "percentage": pct,
                        }),
                    )
                })
                .collect();
            json!({ "modules": modules })
        }
        MetricKind::ArticleViewed => {
            let views: u64 = rng.gen_range(500..=2000);
            let clicks: u64 = rng.gen_range(200..=800);
            json!({
                "articles": {
                    "views": views,
                    "unique_users": views * 7 / 10,
                    "likes": views * 15 / 100,
                },
                "tools": {
                    "clicks": clicks,
                    "unique_users": clicks * 8 / 10,
                },
                "total_interactions": views + clicks,
            })
        }
        MetricKind::VoucherPurchases => {
            let count: u64 = rng.gen_range(50..=300);
            let average: u64 = rng.gen_range(20..=100);
            json!({
                "total_amount": count * average,
                "count": count,
                "average_amount": average,
                "unique_buyers": count * 8 / 10,
            })
        }
        MetricKind::BounceRate => {
            let rate: u64 = rng.gen_range(5..=20);
            let sessions = active * rng.gen_range(20..=100);
            json!({
                "rate": rate,
                "total_sessions": sessions,
                "bounced_sessions": sessions * rate / 100,
            })
        }
        MetricKind::TopModules => {
            let mut modules = vec![
                json!({ "name": "vouchers", "usage_rate": rng.gen_range(40..=70) }),
                json!({ "name": "internal_communication", "usage_rate": rng.gen_range(35..=65) }),
                json!({ "name": "hr_tools", "usage_rate": rng.gen_range(25..=50) }),
                json!({ "name": "benefits", "usage_rate": rng.gen_range(20..=40) }),
                json!({ "name": "surveys", "usage_rate": rng.gen_range(15..=30) }),
            ];
            modules.shuffle(rng);
            modules.sort_by_key(|m| std::cmp::Reverse(m["usage_rate"].as_u64().unwrap_or(0)));
            json!({ "modules": modules })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_sessions_pair_up() {
        let session_gen = SessionGenerator::new();
        let mut rng = StdRng::seed_from_u64(21);
        let logs = session_gen
            .generate_for_user(
                Uuid::new_v4(),
                Uuid::new_v4(),
                &["vouchers", "wellness"],
                OffsetDateTime::now_utc(),
                &mut rng,
            )
            .unwrap();

        let started = logs
            .iter()
            .filter(|l| l.event == EngagementEvent::SessionStarted)
            .count();
        let finished = logs
            .iter()
            .filter(|l| l.event == EngagementEvent::SessionFinished)
            .count();
        assert_eq!(started, finished);
        assert!(started > 0);
    }

    #[test]
    fn test_session_ids_shared_between_start_and_finish() {
        let session_gen = SessionGenerator::with_config(SessionGenConfig {
            module_access_percent: 0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(3);
        let logs = session_gen
            .generate_for_user(Uuid::new_v4(), Uuid::new_v4(), &[], OffsetDateTime::now_utc(), &mut rng)
            .unwrap();

        for pair in logs.chunks(2) {
            assert_eq!(pair[0].event, EngagementEvent::SessionStarted);
            assert_eq!(pair[1].event, EngagementEvent::SessionFinished);
            assert_eq!(pair[0].metadata.get("session_id"), pair[1].metadata.get("session_id"));
            assert!(pair[0].logged_at < pair[1].logged_at);
        }
    }

    #[test]
    fn test_duration_mix_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..1000 {
            let d = session_duration(&mut rng);
            assert!(d >= Duration::minutes(1));
            assert!(d <= Duration::minutes(600));
        }
    }

    #[test]
    fn test_metrics_cover_every_period_and_kind() {
        let mut rng = StdRng::seed_from_u64(4);
        let metrics = MetricGenerator::generate(
            Uuid::new_v4(),
            Population {
                registered: 100,
                invited: 115,
            },
            OffsetDateTime::now_utc(),
            &mut rng,
        );
        assert_eq!(metrics.len(), 24);

        let activation = metrics
            .iter()
            .find(|m| m.metric == MetricKind::ActivationRate)
            .unwrap();
        assert_eq!(activation.data["rate"], json!(87.0));
        assert!(metrics.iter().all(|m| m.date_from < m.date_to));
    }
}
