//! Demo article shells and reader interactions.

use rand::Rng;
use rand::seq::SliceRandom;
use time::{Duration, OffsetDateTime, Time};
use uuid::Uuid;

use crate::db::{Record, Row, TableSpec, tables};
use crate::errors::SeedError;
use crate::generators::sampling::{self, DayOffset};
use crate::models::Reaction;

/// Content-free article placeholder; interactions need something to point at.
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub financer_id: Uuid,
    pub title: String,
    pub published_at: OffsetDateTime,
}

impl Record for ArticleRecord {
    const TABLE: &'static TableSpec = &tables::ARTICLES;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.financer_id.into(),
            self.title.into(),
            self.published_at.into(),
            self.published_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ArticleInteractionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub article_id: Uuid,
    pub reaction: Reaction,
    pub is_favorite: bool,
    pub created_at: OffsetDateTime,
}

impl Record for ArticleInteractionRecord {
    const TABLE: &'static TableSpec = &tables::ARTICLE_INTERACTIONS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.user_id.into(),
            self.article_id.into(),
            self.reaction.as_str().into(),
            self.is_favorite.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ArticleGenConfig {
    pub articles_per_financer: usize,
    /// Percentage range of a financer's users reacting to each article.
    pub interaction_rate: (u32, u32),
    /// Percentage of interactions marked as favourite.
    pub favorite_percent: u32,
    /// Oldest interaction, in days.
    pub history_days: u32,
    pub day_offset: DayOffset,
}

impl Default for ArticleGenConfig {
    fn default() -> Self {
        Self {
            articles_per_financer: 6,
            interaction_rate: (5, 30),
            favorite_percent: 20,
            history_days: 365,
            day_offset: DayOffset::default(),
        }
    }
}

pub struct ArticleGenerator {
    config: ArticleGenConfig,
}

impl ArticleGenerator {
    pub fn new() -> Self {
        Self {
            config: ArticleGenConfig::default(),
        }
    }

    pub fn with_config(config: ArticleGenConfig) -> Self {
        Self { config }
    }

    /// Generates the article shells of one financer.
    pub fn generate_articles(
        &self,
        financer_id: Uuid,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Vec<ArticleRecord> {
        (0..self.config.articles_per_financer)
            .map(|i| ArticleRecord {
                id: sampling::uuid(rng),
                financer_id,
                title: format!("Demo article {}", i + 1),
                published_at: now
                    - Duration::days(rng.gen_range(0..=i64::from(self.config.history_days))),
            })
            .collect()
    }

    /// Generates historical reactions of `users` to one article.
    ///
    /// Each article draws its own interaction rate; reacting users are
    /// distinct, and timestamps favour recent days.
    pub fn generate_interactions(
        &self,
        article_id: Uuid,
        users: &[Uuid],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Result<Vec<ArticleInteractionRecord>, SeedError> {
        let (low, high) = self.config.interaction_rate;
        let rate = rng.gen_range(low..=high.max(low));
        let amount = users.len() * rate as usize / 100;

        sampling::pick_many(users, amount, rng)
            .into_iter()
            .map(|&user_id| self.interaction(article_id, user_id, now, rng))
            .collect()
    }

    /// Generates one reaction at a recency-biased time during working hours.
    pub fn interaction(
        &self,
        article_id: Uuid,
        user_id: Uuid,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Result<ArticleInteractionRecord, SeedError> {
        let days_ago = self.config.day_offset.sample(self.config.history_days, rng)?;
        let time = Time::from_hms(rng.gen_range(8..=18), rng.gen_range(0..60), rng.gen_range(0..60))
            .map_err(|e| SeedError::precondition(e.to_string()))?;
        let created_at = (now - Duration::days(i64::from(days_ago))).replace_time(time);

        let reaction = *Reaction::ALL
            .choose(rng)
            .ok_or_else(|| SeedError::precondition("no reactions defined"))?;

        Ok(ArticleInteractionRecord {
            id: sampling::uuid(rng),
            user_id,
            article_id,
            reaction,
            is_favorite: sampling::percent(self.config.favorite_percent, rng),
            created_at,
        })
    }
}

impl Default for ArticleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_interactions_are_distinct_users() {
        let article_gen = ArticleGenerator::new();
        let mut rng = StdRng::seed_from_u64(11);
        let users: Vec<Uuid> = (0..400).map(|_| Uuid::new_v4()).collect();

        let interactions = article_gen
            .generate_interactions(Uuid::new_v4(), &users, OffsetDateTime::now_utc(), &mut rng)
            .unwrap();

        assert!(interactions.len() >= 400 * 5 / 100);
        assert!(interactions.len() <= 400 * 30 / 100);
        let distinct: std::collections::HashSet<_> =
            interactions.iter().map(|i| i.user_id).collect();
        assert_eq!(distinct.len(), interactions.len());
    }

    #[test]
    fn test_interaction_hours() {
        let article_gen = ArticleGenerator::new();
        let mut rng = StdRng::seed_from_u64(5);
        let now = OffsetDateTime::now_utc();
        for _ in 0..100 {
            let i = article_gen
                .interaction(Uuid::new_v4(), Uuid::new_v4(), now, &mut rng)
                .unwrap();
            assert!((8..=18).contains(&i.created_at.hour()));
            assert!(i.created_at <= now + Duration::days(1));
        }
    }

    #[test]
    fn test_no_users_no_interactions() {
        let article_gen = ArticleGenerator::new();
        let mut rng = StdRng::seed_from_u64(5);
        let interactions = article_gen
            .generate_interactions(Uuid::new_v4(), &[], OffsetDateTime::now_utc(), &mut rng)
            .unwrap();
        assert!(interactions.is_empty());
    }
}
