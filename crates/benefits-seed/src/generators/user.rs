//! Beneficiary generation: invitations, registered users, and financer links.

use fake::Fake;
use fake::faker::internet::en::{IPv4, UserAgent};
use fake::faker::name::en::{FirstName, LastName};
use rand::Rng;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::db::{Record, Row, TableSpec, tables};
use crate::generators::sampling;

/// Registered user ready for insertion.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub locale: &'static str,
    pub currency: &'static str,
    pub timezone: &'static str,
    pub sirh_id: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl Record for UserRecord {
    const TABLE: &'static TableSpec = &tables::USERS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.email.into(),
            self.first_name.into(),
            self.last_name.into(),
            self.locale.into(),
            self.currency.into(),
            self.timezone.into(),
            true.into(),
            self.sirh_id.into(),
            self.created_at.into(),
            self.created_at.into(),
        ]
    }
}

/// Membership of a user in a financer.
#[derive(Debug, Clone)]
pub struct FinancerUserRecord {
    pub id: Uuid,
    pub financer_id: Uuid,
    pub user_id: Uuid,
    pub active: bool,
    pub created_at: OffsetDateTime,
}

impl Record for FinancerUserRecord {
    const TABLE: &'static TableSpec = &tables::FINANCER_USER;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.financer_id.into(),
            self.user_id.into(),
            self.active.into(),
            self.created_at.into(),
            self.created_at.into(),
            self.created_at.into(),
        ]
    }
}

/// Audit trail entry for an invitation.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub event: &'static str,
    pub auditable_type: &'static str,
    pub auditable_id: Uuid,
    pub financer_id: Uuid,
    pub new_values: serde_json::Value,
    pub ip_address: String,
    pub user_agent: String,
    pub created_at: OffsetDateTime,
}

impl Record for AuditRecord {
    const TABLE: &'static TableSpec = &tables::AUDITS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.event.into(),
            self.auditable_type.into(),
            self.auditable_id.into(),
            self.financer_id.into(),
            self.new_values.into(),
            self.ip_address.into(),
            self.user_agent.into(),
            self.created_at.into(),
        ]
    }
}

/// One invited person and, when they registered, their user and membership.
#[derive(Debug, Clone)]
pub struct GeneratedBeneficiary {
    pub invitation: AuditRecord,
    pub registration: Option<(UserRecord, FinancerUserRecord)>,
}

/// Configuration for beneficiary generation.
#[derive(Debug, Clone)]
pub struct UserGenConfig {
    /// How far back invitations go, in days.
    pub invitation_window_days: i64,
    pub locale: &'static str,
    pub currency: &'static str,
    pub timezone: &'static str,
}

impl Default for UserGenConfig {
    fn default() -> Self {
        Self {
            invitation_window_days: 365,
            locale: "en-US",
            currency: "EUR",
            timezone: "Europe/Brussels",
        }
    }
}

/// Generates invited and registered beneficiaries for a financer.
pub struct UserGenerator {
    config: UserGenConfig,
}

impl UserGenerator {
    pub fn new() -> Self {
        Self {
            config: UserGenConfig::default(),
        }
    }

    pub fn with_config(config: UserGenConfig) -> Self {
        Self { config }
    }

    /// Generates the `index`-th beneficiary of a financer.
    ///
    /// Timestamps are ordered: invitation, then registration, then
    /// membership, all at or before `now`.
    pub fn generate(
        &self,
        financer_id: Uuid,
        index: usize,
        registered: bool,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> GeneratedBeneficiary {
        let first_name: String = FirstName().fake_with_rng(rng);
        let last_name: String = LastName().fake_with_rng(rng);
        let email = self.generate_email(&first_name, &last_name, financer_id, index);

        let invited_days_ago = rng.gen_range(0..=self.config.invitation_window_days);
        let invited_at = now - Duration::days(invited_days_ago);

        let invitation = AuditRecord {
            id: sampling::uuid(rng),
            event: "created",
            auditable_type: "invited_user",
            auditable_id: sampling::uuid(rng),
            financer_id,
            new_values: json!({
                "financer_id": financer_id,
                "first_name": first_name,
                "last_name": last_name,
                "email": email,
            }),
            ip_address: IPv4().fake_with_rng(rng),
            user_agent: UserAgent().fake_with_rng(rng),
            created_at: invited_at,
        };

        let registration = registered.then(|| {
            let user_days_ago = rng.gen_range(0..=invited_days_ago);
            let user_created_at = now - Duration::days(user_days_ago);
            let pivot_created_at = now - Duration::days(rng.gen_range(0..=user_days_ago));

            let user = UserRecord {
                id: sampling::uuid(rng),
                email,
                first_name,
                last_name,
                locale: self.config.locale,
                currency: self.config.currency,
                timezone: self.config.timezone,
                sirh_id: json!({ "platform": "aws", "id": sampling::uuid(rng) }),
                created_at: user_created_at,
            };
            let membership = FinancerUserRecord {
                id: sampling::uuid(rng),
                financer_id,
                user_id: user.id,
                active: true,
                created_at: pivot_created_at,
            };
            (user, membership)
        });

        GeneratedBeneficiary {
            invitation,
            registration,
        }
    }

    /// Emails are unique per (financer, index) so re-generation never collides
    /// with another financer's users.
    fn generate_email(&self, first: &str, last: &str, financer_id: Uuid, index: usize) -> String {
        let normalized: String = format!("{first}.{last}")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect();
        format!("{normalized}.{index}@{}.example.com", financer_id.simple())
    }
}

impl Default for UserGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_timestamps_ordered() {
        let user_gen = UserGenerator::new();
        let mut rng = rand::thread_rng();
        let now = OffsetDateTime::now_utc();

        for i in 0..50 {
            let b = user_gen.generate(Uuid::new_v4(), i, true, now, &mut rng);
            let (user, membership) = b.registration.expect("registered");
            assert!(b.invitation.created_at <= user.created_at);
            assert!(user.created_at <= membership.created_at);
            assert!(membership.created_at <= now);
            assert_eq!(membership.user_id, user.id);
        }
    }

    #[test]
    fn test_invited_only() {
        let user_gen = UserGenerator::new();
        let mut rng = rand::thread_rng();
        let b = user_gen.generate(Uuid::new_v4(), 0, false, OffsetDateTime::now_utc(), &mut rng);

        assert!(b.registration.is_none());
        assert!(!b.invitation.ip_address.is_empty());
    }

    #[test]
    fn test_emails_unique_per_index() {
        let user_gen = UserGenerator::new();
        let mut rng = rand::thread_rng();
        let financer = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let emails: std::collections::HashSet<String> = (0..200)
            .filter_map(|i| user_gen.generate(financer, i, true, now, &mut rng).registration)
            .map(|(u, _)| u.email)
            .collect();
        assert_eq!(emails.len(), 200);
    }

    #[test]
    fn test_emails_differ_across_catalog_financers() {
        use crate::generators::catalog::FINANCERS;
        use rand::SeedableRng;

        let user_gen = UserGenerator::new();
        let now = OffsetDateTime::now_utc();

        // Same draws for every financer, so only the domain can tell them apart.
        let emails: std::collections::HashSet<String> = FINANCERS
            .iter()
            .filter_map(|f| {
                let mut rng = rand::rngs::StdRng::seed_from_u64(7);
                user_gen.generate(f.id, 7, true, now, &mut rng).registration
            })
            .map(|(u, _)| u.email)
            .collect();
        assert_eq!(emails.len(), FINANCERS.len());
    }
}
