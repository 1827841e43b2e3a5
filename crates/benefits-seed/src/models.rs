//! Domain vocabulary shared by generators and stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::calendar::add_months;

/// Deployment environment a seed run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    Staging,
    Dev,
    Local,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Dev => "dev",
            Environment::Local => "local",
        }
    }

    /// Whether catalog entries of the given tier are seeded here.
    pub fn includes(&self, tier: Tier) -> bool {
        match tier {
            Tier::Production => true,
            Tier::Staging => *self >= Environment::Staging,
            Tier::Dev => *self >= Environment::Dev,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "dev" | "development" => Ok(Environment::Dev),
            "local" => Ok(Environment::Local),
            other => Err(format!("unknown environment `{other}`")),
        }
    }
}

/// Lowest environment level at which a catalog entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Production,
    Staging,
    Dev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCategory {
    EnterpriseLife,
    Wellbeing,
    PurchasingPower,
}

impl ModuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleCategory::EnterpriseLife => "enterprise_life",
            ModuleCategory::Wellbeing => "wellbeing",
            ModuleCategory::PurchasingPower => "purchasing_power",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceType {
    /// Platform bills a division.
    PlatformToDivision,
    /// Division bills one of its financers.
    DivisionToFinancer,
}

impl InvoiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceType::PlatformToDivision => "hexeko_to_division",
            InvoiceType::DivisionToFinancer => "division_to_financer",
        }
    }

    /// Prefix of generated invoice numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            InvoiceType::PlatformToDivision => "HEX",
            InvoiceType::DivisionToFinancer => "DIV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Confirmed,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Confirmed => "confirmed",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceItemType {
    CorePackage,
    Module,
}

impl InvoiceItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceItemType::CorePackage => "core_package",
            InvoiceItemType::Module => "module",
        }
    }
}

/// Reporting window of an engagement metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricPeriod {
    SevenDays,
    ThirtyDays,
    ThreeMonths,
}

impl MetricPeriod {
    pub const ALL: [MetricPeriod; 3] = [
        MetricPeriod::SevenDays,
        MetricPeriod::ThirtyDays,
        MetricPeriod::ThreeMonths,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricPeriod::SevenDays => "7_days",
            MetricPeriod::ThirtyDays => "30_days",
            MetricPeriod::ThreeMonths => "3_months",
        }
    }

    /// Inclusive date range ending at `reference`.
    pub fn date_range(&self, reference: Date) -> (Date, Date) {
        let from = match self {
            MetricPeriod::SevenDays => reference - Duration::days(7),
            MetricPeriod::ThirtyDays => reference - Duration::days(30),
            MetricPeriod::ThreeMonths => add_months(reference, -3),
        };
        (from, reference)
    }
}

/// Kinds of aggregated metrics produced per financer and period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    ActiveBeneficiaries,
    ActivationRate,
    SessionTime,
    ModuleUsage,
    ArticleViewed,
    VoucherPurchases,
    BounceRate,
    TopModules,
}

impl MetricKind {
    pub const ALL: [MetricKind; 8] = [
        MetricKind::ActiveBeneficiaries,
        MetricKind::ActivationRate,
        MetricKind::SessionTime,
        MetricKind::ModuleUsage,
        MetricKind::ArticleViewed,
        MetricKind::VoucherPurchases,
        MetricKind::BounceRate,
        MetricKind::TopModules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::ActiveBeneficiaries => "financer_active_beneficiaries",
            MetricKind::ActivationRate => "financer_activation_rate",
            MetricKind::SessionTime => "financer_session_time",
            MetricKind::ModuleUsage => "financer_module_usage",
            MetricKind::ArticleViewed => "financer_article_viewed",
            MetricKind::VoucherPurchases => "financer_voucher_purchases",
            MetricKind::BounceRate => "financer_bounce_rate",
            MetricKind::TopModules => "financer_top_modules",
        }
    }
}

/// Event names written to the engagement log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementEvent {
    SessionStarted,
    SessionFinished,
    ModuleAccessed,
    ArticleViewed,
}

impl EngagementEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementEvent::SessionStarted => "SessionStarted",
            EngagementEvent::SessionFinished => "SessionFinished",
            EngagementEvent::ModuleAccessed => "ModuleAccessed",
            EngagementEvent::ArticleViewed => "ArticleViewed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Like,
    Love,
    Celebrate,
    Insightful,
    Laugh,
    Surprised,
    Sad,
    Dislike,
}

impl Reaction {
    pub const ALL: [Reaction; 8] = [
        Reaction::Like,
        Reaction::Love,
        Reaction::Celebrate,
        Reaction::Insightful,
        Reaction::Laugh,
        Reaction::Surprised,
        Reaction::Sad,
        Reaction::Dislike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Love => "love",
            Reaction::Celebrate => "celebrate",
            Reaction::Insightful => "insightful",
            Reaction::Laugh => "laugh",
            Reaction::Surprised => "surprised",
            Reaction::Sad => "sad",
            Reaction::Dislike => "dislike",
        }
    }
}
