//! Stages and which of them run in each environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::db::{TableSpec, tables};
use crate::models::Environment;

/// One unit of seeding work, run inside the shared transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Divisions,
    Financers,
    Users,
    Modules,
    Invoices,
    Engagement,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Divisions,
        Stage::Financers,
        Stage::Users,
        Stage::Modules,
        Stage::Invoices,
        Stage::Engagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Divisions => "divisions",
            Stage::Financers => "financers",
            Stage::Users => "users",
            Stage::Modules => "modules",
            Stage::Invoices => "invoices",
            Stage::Engagement => "engagement",
        }
    }

    /// Tables emptied when the stage starts, children before parents.
    pub fn resets(&self) -> &'static [&'static TableSpec] {
        match self {
            Stage::Invoices => INVOICE_RESETS,
            _ => &[],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == name)
            .ok_or_else(|| format!("unknown stage `{name}`"))
    }
}

static INVOICE_RESETS: &[&TableSpec] = &[&tables::INVOICE_ITEMS, &tables::INVOICES];

const PRODUCTION_PLAN: &[Stage] = &[Stage::Divisions, Stage::Financers, Stage::Modules];

const STAGING_PLAN: &[Stage] = &[
    Stage::Divisions,
    Stage::Financers,
    Stage::Users,
    Stage::Modules,
    Stage::Invoices,
];

const DEV_PLAN: &[Stage] = &[
    Stage::Divisions,
    Stage::Financers,
    Stage::Users,
    Stage::Modules,
    Stage::Invoices,
    Stage::Engagement,
];

/// Ordered stages for an environment.
pub fn plan_for(env: Environment) -> Vec<Stage> {
    match env {
        Environment::Production => PRODUCTION_PLAN,
        Environment::Staging => STAGING_PLAN,
        Environment::Dev | Environment::Local => DEV_PLAN,
    }
    .to_vec()
}

/// Keeps only the stages in `only`, in plan order. An empty filter keeps all.
pub fn restrict(plan: Vec<Stage>, only: &[Stage]) -> Vec<Stage> {
    if only.is_empty() {
        return plan;
    }
    plan.into_iter().filter(|s| only.contains(s)).collect()
}
