//! Fixed reference data: divisions, financers, modules, and module links.
//!
//! Every catalog entry has a stable id so re-seeding the same environment
//! produces the same rows, and ignore-conflicts writes make the reference
//! stages safe to repeat.

use rand::Rng;
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{Record, Row, TableSpec, tables};
use crate::generators::sampling;
use crate::models::{Environment, ModuleCategory, Tier};

/// A division groups financers under one billing parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Division {
    pub id: Uuid,
    pub name: &'static str,
    pub country: &'static str,
    pub currency: &'static str,
}

/// A tenant organization buying benefits for its employees.
#[derive(Debug, Clone, PartialEq)]
pub struct Financer {
    pub id: Uuid,
    pub division_id: Uuid,
    pub name: &'static str,
    pub timezone: &'static str,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: Uuid,
    pub key: &'static str,
    pub name_en: &'static str,
    pub name_fr: &'static str,
    pub category: ModuleCategory,
    pub is_core: bool,
}

pub const DIVISIONS: &[Division] = &[
    Division {
        id: Uuid::from_u128(0x0198_0000_0000_7000_8000_0000_0000_0001),
        name: "Benelux",
        country: "BE",
        currency: "EUR",
    },
    Division {
        id: Uuid::from_u128(0x0198_0000_0000_7000_8000_0000_0000_0002),
        name: "France",
        country: "FR",
        currency: "EUR",
    },
];

pub const FINANCERS: &[Financer] = &[
    Financer {
        id: Uuid::from_u128(0x0198_0000_0001_7000_8000_0000_0000_0001),
        division_id: DIVISIONS[0].id,
        name: "Acme Logistics",
        timezone: "Europe/Brussels",
        tier: Tier::Production,
    },
    Financer {
        id: Uuid::from_u128(0x0198_0000_0001_7000_8000_0000_0000_0002),
        division_id: DIVISIONS[1].id,
        name: "Boulangeries Réunies",
        timezone: "Europe/Paris",
        tier: Tier::Production,
    },
    Financer {
        id: Uuid::from_u128(0x0198_0000_0001_7000_8000_0000_0000_0003),
        division_id: DIVISIONS[0].id,
        name: "Staging Retail Group",
        timezone: "Europe/Brussels",
        tier: Tier::Staging,
    },
    Financer {
        id: Uuid::from_u128(0x0198_0000_0001_7000_8000_0000_0000_0004),
        division_id: DIVISIONS[1].id,
        name: "Staging Health Partners",
        timezone: "Europe/Paris",
        tier: Tier::Staging,
    },
    Financer {
        id: Uuid::from_u128(0x0198_0000_0001_7000_8000_0000_0000_0005),
        division_id: DIVISIONS[0].id,
        name: "Demo Financer",
        timezone: "Europe/Brussels",
        tier: Tier::Dev,
    },
];

pub const MODULES: &[Module] = &[
    Module {
        id: Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440001),
        key: "internal_link",
        name_en: "Internal Link",
        name_fr: "Lien Interne",
        category: ModuleCategory::EnterpriseLife,
        is_core: true,
    },
    Module {
        id: Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440002),
        key: "internal_communication",
        name_en: "Internal Communication",
        name_fr: "Communication Interne",
        category: ModuleCategory::EnterpriseLife,
        is_core: true,
    },
    Module {
        id: Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440003),
        key: "wellness",
        name_en: "Wellness",
        name_fr: "Bien-être",
        category: ModuleCategory::Wellbeing,
        is_core: false,
    },
    Module {
        id: Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440004),
        key: "vouchers",
        name_en: "Vouchers",
        name_fr: "Bons d'achat",
        category: ModuleCategory::PurchasingPower,
        is_core: false,
    },
    Module {
        id: Uuid::from_u128(0x019a7c8a_9e05_737b_93ce_fa3299d62ba7),
        key: "survey",
        name_en: "Survey",
        name_fr: "Sondage",
        category: ModuleCategory::EnterpriseLife,
        is_core: true,
    },
];

/// Financers seeded in an environment, in catalog order.
pub fn financers_for(env: Environment) -> Vec<Financer> {
    FINANCERS
        .iter()
        .filter(|f| env.includes(f.tier))
        .cloned()
        .collect()
}

/// Divisions that at least one seeded financer belongs to, plus every
/// division when the environment seeds no financer at all.
pub fn divisions_for(env: Environment) -> Vec<Division> {
    let financers = financers_for(env);
    let used: Vec<Division> = DIVISIONS
        .iter()
        .filter(|d| financers.iter().any(|f| f.division_id == d.id))
        .cloned()
        .collect();
    if used.is_empty() {
        DIVISIONS.to_vec()
    } else {
        used
    }
}

#[derive(Debug, Clone)]
pub struct DivisionRecord {
    pub division: Division,
    pub created_at: OffsetDateTime,
}

impl Record for DivisionRecord {
    const TABLE: &'static TableSpec = &tables::DIVISIONS;

    fn into_row(self) -> Row {
        let d = self.division;
        vec![
            d.id.into(),
            d.name.into(),
            d.country.into(),
            d.currency.into(),
            self.created_at.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct FinancerRecord {
    pub financer: Financer,
    pub created_at: OffsetDateTime,
}

impl Record for FinancerRecord {
    const TABLE: &'static TableSpec = &tables::FINANCERS;

    fn into_row(self) -> Row {
        let f = self.financer;
        vec![
            f.id.into(),
            f.division_id.into(),
            f.name.into(),
            f.timezone.into(),
            "active".into(),
            self.created_at.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ModuleRecord {
    pub module: Module,
    pub created_at: OffsetDateTime,
}

impl Record for ModuleRecord {
    const TABLE: &'static TableSpec = &tables::MODULES;

    fn into_row(self) -> Row {
        let m = self.module;
        vec![
            m.id.into(),
            json!({ "en": m.name_en, "fr": m.name_fr }).into(),
            json!({ "en": format!("This module is about {}", m.name_en.to_lowercase()) }).into(),
            m.category.as_str().into(),
            m.is_core.into(),
            self.created_at.into(),
            self.created_at.into(),
        ]
    }
}

/// Which pivot a module link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOwner {
    Division(Uuid),
    Financer(Uuid),
}

/// Activation of a module for a division or a financer.
#[derive(Debug, Clone)]
pub struct ModuleLinkRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub module_id: Uuid,
    pub active: bool,
    /// Cents per beneficiary; core modules are never priced.
    pub price_per_beneficiary: Option<i64>,
    pub created_at: OffsetDateTime,
}

/// Row for `division_module`.
#[derive(Debug, Clone)]
pub struct DivisionModuleRecord(pub ModuleLinkRecord);

/// Row for `financer_module`.
#[derive(Debug, Clone)]
pub struct FinancerModuleRecord(pub ModuleLinkRecord);

fn link_row(link: ModuleLinkRecord) -> Row {
    vec![
        link.id.into(),
        link.owner_id.into(),
        link.module_id.into(),
        link.active.into(),
        link.price_per_beneficiary.into(),
        link.created_at.into(),
    ]
}

impl Record for DivisionModuleRecord {
    const TABLE: &'static TableSpec = &tables::DIVISION_MODULE;

    fn into_row(self) -> Row {
        link_row(self.0)
    }
}

impl Record for FinancerModuleRecord {
    const TABLE: &'static TableSpec = &tables::FINANCER_MODULE;

    fn into_row(self) -> Row {
        link_row(self.0)
    }
}

/// Prices applied when activating non-core modules.
#[derive(Debug, Clone, Copy)]
pub struct LinkPricing {
    pub division_cents: i64,
    pub financer_cents: i64,
}

impl Default for LinkPricing {
    fn default() -> Self {
        Self {
            division_cents: 100,
            financer_cents: 200,
        }
    }
}

/// Builds active module links for divisions and financers.
pub struct ModuleLinkGenerator {
    pricing: LinkPricing,
}

impl ModuleLinkGenerator {
    pub fn new() -> Self {
        Self {
            pricing: LinkPricing::default(),
        }
    }

    pub fn with_pricing(pricing: LinkPricing) -> Self {
        Self { pricing }
    }

    /// Links one module to one owner.
    ///
    /// The row id is random; idempotence comes from the (owner, module)
    /// unique key together with ignore-conflicts writes.
    pub fn link(
        &self,
        owner: LinkOwner,
        module: &Module,
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> ModuleLinkRecord {
        let (owner_id, price) = match owner {
            LinkOwner::Division(id) => (id, self.pricing.division_cents),
            LinkOwner::Financer(id) => (id, self.pricing.financer_cents),
        };
        ModuleLinkRecord {
            id: sampling::uuid(rng),
            owner_id,
            module_id: module.id,
            active: true,
            price_per_beneficiary: (!module.is_core).then_some(price),
            created_at: now,
        }
    }
}

impl Default for ModuleLinkGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_only_gets_production_financers() {
        let financers = financers_for(Environment::Production);
        assert_eq!(financers.len(), 2);
        assert!(financers.iter().all(|f| f.tier == Tier::Production));
        assert_eq!(financers_for(Environment::Local).len(), FINANCERS.len());
    }

    #[test]
    fn test_every_financer_has_catalog_division() {
        for f in FINANCERS {
            assert!(DIVISIONS.iter().any(|d| d.id == f.division_id), "{}", f.name);
        }
    }

    #[test]
    fn test_core_modules_unpriced() {
        let link_gen = ModuleLinkGenerator::new();
        let mut rng = rand::thread_rng();
        let now = OffsetDateTime::now_utc();
        for module in MODULES {
            let link = link_gen.link(LinkOwner::Financer(FINANCERS[0].id), module, now, &mut rng);
            assert_eq!(link.price_per_beneficiary.is_none(), module.is_core);
        }
    }

    #[test]
    fn test_rows_match_table_width() {
        let now = OffsetDateTime::now_utc();
        let row = ModuleRecord {
            module: MODULES[0].clone(),
            created_at: now,
        }
        .into_row();
        assert_eq!(row.len(), tables::MODULES.columns.len());

        let row = FinancerRecord {
            financer: FINANCERS[0].clone(),
            created_at: now,
        }
        .into_row();
        assert_eq!(row.len(), tables::FINANCERS.columns.len());
    }
}
