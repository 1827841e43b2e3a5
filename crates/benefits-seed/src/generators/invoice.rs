//! Monthly invoices for divisions and financers, with line items.

use rand::Rng;
use serde_json::json;
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use crate::calendar::{add_months, days_in_month, end_of_month, start_of_month};
use crate::db::{Record, Row, TableSpec, tables};
use crate::generators::catalog::{Division, Financer, Module};
use crate::generators::sampling;
use crate::models::{InvoiceItemType, InvoiceStatus, InvoiceType};

pub const VAT_RATE: f64 = 21.0;

const DIVISION_PARTY: &str = "division";
const FINANCER_PARTY: &str = "financer";

#[derive(Debug, Clone)]
pub struct InvoiceRecord {
    pub id: Uuid,
    pub invoice_number: String,
    pub invoice_type: InvoiceType,
    pub issuer_type: &'static str,
    pub issuer_id: Uuid,
    pub recipient_type: &'static str,
    pub recipient_id: Uuid,
    pub billing_period_start: Date,
    pub billing_period_end: Date,
    pub status: InvoiceStatus,
    pub currency: &'static str,
    /// Amounts are in cents.
    pub subtotal_htva: i64,
    pub vat_amount: i64,
    pub total_ttc: i64,
    pub due_date: Date,
    pub confirmed_at: Option<OffsetDateTime>,
    pub sent_at: Option<OffsetDateTime>,
    pub paid_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl Record for InvoiceRecord {
    const TABLE: &'static TableSpec = &tables::INVOICES;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.invoice_number.into(),
            self.invoice_type.as_str().into(),
            self.issuer_type.into(),
            self.issuer_id.into(),
            self.recipient_type.into(),
            self.recipient_id.into(),
            self.billing_period_start.into(),
            self.billing_period_end.into(),
            self.status.as_str().into(),
            self.currency.into(),
            self.subtotal_htva.into(),
            VAT_RATE.into(),
            self.vat_amount.into(),
            self.total_ttc.into(),
            self.due_date.into(),
            self.confirmed_at.into(),
            self.sent_at.into(),
            self.paid_at.into(),
            self.created_at.into(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceItemRecord {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub item_type: InvoiceItemType,
    pub module_id: Option<Uuid>,
    pub label: serde_json::Value,
    pub beneficiaries_count: i64,
    pub unit_price_htva: i64,
    pub quantity: i64,
    pub subtotal_htva: i64,
    pub vat_amount: i64,
    pub total_ttc: i64,
    pub prorata_days: i64,
    pub total_days: i64,
}

impl Record for InvoiceItemRecord {
    const TABLE: &'static TableSpec = &tables::INVOICE_ITEMS;

    fn into_row(self) -> Row {
        vec![
            self.id.into(),
            self.invoice_id.into(),
            self.item_type.as_str().into(),
            self.module_id.into(),
            self.label.into(),
            self.beneficiaries_count.into(),
            self.unit_price_htva.into(),
            self.quantity.into(),
            self.subtotal_htva.into(),
            VAT_RATE.into(),
            self.vat_amount.into(),
            self.total_ttc.into(),
            self.prorata_days.into(),
            self.total_days.into(),
        ]
    }
}

/// An invoice with its items; totals already summed.
#[derive(Debug, Clone)]
pub struct GeneratedInvoice {
    pub invoice: InvoiceRecord,
    pub items: Vec<InvoiceItemRecord>,
}

#[derive(Debug, Clone)]
pub struct InvoiceGenConfig {
    /// Inclusive range of monthly invoices per billed entity.
    pub invoices_per_entity: (u32, u32),
    /// Inclusive range of billed beneficiaries per invoice.
    pub beneficiaries: (i64, i64),
    pub core_price_cents: (i64, i64),
    pub module_price_cents: (i64, i64),
    pub payment_terms_days: i64,
    /// Percentage of old invoices that were paid; the rest are overdue.
    pub paid_percent: u32,
}

impl Default for InvoiceGenConfig {
    fn default() -> Self {
        Self {
            invoices_per_entity: (10, 15),
            beneficiaries: (100, 300),
            core_price_cents: (100, 200),
            module_price_cents: (100, 150),
            payment_terms_days: 30,
            paid_percent: 80,
        }
    }
}

/// Who issues and who receives an invoice series.
#[derive(Debug, Clone, Copy)]
struct Parties {
    invoice_type: InvoiceType,
    issuer_type: &'static str,
    issuer_id: Uuid,
    recipient_type: &'static str,
    recipient_id: Uuid,
}

pub struct InvoiceGenerator {
    config: InvoiceGenConfig,
}

impl InvoiceGenerator {
    pub fn new() -> Self {
        Self {
            config: InvoiceGenConfig::default(),
        }
    }

    pub fn with_config(config: InvoiceGenConfig) -> Self {
        Self { config }
    }

    /// Platform invoices addressed to a division.
    pub fn for_division(
        &self,
        division: &Division,
        billable: &[Module],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Vec<GeneratedInvoice> {
        let parties = Parties {
            invoice_type: InvoiceType::PlatformToDivision,
            issuer_type: DIVISION_PARTY,
            issuer_id: division.id,
            recipient_type: DIVISION_PARTY,
            recipient_id: division.id,
        };
        self.series(parties, billable, now, rng)
    }

    /// Invoices a financer receives from its parent division.
    pub fn for_financer(
        &self,
        financer: &Financer,
        billable: &[Module],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Vec<GeneratedInvoice> {
        let parties = Parties {
            invoice_type: InvoiceType::DivisionToFinancer,
            issuer_type: DIVISION_PARTY,
            issuer_id: financer.division_id,
            recipient_type: FINANCER_PARTY,
            recipient_id: financer.id,
        };
        self.series(parties, billable, now, rng)
    }

    /// Consecutive monthly invoices ending with the month before `now`.
    fn series(
        &self,
        parties: Parties,
        billable: &[Module],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> Vec<GeneratedInvoice> {
        let (low, high) = self.config.invoices_per_entity;
        let count = rng.gen_range(low..=high.max(low));
        let first = add_months(now.date(), -(count as i32));

        (0..count)
            .map(|i| {
                let start = start_of_month(add_months(first, i as i32));
                let status = self.status_for(i, count, rng);
                self.invoice(parties, start, status, billable, now, rng)
            })
            .collect()
    }

    /// Recent invoices are still in flight, older ones are settled.
    fn status_for(&self, index: u32, count: u32, rng: &mut impl Rng) -> InvoiceStatus {
        if index + 2 >= count {
            match rng.gen_range(1..=3) {
                1 => InvoiceStatus::Confirmed,
                2 => InvoiceStatus::Sent,
                _ => InvoiceStatus::Draft,
            }
        } else if index + 4 >= count {
            InvoiceStatus::Sent
        } else if sampling::percent(self.config.paid_percent, rng) {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Overdue
        }
    }

    fn invoice(
        &self,
        parties: Parties,
        start: Date,
        status: InvoiceStatus,
        billable: &[Module],
        now: OffsetDateTime,
        rng: &mut impl Rng,
    ) -> GeneratedInvoice {
        let end = end_of_month(start);
        let id = sampling::uuid(rng);
        let beneficiaries = rng.gen_range(self.config.beneficiaries.0..=self.config.beneficiaries.1);
        let days = i64::from(days_in_month(start));

        let (low, high) = self.config.core_price_cents;
        let mut items = vec![line_item(
            id,
            InvoiceItemType::CorePackage,
            None,
            json!({ "en": "Core Package", "fr": "Offre Core" }),
            beneficiaries,
            rng.gen_range(low..=high),
            days,
            rng,
        )];

        let (low, high) = self.config.module_price_cents;
        for module in billable.iter().filter(|m| !m.is_core) {
            items.push(line_item(
                id,
                InvoiceItemType::Module,
                Some(module.id),
                json!({ "en": module.name_en, "fr": module.name_fr }),
                beneficiaries,
                rng.gen_range(low..=high),
                days,
                rng,
            ));
        }

        let subtotal: i64 = items.iter().map(|i| i.subtotal_htva).sum();
        let vat = vat_of(subtotal);
        let (confirmed_at, sent_at, paid_at) = lifecycle_dates(status, end, rng);
        let number = format!(
            "{}-{}{:02}-{:04}",
            parties.invoice_type.number_prefix(),
            start.year(),
            u8::from(start.month()),
            rng.gen_range(1..=9999)
        );

        GeneratedInvoice {
            invoice: InvoiceRecord {
                id,
                invoice_number: number,
                invoice_type: parties.invoice_type,
                issuer_type: parties.issuer_type,
                issuer_id: parties.issuer_id,
                recipient_type: parties.recipient_type,
                recipient_id: parties.recipient_id,
                billing_period_start: start,
                billing_period_end: end,
                status,
                currency: "EUR",
                subtotal_htva: subtotal,
                vat_amount: vat,
                total_ttc: subtotal + vat,
                due_date: end + Duration::days(self.config.payment_terms_days),
                confirmed_at,
                sent_at,
                paid_at,
                created_at: now,
            },
            items,
        }
    }
}

impl Default for InvoiceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// VAT in cents, rounded half away from zero.
pub fn vat_of(subtotal_cents: i64) -> i64 {
    (subtotal_cents as f64 * VAT_RATE / 100.0).round() as i64
}

#[allow(clippy::too_many_arguments)]
fn line_item(
    invoice_id: Uuid,
    item_type: InvoiceItemType,
    module_id: Option<Uuid>,
    label: serde_json::Value,
    beneficiaries: i64,
    unit_price: i64,
    days: i64,
    rng: &mut impl Rng,
) -> InvoiceItemRecord {
    let subtotal = unit_price * beneficiaries;
    let vat = vat_of(subtotal);
    InvoiceItemRecord {
        id: sampling::uuid(rng),
        invoice_id,
        item_type,
        module_id,
        label,
        beneficiaries_count: beneficiaries,
        unit_price_htva: unit_price,
        quantity: beneficiaries,
        subtotal_htva: subtotal,
        vat_amount: vat,
        total_ttc: subtotal + vat,
        prorata_days: days,
        total_days: days,
    }
}

type LifecycleDates = (
    Option<OffsetDateTime>,
    Option<OffsetDateTime>,
    Option<OffsetDateTime>,
);

/// Confirmation two days after the period, sending one day later, payment
/// three to fifteen days after that.
fn lifecycle_dates(status: InvoiceStatus, period_end: Date, rng: &mut impl Rng) -> LifecycleDates {
    let confirmed = period_end.midnight().assume_utc() + Duration::days(2);
    let sent = confirmed + Duration::days(1);
    match status {
        InvoiceStatus::Draft => (None, None, None),
        InvoiceStatus::Confirmed => (Some(confirmed), None, None),
        InvoiceStatus::Sent | InvoiceStatus::Overdue => (Some(confirmed), Some(sent), None),
        InvoiceStatus::Paid => (
            Some(confirmed),
            Some(sent),
            Some(sent + Duration::days(rng.gen_range(3..=15))),
        ),
    }
}
