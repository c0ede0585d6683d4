//! Test Data Builders
//!
//! Builder patterns for constructing test entities with sensible
//! defaults; tests specify only the fields they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{BillingCycle, ClientId, Money, OrgId};
use domain_billing::{
    BillingMode, Client, Invoice, InvoiceItem, RecurringExpenseDefinition,
};

use crate::fixtures::{MoneyFixtures, TemporalFixtures};
use crate::generators::fake_client_name;

/// Builder for the billing view of a client
pub struct ClientBuilder {
    org_id: OrgId,
    name: String,
    contract_value: Money,
    payment_day: u32,
    billing_mode: BillingMode,
    contract_start: Option<NaiveDate>,
    contract_end: Option<NaiveDate>,
}

impl ClientBuilder {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            name: fake_client_name(),
            contract_value: MoneyFixtures::retainer(),
            payment_day: 5,
            billing_mode: BillingMode::Monthly,
            contract_start: None,
            contract_end: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_contract_value(mut self, value: Money) -> Self {
        self.contract_value = value;
        self
    }

    pub fn with_payment_day(mut self, day: u32) -> Self {
        self.payment_day = day;
        self
    }

    pub fn installment_based(mut self) -> Self {
        self.billing_mode = BillingMode::Installments;
        self
    }

    pub fn with_contract_start(mut self, start: NaiveDate) -> Self {
        self.contract_start = Some(start);
        self
    }

    pub fn with_contract_end(mut self, end: NaiveDate) -> Self {
        self.contract_end = Some(end);
        self
    }

    pub fn build(self) -> Client {
        Client::create(
            self.org_id,
            self.name,
            self.contract_value,
            self.payment_day,
            self.billing_mode,
        )
        .unwrap()
        .with_contract_window(self.contract_start, self.contract_end)
        .unwrap()
    }
}

/// Builder for open invoices
pub struct InvoiceBuilder {
    org_id: OrgId,
    client_id: ClientId,
    number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    items: Vec<InvoiceItem>,
    discount: Option<Money>,
    tax: Option<Money>,
}

impl InvoiceBuilder {
    pub fn new(org_id: OrgId, client_id: ClientId) -> Self {
        Self {
            org_id,
            client_id,
            number: "INV-TEST-1".to_string(),
            issue_date: TemporalFixtures::run_date(),
            due_date: TemporalFixtures::next_month(),
            items: Vec::new(),
            discount: None,
            tax: None,
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn with_dates(mut self, issue_date: NaiveDate, due_date: NaiveDate) -> Self {
        self.issue_date = issue_date;
        self.due_date = due_date;
        self
    }

    pub fn with_item(mut self, description: &str, quantity: Decimal, unit_amount: Money) -> Self {
        self.items
            .push(InvoiceItem::new(description, quantity, unit_amount).unwrap());
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = Some(discount);
        self
    }

    pub fn with_tax(mut self, tax: Money) -> Self {
        self.tax = Some(tax);
        self
    }

    pub fn build(self) -> Invoice {
        let items = if self.items.is_empty() {
            vec![InvoiceItem::new("Retainer", Decimal::ONE, MoneyFixtures::retainer()).unwrap()]
        } else {
            self.items
        };
        let currency = items[0].unit_amount().currency();
        Invoice::create(
            self.org_id,
            self.client_id,
            self.number,
            self.issue_date,
            self.due_date,
            items,
            self.discount.unwrap_or_else(|| Money::zero(currency)),
            self.tax.unwrap_or_else(|| Money::zero(currency)),
        )
        .unwrap()
    }
}

/// Builder for recurring expense definitions
pub struct RecurringExpenseBuilder {
    org_id: OrgId,
    name: String,
    amount: Money,
    cycle: BillingCycle,
    day_of_month: Option<u32>,
    client_id: Option<ClientId>,
    active: bool,
}

impl RecurringExpenseBuilder {
    pub fn new(org_id: OrgId) -> Self {
        Self {
            org_id,
            name: "Studio rent".to_string(),
            amount: MoneyFixtures::rent(),
            cycle: BillingCycle::Monthly,
            day_of_month: None,
            client_id: None,
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn annual(mut self) -> Self {
        self.cycle = BillingCycle::Annual;
        self
    }

    pub fn on_day(mut self, day: u32) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn for_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> RecurringExpenseDefinition {
        let mut definition =
            RecurringExpenseDefinition::create(self.org_id, self.name, self.amount, self.cycle)
                .unwrap();
        if let Some(day) = self.day_of_month {
            definition = definition.with_day_of_month(day).unwrap();
        }
        if let Some(client_id) = self.client_id {
            definition = definition.with_client(client_id);
        }
        if !self.active {
            definition.deactivate();
        }
        definition
    }
}
