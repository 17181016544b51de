//! Form defaults that keep dependent quantity fields consistent while an
//! entry is being typed in.
//!
//! Every field carries a [`FieldValue`] tag. Proposals only replace
//! [`FieldValue::Auto`] values, so anything the user typed survives later
//! recomputation. Two derivations overwrite regardless: a change of
//! name-or-spec reseeds order and release quantities from the newly
//! selected group, and a change of pass quantity rederives the fail
//! quantity from what was received.
//!
//! Proposed quantities render through [`blank_if_zero`], so a zero default
//! stays an empty field and is stored as null.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{EntryInput, FailQty, GroupKey, LedgerEntry, NOT_APPLICABLE};
use crate::quantity::{blank_if_zero, format_quantity, parse_optional_quantity, parse_quantity};

use super::aggregate::GroupSummary;
use super::ledger::MaterialLedger;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text of one form field and whether the user has set it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Auto(String),
    Manual(String),
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Auto(String::new())
    }
}

impl FieldValue {
    pub fn value(&self) -> &str {
        match self {
            Self::Auto(value) | Self::Manual(value) => value,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto(_))
    }

    /// Replaces an automatic value. Returns whether the proposal was applied.
    pub fn propose(
        &mut self,
        value: String,
    ) -> bool {
        if self.is_auto() {
            *self = Self::Auto(value);
            true
        } else {
            false
        }
    }

    /// Overwrites the field regardless of who set it.
    pub fn reseed(
        &mut self,
        value: String,
    ) {
        *self = Self::Auto(value);
    }

    fn loaded(value: String) -> Self {
        if value.is_empty() {
            Self::Auto(value)
        } else {
            Self::Manual(value)
        }
    }
}

/// Field values of an entry form, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryForm {
    pub name_or_spec: FieldValue,
    pub order_qty: FieldValue,
    pub receive_date: FieldValue,
    pub receive_qty: FieldValue,
    pub pass_qty_current: FieldValue,
    pub fail_qty: FieldValue,
    pub action: FieldValue,
    pub release_date: FieldValue,
    pub release_qty: FieldValue,
}

impl EntryForm {
    fn from_entry(entry: &LedgerEntry) -> Self {
        let qty = |value: Option<Decimal>| FieldValue::loaded(value.map(format_quantity).unwrap_or_default());
        let date = |value: Option<NaiveDate>| {
            FieldValue::loaded(value.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default())
        };

        Self {
            name_or_spec: FieldValue::loaded(entry.name_or_spec.to_string()),
            order_qty: qty(entry.order_qty),
            receive_date: date(entry.receive_date),
            receive_qty: qty(entry.receive_qty),
            pass_qty_current: qty(entry.pass_qty_current),
            fail_qty: FieldValue::loaded(entry.fail_qty.as_ref().map(FailQty::to_string).unwrap_or_default()),
            action: FieldValue::loaded(entry.action.clone().unwrap_or_default()),
            release_date: date(entry.release_date),
            release_qty: qty(entry.release_qty),
        }
    }

    /// Converts the text fields into typed input. Blank or unparseable
    /// quantities and dates become `None`.
    pub fn to_input(&self) -> EntryInput {
        let action = self.action.value().trim();
        EntryInput {
            name_or_spec: GroupKey::new(self.name_or_spec.value()),
            order_qty: parse_optional_quantity(self.order_qty.value()),
            receive_date: parse_date(self.receive_date.value()),
            receive_qty: parse_optional_quantity(self.receive_qty.value()),
            pass_qty_current: parse_optional_quantity(self.pass_qty_current.value()),
            fail_qty: FailQty::parse(self.fail_qty.value()),
            action: (!action.is_empty()).then(|| action.to_string()),
            release_date: parse_date(self.release_date.value()),
            release_qty: parse_optional_quantity(self.release_qty.value()),
        }
    }

    fn fail_numeric(&self) -> Decimal {
        FailQty::parse(self.fail_qty.value())
            .map(|fail| fail.numeric())
            .unwrap_or(Decimal::ZERO)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .inspect_err(|e| debug!(input = %raw, "date does not parse, leaving blank: {}", e))
        .ok()
}

/// An open entry form bound to the ledger it belongs to.
#[derive(Debug, Clone)]
pub struct AutoFill<'a> {
    ledger: &'a MaterialLedger,
    editing: Option<i64>,
    form: EntryForm,
}

impl<'a> AutoFill<'a> {
    /// Opens a blank form for a new entry.
    ///
    /// Name-or-spec defaults to the latest entry's group (or the material
    /// name for an empty ledger); order and release quantities default
    /// from that group.
    pub fn for_new(ledger: &'a MaterialLedger) -> Self {
        let key = ledger
            .last_group_key()
            .cloned()
            .unwrap_or_else(|| GroupKey::new(&ledger.material().name));
        let summary = ledger.summary(&key, None);

        let form = EntryForm {
            name_or_spec: FieldValue::Auto(key.to_string()),
            order_qty: FieldValue::Auto(blank_if_zero(summary.remaining_to_order())),
            release_qty: FieldValue::Auto(blank_if_zero(summary.last_remain)),
            ..EntryForm::default()
        };
        debug!(group = %key, order = %form.order_qty.value(), release = %form.release_qty.value(), "new entry defaults");

        Self {
            ledger,
            editing: None,
            form,
        }
    }

    /// Opens a form over an existing entry. Stored values count as user
    /// input; empty fields stay automatic.
    pub fn for_edit(
        ledger: &'a MaterialLedger,
        entry_id: i64,
    ) -> Option<Self> {
        let entry = ledger.entry(entry_id)?;
        Some(Self {
            ledger,
            editing: Some(entry_id),
            form: EntryForm::from_entry(entry),
        })
    }

    pub fn form(&self) -> &EntryForm {
        &self.form
    }

    pub fn into_form(self) -> EntryForm {
        self.form
    }

    /// Id of the entry being edited, if any.
    pub fn editing(&self) -> Option<i64> {
        self.editing
    }

    /// Totals of the form's current group, leaving out the edited entry.
    pub fn summary(&self) -> GroupSummary {
        let key = GroupKey::new(self.form.name_or_spec.value());
        self.ledger.summary(&key, self.editing)
    }

    fn proposed_release(
        &self,
        summary: &GroupSummary,
    ) -> Decimal {
        parse_quantity(self.form.receive_qty.value()) + summary.last_remain - self.form.fail_numeric()
    }

    /// Switching group reseeds order and release quantities from the new
    /// group, even if they were typed by hand.
    pub fn set_name_or_spec(
        &mut self,
        raw: &str,
    ) {
        self.form.name_or_spec = FieldValue::Manual(raw.to_string());
        let summary = self.summary();

        self.form
            .order_qty
            .reseed(blank_if_zero(summary.remaining_to_order()));
        let release = self.proposed_release(&summary);
        self.form.release_qty.reseed(blank_if_zero(release));
        debug!(group = %self.form.name_or_spec.value(), "reseeded order and release");
    }

    /// Receiving drives the release proposal and, while untouched, the
    /// current pass quantity.
    pub fn set_receive_qty(
        &mut self,
        raw: &str,
    ) {
        self.form.receive_qty = FieldValue::Manual(raw.to_string());
        let summary = self.summary();

        let release = self.proposed_release(&summary);
        if !self.form.release_qty.propose(blank_if_zero(release)) {
            debug!("release quantity was entered by hand, keeping it");
        }
        self.form.pass_qty_current.propose(raw.trim().to_string());
    }

    /// Pass quantity determines the rejected amount, which in turn feeds
    /// the release proposal. The fail quantity is always rederived, even
    /// over a hand-entered or stored value.
    pub fn set_pass_qty_current(
        &mut self,
        raw: &str,
    ) {
        self.form.pass_qty_current = FieldValue::Manual(raw.to_string());

        let receive = parse_quantity(self.form.receive_qty.value());
        let pass = parse_quantity(raw);
        let fail = if receive > pass {
            format_quantity(receive - pass)
        } else {
            NOT_APPLICABLE.to_string()
        };
        self.form.fail_qty.reseed(fail);

        let summary = self.summary();
        let release = self.proposed_release(&summary);
        if !self.form.release_qty.propose(blank_if_zero(release)) {
            debug!("release quantity was entered by hand, keeping it");
        }
    }

    pub fn set_order_qty(
        &mut self,
        raw: &str,
    ) {
        self.form.order_qty = FieldValue::Manual(raw.to_string());
    }

    pub fn set_receive_date(
        &mut self,
        raw: &str,
    ) {
        self.form.receive_date = FieldValue::Manual(raw.to_string());
    }

    pub fn set_fail_qty(
        &mut self,
        raw: &str,
    ) {
        self.form.fail_qty = FieldValue::Manual(raw.to_string());
    }

    pub fn set_action(
        &mut self,
        raw: &str,
    ) {
        self.form.action = FieldValue::Manual(raw.to_string());
    }

    pub fn set_release_date(
        &mut self,
        raw: &str,
    ) {
        self.form.release_date = FieldValue::Manual(raw.to_string());
    }

    pub fn set_release_qty(
        &mut self,
        raw: &str,
    ) {
        self.form.release_qty = FieldValue::Manual(raw.to_string());
    }
}
