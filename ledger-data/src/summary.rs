use ledger_core::MaterialLedger;
use ledger_core::quantity::{format_quantity, opt_quantity_display};
use ledger_core::reconcile::{GroupReport, StaleSnapshot, audit, group_reports};

/// Plain-text standing of one material, group by group, followed by any
/// entries whose stored snapshot has gone stale.
pub fn render_summary(ledger: &MaterialLedger) -> String {
    let material = ledger.material();
    let mut out = format!("{} ({})\n", material.name, material.unit);

    let reports = group_reports(ledger);
    if reports.is_empty() {
        out.push_str("  no entries\n");
    }
    for report in &reports {
        out.push_str(&group_line(report));
    }
    for stale in audit(ledger) {
        out.push_str(&stale_line(&stale));
    }

    out
}

fn group_line(report: &GroupReport) -> String {
    let noun = if report.entry_count == 1 { "entry" } else { "entries" };
    format!(
        "  {}: {} {}, ordered {}, passed {}, to order {}, in stock {}\n",
        report.name_or_spec,
        report.entry_count,
        noun,
        opt_quantity_display(&report.order_qty),
        format_quantity(report.pass_qty_total),
        format_quantity(report.remaining_to_order),
        format_quantity(report.remain_qty),
    )
}

fn stale_line(stale: &StaleSnapshot) -> String {
    format!(
        "  ! entry {} ({}): stored stock {}, recomputed {}\n",
        stale.entry_id,
        stale.name_or_spec,
        opt_quantity_display(&stale.stored_remain_qty),
        format_quantity(stale.expected.remain_qty),
    )
}
