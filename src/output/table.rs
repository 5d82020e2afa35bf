use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::types::{FinalReport, NegotiationOutcome, OfferSet, RequiredItem, Solution};

pub fn render_solution_table(items: &[RequiredItem], solution: &Solution) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Category",
        "Offer",
        "Unit Price",
        "Qty",
        "Line Total",
        "Delivery (days)",
    ]);

    for item in items {
        let Some(offer) = solution.selections.get(&item.name) else {
            continue;
        };
        table.add_row(Row::from(vec![
            Cell::new(&item.name),
            Cell::new(&offer.name),
            Cell::new(format!("${:.2}", offer.price)),
            Cell::new(item.quantity.to_string()),
            Cell::new(format!("${:.2}", offer.price * f64::from(item.quantity))),
            Cell::new(offer.delivery_days.to_string()),
        ]));
    }
    format!(
        "{table}\nTotal: ${:.2}   Max delivery: {} days",
        solution.total_cost, solution.max_delivery_days
    )
}

pub fn render_candidates_table(offers: &OfferSet) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Category",
        "Offer",
        "Unit Price",
        "Delivery (days)",
        "Quality",
        "Chosen",
    ]);

    for (category, candidates) in offers {
        for offer in candidates {
            let chosen = if offer.selected { "YES" } else { "" };
            let chosen_cell = if offer.selected {
                Cell::new(chosen).fg(Color::Green)
            } else {
                Cell::new(chosen)
            };
            table.add_row(Row::from(vec![
                Cell::new(category),
                Cell::new(&offer.name),
                Cell::new(format!("${:.2}", offer.price)),
                Cell::new(offer.delivery_days.to_string()),
                Cell::new(format!("{:.2}", offer.quality_score)),
                chosen_cell,
            ]));
        }
    }
    table.to_string()
}

pub fn render_report(items: &[RequiredItem], report: &FinalReport) -> String {
    let mut out = String::new();
    out.push_str("Before negotiation:\n");
    out.push_str(&render_solution_table(items, &report.original));
    out.push_str("\n\nAfter negotiation:\n");
    out.push_str(&render_solution_table(items, &report.negotiated));
    out.push_str("\n\n");
    out.push_str(&render_record_table(report));
    if report.savings_amount > 0.0 {
        out.push_str(&format!(
            "\nTotal savings: ${:.2} ({:.2}%)\n",
            report.savings_amount, report.savings_percentage
        ));
    } else {
        out.push_str("\nNo savings were achieved in this run.\n");
    }
    out
}

fn render_record_table(report: &FinalReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Category", "Offer", "Old Price", "New Price", "Outcome"]);

    for step in &report.record.steps {
        let outcome = match step.outcome {
            NegotiationOutcome::Agreed => Cell::new("AGREED").fg(Color::Green),
            NegotiationOutcome::Declined => Cell::new("DECLINED").fg(Color::Yellow),
            NegotiationOutcome::NoPriceInReply => Cell::new("NO PRICE").fg(Color::Yellow),
            NegotiationOutcome::PartnerUnavailable => Cell::new("UNAVAILABLE").fg(Color::Red),
        };
        table.add_row(Row::from(vec![
            Cell::new(&step.category),
            Cell::new(&step.offer),
            Cell::new(format!("${:.2}", step.old_price)),
            Cell::new(format!("${:.2}", step.new_price)),
            outcome,
        ]));
    }
    if report.record.steps.is_empty() {
        return "No selections crossed the negotiation threshold.".to_string();
    }
    table.to_string()
}
