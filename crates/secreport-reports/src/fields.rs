//! Dynamic fields substituted into the report e-mail template.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};

use secreport_mail::TemplateFields;

const MONTHS_PT_BR: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

/// `"setembro de 2026"` for any day in October 2026.
pub fn previous_month_label(today: NaiveDate) -> String {
    let (year, month0) = if today.month0() == 0 {
        (today.year() - 1, 11)
    } else {
        (today.year(), today.month0() - 1)
    };
    format!("{} de {year}", MONTHS_PT_BR[month0 as usize])
}

/// Name the PDF is presented under in the outgoing message.
pub fn report_filename(tenant: &str, date: NaiveDate) -> String {
    format!("Relatorio_vRx_{tenant}_{}.pdf", date.format("%Y-%m-%d"))
}

pub fn template_fields(tenant: &str, now: DateTime<FixedOffset>) -> TemplateFields {
    let today = now.date_naive();
    let mut fields = TemplateFields::new();
    fields.insert("formato_relatorio".into(), "PDF".into());
    fields.insert("periodo_mes_anterior_str".into(), previous_month_label(today));
    fields.insert("nome_relatorio".into(), report_filename(tenant, today));
    fields.insert(
        "data_geracao".into(),
        now.format("%d/%m/%Y, %H:%M:%S").to_string(),
    );
    fields
}
