//! Replacement set for the publication reward request form.

use chrono::{DateTime, NaiveDate, Utc};

use super::model::{
    Applicant, PreviewApplicant, PreviewAttachmentMeta, PreviewFormData, PreviewFormPayload,
    PublicationRewardDetail, Submission, SubmissionDocument, SystemConfigSnapshot,
};
use super::thai::{baht_text, format_amount, format_thai_date, format_thai_naive_date, thai_year};
use crate::error::PipelineError;
use crate::template::{ensure_required_placeholders, Replacements};

/// Every placeholder the reward form template uses.
pub const REWARD_FORM_PLACEHOLDERS: &[&str] = &[
    "{{date_th}}",
    "{{applicant_name}}",
    "{{date_of_employment}}",
    "{{position}}",
    "{{installment}}",
    "{{total_amount}}",
    "{{total_amount_text}}",
    "{{author_name_list}}",
    "{{paper_title}}",
    "{{journal_name}}",
    "{{publication_year}}",
    "{{volume_issue}}",
    "{{page_number}}",
    "{{author_role}}",
    "{{quartile_line}}",
    "{{document_line}}",
    "{{kku_report_year}}",
    "{{signature}}",
];

/// Placeholders that must carry text before the form is worth rendering.
pub const REWARD_FORM_NON_BLANK: &[&str] = &[
    "{{date_th}}",
    "{{applicant_name}}",
    "{{paper_title}}",
    "{{total_amount}}",
];

pub fn author_role(author_status: &str) -> &'static str {
    match author_status.trim().to_ascii_lowercase().as_str() {
        "first_author" => "เป็นผู้ประพันธ์ชื่อแรก (first author)",
        "corresponding_author" => "เป็นผู้ประพันธ์บรรณกิจ (corresponding author)",
        _ => "",
    }
}

pub fn quartile_line(quartile: &str) -> String {
    const DATABASES: &str = "ที่สามารถสืบค้นได้ในฐานข้อมูล WOS หรือ ISI หรือ SCOPUS";
    const INTERNATIONAL: &str = "บทความตีพิมพ์ในวารสารระดับนานาชาติ";

    match quartile.trim().to_ascii_uppercase().as_str() {
        "T5" => format!("{} ควอไทล์ 1 (ลำดับ 5% แรก) {}", INTERNATIONAL, DATABASES),
        "T10" => format!("{} ควอไทล์ 1 (ลำดับ 10% แรก) {}", INTERNATIONAL, DATABASES),
        q @ ("Q1" | "Q2" | "Q3" | "Q4") => {
            format!("{} ควอไทล์ {} {}", INTERNATIONAL, &q[1..], DATABASES)
        }
        "TCI" => format!(
            "{} อยู่ในฐานข้อมูล WOS หรือ ISI หรือ SCOPUS หรือวารสารที่อยู่ในฐานข้อมูล TCI",
            INTERNATIONAL
        ),
        _ => String::new(),
    }
}

fn checked_line(name: &str) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| format!("☑ {} — จำนวน 1 ฉบับ", name))
}

/// One checked line per attached document that has a type name.
pub fn document_line(documents: &[SubmissionDocument]) -> String {
    documents
        .iter()
        .filter_map(|doc| checked_line(doc.document_type_name.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Document lines for an unsaved form.
///
/// Attachment metadata is listed by `display_order`, named by document type or else by
/// file name. Without usable metadata the uploaded file names are listed as sent.
pub fn preview_document_line(meta: &[PreviewAttachmentMeta], uploaded: &[String]) -> String {
    let mut ordered: Vec<&PreviewAttachmentMeta> = meta.iter().collect();
    ordered.sort_by_key(|entry| entry.display_order);

    let lines: Vec<String> = ordered
        .iter()
        .filter_map(|entry| {
            checked_line(&entry.document_type_name).or_else(|| checked_line(&entry.filename))
        })
        .collect();
    if !lines.is_empty() {
        return lines.join("\n");
    }

    uploaded
        .iter()
        .filter_map(|name| checked_line(name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Amount typed into the form. Separators are ignored; anything unparsable is zero.
pub fn parse_form_amount(raw: &str) -> f64 {
    raw.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// `publication_date`, else the first day of `journal_month`/`journal_year`.
pub fn form_publication_date(form: &PreviewFormData) -> Option<NaiveDate> {
    if let Some(date) = parse_iso_date(&form.publication_date) {
        return Some(date);
    }
    let year = form.journal_year.trim().parse::<i32>().ok()?;
    let month = form
        .journal_month
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|month| (1..=12).contains(month))
        .unwrap_or(1);
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn form_applicant_name(applicant: &PreviewApplicant) -> String {
    [
        applicant.prefix_name.trim(),
        applicant.user_fname.trim(),
        applicant.user_lname.trim(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

fn text(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

/// Build the full replacement set and check it against the form's required keys.
///
/// The form is dated with `submitted_at`, or `created_at` for a draft.
pub fn build_reward_form_replacements(
    submission: &Submission,
    applicant: &Applicant,
    detail: &PublicationRewardDetail,
    config: &SystemConfigSnapshot,
    documents: &[SubmissionDocument],
) -> Result<Replacements, PipelineError> {
    let document_date = submission.submitted_at.unwrap_or(submission.created_at);

    let entries: [(&str, String); 18] = [
        ("{{date_th}}", format_thai_date(document_date)),
        ("{{applicant_name}}", applicant.display_name()),
        (
            "{{date_of_employment}}",
            applicant
                .date_of_employment
                .map(format_thai_naive_date)
                .unwrap_or_default(),
        ),
        ("{{position}}", text(&applicant.position_name)),
        (
            "{{installment}}",
            config.installment.map(|n| n.to_string()).unwrap_or_default(),
        ),
        ("{{total_amount}}", format_amount(detail.total_amount)),
        ("{{total_amount_text}}", baht_text(detail.total_amount)),
        ("{{author_name_list}}", text(&detail.author_name_list)),
        ("{{paper_title}}", text(&detail.paper_title)),
        ("{{journal_name}}", text(&detail.journal_name)),
        (
            "{{publication_year}}",
            detail.publication_date.map(thai_year).unwrap_or_default(),
        ),
        ("{{volume_issue}}", text(&detail.volume_issue)),
        ("{{page_number}}", text(&detail.page_numbers)),
        (
            "{{author_role}}",
            author_role(detail.author_status.as_deref().unwrap_or("")).to_string(),
        ),
        (
            "{{quartile_line}}",
            quartile_line(detail.quartile.as_deref().unwrap_or("")),
        ),
        ("{{document_line}}", document_line(documents)),
        ("{{kku_report_year}}", text(&config.kku_report_year)),
        ("{{signature}}", text(&detail.signature)),
    ];

    let replacements: Replacements = entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    ensure_required_placeholders(&replacements, REWARD_FORM_PLACEHOLDERS, REWARD_FORM_NON_BLANK)?;
    Ok(replacements)
}

/// Replacement set for a form that has not been saved yet, dated `now`.
///
/// Unlike a stored submission, blank fields are allowed so a half-filled form can still be
/// previewed.
pub fn build_form_preview_replacements(
    payload: &PreviewFormPayload,
    config: &SystemConfigSnapshot,
    uploaded: &[String],
    now: DateTime<Utc>,
) -> Result<Replacements, PipelineError> {
    let form = &payload.form_data;
    let applicant = &payload.applicant;
    let total_amount = parse_form_amount(&form.total_amount);
    let publication_year = form_publication_date(form)
        .map(thai_year)
        .unwrap_or_else(|| form.journal_year.trim().to_string());

    let entries: [(&str, String); 18] = [
        ("{{date_th}}", format_thai_date(now)),
        ("{{applicant_name}}", form_applicant_name(applicant)),
        (
            "{{date_of_employment}}",
            parse_iso_date(&applicant.date_of_employment)
                .map(format_thai_naive_date)
                .unwrap_or_default(),
        ),
        ("{{position}}", applicant.position_name.trim().to_string()),
        (
            "{{installment}}",
            config.installment.map(|n| n.to_string()).unwrap_or_default(),
        ),
        ("{{total_amount}}", format_amount(total_amount)),
        ("{{total_amount_text}}", baht_text(total_amount)),
        ("{{author_name_list}}", form.author_name_list.trim().to_string()),
        ("{{paper_title}}", form.article_title.trim().to_string()),
        ("{{journal_name}}", form.journal_name.trim().to_string()),
        ("{{publication_year}}", publication_year),
        ("{{volume_issue}}", form.journal_issue.trim().to_string()),
        ("{{page_number}}", form.journal_pages.trim().to_string()),
        ("{{author_role}}", author_role(&form.author_status).to_string()),
        ("{{quartile_line}}", quartile_line(&form.journal_quartile)),
        (
            "{{document_line}}",
            preview_document_line(&payload.attachments, uploaded),
        ),
        ("{{kku_report_year}}", text(&config.kku_report_year)),
        ("{{signature}}", form.signature.trim().to_string()),
    ];

    let replacements: Replacements = entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

    ensure_required_placeholders(&replacements, REWARD_FORM_PLACEHOLDERS, &[])?;
    Ok(replacements)
}
