//! Rendering from the normalized models to HTML fragments.
//!
//! The text transform covers line breaks, `**bold**`, `*italic*`
//! and `- item` lines. It is not a markdown implementation.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{DiagnosisEntry, SoapField, SoapSummary};
use crate::normalize::{EVIDENCE, FOLLOW_UP};

pub const NO_DIAGNOSES_MESSAGE: &str = "No diagnoses were found based on the provided documents.";
pub const EMPTY_LIST_MESSAGE: &str = "None provided";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("italic pattern is valid"));

/// Convert display text to markup. Input is HTML-escaped before the patterns apply.
pub fn format_text(text: &str) -> String {
    let mut out = String::new();
    let mut list_items: Vec<String> = Vec::new();
    let mut needs_break = false;

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');

        if let Some(item) = line.trim_start().strip_prefix("- ") {
            list_items.push(format!("<li>{}</li>", inline(item)));
            continue;
        }

        if !list_items.is_empty() {
            flush_list(&mut out, &mut list_items);
        } else if needs_break {
            out.push_str("<br>");
        }
        out.push_str(&inline(line));
        needs_break = true;
    }

    flush_list(&mut out, &mut list_items);
    out
}

fn flush_list(out: &mut String, items: &mut Vec<String>) {
    if items.is_empty() {
        return;
    }
    out.push_str("<ul>");
    for item in items.drain(..) {
        out.push_str(&item);
    }
    out.push_str("</ul>");
}

fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    ITALIC.replace_all(&bold, "<em>$1</em>").into_owned()
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Display-ready view of one diagnosis card.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisCard {
    pub title: String,
    pub confidence_label: String,
    /// `None` renders with neutral styling.
    pub confidence_class: Option<&'static str>,
    pub explanation_html: String,
    pub evidence_items: Vec<String>,
    pub follow_up_items: Vec<String>,
}

impl DiagnosisCard {
    pub fn from_entry(entry: &DiagnosisEntry) -> Self {
        Self {
            title: entry.name.clone(),
            confidence_label: entry.confidence_label.clone(),
            confidence_class: entry.confidence_level().map(|level| level.css_class()),
            explanation_html: format_text(&entry.explanation),
            evidence_items: list_or_placeholder(&entry.evidence, EVIDENCE.placeholder),
            follow_up_items: list_or_placeholder(&entry.follow_up, FOLLOW_UP.placeholder),
        }
    }

    pub fn to_html(&self) -> String {
        let badge_class = match self.confidence_class {
            Some(class) => format!("confidence-badge {}", class),
            None => "confidence-badge".to_string(),
        };

        format!(
            concat!(
                "<div class=\"diagnosis-card\">",
                "<div class=\"diagnosis-header\">",
                "<h3 class=\"diagnosis-name\">{}</h3>",
                "<span class=\"{}\">{}</span>",
                "</div>",
                "<div class=\"diagnosis-explanation\">{}</div>",
                "<ul class=\"evidence-list\">{}</ul>",
                "<ul class=\"followup-list\">{}</ul>",
                "</div>"
            ),
            escape_html(&self.title),
            badge_class,
            escape_html(&self.confidence_label),
            self.explanation_html,
            list_html(&self.evidence_items),
            list_html(&self.follow_up_items),
        )
    }
}

/// Items already formatted; a placeholder item is escaped plain text.
fn list_or_placeholder(items: &[String], placeholder: &str) -> Vec<String> {
    if items.is_empty() {
        vec![escape_html(placeholder)]
    } else {
        items.iter().map(|item| format_text(item)).collect()
    }
}

fn list_html(items: &[String]) -> String {
    items.iter().map(|item| format!("<li>{}</li>", item)).collect()
}

pub fn render_diagnoses(entries: &[DiagnosisEntry]) -> String {
    if entries.is_empty() {
        return format!(
            "<div class=\"no-data-message\"><p>{}</p></div>",
            NO_DIAGNOSES_MESSAGE
        );
    }
    entries
        .iter()
        .map(|entry| DiagnosisCard::from_entry(entry).to_html())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_soap_field(field: &SoapField) -> String {
    match field {
        SoapField::List(items) if items.is_empty() => format!("<p>{}</p>", EMPTY_LIST_MESSAGE),
        SoapField::List(items) => {
            let items: Vec<String> = items.iter().map(|item| format_text(item)).collect();
            format!("<ul>{}</ul>", list_html(&items))
        }
        SoapField::Text(text) => format_text(text),
    }
}

pub fn render_summary(summary: &SoapSummary) -> String {
    [
        ("subjectiveContent", "Subjective", &summary.subjective),
        ("objectiveContent", "Objective", &summary.objective),
        ("assessmentContent", "Assessment", &summary.assessment),
        ("planContent", "Plan", &summary.plan),
    ]
    .iter()
    .map(|(id, heading, field)| {
        format!(
            "<section class=\"soap-section\"><h3>{}</h3><div id=\"{}\">{}</div></section>",
            heading,
            id,
            render_soap_field(field)
        )
    })
    .collect::<Vec<_>>()
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_become_breaks() {
        assert_eq!(format_text("a\nb\n\nc"), "a<br>b<br><br>c");
    }

    #[test]
    fn bold_and_italic() {
        assert_eq!(
            format_text("**Acute** onset, *likely* viral"),
            "<strong>Acute</strong> onset, <em>likely</em> viral"
        );
    }

    #[test]
    fn consecutive_items_share_one_list() {
        assert_eq!(
            format_text("Findings:\n- fever\n- cough\nMonitor closely"),
            "Findings:<ul><li>fever</li><li>cough</li></ul>Monitor closely"
        );
    }

    #[test]
    fn separate_runs_make_separate_lists() {
        assert_eq!(
            format_text("- a\ntext\n- b"),
            "<ul><li>a</li></ul>text<ul><li>b</li></ul>"
        );
    }

    #[test]
    fn markup_in_input_is_escaped() {
        assert_eq!(
            format_text("<script>x</script> & **y**"),
            "&lt;script&gt;x&lt;/script&gt; &amp; <strong>y</strong>"
        );
    }

    #[test]
    fn card_uses_placeholders_for_empty_lists() {
        let entry = DiagnosisEntry {
            name: "Flu".to_string(),
            confidence_label: "High".to_string(),
            explanation: "...".to_string(),
            evidence: vec!["fever".to_string()],
            follow_up: vec![],
        };
        let card = DiagnosisCard::from_entry(&entry);
        assert_eq!(card.title, "Flu");
        assert_eq!(card.confidence_class, Some("confidence-high"));
        assert_eq!(card.evidence_items, vec!["fever"]);
        assert_eq!(
            card.follow_up_items,
            vec!["No follow-up recommendations provided."]
        );

        let html = card.to_html();
        assert!(html.contains("confidence-badge confidence-high"));
        assert!(html.contains("<ul class=\"evidence-list\"><li>fever</li></ul>"));
    }

    #[test]
    fn unknown_confidence_has_neutral_badge() {
        let entry = DiagnosisEntry {
            name: "Unknown Diagnosis".to_string(),
            confidence_label: "Unknown".to_string(),
            explanation: "No explanation provided.".to_string(),
            evidence: vec![],
            follow_up: vec![],
        };
        let card = DiagnosisCard::from_entry(&entry);
        assert!(card.confidence_class.is_none());
        assert!(card.to_html().contains("<span class=\"confidence-badge\">Unknown</span>"));
        assert_eq!(card.evidence_items, vec!["No specific evidence provided."]);
    }

    #[test]
    fn empty_diagnosis_list_renders_placeholder() {
        assert!(render_diagnoses(&[]).contains(NO_DIAGNOSES_MESSAGE));
    }

    #[test]
    fn soap_fields_render_by_shape() {
        assert_eq!(
            render_soap_field(&SoapField::List(vec![])),
            "<p>None provided</p>"
        );
        assert_eq!(
            render_soap_field(&SoapField::List(vec!["BP 120/80".to_string()])),
            "<ul><li>BP 120/80</li></ul>"
        );
        assert_eq!(render_soap_field(&SoapField::text("a\nb")), "a<br>b");
    }
}
