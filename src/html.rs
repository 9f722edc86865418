use crate::domain::{CompositeFile, Dataset};
use crate::investigation::InvestigationSummary;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn composite_entry(file: &CompositeFile) -> String {
    let name = escape(&file.name);
    let opt_text = if file.optional { " (optional)" } else { "" };
    match file.description.as_deref().filter(|desc| !desc.is_empty()) {
        Some(description) => format!(
            "<li><a href=\"{name}\" type=\"text/plain\">{name} ({})</a>{opt_text}</li>",
            escape(description)
        ),
        None => format!("<li><a href=\"{name}\" type=\"text/plain\">{name}</a>{opt_text}</li>"),
    }
}

pub fn composite_listing(files: &[CompositeFile]) -> String {
    let mut rval = vec![
        "<html><head><title>ISA Composite Dataset</title></head><p/>".to_string(),
        "<div>This composite dataset is composed of the following files:<p/><ul>".to_string(),
    ];
    rval.extend(files.iter().map(composite_entry));
    rval.push("</ul></div></html>".to_string());
    rval.join("\n")
}

fn table_row(key: &str, value: &str) -> String {
    format!(
        "<tr><td colspan=\"100%\">{}: {}</td></tr>",
        escape(key),
        escape(value)
    )
}

pub fn summary_table(summary: &InvestigationSummary) -> String {
    let mut out = vec!["<table cellspacing=\"0\" cellpadding=\"3\">".to_string()];
    out.push(table_row("inv_title", &summary.title));
    out.push(table_row("inv_description", &summary.description));
    out.push(table_row("inv_submission_date", &summary.submission_date));
    out.push(table_row("inv_public_release_date", &summary.public_release_date));
    for study in &summary.studies {
        out.push(table_row("study_filename", &study.filename));
        out.push(table_row("study_factors", &study.factors.join(", ")));
        out.push(table_row("study_num_sources", &study.num_sources.to_string()));
        out.push(table_row("study_num_samples", &study.num_samples.to_string()));
    }
    out.push("</table>".to_string());
    out.concat()
}

pub fn metadata_table(dataset: &Dataset) -> String {
    let mut out = vec!["<table cellspacing=\"0\" cellpadding=\"3\">".to_string()];
    out.push(table_row("file_name", dataset.file_name().as_str()));
    for (key, value) in dataset.metadata() {
        out.push(table_row(key, value));
    }
    out.push("</table>".to_string());
    out.concat()
}
