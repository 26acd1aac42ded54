//! Result descriptors returned by publisher operations and their HTML form.

use courseware_ports::Translation;
use serde::{Deserialize, Serialize};

use crate::domain::build_config::ChangeLog;
use crate::domain::report::PublishReport;

/// Escape text for inclusion in HTML.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishLink {
    pub label: String,
    pub url: String,
}

impl PublishLink {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            "<a href=\"{}\" target=\"_blank\">{}</a>",
            escape(&self.url),
            escape(&self.label)
        )
    }
}

/// Summary of one publisher operation: what happened and where to look.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescriptor {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub link: Option<PublishLink>,
    /// Extra `(label, value)` facts, shown in order.
    #[serde(default)]
    pub details: Vec<(String, String)>,
    /// Pre-rendered HTML appended verbatim, e.g. a renderer's output.
    #[serde(default)]
    pub body_html: Option<String>,
}

impl ResultDescriptor {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            link: None,
            details: Vec::new(),
            body_html: None,
        }
    }

    pub fn with_link(mut self, link: PublishLink) -> Self {
        self.link = Some(link);
        self
    }

    pub fn with_detail(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.push((label.into(), value.into()));
        self
    }

    pub fn with_body_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }

    pub fn detail(&self, label: &str) -> Option<&str> {
        self.details
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div><h3>{}</h3><p>{}</p>",
            escape(&self.title),
            escape(&self.summary)
        );
        if let Some(link) = &self.link {
            html.push_str(&format!("<p>{}</p>", link.to_html()));
        }
        if !self.details.is_empty() {
            html.push_str("<ul>");
            for (label, value) in &self.details {
                html.push_str(&format!(
                    "<li><b>{}:</b> {}</li>",
                    escape(label),
                    escape(value)
                ));
            }
            html.push_str("</ul>");
        }
        if let Some(body) = &self.body_html {
            html.push_str(body);
        }
        html.push_str("</div>");
        html
    }
}

/// Announcement of a published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub recipient: Option<String>,
    pub subject: String,
    pub html: String,
}

/// Compose the announcement for `name` v`version`.
pub fn published_message(
    name: &str,
    version: &str,
    change_log: Option<&ChangeLog>,
    translation: Option<&Translation>,
    recipient: Option<&str>,
) -> PublishedMessage {
    let subject = format!("Published \"{name}\", v{version}");
    let mut html = format!(
        "<div><p>A new version of <b>{}</b> has been published: v{}</p>",
        escape(name),
        escape(version)
    );

    match change_log {
        Some(log) if !log.entries.is_empty() => {
            html.push_str(&format!("<p><b>Change Log v{}</b>", escape(&log.version)));
            if let Some(date) = &log.date {
                html.push_str(&format!(" ({})", escape(date)));
            }
            html.push_str("</p><ul>");
            for entry in &log.entries {
                html.push_str(&format!("<li>{}</li>", escape(entry)));
            }
            html.push_str("</ul>");
        }
        _ => html.push_str("<p>No change log was provided for this version.</p>"),
    }

    if let Some(translation) = translation {
        if let Some(folder) = &translation.published_docs_folder {
            html.push_str(&format!(
                "<p>{}</p>",
                PublishLink::new("Published documents", folder).to_html()
            ));
        }
        if !translation.document_links.is_empty() {
            html.push_str("<ul>");
            for (title, url) in &translation.document_links {
                html.push_str(&format!("<li>{}</li>", PublishLink::new(title, url).to_html()));
            }
            html.push_str("</ul>");
        }
    }
    html.push_str("</div>");

    PublishedMessage {
        recipient: recipient.map(str::to_string),
        subject,
        html,
    }
}

/// HTML summary of a generation pass: totals, per-notebook warnings and
/// errors, and the link to the published release notebook.
pub fn render_publish_report(report: &PublishReport) -> String {
    let mut html = String::from("<div>");
    let status = if report.succeeded() {
        "Publishing completed"
    } else {
        "Publishing completed with errors"
    };
    html.push_str(&format!(
        "<p><b>{status}</b>: {} notebook(s), {} error(s), {} warning(s)</p>",
        report.notebooks.len(),
        report.total_errors(),
        report.total_warnings()
    ));
    html.push_str(&format!(
        "<p>{}</p>",
        PublishLink::new(&report.link, &report.link).to_html()
    ));

    for notebook in &report.notebooks {
        if notebook.errors.is_empty() && notebook.warnings.is_empty() {
            continue;
        }
        html.push_str(&format!("<h4>{}</h4><ul>", escape(&notebook.path)));
        for error in &notebook.errors {
            html.push_str(&format!(
                "<li style=\"color:red\">{}</li>",
                escape(&error.message)
            ));
        }
        for warning in &notebook.warnings {
            html.push_str(&format!("<li>{}</li>", escape(&warning.message)));
        }
        html.push_str("</ul>");
    }

    if !report.excluded.is_empty() {
        html.push_str("<p>Excluded:</p><ul>");
        for path in &report.excluded {
            html.push_str(&format!("<li>{}</li>", escape(path)));
        }
        html.push_str("</ul>");
    }
    html.push_str("</div>");
    html
}
