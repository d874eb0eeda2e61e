//! Server-rendered HTML for the login and download forms.

use solaredge::{ExportBundle, Operation, ParamSchema, TimeUnit};

use crate::models::GenerateForm;

const TITLE: &str = "SolarEdge Data Downloader";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

/// Everything the download form shows.
#[derive(Debug, Default)]
pub struct FormView<'a> {
    pub sites: Vec<&'a str>,
    pub previous: Option<&'a GenerateForm>,
    pub notices: Vec<Notice>,
    pub bundle: Option<&'a ExportBundle>,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{TITLE}</title>\
         <style>body{{font-family:sans-serif;max-width:60rem;margin:2rem auto}}\
         .success{{color:#1a7f37}}.warning{{color:#9a6700}}.error{{color:#cf222e}}\
         label{{display:block;margin-top:.75rem}}</style></head>\
         <body><h1>{TITLE}</h1>\n{body}</body></html>\n"
    )
}

fn notice_html(notice: &Notice) -> String {
    let class = match notice.kind {
        NoticeKind::Success => "success",
        NoticeKind::Warning => "warning",
        NoticeKind::Error => "error",
    };
    format!("<p class=\"{class}\">{}</p>\n", escape(&notice.text))
}

pub fn login(error: Option<&str>) -> String {
    let mut body = String::from("<h2>Login</h2>\n");
    if let Some(msg) = error {
        body.push_str(&notice_html(&Notice::new(NoticeKind::Error, msg)));
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\">\
         <label>Username <input name=\"username\" autocomplete=\"username\"></label>\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\
         <p><button type=\"submit\">Login</button></p></form>\n",
    );
    layout(&body)
}

fn schema_hint(schema: ParamSchema) -> &'static str {
    match schema {
        ParamSchema::None => "no parameters",
        ParamSchema::DateRange { time_unit: false } => "start and end date",
        ParamSchema::DateRange { time_unit: true } => "start and end date, time unit",
        ParamSchema::DateTimeRange { time_unit: false } => "start and end date and time",
        ParamSchema::DateTimeRange { time_unit: true } => "start and end date and time, time unit",
    }
}

fn selected(cond: bool) -> &'static str {
    if cond {
        " selected"
    } else {
        ""
    }
}

pub fn download_form(view: &FormView<'_>) -> String {
    let prev = view.previous;
    let prev_value = |f: fn(&GenerateForm) -> Option<&String>| {
        escape(prev.and_then(f).map(String::as_str).unwrap_or(""))
    };

    let mut body = String::new();
    for notice in &view.notices {
        body.push_str(&notice_html(notice));
    }

    body.push_str("<form method=\"post\" action=\"/generate\">\n");

    body.push_str("<label>1. Select a Site: <select name=\"site\">");
    if view.sites.is_empty() {
        body.push_str("<option value=\"\">No sites found</option>");
    }
    for name in &view.sites {
        let is_prev = prev.is_some_and(|p| p.site == *name);
        body.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>",
            escape(name),
            selected(is_prev)
        ));
    }
    body.push_str("</select></label>\n");

    body.push_str("<label>2. Select the API Endpoint: <select name=\"operation\">");
    for op in Operation::ALL {
        let is_prev = prev.is_some_and(|p| p.operation == op.slug());
        body.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>",
            op.slug(),
            selected(is_prev),
            op.label()
        ));
    }
    body.push_str("</select></label>\n<ul>");
    for op in Operation::ALL {
        body.push_str(&format!(
            "<li><b>{}</b>: {} <i>({})</i></li>",
            op.label(),
            escape(op.description()),
            schema_hint(op.schema())
        ));
    }
    body.push_str("</ul>\n");

    body.push_str(&format!(
        "<label>Start date <input type=\"date\" name=\"start_date\" value=\"{}\"></label>\
         <label>Start time <input type=\"time\" step=\"1\" name=\"start_time\" value=\"{}\"></label>\
         <label>End date <input type=\"date\" name=\"end_date\" value=\"{}\"></label>\
         <label>End time <input type=\"time\" step=\"1\" name=\"end_time\" value=\"{}\"></label>\n",
        prev_value(|p| p.start_date.as_ref()),
        prev_value(|p| p.start_time.as_ref()),
        prev_value(|p| p.end_date.as_ref()),
        prev_value(|p| p.end_time.as_ref()),
    ));

    let prev_unit = prev
        .and_then(|p| p.time_unit.as_deref())
        .and_then(|u| u.parse::<TimeUnit>().ok())
        .unwrap_or_default();
    body.push_str("<label>Time unit <select name=\"time_unit\">");
    for unit in TimeUnit::ALL {
        body.push_str(&format!(
            "<option value=\"{0}\"{1}>{0}</option>",
            unit.as_str(),
            selected(unit == prev_unit)
        ));
    }
    body.push_str("</select></label>\n");

    body.push_str("<p><button type=\"submit\">Generate Download Files</button></p></form>\n");

    if let Some(bundle) = view.bundle {
        body.push_str(&format!(
            "<p><a href=\"/download/raw\" download=\"{0}\">Download Raw JSON</a> ({0})</p>\
             <p><a href=\"/download/csv\" download=\"{1}\">Download Processed CSV</a> ({1})</p>\n",
            escape(&bundle.raw_filename()),
            escape(&bundle.csv_filename()),
        ));
    }

    body.push_str(
        "<form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\n",
    );
    layout(&body)
}
