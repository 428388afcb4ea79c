//! HTML pages for the browser-facing lookup form

use crate::lens::relay::RelayCheckResult;

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:3em auto;padding:0 1em}\
table{border-collapse:collapse}td{padding:.3em 1em .3em 0}.error{color:#b00}";

/// Escape text for inclusion in HTML
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Egress IP Check</title>\n<style>{}</style>\n</head>\n\
         <body>\n<h1>Egress IP Check</h1>\n{}\n</body>\n</html>\n",
        STYLE, body
    )
}

fn search_form() -> &'static str {
    "<form action=\"/\" method=\"get\">\n\
     <input type=\"text\" name=\"ip\" placeholder=\"IP address\" autofocus>\n\
     <button type=\"submit\">Check</button>\n</form>"
}

/// The search form, optionally with an error message
pub fn index(error: Option<&str>) -> String {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>\n", escape_html(e)))
        .unwrap_or_default();
    layout(&format!("{}{}", error, search_form()))
}

/// The result page for a checked address
pub fn result(result: &RelayCheckResult) -> String {
    let verdict = if result.is_relay {
        "Yes, this address is in the published egress ranges"
    } else {
        "No, this address is not in the published egress ranges"
    };
    let rows = [
        ("IP address", result.ip.as_str()),
        ("Egress relay", verdict),
        ("Organization", result.organization.as_str()),
        ("City", result.city.as_str()),
        ("Country", result.country.as_str()),
    ]
    .iter()
    .map(|(label, value)| {
        format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            label,
            escape_html(value)
        )
    })
    .collect::<Vec<_>>()
    .join("\n");

    let stale = if result.stale {
        "<p class=\"error\">Range data could not be refreshed and may be out of date.</p>\n"
    } else {
        ""
    };

    layout(&format!(
        "<table>\n{}\n</table>\n{}{}",
        rows,
        stale,
        search_form()
    ))
}
