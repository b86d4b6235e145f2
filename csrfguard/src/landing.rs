//! Priming page for fresh sessions

/// Title of the priming page
pub const LANDING_PAGE_TITLE: &str = "OWASP CSRFGuard Project - New Token Landing Page";

/// Render the auto-submitting priming page.
///
/// The page posts to `action`, carrying `token` as a hidden field named
/// `token_name` when one is given.
pub fn render_landing_page(action: &str, token_name: &str, token: Option<&str>) -> String {
    let mut lines = vec![
        "<html>".to_string(),
        "<head>".to_string(),
        format!("<title>{LANDING_PAGE_TITLE}</title>"),
        "</head>".to_string(),
        "<body>".to_string(),
        "<script type=\"text/javascript\">".to_string(),
        "var form = document.createElement(\"form\");".to_string(),
        "form.setAttribute(\"method\", \"post\");".to_string(),
        format!("form.setAttribute(\"action\", \"{}\");", js_string(action)),
    ];

    if let Some(token) = token {
        lines.extend([
            "var hiddenField = document.createElement(\"input\");".to_string(),
            "hiddenField.setAttribute(\"type\", \"hidden\");".to_string(),
            format!(
                "hiddenField.setAttribute(\"name\", \"{}\");",
                js_string(token_name)
            ),
            format!("hiddenField.setAttribute(\"value\", \"{}\");", js_string(token)),
            "form.appendChild(hiddenField);".to_string(),
        ]);
    }

    lines.extend([
        "document.body.appendChild(form);".to_string(),
        "form.submit();".to_string(),
        "</script>".to_string(),
        "</body>".to_string(),
        "</html>".to_string(),
    ]);

    let mut page = lines.join("\r\n");
    page.push_str("\r\n");
    page
}

/// Escape text for a double-quoted script string inside an HTML page
fn js_string(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\'' => escaped.push_str("\\'"),
            '<' => escaped.push_str("\\x3C"),
            '>' => escaped.push_str("\\x3E"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_with_token() {
        let page = render_landing_page("/app/home", "OWASP_CSRFGUARD", Some("ABC123"));
        assert!(page.starts_with("<html>\r\n<head>\r\n"));
        assert!(page.contains("form.setAttribute(\"action\", \"/app/home\");\r\n"));
        assert!(page.contains("hiddenField.setAttribute(\"name\", \"OWASP_CSRFGUARD\");"));
        assert!(page.contains("hiddenField.setAttribute(\"value\", \"ABC123\");"));
        assert!(page.ends_with("form.submit();\r\n</script>\r\n</body>\r\n</html>\r\n"));
    }

    #[test]
    fn test_page_without_token() {
        let page = render_landing_page("/public/index.html", "OWASP_CSRFGUARD", None);
        assert!(!page.contains("hiddenField"));
        assert!(page.contains("document.body.appendChild(form);"));
    }

    #[test]
    fn test_action_escaped() {
        let page = render_landing_page("/a\"</script><script>alert(1)", "T", None);
        assert!(!page.contains("</script><script>"));
        assert!(page.contains("/a\\\"\\x3C/script\\x3E"));
    }
}
