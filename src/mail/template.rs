//! Verification email, rendered as plain text and HTML.

use chrono::{DateTime, Duration, Utc};
use std::fmt::Write;

use super::EmailMessage;

pub const VERIFICATION_SUBJECT: &str = "PRDT Token - Account Verification Required";
const SUPPORT_ADDRESS: &str = "support@prdttoken.com";
const WEBSITE: &str = "https://prdttoken.com";
const UNKNOWN: &str = "Unknown";

/// Everything the verification email shows about the request.
#[derive(Clone, Debug)]
pub struct VerificationNotice<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub code: &'a str,
    pub client_ip: &'a str,
    pub device: Option<&'a str>,
    pub os: Option<&'a str>,
    pub sent_at: DateTime<Utc>,
    pub validity: Duration,
}

impl VerificationNotice<'_> {
    fn device(&self) -> &str {
        self.device.filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
    }

    fn os(&self) -> &str {
        self.os.filter(|v| !v.is_empty()).unwrap_or(UNKNOWN)
    }

    /// Whole minutes rounded up, or seconds for windows under a minute.
    fn validity(&self) -> String {
        let seconds = self.validity.num_seconds().max(0);
        if seconds < 60 {
            return plural(seconds, "second");
        }
        plural((seconds + 59) / 60, "minute")
    }

    fn date(&self) -> String {
        self.sent_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

#[must_use]
pub fn verification_email(notice: &VerificationNotice<'_>) -> EmailMessage {
    EmailMessage {
        to_email: notice.email.to_string(),
        subject: VERIFICATION_SUBJECT.to_string(),
        text: render_text(notice),
        html: render_html(notice),
    }
}

fn render_text(notice: &VerificationNotice<'_>) -> String {
    format!(
        "Dear {username},

Welcome to the PRDT Token family!

To activate your account, please use the verification code below:

VERIFICATION CODE: {code}

Code validity: {validity}

Login Information:
Username: {username}
Email: {email}
Device: {device}
Operating System: {os}
IP Address: {ip}
Location: {UNKNOWN}
Date: {date}

Security Warning:
- Never share this code with anyone
- PRDT Token team will never ask for your code
- Report suspicious activity immediately

Support: {SUPPORT_ADDRESS}
Website: {WEBSITE}

Thank you,
PRDT Token Security Team
",
        username = notice.username,
        code = notice.code,
        validity = notice.validity(),
        email = notice.email,
        device = notice.device(),
        os = notice.os(),
        ip = notice.client_ip,
        date = notice.date(),
    )
}

const STYLE: &str = "
    body { font-family: Arial, sans-serif; margin: 0; padding: 0; background-color: #f4f4f4; }
    .container { max-width: 600px; margin: 0 auto; background-color: white; }
    .header { background: linear-gradient(45deg, #667eea, #764ba2); color: white; padding: 20px; text-align: center; }
    .content { padding: 30px; }
    .code { background: #f8f9fa; border: 2px solid #dee2e6; padding: 20px; text-align: center; font-size: 48px; font-weight: bold; margin: 20px 0; border-radius: 8px; }
    .info-table { width: 100%; border-collapse: collapse; margin: 20px 0; }
    .info-table td { padding: 12px; border: 1px solid #dee2e6; }
    .info-table tr:nth-child(even) { background-color: #f8f9fa; }
    .warning { background: #fff3cd; border: 1px solid #ffeaa7; padding: 15px; border-radius: 5px; margin: 20px 0; }
    .footer { background-color: #f8f9fa; padding: 20px; text-align: center; color: #6c757d; font-size: 14px; }
";

fn render_html(notice: &VerificationNotice<'_>) -> String {
    let rows = [
        ("Username", notice.username),
        ("Email", notice.email),
        ("Device", notice.device()),
        ("Operating System", notice.os()),
        ("IP Address", notice.client_ip),
        ("Location", UNKNOWN),
    ];

    let mut table = String::new();
    for (label, value) in rows {
        let _ = writeln!(
            table,
            "<tr><td><strong>{label}</strong></td><td>{}</td></tr>",
            escape_html(value)
        );
    }
    let _ = writeln!(
        table,
        "<tr><td><strong>Date</strong></td><td>{}</td></tr>",
        notice.date()
    );

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>PRDT Token - Account Verification</title>
<style>{STYLE}</style>
</head>
<body>
<div class="container">
<div class="header"><h1>PRDT Token</h1><p>Account Verification</p></div>
<div class="content">
<h2>Hello {username},</h2>
<p>Please use the following code to verify your account:</p>
<div class="code">{code}</div>
<p>Code validity: {validity}</p>
<table class="info-table">
{table}</table>
<div class="warning"><strong>WARNING:</strong> Never share this code with anyone! PRDT Token team will never ask for your code.</div>
</div>
<div class="footer">
<p>Support: {SUPPORT_ADDRESS} | Website: {WEBSITE}</p>
<p>&copy; 2024 PRDT Token. All rights reserved.</p>
</div>
</div>
</body>
</html>
"#,
        username = escape_html(notice.username),
        code = escape_html(notice.code),
        validity = notice.validity(),
    )
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// User-supplied values end up inside markup.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn notice<'a>(username: &'a str, device: Option<&'a str>) -> VerificationNotice<'a> {
        VerificationNotice {
            username,
            email: "alice@example.com",
            code: "482913",
            client_ip: "198.51.100.4",
            device,
            os: None,
            sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).single().unwrap_or_default(),
            validity: Duration::minutes(10),
        }
    }

    #[test]
    fn text_body_carries_code_and_request_details() {
        let message = verification_email(&notice("alice", Some("iPhone")));

        assert_eq!(message.to_email, "alice@example.com");
        assert_eq!(message.subject, VERIFICATION_SUBJECT);
        assert!(message.text.contains("VERIFICATION CODE: 482913"));
        assert!(message.text.contains("Code validity: 10 minutes"));
        assert!(message.text.contains("Device: iPhone"));
        assert!(message.text.contains("Operating System: Unknown"));
        assert!(message.text.contains("IP Address: 198.51.100.4"));
        assert!(message.text.contains("Location: Unknown"));
        assert!(message.text.contains("Date: 2024-05-01 12:30:00 UTC"));
        assert!(message.text.contains("Never share this code with anyone"));
    }

    #[test]
    fn html_body_escapes_user_values() {
        let message = verification_email(&notice("<b>eve</b>", Some("")));

        assert!(message.html.contains("Hello &lt;b&gt;eve&lt;/b&gt;,"));
        assert!(!message.html.contains("<b>eve</b>"));
        assert!(message.html.contains(r#"<div class="code">482913</div>"#));
        assert!(message
            .html
            .contains("<tr><td><strong>Device</strong></td><td>Unknown</td></tr>"));
    }

    #[test]
    fn validity_rounds_up_to_whole_minutes() {
        let cases = [
            (Duration::seconds(1), "Code validity: 1 second"),
            (Duration::seconds(30), "Code validity: 30 seconds"),
            (Duration::seconds(60), "Code validity: 1 minute"),
            (Duration::seconds(61), "Code validity: 2 minutes"),
            (Duration::seconds(119), "Code validity: 2 minutes"),
            (Duration::days(1), "Code validity: 1440 minutes"),
        ];
        for (validity, expected) in cases {
            let message = verification_email(&VerificationNotice {
                validity,
                ..notice("alice", None)
            });
            assert!(message.text.contains(expected), "{expected}");
            assert!(message.html.contains(expected), "{expected}");
        }
    }

    #[test]
    fn escape_html_handles_special_characters() {
        assert_eq!(escape_html(r#"a&b<"c">'d'"#), "a&amp;b&lt;&quot;c&quot;&gt;&#39;d&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }
}
