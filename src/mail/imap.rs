//! IMAP mailbox: unseen messages over TLS in, replies over SMTP via lettre.
//!
//! Messages are fetched with `BODY.PEEK[]`, so reading a batch leaves the
//! `\Seen` flags untouched. All socket I/O is blocking and runs on
//! `spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{env_parse, env_required};
use crate::error::{ConfigError, MailError};
use crate::mail::MailSource;
use crate::mail::text::{MAX_PREVIEW_CHARS, preview, strip_html};
use crate::pipeline::types::RawMessage;

// ── Configuration ───────────────────────────────────────────────────

/// IMAP/SMTP mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: Arc<SecretString>,
    pub from_address: String,
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = env_required("EMAIL_IMAP_HOST")?;
        let imap_port = env_parse("EMAIL_IMAP_PORT").unwrap_or(993);
        let smtp_host =
            std::env::var("EMAIL_SMTP_HOST").unwrap_or_else(|_| imap_host.replace("imap", "smtp"));
        let smtp_port = env_parse("EMAIL_SMTP_PORT").unwrap_or(587);
        let username = env_required("EMAIL_USERNAME")?;
        let password = env_required("EMAIL_PASSWORD")?;
        let from_address = std::env::var("EMAIL_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Ok(Self {
            imap_host,
            imap_port,
            smtp_host,
            smtp_port,
            username,
            password: Arc::new(SecretString::from(password)),
            from_address,
        })
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

pub struct ImapMailbox {
    config: EmailConfig,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send an email via SMTP (blocking).
    fn send_email(
        config: &EmailConfig,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let send_failed = |reason: String| MailError::SendFailed {
            recipient: to.to_string(),
            reason,
        };

        let creds = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&config.smtp_host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(
                config
                    .from_address
                    .parse()
                    .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

        transport
            .send(&email)
            .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;

        info!(recipient = to, "Reply sent via SMTP");
        Ok(())
    }
}

#[async_trait]
impl MailSource for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_messages(&self) -> Result<Vec<RawMessage>, MailError> {
        let cfg = self.config.clone();
        let fetched = tokio::task::spawn_blocking(move || fetch_unseen_imap(&cfg))
            .await
            .map_err(|e| MailError::FetchFailed {
                source_name: "imap".into(),
                reason: format!("fetch task panicked: {e}"),
            })?
            .map_err(|e| MailError::FetchFailed {
                source_name: "imap".into(),
                reason: e.to_string(),
            })?;

        debug!(count = fetched.len(), "Fetched unseen emails");
        Ok(fetched)
    }

    async fn send_reply(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let cfg = self.config.clone();
        let (to, subject, body) = (recipient.to_string(), subject.to_string(), body.to_string());
        tokio::task::spawn_blocking(move || Self::send_email(&cfg, &to, &subject, &body))
            .await
            .map_err(|e| MailError::SendFailed {
                recipient: recipient.to_string(),
                reason: format!("send task panicked: {e}"),
            })?
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────

/// Quote a string for use as an IMAP astring.
fn quote_imap(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Extract the sender address and display name from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> Option<(String, Option<String>)> {
    let addr = parsed.from()?.first()?;
    let address = addr.address()?.to_string();
    let name = addr.name().map(|n| n.to_string());
    Some((address, name))
}

/// Extract readable text from a parsed email, preferring the plain part.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return text.to_string();
        }
    }
    String::new()
}

/// Convert one raw RFC 822 message into a [`RawMessage`].
pub fn parse_rfc822(raw: &[u8]) -> Option<RawMessage> {
    let parsed = MessageParser::default().parse(raw)?;
    let (sender, sender_name) = extract_sender(&parsed)?;
    let subject = parsed.subject().unwrap_or("(no subject)").to_string();
    let body = extract_text(&parsed);
    let id = parsed
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));
    let received_at = parsed
        .date()
        .and_then(|d| chrono::DateTime::from_timestamp(d.to_timestamp(), 0));

    Some(RawMessage {
        id,
        sender,
        sender_name,
        subject,
        body_preview: preview(body.trim(), MAX_PREVIEW_CHARS),
        received_at,
    })
}

/// Error type for IMAP fetch operations.
type ImapError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the server sent for one tagged command.
#[derive(Debug, Default)]
struct TaggedResponse {
    /// Response lines, the tagged status line last.
    lines: Vec<String>,
    /// `{n}` literals in arrival order, read byte-exact.
    literals: Vec<Vec<u8>>,
}

impl TaggedResponse {
    fn is_ok(&self, tag: &str) -> bool {
        self.lines
            .last()
            .is_some_and(|l| l.starts_with(&format!("{tag} OK")))
    }
}

fn read_line(stream: &mut impl Read) -> Result<String, ImapError> {
    let mut buf = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        match stream.read(&mut byte) {
            Ok(0) => return Err("IMAP connection closed".into()),
            Ok(_) => {
                buf.push(byte[0]);
                if buf.ends_with(b"\r\n") {
                    return Ok(String::from_utf8_lossy(&buf).to_string());
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Size of the literal announced at the end of `line` (`... {123}\r\n`).
fn literal_len(line: &str) -> Option<usize> {
    let rest = line.trim_end_matches("\r\n").strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].parse().ok()
}

/// Read until the status line for `tag`. Literals are consumed by length,
/// so message content can never be mistaken for a status line.
fn read_response(stream: &mut impl Read, tag: &str) -> Result<TaggedResponse, ImapError> {
    let status_prefix = format!("{tag} ");
    let mut response = TaggedResponse::default();
    loop {
        let line = read_line(stream)?;
        if let Some(len) = literal_len(&line) {
            let mut literal = vec![0u8; len];
            stream.read_exact(&mut literal)?;
            response.literals.push(literal);
            response.lines.push(line);
            continue;
        }
        let done = line.starts_with(&status_prefix);
        response.lines.push(line);
        if done {
            return Ok(response);
        }
    }
}

fn send_cmd<S: Read + Write>(
    stream: &mut S,
    tag: &str,
    cmd: &str,
) -> Result<TaggedResponse, ImapError> {
    let full = format!("{tag} {cmd}\r\n");
    stream.write_all(full.as_bytes())?;
    stream.flush()?;
    read_response(stream, tag)
}

/// Fetch unseen emails via raw IMAP over TLS (blocking, run in spawn_blocking).
fn fetch_unseen_imap(config: &EmailConfig) -> Result<Vec<RawMessage>, ImapError> {
    let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
    tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)?;
    let mut tls = rustls::StreamOwned::new(conn, tcp);

    let _greeting = read_line(&mut tls)?;

    let login = format!(
        "LOGIN {} {}",
        quote_imap(&config.username),
        quote_imap(config.password.expose_secret())
    );
    if !send_cmd(&mut tls, "A1", &login)?.is_ok("A1") {
        return Err("IMAP login failed".into());
    }

    // EXAMINE opens read-only; nothing in the mailbox changes.
    if !send_cmd(&mut tls, "A2", "EXAMINE \"INBOX\"")?.is_ok("A2") {
        return Err("IMAP EXAMINE INBOX failed".into());
    }

    let search_resp = send_cmd(&mut tls, "A3", "SEARCH UNSEEN")?;
    let mut ids: Vec<&str> = Vec::new();
    for line in &search_resp.lines {
        if line.starts_with("* SEARCH") {
            ids.extend(line.split_whitespace().skip(2));
        }
    }

    let mut results = Vec::new();
    let mut tag_counter = 4_u32;

    for id in &ids {
        let fetch_tag = format!("A{tag_counter}");
        tag_counter += 1;
        let fetch_resp = send_cmd(&mut tls, &fetch_tag, &format!("FETCH {id} BODY.PEEK[]"))?;

        match fetch_resp.literals.first().and_then(|raw| parse_rfc822(raw)) {
            Some(msg) => results.push(msg),
            None => debug!(seq = %id, "Skipping unparseable message"),
        }
    }

    let logout_tag = format!("A{tag_counter}");
    let _ = send_cmd(&mut tls, &logout_tag, "LOGOUT");

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const PLAIN: &str = "From: Bob Builder <bob@example.com>\r\n\
        To: parts@example.com\r\n\
        Subject: Broken keyboard\r\n\
        Message-ID: <abc123@example.com>\r\n\
        Date: Mon, 02 Mar 2026 10:00:00 +0000\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        Hi, Service Tag: 7XK2LM3 keyboard keys stuck.\r\n";

    #[test]
    fn parses_plain_message() {
        let msg = parse_rfc822(PLAIN.as_bytes()).unwrap();
        assert_eq!(msg.sender, "bob@example.com");
        assert_eq!(msg.sender_name.as_deref(), Some("Bob Builder"));
        assert_eq!(msg.subject, "Broken keyboard");
        assert_eq!(msg.id, "abc123@example.com");
        assert!(msg.body_preview.contains("Service Tag: 7XK2LM3"));
        assert!(msg.received_at.is_some());
    }

    #[test]
    fn html_only_message_is_stripped() {
        let raw = "From: carol@example.com\r\n\
            Subject: Charger\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <p>Need a <b>charger</b> for Model: X1</p>\r\n";
        let msg = parse_rfc822(raw.as_bytes()).unwrap();
        assert!(msg.body_preview.contains("charger"));
        assert!(!msg.body_preview.contains("<b>"));
        assert!(msg.id.starts_with("gen-"));
    }

    #[test]
    fn message_without_sender_is_skipped() {
        let raw = "Subject: orphan\r\n\r\nbody\r\n";
        assert!(parse_rfc822(raw.as_bytes()).is_none());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let raw = format!(
            "From: dan@example.com\r\nSubject: long\r\n\r\n{}\r\n",
            "x".repeat(MAX_PREVIEW_CHARS * 2)
        );
        let msg = parse_rfc822(raw.as_bytes()).unwrap();
        assert_eq!(msg.body_preview.chars().count(), MAX_PREVIEW_CHARS);
    }

    fn fetch_reply(tag: &str, body: &str) -> Vec<u8> {
        format!(
            "* 1 FETCH (BODY[] {{{}}}\r\n{body})\r\n{tag} OK FETCH completed\r\n",
            body.len()
        )
        .into_bytes()
    }

    #[test]
    fn literal_is_read_by_length() {
        let body = "From: a@example.com\r\n\r\nA4 toner is empty\r\nA4 OK not really\r\n";
        let mut stream = Cursor::new(fetch_reply("A4", body));

        let response = read_response(&mut stream, "A4").unwrap();

        assert_eq!(response.literals, [body.as_bytes()]);
        assert!(response.is_ok("A4"));
        assert_eq!(stream.position() as usize, stream.get_ref().len());
    }

    #[test]
    fn status_line_needs_exact_tag() {
        let mut stream = Cursor::new(b"A40 OK other\r\nA4 OK mine\r\n".to_vec());
        let response = read_response(&mut stream, "A4").unwrap();
        assert_eq!(response.lines, ["A40 OK other\r\n", "A4 OK mine\r\n"]);
    }

    #[test]
    fn commands_after_a_literal_stay_in_sync() {
        let mut wire = fetch_reply("A4", "Subject: x\r\n\r\nA5 BAD\r\n");
        wire.extend_from_slice(b"A5 OK LOGOUT completed\r\n");
        let mut stream = Cursor::new(wire);

        read_response(&mut stream, "A4").unwrap();
        let logout = read_response(&mut stream, "A5").unwrap();
        assert_eq!(logout.lines, ["A5 OK LOGOUT completed\r\n"]);
    }

    #[test]
    fn literal_sizes_are_parsed() {
        assert_eq!(literal_len("* 3 FETCH (BODY[] {2048}\r\n"), Some(2048));
        assert_eq!(literal_len("* 3 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(literal_len("A4 OK done\r\n"), None);
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut stream = Cursor::new(b"* 1 FETCH (BODY[] {100}\r\nshort".to_vec());
        assert!(read_response(&mut stream, "A4").is_err());
    }

    #[test]
    fn non_ok_status_is_not_ok() {
        let mut stream = Cursor::new(b"A1 NO [AUTHENTICATIONFAILED] nope\r\n".to_vec());
        assert!(!read_response(&mut stream, "A1").unwrap().is_ok("A1"));
    }

    #[test]
    fn imap_strings_are_quoted() {
        assert_eq!(quote_imap("plain"), "\"plain\"");
        assert_eq!(quote_imap(r#"pa"ss\word"#), r#""pa\"ss\\word""#);
    }

    #[test]
    fn config_from_env_requires_host() {
        // SAFETY: no other test in this crate reads EMAIL_IMAP_HOST.
        unsafe { std::env::remove_var("EMAIL_IMAP_HOST") };
        assert!(matches!(
            EmailConfig::from_env(),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn mailbox_name() {
        let config = EmailConfig {
            imap_host: "imap.test.com".into(),
            imap_port: 993,
            smtp_host: "smtp.test.com".into(),
            smtp_port: 587,
            username: "user".into(),
            password: Arc::new(SecretString::from("pass".to_string())),
            from_address: "user@test.com".into(),
        };
        assert_eq!(ImapMailbox::new(config).name(), "imap");
    }
}
