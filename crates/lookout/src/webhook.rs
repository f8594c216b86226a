use http::StatusCode;
use isahc::{ReadResponseExt, RequestExt};
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::diff::Diff;
use crate::fetch::{NetworkError, USER_AGENT};

/// Discord refuses message content longer than this many characters.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const FENCE: &str = "```";

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("failed to encode webhook payload")]
    Encoding(#[from] serde_json::Error),

    #[error("network error")]
    Network(#[from] NetworkError),

    #[error("discord responded with {0}")]
    Status(StatusCode),
}

/// Something that can deliver a message to a third party.
pub trait Notify {
    fn notify(&self, message: &str) -> Result<(), WebhookError>;
}

#[derive(Serialize, Debug)]
struct WebhookMessage<'a> {
    username: &'a str,
    content: &'a str,
}

/// Posts plain messages to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: Url,
}

impl DiscordWebhook {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl Notify for DiscordWebhook {
    #[tracing::instrument(skip_all, fields(message_length = message.len()))]
    fn notify(&self, message: &str) -> Result<(), WebhookError> {
        tracing::info!("sending update message to Discord");

        let payload = WebhookMessage {
            username: "lookout",
            content: message,
        };
        tracing::debug!(?payload, "webhook payload");

        let mut response = isahc::Request::post(self.url.as_str())
            .header("content-type", "application/json")
            .header("user-agent", USER_AGENT)
            .body(serde_json::to_vec(&payload)?)
            .map_err(NetworkError::Http)?
            .send()
            .map_err(NetworkError::Isahc)?;

        let status = response.status();
        tracing::info!("received {} from discord", status);

        let body_string = response.text().map_err(NetworkError::Io)?;
        if !body_string.is_empty() {
            tracing::info!("discord response body: {}", body_string);
        }

        if !status.is_success() {
            return Err(WebhookError::Status(status));
        }

        Ok(())
    }
}

fn truncation_marker(omitted: usize) -> String {
    format!("... ({} more lines)", omitted)
}

/// Lines are never clipped shorter than this to make room for other lines.
const MIN_CLIPPED_WIDTH: usize = 80;

const ELLIPSIS: char = '…';

/// Cuts `line` down to `width` characters plus an ellipsis.
fn clip(line: &str, width: usize) -> String {
    match line.char_indices().nth(width) {
        Some((cut, _)) => format!("{}{}", &line[..cut], ELLIPSIS),
        None => line.to_owned(),
    }
}

fn clipped_len(line_len: usize, width: usize) -> usize {
    if line_len > width {
        width + 1
    } else {
        line_len
    }
}

/// Formats a diff as a fenced code block, without the `---`/`+++` header lines.
///
/// Long lines are clipped first, all to the same width, so that every line
/// fits within `limit` characters. If that isn't enough, the trailing lines
/// are replaced with a marker saying how many were left out.
pub fn format_diff_message(diff: &Diff, limit: usize) -> String {
    let unified = diff.unified();
    let lines = unified.split('\n').skip(2).collect::<Vec<_>>();
    let line_lens = lines
        .iter()
        .map(|line| line.chars().count())
        .collect::<Vec<_>>();

    // Opening fence, closing fence, and the newlines separating them from the body.
    let overhead = FENCE.len() * 2 + 2;
    let fits = |width: usize| {
        let body = line_lens
            .iter()
            .map(|&len| clipped_len(len, width))
            .sum::<usize>()
            + lines.len().saturating_sub(1);
        overhead + body <= limit
    };

    let widest = line_lens.iter().copied().max().unwrap_or(0);
    let width = if fits(widest) {
        widest
    } else if !fits(MIN_CLIPPED_WIDTH) {
        MIN_CLIPPED_WIDTH
    } else {
        // `low` always fits and `high` never does.
        let (mut low, mut high) = (MIN_CLIPPED_WIDTH, widest);
        while high - low > 1 {
            let mid = low + (high - low) / 2;
            if fits(mid) {
                low = mid;
            } else {
                high = mid;
            }
        }
        low
    };

    let mut used = overhead;
    let mut kept: Vec<String> = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let line = clip(line, width);
        let separator = usize::from(!kept.is_empty());
        let cost = separator + line.chars().count();

        let left_after = lines.len() - index - 1;
        let reserve = if left_after > 0 {
            1 + truncation_marker(left_after).chars().count()
        } else {
            0
        };

        if used + cost + reserve > limit {
            kept.push(truncation_marker(lines.len() - index));
            break;
        }

        used += cost;
        kept.push(line);
    }

    format!("{fence}\n{}\n{fence}", kept.join("\n"), fence = FENCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_server::{response, StubServer};

    #[test]
    fn test_message_is_fenced_without_headers() {
        let diff = Diff::between("<html>old</html>", "<html>new</html>");
        let message = format_diff_message(&diff, DISCORD_MESSAGE_LIMIT);

        assert_eq!(
            message,
            "```\n@@ -1 +1 @@\n-<html>old</html>\n+<html>new</html>\n```"
        );
        assert!(!message.contains("--- "));
        assert!(!message.contains("+++ "));
    }

    #[test]
    fn test_long_diffs_are_truncated() {
        let old = (0..500).map(|n| format!("line {}", n)).collect::<Vec<_>>();
        let new = old
            .iter()
            .map(|line| format!("{} (edited)", line))
            .collect::<Vec<_>>();

        let diff = Diff::between(&old.join("\n"), &new.join("\n"));
        let message = format_diff_message(&diff, DISCORD_MESSAGE_LIMIT);

        assert!(message.chars().count() <= DISCORD_MESSAGE_LIMIT);
        assert!(message.starts_with("```\n@@ -1,500 +1,500 @@\n-line 0\n"));
        assert!(message.ends_with(" more lines)\n```"));
    }

    #[test]
    fn test_truncation_keeps_message_within_limit() {
        let diff = Diff::between("a\nb\nc", "a\nB\nc");

        let message = format_diff_message(&diff, DISCORD_MESSAGE_LIMIT);
        assert_eq!(message, "```\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n```");

        let message = format_diff_message(&diff, 45);
        assert_eq!(message, "```\n@@ -1,3 +1,3 @@\n a\n... (3 more lines)\n```");
        assert_eq!(message.chars().count(), 45);
    }

    #[test]
    fn test_oversized_changed_lines_are_clipped() {
        let filler = "x".repeat(3000);
        let old = format!("<html>{}old</html>", filler);
        let new = format!("<html>{}new</html>", filler);

        let diff = Diff::between(&old, &new);
        let message = format_diff_message(&diff, DISCORD_MESSAGE_LIMIT);

        assert!(message.chars().count() <= DISCORD_MESSAGE_LIMIT);
        assert!(!message.contains("more lines)"));

        let lines = message.split('\n').collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "@@ -1 +1 @@");
        assert!(lines[2].starts_with("-<html>xxxx"));
        assert!(lines[2].ends_with(ELLIPSIS));
        assert!(lines[3].starts_with("+<html>xxxx"));
        assert!(lines[3].ends_with(ELLIPSIS));
        assert_eq!(lines[2].chars().count(), lines[3].chars().count());
    }

    #[test]
    fn test_clipping_respects_char_boundaries() {
        assert_eq!(clip("ééééé", 3), "ééé…");
        assert_eq!(clip("short", 80), "short");
        assert_eq!(clip("exact", 5), "exact");
    }

    #[test]
    fn test_notify_posts_json_message() {
        let server = StubServer::start(|_| response("204 No Content", &[], ""));
        let webhook = DiscordWebhook::new(server.url("/api/webhooks/1/token"));

        webhook.notify("```\n-old\n+new\n```").unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/webhooks/1/token");
        assert_eq!(request.header("content-type"), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "username": "lookout",
                "content": "```\n-old\n+new\n```"
            })
        );
    }

    #[test]
    fn test_notify_rejection_is_an_error() {
        let server = StubServer::start(|_| {
            response(
                "400 Bad Request",
                &[("Content-Type", "application/json")],
                r#"{"content": ["Must be 2000 or fewer in length."]}"#,
            )
        });
        let webhook = DiscordWebhook::new(server.url("/api/webhooks/1/token"));

        let err = webhook.notify("too long").unwrap_err();

        assert!(matches!(err, WebhookError::Status(status) if status == StatusCode::BAD_REQUEST));
    }
}
