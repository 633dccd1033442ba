//! Operator-facing terminal output for a running session.

use std::sync::LazyLock;
use std::time::Duration;

use colored::{Color, Colorize};
use local_forwarder::{ForwardReport, ResponsePreview, WebhookRequest};
use regex::Regex;
use tunnel_session::{
    CloseInfo, ConnectionDetails, ErrorKind, SessionObserver, StatsSummary,
};

/// Public URL webhooks are sent to, `<base>/<user>/<endpoint>`.
const PUBLIC_RELAY_BASE: &str = "https://hooktunnel.dev/r";

const RULE_WIDTH: usize = 58;

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());

/// Renders session events to stdout.
pub struct ConsoleObserver {
    user_label: String,
}

impl ConsoleObserver {
    pub fn new(user_label: impl Into<String>) -> Self {
        Self {
            user_label: user_label.into(),
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_connect(&self, details: &ConnectionDetails) {
        println!("{}", "✨ Connected to hooktunnel".green().bold());
        println!();

        let mut lines = vec!["Connection Details".white().bold().to_string(), String::new()];
        let endpoint = match &details.endpoint {
            Some(endpoint) => endpoint.cyan(),
            None => "All endpoints".yellow(),
        };
        lines.push(format!("{}     {endpoint}", "📍 Endpoint:".blue()));
        if let Some(endpoint) = &details.endpoint {
            lines.push(format!(
                "{}    {}",
                "🔗 Relay URL:".blue(),
                public_relay_url(&details.user_id, endpoint).cyan()
            ));
        }
        let suffix = match &details.path_override {
            Some(path) => format!("/{path}"),
            None => "/{targetUrl}".to_string(),
        };
        lines.push(format!(
            "{}   {}{}",
            "🎯 Forwarding:".blue(),
            details.forward_base.cyan(),
            suffix.dimmed()
        ));
        lines.push(format!("{}         {}", "👤 User:".blue(), self.user_label.white()));

        println!("{}", draw_box(&lines, Color::Blue));
        println!();
        println!("{} {}", "✓".green().bold(), "Ready to receive webhooks".white());
        println!("{}", "  Press Ctrl+C to stop\n".dimmed());
    }

    fn on_session_assigned(&self, session_id: &str) {
        println!("{} {}", "🔌 Session ID:".dimmed(), session_id.cyan());
        println!();
    }

    fn on_delivery_started(&self, request: &WebhookRequest, target_url: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        println!();
        println!(
            "{} {}",
            " 🎣 INCOMING WEBHOOK ".on_blue().white().bold(),
            format!("at {timestamp}").dimmed()
        );
        println!("{}", format!("┌{}┐", "─".repeat(RULE_WIDTH)).blue());
        println!(
            "{} {} {}",
            "│".blue(),
            method_badge(&request.method),
            request.display_path().cyan()
        );
        println!("{} {} {}", "│".blue(), "→".dimmed(), target_url.white());
    }

    fn on_delivery(&self, report: &ForwardReport) {
        let elapsed = format_duration(report.outcome.elapsed);
        println!("{}", "│".blue());

        if let Some(err) = report.outcome.error() {
            println!("{} {} {}", "│".blue(), "✗ ERROR".red().bold(), err.red());
            println!("{} {elapsed}", "│".blue());
            println!("{}", format!("└{}┘", "─".repeat(RULE_WIDTH)).blue());
            println!();
            println!(
                "{} {} {} {}",
                "💡 Tip:".yellow(),
                "Is your local server running at".white(),
                report.target_url.cyan(),
                "?".white()
            );
            return;
        }

        let Some(response) = &report.response else {
            return;
        };
        let reason = response
            .reason
            .as_deref()
            .map(|r| format!("({r})").dimmed().to_string())
            .unwrap_or_default();
        println!(
            "{} {} {} {elapsed} {reason}",
            "│".blue(),
            "←".dimmed(),
            status_badge(response.status)
        );
        if let Some(length) = response.content_length {
            println!(
                "{} {}",
                "│".blue(),
                format!("   Size: {} KB", size_kb(length)).dimmed()
            );
        }
        println!("{}", format!("└{}┘", "─".repeat(RULE_WIDTH)).blue());
    }

    fn on_response_preview(&self, preview: &ResponsePreview) {
        match preview {
            ResponsePreview::Json(json) => println!("📦 JSON Response: {json}"),
            ResponsePreview::Text(text) => println!("📝 Text Response: {text}"),
            ResponsePreview::Other(text) => println!("📝 Response: {text}"),
            ResponsePreview::Image { size } => println!("🖼️ Image Response - Size: {size} bytes"),
            ResponsePreview::Pdf { size } => println!("📄 PDF Response - Size: {size} bytes"),
            ResponsePreview::Binary { content_type, size } => println!(
                "📦 Binary Response - Type: {} Size: {size} bytes",
                content_type.as_deref().unwrap_or("unknown")
            ),
            ResponsePreview::Empty => println!("{}", "📭 Empty response".dimmed()),
        }
    }

    fn on_settings_updated(&self) {
        println!("{}", "⚙️  User settings updated".dimmed());
    }

    fn on_unknown_message(&self, kind: &str) {
        println!("{} {}", "⚠️  Unknown message type:".yellow(), kind.white());
    }

    fn on_stats_tick(&self, summary: &StatsSummary) {
        print_stats(summary);
    }

    fn on_error(&self, kind: ErrorKind, detail: &str) {
        match kind {
            ErrorKind::Decode => {
                eprintln!("{} {detail}", "✗ Message processing error:".red());
            }
            ErrorKind::SettingsPersist => {
                eprintln!("{} {detail}", "⚠️  Could not save user settings:".yellow());
            }
            ErrorKind::Transport => {
                eprintln!("{}", "Connection failed".red());
                eprintln!("{} {detail}", "\n✗ Error:".red().bold());
                let lines = vec![
                    "Troubleshooting".yellow().bold().to_string(),
                    String::new(),
                    "• Is the hooktunnel server running?".white().to_string(),
                    "• Check your network connection".white().to_string(),
                    "• Verify your API key is valid".white().to_string(),
                    format!("{}{}", "• Try running:".white(), " hooktunnel login".cyan()),
                ];
                eprintln!("\n{}", draw_box(&lines, Color::Yellow));
                eprintln!();
            }
        }
    }

    fn on_shutdown_requested(&self) {
        println!("{}", "\n\n👋 Shutting down gracefully...".yellow());
    }

    fn on_disconnect(&self, close: &CloseInfo, summary: &StatsSummary) {
        println!();
        print_stats(summary);
        println!();
        println!("{}", "✗ Disconnected from hooktunnel".red().bold());
        if let Some(reason) = &close.reason {
            println!("{}", format!("  Reason: {reason}").dimmed());
        }
        let code = close
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!("{}", format!("  Code: {code}\n").dimmed());
    }
}

fn print_stats(summary: &StatsSummary) {
    let sep = "│".dimmed();
    println!("{}", format!("\n{}", "─".repeat(60)).dimmed());
    println!(
        "{} {} {sep} {} {sep} {} {sep} {} {sep} {} {sep} {}",
        "📊 Stats:".blue(),
        format!("{} requests", summary.total).white(),
        format!("{} success", summary.success).green(),
        format!("{} failed", summary.failure).red(),
        format!("{:.1}% success rate", summary.success_rate_percent).cyan(),
        format!("{}ms avg", summary.avg_latency.as_millis()).magenta(),
        format!("{}s uptime", summary.uptime.as_secs()).yellow(),
    );
    println!("{}", "─".repeat(60).dimmed());
}

pub fn public_relay_url(user_id: &str, endpoint: &str) -> String {
    format!("{PUBLIC_RELAY_BASE}/{user_id}/{endpoint}")
}

/// Frame `lines` in a rounded box, padding each to the widest visible width.
pub fn draw_box(lines: &[String], color: Color) -> String {
    let width = lines.iter().map(|l| visible_width(l)).max().unwrap_or(0);
    let rule = "─".repeat(width + 2);

    let mut out = Vec::with_capacity(lines.len() + 2);
    out.push(format!("╭{rule}╮").color(color).to_string());
    for line in lines {
        let padding = " ".repeat(width - visible_width(line));
        out.push(format!(
            "{}{line}{padding}{}",
            "│ ".color(color),
            " │".color(color)
        ));
    }
    out.push(format!("╰{rule}╯").color(color).to_string());
    out.join("\n")
}

fn visible_width(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").chars().count()
}

pub fn status_color(status: u16) -> Color {
    match status {
        200..=299 => Color::Green,
        300..=399 => Color::Blue,
        400..=499 => Color::Yellow,
        _ => Color::Red,
    }
}

fn status_badge(status: u16) -> String {
    let fg = if status_color(status) == Color::Red {
        Color::White
    } else {
        Color::Black
    };
    format!(" {status} ")
        .on_color(status_color(status))
        .color(fg)
        .bold()
        .to_string()
}

pub fn method_color(method: &str) -> Color {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Color::Green,
        "POST" => Color::Blue,
        "PUT" => Color::Yellow,
        "DELETE" => Color::Red,
        "PATCH" => Color::Magenta,
        _ => Color::BrightBlack,
    }
}

fn method_badge(method: &str) -> String {
    format!(" {:<6} ", method.to_ascii_uppercase())
        .on_color(method_color(method))
        .black()
        .bold()
        .to_string()
}

pub fn latency_color(elapsed: Duration) -> Color {
    match elapsed.as_millis() {
        0..=99 => Color::Green,
        100..=499 => Color::Yellow,
        _ => Color::Red,
    }
}

fn format_duration(elapsed: Duration) -> String {
    format!("{}ms", elapsed.as_millis())
        .color(latency_color(elapsed))
        .to_string()
}

pub fn size_kb(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_thresholds() {
        assert_eq!(latency_color(Duration::from_millis(0)), Color::Green);
        assert_eq!(latency_color(Duration::from_millis(99)), Color::Green);
        assert_eq!(latency_color(Duration::from_millis(100)), Color::Yellow);
        assert_eq!(latency_color(Duration::from_millis(499)), Color::Yellow);
        assert_eq!(latency_color(Duration::from_millis(500)), Color::Red);
    }

    #[test]
    fn status_classes() {
        assert_eq!(status_color(204), Color::Green);
        assert_eq!(status_color(302), Color::Blue);
        assert_eq!(status_color(404), Color::Yellow);
        assert_eq!(status_color(503), Color::Red);
        assert_eq!(status_color(101), Color::Red);
    }

    #[test]
    fn method_colors_ignore_case() {
        assert_eq!(method_color("post"), Color::Blue);
        assert_eq!(method_color("PATCH"), Color::Magenta);
        assert_eq!(method_color("OPTIONS"), Color::BrightBlack);
    }

    #[test]
    fn sizes_in_kilobytes() {
        assert_eq!(size_kb(1024), "1.00");
        assert_eq!(size_kb(1536), "1.50");
        assert_eq!(size_kb(0), "0.00");
    }

    #[test]
    fn box_lines_share_a_width() {
        let lines = vec![
            "Connection Details".bold().to_string(),
            String::new(),
            format!("{} stripe", "Endpoint:".blue()),
        ];
        let rendered = draw_box(&lines, Color::Blue);
        let widths: Vec<usize> = rendered.lines().map(visible_width).collect();

        assert_eq!(widths.len(), 5);
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert_eq!(widths[0], "Connection Details".len() + 4);
    }

    #[test]
    fn relay_url() {
        assert_eq!(
            public_relay_url("u1", "stripe"),
            "https://hooktunnel.dev/r/u1/stripe"
        );
    }
}
