use chrono::{DateTime, Utc};
use ratatui::{prelude::*, widgets::*};

use crate::app::state::NoticeLevel;
use crate::models::{SignerInfo, SncrStatus};

/// Color of the status-line notice by severity
pub fn notice_color(level: NoticeLevel) -> Color {
    match level {
        NoticeLevel::Info => Color::Cyan,
        NoticeLevel::Success => Color::Green,
        NoticeLevel::Error => Color::Red,
    }
}

/// Badge color of a registry number, mirroring the status chips
pub fn sncr_status_color(status: SncrStatus) -> Color {
    match status {
        SncrStatus::Disponivel => Color::Green,
        SncrStatus::Utilizado => Color::Yellow,
        SncrStatus::Cancelado => Color::DarkGray,
    }
}

/// Signature status line of a prescription or procedure
pub fn signature_summary(
    is_signed: bool,
    signed_by: Option<&SignerInfo>,
    signed_at: Option<DateTime<Utc>>,
) -> String {
    if !is_signed {
        return "Aguardando assinatura".to_string();
    }
    let name = signed_by
        .map(|s| s.full_name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("N/A");
    match signed_at {
        Some(at) => format!("Assinado por {} em {}", name, at.format("%d/%m/%Y %H:%M")),
        None => format!("Assinado por {}", name),
    }
}

/// Renders a bordered text input field
pub fn render_input<'a>(
    content: &'a str,
    title: &'a str,
    is_active: bool,
    is_editing: bool,
) -> Paragraph<'a> {
    let border_style = if is_active && is_editing {
        Style::default().fg(Color::Yellow)
    } else if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ", title));

    Paragraph::new(content).block(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_summary() {
        assert_eq!(
            signature_summary(false, None, None),
            "Aguardando assinatura"
        );
    }

    #[test]
    fn test_signed_summary_includes_signer_and_time() {
        let signer = SignerInfo {
            id: Some(1),
            full_name: "Dra. Ana Souza".to_string(),
            crm: Some("12345".to_string()),
        };
        let at = DateTime::parse_from_rfc3339("2024-05-01T14:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let summary = signature_summary(true, Some(&signer), Some(at));
        assert!(summary.contains("Dra. Ana Souza"));
        assert!(summary.contains("01/05/2024"));
    }

    #[test]
    fn test_signed_summary_without_signer_falls_back() {
        assert_eq!(signature_summary(true, None, None), "Assinado por N/A");
    }
}
