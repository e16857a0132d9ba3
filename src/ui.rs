use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use lectern::{
    util::{format_clock, format_overtime},
    CueKind, SessionPhase, Snapshot,
};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn cue_banner(cue: CueKind) -> (&'static str, Color) {
    match cue {
        CueKind::Warning => ("WARNING", Color::Yellow),
        CueKind::ProtectedStart => ("PROTECTED TIME", Color::Magenta),
        CueKind::ProtectedEnd => ("OPEN FOR QUESTIONS", Color::Cyan),
        CueKind::End => ("TIME", Color::Red),
    }
}

fn clock_color(snap: &Snapshot, warning_seconds: Option<u32>) -> Color {
    if snap.is_overtime {
        Color::Red
    } else if warning_seconds.is_some_and(|w| snap.remaining_seconds <= w) {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "NO FORMAT",
        SessionPhase::Ready => "READY",
        SessionPhase::Running => "RUNNING",
        SessionPhase::Paused => "PAUSED",
        SessionPhase::Overtime => "OVERTIME",
        SessionPhase::Finished => "FINISHED",
    }
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snap = self.controller.snapshot();

        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // format / stage header
                Constraint::Length(1), // padding
                Constraint::Length(1), // clock
                Constraint::Length(1), // phase
                Constraint::Length(1), // cue banner
                Constraint::Length(1), // padding
                Constraint::Min(0),    // stage list
                Constraint::Length(1), // notice
                Constraint::Length(1), // legend
            ])
            .split(area);

        let header = match (&snap.format_name, &snap.stage_name, snap.stage_index) {
            (Some(format), Some(stage), Some(index)) => format!(
                "{}  ·  {} ({}/{})",
                format,
                stage,
                index + 1,
                snap.stage_count
            ),
            _ => String::from("no format selected"),
        };
        Paragraph::new(Span::styled(header, bold_style))
            .alignment(Alignment::Center)
            .render(chunks[0], buf);

        let warning_seconds = self.controller.cue_config().warning_seconds;
        let clock_style = bold_style.fg(clock_color(&snap, warning_seconds));
        let mut clock = vec![Span::styled(format_clock(snap.remaining_seconds), clock_style)];
        if snap.is_overtime {
            clock.push(Span::raw("  "));
            clock.push(Span::styled(
                format_overtime(self.overtime_secs),
                Style::default().fg(Color::Red),
            ));
        }
        Paragraph::new(Line::from(clock))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        let mut status = vec![Span::styled(phase_label(snap.phase), dim_style)];
        if snap.is_overtime && !snap.is_running {
            status.push(Span::styled(" (paused)", dim_style));
        }
        if snap.in_protected_window && snap.phase != SessionPhase::Finished {
            status.push(Span::raw("  "));
            status.push(Span::styled(
                "PROTECTED",
                Style::default().fg(Color::Magenta),
            ));
        }
        Paragraph::new(Line::from(status))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);

        if let Some(flash) = &self.flash {
            let (text, color) = cue_banner(flash.cue);
            Paragraph::new(Span::styled(
                text,
                Style::default()
                    .fg(color)
                    .add_modifier(Modifier::BOLD | Modifier::REVERSED),
            ))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
        }

        if let Some(format) = self.controller.format() {
            let rows = chunks[6].height as usize;
            let current = snap.stage_index.unwrap_or(0);
            // keep the active stage in view
            let first = current
                .saturating_sub(rows / 2)
                .min(format.len().saturating_sub(rows));
            let name_width = format
                .stages()
                .iter()
                .map(|s| s.name().width())
                .max()
                .unwrap_or(0);

            let lines: Vec<Line> = format
                .stages()
                .iter()
                .enumerate()
                .skip(first)
                .take(rows)
                .map(|(i, stage)| {
                    let style = if i == current {
                        bold_style.fg(Color::Cyan)
                    } else if i < current {
                        dim_style
                    } else {
                        Style::default()
                    };
                    let marker = if i == current { "▶" } else { " " };
                    let pad = " ".repeat(name_width - stage.name().width());
                    let protected = stage
                        .protected_window_seconds()
                        .map(|w| format!("  [{}s protected]", w))
                        .unwrap_or_default();
                    Line::from(Span::styled(
                        format!(
                            "{} {}. {}{}  {}{}",
                            marker,
                            i + 1,
                            stage.name(),
                            pad,
                            format_clock(stage.duration_seconds()),
                            protected
                        ),
                        style,
                    ))
                })
                .collect();

            Paragraph::new(lines).render(chunks[6], buf);
        }

        if let Some(notice) = &self.notice {
            Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[7], buf);
        }

        Paragraph::new(Span::styled(
            "(space) start/pause / (n)ext / (1-9) jump / (r)eset / (s)top / (tab) format / (esc)ape",
            italic_style,
        ))
        .render(chunks[8], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(remaining: u32, overtime: bool) -> Snapshot {
        Snapshot {
            phase: if overtime {
                SessionPhase::Overtime
            } else {
                SessionPhase::Running
            },
            format_name: Some("Mini".into()),
            stage_name: Some("Rebuttal".into()),
            stage_index: Some(1),
            stage_count: 2,
            duration_seconds: 240,
            remaining_seconds: remaining,
            is_running: true,
            is_overtime: overtime,
            in_protected_window: false,
        }
    }

    #[test]
    fn test_clock_color() {
        assert_eq!(clock_color(&snap(120, false), Some(60)), Color::Green);
        assert_eq!(clock_color(&snap(60, false), Some(60)), Color::Yellow);
        assert_eq!(clock_color(&snap(30, false), None), Color::Green);
        assert_eq!(clock_color(&snap(0, true), Some(60)), Color::Red);
    }

    #[test]
    fn test_cue_banners_are_distinct() {
        let banners: std::collections::HashSet<_> = [
            CueKind::Warning,
            CueKind::ProtectedStart,
            CueKind::ProtectedEnd,
            CueKind::End,
        ]
        .into_iter()
        .map(|c| cue_banner(c).0)
        .collect();
        assert_eq!(banners.len(), 4);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(phase_label(SessionPhase::Overtime), "OVERTIME");
        assert_eq!(phase_label(SessionPhase::Ready), "READY");
    }
}
