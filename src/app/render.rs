use super::*;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};
use ratatui::Frame;

use crate::canvas::{Item, ItemData};
use crate::merge::{merge_spans, MergeKind};

impl App {
    /// Width the transcript paragraph wraps to; must match the layout in
    /// [`draw`] or the cached scroll bounds drift.
    pub(super) fn transcript_width(&self) -> u16 {
        let canvas_w = canvas_pane_width(self.viewport_width);
        self.viewport_width
            .saturating_sub(canvas_w)
            .saturating_sub(2)
    }

    /// Interior height of the transcript pane: viewport minus the composer,
    /// the status row and the pane borders.
    pub(super) fn transcript_height(&self) -> u16 {
        let input_rows = self
            .input_height(self.transcript_width(), 2)
            .saturating_add(2);
        self.viewport_height
            .saturating_sub(input_rows)
            .saturating_sub(1)
            .saturating_sub(2)
            .max(1)
    }

    pub(super) fn transcript_lines(&self) -> Vec<Line<'static>> {
        let palette = self.theme_palette();
        let mut lines = Vec::new();
        for entry in &self.entries {
            let style = palette.entry_style(entry.kind);
            let label = match entry.kind {
                EntryKind::User => "you",
                EntryKind::Assistant => "agent",
                EntryKind::System => "*",
                EntryKind::Action => ">",
                EntryKind::Error => "!",
            };
            let mut first = true;
            for text_line in entry.text.lines() {
                let prefix = if first {
                    format!("{label:>5} ")
                } else {
                    "      ".to_string()
                };
                first = false;
                lines.push(Line::from(vec![
                    Span::styled(prefix, Style::default().fg(palette.muted_text)),
                    Span::styled(text_line.to_string(), style),
                ]));
            }
            if entry.text.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("{label:>5} "),
                    Style::default().fg(palette.muted_text),
                )));
            }
        }
        lines
    }
}

fn canvas_pane_width(total: u16) -> u16 {
    (total / 5 * 2).clamp(20, total.saturating_sub(20).max(20))
}

pub(super) fn draw(f: &mut Frame, app: &App) {
    let palette = app.theme_palette();
    let area = f.area();
    let canvas_w = canvas_pane_width(area.width);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(canvas_w), Constraint::Min(10)])
        .split(area);

    draw_canvas_pane(f, app, columns[0], palette);
    draw_chat_pane(f, app, columns[1], palette);

    match app.mode {
        Mode::SelectAngle => draw_angle_modal(f, app, area, palette),
        Mode::Rename => draw_rename_modal(f, app, area, palette),
        Mode::ClearAll => draw_clear_all_modal(f, area, palette),
        _ => {}
    }
}

pub(super) fn draw_exit(f: &mut Frame, _app: &App) {
    f.render_widget(Clear, f.area());
}

fn draw_canvas_pane(f: &mut Frame, app: &App, area: Rect, palette: ThemePalette) {
    let state = app.canvas.state();
    let mut lines: Vec<Line> = Vec::new();

    let title = if state.global_title.is_empty() {
        "Untitled canvas".to_string()
    } else {
        state.global_title.clone()
    };
    lines.push(Line::from(Span::styled(title, palette.title_style())));
    if !state.global_description.is_empty() {
        lines.push(Line::from(Span::styled(
            state.global_description.clone(),
            Style::default().fg(palette.muted_text),
        )));
    }
    lines.push(Line::default());

    lines.push(Line::from(Span::styled(
        "story",
        Style::default().fg(palette.muted_text),
    )));
    lines.extend(story_lines(app, palette));
    lines.push(Line::default());

    lines.push(Line::from(Span::styled(
        format!("cards ({})", state.items.len()),
        Style::default().fg(palette.muted_text),
    )));
    for item in &state.items {
        lines.extend(card_lines(item, palette));
    }

    if let Some(gate) = &app.gate {
        lines.push(Line::default());
        let hint = match gate.status {
            GateStatus::Streaming => "proposal streaming...".to_string(),
            GateStatus::Deciding => "accept proposal? [y] yes  [n] no".to_string(),
            GateStatus::Accepted | GateStatus::Rejected => String::new(),
        };
        if !hint.is_empty() {
            lines.push(Line::from(Span::styled(
                hint,
                Style::default().fg(palette.modal_title),
            )));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title("canvas");
    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

/// Story body. While a proposal is at the gate the text is the live merge of
/// the streaming rewrite against the pre-proposal snapshot, word-level marked.
fn story_lines(app: &App, palette: ThemePalette) -> Vec<Line<'static>> {
    let state = app.canvas.state();
    let gate = app.gate.as_ref().filter(|g| !g.is_terminal());
    let spans = match gate {
        Some(gate) => merge_spans(
            &gate.baseline.story,
            &gate.story,
            gate.status == GateStatus::Deciding,
        ),
        None => {
            if state.story.is_empty() {
                return vec![Line::from(Span::styled(
                    "(empty)",
                    Style::default().fg(palette.muted_text),
                ))];
            }
            return state
                .story
                .lines()
                .map(|l| {
                    Line::from(Span::styled(
                        l.to_string(),
                        Style::default().fg(palette.story_text),
                    ))
                })
                .collect();
        }
    };

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    for span in spans {
        let style = match span.kind {
            MergeKind::Same => Style::default().fg(palette.story_text),
            MergeKind::Added => palette.added_style(),
            MergeKind::Removed => palette.removed_style(),
        };
        let mut parts = span.text.split('\n').peekable();
        while let Some(part) = parts.next() {
            if !part.is_empty() {
                current.push(Span::styled(part.to_string(), style));
            }
            if parts.peek().is_some() {
                lines.push(Line::from(std::mem::take(&mut current)));
            }
        }
    }
    if !current.is_empty() {
        lines.push(Line::from(current));
    }
    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "(empty)",
            Style::default().fg(palette.muted_text),
        )));
    }
    lines
}

fn card_lines(item: &Item, palette: ThemePalette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let kind = item.data.kind().as_str();
    let mut head = vec![
        Span::styled(
            format!("{} ", item.id),
            Style::default().fg(palette.muted_text),
        ),
        Span::styled(format!("[{kind}] "), Style::default().fg(palette.card_label)),
        Span::styled(item.name.clone(), Style::default().fg(palette.story_text)),
    ];
    if !item.subtitle.is_empty() {
        head.push(Span::styled(
            format!("  {}", item.subtitle),
            Style::default().fg(palette.muted_text),
        ));
    }
    lines.push(Line::from(head));

    let detail = match &item.data {
        ItemData::Project(project) => {
            let done = project.field4.iter().filter(|row| row.done).count();
            format!(
                "      {} | {} | checklist {}/{}",
                or_dash(project.field2.as_str()),
                or_dash(&project.field3),
                done,
                project.field4.len()
            )
        }
        ItemData::Entity(entity) => {
            format!(
                "      {} | tags: {}",
                or_dash(entity.field2.as_str()),
                if entity.field3.is_empty() {
                    "-".to_string()
                } else {
                    entity.field3.join(", ")
                }
            )
        }
        ItemData::Note(note) => format!("      {}", truncate(or_dash(&note.field1), 60)),
        ItemData::Chart(chart) => {
            let metrics = chart
                .field1
                .iter()
                .map(|metric| {
                    let value = match metric.value.0 {
                        Some(v) => format!("{v:.0}"),
                        None => "-".to_string(),
                    };
                    format!("{}: {}", or_dash(&metric.label), value)
                })
                .collect::<Vec<_>>()
                .join("  ");
            format!("      {}", or_dash(&metrics))
        }
    };
    lines.push(Line::from(Span::styled(
        detail,
        Style::default().fg(palette.muted_text),
    )));
    lines
}

fn or_dash(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

fn draw_chat_pane(f: &mut Frame, app: &App, area: Rect, palette: ThemePalette) {
    let prompt = "> ";
    let prompt_width = UnicodeWidthStr::width(prompt) as u16;
    let input_rows = app
        .input_height(area.width.saturating_sub(2), prompt_width)
        .saturating_add(2);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(input_rows),
            Constraint::Length(1),
        ])
        .split(area);

    let transcript_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title(truncate(&app.conversations.selected().title, 32));
    let transcript = Paragraph::new(Text::from(app.cached_log_lines().to_vec()))
        .block(transcript_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    f.render_widget(transcript, rows[0]);

    let input_line = Line::from(vec![
        Span::styled(prompt, palette.prompt_style()),
        Span::styled(app.input.clone(), Style::default().fg(palette.input_text)),
    ]);
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let input = Paragraph::new(input_line)
        .block(input_block)
        .wrap(Wrap { trim: false });
    f.render_widget(input, rows[1]);

    let spinner = if app.running {
        const FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
        format!("{} ", FRAMES[app.spinner_idx % FRAMES.len()])
    } else {
        String::new()
    };
    let status = Paragraph::new(Line::from(Span::styled(
        format!("{spinner}{}", app.status),
        Style::default().fg(palette.status_text),
    )));
    f.render_widget(status, rows[2]);

    if matches!(app.mode, Mode::Normal) {
        let (cursor_x, cursor_y) = input_cursor_position(
            &app.input,
            app.cursor,
            rows[1].width.saturating_sub(2),
            prompt_width,
        );
        let x = rows[1].x + 1 + cursor_x;
        let y = rows[1].y + 1 + cursor_y;
        if x < rows[1].right() && y < rows[1].bottom() {
            f.set_cursor_position((x, y));
        }
    }
}

fn draw_angle_modal(f: &mut Frame, app: &App, area: Rect, palette: ThemePalette) {
    let Some(angle) = &app.angle else {
        return;
    };
    let height = (angle.angles.len() as u16).saturating_add(2).min(area.height);
    let rect = centered_rect(area, 50, height);
    f.render_widget(Clear, rect);
    let items: Vec<ListItem> = angle
        .angles
        .iter()
        .map(|a| ListItem::new(a.clone()))
        .collect();
    let mut state = ListState::default();
    state.select(Some(angle.selected));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border))
                .title(Span::styled("pick an angle", palette.title_style()))
                .style(Style::default().bg(palette.modal_bg)),
        )
        .highlight_style(
            Style::default()
                .fg(palette.modal_title)
                .add_modifier(ratatui::style::Modifier::BOLD),
        )
        .highlight_symbol("> ");
    f.render_stateful_widget(list, rect, &mut state);
}

fn draw_rename_modal(f: &mut Frame, app: &App, area: Rect, palette: ThemePalette) {
    let rect = centered_rect(area, 50, 3);
    f.render_widget(Clear, rect);
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled("title: ", Style::default().fg(palette.muted_text)),
        Span::styled(
            app.modal_input.clone(),
            Style::default().fg(palette.input_text),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border))
            .title(Span::styled("rename conversation", palette.title_style()))
            .style(Style::default().bg(palette.modal_bg)),
    );
    f.render_widget(paragraph, rect);
}

fn draw_clear_all_modal(f: &mut Frame, area: Rect, palette: ThemePalette) {
    let rect = centered_rect(area, 50, 3);
    f.render_widget(Clear, rect);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "delete ALL conversations? [y] yes  [n] no",
        Style::default().fg(palette.error_text),
    )))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.border))
            .title(Span::styled("clear all", palette.title_style()))
            .style(Style::default().bg(palette.modal_bg)),
    );
    f.render_widget(paragraph, rect);
}

fn centered_rect(area: Rect, width_pct: u16, height: u16) -> Rect {
    let width = (area.width * width_pct / 100).max(20).min(area.width);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height.min(area.height))
}
