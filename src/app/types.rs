use ratatui::style::{Color, Modifier, Style};

use crate::agent::AgentEvent;
use crate::conversation::ChatMessage;
use crate::truncate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EntryKind {
    User,
    Assistant,
    System,
    Action,
    Error,
}

/// One transcript row. This is the display shape only; the persisted form is
/// [`ChatMessage`], rebuilt on conversation switch.
#[derive(Clone, Debug)]
pub(crate) struct LogEntry {
    pub(crate) kind: EntryKind,
    pub(crate) text: String,
}

/// Projects persisted messages back into transcript rows. State sync messages
/// carry no prose and are skipped.
pub(crate) fn entries_from_messages(messages: &[ChatMessage]) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    for message in messages {
        match message {
            ChatMessage::TextMessage { role, content } => {
                let kind = if role == "user" {
                    EntryKind::User
                } else {
                    EntryKind::Assistant
                };
                entries.push(LogEntry {
                    kind,
                    text: content.clone(),
                });
            }
            ChatMessage::ActionExecutionMessage {
                name, arguments, ..
            } => {
                let args = truncate(&arguments.to_string(), 60);
                entries.push(LogEntry {
                    kind: EntryKind::Action,
                    text: format!("{name} {args}"),
                });
            }
            ChatMessage::ResultMessage {
                action_name,
                result,
                ..
            } => {
                entries.push(LogEntry {
                    kind: EntryKind::Action,
                    text: format!("{action_name} -> {}", truncate(result, 60)),
                });
            }
            ChatMessage::AgentStateMessage { .. } => {}
        }
    }
    entries
}

/// Events delivered from the agent worker thread to the UI loop.
#[derive(Clone, Debug)]
pub(crate) enum WorkerEvent {
    Agent(AgentEvent),
    Done(String),
    Error(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThemePreset {
    Ink,
    Paper,
}

impl ThemePreset {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ThemePreset::Ink => "ink",
            ThemePreset::Paper => "paper",
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "ink" | "dark" => Some(ThemePreset::Ink),
            "paper" | "light" => Some(ThemePreset::Paper),
            _ => None,
        }
    }

    pub(crate) fn palette(self) -> ThemePalette {
        match self {
            ThemePreset::Ink => ThemePalette {
                prompt: Color::Rgb(200, 200, 200),
                input_text: Color::Rgb(224, 224, 224),
                muted_text: Color::Rgb(120, 120, 120),
                status_text: Color::Rgb(140, 140, 140),
                user_text: Color::Rgb(220, 220, 240),
                assistant_text: Color::Rgb(190, 190, 190),
                system_text: Color::Rgb(150, 150, 150),
                action_text: Color::Rgb(150, 170, 190),
                error_text: Color::Rgb(230, 120, 120),
                title: Color::Rgb(210, 190, 140),
                story_text: Color::Rgb(200, 200, 200),
                card_label: Color::Rgb(160, 190, 160),
                added_fg: Color::Rgb(120, 200, 120),
                removed_fg: Color::Rgb(210, 110, 110),
                border: Color::Rgb(70, 70, 70),
                modal_title: Color::Rgb(220, 180, 120),
                modal_bg: Color::Rgb(20, 20, 25),
            },
            ThemePreset::Paper => ThemePalette {
                prompt: Color::Rgb(60, 60, 60),
                input_text: Color::Rgb(30, 30, 30),
                muted_text: Color::Rgb(130, 130, 130),
                status_text: Color::Rgb(110, 110, 110),
                user_text: Color::Rgb(20, 20, 60),
                assistant_text: Color::Rgb(50, 50, 50),
                system_text: Color::Rgb(110, 110, 110),
                action_text: Color::Rgb(60, 90, 120),
                error_text: Color::Rgb(170, 40, 40),
                title: Color::Rgb(120, 90, 20),
                story_text: Color::Rgb(40, 40, 40),
                card_label: Color::Rgb(40, 100, 40),
                added_fg: Color::Rgb(20, 130, 20),
                removed_fg: Color::Rgb(170, 50, 50),
                border: Color::Rgb(180, 180, 180),
                modal_title: Color::Rgb(140, 90, 20),
                modal_bg: Color::Rgb(240, 240, 235),
            },
        }
    }
}

pub(crate) fn default_theme() -> ThemePreset {
    ThemePreset::Ink
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ThemePalette {
    pub(crate) prompt: Color,
    pub(crate) input_text: Color,
    pub(crate) muted_text: Color,
    pub(crate) status_text: Color,
    pub(crate) user_text: Color,
    pub(crate) assistant_text: Color,
    pub(crate) system_text: Color,
    pub(crate) action_text: Color,
    pub(crate) error_text: Color,
    pub(crate) title: Color,
    pub(crate) story_text: Color,
    pub(crate) card_label: Color,
    pub(crate) added_fg: Color,
    pub(crate) removed_fg: Color,
    pub(crate) border: Color,
    pub(crate) modal_title: Color,
    pub(crate) modal_bg: Color,
}

impl ThemePalette {
    pub(crate) fn prompt_style(self) -> Style {
        Style::default()
            .fg(self.prompt)
            .add_modifier(Modifier::BOLD)
    }

    pub(crate) fn title_style(self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub(crate) fn entry_style(self, kind: EntryKind) -> Style {
        let color = match kind {
            EntryKind::User => self.user_text,
            EntryKind::Assistant => self.assistant_text,
            EntryKind::System => self.system_text,
            EntryKind::Action => self.action_text,
            EntryKind::Error => self.error_text,
        };
        Style::default().fg(color)
    }

    pub(crate) fn added_style(self) -> Style {
        Style::default()
            .fg(self.added_fg)
            .add_modifier(Modifier::ITALIC)
    }

    pub(crate) fn removed_style(self) -> Style {
        Style::default()
            .fg(self.removed_fg)
            .add_modifier(Modifier::CROSSED_OUT)
    }
}
