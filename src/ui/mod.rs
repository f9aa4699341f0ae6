use chrono::Datelike;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{block::Title, Block, BorderType, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Panel, Tab};
use crate::calendar::{AttendanceStatus, Cell, WEEKDAY_LABELS};
use crate::holidays::{holiday_days, holidays_in_month};

const ACCENT:  Color = Color::Rgb(0x5f, 0x83, 0xc7);
const PRESENT: Color = Color::Green;
const ABSENT:  Color = Color::Red;
const HOLIDAY: Color = Color::Yellow;
const DIM:     Color = Color::DarkGray;

/// Width of one day cell: " 12● "
const CELL_W: usize = 5;

// ─── Root draw ────────────────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    // Layout: [ tabs(3) | month(3) | content | status_bar(1) ]
    let root = Layout::default().direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ]).split(area);

    draw_tabs(f, app, root[0]);
    draw_month_header(f, app, root[1]);
    match app.tab {
        Tab::Attendance => draw_attendance(f, app, root[2]),
        Tab::Holidays   => draw_holidays(f, app, root[2]),
    }
    draw_statusbar(f, app, root[3]);

    match app.panel {
        Panel::Detail => draw_detail(f, area, app),
        Panel::Help   => draw_help(f, area),
        Panel::Main   => {}
    }
}

fn boxed(title: &str) -> Block<'_> {
    Block::default()
        .title(Title::from(Line::from(Span::styled(
            format!(" {title} "),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ))))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(DIM))
}

// ─── Tabs & month header ──────────────────────────────────────────────────────

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let selected = match app.tab { Tab::Attendance => 0, Tab::Holidays => 1 };
    let tabs = Tabs::new(vec![" Attendance ", " Holidays "])
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded)
            .border_style(Style::default().fg(DIM)))
        .select(selected)
        .highlight_style(Style::default().bg(ACCENT).fg(Color::White).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, area);
}

fn draw_month_header(f: &mut Frame, app: &App, area: Rect) {
    let title = app.view.title().unwrap_or_else(|_| app.view.to_string());
    let line  = Line::from(vec![
        Span::styled(" ◀ [ ", Style::default().fg(DIM)),
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(" ] ▶ ", Style::default().fg(DIM)),
    ]);
    f.render_widget(
        Paragraph::new(line).alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded)
                .border_style(Style::default().fg(DIM))),
        area,
    );
}

// ─── Attendance tab ───────────────────────────────────────────────────────────

fn draw_attendance(f: &mut Frame, app: &App, area: Rect) {
    // [ calendar | summary ]
    let cols = Layout::default().direction(Direction::Horizontal)
        .constraints([Constraint::Length((CELL_W * 7 + 2) as u16), Constraint::Min(0)])
        .split(area);
    draw_calendar(f, app, cols[0]);
    draw_summary(f, app, cols[1]);
}

fn draw_calendar(f: &mut Frame, app: &App, area: Rect) {
    let block = boxed("Calendar");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = vec![];

    // Header row: Sun Mon .. Sat
    let hdrs: Vec<Span> = WEEKDAY_LABELS.iter().enumerate().map(|(i, d)| {
        let fg = if i == 0 { ABSENT } else { Color::Reset };
        Span::styled(format!("{d:^CELL_W$}"), Style::default().fg(fg).add_modifier(Modifier::BOLD))
    }).collect();
    lines.push(Line::from(hdrs));

    let today = (app.view.year == app.today.year() && app.view.month == app.today.month())
        .then(|| app.today.day());

    let hol_days = holiday_days(&app.holidays, app.view);

    for row in app.matrix.rows() {
        let mut spans: Vec<Span> = Vec::with_capacity(row.len() * 2);
        for (col, cell) in row.iter().enumerate() {
            let Cell::Day(d) = *cell else {
                spans.push(Span::raw(" ".repeat(CELL_W)));
                continue;
            };
            let mut style = if hol_days.contains(&d) {
                Style::default().fg(HOLIDAY)
            } else if col == 0 {
                Style::default().fg(DIM)
            } else {
                Style::default()
            };
            if today == Some(d) {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            if d == app.selected_day {
                style = style.add_modifier(Modifier::REVERSED);
            }
            let (marker, mcolor) = match app.record.status_on(app.view, d) {
                Some(AttendanceStatus::Present)  => ("●", PRESENT),
                Some(AttendanceStatus::Absent)   => ("●", ABSENT),
                Some(AttendanceStatus::Other(_)) => ("·", DIM),
                None                             => (" ", DIM),
            };
            spans.push(Span::raw(" "));
            spans.push(Span::styled(format!("{d:>2}"), style));
            spans.push(Span::styled(marker, Style::default().fg(mcolor)));
            spans.push(Span::raw(" "));
        }
        lines.push(Line::from(spans));
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_summary(f: &mut Frame, app: &App, area: Rect) {
    let s   = &app.summary;
    let lbl = Style::default().fg(DIM);
    let val = Style::default().add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Working Days  ", lbl), Span::styled(s.working_days.to_string(), val)]),
        Line::from(vec![
            Span::styled("  Present       ", lbl),
            Span::styled(s.present_count.to_string(), val.fg(PRESENT)),
        ]),
        Line::from(vec![
            Span::styled("  Absent        ", lbl),
            Span::styled(s.absent_count.to_string(), val.fg(ABSENT)),
        ]),
        Line::from(""),
    ];
    let hols: Vec<_> = holidays_in_month(&app.holidays, app.view);
    if !hols.is_empty() {
        lines.push(Line::from(Span::styled(format!("  ★ {} holiday(s) this month", hols.len()), Style::default().fg(HOLIDAY))));
    }
    if app.student_id.is_none() {
        lines.push(Line::from(Span::styled("  No student configured: showing an empty record", lbl)));
    }

    f.render_widget(
        Paragraph::new(lines).block(boxed("Attendance Summary")).wrap(Wrap { trim: false }),
        area,
    );
}

// ─── Holidays tab ─────────────────────────────────────────────────────────────

fn draw_holidays(f: &mut Frame, app: &App, area: Rect) {
    let hols = holidays_in_month(&app.holidays, app.view);
    let lines: Vec<Line> = if hols.is_empty() {
        vec![Line::from(""), Line::from(Span::styled("  No holidays this month.", Style::default().fg(DIM)))]
    } else {
        std::iter::once(Line::from(""))
            .chain(hols.iter().map(|h| Line::from(vec![
                Span::styled(format!("  {:<13}", h.label()), Style::default().fg(HOLIDAY).add_modifier(Modifier::BOLD)),
                Span::raw(h.title.clone()),
            ])))
            .collect()
    };
    f.render_widget(Paragraph::new(lines).block(boxed("Holiday List")), area);
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_statusbar(f: &mut Frame, app: &App, area: Rect) {
    let who = app.profile_name.clone().unwrap_or_default();
    let bar = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {who} "), Style::default().bg(ACCENT).fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::styled(
            "  hjkl:day  [/]:month  Tab:tabs  Enter:details  t:today  r:refresh  ?:help  q:quit",
            Style::default().fg(DIM),
        ),
        Span::styled(format!("  {}", app.sync_status), Style::default().fg(DIM).add_modifier(Modifier::ITALIC)),
    ]));
    f.render_widget(bar, area);
}

// ─── Popups ───────────────────────────────────────────────────────────────────

fn draw_detail(f: &mut Frame, area: Rect, app: &App) {
    let rect = centered(50, 40, area);
    f.render_widget(Clear, rect);

    let status = app.selected_status_label();
    let color  = match app.selected_status() {
        Some(AttendanceStatus::Present) => PRESENT,
        Some(AttendanceStatus::Absent)  => ABSENT,
        _                               => Color::Reset,
    };
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(app.selected_date_key(), Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(vec![Span::raw("Status: "), Span::styled(status, Style::default().fg(color).add_modifier(Modifier::BOLD))]),
    ];
    for h in app.holidays_on(app.selected_day) {
        lines.push(Line::from(Span::styled(format!("★ {}", h.title), Style::default().fg(HOLIDAY))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Enter / Esc: close", Style::default().fg(DIM))));

    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(boxed("Attendance Details")),
        rect,
    );
}

fn draw_help(f: &mut Frame, area: Rect) {
    let rect = centered(60, 70, area);
    f.render_widget(Clear, rect);

    let accent = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
    let dim    = Style::default().fg(DIM);
    let lines  = vec![
        Line::from(""),
        Line::from(Span::styled("  Navigation", accent)),
        Line::from(Span::styled("  h/j/k/l  ←↓↑→     Move by day / week", dim)),
        Line::from(Span::styled("  [ / ]              Prev / Next month", dim)),
        Line::from(Span::styled("  t                  Jump to this month", dim)),
        Line::from(Span::styled("  Tab                Attendance / Holidays", dim)),
        Line::from(""),
        Line::from(Span::styled("  Attendance", accent)),
        Line::from(Span::styled("  Enter              Day details", dim)),
        Line::from(Span::styled("  ● green / red      Present / Absent", dim)),
        Line::from(""),
        Line::from(Span::styled("  General", accent)),
        Line::from(Span::styled("  r                  Refetch month from the school", dim)),
        Line::from(Span::styled("  ?                  Toggle help", dim)),
        Line::from(Span::styled("  Esc                Close popup", dim)),
        Line::from(Span::styled("  q                  Quit", dim)),
    ];

    f.render_widget(
        Paragraph::new(lines).block(boxed("Keyboard Shortcuts")).wrap(Wrap { trim: false }),
        rect,
    );
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn centered(pct_x: u16, pct_y: u16, r: Rect) -> Rect {
    let vert = Layout::default().direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - pct_y) / 2),
            Constraint::Percentage(pct_y),
            Constraint::Percentage((100 - pct_y) / 2),
        ]).split(r);
    Layout::default().direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - pct_x) / 2),
            Constraint::Percentage(pct_x),
            Constraint::Percentage((100 - pct_x) / 2),
        ]).split(vert[1])[1]
}
