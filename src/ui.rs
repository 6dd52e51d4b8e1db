use std::io::{self, BufRead, IsTerminal, Write, stdout};

use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::style::{Color, Stylize};
use crossterm::terminal::{self, Clear, ClearType};

use crate::course::Course;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::util::{
    center, clock_local, display_width, pad_right, percent, progress_bar, truncate,
};

pub const COURSE_TABLE_TITLE: &str = "已报名的课程信息";
pub const COURSE_TABLE_HEADERS: [&str; 6] = [
    "序号",
    "课程标题",
    "课程代码",
    "章节代码",
    "课程时长",
    "学时",
];
const NAME_COLUMN_MAX: usize = 48;
const BAR_WIDTH: usize = 30;

fn line(message: &str, color: Color) {
    println!("{}", format!("[{}] {message}", clock_local()).with(color));
}

pub fn info(message: &str) {
    line(message, Color::Blue);
}

pub fn warn(message: &str) {
    line(message, Color::Yellow);
}

pub fn error(message: &str) {
    eprintln!("{}", format!("[{}] {message}", clock_local()).with(Color::Red));
}

pub fn status(message: &str) {
    line(message, Color::Green);
}

pub fn prompt(label: &str) -> io::Result<String> {
    let mut out = stdout();
    write!(out, "{}", label.with(Color::Cyan))?;
    out.flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Markdown-style course table: numbered from 1, title column left
/// aligned, the rest centred.
pub fn render_course_table(courses: &[Course]) -> Vec<String> {
    let rows: Vec<[String; 6]> = courses
        .iter()
        .enumerate()
        .map(|(index, course)| {
            [
                (index + 1).to_string(),
                truncate(&course.name, NAME_COLUMN_MAX),
                course.course_id.clone(),
                course.chapter_id.clone(),
                course.duration_label.clone(),
                course.hour_label.clone(),
            ]
        })
        .collect();

    let mut widths = COURSE_TABLE_HEADERS.map(display_width);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let format_row = |cells: [&str; 6]| {
        let parts: Vec<String> = cells
            .iter()
            .zip(widths)
            .enumerate()
            .map(|(column, (cell, width))| {
                if column == 1 {
                    pad_right(cell, width)
                } else {
                    center(cell, width)
                }
            })
            .collect();
        format!("| {} |", parts.join(" | "))
    };

    let rule_cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(column, width)| {
            let dashes = "-".repeat(width.saturating_sub(1).max(1));
            if column == 1 {
                format!(":{dashes}")
            } else {
                format!(":{}:", "-".repeat(width.saturating_sub(2).max(1)))
            }
        })
        .collect();

    let header = format_row(COURSE_TABLE_HEADERS);
    let table_width = display_width(&header);
    let mut lines = vec![center(COURSE_TABLE_TITLE, table_width).trim_end().to_string()];
    lines.push(header);
    lines.push(format!("| {} |", rule_cells.join(" | ")));
    for row in &rows {
        lines.push(format_row(row.each_ref().map(String::as_str)));
    }
    lines
}

pub fn print_course_table(courses: &[Course]) {
    for row in render_course_table(courses) {
        println!("{}", row.with(Color::Cyan));
    }
}

pub fn course_progress_line(name: &str, location: u64, total: u64, width: usize) -> String {
    let pct = percent(location, total);
    let label = truncate(name, width.saturating_sub(BAR_WIDTH + 24).max(8));
    format!(
        "{label} [{}] {pct:>3.0}% {location}/{total}s",
        progress_bar(pct, BAR_WIDTH)
    )
}

pub fn batch_progress_line(completed: usize, total: usize) -> String {
    let pct = percent(completed as u64, total as u64);
    format!(
        "课程进度 [{}] {pct:>3.0}% {completed}/{total}",
        progress_bar(pct, BAR_WIDTH)
    )
}

/// Redraws one status line per course; finished courses and batch steps
/// are kept as plain lines above it.
pub struct ConsoleProgress {
    interactive: bool,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            interactive: io::stdout().is_terminal(),
        }
    }

    fn redraw(&self, text: &str) {
        let mut out = stdout();
        if self.interactive {
            let _ = execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine));
            let _ = write!(out, "{text}");
        } else {
            let _ = writeln!(out, "{text}");
        }
        let _ = out.flush();
    }

    fn width(&self) -> usize {
        terminal::size()
            .map(|(w, _)| w as usize)
            .unwrap_or(100)
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total_courses } => {
                status(&batch_progress_line(0, total_courses));
            }
            ProgressEvent::CourseStarted {
                name,
                total_seconds,
            } => {
                info(&format!("# 开始学习：{name}"));
                self.redraw(&course_progress_line(&name, 0, total_seconds, self.width()));
            }
            ProgressEvent::ChunkSubmitted {
                name,
                location,
                total_seconds,
                ..
            } => {
                self.redraw(&course_progress_line(
                    &name,
                    location,
                    total_seconds,
                    self.width(),
                ));
            }
            ProgressEvent::CourseFinished { name } => {
                if self.interactive {
                    println!();
                }
                status(&format!("# 学习完成：{name}"));
            }
            ProgressEvent::BatchAdvanced {
                completed,
                total_courses,
            } => {
                status(&batch_progress_line(completed, total_courses));
            }
        }
    }
}
