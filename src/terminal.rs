// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based frame viewer
//!
//! Renders captured frames to the terminal using Unicode half-block characters
//! for improved vertical resolution.

use crate::backends::{CaptureBackend, Frame};
use crate::constants::snapshot;
use crate::errors::{AppError, CaptureError};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    DefaultTerminal, buffer::Buffer, layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Widget,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Viewer settings resolved from the config file and command line
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub snapshot_dir: PathBuf,
    pub poll_interval: Duration,
    /// Longest a read may block before keys are polled again
    pub read_timeout: Duration,
    pub max_frames: Option<u64>,
    pub mirror: bool,
}

/// Run the terminal viewer over an opened capture
///
/// Returns the number of frames displayed. The loop ends on the first failed
/// read or when the user quits; the capture is left for the caller to release.
pub fn run(capture: &mut dyn CaptureBackend, options: &ViewerOptions) -> Result<u64, AppError> {
    // Bounded waits keep the key loop responsive on a stalled source
    capture.set_read_timeout(Some(options.read_timeout));

    // Raw mode + alternate screen; restored even when the loop fails
    let mut terminal = ratatui::try_init()?;
    let result = run_app(&mut terminal, capture, options);
    ratatui::try_restore()?;

    result
}

/// Keyboard commands understood by the viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Snapshot,
    ToggleHelp,
    ToggleMirror,
}

pub fn key_action(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Quit)
        }
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        KeyCode::Char('p') => Some(KeyAction::Snapshot),
        KeyCode::Char('h') => Some(KeyAction::ToggleHelp),
        KeyCode::Char('m') => Some(KeyAction::ToggleMirror),
        _ => None,
    }
}

/// Outcome of one viewer read
#[derive(Debug, PartialEq)]
enum ReadStep {
    Show(Frame),
    /// No frame within the read timeout; keep handling keys
    Idle,
    Stop,
}

fn read_step(capture: &mut dyn CaptureBackend) -> ReadStep {
    match capture.read() {
        Ok(frame) => ReadStep::Show(frame),
        Err(CaptureError::TimedOut) => ReadStep::Idle,
        Err(e) if e.is_end_of_stream() => ReadStep::Stop,
        Err(e) => {
            warn!(error = %e, "Frame read failed");
            ReadStep::Stop
        }
    }
}

fn run_app(
    terminal: &mut DefaultTerminal,
    capture: &mut dyn CaptureBackend,
    options: &ViewerOptions,
) -> Result<u64, AppError> {
    let backend_name = capture.backend_type().to_string();
    let mut frame_widget = FrameWidget::new(options.mirror);
    let mut show_help = false;
    let mut frames_shown = 0u64;
    let mut status_message = String::new();

    loop {
        if options.max_frames.is_some_and(|max| frames_shown >= max) {
            info!(frames = frames_shown, "Frame limit reached");
            break;
        }

        match read_step(capture) {
            ReadStep::Show(frame) => {
                frames_shown += 1;
                frame_widget.update_frame(frame);
            }
            ReadStep::Idle => {}
            ReadStep::Stop => {
                info!(frames = frames_shown, "Capture ended");
                break;
            }
        }

        if !show_help && status_message.is_empty() {
            status_message = build_status_message(&backend_name, &frame_widget);
        }

        terminal.draw(|f| {
            let [video, status] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(f.area());
            f.render_widget(&frame_widget, video);
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status,
            );
        })?;

        // Handle input; the poll doubles as the inter-frame delay
        if event::poll(options.poll_interval)?
            && let Event::Key(key) = event::read()?
        {
            match key_action(&key) {
                Some(KeyAction::Quit) => break,
                Some(KeyAction::Snapshot) => {
                    show_help = false;
                    if let Some(frame) = &frame_widget.frame {
                        match save_snapshot(frame, &options.snapshot_dir) {
                            Ok(path) => {
                                status_message = format!("Saved: {}", path.display());
                            }
                            Err(e) => {
                                error!("Failed to save snapshot: {}", e);
                                status_message = format!("Error: {}", e);
                            }
                        }
                    }
                }
                Some(KeyAction::ToggleHelp) => {
                    show_help = !show_help;
                    status_message = if show_help {
                        build_help_message()
                    } else {
                        build_status_message(&backend_name, &frame_widget)
                    };
                }
                Some(KeyAction::ToggleMirror) => {
                    frame_widget.mirror = !frame_widget.mirror;
                }
                None => {}
            }
        }
    }

    Ok(frames_shown)
}

fn build_status_message(backend: &str, widget: &FrameWidget) -> String {
    let mut msg = backend.to_string();
    if let Some(frame) = &widget.frame {
        msg.push_str(&format!(" {}x{}", frame.width, frame.height));
    }
    msg.push_str(" | 'p' snapshot | 'h' help | 'q' quit");
    msg
}

fn build_help_message() -> String {
    String::from("p: Save snapshot | m: Toggle mirror | h: Toggle help | q/Esc/Ctrl+C: Quit")
}

/// Save a frame as a timestamped PNG in `dir`
pub fn save_snapshot(frame: &Frame, dir: &Path) -> Result<PathBuf, AppError> {
    let img = frame
        .to_rgb_image()
        .ok_or_else(|| AppError::Other("Cannot save an empty frame".into()))?;

    std::fs::create_dir_all(dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
    let filename = format!("{}{}.png", snapshot::FILE_PREFIX, timestamp);
    let filepath = dir.join(&filename);

    img.save(&filepath)?;
    info!(path = %filepath.display(), "Snapshot saved");

    Ok(filepath)
}

/// Widget that renders a frame using half-block characters
struct FrameWidget {
    frame: Option<Frame>,
    mirror: bool,
}

impl FrameWidget {
    fn new(mirror: bool) -> Self {
        Self {
            frame: None,
            mirror,
        }
    }

    fn update_frame(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }
}

/// Largest cell grid with the frame's aspect ratio that fits in `area`
///
/// Each cell covers two source rows, so the grid is measured in half-block
/// pixels vertically.
fn fit_to_area(frame_width: u32, frame_height: u32, area: Rect) -> (u16, u16) {
    if frame_width == 0 || frame_height == 0 {
        return (0, 0);
    }
    let aspect = frame_width as f64 / frame_height as f64;
    let cols = area.width as f64;
    let pixel_rows = area.height as f64 * 2.0;

    let (cols, pixel_rows) = if cols / pixel_rows > aspect {
        (pixel_rows * aspect, pixel_rows)
    } else {
        (cols, cols / aspect)
    };
    (cols as u16, (pixel_rows / 2.0) as u16)
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| !f.is_empty()) else {
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let (cols, rows) = fit_to_area(frame.width, frame.height, area);
        if cols == 0 || rows == 0 {
            return;
        }
        let left = area.x + (area.width - cols) / 2;
        let top = area.y + (area.height - rows) / 2;

        let x_step = frame.width as f64 / cols as f64;
        let y_step = frame.height as f64 / (rows as f64 * 2.0);

        for row in 0..rows {
            // Upper half (▀) takes the fg color, lower half the bg color
            let upper = (row as f64 * 2.0 * y_step) as u32;
            let lower = ((row as f64 * 2.0 + 1.0) * y_step) as u32;
            for col in 0..cols {
                let mut src_x = (col as f64 * x_step) as u32;
                if self.mirror {
                    src_x = frame.width - 1 - src_x.min(frame.width - 1);
                }
                if let Some(cell) = buf.cell_mut((left + col, top + row)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, upper));
                    cell.set_bg(sample_pixel(frame, src_x, lower));
                }
            }
        }
    }
}

fn sample_pixel(frame: &Frame, x: u32, y: u32) -> Color {
    let (r, g, b) = frame.rgb_at(x, y);
    Color::Rgb(r, g, b)
}

/// One-line status bar along the bottom edge
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(Color::White).bg(Color::DarkGray);
        buf.set_style(area, style);
        buf.set_stringn(area.x, area.y, self.message, area.width as usize, style);
    }
}
