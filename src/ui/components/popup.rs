use tui::{
    Frame,
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::Spans,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub fn render_error<B: Backend>(frame: &mut Frame<B>, error: &str) {
    render_popup(frame, "Error", error, Color::Red, "Press any key to continue");
}

pub fn render_notice<B: Backend>(frame: &mut Frame<B>, message: &str) {
    render_popup(frame, "Working", message, Color::Cyan, "Please wait...");
}

fn render_popup<B: Backend>(frame: &mut Frame<B>, title: &str, message: &str, color: Color, hint: &str) {
    let popup_area = centered_rect(60, 25, frame.size());

    let body = Paragraph::new(vec![
        Spans::from(""),
        Spans::from(message.to_string()),
        Spans::from(""),
        Spans::from(hint.to_string()),
    ])
    .block(Block::default().title(title.to_string()).borders(Borders::ALL))
    .style(Style::default().fg(color))
    .wrap(Wrap { trim: true });

    frame.render_widget(Clear, popup_area);
    frame.render_widget(body, popup_area);
}

// Helper function to create a centered rect
pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
