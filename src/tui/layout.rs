use ratatui::layout::{Constraint, Direction, Layout as RatLayout, Rect};

pub struct Layout {
    pub inner_area: Rect, // Area inside the outer border
    pub header_area: Rect,
    pub stats_area: Rect,
    pub toolbar_area: Rect,
    pub list_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum terminal dimensions required for the application
    /// Height: 2 outer borders + 3 header + 3 stats + 3 toolbar + 3 list + 1 status
    pub const MIN_WIDTH: u16 = 50;
    pub const MIN_HEIGHT: u16 = 15;

    pub fn calculate(size: Rect) -> Self {
        let width = size.width.max(Self::MIN_WIDTH);
        let height = size.height.max(Self::MIN_HEIGHT);
        let size = Rect::new(size.x, size.y, width, height);

        let inner_area = Rect::new(
            size.x + 1,
            size.y + 1,
            size.width.saturating_sub(2),
            size.height.saturating_sub(2),
        );

        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Stats
                Constraint::Length(3), // Search + filter
                Constraint::Min(3),    // Task list
                Constraint::Length(1), // Status
            ])
            .split(inner_area);

        Self {
            inner_area,
            header_area: vertical[0],
            stats_area: vertical[1],
            toolbar_area: vertical[2],
            list_area: vertical[3],
            status_area: vertical[4],
        }
    }
}
