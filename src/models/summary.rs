use super::LinkRecord;

const RECENT_WINDOW_SECS: i64 = 7 * 24 * 60 * 60;

/// Aggregate figures over the whole link set
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSummary {
    pub total_links: usize,
    pub total_clicks: i64,
    pub average_clicks: f64,
    /// Most clicked link, if any link exists
    pub top_link: Option<LinkRecord>,
    /// Links created within the last seven days
    pub recent_links: usize,
}

impl LinkSummary {
    pub fn from_records(records: &[LinkRecord], now: i64) -> Self {
        let total_clicks: i64 = records.iter().map(|r| r.click_count).sum();
        let average_clicks = if records.is_empty() {
            0.0
        } else {
            total_clicks as f64 / records.len() as f64
        };

        // Ties go to the earliest link in the slice
        let top_link = records
            .iter()
            .fold(None::<&LinkRecord>, |best, r| match best {
                Some(b) if b.click_count >= r.click_count => Some(b),
                _ => Some(r),
            })
            .cloned();

        let recent_links = records
            .iter()
            .filter(|r| r.created_at >= now - RECENT_WINDOW_SECS)
            .count();

        Self {
            total_links: records.len(),
            total_clicks,
            average_clicks,
            top_link,
            recent_links,
        }
    }
}
