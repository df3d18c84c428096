//! Do-not-disturb window over local hours.

/// A `[start, end)` window of local hours that wraps past midnight when
/// `start > end`. `start == end` is an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHours {
    /// First quiet hour (0-23).
    pub start_hour: u8,
    /// First hour after the window (0-23).
    pub end_hour: u8,
}

impl QuietHours {
    /// Creates a window.
    #[must_use]
    pub const fn new(start_hour: u8, end_hour: u8) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Whether `hour` falls inside the window.
    #[must_use]
    pub const fn contains(&self, hour: u8) -> bool {
        let (start, end) = (self.start_hour, self.end_hour);
        if start < end {
            hour >= start && hour < end
        } else if start > end {
            hour >= start || hour < end
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overnight_window_wraps() {
        let quiet = QuietHours::new(23, 9);
        assert!(quiet.contains(23));
        assert!(quiet.contains(0));
        assert!(quiet.contains(8));
        assert!(!quiet.contains(9));
        assert!(!quiet.contains(10));
        assert!(!quiet.contains(22));
    }

    #[test]
    fn daytime_window_is_half_open() {
        let quiet = QuietHours::new(13, 15);
        assert!(!quiet.contains(12));
        assert!(quiet.contains(13));
        assert!(quiet.contains(14));
        assert!(!quiet.contains(15));
    }

    #[test]
    fn equal_bounds_are_empty() {
        let quiet = QuietHours::new(7, 7);
        assert!((0..24).all(|h| !quiet.contains(h)));
    }
}
