use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tip {
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
}

pub const TIPS: [Tip; 4] = [
    Tip {
        title: "Reduce Plastic Usage",
        description: "Use reusable bags, bottles, and containers to reduce plastic waste.",
        icon: "♻",
    },
    Tip {
        title: "Compost Organic Waste",
        description: "Turn food scraps and yard waste into nutrient-rich compost.",
        icon: "🍂",
    },
    Tip {
        title: "Recycle Properly",
        description: "Separate recyclables like paper, glass, and metal from regular trash.",
        icon: "🗑",
    },
    Tip {
        title: "Support E-Waste Recycling",
        description: "Dispose of electronic waste at certified recycling centers.",
        icon: "📱",
    },
];

pub const AUTOPLAY_INTERVAL: Duration = Duration::from_millis(3000);

/// Endless carousel over a fixed list of tips
pub struct TipCarousel {
    tips: &'static [Tip],
    index: usize,
    interval: Duration,
    last_change: Instant,
}

impl TipCarousel {
    pub fn new(tips: &'static [Tip], interval: Duration, now: Instant) -> Self {
        Self {
            tips,
            index: 0,
            interval,
            last_change: now,
        }
    }

    pub fn current(&self) -> Option<&Tip> {
        self.tips.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tips.is_empty()
    }

    pub fn show_next(&mut self, now: Instant) {
        if !self.is_empty() {
            self.index = (self.index + 1) % self.tips.len();
        }
        self.last_change = now;
    }

    pub fn show_previous(&mut self, now: Instant) {
        if !self.is_empty() {
            self.index = (self.index + self.tips.len() - 1) % self.tips.len();
        }
        self.last_change = now;
    }

    pub fn select(&mut self, index: usize, now: Instant) {
        if index < self.tips.len() {
            self.index = index;
            self.last_change = now;
        }
    }

    /// Advances when the autoplay interval has elapsed; returns true if it moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_change) >= self.interval {
            self.show_next(now);
            true
        } else {
            false
        }
    }

    pub fn time_until_next(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.duration_since(self.last_change))
    }
}
