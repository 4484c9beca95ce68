use askama::Template;

use crate::read_model::{Dashboard, RecentRental};

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage<'a> {
    pub dashboard: &'a Dashboard,
    pub revenue: String,
}

impl<'a> DashboardPage<'a> {
    pub fn new(dashboard: &'a Dashboard) -> Self {
        Self {
            dashboard,
            revenue: format_money(dashboard.total_revenue),
        }
    }
}

impl RecentRental {
    pub fn badge_class(&self) -> &'static str {
        match self.status.as_str() {
            "active" => "badge-success",
            "pending" => "badge-warning",
            _ => "badge-info",
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub title: &'static str,
    pub detail: Option<String>,
}

impl ErrorPage {
    pub fn connection() -> Self {
        Self {
            title: "Database Connection Error",
            detail: None,
        }
    }

    pub fn failure(detail: String) -> Self {
        Self {
            title: "Error",
            detail: Some(detail),
        }
    }
}

#[derive(Template)]
#[template(path = "concurrency_demo.html")]
pub struct ConcurrencyDemoPage {}

/// `1234.5` -> `$1,234.50`
fn format_money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}
