//! Theme styling for the dashboard.
//!
//! Semantic roles plus helper builders for ratatui widgets. Prefer these
//! helpers over hard-coded colors.

use std::env;

use tracing::debug;

pub mod dracula;
pub mod helpers;
pub mod roles;

pub use dracula::{AnsiTheme, DraculaTheme};
pub use roles::{Theme, ThemeRoles};

/// Picks the truecolor theme when the terminal advertises support.
pub fn load_from_env() -> Box<dyn Theme> {
    let color_term = env::var("COLORTERM").unwrap_or_default().to_ascii_lowercase();
    let term = env::var("TERM").unwrap_or_default().to_ascii_lowercase();
    if color_term.contains("truecolor") || color_term.contains("24bit") || term.contains("truecolor") {
        Box::new(DraculaTheme::new())
    } else {
        debug!("Truecolor not advertised; using ANSI palette");
        Box::new(AnsiTheme::new())
    }
}
