use serenity::all::{Colour, CreateEmbed};

use crate::services::guard::Tier;

// ============================================================================
// Color Palette
// ============================================================================

/// Primary brand color - Deep blue
pub const PRIMARY_COLOR: Colour = Colour::from_rgb(59, 130, 246);

/// Success color - Emerald green
pub const SUCCESS_COLOR: Colour = Colour::from_rgb(16, 185, 129);

/// Error color - Rose red
pub const ERROR_COLOR: Colour = Colour::from_rgb(244, 63, 94);

/// Info/neutral color - Slate
pub const INFO_COLOR: Colour = Colour::from_rgb(100, 116, 139);

/// Booster pink, matching Discord's Nitro boost badge
pub const BOOSTER_COLOR: Colour = Colour::from_rgb(244, 127, 255);

/// Donatur gold
pub const DONATUR_COLOR: Colour = Colour::from_rgb(250, 204, 21);

/// Loyalist violet
pub const LOYALIST_COLOR: Colour = Colour::from_rgb(139, 92, 246);

// ============================================================================
// Text Formatting
// ============================================================================

/// Section divider (thin line)
pub const DIVIDER: &str = "───────────────────────";

/// Bullet point character
pub const BULLET: &str = "•";

// ============================================================================
// Embed Builders
// ============================================================================

/// Create a standard/primary embed
pub fn standard_embed() -> CreateEmbed {
    CreateEmbed::new().color(PRIMARY_COLOR)
}

/// Create a success embed
pub fn success_embed() -> CreateEmbed {
    CreateEmbed::new().color(SUCCESS_COLOR)
}

/// Create an error embed
pub fn error_embed() -> CreateEmbed {
    CreateEmbed::new().color(ERROR_COLOR)
}

/// Create an info/neutral embed
pub fn info_embed() -> CreateEmbed {
    CreateEmbed::new().color(INFO_COLOR)
}

/// Embed colored after a stay tier
pub fn tier_embed(tier: Tier) -> CreateEmbed {
    let color = match tier {
        Tier::Free => PRIMARY_COLOR,
        Tier::Booster => BOOSTER_COLOR,
        Tier::Donatur => DONATUR_COLOR,
        Tier::Loyalist => LOYALIST_COLOR,
    };
    CreateEmbed::new().color(color)
}
