use crossterm::style::Color;

/// Colours of the board and scoreboard
#[derive(Debug, Clone)]
pub struct Theme {
    /// Default text color
    pub fg: Color,
    /// Thin cell separators
    pub border: Color,
    /// Region separators
    pub box_border: Color,
    /// Clue cell color
    pub given: Color,
    /// Cells solved during the game
    pub solved: Color,
    /// Empty cell marker
    pub empty: Color,
    pub error: Color,
    pub success: Color,
    /// Headings and labels
    pub info: Color,
    /// Highlighted names
    pub key: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            fg: Color::Rgb { r: 230, g: 230, b: 240 },
            border: Color::Rgb { r: 70, g: 75, b: 90 },
            box_border: Color::Rgb { r: 130, g: 140, b: 170 },
            given: Color::Rgb { r: 255, g: 255, b: 255 },
            solved: Color::Rgb { r: 80, g: 180, b: 255 },
            empty: Color::DarkGrey,
            error: Color::Rgb { r: 255, g: 90, b: 90 },
            success: Color::Rgb { r: 90, g: 255, b: 130 },
            info: Color::Rgb { r: 160, g: 165, b: 185 },
            key: Color::Rgb { r: 255, g: 210, b: 100 },
        }
    }

    /// For terminals without true colour
    pub fn high_contrast() -> Self {
        Self {
            fg: Color::White,
            border: Color::Grey,
            box_border: Color::White,
            given: Color::Yellow,
            solved: Color::Cyan,
            empty: Color::DarkGrey,
            error: Color::Red,
            success: Color::Green,
            info: Color::Grey,
            key: Color::Yellow,
        }
    }
}
