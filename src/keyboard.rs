/// Recommended finger for a key in ten-finger touch typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Finger {
    #[strum(to_string = "Left Pinky")]
    LeftPinky,
    #[strum(to_string = "Left Ring")]
    LeftRing,
    #[strum(to_string = "Left Middle")]
    LeftMiddle,
    #[strum(to_string = "Left Index")]
    LeftIndex,
    #[strum(to_string = "Right Index")]
    RightIndex,
    #[strum(to_string = "Right Middle")]
    RightMiddle,
    #[strum(to_string = "Right Ring")]
    RightRing,
    #[strum(to_string = "Right Pinky")]
    RightPinky,
    #[strum(to_string = "Thumbs")]
    Thumbs,
}

/// Finger used for any character without a mapping.
pub const FALLBACK_FINGER: Finger = Finger::Thumbs;

impl Finger {
    pub const ALL: [Finger; 9] = [
        Finger::LeftPinky,
        Finger::LeftRing,
        Finger::LeftMiddle,
        Finger::LeftIndex,
        Finger::RightIndex,
        Finger::RightMiddle,
        Finger::RightRing,
        Finger::RightPinky,
        Finger::Thumbs,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            Finger::LeftPinky => "L Pinky",
            Finger::LeftRing => "L Ring",
            Finger::LeftMiddle => "L Middle",
            Finger::LeftIndex => "L Index",
            Finger::RightIndex => "R Index",
            Finger::RightMiddle => "R Middle",
            Finger::RightRing => "R Ring",
            Finger::RightPinky => "R Pinky",
            Finger::Thumbs => "Thumbs",
        }
    }

    pub fn is_left_hand(&self) -> bool {
        matches!(
            self,
            Finger::LeftPinky | Finger::LeftRing | Finger::LeftMiddle | Finger::LeftIndex
        )
    }
}

pub const NUMBER_ROW: [char; 13] = ['`', '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', '-', '='];
pub const TOP_ROW: [char; 13] = ['q', 'w', 'e', 'r', 't', 'y', 'u', 'i', 'o', 'p', '[', ']', '\\'];
pub const HOME_ROW: [char; 11] = ['a', 's', 'd', 'f', 'g', 'h', 'j', 'k', 'l', ';', '\''];
pub const BOTTOM_ROW: [char; 10] = ['z', 'x', 'c', 'v', 'b', 'n', 'm', ',', '.', '/'];

/// Keyboard rows from top to bottom, excluding the space bar.
pub const ROWS: [&[char]; 4] = [&NUMBER_ROW, &TOP_ROW, &HOME_ROW, &BOTTOM_ROW];

const HOME_KEYS: [char; 8] = ['a', 's', 'd', 'f', 'j', 'k', 'l', ';'];

fn lowercase(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Total over every character; unmapped characters fall back to [`FALLBACK_FINGER`].
pub fn finger_for(c: char) -> Finger {
    match lowercase(c) {
        '`' | '1' | 'q' | 'a' | 'z' => Finger::LeftPinky,
        '2' | 'w' | 's' | 'x' => Finger::LeftRing,
        '3' | 'e' | 'd' | 'c' => Finger::LeftMiddle,
        '4' | 'r' | 'f' | 'v' | '5' | 't' | 'g' | 'b' => Finger::LeftIndex,
        '6' | 'y' | 'h' | 'n' | '7' | 'u' | 'j' | 'm' => Finger::RightIndex,
        '8' | 'i' | 'k' | ',' => Finger::RightMiddle,
        '9' | 'o' | 'l' | '.' => Finger::RightRing,
        '0' | 'p' | ';' | '/' | '-' | '[' | '\'' | '=' | ']' | '\\' => Finger::RightPinky,
        ' ' => Finger::Thumbs,
        _ => FALLBACK_FINGER,
    }
}

/// Human readable instruction, e.g. `Press 'A' with LEFT PINKY finger`.
pub fn guidance_text(c: char) -> String {
    let display = if c == ' ' {
        "SPACE".to_string()
    } else {
        c.to_uppercase().collect()
    };
    format!(
        "Press '{}' with {} finger",
        display,
        finger_for(c).to_string().to_uppercase()
    )
}

pub fn is_home_key(c: char) -> bool {
    HOME_KEYS.contains(&lowercase(c))
}
