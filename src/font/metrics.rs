//! Advance widths for the standard PDF fonts, in 1/1000 em.
//!
//! Tables cover printable ASCII (0x20..=0x7E). Everything else goes through
//! [`StandardFontMetrics::char_width`], which knows the common typographic
//! punctuation and falls back to the face's default width.

/// Width table and vertical metrics for one standard font face.
#[derive(Debug)]
pub struct StandardFontMetrics {
    /// Widths for chars 0x20..=0x7E.
    pub ascii: [u16; 95],
    /// Width used for characters without an entry.
    pub default_width: u16,
    pub ascender: i16,
    pub descender: i16,
    pub cap_height: i16,
    pub bbox: [i16; 4],
    /// Width of the bullet, en dash, em dash, curly quotes and ellipsis.
    pub punctuation: Punctuation,
}

/// Widths of the non-ASCII punctuation report text commonly uses.
#[derive(Debug, Clone, Copy)]
pub struct Punctuation {
    pub bullet: u16,
    pub en_dash: u16,
    pub em_dash: u16,
    pub single_quote: u16,
    pub double_quote: u16,
    pub ellipsis: u16,
}

impl StandardFontMetrics {
    /// Advance width of `ch` in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        let units = match ch {
            ' '..='~' => self.ascii[ch as usize - 0x20],
            '\u{00A0}' => self.ascii[0],
            '\u{2022}' => self.punctuation.bullet,
            '\u{2013}' => self.punctuation.en_dash,
            '\u{2014}' => self.punctuation.em_dash,
            '\u{2018}' | '\u{2019}' => self.punctuation.single_quote,
            '\u{201C}' | '\u{201D}' => self.punctuation.double_quote,
            '\u{2026}' => self.punctuation.ellipsis,
            _ => self.default_width,
        };
        units as f64 * font_size / 1000.0
    }

    /// Width of a whole string in points.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|ch| self.char_width(ch, font_size)).sum()
    }
}

pub static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
        278, 278, 584, 584, 584, 556, 1015, // :..@
        667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
        278, 278, 278, 469, 556, 333, // [..`
        556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
        556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
        334, 260, 334, 584, // {..~
    ],
    default_width: 556,
    ascender: 718,
    descender: -207,
    cap_height: 718,
    bbox: [-166, -225, 1000, 931],
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 556,
        em_dash: 1000,
        single_quote: 222,
        double_quote: 333,
        ellipsis: 1000,
    },
};

pub static HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
        333, 333, 584, 584, 584, 611, 975, // :..@
        722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A-M
        722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
        333, 278, 333, 584, 556, 333, // [..`
        556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a-m
        611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n-z
        389, 280, 389, 584, // {..~
    ],
    default_width: 611,
    ascender: 718,
    descender: -207,
    cap_height: 718,
    bbox: [-170, -228, 1003, 962],
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 556,
        em_dash: 1000,
        single_quote: 278,
        double_quote: 500,
        ellipsis: 1000,
    },
};

// The italic faces are measured with the upright widths.
pub static TIMES_ROMAN: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // ' '../
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, // 0-9
        278, 278, 564, 564, 564, 444, 921, // :..@
        722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, // A-M
        722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, // N-Z
        333, 278, 333, 469, 500, 333, // [..`
        444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, // a-m
        500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, // n-z
        480, 200, 480, 541, // {..~
    ],
    default_width: 500,
    ascender: 683,
    descender: -217,
    cap_height: 662,
    bbox: [-168, -218, 1000, 898],
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 1000,
        single_quote: 333,
        double_quote: 444,
        ellipsis: 1000,
    },
};

pub static TIMES_BOLD: StandardFontMetrics = StandardFontMetrics {
    ascii: [
        250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278, // ' '../
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, // 0-9
        333, 333, 570, 570, 570, 500, 930, // :..@
        722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, // A-M
        722, 778, 611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, // N-Z
        333, 278, 333, 581, 500, 333, // [..`
        500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, // a-m
        556, 500, 556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, // n-z
        394, 220, 394, 520, // {..~
    ],
    default_width: 500,
    ascender: 683,
    descender: -217,
    cap_height: 676,
    bbox: [-168, -218, 1000, 935],
    punctuation: Punctuation {
        bullet: 350,
        en_dash: 500,
        em_dash: 1000,
        single_quote: 333,
        double_quote: 500,
        ellipsis: 1000,
    },
};

pub static COURIER: StandardFontMetrics = StandardFontMetrics {
    ascii: [600; 95],
    default_width: 600,
    ascender: 629,
    descender: -157,
    cap_height: 562,
    bbox: [-23, -250, 715, 805],
    punctuation: Punctuation {
        bullet: 600,
        en_dash: 600,
        em_dash: 600,
        single_quote: 600,
        double_quote: 600,
        ellipsis: 600,
    },
};
