use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of whitespace-separated tokens on every label line: `class_id x y w h`.
pub const TOKENS_PER_LINE: usize = 5;

/// One `class_id x y w h` entry with normalized center/size coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxLabel {
    pub class_id: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// How label lines map onto a regression target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LabelLayout {
    /// One entity per file; target `[x, y, w, h]`.
    #[default]
    SingleBox,
    /// Two colored stick ends; target `[x1, y1, w1, h1, 1, x2, y2, w2, h2, 1]`.
    StickEndpoints,
}

impl LabelLayout {
    pub fn lines(&self) -> usize {
        match self {
            LabelLayout::SingleBox => 1,
            LabelLayout::StickEndpoints => 2,
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            LabelLayout::SingleBox => 4,
            LabelLayout::StickEndpoints => 10,
        }
    }

    pub fn from_output_dim(dim: usize) -> Option<Self> {
        match dim {
            4 => Some(LabelLayout::SingleBox),
            10 => Some(LabelLayout::StickEndpoints),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LabelError {
    #[error("label is empty")]
    Empty,
    #[error("line {line}: expected 5 values, found {found}")]
    TokenCount { line: usize, found: usize },
    #[error("line {line}: value {token:?} is not a number")]
    NotNumeric { line: usize, token: String },
    #[error("line {line}: {field}={value} is outside [0, 1]")]
    OutOfRange {
        line: usize,
        field: &'static str,
        value: f32,
    },
    #[error("expected {expected} label line(s), found {found}")]
    LineCount { expected: usize, found: usize },
}

impl BoxLabel {
    /// Parse a single `class_id x y w h` line. `line` is 1-based and only used in errors.
    pub fn parse_line(raw: &str, line: usize) -> Result<Self, LabelError> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.len() != TOKENS_PER_LINE {
            return Err(LabelError::TokenCount {
                line,
                found: tokens.len(),
            });
        }
        let mut values = [0f32; TOKENS_PER_LINE];
        for (slot, token) in values.iter_mut().zip(&tokens) {
            *slot = token
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| LabelError::NotNumeric {
                    line,
                    token: token.to_string(),
                })?;
        }
        let label = BoxLabel {
            class_id: values[0],
            x: values[1],
            y: values[2],
            w: values[3],
            h: values[4],
        };
        label.validate(line)?;
        Ok(label)
    }

    pub fn validate(&self, line: usize) -> Result<(), LabelError> {
        for (field, value) in [("x", self.x), ("y", self.y), ("w", self.w), ("h", self.h)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LabelError::OutOfRange { line, field, value });
            }
        }
        Ok(())
    }

    /// Mirror around the vertical axis; only the center x changes.
    pub fn flipped_horizontal(&self) -> Self {
        BoxLabel {
            x: 1.0 - self.x,
            ..*self
        }
    }

    /// Normalized `[x_min, y_min, x_max, y_max]`, clamped to the unit square.
    pub fn to_xyxy(&self) -> [f32; 4] {
        [
            (self.x - self.w * 0.5).clamp(0.0, 1.0),
            (self.y - self.h * 0.5).clamp(0.0, 1.0),
            (self.x + self.w * 0.5).clamp(0.0, 1.0),
            (self.y + self.h * 0.5).clamp(0.0, 1.0),
        ]
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id as i64, self.x, self.y, self.w, self.h
        )
    }
}

/// Parsed contents of one label file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelVector {
    Single(BoxLabel),
    Stick([BoxLabel; 2]),
}

impl LabelVector {
    /// Parse label text according to `layout`. Blank lines are ignored.
    pub fn parse(text: &str, layout: LabelLayout) -> Result<Self, LabelError> {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| !l.trim().is_empty())
            .map(|(i, l)| (i + 1, l))
            .collect();
        if lines.is_empty() {
            return Err(LabelError::Empty);
        }
        if lines.len() != layout.lines() {
            return Err(LabelError::LineCount {
                expected: layout.lines(),
                found: lines.len(),
            });
        }
        let parsed = lines
            .iter()
            .map(|(n, l)| BoxLabel::parse_line(l, *n))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match layout {
            LabelLayout::SingleBox => LabelVector::Single(parsed[0]),
            LabelLayout::StickEndpoints => LabelVector::Stick([parsed[0], parsed[1]]),
        })
    }

    pub fn layout(&self) -> LabelLayout {
        match self {
            LabelVector::Single(_) => LabelLayout::SingleBox,
            LabelVector::Stick(_) => LabelLayout::StickEndpoints,
        }
    }

    pub fn boxes(&self) -> &[BoxLabel] {
        match self {
            LabelVector::Single(b) => std::slice::from_ref(b),
            LabelVector::Stick(bs) => bs,
        }
    }

    pub fn map_boxes(&self, f: impl Fn(&BoxLabel) -> BoxLabel) -> Self {
        match self {
            LabelVector::Single(b) => LabelVector::Single(f(b)),
            LabelVector::Stick([a, b]) => LabelVector::Stick([f(a), f(b)]),
        }
    }

    /// Replace every x by `1 - x`; y, w and h are untouched.
    pub fn flipped_horizontal(&self) -> Self {
        self.map_boxes(BoxLabel::flipped_horizontal)
    }

    /// Flatten into the regression target consumed by the model head.
    pub fn to_target(&self) -> Vec<f32> {
        match self {
            LabelVector::Single(b) => vec![b.x, b.y, b.w, b.h],
            LabelVector::Stick([a, b]) => vec![a.x, a.y, a.w, a.h, 1.0, b.x, b.y, b.w, b.h, 1.0],
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for b in self.boxes() {
            out.push_str(&b.to_line());
            out.push('\n');
        }
        out
    }

    pub fn is_in_range(&self) -> bool {
        self.boxes()
            .iter()
            .enumerate()
            .all(|(i, b)| b.validate(i + 1).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line() {
        let label = LabelVector::parse("0 0.5 0.25 0.1 0.2\n", LabelLayout::SingleBox).unwrap();
        assert_eq!(label.to_target(), vec![0.5, 0.25, 0.1, 0.2]);
    }

    #[test]
    fn rejects_out_of_range_coordinate() {
        let err = LabelVector::parse("0 1.5 0.5 0.1 0.1", LabelLayout::SingleBox).unwrap_err();
        assert!(matches!(err, LabelError::OutOfRange { field: "x", .. }));
    }

    #[test]
    fn rejects_wrong_token_count_and_text() {
        assert!(matches!(
            LabelVector::parse("0 0.5 0.5 0.1", LabelLayout::SingleBox),
            Err(LabelError::TokenCount { found: 4, .. })
        ));
        assert!(matches!(
            LabelVector::parse("0 0.5 abc 0.1 0.1", LabelLayout::SingleBox),
            Err(LabelError::NotNumeric { .. })
        ));
    }

    #[test]
    fn stick_layout_needs_two_lines() {
        let text = "0 0.2 0.2 0.05 0.05\n1 0.8 0.7 0.05 0.05\n";
        let label = LabelVector::parse(text, LabelLayout::StickEndpoints).unwrap();
        assert_eq!(label.to_target().len(), 10);
        assert!(matches!(
            LabelVector::parse("0 0.2 0.2 0.05 0.05", LabelLayout::StickEndpoints),
            Err(LabelError::LineCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn double_flip_is_identity() {
        let steps = [0.0f32, 0.1, 0.25, 0.5, 0.73, 1.0];
        for &x in &steps {
            for &y in &steps {
                let label = LabelVector::Single(BoxLabel {
                    class_id: 0.0,
                    x,
                    y,
                    w: y * 0.5,
                    h: 1.0 - y,
                });
                let twice = label.flipped_horizontal().flipped_horizontal();
                let (a, b) = (label.boxes()[0], twice.boxes()[0]);
                assert!((a.x - b.x).abs() < 1e-6);
                assert_eq!(a.y, b.y);
                assert_eq!(a.w, b.w);
                assert_eq!(a.h, b.h);
            }
        }
    }
}
