//! Provider waste-type identifiers mapped onto container colors.

use crate::model::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Waste-type identifier as reported by a provider.
pub enum TypeCode<'a> {
    /// Numeric `pickupType` from the Twente calendar.
    Twente(i64),
    /// `type` name from the RD4 calendar.
    Rd4(&'a str),
}

/// Color for a provider-specific type code. Unmapped codes yield [`Color::Unknown`].
#[must_use]
pub fn color_for(code: TypeCode<'_>) -> Color {
    match code {
        TypeCode::Twente(number) => twente_color(number),
        TypeCode::Rd4(name) => rd4_color(name),
    }
}

/// Map a Twente `pickupType` number.
#[must_use]
pub fn twente_color(type_number: i64) -> Color {
    match type_number {
        0 => Color::Gray,
        1 => Color::Green,
        2 => Color::Blue,
        // christmas tree
        6 => Color::Red,
        10 => Color::Orange,
        _ => Color::Unknown,
    }
}

/// Map an RD4 waste `type` name.
#[must_use]
pub fn rd4_color(type_name: &str) -> Color {
    match type_name {
        "residual_waste" => Color::Gray,
        "gft" => Color::Green,
        "paper" => Color::Blue,
        "best_bag" => Color::Red,
        "pmd" => Color::Orange,
        _ => Color::Unknown,
    }
}
