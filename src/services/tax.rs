//! Tax percentage to invoicing tax tier

/// Map a tax percentage to its tier code; anything unrecognised gets `default`.
pub fn tax_tier<'a>(percentage: &str, default: &'a str) -> &'a str {
    match percentage {
        "6" => "RED",
        "13" => "INT",
        "23" => "NOR",
        _ => default,
    }
}
