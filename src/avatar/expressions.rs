//! The closed map from expression names to model expression files.
//!
//! Directive names resolve only through this table; anything else is an
//! unknown expression and never reaches the control server.

/// `(name, expression file)` pairs, matched case-sensitively.
pub const EXPRESSIONS: &[(&str, &str)] = &[
    ("coqueta", "coqueta.exp3.json"),
    ("Enojo", "Enojo.exp3.json"),
    ("Feliz", "Feliz.exp3.json"),
    ("Mentira", "Mentira.exp3.json"),
    ("Prueba", "Prueba.exp3.json"),
    ("Tristeza", "Tristeza.exp3.json"),
    ("Tristeza2", "Tristeza2.exp3.json"),
];

/// Expression file for `name`, or `None` if the name is not in the map.
pub fn resolve(name: &str) -> Option<&'static str> {
    EXPRESSIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, file)| *file)
}

/// Known expression names, in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    EXPRESSIONS.iter().map(|(name, _)| *name)
}
