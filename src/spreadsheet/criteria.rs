use glob::Pattern;
use std::collections::HashSet;

/// Options controlling which sheets are read and how cells are interpreted.
#[derive(Clone, Debug)]
pub struct Criteria {
    /// Sheet name patterns; `None` reads every sheet.
    pub sheet_name_patterns: Option<Vec<Pattern>>,

    /// Text cells equal to one of these literals read as null (default: empty string)
    pub nulls: HashSet<String>,

    /// Read error cells (`#DIV/0!`, `#N/A`...) as null instead of failing.
    pub error_as_null: bool,

    /// Drop rows where every column is empty.
    pub skip_empty_rows: bool,
}

impl Criteria {
    /// Returns true if no patterns are specified or if the name matches any pattern.
    pub fn accept(&self, sheet_name: &str) -> bool {
        match &self.sheet_name_patterns {
            Some(patterns) => patterns.iter().any(|pattern| pattern.matches(sheet_name)),
            None => true,
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            sheet_name_patterns: None,
            nulls: HashSet::from([String::new()]),
            error_as_null: true,
            skip_empty_rows: true,
        }
    }
}
