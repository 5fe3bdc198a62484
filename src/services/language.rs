use std::fmt;

/// Recognition languages the toolchain is provisioned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rus,
    Eng,
}

impl Language {
    pub const DEFAULT: Language = Language::Rus;

    pub fn code(self) -> &'static str {
        match self {
            Language::Rus => "rus",
            Language::Eng => "eng",
        }
    }

    /// Parses a single token; surrounding whitespace and case are ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "rus" => Some(Language::Rus),
            "eng" => Some(Language::Eng),
            _ => None,
        }
    }
}

/// Compound language selector applied to every file of a request, rendered as `rus+eng`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSelection(Vec<Language>);

impl LanguageSelection {
    /// Builds the selector from every value of the `lang` form field.
    ///
    /// Each value is a comma-separated token list. Unknown tokens are dropped, known ones
    /// keep their first-seen order, and an empty result falls back to [`Language::DEFAULT`].
    pub fn from_fields<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut languages = Vec::new();
        for value in values {
            for lang in value.as_ref().split(',').filter_map(Language::from_token) {
                if !languages.contains(&lang) {
                    languages.push(lang);
                }
            }
        }

        if languages.is_empty() {
            languages.push(Language::DEFAULT);
        }

        Self(languages)
    }

    pub fn languages(&self) -> &[Language] {
        &self.0
    }
}

impl Default for LanguageSelection {
    fn default() -> Self {
        Self(vec![Language::DEFAULT])
    }
}

impl fmt::Display for LanguageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, lang) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(lang.code())?;
        }
        Ok(())
    }
}
