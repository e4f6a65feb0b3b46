//! Language selector and the locale conventions derived from it

use serde::{Deserialize, Serialize};

/// Language selector resolved to a locale before each invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Cs,
    Sk,
    De,
    Hu,
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "en-us" => Ok(Language::En),
            "cs" | "cs-cz" => Ok(Language::Cs),
            "sk" | "sk-sk" => Ok(Language::Sk),
            "de" | "de-de" => Ok(Language::De),
            "hu" | "hu-hu" => Ok(Language::Hu),
            _ => anyhow::bail!("Unsupported language: {}", s),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_language_tag())
    }
}

impl Language {
    /// BCP 47 tag handed to the script as its last argument
    pub fn to_language_tag(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Cs => "cs",
            Language::Sk => "sk",
            Language::De => "de",
            Language::Hu => "hu",
        }
    }

    pub fn to_locale(self) -> Locale {
        match self {
            Language::En => Locale {
                tag: "en-US",
                decimal_separator: '.',
                group_separator: Some(','),
                yes: "Yes",
                no: "No",
                date_time_pattern: "%m/%d/%Y %H:%M",
            },
            Language::Cs => Locale {
                tag: "cs-CZ",
                decimal_separator: ',',
                group_separator: Some('\u{a0}'),
                yes: "Ano",
                no: "Ne",
                date_time_pattern: "%d.%m.%Y %H:%M",
            },
            Language::Sk => Locale {
                tag: "sk-SK",
                decimal_separator: ',',
                group_separator: Some('\u{a0}'),
                yes: "Áno",
                no: "Nie",
                date_time_pattern: "%d.%m.%Y %H:%M",
            },
            Language::De => Locale {
                tag: "de-DE",
                decimal_separator: ',',
                group_separator: Some('.'),
                yes: "Ja",
                no: "Nein",
                date_time_pattern: "%d.%m.%Y %H:%M",
            },
            Language::Hu => Locale {
                tag: "hu-HU",
                decimal_separator: ',',
                group_separator: Some('\u{a0}'),
                yes: "Igen",
                no: "Nem",
                date_time_pattern: "%Y. %m. %d. %H:%M",
            },
        }
    }
}

/// Formatting conventions of one locale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    pub tag: &'static str,
    pub decimal_separator: char,
    pub group_separator: Option<char>,
    pub yes: &'static str,
    pub no: &'static str,
    /// chrono format string used for date-time values
    pub date_time_pattern: &'static str,
}

impl Default for Locale {
    fn default() -> Self {
        Language::default().to_locale()
    }
}
