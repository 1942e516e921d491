use std::env;

/// Locale suffixes to try when reading localized keys like `Name[de_AT]`,
/// most specific first. The last suffix is always the empty default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSuffixes {
    suffixes: Vec<String>,
}

impl Default for LocaleSuffixes {
    fn default() -> Self {
        Self {
            suffixes: vec![String::new()],
        }
    }
}

impl LocaleSuffixes {
    /// Locale of `LC_ALL`, `LC_MESSAGES` or `LANG`, whichever is set first.
    pub fn from_env() -> Self {
        let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|value| !value.is_empty())
            .unwrap_or_default();
        Self::new(&locale)
    }

    /// Parse `lang[_COUNTRY][.ENCODING][@MODIFIER]`.
    pub fn new(locale: &str) -> Self {
        let (rest, modifier) = match locale.split_once('@') {
            Some((rest, modifier)) => (rest, Some(modifier).filter(|m| !m.is_empty())),
            None => (locale, None),
        };
        // The encoding never takes part in matching.
        let rest = rest.split_once('.').map_or(rest, |(base, _)| base);
        let (lang, country) = match rest.split_once('_') {
            Some((lang, country)) => (lang, Some(country).filter(|c| !c.is_empty())),
            None => (rest, None),
        };

        if lang.is_empty() || lang == "C" || lang == "POSIX" {
            return Self::default();
        }

        let mut candidates = Vec::with_capacity(5);
        if let (Some(country), Some(modifier)) = (country, modifier) {
            candidates.push(format!("{lang}_{country}@{modifier}"));
        }
        if let Some(country) = country {
            candidates.push(format!("{lang}_{country}"));
        }
        if let Some(modifier) = modifier {
            candidates.push(format!("{lang}@{modifier}"));
        }
        candidates.push(lang.to_string());
        candidates.push(String::new());

        let mut suffixes: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !suffixes.contains(&candidate) {
                suffixes.push(candidate);
            }
        }
        Self { suffixes }
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Position of `suffix` in the preference order, `None` if it is not
    /// acceptable at all.
    pub fn priority(&self, suffix: &str) -> Option<usize> {
        self.suffixes.iter().position(|s| s == suffix)
    }
}
