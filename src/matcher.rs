use std::collections::BTreeMap;

use crate::model::Application;

/// How display names are compared and ordered. Both modes are locale
/// agnostic; the insensitive mode folds ASCII letters only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseMode {
    #[default]
    Sensitive,
    Insensitive,
}

impl CaseMode {
    /// Comparison key of `name`. Folding keeps byte offsets intact.
    fn key(self, name: &str) -> String {
        match self {
            CaseMode::Sensitive => name.to_string(),
            CaseMode::Insensitive => name.to_ascii_lowercase(),
        }
    }
}

/// Result of resolving a selector query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<'a> {
    /// Display name that matched.
    pub name: &'a str,
    pub app: &'a Application,
    /// Rest of the query after the matched name, passed as extra arguments.
    pub args: String,
}

/// Display name to application mapping shown to the selector.
#[derive(Debug, Clone)]
pub struct NameView<'a> {
    case: CaseMode,
    names: BTreeMap<String, (String, &'a Application)>,
}

impl<'a> NameView<'a> {
    pub fn new(case: CaseMode) -> Self {
        Self {
            case,
            names: BTreeMap::new(),
        }
    }

    /// Add `name`. Returns `false` (and keeps the existing mapping) when an
    /// equal name is already present.
    pub fn insert(&mut self, name: String, app: &'a Application) -> bool {
        use std::collections::btree_map::Entry;

        match self.names.entry(self.case.key(&name)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert((name, app));
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display names in comparison order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.names.values().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &'a Application)> + '_ {
        self.names.values().map(|(name, app)| (name.as_str(), *app))
    }

    /// The stored spelling of a name that compares equal to `name`.
    pub fn display_name(&self, name: &str) -> Option<&str> {
        self.names
            .get(&self.case.key(name))
            .map(|(display, _)| display.as_str())
    }

    /// Exact match first; otherwise the first name that is a prefix of the
    /// query, with the remainder of the query as arguments.
    pub fn lookup(&self, query: &str) -> Option<Lookup<'_>> {
        let query_key = self.case.key(query);
        if let Some((name, app)) = self.names.get(&query_key) {
            return Some(Lookup {
                name,
                app: *app,
                args: String::new(),
            });
        }
        self.names
            .iter()
            .find(|(key, _)| !key.is_empty() && query_key.starts_with(key.as_str()))
            .map(|(key, (name, app))| Lookup {
                name,
                app: *app,
                args: query[key.len()..].to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DesktopEntry;
    use std::path::PathBuf;

    fn app(id: &str) -> Application {
        Application {
            id: id.to_string(),
            rank: 0,
            path: PathBuf::from(id),
            entry: DesktopEntry::default(),
        }
    }

    #[test]
    fn case_insensitive_lookup() {
        let firefox = app("firefox.desktop");
        let mut view = NameView::new(CaseMode::Insensitive);
        view.insert("Firefox".to_string(), &firefox);

        let hit = view.lookup("firefox").unwrap();
        assert_eq!(hit.name, "Firefox");
        assert_eq!(hit.app.id, "firefox.desktop");
        assert!(hit.args.is_empty());
    }

    #[test]
    fn case_sensitive_lookup() {
        let firefox = app("firefox.desktop");
        let mut view = NameView::new(CaseMode::Sensitive);
        view.insert("Firefox".to_string(), &firefox);

        assert!(view.lookup("firefox").is_none());
        assert!(view.lookup("Firefox").is_some());
    }

    #[test]
    fn prefix_lookup_keeps_residual_arguments() {
        let firefox = app("firefox.desktop");
        let mut view = NameView::new(CaseMode::Sensitive);
        view.insert("firefox".to_string(), &firefox);

        let hit = view.lookup("firefox --private").unwrap();
        assert_eq!(hit.name, "firefox");
        assert_eq!(hit.args, " --private");

        assert!(view.lookup("fire").is_none());
        assert!(view.lookup("ls -la").is_none());
    }

    #[test]
    fn insensitive_prefix_slices_original_query() {
        let gimp = app("gimp.desktop");
        let mut view = NameView::new(CaseMode::Insensitive);
        view.insert("GIMP".to_string(), &gimp);
        assert_eq!(view.lookup("gimp Photo.PNG").unwrap().args, " Photo.PNG");
    }

    #[test]
    fn first_name_wins_on_collision() {
        let a = app("a.desktop");
        let b = app("b.desktop");
        let mut view = NameView::new(CaseMode::Insensitive);
        assert!(view.insert("Editor".to_string(), &a));
        assert!(!view.insert("editor".to_string(), &b));
        assert_eq!(view.len(), 1);
        assert_eq!(view.lookup("EDITOR").unwrap().app.id, "a.desktop");
    }

    #[test]
    fn names_are_ordered_by_comparison_key() {
        let a = app("a.desktop");
        let mut view = NameView::new(CaseMode::Insensitive);
        view.insert("beta".to_string(), &a);
        view.insert("Alpha".to_string(), &a);
        view.insert("Gamma".to_string(), &a);
        assert_eq!(view.names().collect::<Vec<_>>(), vec!["Alpha", "beta", "Gamma"]);

        let mut view = NameView::new(CaseMode::Sensitive);
        view.insert("beta".to_string(), &a);
        view.insert("Alpha".to_string(), &a);
        view.insert("Gamma".to_string(), &a);
        assert_eq!(view.names().collect::<Vec<_>>(), vec!["Alpha", "Gamma", "beta"]);
    }
}
