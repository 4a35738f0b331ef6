use std::path::PathBuf;

use super::{ArgValue, AssignForm, Directive, QualifiedName};
use crate::error::{NqlError, Result};

/// Display heading requested with `TITLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title {
    pub text: String,
    pub size: Option<u32>,
}

/// The validated directives of one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectiveSet {
    /// Argument bindings in the order given.
    pub args: Vec<(String, ArgValue)>,
    pub session: Option<String>,
    pub create_table: Option<QualifiedName>,
    pub create_view: Option<QualifiedName>,
    pub csv: Option<PathBuf>,
    /// `(form, target variable)` pairs in the order given.
    pub assigns: Vec<(AssignForm, String)>,
    pub title: Option<Title>,
    pub nojinja: bool,
    pub show: bool,
}

impl DirectiveSet {
    /// Builds a set from a token stream, rejecting unrecognized chunks and
    /// repeated actions.
    pub fn from_tokens(tokens: impl IntoIterator<Item = Directive>) -> Result<Self> {
        let mut set = Self::default();
        for token in tokens {
            set.push(token)?;
        }

        if set.assigns.iter().any(|(form, _)| *form == AssignForm::Sql) && !set.args.is_empty() {
            return Err(NqlError::syntax(
                "SQL assignment cannot be combined with argument bindings",
            ));
        }
        Ok(set)
    }

    fn push(&mut self, token: Directive) -> Result<()> {
        let kind = token.kind();
        let duplicate = || NqlError::syntax(format!("{kind} given more than once"));

        match token {
            Directive::Arg { name, value } => {
                if self.args.iter().any(|(existing, _)| *existing == name) {
                    return Err(NqlError::syntax(format!(
                        "argument '{name}' given more than once"
                    )));
                }
                self.args.push((name, value));
            }
            Directive::Session(name) => set_once(&mut self.session, name, duplicate)?,
            Directive::CreateTable(name) => set_once(&mut self.create_table, name, duplicate)?,
            Directive::CreateView(name) => set_once(&mut self.create_view, name, duplicate)?,
            Directive::Csv(path) => set_once(&mut self.csv, path, duplicate)?,
            Directive::Assign { form, target } => {
                if self.assign_target(form).is_some() {
                    return Err(NqlError::syntax(format!("{form} assigned more than once")));
                }
                self.assigns.push((form, target));
            }
            Directive::Title { text, size } => {
                set_once(&mut self.title, Title { text, size }, duplicate)?
            }
            Directive::NoJinja => self.nojinja = true,
            Directive::Show => self.show = true,
            Directive::Unrecognized(text) => {
                return Err(NqlError::syntax(format!("unrecognized directive '{text}'")));
            }
        }
        Ok(())
    }

    /// Variable bound to `form`, if any.
    pub fn assign_target(&self, form: AssignForm) -> Option<&str> {
        self.assigns
            .iter()
            .find(|(f, _)| *f == form)
            .map(|(_, target)| target.as_str())
    }

    /// True when the block creates a table or view or exports a file.
    pub fn has_side_effect(&self) -> bool {
        self.create_table.is_some() || self.create_view.is_some() || self.csv.is_some()
    }

    /// True when the result frame should be displayed: on `SHOW`, or when no
    /// other action was requested.
    pub fn shows(&self) -> bool {
        self.show || (!self.has_side_effect() && self.assigns.is_empty())
    }
}

fn set_once<T>(slot: &mut Option<T>, value: T, duplicate: impl FnOnce() -> NqlError) -> Result<()> {
    if slot.is_some() {
        return Err(duplicate());
    }
    *slot = Some(value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::{parse_directives, tokenize};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_directive_shows() {
        let set = parse_directives("").unwrap();
        assert_eq!(set, DirectiveSet::default());
        assert!(set.shows());
    }

    #[test]
    fn test_full_set() {
        let set = parse_directives(
            "SESSION main CREATE s.t TITLE 'T' NOJ limit=10 first=ROW all=ROWS",
        )
        .unwrap();
        assert_eq!(set.session.as_deref(), Some("main"));
        assert_eq!(set.create_table.map(|n| n.to_sql()), Some("s.t".to_string()));
        assert_eq!(
            set.title,
            Some(Title {
                text: "T".to_string(),
                size: None
            })
        );
        assert!(set.nojinja);
        assert_eq!(set.args.len(), 1);
        assert_eq!(
            set.assigns,
            vec![
                (AssignForm::Row, "first".to_string()),
                (AssignForm::Rows, "all".to_string())
            ]
        );
    }

    #[test]
    fn test_unrecognized_is_syntax_error() {
        let err = parse_directives("SHOW bogus").unwrap_err();
        assert!(matches!(err, NqlError::Syntax(_)));
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_duplicate_actions_rejected() {
        for line in [
            "CREATE a CREATE b",
            "VIEW a VIEW b",
            "CSV a.csv CSV b.csv",
            "x=DF y=df",
            "SESSION a SESSION b",
            "TITLE 'a' TITLE 'b'",
            "n=1 n=2",
        ] {
            let err = parse_directives(line).unwrap_err();
            assert!(matches!(err, NqlError::Syntax(_)), "{line} should fail");
        }
    }

    #[test]
    fn test_repeated_flags_are_harmless() {
        let set = parse_directives("SHOW SHOW NOJ NOJINJA").unwrap();
        assert!(set.show);
        assert!(set.nojinja);
    }

    #[test]
    fn test_sql_form_with_arguments_rejected() {
        let err = parse_directives("q=SQL name='x'").unwrap_err();
        assert!(matches!(err, NqlError::Syntax(_)));
        assert!(parse_directives("q=SQL").is_ok());
    }

    #[test]
    fn test_shows_defaults() {
        assert!(!parse_directives("x=DF").unwrap().shows());
        assert!(parse_directives("x=DF SHOW").unwrap().shows());
        assert!(!parse_directives("CSV out.csv").unwrap().shows());
        assert!(parse_directives("TITLE 'only a title'").unwrap().shows());
    }

    #[test]
    fn test_from_tokens_preserves_order() {
        let set = DirectiveSet::from_tokens(tokenize("b='2' a='1'").unwrap()).unwrap();
        let names: Vec<&str> = set.args.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
