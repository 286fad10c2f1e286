//! Field patterns: each field is either a literal that must match exactly or
//! a variable that binds (or must agree with an existing binding).

use crate::frame::{Frame, Var};
use crate::value::{Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Literal(Value),
    Var(Var),
    /// Binds like `Var`, but an absent field binds the default instead of
    /// failing the match.
    Default(Var, Value),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Term::Var(Var::new(name))
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Term::Literal(value.into())
    }

    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(v) | Term::Default(v, _) => Some(v),
            Term::Literal(_) => None,
        }
    }
}

/// Ordered list of `(field, term)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pattern {
    fields: Vec<(String, Term)>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, term: Term) -> Self {
        self.fields.push((name.into(), term));
        self
    }

    /// Field bound to a variable of the same name (`{ email }`).
    pub fn var(self, name: &str) -> Self {
        self.field(name, Term::var(name))
    }

    /// Several same-named variables at once.
    pub fn vars(self, names: &[&str]) -> Self {
        names.iter().fold(self, |p, n| p.var(n))
    }

    /// Field bound to a differently named variable (`{ owner: user }`).
    pub fn bind(self, field: &str, var: &str) -> Self {
        self.field(field, Term::var(var))
    }

    /// Same-named variable that falls back to `default` when the field is
    /// missing (`{ comment = "" }`).
    pub fn var_or(self, name: &str, default: impl Into<Value>) -> Self {
        self.field(name, Term::Default(Var::from(name), default.into()))
    }

    pub fn lit(self, field: &str, value: impl Into<Value>) -> Self {
        self.field(field, Term::lit(value))
    }

    /// Append every field of `other`.
    pub fn with(mut self, other: Pattern) -> Self {
        self.fields.extend(other.fields);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Term)> {
        self.fields.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn vars_used(&self) -> impl Iterator<Item = &Var> {
        self.fields.iter().filter_map(|(_, t)| t.as_var())
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Separate the `error` field from the rest, so success rows and failure
    /// records can be matched against the part that applies to them.
    pub fn split_error(&self) -> (Pattern, Option<Term>) {
        let mut rest = Pattern::new();
        let mut error = None;
        for (k, t) in &self.fields {
            if k == "error" {
                error = Some(t.clone());
            } else {
                rest.fields.push((k.clone(), t.clone()));
            }
        }
        (rest, error)
    }

    /// Unify this pattern against `record` starting from `frame`.
    ///
    /// Every field named by the pattern must be present in the record,
    /// except defaulted ones. Literals compare by equality; variables bind
    /// or must agree.
    pub fn matches(&self, record: &Record, frame: &Frame) -> Option<Frame> {
        let mut next = frame.clone();
        for (field, term) in &self.fields {
            let value = record.get(field);
            match term {
                Term::Literal(expected) => {
                    if Some(expected) != value {
                        return None;
                    }
                }
                Term::Var(var) => {
                    if !next.unify(var, value?) {
                        return None;
                    }
                }
                Term::Default(var, default) => {
                    if !next.unify(var, value.unwrap_or(default)) {
                        return None;
                    }
                }
            }
        }
        Some(next)
    }

    /// Substitute bound variables to build a concrete argument record.
    /// Returns the first unbound variable on failure.
    pub fn instantiate(&self, frame: &Frame) -> Result<Record, Var> {
        let mut out = Record::new();
        for (field, term) in &self.fields {
            let value = match term {
                Term::Literal(v) => v.clone(),
                Term::Var(var) => frame.get(var).cloned().ok_or_else(|| var.clone())?,
                Term::Default(var, default) => frame.get(var).unwrap_or(default).clone(),
            };
            out.insert(field.clone(), value);
        }
        Ok(out)
    }

    /// Compact `{path: "/x", email: ?email}` rendering for listings.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(k, t)| match t {
                Term::Literal(v) => format!("{k}: {v}"),
                Term::Var(var) if var.as_str() == k => k.clone(),
                Term::Var(var) => format!("{k}: ?{var}"),
                Term::Default(var, v) if var.as_str() == k => format!("{k} = {v}"),
                Term::Default(var, v) => format!("{k}: ?{var} = {v}"),
            })
            .collect();
        format!("{{{}}}", parts.join(", "))
    }
}
