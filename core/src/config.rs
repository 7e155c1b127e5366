use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::decl::DeclKind;
use crate::util::fast_map::{FastHashMap, FastHashSet, fast_hash_map_new, fast_hash_set_new};

/// The dialect's fixed tables: which attributes carry expressions, which
/// elements bind variables, which element names are declaration-shaped.
/// An immutable value threaded into every pass; never a global mutable.
#[derive(Debug, Clone)]
pub struct DialectConfig {
    /// Attribute local names whose whole value is an expression.
    expression_attributes: FastHashSet<String>,
    /// Element local names that bind a variable visible to later siblings.
    binding_elements: FastHashSet<String>,
    /// Declaration-shaped element local names and their kinds.
    declaration_elements: FastHashMap<String, DeclKind>,
    /// Attribute local name carrying a construct's name.
    pub name_attribute: String,
}

impl DialectConfig {
    pub fn is_expression_attribute(&self, attr_local: &str) -> bool {
        self.expression_attributes.contains(attr_local)
    }

    pub fn is_binding_element(&self, element_local: &str) -> bool {
        self.binding_elements.contains(element_local)
    }

    pub fn declaration_kind(&self, element_local: &str) -> Option<DeclKind> {
        self.declaration_elements.get(element_local).copied()
    }

    /// Parse a TOML override. Absent keys keep the XSLT 3.0 defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).context("invalid dialect config")?;
        let mut config = Self::default();
        if let Some(attrs) = file.expression_attributes {
            config.expression_attributes = attrs.into_iter().collect();
        }
        if let Some(elements) = file.binding_elements {
            config.binding_elements = elements.into_iter().collect();
        }
        if let Some(name) = file.name_attribute {
            config.name_attribute = name;
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    expression_attributes: Option<Vec<String>>,
    binding_elements: Option<Vec<String>>,
    name_attribute: Option<String>,
}

impl Default for DialectConfig {
    fn default() -> Self {
        let mut expression_attributes = fast_hash_set_new();
        for attr in [
            "select", "test", "match", "use", "group-by", "group-adjacent",
            "group-starting-with", "group-ending-with", "count", "from", "value",
            "initial-value", "use-when", "key",
        ] {
            expression_attributes.insert(attr.to_string());
        }

        let mut binding_elements = fast_hash_set_new();
        for element in ["variable", "param"] {
            binding_elements.insert(element.to_string());
        }

        let mut declaration_elements = fast_hash_map_new();
        for (element, kind) in [
            ("template", DeclKind::Template),
            ("function", DeclKind::Function),
            ("variable", DeclKind::Variable),
            ("param", DeclKind::Parameter),
            ("mode", DeclKind::Mode),
            ("key", DeclKind::Key),
            ("accumulator", DeclKind::Accumulator),
            ("attribute-set", DeclKind::AttributeSet),
            ("import", DeclKind::Import),
            ("include", DeclKind::Include),
            ("use-package", DeclKind::UsePackage),
        ] {
            declaration_elements.insert(element.to_string(), kind);
        }

        Self {
            expression_attributes,
            binding_elements,
            declaration_elements,
            name_attribute: "name".to_string(),
        }
    }
}

/// Built-in function library subset: local name -> (min arity, max arity).
pub static BUILTIN_FUNCTIONS: Lazy<FastHashMap<&'static str, (u8, u8)>> = Lazy::new(|| {
    let mut m = fast_hash_map_new();
    let entries: &[(&str, u8, u8)] = &[
        ("abs", 1, 1),
        ("avg", 1, 1),
        ("boolean", 1, 1),
        ("ceiling", 1, 1),
        ("concat", 2, 255),
        ("contains", 2, 3),
        ("count", 1, 1),
        ("current", 0, 0),
        ("current-date", 0, 0),
        ("current-dateTime", 0, 0),
        ("current-group", 0, 0),
        ("current-grouping-key", 0, 0),
        ("data", 0, 1),
        ("deep-equal", 2, 3),
        ("distinct-values", 1, 2),
        ("document", 1, 2),
        ("doc", 1, 1),
        ("doc-available", 1, 1),
        ("empty", 1, 1),
        ("ends-with", 2, 3),
        ("error", 0, 3),
        ("exactly-one", 1, 1),
        ("exists", 1, 1),
        ("false", 0, 0),
        ("floor", 1, 1),
        ("format-date", 2, 5),
        ("format-dateTime", 2, 5),
        ("format-number", 2, 3),
        ("format-time", 2, 5),
        ("generate-id", 0, 1),
        ("head", 1, 1),
        ("index-of", 2, 3),
        ("insert-before", 3, 3),
        ("key", 2, 3),
        ("last", 0, 0),
        ("local-name", 0, 1),
        ("lower-case", 1, 1),
        ("matches", 2, 3),
        ("max", 1, 2),
        ("min", 1, 2),
        ("name", 0, 1),
        ("namespace-uri", 0, 1),
        ("normalize-space", 0, 1),
        ("normalize-unicode", 1, 2),
        ("not", 1, 1),
        ("number", 0, 1),
        ("one-or-more", 1, 1),
        ("position", 0, 0),
        ("remove", 2, 2),
        ("replace", 3, 4),
        ("reverse", 1, 1),
        ("root", 0, 1),
        ("round", 1, 2),
        ("starts-with", 2, 3),
        ("string", 0, 1),
        ("string-join", 1, 2),
        ("string-length", 0, 1),
        ("string-to-codepoints", 1, 1),
        ("subsequence", 2, 3),
        ("substring", 2, 3),
        ("substring-after", 2, 3),
        ("substring-before", 2, 3),
        ("sum", 1, 2),
        ("tail", 1, 1),
        ("tokenize", 1, 3),
        ("trace", 1, 2),
        ("translate", 3, 3),
        ("true", 0, 0),
        ("unordered", 1, 1),
        ("upper-case", 1, 1),
        ("zero-or-one", 1, 1),
    ];
    for &(name, lo, hi) in entries {
        m.insert(name, (lo, hi));
    }
    m
});

/// Whether the built-in library has an entry accepting `arity` arguments.
pub fn builtin_accepts(local: &str, arity: usize) -> bool {
    match BUILTIN_FUNCTIONS.get(local) {
        Some(&(lo, hi)) => arity >= lo as usize && arity <= hi as usize,
        None => false,
    }
}
