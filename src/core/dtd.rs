//! DOCTYPE and entity declarations
//!
//! Collects general entity declarations from the internal subset (and,
//! when enabled, the external subset). Element, attribute-list and notation
//! declarations are skipped; the raw subset text is kept on the document.

use super::entities::expand_char_refs;
use super::scanner::Scanner;
use std::collections::HashMap;

/// The `<!DOCTYPE ...>` declaration of a document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocTypeDecl {
    pub name: String,
    pub public_id: Option<String>,
    pub system_id: Option<String>,
    /// Raw text between `[` and `]`
    pub internal_subset: Option<String>,
}

/// What an entity reference expands to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValue {
    /// Replacement text from a literal, character references already expanded
    Internal(String),
    /// Parsed external entity
    External {
        public_id: Option<String>,
        system_id: String,
    },
    /// Unparsed (NDATA) entity, not referenceable from content
    Unparsed,
}

/// General and parameter entity declarations
#[derive(Debug, Default, Clone)]
pub struct EntityTable {
    general: HashMap<String, EntityValue>,
    parameter: HashMap<String, EntityValue>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. The first declaration of a name wins.
    pub fn declare(&mut self, name: &str, value: EntityValue, is_parameter: bool) {
        let map = if is_parameter {
            &mut self.parameter
        } else {
            &mut self.general
        };
        map.entry(name.to_string()).or_insert(value);
    }

    pub fn get(&self, name: &str) -> Option<&EntityValue> {
        self.general.get(name)
    }

    pub fn len(&self) -> usize {
        self.general.len()
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_empty()
    }
}

/// Find the `]` closing an internal subset, skipping quoted literals,
/// comments and processing instructions.
pub fn find_subset_end(subset: &str) -> Option<usize> {
    let mut s = Scanner::new(subset);
    while let Some(b) = s.peek() {
        match b {
            b']' => return Some(s.position()),
            b'<' if s.starts_with("<!--") => {
                s.advance(4);
                let end = s.find_str("-->")?;
                s.set_position(end + 3);
            }
            b'<' if s.starts_with("<?") => {
                s.advance(2);
                let end = s.find_str("?>")?;
                s.set_position(end + 2);
            }
            b'"' | b'\'' => {
                s.read_quoted()?;
            }
            _ => s.advance(1),
        }
    }
    None
}

/// Parse the declarations of a DTD subset into `table`.
///
/// Returns a message for every malformed entity declaration; parsing
/// resumes after the offending declaration.
pub fn parse_declarations(subset: &str, table: &mut EntityTable) -> Vec<String> {
    let mut problems = Vec::new();
    let mut s = Scanner::new(subset);

    while !s.is_eof() {
        if s.starts_with("<!--") {
            s.advance(4);
            match s.find_str("-->") {
                Some(end) => s.set_position(end + 3),
                None => break,
            }
        } else if s.starts_with("<?") {
            match s.find_str("?>") {
                Some(end) => s.set_position(end + 2),
                None => break,
            }
        } else if s.starts_with("<!ENTITY") {
            s.advance(8);
            if let Err(message) = parse_entity(&mut s, table) {
                problems.push(message);
            }
            skip_declaration(&mut s);
        } else if s.starts_with("<!") {
            skip_declaration(&mut s);
        } else {
            s.advance(1);
        }
    }

    problems
}

/// Parse one entity declaration; the scanner sits just after `<!ENTITY`
fn parse_entity(s: &mut Scanner<'_>, table: &mut EntityTable) -> Result<(), String> {
    if !s.skip_whitespace() {
        return Err("Space required after '<!ENTITY'".to_string());
    }

    let is_parameter = if s.peek() == Some(b'%') {
        s.advance(1);
        s.skip_whitespace();
        true
    } else {
        false
    };

    let name = s
        .read_name()
        .ok_or_else(|| "xmlParseEntityDecl: no name".to_string())?;
    s.skip_whitespace();

    let value = if let Some(literal) = s.read_quoted() {
        EntityValue::Internal(expand_char_refs(literal).into_owned())
    } else if s.starts_with("SYSTEM") || s.starts_with("PUBLIC") {
        let public = s.starts_with("PUBLIC");
        s.advance(6);
        s.skip_whitespace();
        let public_id = if public {
            let id = s
                .read_quoted()
                .ok_or_else(|| format!("Public identifier of entity '{}' missing", name))?;
            s.skip_whitespace();
            Some(id.to_string())
        } else {
            None
        };
        let system_id = s
            .read_quoted()
            .ok_or_else(|| format!("System identifier of entity '{}' missing", name))?
            .to_string();
        s.skip_whitespace();
        if s.starts_with("NDATA") {
            EntityValue::Unparsed
        } else {
            EntityValue::External { public_id, system_id }
        }
    } else {
        return Err(format!("Entity value required for '{}'", name));
    };

    table.declare(name, value, is_parameter);
    Ok(())
}

/// Move past the closing '>' of the current declaration
fn skip_declaration(s: &mut Scanner<'_>) {
    while let Some(b) = s.peek() {
        match b {
            b'>' => {
                s.advance(1);
                return;
            }
            b'"' | b'\'' => {
                if s.read_quoted().is_none() {
                    s.set_position(usize::MAX);
                    return;
                }
            }
            _ => s.advance(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_entity() {
        let mut table = EntityTable::new();
        let problems = parse_declarations(r#"<!ENTITY greet "hi &#65;">"#, &mut table);
        assert!(problems.is_empty());
        assert_eq!(
            table.get("greet"),
            Some(&EntityValue::Internal("hi A".to_string()))
        );
    }

    #[test]
    fn test_external_and_unparsed() {
        let mut table = EntityTable::new();
        parse_declarations(
            r#"<!-- c'mon --><!ENTITY ext SYSTEM "ext.txt">
               <!ENTITY pub PUBLIC "-//X//EN" "p.txt">
               <!ENTITY pic SYSTEM "pic.gif" NDATA gif>
               <!ELEMENT a (#PCDATA)>"#,
            &mut table,
        );
        assert_eq!(
            table.get("ext"),
            Some(&EntityValue::External {
                public_id: None,
                system_id: "ext.txt".to_string()
            })
        );
        assert!(matches!(
            table.get("pub"),
            Some(EntityValue::External { public_id: Some(_), .. })
        ));
        assert_eq!(table.get("pic"), Some(&EntityValue::Unparsed));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_first_declaration_wins() {
        let mut table = EntityTable::new();
        parse_declarations(r#"<!ENTITY e "one"><!ENTITY e "two">"#, &mut table);
        assert_eq!(table.get("e"), Some(&EntityValue::Internal("one".to_string())));
    }

    #[test]
    fn test_parameter_entities_are_not_general() {
        let mut table = EntityTable::new();
        parse_declarations(r#"<!ENTITY % p "x">"#, &mut table);
        assert!(table.get("p").is_none());
    }

    #[test]
    fn test_malformed_declaration_reported() {
        let mut table = EntityTable::new();
        let problems = parse_declarations(r#"<!ENTITY bad><!ENTITY ok "y">"#, &mut table);
        assert_eq!(problems.len(), 1);
        assert!(table.get("ok").is_some());
    }

    #[test]
    fn test_find_subset_end() {
        let subset = r#"<!ENTITY a "]"><!-- ] -->]>"#;
        assert_eq!(find_subset_end(subset), Some(subset.len() - 2));
    }
}
