//! XPath 1.0 Functions
//!
//! The XPath 1.0 core function library:
//!
//! Node Set Functions:
//! - position(), last(), count(), local-name(), namespace-uri(), name()
//!
//! String Functions:
//! - string(), concat(), starts-with(), contains(), substring(),
//!   substring-before(), substring-after(), string-length(),
//!   normalize-space(), translate()
//!
//! Boolean Functions:
//! - boolean(), not(), true(), false(), lang()
//!
//! Number Functions:
//! - number(), sum(), floor(), ceiling(), round()
//!
//! `id()` needs DTD attribute types and is rejected when an expression is
//! compiled, as are unknown names and wrong argument counts.

use super::eval::EvalContext;
use super::value::{parse_number, XPathValue};
use crate::dom::{DocumentAccess, NodeId, NodeKind};

/// Allowed argument counts; `None` means no upper bound
fn arity(name: &str) -> Option<(usize, Option<usize>)> {
    let range = match name {
        "position" | "last" | "true" | "false" => (0, Some(0)),
        "count" | "boolean" | "not" | "lang" | "sum" | "floor" | "ceiling" | "round" => {
            (1, Some(1))
        }
        "local-name" | "namespace-uri" | "name" | "string" | "string-length"
        | "normalize-space" | "number" => (0, Some(1)),
        "starts-with" | "contains" | "substring-before" | "substring-after" => (2, Some(2)),
        "substring" => (2, Some(3)),
        "translate" => (3, Some(3)),
        "concat" => (2, None),
        _ => return None,
    };
    Some(range)
}

/// Validate a function call at compile time
pub fn check_call(name: &str, argc: usize) -> Result<(), String> {
    if name == "id" {
        return Err("id() is not supported: documents carry no ID attribute types".to_string());
    }
    let Some((min, max)) = arity(name) else {
        return Err(format!("Unknown function: {}", name));
    };
    if argc < min || max.is_some_and(|max| argc > max) {
        let expected = match max {
            Some(max) if max == min => format!("{}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        return Err(format!(
            "{}() takes {} argument(s), got {}",
            name, expected, argc
        ));
    }
    Ok(())
}

/// Evaluate a function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    check_call(name, args.len())?;
    let doc = ctx.doc;

    let value = match name {
        // Node Set Functions
        "position" => XPathValue::Number(ctx.context_position as f64),
        "last" => XPathValue::Number(ctx.context_size as f64),
        "count" => XPathValue::Number(nodeset_arg(&args[0], name)?.len() as f64),
        "local-name" => {
            let node = optional_node(&args, ctx, name)?.filter(|&n| has_expanded_name(doc, n));
            let local = node.and_then(|n| doc.node_local_name(n));
            XPathValue::String(local.unwrap_or_default().to_string())
        }
        "namespace-uri" => {
            let node = optional_node(&args, ctx, name)?.filter(|&n| has_expanded_name(doc, n));
            let uri = node.and_then(|n| doc.node_namespace_uri(n));
            XPathValue::String(uri.unwrap_or_default().to_string())
        }
        "name" => {
            let node = optional_node(&args, ctx, name)?.filter(|&n| has_expanded_name(doc, n));
            let qname = node.and_then(|n| doc.node_name(n));
            XPathValue::String(qname.unwrap_or_default().to_string())
        }

        // String Functions
        "string" => XPathValue::String(string_arg(&args, 0, ctx)),
        "concat" => XPathValue::String(args.iter().map(|a| a.to_string_value(doc)).collect()),
        "starts-with" => {
            let (s, prefix) = (string_arg(&args, 0, ctx), string_arg(&args, 1, ctx));
            XPathValue::Boolean(s.starts_with(&prefix))
        }
        "contains" => {
            let (s, pattern) = (string_arg(&args, 0, ctx), string_arg(&args, 1, ctx));
            XPathValue::Boolean(s.contains(&pattern))
        }
        "substring" => fn_substring(&args, doc),
        "substring-before" => {
            let (s, pattern) = (string_arg(&args, 0, ctx), string_arg(&args, 1, ctx));
            let before = s.find(&pattern).map(|i| &s[..i]).unwrap_or_default();
            XPathValue::String(before.to_string())
        }
        "substring-after" => {
            let (s, pattern) = (string_arg(&args, 0, ctx), string_arg(&args, 1, ctx));
            let after = s
                .find(&pattern)
                .map(|i| &s[i + pattern.len()..])
                .unwrap_or_default();
            XPathValue::String(after.to_string())
        }
        "string-length" => XPathValue::Number(string_arg(&args, 0, ctx).chars().count() as f64),
        "normalize-space" => XPathValue::String(normalize_space(&string_arg(&args, 0, ctx))),
        "translate" => XPathValue::String(translate(
            &string_arg(&args, 0, ctx),
            &string_arg(&args, 1, ctx),
            &string_arg(&args, 2, ctx),
        )),

        // Boolean Functions
        "boolean" => XPathValue::Boolean(args[0].to_boolean()),
        "not" => XPathValue::Boolean(!args[0].to_boolean()),
        "true" => XPathValue::Boolean(true),
        "false" => XPathValue::Boolean(false),
        "lang" => XPathValue::Boolean(fn_lang(&args[0].to_string_value(doc), ctx)),

        // Number Functions
        "number" => XPathValue::Number(match args.first() {
            Some(arg) => arg.to_number(doc),
            None => parse_number(&doc.string_value(ctx.context_node)),
        }),
        "sum" => XPathValue::Number(
            nodeset_arg(&args[0], name)?
                .iter()
                .map(|&n| parse_number(&doc.string_value(n)))
                .sum(),
        ),
        "floor" => XPathValue::Number(args[0].to_number(doc).floor()),
        "ceiling" => XPathValue::Number(args[0].to_number(doc).ceil()),
        "round" => XPathValue::Number(round(args[0].to_number(doc))),

        _ => return Err(format!("Unknown function: {}", name)),
    };
    Ok(value)
}

fn nodeset_arg<'v>(arg: &'v XPathValue, name: &str) -> Result<&'v [NodeId], String> {
    arg.as_nodeset()
        .map(Vec::as_slice)
        .ok_or_else(|| format!("{}() argument must be a node-set", name))
}

/// First node of the optional node-set argument, defaulting to the context node
fn optional_node<D: DocumentAccess>(
    args: &[XPathValue],
    ctx: &EvalContext<'_, D>,
    name: &str,
) -> Result<Option<NodeId>, String> {
    match args.first() {
        None => Ok(Some(ctx.context_node)),
        Some(arg) => Ok(nodeset_arg(arg, name)?.first().copied()),
    }
}

/// String value of argument `i`, or of the context node when it is absent
fn string_arg<D: DocumentAccess>(args: &[XPathValue], i: usize, ctx: &EvalContext<'_, D>) -> String {
    match args.get(i) {
        Some(arg) => arg.to_string_value(ctx.doc),
        None => ctx.doc.string_value(ctx.context_node),
    }
}

/// Only elements, attributes and processing instructions have names
fn has_expanded_name<D: DocumentAccess>(doc: &D, id: NodeId) -> bool {
    matches!(
        doc.node_kind_of(id),
        Some(NodeKind::Element | NodeKind::Attribute | NodeKind::ProcessingInstruction)
    )
}

/// Characters at 1-based positions p with round(start) <= p < round(start) + round(len)
fn fn_substring<D: DocumentAccess>(args: &[XPathValue], doc: &D) -> XPathValue {
    let s = args[0].to_string_value(doc);
    let start = round(args[1].to_number(doc));
    let end = match args.get(2) {
        Some(len) => start + round(len.to_number(doc)),
        None => f64::INFINITY,
    };
    let result = s
        .chars()
        .enumerate()
        .filter(|&(i, _)| {
            let position = (i + 1) as f64;
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect();
    XPathValue::String(result)
}

fn normalize_space(s: &str) -> String {
    s.split(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r'))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Characters in `from` map to the character at the same position in `to`,
/// or are dropped when `to` is shorter. The first occurrence in `from` wins.
fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Nearest xml:lang on the ancestor-or-self axis, matched case-insensitively
/// either exactly or up to a '-' suffix
fn fn_lang<D: DocumentAccess>(lang: &str, ctx: &EvalContext<'_, D>) -> bool {
    let doc = ctx.doc;
    let mut current = Some(ctx.context_node);
    while let Some(id) = current {
        if let Some(value) = doc.attribute_value(id, "xml:lang") {
            let value = value.to_ascii_lowercase();
            let lang = lang.to_ascii_lowercase();
            return value == lang
                || value
                    .strip_prefix(lang.as_str())
                    .is_some_and(|rest| rest.starts_with('-'));
        }
        current = doc.parent_of(id);
    }
    false
}

/// round(): nearest integer, halves toward positive infinity
fn round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else if (-0.5..0.0).contains(&n) {
        -0.0
    } else {
        (n + 0.5).floor()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::XmlDocument;
    use crate::options::ParseOptions;

    fn parse(xml: &str) -> XmlDocument {
        XmlDocument::parse(xml.as_bytes(), &ParseOptions::default()).unwrap()
    }

    fn ctx(doc: &XmlDocument, node: NodeId) -> EvalContext<'_, XmlDocument> {
        EvalContext {
            doc,
            context_node: node,
            context_position: 2,
            context_size: 5,
        }
    }

    fn s(v: &str) -> XPathValue {
        XPathValue::String(v.to_string())
    }

    fn n(v: f64) -> XPathValue {
        XPathValue::Number(v)
    }

    #[test]
    fn test_check_call() {
        assert!(check_call("concat", 5).is_ok());
        assert!(check_call("concat", 1).is_err());
        assert!(check_call("substring", 3).is_ok());
        assert!(check_call("true", 1).unwrap_err().contains("true()"));
        assert!(check_call("id", 1).unwrap_err().contains("id()"));
        assert!(check_call("nope", 0).unwrap_err().contains("Unknown"));
    }

    #[test]
    fn test_context_functions() {
        let doc = parse("<r>x</r>");
        let c = ctx(&doc, doc.root_element_id().unwrap());
        assert_eq!(call("position", vec![], &c).unwrap(), n(2.0));
        assert_eq!(call("last", vec![], &c).unwrap(), n(5.0));
        assert_eq!(call("name", vec![], &c).unwrap(), s("r"));
        assert_eq!(call("string", vec![], &c).unwrap(), s("x"));
    }

    #[test]
    fn test_substring() {
        let doc = XmlDocument::new();
        let c = ctx(&doc, 0);
        assert_eq!(call("substring", vec![s("12345"), n(2.0), n(3.0)], &c).unwrap(), s("234"));
        assert_eq!(call("substring", vec![s("12345"), n(1.5), n(2.6)], &c).unwrap(), s("234"));
        assert_eq!(call("substring", vec![s("12345"), n(0.0), n(3.0)], &c).unwrap(), s("12"));
        assert_eq!(
            call("substring", vec![s("12345"), n(f64::NAN), n(3.0)], &c).unwrap(),
            s("")
        );
        assert_eq!(
            call("substring", vec![s("12345"), n(-42.0), n(f64::INFINITY)], &c).unwrap(),
            s("12345")
        );
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(normalize_space("  a \n\t b  c "), "a b c");
        assert_eq!(translate("bar", "abc", "ABC"), "BAr");
        assert_eq!(translate("--aaa--", "abc-", "ABC"), "AAA");
    }

    #[test]
    fn test_substring_before_after() {
        let doc = XmlDocument::new();
        let c = ctx(&doc, 0);
        let args = || vec![s("1999/04/01"), s("/")];
        assert_eq!(call("substring-before", args(), &c).unwrap(), s("1999"));
        assert_eq!(call("substring-after", args(), &c).unwrap(), s("04/01"));
        assert_eq!(call("substring-after", vec![s("abc"), s("z")], &c).unwrap(), s(""));
    }

    #[test]
    fn test_round() {
        assert_eq!(round(2.5), 3.0);
        assert_eq!(round(-2.5), -2.0);
        assert!(round(-0.2).is_sign_negative());
        assert!(round(f64::NAN).is_nan());
    }

    #[test]
    fn test_lang() {
        let doc = parse("<r xml:lang='en-GB'><p/></r>");
        let root = doc.root_element_id().unwrap();
        let p = doc.children(root).next().unwrap();
        let c = ctx(&doc, p);
        assert_eq!(call("lang", vec![s("en")], &c).unwrap(), XPathValue::Boolean(true));
        assert_eq!(call("lang", vec![s("EN-gb")], &c).unwrap(), XPathValue::Boolean(true));
        assert_eq!(call("lang", vec![s("fr")], &c).unwrap(), XPathValue::Boolean(false));
    }

    #[test]
    fn test_sum_and_count() {
        let doc = parse("<r><v>1</v><v>2.5</v></r>");
        let root = doc.root_element_id().unwrap();
        let ids: Vec<NodeId> = doc.children(root).collect();
        let c = ctx(&doc, root);
        assert_eq!(call("sum", vec![XPathValue::NodeSet(ids.clone())], &c).unwrap(), n(3.5));
        assert_eq!(call("count", vec![XPathValue::NodeSet(ids)], &c).unwrap(), n(2.0));
        assert!(call("count", vec![n(1.0)], &c).is_err());
    }
}
