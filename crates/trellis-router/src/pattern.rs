use crate::{
    options::RouteConfig,
    params::{ParamValue, RouteParams},
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `prefix:name`; the parameter takes the non-empty rest of the segment
    /// after `prefix`, so `/v:version` matches `/v2` with `version = "2"`.
    Param { prefix: String, name: String },
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    id: String,
    path: String,
    segments: Vec<Segment>,
}

impl CompiledRoute {
    fn compile(id: &str, path: &str) -> Self {
        let segments = path
            .split('/')
            .map(|part| match part.split_once(':') {
                Some((prefix, name)) if !name.is_empty() => Segment::Param {
                    prefix: prefix.to_string(),
                    name: name.to_string(),
                },
                _ => Segment::Literal(part.to_string()),
            })
            .collect();
        Self {
            id: id.to_string(),
            path: path.to_string(),
            segments,
        }
    }

    /// Whole-path match: same segment count, equal literals, non-empty params.
    fn matches(&self, parts: &[&str]) -> bool {
        parts.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match segment {
                    Segment::Literal(literal) => literal.as_str() == *part,
                    Segment::Param { prefix, .. } => part
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| !rest.is_empty()),
                })
    }

    fn bind(&self, parts: &[&str]) -> RouteParams {
        self.segments
            .iter()
            .zip(parts)
            .filter_map(|(segment, part)| match segment {
                Segment::Param { prefix, name } => Some((
                    name.clone(),
                    ParamValue::from(&part[prefix.len()..]),
                )),
                Segment::Literal(_) => None,
            })
            .collect()
    }
}

/// Route table compiled once from the configured routes.
///
/// A segment containing `:` is a parameter: any literal text before the `:`
/// must match, and the parameter binds the rest of the segment.
///
/// Lookup is first-match in declaration order (children directly after their
/// parent). There is no specificity ranking: `/users/:id` declared before
/// `/users/me` shadows it.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub id: &'a str,
    pub pattern: &'a str,
    pub params: RouteParams,
}

impl RouteTable {
    pub fn compile(routes: &[RouteConfig]) -> Self {
        let mut compiled = Vec::new();
        for route in routes {
            flatten(route, None, &mut compiled);
        }
        Self { routes: compiled }
    }

    pub fn find(&self, path: &str) -> Option<RouteMatch<'_>> {
        let parts: Vec<&str> = path.split('/').collect();
        self.routes
            .iter()
            .find(|route| route.matches(&parts))
            .map(|route| RouteMatch {
                id: &route.id,
                pattern: &route.path,
                params: route.bind(&parts),
            })
    }

    /// Named segments of the first matching route; empty when nothing matches.
    pub fn extract_params(&self, path: &str) -> RouteParams {
        self.find(path).map(|m| m.params).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn flatten(route: &RouteConfig, parent_path: Option<&str>, out: &mut Vec<CompiledRoute>) {
    let path = match parent_path {
        Some(parent) if !route.path.starts_with('/') => join(parent, &route.path),
        _ => route.path.clone(),
    };
    out.push(CompiledRoute::compile(&route.id, &path));
    for child in &route.children {
        flatten(child, Some(&path), out);
    }
}

fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    if child.is_empty() {
        return if parent.is_empty() { "/".into() } else { parent.into() };
    }
    format!("{parent}/{child}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        RouteTable::compile(&[
            RouteConfig::new("/", "home"),
            RouteConfig::new("/about", "about"),
            RouteConfig::new("/users/:id", "user"),
            RouteConfig::new("/products/:category/:id", "product"),
        ])
    }

    fn param(value: &str) -> ParamValue {
        ParamValue::from(value)
    }

    #[test]
    fn binds_single_parameter() {
        let params = table().extract_params("/users/123");
        assert_eq!(params, RouteParams::from([("id".into(), param("123"))]));
    }

    #[test]
    fn binds_multiple_parameters_positionally() {
        let table = table();
        let found = table.find("/products/electronics/456").expect("match");
        assert_eq!(found.id, "product");
        assert_eq!(found.pattern, "/products/:category/:id");
        assert_eq!(
            found.params,
            RouteParams::from([
                ("category".into(), param("electronics")),
                ("id".into(), param("456")),
            ])
        );
    }

    #[test]
    fn match_is_anchored_to_the_whole_path() {
        let table = table();
        assert!(table.find("/users").is_none());
        assert!(table.find("/users/").is_none());
        assert!(table.find("/users/1/posts").is_none());
        assert!(table.find("/users/1/").is_none());
        assert!(table.find("/about/").is_none());
        assert_eq!(table.find("/").map(|m| m.id), Some("home"));
    }

    #[test]
    fn unmatched_path_has_no_params() {
        assert!(table().extract_params("/nowhere/at/all").is_empty());
    }

    #[test]
    fn parameter_may_follow_a_literal_prefix() {
        let table = RouteTable::compile(&[
            RouteConfig::new("/a-:id", "prefixed"),
            RouteConfig::new("/files/:name.json", "dotted"),
        ]);

        let found = table.find("/a-5").expect("match");
        assert_eq!(found.id, "prefixed");
        assert_eq!(found.params.get("id"), Some(&param("5")));
        assert!(table.find("/a-").is_none());
        assert!(table.find("/b-5").is_none());

        // The name runs to the end of the segment.
        let found = table.find("/files/report").expect("match");
        assert_eq!(found.params.get("name.json"), Some(&param("report")));
    }

    #[test]
    fn declaration_order_is_precedence() {
        let table = RouteTable::compile(&[
            RouteConfig::new("/users/:id", "user"),
            RouteConfig::new("/users/me", "me"),
        ]);
        let found = table.find("/users/me").expect("match");
        assert_eq!(found.id, "user");
        assert_eq!(found.params.get("id"), Some(&param("me")));
    }

    #[test]
    fn children_are_flattened_after_parent() {
        let table = RouteTable::compile(&[RouteConfig::new("/settings", "settings")
            .with_children([
                RouteConfig::new("profile", "settings-profile"),
                RouteConfig::new("/absolute", "absolute"),
                RouteConfig::new(":section", "settings-section"),
            ])]);

        assert_eq!(table.len(), 4);
        assert_eq!(
            table.find("/settings/profile").map(|m| m.id),
            Some("settings-profile")
        );
        assert_eq!(table.find("/absolute").map(|m| m.id), Some("absolute"));
        let section = table.find("/settings/billing").expect("match");
        assert_eq!(section.id, "settings-section");
        assert_eq!(section.params.get("section"), Some(&param("billing")));
    }
}
