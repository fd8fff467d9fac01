use serde::{Deserialize, Serialize};

/// Where the router reads and writes the current path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// The fragment after `#` holds the path.
    Hash,
    /// The location pathname holds the path, prefixed by `base_url`.
    #[default]
    History,
}

/// One entry of the route table. Paths may contain `:name` segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub path: String,
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Nested routes; relative paths are joined onto this route's path.
    #[serde(default)]
    pub children: Vec<RouteConfig>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = RouteConfig>) -> Self {
        self.children = children.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterOptions {
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub mode: RouterMode,
}

impl RouterOptions {
    pub fn new(routes: impl IntoIterator<Item = RouteConfig>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_mode(mut self, mode: RouterMode) -> Self {
        self.mode = mode;
        self
    }
}
