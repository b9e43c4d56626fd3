//! URL routes generated from the catalog.
//!
//! Every entity gets up to five routes, one per [`Action`]. Whether an action
//! is routed is decided, in order of precedence, by an explicit override, the
//! global `router.actions` configuration, and finally a bit in the
//! [`ActionMask`].

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{Catalog, PK_ALIAS};
use crate::config::{RouterConfig, ScaffoldConfig};
use crate::error::Error;
use crate::views::ActionView;

/// A generated view kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Insert form.
    Create,
    /// Bulk delete.
    Delete,
    /// Edit form.
    Update,
    /// Single record.
    Detail,
    /// Paginated list.
    List,
}

impl Action {
    /// All actions in mask-bit order, lowest bit first.
    pub const ALL: [Action; 5] = [
        Action::List,
        Action::Detail,
        Action::Update,
        Action::Delete,
        Action::Create,
    ];

    /// Bit position in an [`ActionMask`].
    pub fn bit(self) -> u8 {
        match self {
            Action::List => 0,
            Action::Detail => 1,
            Action::Update => 2,
            Action::Delete => 3,
            Action::Create => 4,
        }
    }

    /// Lowercase name, as used in route names.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Delete => "delete",
            Action::Update => "update",
            Action::Detail => "detail",
            Action::List => "list",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown action '{}'", s)))
    }
}

/// Five-bit action selector: create, delete, update, detail, list from the
/// high bit down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionMask(pub u8);

impl Default for ActionMask {
    fn default() -> Self {
        ActionMask(0b11111)
    }
}

impl ActionMask {
    /// Check if the mask enables an action.
    pub fn contains(self, action: Action) -> bool {
        self.0 & (1 << action.bit()) != 0
    }
}

impl fmt::Display for ActionMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:05b}", self.0)
    }
}

impl FromStr for ActionMask {
    type Err = Error;

    /// Parse a decimal or `0b`-prefixed binary mask.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
            Some(bits) => u8::from_str_radix(bits, 2),
            None => s.parse::<u8>(),
        };
        match parsed {
            Ok(bits) if bits <= 0b11111 => Ok(ActionMask(bits)),
            _ => Err(Error::Config(format!("invalid action mask '{}'", s))),
        }
    }
}

/// Explicit per-action enablement, highest precedence.
pub type ActionOverrides = IndexMap<Action, bool>;

/// Decide which actions are routed, in routing order.
///
/// Configured actions keep their configured order, overrides for other
/// actions follow in override order, and actions left undecided fall back
/// to the mask.
pub fn enabled_actions(
    config: &RouterConfig,
    mask: ActionMask,
    overrides: &ActionOverrides,
) -> Vec<Action> {
    let mut actions = config.actions.clone();
    for (action, enabled) in overrides {
        actions.insert(*action, Some(*enabled));
    }
    for action in Action::ALL {
        if actions.get(&action).copied().flatten().is_none() {
            actions.insert(action, Some(mask.contains(action)));
        }
    }
    actions
        .into_iter()
        .filter_map(|(action, enabled)| (enabled == Some(true)).then_some(action))
        .collect()
}

/// One generated route.
#[derive(Debug, Clone, Serialize)]
pub struct UrlEntry {
    /// Route name, `<model>_<action>`.
    pub name: String,
    /// Path pattern, `/<model>/<rule>`.
    pub path: String,
    /// Routed action.
    pub action: Action,
    /// Entity served by the route.
    pub entity: String,
    /// View handling the route.
    #[serde(skip)]
    pub view: ActionView,
}

/// Builds [`UrlEntry`]s for catalog entities.
#[derive(Debug, Clone, Copy)]
pub struct Router<'a> {
    catalog: &'a Catalog,
    config: &'a ScaffoldConfig,
}

impl<'a> Router<'a> {
    /// Create a router.
    pub fn new(catalog: &'a Catalog, config: &'a ScaffoldConfig) -> Self {
        Self { catalog, config }
    }

    /// Routes for one entity.
    pub fn route(
        &self,
        entity: &str,
        mask: ActionMask,
        overrides: &ActionOverrides,
    ) -> Result<Vec<UrlEntry>, Error> {
        let def = self.catalog.entity(entity)?;
        let model_name = def.model_name();
        let options = self.config.model(&def.name);
        let listview = self.config.listview_for(&def.name);

        // per-model configuration sits under the caller's overrides
        let mut merged = options.actions.clone();
        merged.extend(overrides.iter().map(|(a, e)| (*a, *e)));
        let actions = enabled_actions(&self.config.router, mask, &merged);
        debug!(entity, ?actions, "routing entity");

        Ok(actions
            .into_iter()
            .map(|action| UrlEntry {
                name: format!("{}_{}", model_name, action),
                path: self.path(&model_name, action),
                action,
                entity: def.name.clone(),
                view: ActionView::build(action, &def.name, &options, &listview),
            })
            .collect())
    }

    /// Routes for every entity, in model-name order.
    pub fn route_all(&self, mask: ActionMask, overrides: &ActionOverrides) -> Result<Vec<UrlEntry>, Error> {
        let mut entities: Vec<_> = self.catalog.entities().collect();
        entities.sort_by_key(|def| def.model_name());

        let mut urls = Vec::new();
        for def in entities {
            urls.extend(self.route(&def.name, mask, overrides)?);
        }
        Ok(urls)
    }

    /// Path pattern of an action for a model.
    pub fn path(&self, model_name: &str, action: Action) -> String {
        let rule = self.config.router.url_rule(action);
        let rule = rule.trim_matches('/');
        if rule.is_empty() {
            format!("/{}", model_name)
        } else {
            format!("/{}/{}", model_name, rule)
        }
    }

    /// Concrete path of an action, with `:pk` filled in.
    ///
    /// Returns `None` when the rule needs a pk and none was given.
    pub fn reverse(&self, model_name: &str, action: Action, pk: Option<&str>) -> Option<String> {
        let pattern = self.path(model_name, action);
        let placeholder = format!(":{}", PK_ALIAS);
        match (pattern.contains(&placeholder), pk) {
            (false, _) => Some(pattern),
            (true, Some(pk)) => Some(pattern.replace(&placeholder, pk)),
            (true, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EntityDef, FieldDef, FieldType, ScalarType, SchemaBundle};

    fn catalog() -> Catalog {
        let int = |n: &str| FieldDef::new(n, FieldType::scalar(ScalarType::Int64));
        let bundle = SchemaBundle::new()
            .with_entity(EntityDef::new("Tag", "id").with_fields([int("id")]))
            .with_entity(EntityDef::new("BlogPost", "id").with_fields([int("id")]));
        Catalog::from_bundle(bundle).unwrap()
    }

    #[test]
    fn test_mask_parsing() {
        assert_eq!("0b00011".parse::<ActionMask>().unwrap(), ActionMask(3));
        assert_eq!("31".parse::<ActionMask>().unwrap(), ActionMask::default());
        assert!("0b100000".parse::<ActionMask>().is_err());
        assert!("many".parse::<ActionMask>().is_err());
        assert_eq!(ActionMask(3).to_string(), "0b00011");
    }

    #[test]
    fn test_mask_selects_detail_and_list() {
        let config = RouterConfig::default();
        let actions = enabled_actions(&config, ActionMask(0b00011), &ActionOverrides::new());
        assert_eq!(actions, vec![Action::Detail, Action::List]);
    }

    #[test]
    fn test_override_beats_mask() {
        let config = RouterConfig::default();
        let overrides: ActionOverrides = [(Action::Create, true)].into_iter().collect();
        let actions = enabled_actions(&config, ActionMask(0b00011), &overrides);
        assert_eq!(actions, vec![Action::Create, Action::Detail, Action::List]);
    }

    #[test]
    fn test_config_beats_mask() {
        let mut config = RouterConfig::default();
        config.actions.insert(Action::Detail, Some(false));
        config.actions.insert(Action::List, Some(false));
        let actions = enabled_actions(&config, ActionMask::default(), &ActionOverrides::new());
        assert_eq!(actions, vec![Action::Create, Action::Delete, Action::Update]);

        let overrides: ActionOverrides = [(Action::List, true)].into_iter().collect();
        let actions = enabled_actions(&config, ActionMask::default(), &overrides);
        assert_eq!(actions.last(), Some(&Action::List));
    }

    #[test]
    fn test_routes_and_reverse() {
        let catalog = catalog();
        let config = ScaffoldConfig::default();
        let router = Router::new(&catalog, &config);

        let overrides: ActionOverrides = [(Action::Create, true)].into_iter().collect();
        let urls = router.route("BlogPost", ActionMask(0b00011), &overrides).unwrap();
        let names: Vec<_> = urls.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["blogpost_create", "blogpost_detail", "blogpost_list"]);
        assert_eq!(urls[1].path, "/blogpost/:pk");
        assert_eq!(urls[2].path, "/blogpost");
        assert_eq!(urls[1].view.action(), Action::Detail);

        assert_eq!(router.reverse("blogpost", Action::Update, Some("7")).as_deref(), Some("/blogpost/7/update"));
        assert_eq!(router.reverse("blogpost", Action::Detail, None), None);
    }

    #[test]
    fn test_caller_override_beats_model_config() {
        let catalog = catalog();
        let config = ScaffoldConfig::from_json(
            r#"{"models": {"BlogPost": {"actions": {"create": false, "update": true}}}}"#,
        )
        .unwrap();
        let router = Router::new(&catalog, &config);

        let actions = |overrides: &ActionOverrides| -> Vec<Action> {
            router
                .route("BlogPost", ActionMask(0b00001), overrides)
                .unwrap()
                .iter()
                .map(|u| u.action)
                .collect()
        };
        assert_eq!(actions(&ActionOverrides::new()), vec![Action::Update, Action::List]);

        let overrides: ActionOverrides =
            [(Action::Create, true), (Action::Update, false)].into_iter().collect();
        assert_eq!(actions(&overrides), vec![Action::Create, Action::List]);
    }

    #[test]
    fn test_route_all_in_model_order() {
        let catalog = catalog();
        let config = ScaffoldConfig::default();
        let urls = Router::new(&catalog, &config)
            .route_all(ActionMask(0b00001), &ActionOverrides::new())
            .unwrap();
        let names: Vec<_> = urls.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["blogpost_list", "tag_list"]);
    }

    #[test]
    fn test_unknown_entity() {
        let catalog = catalog();
        let config = ScaffoldConfig::default();
        let router = Router::new(&catalog, &config);
        assert!(router.route("Nope", ActionMask::default(), &ActionOverrides::new()).is_err());
    }
}
