//! Menu trees assembled from flat backend records.

use std::collections::HashMap;

use super::visitor::Visitor;

/// One menu record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: i64,
    pub parent: Option<i64>,
    pub name: String,
    pub slug: String,
    /// Only shown to logged-in visitors.
    pub login: bool,
    /// Only shown to managers.
    pub manager: bool,
}

/// Rendered menu node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub name: String,
    pub slug: String,
    pub children: Vec<MenuNode>,
}

/// A node paired with its depth, for templates that cannot recurse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMenuItem {
    pub depth: usize,
    pub name: String,
    pub slug: String,
    pub has_children: bool,
}

/// Which entries survive tree assembly.
#[derive(Debug, Clone, Copy)]
pub enum MenuVisibility {
    /// Catalogue menus: everything is public.
    All,
    /// CMS menus: `login` / `manager` entries depend on the visitor.
    For(Visitor),
}

impl MenuVisibility {
    fn admits(&self, entry: &MenuEntry) -> bool {
        match self {
            MenuVisibility::All => true,
            MenuVisibility::For(visitor) => {
                !(entry.login && !visitor.logged_in) && !(entry.manager && !visitor.manager)
            }
        }
    }
}

/// Build the children of `root_id` from `entries`, preserving input order.
///
/// A hidden entry hides its whole subtree. Entries whose parent is not
/// reachable from the root are ignored, and so are cycles.
pub fn build_tree(root_id: i64, entries: &[MenuEntry], visibility: MenuVisibility) -> Vec<MenuNode> {
    let mut by_parent: HashMap<i64, Vec<&MenuEntry>> = HashMap::new();
    for entry in entries {
        if let Some(parent) = entry.parent {
            by_parent.entry(parent).or_default().push(entry);
        }
    }

    let mut visited = vec![root_id];
    children_of(root_id, &by_parent, visibility, &mut visited)
}

fn children_of(
    parent: i64,
    by_parent: &HashMap<i64, Vec<&MenuEntry>>,
    visibility: MenuVisibility,
    visited: &mut Vec<i64>,
) -> Vec<MenuNode> {
    let Some(children) = by_parent.get(&parent) else {
        return Vec::new();
    };

    let mut nodes = Vec::with_capacity(children.len());
    for child in children {
        if !visibility.admits(child) || visited.contains(&child.id) {
            continue;
        }
        visited.push(child.id);
        nodes.push(MenuNode {
            name: child.name.clone(),
            slug: child.slug.clone(),
            children: children_of(child.id, by_parent, visibility, visited),
        });
    }
    nodes
}

/// Depth-first flattening of a menu forest.
pub fn flatten(nodes: &[MenuNode]) -> Vec<FlatMenuItem> {
    fn walk(nodes: &[MenuNode], depth: usize, out: &mut Vec<FlatMenuItem>) {
        for node in nodes {
            out.push(FlatMenuItem {
                depth,
                name: node.name.clone(),
                slug: node.slug.clone(),
                has_children: !node.children.is_empty(),
            });
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(nodes, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i64, parent: i64, name: &str, login: bool, manager: bool) -> MenuEntry {
        MenuEntry {
            id,
            parent: Some(parent),
            name: name.to_string(),
            slug: name.to_lowercase(),
            login,
            manager,
        }
    }

    fn sample() -> Vec<MenuEntry> {
        vec![
            entry(2, 1, "Shop", false, false),
            entry(3, 1, "Account", true, false),
            entry(4, 1, "Admin", false, true),
            entry(5, 2, "Offers", false, false),
            entry(6, 3, "Orders", false, false),
            entry(7, 99, "Orphan", false, false),
        ]
    }

    fn names(nodes: &[MenuNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn guests_only_see_public_entries() {
        let tree = build_tree(1, &sample(), MenuVisibility::For(Visitor::guest()));
        assert_eq!(names(&tree), ["Shop"]);
        assert_eq!(names(&tree[0].children), ["Offers"]);
    }

    #[test]
    fn logged_in_visitors_see_login_entries_and_their_subtree() {
        let tree = build_tree(1, &sample(), MenuVisibility::For(Visitor::customer()));
        assert_eq!(names(&tree), ["Shop", "Account"]);
        assert_eq!(names(&tree[1].children), ["Orders"]);
    }

    #[test]
    fn managers_see_everything_reachable() {
        let tree = build_tree(1, &sample(), MenuVisibility::For(Visitor::manager()));
        assert_eq!(names(&tree), ["Shop", "Account", "Admin"]);

        let catalogue = build_tree(1, &sample(), MenuVisibility::All);
        assert_eq!(names(&catalogue), ["Shop", "Account", "Admin"]);
    }

    #[test]
    fn cycles_do_not_recurse_forever() {
        let entries = vec![entry(2, 1, "A", false, false), entry(1, 2, "Root", false, false)];
        let tree = build_tree(1, &entries, MenuVisibility::All);
        assert_eq!(names(&tree), ["A"]);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn flatten_reports_depths_in_document_order() {
        let tree = build_tree(1, &sample(), MenuVisibility::All);
        let flat: Vec<_> = flatten(&tree)
            .into_iter()
            .map(|item| (item.depth, item.name))
            .collect();
        assert_eq!(
            flat,
            [
                (0, "Shop".to_string()),
                (1, "Offers".to_string()),
                (0, "Account".to_string()),
                (1, "Orders".to_string()),
                (0, "Admin".to_string()),
            ]
        );
    }
}
