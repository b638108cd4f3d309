use std::collections::{BTreeSet, HashSet};

use crate::clients::{ClientError, HierarchyService};
use crate::models::Account;

/// Walks the account hierarchy below `root_id` and returns every reachable
/// non-manager account. The same client can be attached to several managers,
/// so leaves land in a set rather than a list. Managers are expanded at most
/// once; a cyclic hierarchy terminates instead of looping.
pub async fn discover_leaf_accounts(
    hierarchy: &dyn HierarchyService,
    root_id: &str,
) -> Result<BTreeSet<Account>, ClientError> {
    let mut leaves = BTreeSet::new();
    let mut frontier = vec![root_id.to_string()];
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root_id.to_string());

    while let Some(manager_id) = frontier.pop() {
        let mut page_token: Option<String> = None;
        loop {
            let page = hierarchy
                .list_children(&manager_id, page_token.as_deref())
                .await?;
            for child in page.children {
                let Some(id) = child.id else {
                    tracing::warn!(
                        manager_id = %manager_id,
                        "child record without an account id, skipping"
                    );
                    continue;
                };
                // Some hierarchies list the queried account among its own children.
                if id == root_id {
                    continue;
                }
                if child.is_manager {
                    if visited.insert(id.clone()) {
                        frontier.push(id);
                    }
                } else {
                    leaves.insert(Account {
                        id,
                        display_name: child.display_name.unwrap_or_default(),
                        is_manager: false,
                    });
                }
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
    }

    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ChildPage, ChildRecord};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeHierarchy {
        children: HashMap<String, Vec<ChildRecord>>,
        page_size: usize,
        expanded: Mutex<Vec<String>>,
    }

    impl FakeHierarchy {
        fn new(edges: &[(&str, &str, &str, bool)]) -> Self {
            let mut children: HashMap<String, Vec<ChildRecord>> = HashMap::new();
            for (parent, id, name, is_manager) in edges {
                children.entry((*parent).to_string()).or_default().push(ChildRecord {
                    id: Some((*id).to_string()),
                    display_name: Some((*name).to_string()),
                    is_manager: *is_manager,
                });
            }
            Self {
                children,
                page_size: 100,
                expanded: Mutex::new(Vec::new()),
            }
        }

        fn expansions_of(&self, manager_id: &str) -> usize {
            self.expanded
                .lock()
                .unwrap()
                .iter()
                .filter(|id| id.as_str() == manager_id)
                .count()
        }
    }

    #[async_trait]
    impl HierarchyService for FakeHierarchy {
        async fn list_children(
            &self,
            manager_id: &str,
            page_token: Option<&str>,
        ) -> Result<ChildPage, ClientError> {
            let all = self.children.get(manager_id).cloned().unwrap_or_default();
            let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
            if start == 0 {
                self.expanded.lock().unwrap().push(manager_id.to_string());
            }
            let end = (start + self.page_size).min(all.len());
            let next_page_token = (end < all.len()).then(|| end.to_string());
            Ok(ChildPage {
                children: all[start..end].to_vec(),
                next_page_token,
            })
        }
    }

    struct FailingHierarchy;

    #[async_trait]
    impl HierarchyService for FailingHierarchy {
        async fn list_children(
            &self,
            _manager_id: &str,
            _page_token: Option<&str>,
        ) -> Result<ChildPage, ClientError> {
            Err(ClientError::Api("boom".to_string()))
        }
    }

    fn ids(accounts: &BTreeSet<Account>) -> Vec<&str> {
        accounts.iter().map(|a| a.id.as_str()).collect()
    }

    #[tokio::test]
    async fn returns_leaves_reachable_from_root() {
        let hierarchy = FakeHierarchy::new(&[
            ("111", "222", "Sub MCC", true),
            ("111", "333", "Acme", false),
            ("222", "444", "Beta", false),
        ]);
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(ids(&leaves), vec!["333", "444"]);
        assert!(leaves.iter().all(|account| !account.is_manager));
    }

    #[tokio::test]
    async fn skips_self_referential_root_entry() {
        let hierarchy = FakeHierarchy::new(&[
            ("111", "111", "Root", false),
            ("111", "333", "Acme", false),
        ]);
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(ids(&leaves), vec!["333"]);
    }

    #[tokio::test]
    async fn cyclic_hierarchy_terminates_without_revisits() {
        // 222 and 555 point at each other, and 555 points back at the root.
        let hierarchy = FakeHierarchy::new(&[
            ("111", "222", "A", true),
            ("222", "555", "B", true),
            ("555", "222", "A", true),
            ("555", "111", "Root", true),
            ("555", "666", "Leaf", false),
        ]);
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(ids(&leaves), vec!["666"]);
        assert_eq!(hierarchy.expansions_of("222"), 1);
        assert_eq!(hierarchy.expansions_of("555"), 1);
        assert_eq!(hierarchy.expansions_of("111"), 1);
    }

    #[tokio::test]
    async fn leaf_under_two_managers_appears_once() {
        let hierarchy = FakeHierarchy::new(&[
            ("111", "222", "A", true),
            ("111", "333", "B", true),
            ("222", "777", "Shared", false),
            ("333", "777", "Shared", false),
        ]);
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(ids(&leaves), vec!["777"]);
    }

    #[tokio::test]
    async fn follows_pagination_across_pages() {
        let edges: Vec<(String, String)> = (0..25)
            .map(|n| ("111".to_string(), format!("{}", 1000 + n)))
            .collect();
        let borrowed: Vec<(&str, &str, &str, bool)> = edges
            .iter()
            .map(|(parent, id)| (parent.as_str(), id.as_str(), "Client", false))
            .collect();
        let mut hierarchy = FakeHierarchy::new(&borrowed);
        hierarchy.page_size = 10;
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(leaves.len(), 25);
    }

    #[tokio::test]
    async fn skips_records_without_an_id() {
        let mut hierarchy = FakeHierarchy::new(&[("111", "333", "Acme", false)]);
        hierarchy
            .children
            .get_mut("111")
            .unwrap()
            .push(ChildRecord {
                id: None,
                display_name: Some("Broken".to_string()),
                is_manager: false,
            });
        let leaves = discover_leaf_accounts(&hierarchy, "111").await.unwrap();
        assert_eq!(ids(&leaves), vec!["333"]);
    }

    #[tokio::test]
    async fn hierarchy_error_aborts_discovery() {
        let result = discover_leaf_accounts(&FailingHierarchy, "111").await;
        assert!(matches!(result, Err(ClientError::Api(_))));
    }
}
