//! Restore plan: what a run should do, fixed before the first phase starts.

/// Immutable snapshot of the invocation options, consulted by every phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    pub skip_networks: bool,
    pub skip_databases: bool,
    pub skip_compose: bool,
    pub skip_management_ui: bool,
    pub dry_run: bool,

    /// Restrict the run to the container with this exact name
    pub container_filter: Option<String>,
}

impl RestorePlan {
    pub fn filter(&self) -> Option<&str> {
        self.container_filter.as_deref().filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_filter() {
        let plan = RestorePlan::default();
        assert_eq!(plan.filter(), None);
    }

    #[test]
    fn test_exact_name_filter() {
        let plan = RestorePlan {
            container_filter: Some("alexandria-db".to_string()),
            ..Default::default()
        };
        assert_eq!(plan.filter(), Some("alexandria-db"));
    }

    #[test]
    fn test_empty_filter_is_no_filter() {
        let plan = RestorePlan {
            container_filter: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(plan.filter(), None);
    }
}
