use async_trait::async_trait;
use infrawatch_core::{
    ApiError, EventKind, PageSizes, PushEvent, Snapshot,
    models::{AlertRule, AlertRuleCreate, AlertRuleQuery},
};

use crate::{
    api::DashboardApi,
    reconciler::{Reconciler, Resource},
};

/// Alert rules. Not pushed; changes show up through actions and refetches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertRules;

pub type AlertRulesView = Reconciler<AlertRules>;

#[async_trait]
impl Resource for AlertRules {
    type Item = AlertRule;
    type Query = AlertRuleQuery;
    type Stats = ();

    const NAME: &'static str = "alert_rules";
    const EVENT: Option<EventKind> = None;

    fn page_size(&self, sizes: &PageSizes) -> u32 {
        sizes.alert_rules
    }

    fn id<'a>(&self, item: &'a AlertRule) -> &'a str {
        &item.id
    }

    fn extract<'a>(&self, _event: &'a PushEvent) -> Option<&'a AlertRule> {
        None
    }

    async fn fetch(
        &self,
        api: &DashboardApi,
        _query: &AlertRuleQuery,
        page: u32,
        page_size: u32,
    ) -> Result<Snapshot<AlertRule>, ApiError> {
        api.list_alert_rules(page, page_size).await
    }
}

impl Reconciler<AlertRules> {
    /// Create a rule and show it first.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn create(&self, rule: &AlertRuleCreate) -> Result<AlertRule, ApiError> {
        let created = self.shared.api.create_alert_rule(rule).await?;
        self.shared.apply_delta(&created);
        Ok(created)
    }

    /// Enable or disable a rule.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn toggle(&self, id: &str, enabled: bool) -> Result<AlertRule, ApiError> {
        let rule = self.shared.api.toggle_alert_rule(id, enabled).await?;
        self.shared.replace(&rule);
        Ok(rule)
    }

    /// Delete a rule.
    ///
    /// # Errors
    /// Returns the API error; the view is unchanged.
    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.shared.api.delete_alert_rule(id).await?;
        self.shared.remove(id);
        Ok(())
    }
}
